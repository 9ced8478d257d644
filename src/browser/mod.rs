//! Headless browser launch
//!
//! Starts Chrome through chromiumoxide and drains its event stream on a
//! background task, the only place the `Browser` handle is created.

use anyhow::{Context, Result};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::config::BrowserSettings;

/// Launch a headless browser.
///
/// Browser launch failure is one of the few truly fatal conditions: it
/// propagates to the top and terminates the run.
pub async fn launch_browser(settings: &BrowserSettings) -> Result<Browser> {
    info!("🚀 launching headless browser...");

    let mut builder = BrowserConfig::builder()
        .window_size(settings.viewport_width, settings.viewport_height)
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--remote-debugging-port=0",
        ]);
    if settings.headless {
        builder = builder.new_headless_mode();
    } else {
        builder = builder.with_head();
    }
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("browser configuration failed: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("failed to launch browser")?;
    debug!("browser process started");

    // Drain CDP events in the background for the lifetime of the browser.
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    // Short pause to let the browser state settle before the first page.
    sleep(Duration::from_millis(300)).await;

    info!("✅ browser ready");
    Ok(browser)
}
