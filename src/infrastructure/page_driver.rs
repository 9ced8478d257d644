//! Page driver
//!
//! Narrow capability interface over one browser tab. The extraction state
//! machine depends only on this trait, which keeps the automation backend
//! swappable and lets tests run against a scripted fake.
//!
//! `CdpDriver` is the production implementation: it holds the single tab
//! and does its DOM work through `Page::evaluate`, returning plain data.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::{Browser, Page};
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::BrowserSettings;
use crate::error::ScrapeError;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// An anchor found on the page.
#[derive(Clone, Debug, Deserialize)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

/// Result of the select-and-submit action used to reveal answers.
#[derive(Clone, Debug, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    pub reason: String,
}

/// Capabilities the extraction state machine needs from a browser tab.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate and wait for the document to load, bounded by `timeout`.
    /// A timeout surfaces as `ScrapeError::PageLoadTimeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn body_text(&self) -> Result<String>;

    /// Full page markup.
    async fn content(&self) -> Result<String>;

    /// All anchors matching a CSS selector, with their visible text.
    async fn find_links(&self, selector: &str) -> Result<Vec<PageLink>>;

    async fn selector_exists(&self, selector: &str) -> Result<bool>;

    /// Poll for a selector; `Ok(false)` when it never appears in time.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Select the first answer choice and click the submit button whose
    /// text contains `button_text`.
    async fn submit_first_choice(&self, button_text: &str) -> Result<SubmitOutcome>;

    /// Discard the tab and open a fresh one with the same settings.
    /// Session state is not preserved.
    async fn reset(&mut self) -> Result<()>;
}

/// Production driver over a chromiumoxide page.
pub struct CdpDriver {
    browser: Arc<Browser>,
    page: Page,
    settings: BrowserSettings,
}

impl CdpDriver {
    /// Open a tab and apply viewport, user agent, and locale headers.
    pub async fn new(browser: Arc<Browser>, settings: BrowserSettings) -> Result<Self> {
        let page = Self::create_page(&browser, &settings).await?;
        Ok(Self {
            browser,
            page,
            settings,
        })
    }

    async fn create_page(browser: &Browser, settings: &BrowserSettings) -> Result<Page> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create page")?;

        page.set_user_agent(settings.user_agent.as_str())
            .await
            .context("failed to set user agent")?;

        let viewport = SetDeviceMetricsOverrideParams::builder()
            .width(settings.viewport_width as i64)
            .height(settings.viewport_height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow::anyhow!("viewport params: {e}"))?;
        page.execute(viewport)
            .await
            .context("failed to set viewport")?;

        let headers = Headers::new(json!({
            "Accept-Language": settings.accept_language,
            "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        }));
        page.execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .context("failed to set headers")?;

        debug!("page created and configured");
        Ok(page)
    }

    /// Run JS in the page and return its JSON value.
    async fn eval(&self, js_code: impl Into<String>) -> Result<serde_json::Value> {
        let result = self.page.evaluate(js_code.into()).await?;
        let value = result.into_value()?;
        Ok(value)
    }

    async fn eval_as<T: serde::de::DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let value = self.eval(js_code).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn navigate(&self, url: &str, nav_timeout: Duration) -> Result<()> {
        match timeout(nav_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e).with_context(|| format!("navigation to {url} failed")),
            Err(_) => Err(ScrapeError::PageLoadTimeout(nav_timeout).into()),
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn body_text(&self) -> Result<String> {
        self.eval_as("document.body ? document.body.innerText : ''")
            .await
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn find_links(&self, selector: &str) -> Result<Vec<PageLink>> {
        let js = format!(
            r#"Array.from(document.querySelectorAll({sel})).map(a => ({{
                href: a.href || '',
                text: (a.textContent || '').trim()
            }}))"#,
            sel = serde_json::to_string(selector)?
        );
        self.eval_as(js).await
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let js = format!(
            "document.querySelector({sel}) !== null",
            sel = serde_json::to_string(selector)?
        );
        self.eval_as(js).await
    }

    async fn wait_for_selector(&self, selector: &str, wait: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if self.selector_exists(selector).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn submit_first_choice(&self, button_text: &str) -> Result<SubmitOutcome> {
        let js = format!(
            r#"(() => {{
                const firstRadio = document.querySelector('input[type="radio"][name="choice"]');
                if (!firstRadio) {{
                    return {{ success: false, reason: 'no radio button found' }};
                }}
                firstRadio.checked = true;

                const buttons = Array.from(document.querySelectorAll('button[type="submit"]'));
                const target = buttons.find(b => (b.textContent || '').includes({text}));
                if (!target) {{
                    return {{ success: false, reason: 'submit button not found' }};
                }}
                target.click();
                return {{ success: true, reason: 'clicked' }};
            }})()"#,
            text = serde_json::to_string(button_text)?
        );
        self.eval_as(js).await
    }

    async fn reset(&mut self) -> Result<()> {
        let fresh = Self::create_page(&self.browser, &self.settings).await?;
        let old = std::mem::replace(&mut self.page, fresh);
        if let Err(e) = old.close().await {
            // The old tab may already be gone; the fresh one is what matters.
            warn!("closing crashed tab failed: {}", e);
        }
        Ok(())
    }
}
