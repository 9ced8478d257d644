use anyhow::{Context, Result};
use prova_scraper::app::App;
use prova_scraper::config::Config;
use prova_scraper::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let start_url = std::env::args()
        .nth(1)
        .context("usage: prova-scraper <exam-or-question-url>")?;

    let config = Config::from_env();
    let mut app = App::initialize(config).await?;
    let report = app.run(&start_url).await?;

    if report.partial_failure {
        std::process::exit(2);
    }
    Ok(())
}
