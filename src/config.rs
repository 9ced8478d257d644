use std::time::Duration;

use crate::utils::retry::RetryPolicy;

/// Browser tab settings applied on every (re)created tab.
#[derive(Clone, Debug)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Viewport applied to each tab.
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    pub accept_language: String,
    /// Default per-operation timeout.
    pub timeout: Duration,
}

/// Program configuration.
///
/// Loaded from environment variables with hard-coded fallbacks; no
/// process-wide singleton, each component receives what it needs at
/// construction.
#[derive(Clone, Debug)]
pub struct Config {
    pub browser: BrowserSettings,
    /// Base used to resolve relative image/link URLs.
    pub base_url: String,
    /// Navigation retry policy (2 attempts, 1s -> 5s).
    pub navigation_retry: RetryPolicy,
    /// Image download retry policy (3 attempts by default).
    pub download_retry: RetryPolicy,
    /// Warm-up sleep after a challenge page is detected.
    pub challenge_warmup: Duration,
    /// Overall budget for the challenge to clear.
    pub challenge_timeout: Duration,
    /// Budget for a single question's navigate + reveal + capture.
    pub question_timeout: Duration,
    /// Randomized pacing bounds between questions, in milliseconds.
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    /// Maximum questions to extract (0 = no limit).
    pub question_limit: usize,
    /// Peak concurrent image downloads within one chunk.
    pub max_concurrent_images: usize,
    /// Directory for locally cached images.
    pub images_dir: String,
    /// Output file for the final question JSON.
    pub output_file: String,
    pub scraper_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserSettings {
                headless: true,
                viewport_width: 1366,
                viewport_height: 768,
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                             AppleWebKit/537.36 (KHTML, like Gecko) \
                             Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
                accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
                timeout: Duration::from_secs(30),
            },
            base_url: "https://www.medquestoes.com.br".to_string(),
            navigation_retry: RetryPolicy::navigation(),
            download_retry: RetryPolicy::download(),
            challenge_warmup: Duration::from_secs(5),
            challenge_timeout: Duration::from_secs(30),
            question_timeout: Duration::from_secs(15),
            pacing_min_ms: 1000,
            pacing_max_ms: 2000,
            question_limit: 0,
            max_concurrent_images: 5,
            images_dir: "output/images".to_string(),
            output_file: "output/questions.json".to_string(),
            scraper_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser: BrowserSettings {
                headless: env_parse("SCRAPER_HEADLESS", default.browser.headless),
                user_agent: env_or("SCRAPER_USER_AGENT", default.browser.user_agent),
                ..default.browser
            },
            base_url: env_or("SCRAPER_BASE_URL", default.base_url),
            question_limit: env_parse("SCRAPER_LIMIT", default.question_limit),
            max_concurrent_images: env_parse(
                "SCRAPER_MAX_CONCURRENT_IMAGES",
                default.max_concurrent_images,
            ),
            images_dir: env_or("SCRAPER_IMAGES_DIR", default.images_dir),
            output_file: env_or("SCRAPER_OUTPUT_FILE", default.output_file),
            ..default
        }
    }
}

fn env_or(name: &str, fallback: String) -> String {
    std::env::var(name).unwrap_or(fallback)
}

fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
