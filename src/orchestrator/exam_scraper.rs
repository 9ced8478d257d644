//! Extraction state machine
//!
//! Drives one exam through: initialize → navigate → challenge check →
//! discovery → per-question extraction → markup list. Two mutually
//! exclusive discovery modes exist: enumerated (collect every question
//! link from an overview page, then visit each) and sequential (follow
//! "next" links from a single starting question).
//!
//! Failures are contained at the narrowest scope: a question that cannot
//! be extracted becomes an empty-string placeholder (index alignment with
//! the discovered URL list is preserved) and the tab is recreated before
//! the run continues.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use regex::Regex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::infrastructure::PageDriver;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::utils::retry::with_retry;

/// Markers a challenge interstitial leaves in the title or body text.
const CHALLENGE_MARKERS: &[&str] = &[
    "just a moment",
    "checking your browser",
    "attention required",
    "cloudflare",
    "ddos protection",
];

/// Link texts that are navigation chrome, not question links.
const NAV_LINK_NOISE: &[&str] = &["próxima", "anterior", "voltar", "início"];

/// Increasingly broad selectors tried until question links appear.
const LINK_SELECTOR_CASCADE: &[&str] = &[
    "table a[href*='/questao/']",
    ".questoes a[href*='/questao/']",
    "a[href*='/questao/']",
];

/// Present once the site has disclosed the correct alternative.
const REVEAL_SUCCESS_SELECTOR: &str = ".radio.alert-success";
const REVEAL_BUTTON_TEXT: &str = "Responder";
const REVEAL_WAIT: Duration = Duration::from_secs(5);

const IMAGE_PROBE_SELECTOR: &str = ".question img, .questao img, .pergunta img";

const CHALLENGE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Cap applied when sequential mode is started without an explicit limit.
const DEFAULT_SEQUENTIAL_LIMIT: usize = 5;

/// How the set of question pages is discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Start from an overview page listing every question.
    Enumerated,
    /// Start on a question page and follow "next" links.
    Sequential,
}

impl DiscoveryMode {
    /// Overview URLs (`/prova/`) enumerate; question URLs walk
    /// sequentially.
    pub fn from_start_url(url: &str) -> Self {
        if url.contains("/prova/") {
            DiscoveryMode::Enumerated
        } else {
            DiscoveryMode::Sequential
        }
    }
}

pub struct ExamScraper<D: PageDriver> {
    driver: D,
    config: Config,
    progress: Arc<dyn ProgressReporter>,
}

impl<D: PageDriver> ExamScraper<D> {
    pub fn new(driver: D, config: Config, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            driver,
            config,
            progress,
        }
    }

    /// Extract one ordered markup blob per question.
    ///
    /// Entries are empty strings where a question failed unrecoverably,
    /// so positions always line up with the discovered question set.
    pub async fn extract_question_markup(
        &mut self,
        start_url: &str,
        mode: DiscoveryMode,
        limit: usize,
    ) -> Result<Vec<String>> {
        info!("🧭 starting extraction from {}", start_url);

        self.navigate(start_url).await?;
        self.wait_for_challenge().await?;

        match mode {
            DiscoveryMode::Enumerated => {
                let urls = self.discover_question_urls(limit).await?;
                if urls.is_empty() {
                    warn!("⚠️ no question links found on overview page");
                    return Ok(Vec::new());
                }
                self.extract_enumerated(&urls).await
            }
            DiscoveryMode::Sequential => self.extract_sequential(limit).await,
        }
    }

    /// Navigate with the 2-attempt backoff policy. Timeouts keep their
    /// distinct `PageLoadTimeout` kind through the retries.
    async fn navigate(&self, url: &str) -> Result<()> {
        let nav_timeout = self.config.browser.timeout;
        with_retry(
            || self.driver.navigate(url, nav_timeout),
            &self.config.navigation_retry,
            |e, attempt| warn!("navigation attempt {} failed: {}", attempt, e),
        )
        .await
    }

    /// Detect a challenge interstitial and wait it out.
    ///
    /// No challenge: returns immediately. Challenge present: sleep the
    /// warm-up interval, then poll until the markers disappear, bounded by
    /// the challenge timeout. Failing to clear raises `ChallengeBlocked`.
    async fn wait_for_challenge(&self) -> Result<()> {
        if !self.challenge_markers_present().await? {
            debug!("no challenge page detected");
            return Ok(());
        }

        info!("🛡️ challenge page detected, waiting for it to clear...");
        sleep(self.config.challenge_warmup).await;

        let deadline = Instant::now() + self.config.challenge_timeout;
        loop {
            if !self.challenge_markers_present().await? {
                info!("🛡️ challenge cleared");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::ChallengeBlocked(self.config.challenge_timeout).into());
            }
            sleep(CHALLENGE_POLL_INTERVAL).await;
        }
    }

    async fn challenge_markers_present(&self) -> Result<bool> {
        let title = self.driver.title().await?.to_lowercase();
        let body = self.driver.body_text().await?.to_lowercase();
        Ok(CHALLENGE_MARKERS
            .iter()
            .any(|m| title.contains(m) || body.contains(m)))
    }

    /// Collect question URLs from the overview page.
    ///
    /// Tries the selector cascade until links appear, drops navigation
    /// chrome, deduplicates, and keeps only links of the current exam when
    /// its identifier can be read from the URL path.
    async fn discover_question_urls(&self, limit: usize) -> Result<Vec<String>> {
        info!("🔎 discovering question links...");

        let mut links = Vec::new();
        for selector in LINK_SELECTOR_CASCADE {
            links = self.driver.find_links(selector).await?;
            if !links.is_empty() {
                debug!("selector '{}' matched {} links", selector, links.len());
                break;
            }
        }

        let mut seen = HashSet::new();
        let mut urls: Vec<String> = links
            .into_iter()
            .filter(|link| !link.href.is_empty() && !is_navigation_link(&link.text))
            .map(|link| link.href)
            .filter(|href| seen.insert(href.clone()))
            .collect();

        let before_filter = urls.len();
        if let Some(exam_id) = exam_identifier(&self.driver.current_url().await?) {
            urls.retain(|url| url.contains(&exam_id));
            info!(
                "🔎 found {} question links ({} before same-exam filter)",
                urls.len(),
                before_filter
            );
        } else {
            info!("🔎 found {} question links", urls.len());
        }

        if limit > 0 && urls.len() > limit {
            info!("limiting extraction to {} questions", limit);
            urls.truncate(limit);
        }
        Ok(urls)
    }

    async fn extract_enumerated(&mut self, urls: &[String]) -> Result<Vec<String>> {
        let total = urls.len();
        self.progress.report(&ProgressEvent::TotalKnown(total));

        let mut markups = Vec::with_capacity(total);
        for (i, url) in urls.iter().enumerate() {
            let current = i + 1;
            self.progress
                .report(&ProgressEvent::Processing { current, total });
            info!("📝 extracting question {}/{}", current, total);
            debug!("question url: {}", url);

            match self.extract_one(url).await {
                Ok(markup) => {
                    self.probe_images(current).await;
                    markups.push(markup);
                }
                Err(e) => {
                    error!("❌ question {} failed: {:#}", current, e);
                    // Empty placeholder keeps index alignment with the URL
                    // list; the tab is assumed poisoned and recreated.
                    markups.push(String::new());
                    self.recover_page().await;
                }
            }

            if current < total {
                self.pause_between_questions().await;
            }
        }

        let extracted = markups.iter().filter(|m| !m.is_empty()).count();
        info!("✅ extracted {}/{} questions", extracted, total);
        Ok(markups)
    }

    /// Navigate, clear any challenge, reveal the answer, and capture the
    /// markup, all inside the per-question budget.
    async fn extract_one(&self, url: &str) -> Result<String> {
        let budget = self.config.question_timeout;
        let steps = async {
            self.navigate(url).await?;
            self.wait_for_challenge().await?;
            self.reveal_answer().await;
            self.driver.content().await
        };
        match timeout(budget, steps).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::ExtractionTimeout(budget).into()),
        }
    }

    async fn extract_sequential(&mut self, limit: usize) -> Result<Vec<String>> {
        let limit = if limit == 0 {
            DEFAULT_SEQUENTIAL_LIMIT
        } else {
            limit
        };
        info!("📝 extracting up to {} questions sequentially...", limit);
        self.progress.report(&ProgressEvent::TotalKnown(limit));

        let mut markups = Vec::new();
        for i in 0..limit {
            let current = i + 1;
            self.progress.report(&ProgressEvent::Processing {
                current,
                total: limit,
            });
            info!("📝 extracting question {}/{}", current, limit);

            // The page is already loaded here; no navigation step.
            self.reveal_answer().await;
            match self.driver.content().await {
                Ok(markup) => markups.push(markup),
                Err(e) => {
                    error!("❌ question {} failed: {:#}", current, e);
                    break;
                }
            }
            self.probe_images(current).await;

            if current < limit {
                let Some(next_url) = self.find_next_link().await else {
                    info!("no \"próxima\" link found, stopping");
                    break;
                };
                if let Err(e) = self.follow_next(&next_url).await {
                    error!("❌ failed to reach question {}: {:#}", current + 1, e);
                    break;
                }
            }
        }

        info!("✅ extracted {} questions sequentially", markups.len());
        Ok(markups)
    }

    async fn find_next_link(&self) -> Option<String> {
        let links = match self.driver.find_links("a").await {
            Ok(links) => links,
            Err(e) => {
                warn!("could not list links for next-question lookup: {}", e);
                return None;
            }
        };
        links
            .into_iter()
            .find(|link| link.text.to_lowercase().contains("próxima") && !link.href.is_empty())
            .map(|link| link.href)
    }

    async fn follow_next(&self, url: &str) -> Result<()> {
        self.navigate(url).await?;
        self.wait_for_challenge().await?;
        sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    /// Reveal the correct alternative by answering with the first choice.
    ///
    /// Best-effort: every failure path logs and returns, the question is
    /// still extracted without `is_correct` information.
    async fn reveal_answer(&self) {
        match self.driver.selector_exists(REVEAL_SUCCESS_SELECTOR).await {
            Ok(true) => {
                debug!("answer already revealed");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("reveal pre-check failed: {}", e);
                return;
            }
        }

        match self.driver.submit_first_choice(REVEAL_BUTTON_TEXT).await {
            Ok(outcome) if outcome.success => {
                match self
                    .driver
                    .wait_for_selector(REVEAL_SUCCESS_SELECTOR, REVEAL_WAIT)
                    .await
                {
                    Ok(true) => info!("✅ correct answer revealed"),
                    Ok(false) => warn!("⚠️ timed out waiting for the revealed answer, continuing"),
                    Err(e) => warn!("⚠️ error waiting for the revealed answer: {}", e),
                }
            }
            Ok(outcome) => info!("could not reveal answer: {}", outcome.reason),
            Err(e) => warn!("reveal action failed: {}", e),
        }
    }

    /// Emit the image-found milestone when the question container carries
    /// an image. Fire-and-forget.
    async fn probe_images(&self, current: usize) {
        if let Ok(true) = self.driver.selector_exists(IMAGE_PROBE_SELECTOR).await {
            self.progress.report(&ProgressEvent::ImageFound { current });
        }
    }

    /// Replace the (presumably crashed) tab with a fresh one. A failure
    /// here is logged but never aborts the run.
    async fn recover_page(&mut self) {
        warn!("♻️ recreating the tab...");
        match self.driver.reset().await {
            Ok(()) => info!("♻️ tab recovered"),
            Err(e) => error!("tab recovery failed: {}", e),
        }
    }

    /// Randomized 1-2s pacing between questions, to look less like a bot.
    async fn pause_between_questions(&self) {
        let delay_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.config.pacing_min_ms..=self.config.pacing_max_ms)
        };
        debug!("waiting {}ms before next question", delay_ms);
        sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn is_navigation_link(text: &str) -> bool {
    let text = text.to_lowercase();
    NAV_LINK_NOISE.iter().any(|noise| text.contains(noise))
}

/// Exam identifier segment from an overview URL, e.g.
/// `/prova/550/sus-sp-sp-2015-r1-1` → `sus-sp-sp-2015-r1-1`.
fn exam_identifier(url: &str) -> Option<String> {
    let re = Regex::new(r"/prova/\d+/([^/?]+)").ok()?;
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
