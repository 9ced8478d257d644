//! Extraction state machine tests against a scripted fake driver.
//!
//! The fake implements `PageDriver` over an in-memory site description, so
//! these tests exercise discovery, challenge handling, recovery, and index
//! alignment without a browser.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use prova_scraper::config::Config;
use prova_scraper::error::ScrapeError;
use prova_scraper::infrastructure::{PageDriver, PageLink, SubmitOutcome};
use prova_scraper::orchestrator::{DiscoveryMode, ExamScraper};
use prova_scraper::progress::{NullProgress, ProgressEvent, ProgressReporter};
use prova_scraper::utils::retry::RetryPolicy;

#[derive(Clone, Default)]
struct FakePage {
    title: String,
    body: String,
    content: String,
    links: Vec<PageLink>,
    revealed: bool,
    has_image: bool,
    /// Number of title/body reads during which challenge markers persist.
    challenge_reads: usize,
}

#[derive(Default)]
struct FakeState {
    pages: HashMap<String, FakePage>,
    current: String,
    fail_navigation: HashSet<String>,
    navigations: Vec<String>,
    resets: usize,
    submits: usize,
}

#[derive(Clone)]
struct FakeDriver(Arc<Mutex<FakeState>>);

impl FakeDriver {
    fn new(state: FakeState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    fn current_page(state: &mut FakeState) -> FakePage {
        let current = state.current.clone();
        // Challenge markers wear off as the page is re-inspected.
        if let Some(page) = state.pages.get_mut(&current) {
            if page.challenge_reads > 0 {
                page.challenge_reads -= 1;
                return FakePage {
                    title: "Just a moment...".to_string(),
                    body: "checking your browser before accessing".to_string(),
                    ..page.clone()
                };
            }
            return page.clone();
        }
        FakePage::default()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        if state.fail_navigation.contains(url) {
            return Err(anyhow!("tab crashed"));
        }
        state.current = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().current.clone())
    }

    async fn title(&self) -> Result<String> {
        let mut state = self.state();
        Ok(Self::current_page(&mut state).title)
    }

    async fn body_text(&self) -> Result<String> {
        let mut state = self.state();
        Ok(Self::current_page(&mut state).body)
    }

    async fn content(&self) -> Result<String> {
        let mut state = self.state();
        Ok(Self::current_page(&mut state).content)
    }

    async fn find_links(&self, selector: &str) -> Result<Vec<PageLink>> {
        let mut state = self.state();
        let page = Self::current_page(&mut state);
        if selector == "a" {
            return Ok(page.links);
        }
        if selector.contains("/questao/") {
            return Ok(page
                .links
                .into_iter()
                .filter(|l| l.href.contains("/questao/"))
                .collect());
        }
        Ok(Vec::new())
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let mut state = self.state();
        let page = Self::current_page(&mut state);
        if selector.contains("alert-success") {
            return Ok(page.revealed);
        }
        if selector.contains("img") {
            return Ok(page.has_image);
        }
        Ok(false)
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        self.selector_exists(selector).await
    }

    async fn submit_first_choice(&self, _button_text: &str) -> Result<SubmitOutcome> {
        let mut state = self.state();
        state.submits += 1;
        let current = state.current.clone();
        if let Some(page) = state.pages.get_mut(&current) {
            page.revealed = true;
        }
        Ok(SubmitOutcome {
            success: true,
            reason: "clicked".to_string(),
        })
    }

    async fn reset(&mut self) -> Result<()> {
        self.state().resets += 1;
        Ok(())
    }
}

/// Progress reporter that records every event.
#[derive(Default)]
struct CaptureProgress(Mutex<Vec<ProgressEvent>>);

impl ProgressReporter for CaptureProgress {
    fn report(&self, event: &ProgressEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.navigation_retry = RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        backoff_multiplier: 2.0,
    };
    config.challenge_warmup = Duration::from_millis(5);
    config.challenge_timeout = Duration::from_millis(50);
    config.question_timeout = Duration::from_secs(2);
    config.pacing_min_ms = 1;
    config.pacing_max_ms = 2;
    config
}

fn link(href: &str, text: &str) -> PageLink {
    PageLink {
        href: href.to_string(),
        text: text.to_string(),
    }
}

const OVERVIEW_URL: &str = "https://site.test/prova/550/sus-sp-2015";

fn question_url(n: usize) -> String {
    format!("https://site.test/questao/{n}/sus-sp-2015-q{n}")
}

/// Overview page with five same-exam questions, navigation chrome, and one
/// cross-exam link.
fn enumerated_site() -> FakeState {
    let mut pages = HashMap::new();

    let mut links: Vec<PageLink> = (1..=5)
        .map(|n| link(&question_url(n), &n.to_string()))
        .collect();
    links.push(link(&question_url(1), "1")); // duplicate
    links.push(link("https://site.test/questao/9/usp-2020-q9", "9")); // other exam
    links.push(link(&question_url(2), "Próxima")); // navigation chrome

    pages.insert(
        OVERVIEW_URL.to_string(),
        FakePage {
            title: "SUS-SP 2015".to_string(),
            links,
            ..FakePage::default()
        },
    );

    for n in 1..=5 {
        pages.insert(
            question_url(n),
            FakePage {
                title: format!("Questão {n} - SUS-SP 2015"),
                content: format!("<html>questao {n}</html>"),
                has_image: n == 2,
                ..FakePage::default()
            },
        );
    }

    FakeState {
        pages,
        ..FakeState::default()
    }
}

#[tokio::test]
async fn enumerated_failure_leaves_an_empty_placeholder_at_the_same_index() {
    let mut state = enumerated_site();
    state.fail_navigation.insert(question_url(3));
    let driver = FakeDriver::new(state);
    let handle = driver.clone();

    let progress = Arc::new(CaptureProgress::default());
    let mut scraper = ExamScraper::new(driver, test_config(), progress.clone());

    let markups = scraper
        .extract_question_markup(OVERVIEW_URL, DiscoveryMode::Enumerated, 0)
        .await
        .unwrap();

    assert_eq!(markups.len(), 5);
    assert_eq!(markups[2], "");
    for (i, markup) in markups.iter().enumerate() {
        if i != 2 {
            assert_eq!(markup, &format!("<html>questao {}</html>", i + 1));
        }
    }

    // The poisoned tab was recreated exactly once.
    assert_eq!(handle.state().resets, 1);

    let events = progress.0.lock().unwrap();
    assert_eq!(events[0], ProgressEvent::TotalKnown(5));
    assert!(events.contains(&ProgressEvent::Processing { current: 5, total: 5 }));
    assert!(events.contains(&ProgressEvent::ImageFound { current: 2 }));
}

#[tokio::test]
async fn enumerated_discovery_filters_chrome_duplicates_and_other_exams() {
    let driver = FakeDriver::new(enumerated_site());
    let handle = driver.clone();

    let mut scraper = ExamScraper::new(driver, test_config(), Arc::new(NullProgress));
    let markups = scraper
        .extract_question_markup(OVERVIEW_URL, DiscoveryMode::Enumerated, 0)
        .await
        .unwrap();

    assert_eq!(markups.len(), 5);

    let navigations = handle.state().navigations.clone();
    assert!(!navigations.iter().any(|u| u.contains("usp-2020")));
    // overview + 5 questions, one navigation each
    assert_eq!(navigations.len(), 6);
}

#[tokio::test]
async fn enumerated_limit_truncates_the_discovered_set() {
    let driver = FakeDriver::new(enumerated_site());
    let mut scraper = ExamScraper::new(driver, test_config(), Arc::new(NullProgress));

    let markups = scraper
        .extract_question_markup(OVERVIEW_URL, DiscoveryMode::Enumerated, 2)
        .await
        .unwrap();
    assert_eq!(markups.len(), 2);
}

#[tokio::test]
async fn reveal_runs_before_every_capture() {
    let driver = FakeDriver::new(enumerated_site());
    let handle = driver.clone();

    let mut scraper = ExamScraper::new(driver, test_config(), Arc::new(NullProgress));
    scraper
        .extract_question_markup(OVERVIEW_URL, DiscoveryMode::Enumerated, 0)
        .await
        .unwrap();

    assert_eq!(handle.state().submits, 5);
}

#[tokio::test]
async fn sequential_mode_follows_next_links_until_they_run_out() {
    let mut pages = HashMap::new();
    for n in 1..=3 {
        let mut links = Vec::new();
        if n < 3 {
            links.push(link(&question_url(n + 1), "Próxima"));
        }
        pages.insert(
            question_url(n),
            FakePage {
                title: format!("Questão {n}"),
                content: format!("<html>questao {n}</html>"),
                links,
                ..FakePage::default()
            },
        );
    }
    let driver = FakeDriver::new(FakeState {
        pages,
        ..FakeState::default()
    });

    let mut scraper = ExamScraper::new(driver, test_config(), Arc::new(NullProgress));
    let markups = scraper
        .extract_question_markup(&question_url(1), DiscoveryMode::Sequential, 10)
        .await
        .unwrap();

    assert_eq!(
        markups,
        vec![
            "<html>questao 1</html>",
            "<html>questao 2</html>",
            "<html>questao 3</html>",
        ]
    );
}

#[tokio::test]
async fn challenge_that_never_clears_raises_challenge_blocked() {
    let mut pages = HashMap::new();
    pages.insert(
        OVERVIEW_URL.to_string(),
        FakePage {
            challenge_reads: usize::MAX,
            ..FakePage::default()
        },
    );
    let driver = FakeDriver::new(FakeState {
        pages,
        ..FakeState::default()
    });

    let mut scraper = ExamScraper::new(driver, test_config(), Arc::new(NullProgress));
    let err = scraper
        .extract_question_markup(OVERVIEW_URL, DiscoveryMode::Enumerated, 0)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ScrapeError>(),
        Some(ScrapeError::ChallengeBlocked(_))
    ));
}

#[tokio::test]
async fn challenge_that_clears_lets_extraction_proceed() {
    let mut state = enumerated_site();
    if let Some(page) = state.pages.get_mut(OVERVIEW_URL) {
        // Markers survive the first inspection and clear on the post-warmup
        // poll.
        page.challenge_reads = 2;
    }
    let driver = FakeDriver::new(state);

    let mut scraper = ExamScraper::new(driver, test_config(), Arc::new(NullProgress));
    let markups = scraper
        .extract_question_markup(OVERVIEW_URL, DiscoveryMode::Enumerated, 1)
        .await
        .unwrap();
    assert_eq!(markups.len(), 1);
}
