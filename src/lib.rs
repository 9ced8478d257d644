//! # prova-scraper
//!
//! Extracts structured exam-question data from an anti-bot-protected
//! question bank by driving a real browser, then parses, transforms,
//! validates, and persists the result with locally cached images.
//!
//! ## Architecture
//!
//! Strictly layered, top to bottom:
//!
//! ### Orchestration
//! - `app` - the full pipeline (markup → parse → transform → validate →
//!   images → output)
//! - `orchestrator` - the extraction state machine; sole owner of the
//!   browser tab
//!
//! ### Capabilities
//! - `parser` - markup → `RawQuestion` / `ExamMetadata`
//! - `transformer` - `RawQuestion` → canonical `Question`, image inlining
//! - `validator` - schema validation with per-index error reports
//! - `images` - dedup + chunk-bounded concurrent downloads with content
//!   validation
//!
//! ### Infrastructure
//! - `infrastructure` - the `PageDriver` capability trait and its CDP
//!   implementation
//! - `browser` - headless browser launch
//! - `utils::retry` - the backoff executor wrapping every network-sensitive
//!   operation

pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod images;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod transformer;
pub mod utils;
pub mod validator;

pub use app::{App, ScrapeReport};
pub use config::Config;
pub use error::{ImageError, ScrapeError};
pub use infrastructure::{CdpDriver, PageDriver, PageLink, SubmitOutcome};
pub use models::{ExamMetadata, Question, RawQuestion};
pub use orchestrator::{DiscoveryMode, ExamScraper};
pub use utils::retry::{with_retry, RetryPolicy};
