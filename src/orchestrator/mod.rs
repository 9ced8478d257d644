//! Orchestration layer
//!
//! ## Responsibilities
//!
//! The extraction state machine owns the browser tab and drives the whole
//! navigate → challenge-wait → per-question extraction loop. It is the only
//! component that touches the `PageDriver`; everything below it works on
//! plain data.
//!
//! ## Layering
//!
//! ```text
//! app (parse → transform → validate → images)
//!     ↓
//! orchestrator::ExamScraper (markup list, one entry per question)
//!     ↓
//! infrastructure::PageDriver (narrow tab capabilities)
//! ```

pub mod exam_scraper;

pub use exam_scraper::{DiscoveryMode, ExamScraper};
