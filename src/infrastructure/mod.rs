//! Infrastructure layer
//!
//! Owns the scarce page resource and exposes narrow capabilities over it.
//! Nothing in here knows about questions or exams; the orchestrator talks
//! to a `PageDriver`, never to a raw CDP page.

pub mod page_driver;

pub use page_driver::{CdpDriver, PageDriver, PageLink, SubmitOutcome};
