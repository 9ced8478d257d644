//! Domain records
//!
//! ## Module layout
//!
//! - `raw` - records produced by the markup parser, before transformation
//! - `question` - the canonical `Question` shape persisted downstream
//!
//! Raw records are created once per page and never mutated; the transformer
//! always produces a fresh canonical record.

pub mod question;
pub mod raw;

pub use question::{Alternative, Question, QuestionMetadata};
pub use raw::{ExamMetadata, RawAlternative, RawQuestion, RawQuestionMetadata};
