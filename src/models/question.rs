use serde::{Deserialize, Serialize};

/// Allowed `Question::status` values.
pub const STATUSES: &[&str] = &["draft", "published", "archived"];

/// Allowed `Question::difficulty` values.
pub const DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];

/// One answer choice of a canonical question.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alternative {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
    /// 0-based display order.
    pub order: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionMetadata {
    pub scraped_at: String,
    pub scraper_version: String,
}

/// The canonical question record persisted downstream.
///
/// `id` is a deterministic content hash of statement + alternative texts
/// suffixed with the record's position, so re-scraping identical content
/// yields the same id. After creation only `image_urls` and `statement`
/// are rewritten, exactly once, when local image paths become known.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub statement: String,
    pub alternatives: Vec<Alternative>,
    /// `None` when the reveal step never identified a correct alternative.
    pub correct_alternative_id: Option<String>,
    pub tags: Vec<String>,
    pub source: String,
    pub year: Option<u16>,
    pub difficulty: Option<String>,
    pub average_rating: Option<f64>,
    pub image_urls: Vec<String>,
    pub status: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub metadata: QuestionMetadata,
}

impl Question {
    /// The content-hash segment of the id (`q-<hash>-<position>`),
    /// used to deduplicate structurally identical questions.
    pub fn content_hash(&self) -> &str {
        self.id.split('-').nth(1).unwrap_or(&self.id)
    }
}
