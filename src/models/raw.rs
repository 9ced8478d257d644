use serde::{Deserialize, Serialize};

/// Exam-level metadata derived once from the first extracted page.
///
/// Every field is best-effort: a pattern that does not match leaves the
/// field `None`, never an error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExamMetadata {
    pub title: Option<String>,
    pub institution: Option<String>,
    pub year: Option<u16>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One answer choice as read from the page markup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawAlternative {
    pub text: String,
    /// 0-based position in container scan order.
    pub order: usize,
    /// `None` means "unknown" (the reveal step never ran or failed),
    /// not "false".
    pub is_correct: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawQuestionMetadata {
    pub question_number: Option<u32>,
}

/// One question as parsed from a single page, before transformation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawQuestion {
    pub statement: String,
    pub alternatives: Vec<RawAlternative>,
    /// Index into `alternatives`, or -1 when no correct answer was revealed.
    pub correct_alternative_index: i32,
    /// Absolute source URLs.
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub metadata: RawQuestionMetadata,
}

impl RawQuestion {
    /// The revealed correct alternative, if the index is known and in range.
    pub fn correct_alternative(&self) -> Option<&RawAlternative> {
        usize::try_from(self.correct_alternative_index)
            .ok()
            .and_then(|i| self.alternatives.get(i))
    }
}
