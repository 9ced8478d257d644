//! Record transformer
//!
//! Converts a parsed `RawQuestion` plus exam metadata into the canonical
//! `Question`. IDs are content hashes so re-scraping identical content is
//! idempotent; the position suffix disambiguates structurally identical
//! duplicates within one run.

use anyhow::{bail, Result};
use regex::Regex;
use tracing::{error, info};

use crate::models::{Alternative, ExamMetadata, Question, QuestionMetadata, RawQuestion};

/// Placeholder markers the site leaves where an image belongs.
const IMAGE_MARKER_PATTERN: &str = r"(?i)\(VER IMAGEM\)|\[IMAGEM\]";

pub struct QuestionTransformer {
    scraper_version: String,
    marker_re: Regex,
}

impl QuestionTransformer {
    pub fn new(scraper_version: &str) -> Result<Self> {
        Ok(Self {
            scraper_version: scraper_version.to_string(),
            marker_re: Regex::new(IMAGE_MARKER_PATTERN)?,
        })
    }

    /// Transform one raw record. `position_index` is the record's position
    /// in the extraction order and becomes part of the id.
    pub fn transform(
        &self,
        raw: &RawQuestion,
        exam: &ExamMetadata,
        position_index: usize,
    ) -> Result<Question> {
        if raw.statement.trim().is_empty() {
            bail!("raw question {} has an empty statement", position_index);
        }
        if raw.alternatives.len() < 2 {
            bail!(
                "raw question {} has {} alternatives, need at least 2",
                position_index,
                raw.alternatives.len()
            );
        }

        let id = question_id(&raw.statement, raw.alternatives.iter().map(|a| a.text.as_str()), position_index);

        let alternatives: Vec<Alternative> = raw
            .alternatives
            .iter()
            .map(|a| Alternative {
                id: format!("{}-a{}", id, a.order),
                text: a.text.clone(),
                is_correct: a.is_correct.unwrap_or(false),
                order: a.order,
            })
            .collect();

        // No guessing: an unrevealed answer stays None instead of
        // defaulting to the first alternative.
        let correct_alternative_id = raw
            .correct_alternative()
            .map(|a| format!("{}-a{}", id, a.order));

        let now = chrono::Utc::now().to_rfc3339();

        Ok(Question {
            id,
            statement: raw.statement.clone(),
            alternatives,
            correct_alternative_id,
            tags: exam.tags.clone(),
            source: exam
                .institution
                .clone()
                .or_else(|| exam.title.clone())
                .unwrap_or_else(|| "Desconhecida".to_string()),
            year: exam.year,
            difficulty: None,
            average_rating: None,
            image_urls: raw.image_urls.clone(),
            status: "draft".to_string(),
            is_active: false,
            created_at: now.clone(),
            updated_at: now,
            metadata: QuestionMetadata {
                scraped_at: chrono::Utc::now().to_rfc3339(),
                scraper_version: self.scraper_version.clone(),
            },
        })
    }

    /// Transform a whole batch, dropping (and logging) records that fail.
    /// One bad record never aborts the batch.
    pub fn transform_batch(&self, raws: &[RawQuestion], exam: &ExamMetadata) -> Vec<Question> {
        let mut questions = Vec::with_capacity(raws.len());
        let mut failures = 0usize;

        for (index, raw) in raws.iter().enumerate() {
            match self.transform(raw, exam, index) {
                Ok(question) => questions.push(question),
                Err(e) => {
                    failures += 1;
                    error!("dropping question at position {}: {}", index, e);
                }
            }
        }

        info!(
            "✓ transformed {}/{} questions ({} dropped)",
            questions.len(),
            raws.len(),
            failures
        );
        questions
    }

    /// Splice local image references into a statement.
    ///
    /// Each placeholder marker, in order, consumes one image; leftover
    /// images are dropped. Without any marker, all references are appended
    /// after the statement separated by a blank line. Must be called exactly
    /// once per question, after local paths are resolved; a second call
    /// would double-insert.
    pub fn insert_images_into_statement(&self, statement: &str, image_refs: &[String]) -> String {
        if image_refs.is_empty() {
            return statement.to_string();
        }

        if self.marker_re.is_match(statement) {
            let mut out = statement.to_string();
            for image in image_refs {
                if !self.marker_re.is_match(&out) {
                    break;
                }
                let tag = image_tag(image);
                out = self.marker_re.replace(&out, tag.as_str()).into_owned();
            }
            return out;
        }

        let mut out = statement.to_string();
        for image in image_refs {
            out.push_str("\n\n");
            out.push_str(&image_tag(image));
        }
        out
    }
}

/// `q-` + first 8 hex chars of md5(statement + alternative texts) + `-` +
/// position.
fn question_id<'a>(
    statement: &str,
    alternative_texts: impl Iterator<Item = &'a str>,
    position_index: usize,
) -> String {
    let mut content = statement.to_string();
    for text in alternative_texts {
        content.push_str(text);
    }
    let digest = format!("{:x}", md5::compute(content.as_bytes()));
    format!("q-{}-{}", &digest[..8], position_index)
}

fn image_tag(reference: &str) -> String {
    format!("<img src=\"{reference}\">")
}
