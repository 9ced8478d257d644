//! Schema validator
//!
//! Pure, side-effect-free validation of canonical `Question` records.
//! Batch validation never stops at the first bad record; it accumulates a
//! structured error report keyed by record index.

use serde::Serialize;

use crate::models::question::{DIFFICULTIES, STATUSES};
use crate::models::Question;

const MIN_ALTERNATIVES: usize = 2;
const MAX_ALTERNATIVES: usize = 10;
const MIN_YEAR: u16 = 1900;
const MAX_YEAR: u16 = 2100;

#[derive(Clone, Debug, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecordErrors {
    pub index: usize,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchValidationResult {
    pub total: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub errors: Vec<RecordErrors>,
}

/// Validate one record against the canonical `Question` shape.
pub fn validate(question: &Question) -> ValidationOutcome {
    let mut errors = Vec::new();

    if question.id.trim().is_empty() {
        errors.push("id must not be empty".to_string());
    }
    if question.statement.trim().is_empty() {
        errors.push("statement must not be empty".to_string());
    }

    let count = question.alternatives.len();
    if !(MIN_ALTERNATIVES..=MAX_ALTERNATIVES).contains(&count) {
        errors.push(format!(
            "question must have between {MIN_ALTERNATIVES} and {MAX_ALTERNATIVES} alternatives, found {count}"
        ));
    }

    for alternative in &question.alternatives {
        if alternative.id.trim().is_empty() {
            errors.push(format!("alternative {} has an empty id", alternative.order));
        }
        if alternative.text.trim().is_empty() {
            errors.push(format!("alternative {} has empty text", alternative.order));
        }
    }

    let correct_flags = question.alternatives.iter().filter(|a| a.is_correct).count();
    if correct_flags > 1 {
        errors.push(format!("{correct_flags} alternatives are flagged correct, expected at most 1"));
    }

    if let Some(correct_id) = &question.correct_alternative_id {
        if !question.alternatives.iter().any(|a| &a.id == correct_id) {
            errors.push(format!("correct_alternative_id '{correct_id}' does not match any alternative"));
        }
    }

    if !STATUSES.contains(&question.status.as_str()) {
        errors.push(format!("status '{}' is not one of {:?}", question.status, STATUSES));
    }

    if let Some(difficulty) = &question.difficulty {
        if !DIFFICULTIES.contains(&difficulty.as_str()) {
            errors.push(format!("difficulty '{difficulty}' is not one of {DIFFICULTIES:?}"));
        }
    }

    if let Some(rating) = question.average_rating {
        if !(0.0..=5.0).contains(&rating) {
            errors.push(format!("average_rating {rating} is outside 0..=5"));
        }
    }

    if let Some(year) = question.year {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            errors.push(format!("year {year} is outside {MIN_YEAR}..={MAX_YEAR}"));
        }
    }

    ValidationOutcome {
        valid: errors.is_empty(),
        errors,
    }
}

/// Validate a whole batch, accumulating per-index errors.
pub fn validate_batch(questions: &[Question]) -> BatchValidationResult {
    let mut result = BatchValidationResult {
        total: questions.len(),
        valid_count: 0,
        invalid_count: 0,
        errors: Vec::new(),
    };

    for (index, question) in questions.iter().enumerate() {
        let outcome = validate(question);
        if outcome.valid {
            result.valid_count += 1;
        } else {
            result.invalid_count += 1;
            result.errors.push(RecordErrors {
                index,
                errors: outcome.errors,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alternative, QuestionMetadata};

    fn question(alternative_count: usize) -> Question {
        let alternatives: Vec<Alternative> = (0..alternative_count)
            .map(|order| Alternative {
                id: format!("q-abcd1234-0-a{order}"),
                text: format!("alternativa {order}"),
                is_correct: order == 0,
                order,
            })
            .collect();
        Question {
            id: "q-abcd1234-0".to_string(),
            statement: "Enunciado da questão".to_string(),
            correct_alternative_id: alternatives.first().map(|a| a.id.clone()),
            alternatives,
            tags: vec![],
            source: "SUS-SP".to_string(),
            year: Some(2015),
            difficulty: None,
            average_rating: None,
            image_urls: vec![],
            status: "draft".to_string(),
            is_active: false,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            metadata: QuestionMetadata {
                scraped_at: "2024-01-01T00:00:00Z".to_string(),
                scraper_version: "0.1.0".to_string(),
            },
        }
    }

    #[test]
    fn two_alternatives_is_the_valid_lower_bound() {
        assert!(!validate(&question(1)).valid);
        assert!(validate(&question(2)).valid);
    }

    #[test]
    fn rating_five_is_valid_five_point_one_is_not() {
        let mut q = question(4);
        q.average_rating = Some(5.0);
        assert!(validate(&q).valid);

        q.average_rating = Some(5.1);
        let outcome = validate(&q);
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("average_rating"));
    }

    #[test]
    fn year_bounds_are_enforced_when_present() {
        let mut q = question(4);
        q.year = Some(1899);
        assert!(!validate(&q).valid);
        q.year = Some(2100);
        assert!(validate(&q).valid);
        q.year = None;
        assert!(validate(&q).valid);
    }

    #[test]
    fn correct_alternative_id_must_reference_a_real_alternative() {
        let mut q = question(4);
        q.correct_alternative_id = Some("q-ffffffff-9-a0".to_string());
        assert!(!validate(&q).valid);

        q.correct_alternative_id = None;
        // Unknown answer is a legal state.
        q.alternatives.iter_mut().for_each(|a| a.is_correct = false);
        assert!(validate(&q).valid);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut q = question(4);
        q.status = "pending".to_string();
        assert!(!validate(&q).valid);
    }

    #[test]
    fn batch_accumulates_errors_by_index_and_never_stops_early() {
        let questions = vec![question(4), question(1), question(2), question(11)];
        let result = validate_batch(&questions);

        assert_eq!(result.total, 4);
        assert_eq!(result.valid_count, 2);
        assert_eq!(result.invalid_count, 2);
        let indices: Vec<usize> = result.errors.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
