//! Application pipeline
//!
//! Wires the full chain: extraction state machine → parser → transformer →
//! validator → image downloader → image inlining → JSON output. Owns the
//! browser for the lifetime of the run.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use serde::Serialize;
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::ScrapeError;
use crate::images::ImageDownloader;
use crate::infrastructure::CdpDriver;
use crate::models::Question;
use crate::orchestrator::{DiscoveryMode, ExamScraper};
use crate::parser::QuestionParser;
use crate::progress::StdoutProgress;
use crate::transformer::QuestionTransformer;
use crate::validator;

/// Aggregate run outcome. Zero extracted questions is an error, not a
/// report; this struct always describes a run that produced output.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScrapeReport {
    pub questions_discovered: usize,
    pub questions_extracted: usize,
    pub questions_parsed: usize,
    pub questions_valid: usize,
    pub questions_invalid: usize,
    pub questions_with_answer: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
    /// Set when anything was lost along the way (skipped questions,
    /// invalid records, failed images).
    pub partial_failure: bool,
}

pub struct App {
    config: Config,
    _browser: Arc<Browser>,
    scraper: ExamScraper<CdpDriver>,
    parser: QuestionParser,
    transformer: QuestionTransformer,
    downloader: ImageDownloader,
}

impl App {
    /// Launch the browser and assemble the pipeline components.
    pub async fn initialize(config: Config) -> Result<Self> {
        let browser = Arc::new(browser::launch_browser(&config.browser).await?);
        let driver = CdpDriver::new(browser.clone(), config.browser.clone()).await?;
        let scraper = ExamScraper::new(driver, config.clone(), Arc::new(StdoutProgress));

        Ok(Self {
            parser: QuestionParser::new(&config.base_url)?,
            transformer: QuestionTransformer::new(&config.scraper_version)?,
            downloader: ImageDownloader::new(&config)?,
            config,
            _browser: browser,
            scraper,
        })
    }

    /// Run the full pipeline for one exam and write the question JSON.
    pub async fn run(&mut self, start_url: &str) -> Result<ScrapeReport> {
        let mode = DiscoveryMode::from_start_url(start_url);
        info!("discovery mode: {:?}", mode);

        let markups = self
            .scraper
            .extract_question_markup(start_url, mode, self.config.question_limit)
            .await?;

        let extracted = markups.iter().filter(|m| !m.is_empty()).count();
        if extracted == 0 {
            // Zero successes is a distinct terminal outcome, not a report
            // with empty fields.
            return Err(ScrapeError::NoQuestionsFound(start_url.to_string()).into());
        }

        let mut report = ScrapeReport {
            questions_discovered: markups.len(),
            questions_extracted: extracted,
            ..Default::default()
        };

        // Exam metadata comes from the first successfully captured page.
        let first_markup = markups
            .iter()
            .find(|m| !m.is_empty())
            .context("no non-empty markup after extraction")?;
        let exam = self.parser.parse_exam_metadata(first_markup);

        let raws: Vec<_> = markups
            .iter()
            .filter(|m| !m.is_empty())
            .filter_map(|m| self.parser.parse_single_question(m))
            .collect();
        report.questions_parsed = raws.len();
        info!("✓ parsed {}/{} captured pages", raws.len(), extracted);

        let questions = self.transformer.transform_batch(&raws, &exam);
        let questions = dedupe_by_content(questions);

        let validation = validator::validate_batch(&questions);
        report.questions_valid = validation.valid_count;
        report.questions_invalid = validation.invalid_count;
        for record in &validation.errors {
            warn!(
                "⚠️ question {} failed validation: {}",
                record.index,
                record.errors.join("; ")
            );
        }

        let mut valid: Vec<Question> = questions
            .into_iter()
            .filter(|q| validator::validate(q).valid)
            .collect();
        report.questions_with_answer = valid
            .iter()
            .filter(|q| q.correct_alternative_id.is_some())
            .count();

        self.resolve_images(&mut valid, &mut report).await;

        self.write_output(&valid)?;

        report.partial_failure = report.questions_extracted < report.questions_discovered
            || report.questions_parsed < report.questions_extracted
            || report.questions_invalid > 0
            || report.images_failed > 0;

        log_final_stats(&report, &self.config.output_file);
        Ok(report)
    }

    /// Download every referenced image and splice local paths back into
    /// each statement. The inlining step runs exactly once per question.
    async fn resolve_images(&self, questions: &mut [Question], report: &mut ScrapeReport) {
        let urls: Vec<String> = {
            let mut seen = HashSet::new();
            questions
                .iter()
                .flat_map(|q| q.image_urls.iter())
                .filter(|u| seen.insert(u.as_str().to_string()))
                .cloned()
                .collect()
        };
        if urls.is_empty() {
            return;
        }

        let results = self.downloader.download_batch(&urls).await;
        report.images_downloaded = results.iter().filter(|r| r.success).count();
        report.images_failed = results.len() - report.images_downloaded;

        let local_paths: HashMap<&str, &str> = results
            .iter()
            .filter_map(|r| {
                r.local_path
                    .as_deref()
                    .map(|path| (r.url.as_str(), path))
            })
            .collect();

        for question in questions.iter_mut() {
            if question.image_urls.is_empty() {
                continue;
            }
            let resolved: Vec<String> = question
                .image_urls
                .iter()
                .filter_map(|url| local_paths.get(url.as_str()))
                .map(|path| path.to_string())
                .collect();

            question.statement = self
                .transformer
                .insert_images_into_statement(&question.statement, &resolved);
            // Per URL: either the local path (downloaded) or the original
            // absolute URL (failed), never a mix for the same URL.
            question.image_urls = question
                .image_urls
                .iter()
                .map(|url| {
                    local_paths
                        .get(url.as_str())
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| url.clone())
                })
                .collect();
        }
    }

    fn write_output(&self, questions: &[Question]) -> Result<()> {
        let path = Path::new(&self.config.output_file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create output dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(questions)?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!("💾 wrote {} questions to {}", questions.len(), path.display());
        Ok(())
    }
}

/// Keep the first occurrence of each content hash; re-scraped duplicates
/// collapse to one record.
fn dedupe_by_content(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    let before = questions.len();
    let questions: Vec<Question> = questions
        .into_iter()
        .filter(|q| seen.insert(q.content_hash().to_string()))
        .collect();
    if questions.len() < before {
        info!("✓ dropped {} duplicate questions", before - questions.len());
    }
    questions
}

fn log_final_stats(report: &ScrapeReport, output_file: &str) {
    info!("{}", "=".repeat(60));
    info!("📊 run complete");
    info!(
        "✅ questions: {}/{} extracted, {} valid ({} with answer)",
        report.questions_extracted,
        report.questions_discovered,
        report.questions_valid,
        report.questions_with_answer
    );
    if report.questions_invalid > 0 {
        info!("❌ invalid records: {}", report.questions_invalid);
    }
    info!(
        "🖼️ images: {} downloaded, {} failed",
        report.images_downloaded, report.images_failed
    );
    if report.partial_failure {
        warn!("⚠️ run finished with partial failures");
    }
    info!("output: {}", output_file);
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alternative, QuestionMetadata};

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            statement: "Enunciado".to_string(),
            alternatives: vec![
                Alternative {
                    id: format!("{id}-a0"),
                    text: "A".to_string(),
                    is_correct: false,
                    order: 0,
                },
                Alternative {
                    id: format!("{id}-a1"),
                    text: "B".to_string(),
                    is_correct: false,
                    order: 1,
                },
            ],
            correct_alternative_id: None,
            tags: vec![],
            source: "SUS-SP".to_string(),
            year: Some(2015),
            difficulty: None,
            average_rating: None,
            image_urls: vec![],
            status: "draft".to_string(),
            is_active: false,
            created_at: String::new(),
            updated_at: String::new(),
            metadata: QuestionMetadata {
                scraped_at: String::new(),
                scraper_version: "0.1.0".to_string(),
            },
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence_per_content_hash() {
        let questions = vec![
            question("q-aaaa1111-0"),
            question("q-aaaa1111-1"), // same content, later position
            question("q-bbbb2222-2"),
        ];
        let deduped = dedupe_by_content(questions);
        let ids: Vec<&str> = deduped.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q-aaaa1111-0", "q-bbbb2222-2"]);
    }
}
