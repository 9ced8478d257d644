//! Markup parser
//!
//! Turns one captured page's markup into a `RawQuestion`, and the first
//! page's markup into best-effort `ExamMetadata`. Parsing is pure and
//! synchronous; "no match" is a typed `None`, never an error, so the caller
//! can skip one page and keep processing the batch.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::models::{ExamMetadata, RawAlternative, RawQuestion, RawQuestionMetadata};
use crate::utils::logging::truncate_text;

/// Class carried by the alternative that the site reveals as correct.
const SUCCESS_MARKER_CLASS: &str = "alert-success";

pub struct QuestionParser {
    base_url: Url,
    year_re: Regex,
    institution_re: Regex,
    question_number_re: Regex,
}

impl QuestionParser {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            year_re: Regex::new(r"\b(19|20)\d{2}\b")?,
            institution_re: Regex::new(r"\b[A-Z]{2,}(?:-[A-Z]+)*\b")?,
            question_number_re: Regex::new(r"(?i)questão\s+(\d+)")?,
        })
    }

    /// Best-effort exam metadata from the first extracted page.
    ///
    /// A heading sources the title and year; the document title is the
    /// fallback for an institution code and a year. Missing patterns leave
    /// the field `None`.
    pub fn parse_exam_metadata(&self, markup: &str) -> ExamMetadata {
        let document = Html::parse_document(markup);
        let mut metadata = ExamMetadata::default();

        if let Some(heading) = first_match(&document, &["h1", "h2", "h3"]) {
            let text = normalized_text(&heading);
            if !text.is_empty() {
                metadata.year = self.find_year(&text);
                metadata.title = Some(text);
            }
        }

        if let Some(title_el) = select_first(&document, "title") {
            let doc_title = normalized_text(&title_el);
            if metadata.institution.is_none() {
                metadata.institution = self
                    .institution_re
                    .find(&doc_title)
                    .map(|m| m.as_str().to_string());
            }
            if metadata.year.is_none() {
                metadata.year = self.find_year(&doc_title);
            }
        }

        if let Some(institution) = &metadata.institution {
            metadata.tags.push(institution.clone());
        }

        debug!(
            "exam metadata: title={:?} institution={:?} year={:?}",
            metadata.title, metadata.institution, metadata.year
        );
        metadata
    }

    /// Parse one question page. `None` when the page is missing the
    /// structure we expect (no statement, no alternatives).
    pub fn parse_single_question(&self, markup: &str) -> Option<RawQuestion> {
        let document = Html::parse_document(markup);

        let heading = first_match(&document, &["h1", "h2", "h3"])?;
        let statement = self.collect_statement(&heading);
        if statement.is_empty() {
            warn!("question page has an empty statement, skipping");
            return None;
        }
        debug!("statement: {}", truncate_text(&statement, 80));

        let alternatives = self.parse_alternatives(&document);
        if alternatives.is_empty() {
            warn!("question page has no alternatives, skipping");
            return None;
        }

        let correct_alternative_index = alternatives
            .iter()
            .position(|a| a.is_correct == Some(true))
            .map_or(-1, |i| i as i32);

        let image_urls = self.parse_images(&document);

        let question_number = self
            .question_number_re
            .captures(&normalized_text(&heading))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        Some(RawQuestion {
            statement,
            alternatives,
            correct_alternative_index,
            image_urls,
            metadata: RawQuestionMetadata { question_number },
        })
    }

    /// Walk the heading's following siblings, concatenating text until a
    /// form or image element starts the interactive part of the page.
    fn collect_statement(&self, heading: &ElementRef) -> String {
        let mut parts: Vec<String> = Vec::new();

        for sibling in heading.next_siblings() {
            if let Some(element) = ElementRef::wrap(sibling) {
                let name = element.value().name();
                if name == "form" || name == "img" {
                    break;
                }
                let text = normalized_text(&element);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }

        normalize_whitespace(&parts.join(" "))
    }

    fn parse_alternatives(&self, document: &Html) -> Vec<RawAlternative> {
        let selector = match Selector::parse(".radio") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        document
            .select(&selector)
            .enumerate()
            .map(|(order, element)| {
                let is_correct = element
                    .value()
                    .has_class(SUCCESS_MARKER_CLASS, scraper::CaseSensitivity::AsciiCaseInsensitive)
                    .then_some(true);
                RawAlternative {
                    text: normalized_text(&element),
                    order,
                    is_correct,
                }
            })
            .collect()
    }

    /// Question images carry the site's responsive marker class; relative
    /// sources resolve against the fixed base URL.
    fn parse_images(&self, document: &Html) -> Vec<String> {
        let selector = match Selector::parse("img.img-responsive") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        document
            .select(&selector)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| !src.is_empty())
            .filter_map(|src| self.base_url.join(src).ok())
            .map(|u| u.to_string())
            .collect()
    }

    fn find_year(&self, text: &str) -> Option<u16> {
        self.year_re
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
    }
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn first_match<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|s| select_first(document, s))
}

fn normalized_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
