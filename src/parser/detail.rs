use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::domain::JobDetails;
use crate::normalizer::parse_salary_range;
use crate::parser::element_text;

const SUMMARY_LIMIT: usize = 1000;
const DUTIES_LIMIT: usize = 2000;
const REQUIREMENTS_LIMIT: usize = 2000;

/// Characters after `Posting Details:` searched for a salary.
const POSTING_DETAILS_WINDOW: usize = 500;
const POSTING_DETAILS_MARKER: &str = "Posting Details:";

static SALARY_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Salary:\s*\$?([\d,]+(?:\.\d{2})?)\s*(?:\n|$)").expect("valid salary regex")
});
static SALARY_LABELLED_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Salary:\s*\$?([\d,]+(?:\.\d{2})?)\s*-\s*\$?([\d,]+(?:\.\d{2})?)")
        .expect("valid salary regex")
});
static SALARY_BARE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$[\d,]+(?:\.\d{2})?)\s*-\s*(\$[\d,]+(?:\.\d{2})?)").expect("valid salary regex")
});
static SALARY_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Salary:\s*\$?([\d,]+(?:\.\d{2})?)").expect("valid salary regex")
});
static GRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Grade:\s*(\d+)").expect("valid grade regex"));

static SUMMARY_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Job Summary:").expect("valid heading regex"));
static DUTIES_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Job Duties:").expect("valid heading regex"));
static REQUIREMENTS_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Knowledge, Skills|Requirements:").expect("valid heading regex")
});

/// Pull the supplementary fields out of a job detail page.
///
/// Extraction searches for anchor phrases rather than fixed positions, so
/// each field is found (or not) independently of the others.
pub fn extract_details(html: &str) -> JobDetails {
    let document = Html::parse_document(html);
    let text = page_text(&document);

    let mut details = JobDetails::default();

    if let Some(salary) = extract_salary(&text) {
        let (min, max) = parse_salary_range(&salary);
        details.salary_text = Some(salary);
        details.salary_min = min;
        details.salary_max = max;
    }

    details.grade = GRADE.captures(&text).map(|caps| caps[1].to_string());
    details.job_summary = section_after(&document, &SUMMARY_HEADING, SUMMARY_LIMIT);
    details.job_duties = section_after(&document, &DUTIES_HEADING, DUTIES_LIMIT);
    details.requirements = section_after(&document, &REQUIREMENTS_HEADING, REQUIREMENTS_LIMIT);

    details
}

/// First successful salary pattern wins; later ones are not tried.
fn extract_salary(text: &str) -> Option<String> {
    if let Some(caps) = SALARY_SINGLE.captures(text) {
        return Some(format!("${}", strip_amount(&caps[1])));
    }

    for pattern in [&*SALARY_LABELLED_RANGE, &*SALARY_BARE_RANGE] {
        if let Some(caps) = pattern.captures(text) {
            return Some(format!(
                "${} - ${}",
                strip_amount(&caps[1]),
                strip_amount(&caps[2])
            ));
        }
    }

    let start = text.find(POSTING_DETAILS_MARKER)?;
    let window: String = text[start..].chars().take(POSTING_DETAILS_WINDOW).collect();
    SALARY_ANYWHERE
        .captures(&window)
        .map(|caps| format!("${}", strip_amount(&caps[1])))
}

fn strip_amount(amount: &str) -> String {
    amount.replace(['$', ','], "")
}

/// All text outside `<script>`/`<style>`, concatenated in document order.
fn page_text(document: &Html) -> String {
    document
        .tree
        .root()
        .descendants()
        .filter(|node| !is_code(node.parent().map(|p| p.value())))
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .collect()
}

fn is_code(parent: Option<&Node>) -> bool {
    parent
        .and_then(Node::as_element)
        .is_some_and(|e| e.name() == "script" || e.name() == "style")
}

/// Text of the element following the one whose text matches `heading`.
fn section_after(document: &Html, heading: &Regex, limit: usize) -> Option<String> {
    let node = document
        .tree
        .root()
        .descendants()
        .filter(|node| !is_code(node.parent().map(|p| p.value())))
        .find(|node| node.value().as_text().is_some_and(|t| heading.is_match(t)))?;

    let parent = node.parent()?;
    let sibling = parent.next_siblings().find_map(ElementRef::wrap)?;

    let text: String = element_text(sibling).chars().take(limit).collect();
    (!text.is_empty()).then_some(text)
}
