use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::domain::JobRecord;
use crate::parser::{child_elements, element_text};

/// Cells a row needs before it is considered a posting.
const MIN_CELLS: usize = 7;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid table selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid link selector"));

/// Result of parsing one search-results page.
#[derive(Debug, Default)]
pub struct ParsedListing {
    /// False when the page had no results table at all (typically a
    /// bot-challenge page or a layout change).
    pub table_found: bool,
    pub records: Vec<JobRecord>,
    pub skipped_rows: usize,
}

#[derive(Debug, Error)]
enum RowError {
    #[error("row has {0} cells")]
    TooFewCells(usize),
    #[error("title cell has no link")]
    MissingLink,
    #[error("link has no href")]
    MissingHref,
    #[error("bad link: {0}")]
    BadLink(#[from] url::ParseError),
    #[error("empty requisition id")]
    MissingRequisitionId,
}

/// Parse the results table of a listing page, in row order.
///
/// Rows that cannot be parsed are skipped one at a time; they never abort
/// the rest of the table.
pub fn parse_listing(html: &str, base_url: &Url) -> ParsedListing {
    let document = Html::parse_document(html);

    let Some(table) = document.select(&TABLE).next() else {
        tracing::error!("Could not find jobs table on the listing page");
        return ParsedListing::default();
    };

    let mut listing = ParsedListing {
        table_found: true,
        ..Default::default()
    };

    let rows = child_elements(table, "tbody")
        .next()
        .into_iter()
        .flat_map(|tbody| child_elements(tbody, "tr"));

    for (index, row) in rows.enumerate() {
        match parse_row(row, base_url) {
            Ok(record) => listing.records.push(record),
            Err(e) => {
                tracing::debug!("Skipping listing row {}: {}", index + 1, e);
                listing.skipped_rows += 1;
            }
        }
    }

    tracing::info!(
        "Found {} job listings ({} rows skipped)",
        listing.records.len(),
        listing.skipped_rows
    );
    listing
}

fn parse_row(row: ElementRef<'_>, base_url: &Url) -> Result<JobRecord, RowError> {
    let cells: Vec<ElementRef<'_>> = child_elements(row, "td").collect();
    if cells.len() < MIN_CELLS {
        return Err(RowError::TooFewCells(cells.len()));
    }

    let link = cells[0].select(&LINK).next().ok_or(RowError::MissingLink)?;
    let href = link.value().attr("href").ok_or(RowError::MissingHref)?;
    let url = base_url.join(href.trim())?;

    let requisition_id = element_text(cells[1]);
    if requisition_id.is_empty() {
        return Err(RowError::MissingRequisitionId);
    }

    Ok(JobRecord {
        title: element_text(link),
        url: url.to_string(),
        requisition_id,
        category: collapse_whitespace(&element_text(cells[2])),
        department: element_text(cells[3]),
        employment_type: element_text(cells[4]),
        location: element_text(cells[5]),
        closing_date: element_text(cells[6]),
        postsecondary_required: cells.get(7).map(|cell| element_text(*cell)),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
