//! HTML parsing for the two page kinds the site serves.
//!
//! - [`listing`]: the search-results table, one [`JobRecord`](crate::domain::JobRecord) per row
//! - [`detail`]: anchor-phrase extraction from a posting's detail page

pub mod detail;
pub mod listing;

pub use detail::extract_details;
pub use listing::{parse_listing, ParsedListing};

use scraper::ElementRef;

/// Direct element children of `parent` with the given tag name.
fn child_elements<'a>(
    parent: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == name)
}

/// Text content of an element: each text node trimmed, empty nodes
/// dropped, joined by single spaces.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
