use std::sync::LazyLock;

use regex::Regex;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d{2})?").expect("valid number regex"));

/// Split salary text into `(min, max)`.
///
/// Currency and grouping symbols are stripped and the first two numbers
/// become min and max, in the order they appear. Fewer than two numbers
/// yields `(None, None)`. No ordering between min and max is enforced.
pub fn parse_salary_range(text: &str) -> (Option<f64>, Option<f64>) {
    let cleaned = text.replace(['$', ','], "");
    let numbers: Vec<f64> = NUMBER
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().parse().ok())
        .take(2)
        .collect();

    match numbers.as_slice() {
        [min, max] => (Some(*min), Some(*max)),
        _ => (None, None),
    }
}
