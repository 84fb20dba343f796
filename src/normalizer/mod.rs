//! Pure conversions from scraped substrings to typed values.

mod date;
mod salary;

pub use date::parse_date;
pub use salary::parse_salary_range;
