//! Calendar source for recency tags.

use chrono::NaiveDate;

/// `DD-MM-YYYY`, the persisted format of the `LastUsedDate` tag.
pub const TAG_DATE_FORMAT: &str = "%d-%m-%Y";

/// Supplies the current calendar day.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The caller's local calendar day.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Render a date the way it is stored in the tag.
pub fn format_tag_date(date: NaiveDate) -> String {
    date.format(TAG_DATE_FORMAT).to_string()
}
