//! Locale-aware rendering of amounts and dates.
//!
//! Balance arithmetic stays in integer cents everywhere; these helpers only
//! turn cents into display strings, so no floating point is involved at any
//! point.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::user::Locale;

const DATE_FORMAT_DE: &[BorrowedFormatItem] = format_description!("[day].[month].[year]");

/// Format an amount of euro cents as `1,234.56 EUR` (English) or
/// `1.234,56 EUR` (German).
pub fn format_cents(cents: i64, locale: Locale) -> String {
    let (thousands, decimal) = match locale {
        Locale::English => (',', '.'),
        Locale::German => ('.', ','),
    };

    let magnitude = cents.unsigned_abs();
    let euros = magnitude / 100;
    let fraction = magnitude % 100;

    let digits = euros.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(thousands);
        }
        grouped.push(digit);
    }

    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}{grouped}{decimal}{fraction:02} EUR")
}

/// Format a date as `2026-02-01` (English) or `01.02.2026` (German).
pub fn format_date(date: Date, locale: Locale) -> String {
    match locale {
        Locale::English => date.to_string(),
        // The format description contains no invalid components, so
        // formatting cannot fail.
        Locale::German => date
            .format(DATE_FORMAT_DE)
            .unwrap_or_else(|_| date.to_string()),
    }
}


#[cfg(test)]
mod format_date_tests {
    use time::macros::date;

    use crate::user::Locale;

    use super::format_date;

    #[test]
    fn english_is_iso() {
        assert_eq!(format_date(date!(2026 - 02 - 01), Locale::English), "2026-02-01");
    }

    #[test]
    fn german_is_day_month_year() {
        assert_eq!(format_date(date!(2026 - 02 - 01), Locale::German), "01.02.2026");
    }
}
