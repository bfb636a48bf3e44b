//! Parsing German bank statement CSV exports.
//!
//! Statements use ';' as the delimiter, `dd.MM.yyyy` dates, decimal-comma
//! amounts and a free-form meta preamble that may carry `Alter Kontostand` /
//! `Neuer Kontostand` balance lines. Files arrive either UTF-8 or
//! windows-1252 encoded, with or without a BOM.

use time::{
    Date, PrimitiveDateTime, Time, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{
    Error,
    csv_import::text::{extract_after, find_ignore_ascii_case, trim_at_marker},
    transaction::{Transaction, TransactionBuilder},
};

const HEADER_BOOKING_DAY: &str = "Buchungstag";
const HEADER_VALUE_DATE: &str = "Wertstellung (Valuta)";
const HEADER_TRANSACTION_TYPE: &str = "Vorgang";
const HEADER_BOOKING_TEXT: &str = "Buchungstext";
const HEADER_AMOUNT: &str = "Umsatz in EUR";

const DATE_FORMAT_DE: &[BorrowedFormatItem] = format_description!("[day].[month].[year]");
const DATE_FORMAT_ISO: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// The transactions and balance fields found after parsing a CSV statement.
///
/// When the preamble carries either raw balance line, both derived fields are
/// populated: the missing one is reconstructed from the other and the sum of
/// the parsed transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    /// The account balance before the first transaction of the statement.
    pub start_balance_cents: Option<i64>,
    /// The account balance after the last transaction of the statement.
    pub current_balance_cents: Option<i64>,
    /// The transactions found in the statement, in file order. May be empty
    /// for balance-only snapshot exports.
    pub transactions: Vec<TransactionBuilder>,
}

/// Parse the raw bytes of an uploaded statement export.
///
/// # Errors
/// Returns [Error::InvalidCsv] if no statement header line is found or a
/// transaction row is malformed.
pub fn parse_statement(bytes: &[u8]) -> Result<ParsedStatement, Error> {
    let content = decode_content(bytes);
    let lines: Vec<&str> = content.lines().collect();

    let header_index = lines
        .iter()
        .position(|line| line.contains(HEADER_BOOKING_DAY) && line.contains(HEADER_AMOUNT))
        .ok_or_else(|| Error::InvalidCsv("CSV header not found".to_owned()))?;

    let (old_balance, new_balance) = parse_balance_lines(&lines);

    let data_section = lines[header_index..].join("\n");
    let transactions = parse_transactions(&data_section)?;

    let transaction_sum: i64 = transactions.iter().map(|tx| tx.amount_cents).sum();
    let start_balance_cents = match (old_balance, new_balance) {
        (Some(old), _) => Some(old),
        (None, Some(new)) => Some(new - transaction_sum),
        (None, None) => None,
    };
    let current_balance_cents = match (old_balance, new_balance) {
        (_, Some(new)) => Some(new),
        (Some(old), None) => Some(old + transaction_sum),
        (None, None) => None,
    };

    Ok(ParsedStatement {
        start_balance_cents,
        current_balance_cents,
        transactions,
    })
}

/// Decode statement bytes, accepting strict UTF-8 and falling back to
/// windows-1252, the encoding German banks still export with.
fn decode_content(bytes: &[u8]) -> String {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(without_bom) {
        Ok(text) => text.to_owned(),
        Err(_) => decode_windows_1252(without_bom),
    }
}

/// The characters windows-1252 maps into the 0x80..=0x9F range; every other
/// byte matches its Unicode code point.
const WINDOWS_1252_C1: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{8D}', '\u{017D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{9D}', '\u{017E}', '\u{0178}',
];

fn decode_windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0x80..=0x9F => WINDOWS_1252_C1[(byte - 0x80) as usize],
            _ => byte as char,
        })
        .collect()
}

/// Scan every line for the `Alter Kontostand` / `Neuer Kontostand` meta
/// lines. Returns `(old_balance_cents, new_balance_cents)`.
fn parse_balance_lines(lines: &[&str]) -> (Option<i64>, Option<i64>) {
    let mut old_balance = None;
    let mut new_balance = None;

    for line in lines {
        let trimmed = line.trim();
        if is_balance_line(trimmed, "Alter Kontostand")
            && let Some(parsed) = parse_balance_line(trimmed)
        {
            old_balance = Some(parsed);
        }
        if is_balance_line(trimmed, "Neuer Kontostand")
            && let Some(parsed) = parse_balance_line(trimmed)
        {
            new_balance = Some(parsed);
        }
    }

    (old_balance, new_balance)
}

fn is_balance_line(line: &str, key: &str) -> bool {
    line.starts_with(key) || line.strip_prefix('"').is_some_and(|rest| rest.starts_with(key))
}

fn parse_balance_line(line: &str) -> Option<i64> {
    let value = clean(line.split(';').nth(1)?);
    if value.is_empty() {
        return None;
    }
    parse_amount_cents(&value).ok()
}

fn parse_transactions(data_section: &str) -> Result<Vec<TransactionBuilder>, Error> {
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(data_section.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| Error::InvalidCsv(format!("CSV parsing failed: {error}")))?
        .clone();
    let column = |name: &str| headers.iter().position(|header| header.trim() == name);

    let booking_day_column = column(HEADER_BOOKING_DAY);
    let value_date_column = column(HEADER_VALUE_DATE);
    let transaction_type_column = column(HEADER_TRANSACTION_TYPE);
    let booking_text_column = column(HEADER_BOOKING_TEXT);
    let amount_column = column(HEADER_AMOUNT);

    let mut transactions = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let row_number = index + 1;
        let record =
            result.map_err(|error| Error::InvalidCsv(format!("CSV parsing failed: {error}")))?;

        if is_blank_record(&record) || is_trailing_meta_record(&record) {
            continue;
        }
        if record.len() < 5 {
            return Err(Error::InvalidCsv(format!(
                "Invalid CSV row {row_number}: expected at least 5 columns \
                 ({HEADER_BOOKING_DAY};{HEADER_VALUE_DATE};{HEADER_TRANSACTION_TYPE};\
                 {HEADER_BOOKING_TEXT};{HEADER_AMOUNT}) but got {} values",
                record.len()
            )));
        }

        let column_value =
            |column: Option<usize>| column.and_then(|index| record.get(index)).map(clean);

        let transaction_type = column_value(transaction_type_column).filter(|v| !v.is_empty());
        let raw_booking_text = column_value(booking_text_column).filter(|v| !v.is_empty());
        let amount_raw = column_value(amount_column).filter(|v| !v.is_empty());

        let booking_date = column_value(booking_day_column).and_then(|value| try_parse_date(&value));
        let Some(booking_date) = booking_date else {
            // Rows that carry neither a type, booking text nor an amount are
            // decorative filler; anything else with a bad date is a real
            // corruption.
            if transaction_type.is_none() && raw_booking_text.is_none() && amount_raw.is_none() {
                continue;
            }
            return Err(Error::InvalidCsv(format!(
                "Invalid {HEADER_BOOKING_DAY} in row {row_number}"
            )));
        };

        let value_date = match column_value(value_date_column).filter(|v| !v.is_empty()) {
            None => None,
            Some(value) => Some(try_parse_date(&value).ok_or_else(|| {
                Error::InvalidCsv(format!("Invalid {HEADER_VALUE_DATE} in row {row_number}"))
            })?),
        };

        let amount_cents = match &amount_raw {
            Some(raw) => parse_amount_cents(raw)?,
            None => 0,
        };

        let parts = parse_booking_text_parts(raw_booking_text.as_deref());
        let partner_name =
            determine_partner_name(&parts, raw_booking_text.as_deref(), transaction_type.as_deref());
        let purpose_text = determine_purpose_text(&parts, raw_booking_text.as_deref());

        let transaction = Transaction::build(
            amount_cents,
            PrimitiveDateTime::new(booking_date, Time::MIDNIGHT),
        )
        .value_date(value_date)
        .transaction_type(transaction_type)
        .raw_booking_text(raw_booking_text)
        .reference_text(parts.reference_text)
        .partner_name(&partner_name)
        .purpose_text(&purpose_text);

        transactions.push(transaction);
    }

    Ok(transactions)
}

fn is_blank_record(record: &::csv::StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Statement exports repeat balance and period meta lines below the data
/// table; those rows are not transactions.
fn is_trailing_meta_record(record: &::csv::StringRecord) -> bool {
    let Some(first) = record.get(0) else {
        return true;
    };
    let first = clean(first);
    if first.is_empty() {
        return false;
    }

    let normalized = first.to_lowercase();
    normalized.starts_with("alter kontostand")
        || normalized.starts_with("neuer kontostand")
        || normalized.starts_with("umsätze girokonto")
        || normalized.starts_with("umsaetze girokonto")
        || normalized.starts_with("zeitraum")
        || normalized == HEADER_BOOKING_DAY.to_lowercase()
}

fn try_parse_date(value: &str) -> Option<Date> {
    Date::parse(value, DATE_FORMAT_DE)
        .or_else(|_| Date::parse(value, DATE_FORMAT_ISO))
        .ok()
}

struct BookingTextParts {
    payer_name: Option<String>,
    booking_text: Option<String>,
    reference_text: Option<String>,
}

/// Split the raw booking text into its labelled parts, e.g.
/// `Auftraggeber: REWE Buchungstext: Einkauf Karte Nr. 1234 Ref. 778899/55`.
fn parse_booking_text_parts(raw_booking_text: Option<&str>) -> BookingTextParts {
    let Some(raw) = raw_booking_text.filter(|raw| !raw.trim().is_empty()) else {
        return BookingTextParts {
            payer_name: None,
            booking_text: None,
            reference_text: None,
        };
    };

    let payer_name = extract_after(raw, "Auftraggeber:")
        .map(|after| trim_at_marker(after, "Buchungstext:").to_owned());

    let booking_text = extract_after(raw, "Buchungstext:").map(|after| {
        let text = trim_at_marker(after, "Karte Nr.");
        trim_at_marker(text, "Ref.").to_owned()
    });

    let reference_text = extract_after(raw, "Ref.").map(str::to_owned);

    BookingTextParts {
        payer_name: payer_name.filter(|value| !value.is_empty()),
        booking_text: booking_text.filter(|value| !value.is_empty()),
        reference_text: reference_text.filter(|value| !value.is_empty()),
    }
}

fn determine_partner_name(
    parts: &BookingTextParts,
    raw_booking_text: Option<&str>,
    fallback: Option<&str>,
) -> String {
    if let Some(payer_name) = &parts.payer_name {
        return payer_name.clone();
    }

    // Card payments put the merchant name in front of the booking text label
    // instead of an Auftraggeber field.
    if let Some(raw) = raw_booking_text
        && let Some(index) = find_ignore_ascii_case(raw, "Buchungstext:")
        && index > 0
    {
        let prefix = raw[..index].trim();
        let prefix = extract_after(prefix, "Auftraggeber:").unwrap_or(prefix);
        if !prefix.is_empty() {
            return prefix.to_owned();
        }
    }

    match fallback {
        Some(value) if !value.trim().is_empty() => value.trim().to_owned(),
        _ => "Unknown".to_owned(),
    }
}

fn determine_purpose_text(parts: &BookingTextParts, raw_booking_text: Option<&str>) -> String {
    if let Some(booking_text) = &parts.booking_text {
        return booking_text.clone();
    }
    match raw_booking_text {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_owned(),
        _ => String::new(),
    }
}

/// Parse an amount like `1.234,56`, `-45,00 EUR` or `"993,44"` into cents.
///
/// # Errors
/// Returns [Error::InvalidCsv] if the cleaned value is not a decimal number
/// with at most two fraction digits.
fn parse_amount_cents(raw: &str) -> Result<i64, Error> {
    let cleaned = normalize_amount(raw);
    if cleaned.is_empty() {
        return Ok(0);
    }

    let invalid = || Error::InvalidCsv(format!("Invalid amount format: {raw}"));

    let (negative, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if unsigned.contains('-') {
        return Err(invalid());
    }

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (unsigned, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > 2 || fraction.contains('.') {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut fraction_cents: i64 = if fraction.is_empty() {
        0
    } else {
        fraction.parse().map_err(|_| invalid())?
    };
    if fraction.len() == 1 {
        fraction_cents *= 10;
    }

    let cents = whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(fraction_cents))
        .ok_or_else(invalid)?;

    Ok(if negative { -cents } else { cents })
}

/// Strip currency markers and grouping so only a plain decimal remains.
fn normalize_amount(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if stripped.is_empty() {
        return stripped;
    }

    // `1.234,56`: the dots are thousands separators, the comma the decimal
    // point.
    let without_grouping = if stripped.contains(',') && stripped.contains('.') {
        stripped.replace('.', "")
    } else {
        stripped
    };

    without_grouping.replace(',', ".")
}

fn clean(value: &str) -> String {
    let trimmed = value.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_owned()
}

// ============================================================================
// TESTS
// ============================================================================
