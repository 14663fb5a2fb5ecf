//! Locale-tolerant numeric parsing.
//!
//! Prices and job parameters arrive as strings from the Admin API and from
//! operators who type them with either `1.234,56` or `1,234.56` grouping.
//! [`parse_flexible`] normalizes both shapes; anything it cannot make sense
//! of is `None` rather than a NaN that could leak into arithmetic.

/// Parse a locale-formatted numeric string.
///
/// Rules, in order:
/// - trims; empty input is `None`;
/// - strips everything but digits, `.`, `,` and `-` (currency symbols,
///   spaces, unit suffixes);
/// - when both `.` and `,` are present, the rightmost acts as the decimal
///   separator and the other is removed as grouping;
/// - a single `,` with no `.` is a decimal separator; multiple commas are
///   grouping and are removed;
/// - non-finite or otherwise unparsable input is `None`.
#[must_use]
pub fn parse_flexible(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut s: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let has_dot = s.contains('.');
    let has_comma = s.contains(',');

    if has_dot && has_comma {
        if s.rfind('.') > s.rfind(',') {
            s.retain(|c| c != ',');
        } else {
            s.retain(|c| c != '.');
            s = s.replace(',', ".");
        }
    } else if has_comma {
        if s.matches(',').count() == 1 {
            s = s.replace(',', ".");
        } else {
            s.retain(|c| c != ',');
        }
    }

    let value = s.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}
