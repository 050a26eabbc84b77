//! Parsing and formatting of numbers in German notation (`1.234,5`).

const GROUP_SEPARATOR: char = '.';
const DECIMAL_SEPARATOR: char = ',';

/// Recovers a number from a formatted display string.
///
/// Everything except digits and separators is dropped. A minus sign counts only in front of the number.
/// Dots are read as digit grouping and the comma as decimal separator. Returns `None` if nothing
/// numeric is left.
pub fn parse_localized(value: &str) -> Option<f64> {
    let mut normalized = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '-' if normalized.is_empty() => normalized.push('-'),
            DECIMAL_SEPARATOR => normalized.push('.'),
            c if c.is_ascii_digit() => normalized.push(c),
            _ => {}
        }
    }

    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Grouped number with up to three fractional digits, trailing zeros dropped.
pub fn format_grouped(value: f64) -> String {
    format_localized(value, 0, 3)
}

/// Grouped number with exactly `digits` fractional digits.
pub fn format_fixed(value: f64, digits: usize) -> String {
    format_localized(value, digits, digits)
}

fn format_localized(value: f64, min_fraction: usize, max_fraction: usize) -> String {
    let rounded = format!("{:.*}", max_fraction, value.abs());
    let (integer, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));

    let mut fraction = fraction.to_string();
    while fraction.len() > min_fraction && fraction.ends_with('0') {
        fraction.pop();
    }

    let is_zero = integer.chars().chain(fraction.chars()).all(|c| c == '0');
    let sign = if value.is_sign_negative() && !is_zero { "-" } else { "" };

    if fraction.is_empty() {
        format!("{sign}{}", group_digits(integer))
    } else {
        format!("{sign}{}{DECIMAL_SEPARATOR}{fraction}", group_digits(integer))
    }
}

fn group_digits(integer: &str) -> String {
    let len = integer.len();
    let mut grouped = String::with_capacity(len + len / 3);

    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(c);
    }

    grouped
}
