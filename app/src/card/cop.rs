use crate::core::number::{format_fixed, parse_localized};

use super::UNAVAILABLE;

/// Coefficient of performance from the displayed electrical input and thermal output.
///
/// Yields [`UNAVAILABLE`] if a value is not numeric, either value is zero or the electrical
/// input is not positive.
pub fn coefficient_of_performance(electrical: &str, thermal: &str) -> String {
    let (Some(electrical), Some(thermal)) = (parse_localized(electrical), parse_localized(thermal)) else {
        return UNAVAILABLE.to_string();
    };

    if electrical <= 0.0 || thermal == 0.0 {
        return UNAVAILABLE.to_string();
    }

    format_fixed(thermal / electrical, 2)
}
