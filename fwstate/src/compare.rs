use crate::schema::ValueType;
use crate::value::Value;

/// Decide whether a declared value differs from the observed one.
///
/// Rules apply in order:
///
/// 1. an unset declared value never differs,
/// 2. a supplied secret always differs (the device never echoes it back),
/// 3. numeric strings compare in canonical integer form,
/// 4. enums compare case-sensitively as returned by the device,
/// 5. everything else compares by plain equality.
///
/// Scalars compare by text, so an observed value carrying XML attributes
/// matches a declared plain value with the same text.
///
/// An observed value that is unset differs from any supplied declared value.
pub fn differs(declared: Option<&Value>, observed: Option<&Value>, value_type: ValueType) -> bool {
    let Some(declared) = declared else {
        return false;
    };
    if value_type == ValueType::Secret {
        return true;
    }
    let Some(observed) = observed else {
        return true;
    };

    match (declared.text(), observed.text()) {
        (Some(d), Some(o)) => !same_text(d, o, value_type),
        _ => declared != observed,
    }
}

/// Scalar text equality under `value_type`. Enum values are not case-folded;
/// the device rejects the wrong case.
pub fn same_text(declared: &str, observed: &str, value_type: ValueType) -> bool {
    match value_type {
        ValueType::Numeric => canonical_number(declared) == canonical_number(observed),
        _ => declared == observed,
    }
}

/// Trim a numeric string and strip leading zeros from plain integers.
/// Decimal and signed forms are only trimmed.
pub fn canonical_number(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed;
    }
    match trimmed.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    }
}
