use std::str::FromStr;

/// Interprets an optional environment value as an on/off switch. Anything unrecognised yields `default`.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if ["1", "true", "yes", "on"].contains(&v.as_str()) => true,
        Some(v) if ["0", "false", "no", "off"].contains(&v.as_str()) => false,
        _ => default,
    }
}

/// Parses an optional numeric setting. Missing values give `Ok(None)`; malformed values return the parse error text
/// so that the caller can decide whether to log and fall back.
pub fn parse_number<T>(value: Option<String>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(|e| format!("'{s}' is not a valid number. {e}")),
    }
}
