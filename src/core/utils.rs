/// Utility Functions
///
/// Number rendering for tool results and credential extraction for the
/// HTTP transport.

/// Render a number the way JavaScript's `String(number)` does.
///
/// Clients of the calculator compare result text literally, so integral
/// values render without a fractional part (`12`, not `12.0`), negative zero
/// renders as `0`, non-finite values render as `NaN` / `Infinity` /
/// `-Infinity`, and magnitudes outside `[1e-6, 1e21)` use exponent form with
/// an explicit sign (`1e+21`, `1.5e-7`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let text = format!("{:e}", value);
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => text,
        };
    }

    format!("{}", value)
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` with a case-insensitive scheme. Returns `None`
/// for other schemes or an empty token.
pub fn bearer_token(header_value: &str) -> Option<String> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
