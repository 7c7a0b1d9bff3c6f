//! Centralized validation of command-line input.

use thiserror::Error;

/// Longest target accepted for matching (DOS protection)
pub const MAX_USER_AGENT_LENGTH: usize = 8 * 1024;

/// Maximum number of `--header` arguments per match
pub const MAX_HEADERS: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Header '{0}' is not in 'Name: value' form")]
    MalformedHeader(String),

    #[error("Header name '{0}' contains invalid characters")]
    InvalidHeaderName(String),

    #[error("Input of {length} bytes exceeds the maximum of {max}")]
    TooLong { length: usize, max: usize },

    #[error("Too many headers: at most {0} are allowed")]
    TooManyHeaders(usize),
}

/// Check that a string is a valid HTTP header name (an RFC 7230 token).
///
/// # Examples
///
/// ```
/// use ua_solver::utils::validation::is_valid_header_name;
///
/// assert!(is_valid_header_name("User-Agent"));
/// assert!(is_valid_header_name("Sec-CH-UA-Platform"));
/// assert!(!is_valid_header_name("User Agent"));
/// assert!(!is_valid_header_name(""));
/// ```
#[must_use]
pub fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Parse a `Name: value` header argument.
///
/// Whitespace around the name and the value is trimmed; the value may itself
/// contain colons.
///
/// # Errors
///
/// Returns `ValidationError::MalformedHeader` if there is no colon,
/// `ValidationError::InvalidHeaderName` for a bad name, or
/// `ValidationError::TooLong` if the value is too long.
pub fn parse_header(arg: &str) -> Result<(String, String), ValidationError> {
    let (name, value) = arg
        .split_once(':')
        .ok_or_else(|| ValidationError::MalformedHeader(arg.to_string()))?;
    let name = name.trim();
    if !is_valid_header_name(name) {
        return Err(ValidationError::InvalidHeaderName(name.to_string()));
    }
    let value = value.trim();
    check_length(value)?;
    Ok((name.to_string(), value.to_string()))
}

/// Parse every header argument, enforcing [`MAX_HEADERS`].
///
/// # Errors
///
/// Returns the first error from [`parse_header`] or
/// `ValidationError::TooManyHeaders`.
pub fn parse_headers(args: &[String]) -> Result<Vec<(String, String)>, ValidationError> {
    if args.len() > MAX_HEADERS {
        return Err(ValidationError::TooManyHeaders(MAX_HEADERS));
    }
    args.iter().map(|arg| parse_header(arg)).collect()
}

/// Reject targets longer than [`MAX_USER_AGENT_LENGTH`].
///
/// # Errors
///
/// Returns `ValidationError::TooLong` with the offending length.
pub fn check_length(target: &str) -> Result<(), ValidationError> {
    if target.len() > MAX_USER_AGENT_LENGTH {
        return Err(ValidationError::TooLong {
            length: target.len(),
            max: MAX_USER_AGENT_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("User-Agent: Mozilla/5.0 (X11; Linux x86_64)").unwrap(),
            (
                "User-Agent".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64)".to_string()
            )
        );
        // Values may contain colons
        assert_eq!(
            parse_header("X-Forwarded-Host:  example.com:8080 ").unwrap().1,
            "example.com:8080"
        );
        assert_eq!(parse_header("Device-Stock-UA:").unwrap().1, "");
    }

    #[test]
    fn test_parse_header_errors() {
        assert_eq!(
            parse_header("User-Agent Mozilla"),
            Err(ValidationError::MalformedHeader("User-Agent Mozilla".to_string()))
        );
        assert_eq!(
            parse_header("User Agent: x"),
            Err(ValidationError::InvalidHeaderName("User Agent".to_string()))
        );
        assert!(matches!(parse_header(": x"), Err(ValidationError::InvalidHeaderName(_))));
    }

    #[test]
    fn test_length_limit() {
        let long = "a".repeat(MAX_USER_AGENT_LENGTH + 1);
        assert!(check_length(&long[..MAX_USER_AGENT_LENGTH]).is_ok());
        assert_eq!(
            check_length(&long),
            Err(ValidationError::TooLong {
                length: MAX_USER_AGENT_LENGTH + 1,
                max: MAX_USER_AGENT_LENGTH
            })
        );
        assert!(parse_header(&format!("User-Agent: {long}")).is_err());
    }

    #[test]
    fn test_header_count_limit() {
        let args: Vec<String> = (0..=MAX_HEADERS).map(|i| format!("X-H{i}: v")).collect();
        assert_eq!(
            parse_headers(&args),
            Err(ValidationError::TooManyHeaders(MAX_HEADERS))
        );
        assert_eq!(parse_headers(&args[..2]).unwrap().len(), 2);
    }
}
