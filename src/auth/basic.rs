//! HTTP Basic credential extraction

use base64::{engine::general_purpose::STANDARD, Engine};

/// Email and password carried by an `Authorization: Basic` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

/// Decode the header value. `None` for any other scheme or a malformed
/// payload.
pub fn parse_basic_header(value: &str) -> Option<BasicCredentials> {
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (email, password) = text.split_once(':')?;
    if email.is_empty() {
        return None;
    }
    Some(BasicCredentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_parses_credentials() {
        let creds = parse_basic_header(&header("ana@campo.mx:Clave:123")).unwrap();
        assert_eq!(creds.email, "ana@campo.mx");
        // Only the first colon separates the fields
        assert_eq!(creds.password, "Clave:123");
    }

    #[test]
    fn test_rejects_other_schemes_and_garbage() {
        assert!(parse_basic_header("Bearer abc.def").is_none());
        assert!(parse_basic_header("Basic !!!").is_none());
        assert!(parse_basic_header(&header("sin-separador")).is_none());
        assert!(parse_basic_header(&header(":solo-clave")).is_none());
    }
}
