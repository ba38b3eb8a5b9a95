//! HTTP routes for agrosystem
//!
//! Each family receives the path segments after its collection prefix, so
//! `/cultivos/{id}/riegos/{sub}` reaches [`crops`] as `[id, "riegos", sub]`.

/// Decode the JSON body into `$ty`, then run the operation and wrap its
/// envelope. A body that fails to decode short-circuits with a 400.
macro_rules! with_json {
    ($req:expr, |$input:ident: $ty:ty| $call:expr) => {
        match $crate::routes::response::read_json::<$ty>($req).await {
            Ok($input) => $crate::routes::response::outcome_response($call.await),
            Err(e) => $crate::routes::response::error_response(e),
        }
    };
}

pub mod accounts;
pub mod crops;
pub mod health;
pub mod records;
pub mod response;

pub use accounts::{handle_activity_request, handle_supply_request, handle_user_request};
pub use crops::handle_crop_request;
pub use health::{health_check, version_info};
pub use records::{handle_alert_request, handle_soil_request};

/// Split a request path into percent-decoded segments
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(
            path_segments("/cultivos/abc/riegos/"),
            vec!["cultivos", "abc", "riegos"]
        );
        assert_eq!(path_segments("/insumos/Urea%20granulada"), vec!["insumos", "Urea granulada"]);
        assert!(path_segments("/").is_empty());
    }
}
