//! Authorization header construction for outbound deliveries.

use hookrelay_core::AuthScheme;

/// Diagnostic header naming the custom auth scheme on a delivery.
pub const AUTH_TYPE_HEADER: &str = "X-Webhook-Auth-Type";

/// Diagnostic header carrying the custom auth value on a delivery.
pub const AUTH_VALUE_HEADER: &str = "X-Webhook-Auth-Value";

/// Builds the header set a delivery must carry for its auth scheme.
///
/// Pure function from the scheme tag to `(name, value)` pairs. Basic
/// credentials are passed through as declared, not re-encoded. Custom
/// schemes set a header named after the scheme itself plus the two
/// diagnostic headers for downstream observability.
pub fn auth_headers(scheme: &AuthScheme) -> Vec<(String, String)> {
    match scheme {
        AuthScheme::None => Vec::new(),
        AuthScheme::Bearer(secret) => {
            vec![("Authorization".to_owned(), format!("Bearer {secret}"))]
        },
        AuthScheme::Basic(credentials) => {
            vec![("Authorization".to_owned(), format!("Basic {credentials}"))]
        },
        AuthScheme::Custom { header, value } => vec![
            (AUTH_TYPE_HEADER.to_owned(), header.clone()),
            (AUTH_VALUE_HEADER.to_owned(), value.clone()),
            (header.clone(), value.clone()),
        ],
    }
}
