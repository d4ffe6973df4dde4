pub const HEADER_AUTH: &str = "authorization";

/// Value of the authorization header for a bearer token
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
