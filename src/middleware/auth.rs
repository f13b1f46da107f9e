use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Decides whether the caller presented the admin API key, either as
/// `Authorization: Bearer <key>` or as the raw key.
pub fn is_admin(headers: &HeaderMap, admin_api_key: &str) -> bool {
    if admin_api_key.is_empty() {
        return false;
    }

    let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());

    match auth_header {
        Some(auth) => {
            let presented = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
            presented == admin_api_key
        }
        None => false,
    }
}
