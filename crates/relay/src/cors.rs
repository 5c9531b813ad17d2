// CORS middleware configuration for the relay server.
//
// Origins come from `CONSULT_RELAY_CORS_ORIGINS` (see config.rs). When unset,
// any browser origin is mirrored back with credentials allowed, so web
// clients served from arbitrary hosts can reach the HTTP routes.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build a [`CorsLayer`] from the configured origin setting.
///
/// - `Some("*")` allows any origin without credentials.
/// - `Some(list)` allows exactly the comma-separated origins.
/// - `None` mirrors the request origin and allows credentials.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(std::time::Duration::from_secs(3600));

    match origins.map(str::trim) {
        Some("*") => base.allow_origin(AllowOrigin::any()),
        Some(list) if !list.is_empty() => {
            base.allow_origin(parse_origins(list)).allow_credentials(true)
        }
        _ => base.allow_origin(AllowOrigin::mirror_request()).allow_credentials(true),
    }
}

fn parse_origins(comma_separated: &str) -> Vec<HeaderValue> {
    comma_separated
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect()
}
