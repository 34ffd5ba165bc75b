use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use sqlx::PgPool;

use crate::Config;

mod api;
mod health;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    let origin = HeaderValue::from_str(&config.cors_allow_origin).unwrap_or_else(|_| {
        tracing::warn!(
            "Invalid CORS_ALLOW_ORIGIN {:?}, falling back to *",
            config.cors_allow_origin
        );
        HeaderValue::from_static("*")
    });

    Router::new()
        .merge(api::router())
        .merge(health::router())
        .with_state((pool, config))
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            let origin = origin.clone();
            async move { cors(req, next, origin).await }
        }))
}

/// Answer preflight requests directly and decorate every other response.
async fn cors(req: Request, next: Next, origin: HeaderValue) -> Response {
    // ---
    let res = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    with_cors(res, origin)
}

/// Attach permissive CORS headers so the browser dashboard can call the API.
fn with_cors(mut res: Response, origin: HeaderValue) -> Response {
    // ---
    let headers = res.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    res
}
