use anyhow::Result;
use axum::extract::Request;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::middleware::{from_fn, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get_service;
use axum::{routing::get, Router};
use std::fmt::Write as _;
use std::path::PathBuf;
use tower_http::services::{ServeDir, ServeFile};

use crate::cameras::{self, Checkpoint};

/// Landing page listing the watched cameras, served when no dashboard
/// build is configured.
fn placeholder_page() -> String {
    let mut sections = String::new();
    for checkpoint in Checkpoint::ALL {
        let _ = write!(
            sections,
            "    <h2>{}</h2>\n    <p>{}</p>\n    <ul>\n",
            checkpoint.title(),
            checkpoint.caption()
        );
        for id in checkpoint.camera_ids() {
            let label = cameras::label_for(id).unwrap_or(id);
            let _ = writeln!(sections, "      <li>{label} <small>(camera {id})</small></li>");
        }
        sections.push_str("    </ul>\n");
    }
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Singapore Traffic Monitor</title>
  </head>
  <body style="font-family: system-ui; padding: 24px">
    <h1>Singapore Traffic Monitor</h1>
    <p>Latest camera frames are served as JSON at <a href="/api/traffic"><code>/api/traffic</code></a>. Run <code>traffic-watch</code> for a terminal view, or pass <code>--static-root</code> to serve a dashboard build.</p>
{sections}  </body>
</html>
"#
    )
}

/// Cache policy for files under the static root. HTML is never cached and
/// hashed bundles under `/assets/` are immutable.
fn cache_policy(path: &str, content_type: &str) -> &'static str {
    if content_type.starts_with("text/html") {
        "no-store"
    } else if path.starts_with("/assets/") {
        "public, max-age=31536000, immutable"
    } else {
        "public, max-age=300"
    }
}

async fn apply_cache_headers(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut response = next.run(req).await;

    if response.headers().contains_key(CACHE_CONTROL) {
        return response;
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let cache_value = cache_policy(&path, content_type);
    if let Ok(value) = HeaderValue::from_str(cache_value) {
        response.headers_mut().insert(CACHE_CONTROL, value);
    }

    response
}

async fn placeholder_handler() -> Response {
    ([(CACHE_CONTROL, "no-store")], Html(placeholder_page())).into_response()
}

pub fn service(static_root: Option<PathBuf>) -> Result<Router> {
    let router = if let Some(root) = static_root {
        if !root.exists() {
            anyhow::bail!("static_root not found at {}", root.display());
        }
        let index = root.join("index.html");
        let dir = ServeDir::new(root)
            .append_index_html_on_directories(true)
            .not_found_service(ServeFile::new(index));
        Router::new()
            .fallback_service(get_service(dir))
            .layer(from_fn(apply_cache_headers))
    } else {
        Router::new()
            .route("/", get(placeholder_handler))
            .fallback(get(placeholder_handler))
    };
    Ok(router)
}
