use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use streaming::{Fetch, FetchResponse};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ProxyConfig;

// The parts library mirrors official content under `unofficial/` with the
// same relative paths.
const FALLBACK_SUBTREES: [(&str, &str); 2] = [
    ("/ldraw/parts/", "/ldraw/unofficial/parts/"),
    ("/ldraw/p/", "/ldraw/unofficial/p/"),
];

const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Clone)]
pub struct AppState {
    fetcher: Arc<dyn Fetch>,
    config: Arc<ProxyConfig>,
}

impl AppState {
    pub fn new(fetcher: Arc<dyn Fetch>, config: ProxyConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/proxy/ldr", get(proxy_ldr))
        .route("/proxy/image", get(proxy_image))
        .route("/proxy", get(proxy_ldr))
        .route("/partProxy", get(proxy_ldr))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

/// Outcome of walking a candidate list against the upstream.
#[derive(Debug, PartialEq, Eq)]
pub enum UpstreamOutcome {
    Found(FetchResponse),
    /// Terminal upstream status: a non-404 error, or the last 404.
    Status(u16),
    NetworkFailure,
}

/// The requested URL first, then its unofficial twin if it has one.
pub fn fallback_candidates(url: &str) -> Vec<String> {
    let mut candidates = vec![url.to_string()];
    for (official, unofficial) in FALLBACK_SUBTREES {
        if let Some(idx) = url.find(official) {
            candidates.push(format!(
                "{}{}{}",
                &url[..idx],
                unofficial,
                &url[idx + official.len()..]
            ));
            break;
        }
    }
    candidates
}

/// Tries each candidate in order. Only a 404 moves on to the next one.
pub async fn fetch_with_fallback(fetcher: &dyn Fetch, candidates: &[String]) -> UpstreamOutcome {
    let mut last_status = None;
    for (attempt, candidate) in candidates.iter().enumerate() {
        match fetcher.fetch(candidate).await {
            Ok(resp) if resp.is_success() => {
                if attempt > 0 {
                    debug!(url = %candidate, attempt, "served from fallback path");
                }
                return UpstreamOutcome::Found(resp);
            }
            Ok(resp) if resp.is_not_found() => {
                debug!(url = %candidate, "upstream 404, trying next candidate");
                last_status = Some(resp.status);
            }
            Ok(resp) => {
                warn!(url = %candidate, status = resp.status, "upstream error");
                return UpstreamOutcome::Status(resp.status);
            }
            Err(err) => {
                error!(url = %candidate, error = %err, "upstream fetch failed");
                return UpstreamOutcome::NetworkFailure;
            }
        }
    }
    UpstreamOutcome::Status(last_status.unwrap_or(500))
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn proxy_ldr(State(state): State<AppState>, Query(query): Query<ProxyQuery>) -> Response {
    let target = match validate_target(&state.config, query.url.as_deref()) {
        Ok(url) => url,
        Err(rejection) => return rejection.into_response(),
    };

    let candidates = fallback_candidates(target.as_str());
    match fetch_with_fallback(state.fetcher.as_ref(), &candidates).await {
        UpstreamOutcome::Found(resp) => {
            let cache_control = format!("public, max-age={}", state.config.ldr_max_age_s);
            relay(resp.body, "text/plain", &cache_control)
        }
        UpstreamOutcome::Status(status) => status_response(status),
        UpstreamOutcome::NetworkFailure => {
            (StatusCode::INTERNAL_SERVER_ERROR, "proxy fetch failed").into_response()
        }
    }
}

async fn proxy_image(State(state): State<AppState>, Query(query): Query<ProxyQuery>) -> Response {
    let target = match validate_target(&state.config, query.url.as_deref()) {
        Ok(url) => url,
        Err(rejection) => return rejection.into_response(),
    };

    match state.fetcher.fetch(target.as_str()).await {
        Ok(resp) if resp.is_success() => {
            let content_type = resp
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string());
            relay(resp.body, &content_type, IMAGE_CACHE_CONTROL)
        }
        Ok(resp) => {
            warn!(url = %target, status = resp.status, "image upstream error");
            (StatusCode::INTERNAL_SERVER_ERROR, "proxy fetch failed").into_response()
        }
        Err(err) => {
            error!(url = %target, error = %err, "image fetch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "proxy fetch failed").into_response()
        }
    }
}

fn validate_target(
    config: &ProxyConfig,
    raw: Option<&str>,
) -> Result<Url, (StatusCode, &'static str)> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Err((StatusCode::BAD_REQUEST, "missing url parameter"));
    };
    let url = match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return Err((StatusCode::BAD_REQUEST, "invalid url parameter")),
    };
    let host = url.host_str().unwrap_or_default();
    if !config.host_allowed(host) {
        warn!(host, "upstream host not allowed");
        return Err((StatusCode::FORBIDDEN, "upstream host not allowed"));
    }
    Ok(url)
}

fn relay(body: bytes::Bytes, content_type: &str, cache_control: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        HeaderValue::from_str(cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=3600")),
    );
    (StatusCode::OK, headers, Body::from(body)).into_response()
}

fn status_response(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, "upstream error").into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use streaming::{FetchResponse, MemoryFetcher};
    use tower::ServiceExt;

    use super::{
        fallback_candidates, fetch_with_fallback, router, AppState, UpstreamOutcome,
    };
    use crate::config::{ProxyConfig, ANY_HOST};

    const OFFICIAL: &str = "https://cdn.example.net/complete/ldraw/parts/brick.dat";
    const UNOFFICIAL: &str = "https://cdn.example.net/complete/ldraw/unofficial/parts/brick.dat";

    fn encoded(url: &str) -> String {
        url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
    }

    fn open_config() -> ProxyConfig {
        ProxyConfig {
            allowed_hosts: vec![ANY_HOST.to_string()],
            ..ProxyConfig::default()
        }
    }

    async fn get(fetcher: Arc<MemoryFetcher>, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        request(fetcher, open_config(), uri).await
    }

    async fn request(
        fetcher: Arc<MemoryFetcher>,
        config: ProxyConfig,
        uri: &str,
    ) -> (StatusCode, axum::http::HeaderMap, String) {
        let app = router(AppState::new(fetcher, config));
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn official_paths_get_an_unofficial_twin() {
        assert_eq!(fallback_candidates(OFFICIAL), vec![OFFICIAL, UNOFFICIAL]);
        assert_eq!(
            fallback_candidates("https://cdn.example.net/ldraw/p/4-4cyli.dat"),
            vec![
                "https://cdn.example.net/ldraw/p/4-4cyli.dat",
                "https://cdn.example.net/ldraw/unofficial/p/4-4cyli.dat"
            ]
        );
        assert_eq!(
            fallback_candidates("https://cdn.example.net/ldraw/models/car.ldr"),
            vec!["https://cdn.example.net/ldraw/models/car.ldr"]
        );
    }

    #[tokio::test]
    async fn not_found_tries_the_unofficial_tree() {
        let fetcher = MemoryFetcher::new().with_text(UNOFFICIAL, "0 Unofficial brick");
        let outcome = fetch_with_fallback(&fetcher, &fallback_candidates(OFFICIAL)).await;
        assert!(matches!(outcome, UpstreamOutcome::Found(_)));
        assert_eq!(fetcher.requests(), vec![OFFICIAL, UNOFFICIAL]);
    }

    #[tokio::test]
    async fn other_errors_do_not_fall_back() {
        let fetcher = MemoryFetcher::new()
            .with_status(OFFICIAL, 503)
            .with_text(UNOFFICIAL, "never served");
        let outcome = fetch_with_fallback(&fetcher, &fallback_candidates(OFFICIAL)).await;
        assert_eq!(outcome, UpstreamOutcome::Status(503));
        assert_eq!(fetcher.requests(), vec![OFFICIAL]);
    }

    #[tokio::test]
    async fn exhausted_candidates_report_last_status() {
        let fetcher = MemoryFetcher::new();
        let outcome = fetch_with_fallback(&fetcher, &fallback_candidates(OFFICIAL)).await;
        assert_eq!(outcome, UpstreamOutcome::Status(404));
        assert_eq!(fetch_with_fallback(&fetcher, &[]).await, UpstreamOutcome::Status(500));
    }

    #[tokio::test]
    async fn ldr_endpoint_relays_text_with_cache_header() {
        let fetcher = Arc::new(MemoryFetcher::new().with_text(OFFICIAL, "0 Brick"));
        let (status, headers, body) =
            get(fetcher, &format!("/proxy/ldr?url={}", encoded(OFFICIAL))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "0 Brick");
        assert_eq!(headers["content-type"], "text/plain");
        assert_eq!(headers["cache-control"], "public, max-age=3600");
    }

    #[tokio::test]
    async fn ldr_endpoint_error_mapping() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_status(OFFICIAL, 502)
                .with_unreachable("https://down.example/ldraw/models/a.ldr"),
        );
        let (status, _, _) = get(fetcher.clone(), "/proxy/ldr").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get(fetcher.clone(), "/proxy/ldr?url=not%20a%20url").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) =
            get(fetcher.clone(), &format!("/partProxy?url={}", encoded(OFFICIAL))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let down = encoded("https://down.example/ldraw/models/a.ldr");
        let (status, _, _) = get(fetcher, &format!("/proxy?url={down}")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn image_endpoint_keeps_upstream_type_and_skips_fallback() {
        let png = "https://cdn.example.net/ldraw/parts/brick.png";
        let fetcher = Arc::new(MemoryFetcher::new().with_response(
            png,
            FetchResponse::ok(Some("image/png"), vec![0x89, b'P', b'N', b'G']),
        ));
        let app_fetcher = fetcher.clone();
        let (status, headers, _) =
            get(app_fetcher, &format!("/proxy/image?url={}", encoded(png))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(headers["cache-control"], "public, max-age=31536000, immutable");

        let missing = "https://cdn.example.net/ldraw/parts/none.png";
        let (status, _, _) =
            get(fetcher.clone(), &format!("/proxy/image?url={}", encoded(missing))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fetcher.requests(), vec![png, missing]);
    }

    #[tokio::test]
    async fn default_config_refuses_hosts_other_than_the_parts_cdn() {
        let metadata = "http://169.254.169.254/latest/meta-data/";
        let fetcher = Arc::new(MemoryFetcher::new().with_text(metadata, "secret"));
        let (status, _, _) = request(
            fetcher.clone(),
            ProxyConfig::default(),
            &format!("/proxy/ldr?url={}", encoded(metadata)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(fetcher.requests().is_empty());

        let part = streaming::library_url("parts/3001.dat");
        let fetcher = Arc::new(MemoryFetcher::new().with_text(part.clone(), "0 Brick"));
        let (status, _, body) = request(
            fetcher,
            ProxyConfig::default(),
            &format!("/proxy/ldr?url={}", encoded(&part)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "0 Brick");
    }
}
