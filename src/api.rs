use std::sync::Arc;

use axum::{
  body::{self, StreamBody},
  extract::{Query, State},
  http::{header, HeaderValue, Method, Request, Response},
  middleware::{self, Next},
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use futures::TryStreamExt;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  media::MediaResult,
  platform::{classify, Platform},
  rate_limit::RateLimiter,
  resolver::Resolver,
  Error, Result,
};

#[derive(Clone)]
pub struct AppState {
  pub resolver: Arc<Resolver>,
  pub limiter: Arc<RateLimiter>,
  pub relay_client: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
  let limited = Router::new()
    .route("/api/instagram", get(resolve_instagram))
    .route("/api/tiktok", get(resolve_tiktok))
    .route("/api/resolve", get(resolve_any))
    .route("/proxy", get(relay))
    .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

  Router::new()
    .merge(limited)
    .route("/health", get(health))
    .fallback(not_found)
    .layer(middleware::from_fn(cors))
    .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
  url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
  url: Option<String>,
  name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Resolved {
  ok: bool,
  count: usize,
  #[serde(flatten)]
  result: MediaResult,
}

impl From<MediaResult> for Resolved {
  fn from(result: MediaResult) -> Self {
    Self {
      ok: true,
      count: result.medias.len(),
      result,
    }
  }
}

fn required(value: Option<&str>) -> Result<&str> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .ok_or(Error::MissingUrl)
}

async fn resolve_for(
  state: &AppState,
  query: &UrlQuery,
  expected: Option<Platform>,
) -> Result<Json<Resolved>> {
  let url = required(query.url.as_deref())?;

  let platform = classify(url);
  if expected.is_some_and(|expected| expected != platform) {
    return Err(Error::UnsupportedPlatform(url.to_owned()));
  }

  let result = state.resolver.resolve(url).await?;
  Ok(Json(result.into()))
}

pub async fn resolve_instagram(
  State(state): State<AppState>,
  Query(query): Query<UrlQuery>,
) -> Result<Json<Resolved>> {
  resolve_for(&state, &query, Some(Platform::Instagram)).await
}

pub async fn resolve_tiktok(
  State(state): State<AppState>,
  Query(query): Query<UrlQuery>,
) -> Result<Json<Resolved>> {
  resolve_for(&state, &query, Some(Platform::TikTok)).await
}

pub async fn resolve_any(
  State(state): State<AppState>,
  Query(query): Query<UrlQuery>,
) -> Result<Json<Resolved>> {
  resolve_for(&state, &query, None).await
}

pub async fn relay(
  State(state): State<AppState>,
  Query(query): Query<RelayQuery>,
) -> Result<impl IntoResponse> {
  let raw = required(query.url.as_deref())?;
  let url = Url::parse(raw)
    .ok()
    .filter(|url| matches!(url.scheme(), "http" | "https"))
    .filter(|url| url.host_str().is_some())
    .ok_or_else(|| Error::InvalidUrl(raw.to_owned()))?;

  let name = query
    .name
    .as_deref()
    .map(sanitize_filename)
    .filter(|name| !name.is_empty())
    .unwrap_or_else(|| default_filename(&url));

  info!(%url, %name, "relaying");

  let upstream = state
    .relay_client
    .get(url)
    .send()
    .await?
    .error_for_status()?;

  let content_type = upstream
    .headers()
    .get(header::CONTENT_TYPE)
    .cloned()
    .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

  let stream = upstream.bytes_stream().map_err(Error::from);

  let resp = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, content_type)
    .header(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{name}\""),
    )
    .body(body::boxed(StreamBody::new(stream)))?;

  Ok(resp)
}

fn sanitize_filename(name: &str) -> String {
  name
    .trim()
    .chars()
    .map(|c| match c {
      'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
      _ => '_',
    })
    .collect()
}

fn default_filename(url: &Url) -> String {
  url
    .path_segments()
    .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
    .map(sanitize_filename)
    .filter(|name| !name.is_empty())
    .unwrap_or_else(|| "media".to_owned())
}

pub async fn health() -> impl IntoResponse {
  "ok"
}

async fn not_found() -> Error {
  Error::NotFound
}

async fn rate_limit<B>(
  State(state): State<AppState>,
  req: Request<B>,
  next: Next<B>,
) -> Result<axum::response::Response> {
  state.limiter.check()?;
  Ok(next.run(req).await)
}

// every response carries the CORS headers; preflights stop here.
async fn cors<B>(req: Request<B>, next: Next<B>) -> axum::response::Response {
  let mut resp = if req.method() == Method::OPTIONS {
    StatusCode::NO_CONTENT.into_response()
  } else {
    next.run(req).await
  };

  let headers = resp.headers_mut();
  headers.insert(
    header::ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue::from_static("*"),
  );
  headers.insert(
    header::ACCESS_CONTROL_ALLOW_METHODS,
    HeaderValue::from_static("GET, OPTIONS"),
  );
  headers.insert(
    header::ACCESS_CONTROL_ALLOW_HEADERS,
    HeaderValue::from_static("Content-Type"),
  );

  resp
}
