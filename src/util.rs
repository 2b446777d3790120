use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};

mod json_ext;

pub use json_ext::balanced_json_object;

use crate::Result;

#[derive(Default)]
pub struct W<T>(pub T);

pub const BROWSER_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

fn browser_headers() -> HeaderMap {
  let mut headers = HeaderMap::new();
  headers.insert(
    header::ACCEPT,
    HeaderValue::from_static(
      "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
  );
  headers.insert(
    header::ACCEPT_LANGUAGE,
    HeaderValue::from_static("en-US,en;q=0.9"),
  );
  headers
}

// client shared by every provider. each request is bounded by `timeout`.
pub fn provider_client(timeout: Duration) -> Result<reqwest::Client> {
  let client = reqwest::Client::builder()
    .user_agent(BROWSER_USER_AGENT)
    .default_headers(browser_headers())
    .timeout(timeout)
    .connect_timeout(timeout)
    .build()?;

  Ok(client)
}

// the relay streams arbitrarily large files, so only connecting is bounded.
pub fn relay_client(connect_timeout: Duration) -> Result<reqwest::Client> {
  let client = reqwest::Client::builder()
    .user_agent(BROWSER_USER_AGENT)
    .connect_timeout(connect_timeout)
    .build()?;

  Ok(client)
}

/// Shorten text for log lines.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
  match text.char_indices().nth(max_chars) {
    Some((idx, _)) => &text[..idx],
    None => text,
  }
}
