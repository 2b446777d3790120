use itertools::Itertools;
use reqwest::Url;
use serde::Serialize;

use crate::{
  platform::{classify, Platform},
  Error,
};

/// A single resolution request for a post URL.
#[derive(Debug, Clone)]
pub struct MediaRequest {
  source_url: String,
}

impl MediaRequest {
  pub fn new(source_url: impl Into<String>) -> Self {
    Self {
      source_url: source_url.into().trim().to_owned(),
    }
  }

  pub fn source_url(&self) -> &str {
    &self.source_url
  }

  pub fn platform(&self) -> Platform {
    classify(&self.source_url)
  }

  /// The URL handed to providers: query string and fragment dropped.
  pub fn target_url(&self) -> String {
    match Url::parse(&self.source_url) {
      Ok(mut url) => {
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
      }
      Err(_) => strip_query(&self.source_url).to_owned(),
    }
  }

  /// Cache key: like `target_url`, plus lowercase host and no trailing slash.
  pub fn cache_key(&self) -> String {
    let target = match Url::parse(&self.source_url) {
      Ok(mut url) => {
        url.set_query(None);
        url.set_fragment(None);
        // the url crate already lowercases the host of special schemes
        url.to_string()
      }
      Err(_) => strip_query(&self.source_url).to_lowercase(),
    };

    target.trim_end_matches('/').to_owned()
  }
}

fn strip_query(url: &str) -> &str {
  url.split(['?', '#']).next().unwrap_or(url)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub caption: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub music: Option<String>,
}

impl Metadata {
  pub fn is_empty(&self) -> bool {
    self.author.is_none() && self.caption.is_none() && self.music.is_none()
  }

  /// `None` when no field is set.
  pub fn non_empty(self) -> Option<Self> {
    (!self.is_empty()).then_some(self)
  }
}

/// What a provider or a parse layer found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
  pub media_urls: Vec<String>,
  pub metadata: Metadata,
}

impl Extraction {
  pub fn from_urls(media_urls: Vec<String>) -> Self {
    Self {
      media_urls,
      metadata: Metadata::default(),
    }
  }

  pub fn with_metadata(self, metadata: Metadata) -> Self {
    Self { metadata, ..self }
  }

  pub fn is_empty(&self) -> bool {
    self.media_urls.is_empty()
  }
}

/// Outcome of one provider in the resolution pipeline.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
  pub provider_id: String,
  pub ok: bool,
  pub media_urls: Vec<String>,
  pub metadata: Option<Metadata>,
  pub error: Option<String>,
}

impl ExtractionAttempt {
  pub fn succeeded(provider_id: &str, extraction: Extraction) -> Self {
    let ok = !extraction.is_empty();
    Self {
      provider_id: provider_id.to_owned(),
      ok,
      media_urls: extraction.media_urls,
      metadata: extraction.metadata.non_empty(),
      error: (!ok).then(|| "provider returned no media".to_owned()),
    }
  }

  pub fn failed(provider_id: &str, error: &Error) -> Self {
    Self {
      provider_id: provider_id.to_owned(),
      ok: false,
      media_urls: vec![],
      metadata: None,
      error: Some(error.to_string()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaResult {
  pub platform: Platform,
  pub source: String,
  pub medias: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Metadata>,
}

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".m3u8"];

pub fn is_video_url(url: &str) -> bool {
  let path = match Url::parse(url) {
    Ok(url) => url.path().to_ascii_lowercase(),
    Err(_) => strip_query(url).to_ascii_lowercase(),
  };

  VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Undo the escaping media URLs pick up when embedded in JSON or HTML.
pub fn unescape_url(raw: &str) -> String {
  raw
    .replace("\\u0026", "&")
    .replace("\\u002F", "/")
    .replace("\\u002f", "/")
    .replace("\\/", "/")
    .replace('\\', "")
    .replace("&amp;", "&")
    .trim()
    .to_owned()
}

// only the literal `http://` / `https://` forms; the WHATWG parser would
// also accept shorthands such as `https:cdn/a.jpg`.
fn absolute_http(url: &str) -> Option<String> {
  let scheme = url.get(..8)?.to_ascii_lowercase();
  if !scheme.starts_with("http://") && scheme != "https://" {
    return None;
  }

  let parsed = Url::parse(url).ok()?;
  if !matches!(parsed.scheme(), "http" | "https") {
    return None;
  }
  parsed.host_str().filter(|host| !host.is_empty())?;

  Some(parsed.to_string())
}

/// Unescape, keep absolute http(s) URLs only (in their serialized form),
/// dedupe keeping first occurrence. Videos are moved ahead of images when
/// `videos_first` is set.
pub fn normalize_media_urls(
  urls: impl IntoIterator<Item = String>,
  videos_first: bool,
) -> Vec<String> {
  let mut urls: Vec<String> = urls
    .into_iter()
    .filter_map(|url| absolute_http(&unescape_url(&url)))
    .unique()
    .collect();

  if videos_first {
    urls.sort_by_key(|url| !is_video_url(url));
  }

  urls
}
