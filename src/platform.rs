use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  Instagram,
  TikTok,
  Unknown,
}

impl Platform {
  pub fn as_str(&self) -> &'static str {
    match self {
      Platform::Instagram => "instagram",
      Platform::TikTok => "tiktok",
      Platform::Unknown => "unknown",
    }
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// plain substring containment, checked in priority order.
pub fn classify(url: &str) -> Platform {
  if url.contains("instagram.com") {
    Platform::Instagram
  } else if url.contains("tiktok.com") {
    Platform::TikTok
  } else {
    Platform::Unknown
  }
}
