//! Layered page parsing. Each layer is a pure function over the raw page
//! text; a platform runs its layers in order and keeps the first one that
//! finds anything.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
  media::{Extraction, Metadata},
  platform::Platform,
  util::balanced_json_object,
  W,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLayer {
  LdJson,
  SharedData,
  AdditionalData,
  TikTokState,
  OpenGraph,
  RawUrls,
}

const INSTAGRAM_LAYERS: &[ParseLayer] = &[
  ParseLayer::LdJson,
  ParseLayer::SharedData,
  ParseLayer::AdditionalData,
  ParseLayer::OpenGraph,
  ParseLayer::RawUrls,
];

const TIKTOK_LAYERS: &[ParseLayer] = &[
  ParseLayer::LdJson,
  ParseLayer::TikTokState,
  ParseLayer::OpenGraph,
  ParseLayer::RawUrls,
];

const RAW_URL_LIMIT: usize = 5;

impl ParseLayer {
  pub fn for_platform(platform: Platform) -> &'static [ParseLayer] {
    match platform {
      Platform::Instagram => INSTAGRAM_LAYERS,
      Platform::TikTok => TIKTOK_LAYERS,
      Platform::Unknown => &[],
    }
  }

  pub fn parse(self, html: &str) -> Extraction {
    match self {
      ParseLayer::LdJson => ld_json(html),
      ParseLayer::SharedData => shared_data(html),
      ParseLayer::AdditionalData => additional_data(html),
      ParseLayer::TikTokState => tiktok_state(html),
      ParseLayer::OpenGraph => open_graph(html),
      ParseLayer::RawUrls => raw_urls(html),
    }
  }
}

/// Run the platform's layers over `html`, returning the first non-empty
/// result and the layer that produced it.
pub fn parse_page(
  platform: Platform,
  html: &str,
) -> Option<(ParseLayer, Extraction)> {
  ParseLayer::for_platform(platform).iter().find_map(|layer| {
    let extraction = layer.parse(html);
    (!extraction.is_empty()).then_some((*layer, extraction))
  })
}

static LD_JSON_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    concat!(
      r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>"#,
      r#"(.*?)</script>"#,
    ),
  )
  .unwrap()
});

fn ld_json(html: &str) -> Extraction {
  let blocks: Vec<Value> = LD_JSON_REGEX
    .captures_iter(html)
    .filter_map(|cap| serde_json::from_str(cap[1].trim()).ok())
    .collect();

  let mut videos = Vec::new();
  let mut images = Vec::new();
  let mut metadata = Metadata::default();

  for block in &blocks {
    collect_ld_json(block, &mut videos, &mut images, &mut metadata);
  }

  let urls = if videos.is_empty() { images } else { videos };
  Extraction::from_urls(urls).with_metadata(metadata)
}

const LD_JSON_SKIPPED_KEYS: &[&str] = &["author", "image", "thumbnail"];

fn collect_ld_json(
  value: &Value,
  videos: &mut Vec<String>,
  images: &mut Vec<String>,
  metadata: &mut Metadata,
) {
  match value {
    Value::Array(items) => {
      for item in items {
        collect_ld_json(item, videos, images, metadata);
      }
    }
    Value::Object(map) => {
      if let Some(url) = map.get("contentUrl") {
        match map.get("@type").and_then(Value::as_str) {
          Some("ImageObject") => images.extend(W(url).url_values()),
          _ => videos.extend(W(url).url_values()),
        }
      }
      if let Some(image) = map.get("image") {
        images.extend(W(image).url_values());
      }

      if metadata.author.is_none() {
        metadata.author = W(value)
          .str_at("/author/alternateName")
          .or_else(|| W(value).str_at("/author/name"));
      }
      if metadata.caption.is_none() {
        metadata.caption = W(value)
          .str_at("/caption")
          .or_else(|| W(value).str_at("/description"));
      }

      // `image` is collected above, thumbnails are previews
      for (key, child) in map {
        if LD_JSON_SKIPPED_KEYS.contains(&key.as_str()) {
          continue;
        }
        if child.is_object() || child.is_array() {
          collect_ld_json(child, videos, images, metadata);
        }
      }
    }
    _ => {}
  }
}

fn shared_data(html: &str) -> Extraction {
  let Some(pos) = html.find("window._sharedData") else {
    return Extraction::default();
  };

  balanced_json_object(html, pos)
    .and_then(|json| serde_json::from_str::<Value>(json).ok())
    .and_then(|data| {
      data
        .pointer("/entry_data/PostPage/0/graphql/shortcode_media")
        .map(|media| W(media).shortcode_media())
    })
    .unwrap_or_default()
}

const SHORTCODE_MEDIA_NEEDLES: &[&str] =
  &["\"xdt_shortcode_media\":", "\"shortcode_media\":"];

fn additional_data(html: &str) -> Extraction {
  if let Some(pos) = html.find("window.__additionalDataLoaded(") {
    let media = balanced_json_object(html, pos)
      .and_then(|json| serde_json::from_str::<Value>(json).ok())
      .and_then(|data| {
        data
          .pointer("/graphql/shortcode_media")
          .map(|media| W(media).shortcode_media())
      });

    if let Some(media) = media.filter(|m| !m.is_empty()) {
      return media;
    }
  }

  // newer pages inline the media node into a larger relay payload
  for needle in SHORTCODE_MEDIA_NEEDLES {
    let Some(pos) = html.find(needle) else {
      continue;
    };

    let media = balanced_json_object(html, pos + needle.len())
      .and_then(|json| serde_json::from_str::<Value>(json).ok())
      .map(|media| W(&media).shortcode_media())
      .unwrap_or_default();

    if !media.is_empty() {
      return media;
    }
  }

  Extraction::default()
}

static TIKTOK_STATE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
  ["playAddr", "downloadAddr", "contentUrl"]
    .iter()
    .map(|key| Regex::new(&format!(r#""{key}"\s*:\s*"([^"]+)""#)).unwrap())
    .collect()
});

fn tiktok_state(html: &str) -> Extraction {
  let url = TIKTOK_STATE_REGEXES
    .iter()
    .find_map(|re| re.captures(html).map(|cap| cap[1].to_owned()));

  Extraction::from_urls(url.into_iter().collect())
}

const OG_VIDEO_PROPERTIES: &[&str] =
  &["og:video", "og:video:url", "og:video:secure_url"];

fn open_graph(html: &str) -> Extraction {
  let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
    return Extraction::default();
  };

  let mut videos = Vec::new();
  let mut images = Vec::new();
  let mut caption = None;

  let node_iter = dom
    .query_selector("meta[content]")
    .expect("selector is hard-coded, thus must be valid");

  for node in node_iter {
    let Some(tag) = node.get(dom.parser()).and_then(|n| n.as_tag()) else {
      continue;
    };

    let attrs = tag.attributes();
    let property = attrs
      .get("property")
      .flatten()
      .or_else(|| attrs.get("name").flatten())
      .map(|p| p.as_utf8_str().to_ascii_lowercase());
    let content = attrs
      .get("content")
      .flatten()
      .map(|c| c.as_utf8_str().into_owned());

    let (Some(property), Some(content)) = (property, content) else {
      continue;
    };

    match property.as_str() {
      p if OG_VIDEO_PROPERTIES.contains(&p) => videos.push(content),
      "og:image" | "og:image:url" | "og:image:secure_url" => {
        images.push(content)
      }
      "og:description" if caption.is_none() => caption = Some(content),
      _ => {}
    }
  }

  let urls = if videos.is_empty() { images } else { videos };
  let metadata = Metadata {
    caption,
    ..Default::default()
  };

  Extraction::from_urls(urls).with_metadata(metadata)
}

static RAW_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?i)https?:(?:\\?/){2}[^"'<>\s]+?\.(?:mp4|jpe?g|png|webp)\b"#)
    .unwrap()
});

fn raw_urls(html: &str) -> Extraction {
  let urls = RAW_URL_REGEX
    .find_iter(html)
    .map(|m| m.as_str().to_owned())
    .take(RAW_URL_LIMIT)
    .collect();

  Extraction::from_urls(urls)
}
