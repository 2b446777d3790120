use serde_json::Value;

use crate::{
  media::{Extraction, Metadata},
  W,
};

impl W<&Value> {
  pub fn str_at(&self, pointer: &str) -> Option<String> {
    self
      .0
      .pointer(pointer)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
      .map(str::to_owned)
  }

  fn bool_at(&self, pointer: &str) -> bool {
    self
      .0
      .pointer(pointer)
      .and_then(Value::as_bool)
      .unwrap_or(false)
  }

  /// Urls from a value that is a string, an array of strings, an object
  /// with a `url` (or `contentUrl`) field, or an array of those.
  pub fn url_values(&self) -> Vec<String> {
    match self.0 {
      Value::String(s) => vec![s.clone()],
      Value::Array(items) => {
        items.iter().flat_map(|item| W(item).url_values()).collect()
      }
      Value::Object(_) => self
        .str_at("/url")
        .or_else(|| self.str_at("/contentUrl"))
        .into_iter()
        .collect(),
      _ => vec![],
    }
  }

  /// Media of an instagram `shortcode_media` node, carousel children
  /// included.
  pub fn shortcode_media(&self) -> Extraction {
    let urls = match self.0.pointer("/edge_sidecar_to_children/edges") {
      Some(Value::Array(edges)) => edges
        .iter()
        .filter_map(|edge| edge.get("node"))
        .filter_map(|node| W(node).node_media_url())
        .collect(),
      _ => self.node_media_url().into_iter().collect(),
    };

    let metadata = Metadata {
      author: self.str_at("/owner/username"),
      caption: self.str_at("/edge_media_to_caption/edges/0/node/text"),
      music: None,
    };

    Extraction::from_urls(urls).with_metadata(metadata)
  }

  fn node_media_url(&self) -> Option<String> {
    if self.bool_at("/is_video") {
      if let Some(url) = self.str_at("/video_url") {
        return Some(url);
      }
    }

    self.str_at("/display_url")
  }
}

/// Cut the JSON object starting at the first `{` at or after `from` out of
/// `text`, tracking brace depth outside of string literals.
pub fn balanced_json_object(text: &str, from: usize) -> Option<&str> {
  let start = from + text.get(from..)?.find('{')?;

  let mut depth: u32 = 0;
  let mut in_string = false;
  let mut escaped = false;

  for (i, ch) in text[start..].char_indices() {
    if escaped {
      escaped = false;
      continue;
    }

    match ch {
      '\\' if in_string => escaped = true,
      '"' => in_string = !in_string,
      _ if in_string => {}
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          return Some(&text[start..start + i + 1]);
        }
      }
      _ => {}
    }
  }

  None
}

#[cfg(test)]
mod test {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_balanced_json_object() {
    let text = r#"x = {"a": {"b": "}{\"}"}, "c": 1}; trailing }"#;
    assert_eq!(
      balanced_json_object(text, 0),
      Some(r#"{"a": {"b": "}{\"}"}, "c": 1}"#)
    );

    assert_eq!(balanced_json_object("no object here", 0), None);
    assert_eq!(balanced_json_object("{\"unterminated\": 1", 0), None);
    assert_eq!(balanced_json_object("{}", 10), None);
  }

  #[test]
  fn test_shortcode_media_carousel() {
    let media = json!({
      "owner": {"username": "someone"},
      "edge_media_to_caption": {"edges": [{"node": {"text": "hi"}}]},
      "edge_sidecar_to_children": {"edges": [
        {"node": {
          "is_video": true,
          "video_url": "https://cdn/1.mp4",
          "display_url": "https://cdn/1.jpg",
        }},
        {"node": {"is_video": false, "display_url": "https://cdn/2.jpg"}},
      ]},
    });

    let extraction = W(&media).shortcode_media();
    assert_eq!(
      extraction.media_urls,
      vec!["https://cdn/1.mp4".to_string(), "https://cdn/2.jpg".to_string()]
    );
    assert_eq!(extraction.metadata.author.as_deref(), Some("someone"));
    assert_eq!(extraction.metadata.caption.as_deref(), Some("hi"));
  }

  #[test]
  fn test_shortcode_media_single() {
    let video = json!({
      "is_video": true,
      "video_url": "https://cdn/v.mp4",
      "display_url": "https://cdn/v.jpg",
    });
    assert_eq!(
      W(&video).shortcode_media().media_urls,
      vec!["https://cdn/v.mp4"]
    );

    let image = json!({"is_video": false, "display_url": "https://cdn/i.jpg"});
    assert_eq!(
      W(&image).shortcode_media().media_urls,
      vec!["https://cdn/i.jpg"]
    );

    assert!(W(&json!({})).shortcode_media().is_empty());
  }

  #[test]
  fn test_url_values() {
    let value = json!(["https://a/1.jpg", {"url": "https://a/2.jpg"}, 3]);
    assert_eq!(
      W(&value).url_values(),
      vec!["https://a/1.jpg".to_string(), "https://a/2.jpg".to_string()]
    );
  }
}
