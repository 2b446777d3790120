use async_trait::async_trait;
use serde::Deserialize;

use crate::{
  media::{Extraction, MediaRequest, Metadata},
  Error, Result,
};

use super::Provider;

pub struct Tikwm {
  endpoint: String,
  client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TikwmResp {
  #[serde(default)]
  msg: Option<String>,
  data: Option<TikwmData>,
}

#[derive(Debug, Deserialize)]
struct TikwmData {
  play: Option<String>,
  hdplay: Option<String>,
  // null on video posts
  images: Option<Vec<String>>,
  music: Option<String>,
  title: Option<String>,
  author: Option<TikwmAuthor>,
}

#[derive(Debug, Deserialize)]
struct TikwmAuthor {
  unique_id: Option<String>,
}

impl Tikwm {
  pub fn new(endpoint: &str, client: reqwest::Client) -> Self {
    Self {
      endpoint: endpoint.to_owned(),
      client,
    }
  }
}

impl TikwmData {
  fn into_extraction(self) -> Extraction {
    // photo posts carry a slideshow, `play` is then just the soundtrack
    let images = self.images.unwrap_or_default();
    let urls = if !images.is_empty() {
      images
    } else {
      self.play.or(self.hdplay).into_iter().collect()
    };

    let metadata = Metadata {
      author: self.author.and_then(|a| a.unique_id),
      caption: self.title.filter(|t| !t.is_empty()),
      music: self.music,
    };

    Extraction::from_urls(urls).with_metadata(metadata)
  }
}

#[async_trait]
impl Provider for Tikwm {
  fn id(&self) -> &str {
    "tikwm"
  }

  async fn extract(&self, request: &MediaRequest) -> Result<Extraction> {
    let target = request.target_url();
    let resp: TikwmResp = self
      .client
      .post(&self.endpoint)
      .form(&[("url", target.as_str()), ("hd", "1")])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    match resp.data {
      Some(data) => Ok(data.into_extraction()),
      None => Err(Error::provider(
        self.id(),
        resp.msg.unwrap_or_else(|| "response has no data".to_owned()),
      )),
    }
  }
}
