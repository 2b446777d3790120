use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::{
  media::{Extraction, MediaRequest},
  Error, Result,
};

use super::Provider;

static DOWNLOAD_LINK_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"href="([^"]+\.(?:mp4|jpg))""#).unwrap());

pub struct Snapsave {
  endpoint: String,
  client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SnapsaveResp {
  // rendered html fragment with download links
  #[serde(default)]
  data: String,
}

impl Snapsave {
  pub fn new(endpoint: &str, client: reqwest::Client) -> Self {
    Self {
      endpoint: endpoint.to_owned(),
      client,
    }
  }
}

fn download_links(html: &str) -> Vec<String> {
  DOWNLOAD_LINK_REGEX
    .captures_iter(html)
    .map(|cap| cap[1].to_owned())
    .collect()
}

#[async_trait]
impl Provider for Snapsave {
  fn id(&self) -> &str {
    "snapsave"
  }

  async fn extract(&self, request: &MediaRequest) -> Result<Extraction> {
    let target = request.target_url();
    let resp: SnapsaveResp = self
      .client
      .post(&self.endpoint)
      .form(&[("q", target.as_str()), ("lang", "en")])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    let links = download_links(&resp.data);
    if links.is_empty() {
      return Err(Error::provider(self.id(), "no download links in response"));
    }

    Ok(Extraction::from_urls(links))
  }
}
