use async_trait::async_trait;

use crate::{
  media::{Extraction, MediaRequest},
  Result,
};

use super::{direct::scrape, fetch_text, Provider};

// the same page scrape, routed through a public pass-through endpoint that
// takes the target as `?url=`, for hosts that block us directly.
pub struct HtmlProxy {
  id: String,
  endpoint: String,
  client: reqwest::Client,
}

impl HtmlProxy {
  pub fn new(id: &str, endpoint: &str, client: reqwest::Client) -> Self {
    Self {
      id: id.to_owned(),
      endpoint: endpoint.to_owned(),
      client,
    }
  }
}

#[async_trait]
impl Provider for HtmlProxy {
  fn id(&self) -> &str {
    &self.id
  }

  async fn extract(&self, request: &MediaRequest) -> Result<Extraction> {
    let target = request.target_url();
    let req = self
      .client
      .get(&self.endpoint)
      .query(&[("url", target.as_str())]);

    let html = fetch_text(self.id(), req).await?;
    scrape(self.id(), request, &html)
  }
}
