use async_trait::async_trait;
use tracing::debug;

use crate::{
  media::{Extraction, MediaRequest},
  parser::parse_page,
  util::excerpt,
  Error, Result,
};

use super::{fetch_text, Provider};

// fetch the post page itself and dig the media out of its markup.
pub struct DirectPage {
  client: reqwest::Client,
}

impl DirectPage {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Provider for DirectPage {
  fn id(&self) -> &str {
    "direct"
  }

  async fn extract(&self, request: &MediaRequest) -> Result<Extraction> {
    let url = request.target_url();
    let html = fetch_text(self.id(), self.client.get(&url)).await?;
    scrape(self.id(), request, &html)
  }
}

/// Run the request platform's parser chain over a fetched page.
pub(super) fn scrape(
  provider: &str,
  request: &MediaRequest,
  html: &str,
) -> Result<Extraction> {
  match parse_page(request.platform(), html) {
    Some((layer, extraction)) => {
      let found = extraction.media_urls.len();
      debug!(provider, ?layer, found, "page parsed");
      Ok(extraction)
    }
    None => {
      debug!(provider, page = excerpt(html, 200), "no media in page");
      Err(Error::provider(provider, "no media found in page"))
    }
  }
}

#[cfg(test)]
mod test {
  use axum::{routing::get, Router};

  use super::*;
  use crate::test_util::serve;

  #[tokio::test]
  async fn test_direct_page_og_image() {
    let app = Router::new().route(
      "/instagram.com/p/ABC/",
      get(|| async {
        axum::response::Html(
          r#"<html><head>
            <meta property="og:image" content="https://cdn/img.jpg">
          </head></html>"#,
        )
      }),
    );
    let addr = serve(app).await;

    let provider = DirectPage::new(reqwest::Client::new());
    let request =
      MediaRequest::new(format!("http://{addr}/instagram.com/p/ABC/?igsh=1"));
    let attempt = provider.attempt(&request).await;

    assert!(attempt.ok);
    assert_eq!(attempt.provider_id, "direct");
    assert_eq!(attempt.media_urls, vec!["https://cdn/img.jpg"]);
  }

  #[tokio::test]
  async fn test_direct_page_http_error_is_failed_attempt() {
    let addr = serve(Router::new()).await;

    let provider = DirectPage::new(reqwest::Client::new());
    let request =
      MediaRequest::new(format!("http://{addr}/tiktok.com/@u/video/1"));
    let attempt = provider.attempt(&request).await;

    assert!(!attempt.ok);
    assert!(attempt.media_urls.is_empty());
    assert!(attempt.error.unwrap().contains("404"));
  }
}
