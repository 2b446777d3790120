use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
  media::{Extraction, MediaRequest},
  Error, Result, W,
};

use super::Provider;

/// Response layout of a RapidAPI-hosted downloader. Each service has its
/// own, so the mapping is spelled out per schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RapidApiSchema {
  /// `GET /index?url=` answering `{"media": "<url>" | ["<url>", ...]}`
  InstagramMedia,
  /// `GET /media?url=` answering
  /// `{"data": {"video_link_nwm_hd": "<url>", "video_link_nwm": "<url>"}}`
  TikTokNoWatermark,
}

impl RapidApiSchema {
  fn path(&self) -> &'static str {
    match self {
      RapidApiSchema::InstagramMedia => "/index",
      RapidApiSchema::TikTokNoWatermark => "/media",
    }
  }
}

pub struct RapidApi {
  id: String,
  schema: RapidApiSchema,
  base_url: String,
  host: String,
  key: String,
  client: reqwest::Client,
}

impl RapidApi {
  pub fn new(
    id: &str,
    schema: RapidApiSchema,
    host: &str,
    key: &str,
    client: reqwest::Client,
  ) -> Self {
    let base_url = format!("https://{host}");
    Self::with_base_url(id, schema, &base_url, host, key, client)
  }

  // base_url differs from the host only when pointed at a local stub.
  pub fn with_base_url(
    id: &str,
    schema: RapidApiSchema,
    base_url: &str,
    host: &str,
    key: &str,
    client: reqwest::Client,
  ) -> Self {
    Self {
      id: id.to_owned(),
      schema,
      base_url: base_url.trim_end_matches('/').to_owned(),
      host: host.to_owned(),
      key: key.to_owned(),
      client,
    }
  }

  async fn instagram_media(
    &self,
    resp: reqwest::Response,
  ) -> Result<Vec<String>> {
    use serde_query::{DeserializeQuery, Query};

    #[derive(DeserializeQuery)]
    struct MediaResp {
      #[query(".media")]
      media: Value,
    }

    let resp: MediaResp = resp.json::<Query<MediaResp>>().await?.into();
    Ok(W(&resp.media).url_values())
  }

  async fn tiktok_no_watermark(
    &self,
    resp: reqwest::Response,
  ) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct NoWatermarkResp {
      data: Option<NoWatermarkData>,
    }

    #[derive(Deserialize)]
    struct NoWatermarkData {
      video_link_nwm_hd: Option<String>,
      video_link_nwm: Option<String>,
    }

    let resp: NoWatermarkResp = resp.json().await?;
    let url = resp
      .data
      .and_then(|data| data.video_link_nwm_hd.or(data.video_link_nwm));

    Ok(url.into_iter().collect())
  }
}

#[async_trait]
impl Provider for RapidApi {
  fn id(&self) -> &str {
    &self.id
  }

  async fn extract(&self, request: &MediaRequest) -> Result<Extraction> {
    let target = request.target_url();
    let resp = self
      .client
      .get(format!("{}{}", self.base_url, self.schema.path()))
      .query(&[("url", target.as_str())])
      .header("X-RapidAPI-Key", &self.key)
      .header("X-RapidAPI-Host", &self.host)
      .send()
      .await?
      .error_for_status()?;

    let urls = match self.schema {
      RapidApiSchema::InstagramMedia => self.instagram_media(resp).await?,
      RapidApiSchema::TikTokNoWatermark => {
        self.tiktok_no_watermark(resp).await?
      }
    };

    if urls.is_empty() {
      return Err(Error::provider(self.id(), "no media in response"));
    }

    Ok(Extraction::from_urls(urls))
  }
}

#[cfg(test)]
mod test {
  use axum::{http::HeaderMap, routing::get, Json, Router};
  use serde_json::json;

  use super::*;
  use crate::test_util::serve;

  fn stub() -> Router {
    Router::new()
      .route(
        "/index",
        get(|headers: HeaderMap| async move {
          assert_eq!(headers["x-rapidapi-key"], "secret");
          Json(json!({"media": ["https://cdn/1.jpg", "https://cdn/2.mp4"]}))
        }),
      )
      .route(
        "/media",
        get(|| async {
          Json(json!({"data": {"video_link_nwm": "https://cdn/nwm.mp4"}}))
        }),
      )
  }

  #[tokio::test]
  async fn test_instagram_media_schema() {
    let addr = serve(stub()).await;
    let provider = RapidApi::with_base_url(
      "rapidapi-instagram",
      RapidApiSchema::InstagramMedia,
      &format!("http://{addr}"),
      "instagram.p.rapidapi.com",
      "secret",
      reqwest::Client::new(),
    );

    let attempt = provider
      .attempt(&MediaRequest::new("https://www.instagram.com/p/ABC/"))
      .await;
    assert_eq!(
      attempt.media_urls,
      vec!["https://cdn/1.jpg", "https://cdn/2.mp4"]
    );
  }

  #[tokio::test]
  async fn test_tiktok_schema_falls_back_to_sd() {
    let addr = serve(stub()).await;
    let provider = RapidApi::with_base_url(
      "rapidapi-tiktok",
      RapidApiSchema::TikTokNoWatermark,
      &format!("http://{addr}/"),
      "tiktok.p.rapidapi.com",
      "secret",
      reqwest::Client::new(),
    );

    let attempt = provider
      .attempt(&MediaRequest::new("https://www.tiktok.com/@user/video/123"))
      .await;
    assert!(attempt.ok);
    assert_eq!(attempt.media_urls, vec!["https://cdn/nwm.mp4"]);
  }
}
