use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
  cache::ResolutionCache,
  config::Config,
  media::{normalize_media_urls, ExtractionAttempt, MediaRequest, MediaResult},
  platform::Platform,
  provider::{Provider, ProviderRegistry},
  Error, Result,
};

/// Turns a post URL into direct media URLs by walking the platform's
/// provider list in order until one of them yields something.
///
/// Providers run one at a time, each bounded by `timeout`. A failing or
/// slow provider only costs its own attempt; the next one is tried. The
/// first usable result is cached for a short while.
pub struct Resolver {
  registry: ProviderRegistry,
  cache: Option<ResolutionCache>,
  timeout: Duration,
  videos_first: bool,
}

impl Resolver {
  pub fn new(registry: ProviderRegistry, timeout: Duration) -> Self {
    Self {
      registry,
      cache: None,
      timeout,
      videos_first: false,
    }
  }

  pub fn from_config(config: &Config, client: &reqwest::Client) -> Self {
    let registry = ProviderRegistry::from_config(config, client);
    let resolver = Self::new(registry, config.provider_timeout)
      .videos_first(config.videos_first);

    if config.cache_capacity == 0 {
      return resolver;
    }
    resolver.with_cache(ResolutionCache::new(
      config.cache_ttl,
      config.cache_capacity,
    ))
  }

  pub fn with_cache(self, cache: ResolutionCache) -> Self {
    Self {
      cache: Some(cache),
      ..self
    }
  }

  pub fn videos_first(self, videos_first: bool) -> Self {
    Self {
      videos_first,
      ..self
    }
  }

  pub fn registry(&self) -> &ProviderRegistry {
    &self.registry
  }

  pub async fn resolve(&self, source_url: &str) -> Result<MediaResult> {
    let request = MediaRequest::new(source_url);
    let platform = request.platform();
    if platform == Platform::Unknown {
      return Err(Error::UnsupportedPlatform(request.source_url().to_owned()));
    }

    let cache_key = request.cache_key();
    if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&cache_key)) {
      info!(url = %request.source_url(), source = %hit.source, "cache hit");
      return Ok(hit);
    }

    for provider in self.registry.providers(platform) {
      let attempt = self.attempt(provider.as_ref(), &request).await;
      if !attempt.ok {
        warn!(
          %platform,
          provider = %attempt.provider_id,
          error = attempt.error.as_deref().unwrap_or("unknown"),
          "provider failed"
        );
        continue;
      }

      let medias = normalize_media_urls(attempt.media_urls, self.videos_first);
      if medias.is_empty() {
        warn!(
          %platform,
          provider = %attempt.provider_id,
          "provider returned no usable urls"
        );
        continue;
      }

      info!(
        %platform,
        provider = %attempt.provider_id,
        count = medias.len(),
        "resolved {}",
        request.source_url()
      );

      let result = MediaResult {
        platform,
        source: attempt.provider_id,
        medias,
        metadata: attempt.metadata,
      };

      if let Some(cache) = &self.cache {
        cache.insert(cache_key, result.clone());
      }

      return Ok(result);
    }

    Err(Error::NoMediaFound(request.source_url().to_owned()))
  }

  async fn attempt(
    &self,
    provider: &dyn Provider,
    request: &MediaRequest,
  ) -> ExtractionAttempt {
    debug!(provider = provider.id(), url = %request.source_url(), "attempting");

    match tokio::time::timeout(self.timeout, provider.attempt(request)).await {
      Ok(attempt) => attempt,
      Err(_) => {
        let err = Error::UpstreamTimeout {
          provider: provider.id().to_owned(),
          timeout: self.timeout,
        };
        ExtractionAttempt::failed(provider.id(), &err)
      }
    }
  }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc,
    },
    time::Instant,
  };

  use async_trait::async_trait;
  use axum::{
    response::Html,
    routing::{get, post},
    Json, Router,
  };
  use serde_json::json;

  use super::*;
  use crate::{
    media::Extraction,
    provider::{DirectPage, Tikwm},
    test_util::serve,
  };

  enum Behavior {
    Fail,
    Succeed(Vec<&'static str>),
    Hang,
  }

  struct Stub {
    id: &'static str,
    behavior: Behavior,
    calls: AtomicUsize,
  }

  impl Stub {
    fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
      Arc::new(Self {
        id,
        behavior,
        calls: AtomicUsize::new(0),
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Provider for Stub {
    fn id(&self) -> &str {
      self.id
    }

    async fn extract(&self, _request: &MediaRequest) -> Result<Extraction> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match &self.behavior {
        Behavior::Fail => Err(Error::provider(self.id, "blocked")),
        Behavior::Succeed(urls) => Ok(Extraction::from_urls(
          urls.iter().map(|u| u.to_string()).collect(),
        )),
        Behavior::Hang => {
          tokio::time::sleep(Duration::from_secs(60)).await;
          Ok(Extraction::default())
        }
      }
    }
  }

  fn tiktok_resolver(providers: &[Arc<Stub>]) -> Resolver {
    let providers = providers
      .iter()
      .map(|p| p.clone() as Arc<dyn Provider>)
      .collect();
    Resolver::new(
      ProviderRegistry::new(vec![], providers),
      Duration::from_millis(200),
    )
  }

  const TIKTOK_URL: &str = "https://www.tiktok.com/@user/video/123";

  #[tokio::test]
  async fn test_unknown_platform_makes_no_calls() {
    let a = Stub::new("a", Behavior::Succeed(vec!["https://cdn/x.mp4"]));
    let resolver = tiktok_resolver(&[a.clone()]);

    let err = resolver.resolve("https://youtube.com/watch?v=1").await;
    assert!(matches!(err, Err(Error::UnsupportedPlatform(_))));
    assert_eq!(a.calls(), 0);
  }

  #[tokio::test]
  async fn test_first_success_stops_the_chain() {
    let a = Stub::new("a", Behavior::Fail);
    let b = Stub::new("b", Behavior::Succeed(vec!["https://cdn/x.mp4"]));
    let c = Stub::new("c", Behavior::Succeed(vec!["https://cdn/y.mp4"]));
    let resolver = tiktok_resolver(&[a.clone(), b.clone(), c.clone()]);

    let result = resolver.resolve(TIKTOK_URL).await.unwrap();
    assert_eq!(result.source, "b");
    assert_eq!(result.medias, vec!["https://cdn/x.mp4"]);
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
  }

  #[tokio::test]
  async fn test_unusable_urls_fall_through() {
    let a = Stub::new("a", Behavior::Succeed(vec!["/relative.mp4", "blob:x"]));
    let b = Stub::new(
      "b",
      Behavior::Succeed(vec![
        "https://cdn/x.mp4",
        "https:\\/\\/cdn\\/x.mp4",
        "/relative.jpg",
      ]),
    );
    let resolver = tiktok_resolver(&[a.clone(), b.clone()]);

    let result = resolver.resolve(TIKTOK_URL).await.unwrap();
    assert_eq!(result.source, "b");
    assert_eq!(result.medias, vec!["https://cdn/x.mp4"]);
  }

  #[tokio::test]
  async fn test_all_failing_is_no_media_found() {
    let a = Stub::new("a", Behavior::Fail);
    let b = Stub::new("b", Behavior::Hang);
    let resolver = tiktok_resolver(&[a.clone(), b.clone()]);

    let err = resolver.resolve(TIKTOK_URL).await;
    assert!(matches!(err, Err(Error::NoMediaFound(_))));
    assert_eq!((a.calls(), b.calls()), (1, 1));
  }

  #[tokio::test]
  async fn test_timeouts_stay_within_budget() {
    let stubs: Vec<_> = ["a", "b", "c"]
      .into_iter()
      .map(|id| Stub::new(id, Behavior::Hang))
      .collect();
    let resolver = tiktok_resolver(&stubs);

    let started = Instant::now();
    let err = resolver.resolve(TIKTOK_URL).await.unwrap_err();

    assert_eq!(err.code(), "NoMediaFound");
    // three 200ms deadlines plus scheduling slack
    assert!(started.elapsed() < Duration::from_millis(1500));
  }

  #[tokio::test]
  async fn test_cache_hit_skips_providers() {
    let a = Stub::new("a", Behavior::Succeed(vec!["https://cdn/x.mp4"]));
    let resolver = tiktok_resolver(&[a.clone()])
      .with_cache(ResolutionCache::new(Duration::from_secs(60), 16));

    let first = resolver.resolve(TIKTOK_URL).await.unwrap();
    let second = resolver
      .resolve("https://www.tiktok.com/@user/video/123/?lang=fr")
      .await
      .unwrap();

    assert_eq!(first, second);
    assert_eq!(a.calls(), 1);
  }

  #[tokio::test]
  async fn test_failures_are_not_cached() {
    let a = Stub::new("a", Behavior::Fail);
    let resolver = tiktok_resolver(&[a.clone()])
      .with_cache(ResolutionCache::new(Duration::from_secs(60), 16));

    assert!(resolver.resolve(TIKTOK_URL).await.is_err());
    assert!(resolver.resolve(TIKTOK_URL).await.is_err());
    assert_eq!(a.calls(), 2);
  }

  #[tokio::test]
  async fn test_tikwm_end_to_end() {
    let app = Router::new().route(
      "/api/",
      post(|| async {
        Json(json!({"data": {"play": "https://cdn/video.mp4"}}))
      }),
    );
    let addr = serve(app).await;

    let tikwm: Arc<dyn Provider> = Arc::new(Tikwm::new(
      &format!("http://{addr}/api/"),
      reqwest::Client::new(),
    ));
    let resolver = Resolver::new(
      ProviderRegistry::new(vec![], vec![tikwm]),
      Duration::from_secs(5),
    );

    let result = resolver.resolve(TIKTOK_URL).await.unwrap();
    assert_eq!(result.platform, Platform::TikTok);
    assert_eq!(result.medias, vec!["https://cdn/video.mp4"]);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["platform"], "tiktok");
    assert_eq!(json["medias"], json!(["https://cdn/video.mp4"]));
  }

  #[tokio::test]
  async fn test_direct_scrape_end_to_end() {
    let app = Router::new().route(
      "/instagram.com/p/ABC/",
      get(|| async {
        Html(
          r#"<html><head>
            <meta property="og:image" content="https://cdn/img.jpg">
          </head><body></body></html>"#,
        )
      }),
    );
    let addr = serve(app).await;

    let direct: Arc<dyn Provider> =
      Arc::new(DirectPage::new(reqwest::Client::new()));
    let resolver = Resolver::new(
      ProviderRegistry::new(vec![direct], vec![]),
      Duration::from_secs(5),
    );

    let result = resolver
      .resolve(&format!("http://{addr}/instagram.com/p/ABC/"))
      .await
      .unwrap();
    assert_eq!(result.platform, Platform::Instagram);
    assert_eq!(result.source, "direct");
    assert_eq!(result.medias, vec!["https://cdn/img.jpg"]);
  }

  #[tokio::test]
  async fn test_unreachable_providers_end_to_end() {
    let app = Router::new().route(
      "/api/",
      post(|| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Json(json!({"data": {"play": "https://cdn/late.mp4"}}))
      }),
    );
    let addr = serve(app).await;

    let client = reqwest::Client::new();
    let providers: Vec<Arc<dyn Provider>> = vec![
      Arc::new(Tikwm::new(&format!("http://{addr}/api/"), client.clone())),
      Arc::new(DirectPage::new(client)),
    ];
    let resolver = Resolver::new(
      ProviderRegistry::new(vec![], providers),
      Duration::from_millis(300),
    );

    let started = Instant::now();
    let url = format!("http://{addr}/tiktok.com/@user/video/1");
    let err = resolver.resolve(&url).await.unwrap_err();

    assert_eq!(err.code(), "NoMediaFound");
    assert!(started.elapsed() < Duration::from_secs(3));
  }
}
