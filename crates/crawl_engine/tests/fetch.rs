use std::sync::{Arc, Mutex};
use std::time::Duration;

use crawl_core::NormalizedUrl;
use crawl_engine::{
    fetch_with_policy, FailureKind, FetchError, FetchPolicy, FetchSettings, Fetcher, RateLimiter,
    RawPage, ReqwestFetcher, WaitStrategy,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(raw: &str) -> NormalizedUrl {
    NormalizedUrl::parse(raw).unwrap()
}

fn unpaced() -> RateLimiter {
    RateLimiter::new(Duration::ZERO, 0.0).unwrap()
}

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new(FetchSettings::default()).unwrap()
}

#[tokio::test]
async fn fetcher_returns_decoded_html() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let target = url(&format!("{}/doc", server.uri()));
    let page = fetcher()
        .fetch(&target, WaitStrategy::FullLoad, Duration::from_secs(5))
        .await
        .expect("fetch ok");

    assert_eq!(page.html, "<html>ok</html>");
    assert_eq!(page.final_url.as_str(), target.as_str());
    assert!(page.content_type.unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let target = url(&format!("{}/missing", server.uri()));
    let err = fetcher()
        .fetch(&target, WaitStrategy::FullLoad, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_raw("slow", "text/html"),
        )
        .mount(&server)
        .await;

    let target = url(&format!("{}/slow", server.uri()));
    let err = fetcher()
        .fetch(&target, WaitStrategy::ContentLoaded, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_non_html_content() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
        .mount(&server)
        .await;

    let target = url(&format!("{}/logo", server.uri()));
    let err = fetcher()
        .fetch(&target, WaitStrategy::FullLoad, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::UnsupportedContentType { .. }));
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(64), "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 16,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings).unwrap();
    let target = url(&format!("{}/large", server.uri()));
    let err = fetcher
        .fetch(&target, WaitStrategy::FullLoad, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 16, .. }));
}

#[tokio::test]
async fn fetcher_follows_redirects_and_reports_final_url() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>moved</p>", "text/html"))
        .mount(&server)
        .await;

    let target = url(&format!("{}/old", server.uri()));
    let page = fetcher()
        .fetch(&target, WaitStrategy::FullLoad, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(page.final_url.path(), "/new/");
}

/// Times out on the full-load wait, succeeds on the content-loaded one.
struct SlowFullLoad {
    waits: Mutex<Vec<(WaitStrategy, Duration)>>,
}

#[async_trait::async_trait]
impl Fetcher for SlowFullLoad {
    async fn fetch(
        &self,
        url: &NormalizedUrl,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<RawPage, FetchError> {
        self.waits.lock().unwrap().push((wait, timeout));
        match wait {
            WaitStrategy::FullLoad => {
                tokio::time::sleep(timeout * 2).await;
                unreachable!("the policy cancels the full-load attempt")
            }
            WaitStrategy::ContentLoaded => Ok(RawPage::new(url.as_url().clone(), "<p>late</p>")),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn policy_retries_once_with_content_loaded_wait() {
    crawl_logging::initialize_for_tests();
    let fetcher = Arc::new(SlowFullLoad {
        waits: Mutex::new(Vec::new()),
    });
    let outcome = fetch_with_policy(
        fetcher.as_ref(),
        &url("https://docs.example.com/"),
        FetchPolicy::default(),
        &unpaced(),
    )
    .await;

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.wait, WaitStrategy::ContentLoaded);
    assert_eq!(outcome.result.unwrap().html, "<p>late</p>");
    assert_eq!(
        *fetcher.waits.lock().unwrap(),
        vec![
            (WaitStrategy::FullLoad, Duration::from_secs(30)),
            (WaitStrategy::ContentLoaded, Duration::from_secs(15)),
        ]
    );
}

struct AlwaysFails(FailureKind);

#[async_trait::async_trait]
impl Fetcher for AlwaysFails {
    async fn fetch(
        &self,
        _url: &NormalizedUrl,
        _wait: WaitStrategy,
        _timeout: Duration,
    ) -> Result<RawPage, FetchError> {
        Err(FetchError::new(self.0.clone(), "scripted failure"))
    }
}

#[tokio::test(start_paused = true)]
async fn policy_gives_up_after_second_timeout_and_skips_retry_otherwise() {
    crawl_logging::initialize_for_tests();
    let target = url("https://docs.example.com/");

    let limiter = unpaced();

    let timed_out = fetch_with_policy(
        &AlwaysFails(FailureKind::Timeout),
        &target,
        FetchPolicy::default(),
        &limiter,
    )
    .await;
    assert_eq!(timed_out.attempts, 2);
    assert!(timed_out.result.unwrap_err().is_timeout());

    let refused = fetch_with_policy(
        &AlwaysFails(FailureKind::Network),
        &target,
        FetchPolicy::default(),
        &limiter,
    )
    .await;
    assert_eq!(refused.attempts, 1);
    assert_eq!(refused.result.unwrap_err().kind, FailureKind::Network);
}

#[tokio::test(start_paused = true)]
async fn retry_waits_for_the_domain_slot() {
    crawl_logging::initialize_for_tests();
    let fetcher = SlowFullLoad {
        waits: Mutex::new(Vec::new()),
    };
    let limiter = RateLimiter::new(Duration::from_secs(2), 0.0).unwrap();
    let policy = FetchPolicy {
        full_load_timeout: Duration::from_millis(500),
        content_loaded_timeout: Duration::from_millis(500),
    };
    let start = tokio::time::Instant::now();

    let outcome =
        fetch_with_policy(&fetcher, &url("https://docs.example.com/"), policy, &limiter).await;

    assert_eq!(outcome.attempts, 2);
    assert!(outcome.result.is_ok());
    // The retry starts one interval after the first attempt, not when it timed out.
    assert!(start.elapsed() >= Duration::from_secs(2), "{:?}", start.elapsed());
}
