//! Retry and backoff of the shared HTTP fetcher.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use departure_monitor::provider::{HttpConfig, HttpFetcher, ProviderError, RetryPolicy};

fn fetcher(max_attempts: u32) -> HttpFetcher {
    let retry = RetryPolicy {
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 10,
    };
    HttpFetcher::new(HttpConfig::new(5).with_retry(retry)).unwrap()
}

async fn get(fetcher: &HttpFetcher, server: &MockServer) -> Result<Vec<u8>, ProviderError> {
    let url = format!("{}/board", server.uri());
    fetcher.fetch(|http| http.get(&url)).await
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let body = get(&fetcher(3), &server).await.unwrap();
    assert_eq!(body, b"{}");
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(4)
        .mount(&server)
        .await;

    match get(&fetcher(4), &server).await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream down");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert!(matches!(
        get(&fetcher(3), &server).await,
        Err(ProviderError::NotFound)
    ));
}

#[tokio::test]
async fn forbidden_is_unauthorized_and_final() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    assert!(matches!(
        get(&fetcher(3), &server).await,
        Err(ProviderError::Unauthorized)
    ));
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    assert!(matches!(
        get(&fetcher(2), &server).await,
        Err(ProviderError::RateLimited {
            retry_after_secs: Some(0)
        })
    ));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let retry = RetryPolicy::none();
    let fetcher = HttpFetcher::new(HttpConfig::new(1).with_retry(retry)).unwrap();
    assert!(matches!(
        get(&fetcher, &server).await,
        Err(ProviderError::Timeout { timeout_secs: 1 })
    ));
}
