//! Trafiklab client against a mock API.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use departure_monitor::domain::{ProviderId, StopRef, TransportType};
use departure_monitor::provider::{
    HttpConfig, HttpFetcher, Provider, ProviderError, RetryPolicy, TrafiklabClient,
    convert_stop_events,
};

fn client(server: &MockServer, key: Option<&str>) -> TrafiklabClient {
    let fetcher = HttpFetcher::new(HttpConfig::new(5).with_retry(RetryPolicy::none())).unwrap();
    TrafiklabClient::new(
        format!("{}/v1", server.uri()),
        key.map(String::from),
        fetcher,
    )
}

#[tokio::test]
async fn fetches_departures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/departures/740020749"))
        .and(query_param("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "departures": [
                {
                    "scheduled": "2025-07-01T10:00:00",
                    "realtime": "2025-07-01T10:03:00",
                    "is_realtime": true,
                    "route": {
                        "designation": "17",
                        "transport_mode": "METRO",
                        "destination": {"name": "Åkeshov"}
                    },
                    "scheduled_platform": {"designation": "2"}
                },
                {
                    "scheduled": "2025-07-01T10:05:00",
                    "is_realtime": false,
                    "route": {"designation": "4", "transport_mode": "BUS"}
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Some("secret"));
    let stop = StopRef::id("740020749").unwrap();
    let events = client.fetch_stop_events(&stop, 10).await.unwrap();
    assert_eq!(events.len(), 2);

    let departures = convert_stop_events(
        &events,
        &ProviderId::TrafiklabSe,
        ProviderId::TrafiklabSe.timezone(),
    );
    assert_eq!(departures[0].line, "17");
    assert_eq!(departures[0].destination, "Åkeshov");
    assert_eq!(departures[0].transport_type, TransportType::Subway);
    assert_eq!(departures[0].delay_minutes, 3);
    assert_eq!(departures[0].platform, "2");
    assert_eq!(departures[0].planned_hhmm(), "10:00");
    assert_eq!(departures[1].destination, "Unknown");
    assert_eq!(departures[1].transport_type, TransportType::Bus);
}

#[tokio::test]
async fn missing_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, None);
    let stop = StopRef::id("740020749").unwrap();
    assert!(matches!(
        client.fetch_stop_events(&stop, 10).await,
        Err(ProviderError::MissingApiKey { .. })
    ));
}

#[tokio::test]
async fn rejected_key_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Some("wrong"));
    let stop = StopRef::id("740020749").unwrap();
    assert!(matches!(
        client.fetch_stop_events(&stop, 10).await,
        Err(ProviderError::Unauthorized)
    ));
}

#[tokio::test]
async fn named_stops_are_rejected() {
    let server = MockServer::start().await;
    let client = client(&server, Some("secret"));
    let stop = StopRef::named("Stockholm", "T-Centralen").unwrap();
    assert!(matches!(
        client.fetch_stop_events(&stop, 10).await,
        Err(ProviderError::MissingStopId { .. })
    ));
}

#[tokio::test]
async fn searches_stops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/stops/name/Slussen"))
        .and(query_param("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stop_groups": [
                {
                    "id": 740098000,
                    "name": "Slussen, Stockholm",
                    "area_type": "META_STOP",
                    "transport_modes": ["BUS", "METRO"]
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = client(&server, Some("secret"));
    let results = client.search_stops("Slussen").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "740098000");
    assert_eq!(results[0].place, "Stockholm");
    assert_eq!(results[0].transport_modes, ["BUS", "METRO"]);
}
