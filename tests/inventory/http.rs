//! The HTTP inventory clients against a mock management API.

use dnsreconcile::{
    config::Config,
    core::{InventorySource, RecordType},
    inventory::{build_http_client, Credentials, InventoryError, LegacyGtmSource, PagedZoneSource},
};
use serde_json::json;
use wiremock::{
    matchers::{basic_auth, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn credentials() -> Credentials {
    Credentials {
        username: "admin".to_string(),
        password: "secret".to_string(),
    }
}

fn client() -> reqwest::Client {
    build_http_client(&Config::default().inventory).unwrap()
}

fn legacy_source(server: &MockServer, record_types: Vec<RecordType>) -> LegacyGtmSource {
    LegacyGtmSource::new(
        client(),
        format!("{}/mgmt/tm/gtm/wideip/", server.uri()),
        credentials(),
        record_types,
    )
}

fn zone_source(server: &MockServer, page_size: u64) -> PagedZoneSource {
    PagedZoneSource::new(
        client(),
        format!("{}/views/ADD/dzone", server.uri()),
        credentials(),
        page_size,
        RecordType::A,
    )
}

fn zone_page(page_num: &str, gmaps: &[&str], total_size: serde_json::Value) -> Mock {
    Mock::given(method("GET"))
        .and(path("/views/ADD/dzone"))
        .and(query_param("page_num", page_num))
        .and(query_param("with_add", "yes"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [{ "gmaps": gmaps }],
            "total_size": total_size,
        })))
}

#[tokio::test]
async fn test_legacy_source_fetches_each_record_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/gtm/wideip/a"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "tm:gtm:wideip:a:acollectionstate",
            "items": [{ "name": "Foo.com" }, { "name": "bar.com." }],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/gtm/wideip/cname"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "name": "www.foo.com" }],
        })))
        .expect(1)
        .mount(&server)
        .await;
    // No wide IPs of this type: the collection has no `items` key.
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/gtm/wideip/srv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "tm:gtm:wideip:srv:srvcollectionstate",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = legacy_source(
        &server,
        vec![RecordType::A, RecordType::CNAME, RecordType::SRV],
    );
    let inventory = source.fetch().await.unwrap();

    assert_eq!(
        inventory.names_of(RecordType::A).collect::<Vec<_>>(),
        vec!["bar.com.", "foo.com."]
    );
    assert_eq!(
        inventory.names_of(RecordType::CNAME).collect::<Vec<_>>(),
        vec!["www.foo.com."]
    );
    assert_eq!(inventory.names_of(RecordType::SRV).count(), 0);
    assert_eq!(inventory.len(), 3);
}

#[tokio::test]
async fn test_legacy_source_rejects_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = legacy_source(&server, vec![RecordType::A])
        .fetch()
        .await
        .unwrap_err();

    match err {
        InventoryError::Status { status, url, .. } => {
            assert_eq!(status.as_u16(), 401);
            assert!(url.ends_with("/mgmt/tm/gtm/wideip/a"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_legacy_source_rejects_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = legacy_source(&server, vec![RecordType::A])
        .fetch()
        .await
        .unwrap_err();

    assert!(matches!(err, InventoryError::Decode { .. }), "unexpected error: {err}");
}

#[tokio::test]
async fn test_zone_source_walks_every_page() {
    let server = MockServer::start().await;
    // total_size arrives as a string on some platform versions.
    zone_page("1", &["a.com", "b.com"], json!("5")).expect(1).mount(&server).await;
    zone_page("2", &["c.com", "d.com"], json!("5")).expect(1).mount(&server).await;
    zone_page("3", &["E.com"], json!("5")).expect(1).mount(&server).await;

    let inventory = zone_source(&server, 2).fetch().await.unwrap();

    assert_eq!(
        inventory.names_of(RecordType::A).collect::<Vec<_>>(),
        vec!["a.com.", "b.com.", "c.com.", "d.com.", "e.com."]
    );
}

#[tokio::test]
async fn test_zone_source_honours_server_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("page_num", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [{ "gmaps": ["a.com", "b.com", "c.com"] }],
            "total_size": 3,
            "page_size": 3,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let inventory = zone_source(&server, 1).fetch().await.unwrap();

    assert_eq!(inventory.len(), 3);
}

#[tokio::test]
async fn test_zone_source_stops_on_empty_page() {
    let server = MockServer::start().await;
    zone_page("1", &["a.com"], json!(10)).expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(query_param("page_num", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [],
            "total_size": 10,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let inventory = zone_source(&server, 1).fetch().await.unwrap();

    assert_eq!(inventory.names_of(RecordType::A).collect::<Vec<_>>(), vec!["a.com."]);
}

#[tokio::test]
async fn test_zone_source_server_error_is_fatal() {
    let server = MockServer::start().await;
    zone_page("1", &["a.com"], json!(4)).mount(&server).await;
    Mock::given(method("GET"))
        .and(query_param("page_num", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = zone_source(&server, 2).fetch().await.unwrap_err();

    assert!(matches!(err, InventoryError::Status { .. }), "unexpected error: {err}");
}
