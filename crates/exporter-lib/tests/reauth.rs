//! Scrapes recover transparently when the array rejects the session

use exporter_lib::{
    ArrayClient, IdentityCache, IdentityEntry, RequestBudget, ResourceKind, Target,
    TargetRegistry,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;

const IP: &str = "10.0.0.5";
const TOKEN: &str = "DELL-EMC-TOKEN";

fn registry(server: &ServerGuard) -> TargetRegistry {
    let client = ArrayClient::with_base_url(
        Target::new(IP, "admin", "secret", "v3"),
        RequestBudget::new(4),
        &format!("{}/api/rest/", server.url()),
    )
    .unwrap();

    let mut cache = IdentityCache::new(IP);
    cache.insert_all(ResourceKind::NasServer, vec![IdentityEntry::new("N1", "nas-1")]);

    TargetRegistry::standard(Arc::new(client), Arc::new(cache))
}

#[tokio::test]
async fn test_rejected_session_is_refreshed_once_for_the_whole_scrape() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("GET", "/api/rest/login_session")
        .with_status(200)
        .with_header(TOKEN, "fresh-token")
        .expect(1)
        .create_async()
        .await;

    // Anything sent before the login is rejected
    server
        .mock("GET", "/api/rest/nas_server")
        .match_query(Matcher::Any)
        .match_header(TOKEN, Matcher::Missing)
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/api/rest/metrics/generate")
        .match_header(TOKEN, Matcher::Missing)
        .with_status(401)
        .create_async()
        .await;

    server
        .mock("GET", "/api/rest/nas_server")
        .match_query(Matcher::Any)
        .match_header(TOKEN, "fresh-token")
        .with_header("content-type", "application/json")
        .with_body(json!([{"name": "nas-1", "operational_status": "Started"}]).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/api/rest/metrics/generate")
        .match_header(TOKEN, "fresh-token")
        .match_body(Matcher::PartialJson(json!({
            "entity": "performance_metrics_by_nas_server",
            "entity_id": "N1",
        })))
        .with_header("content-type", "application/json")
        .with_body(json!([{"avg_latency": 120.5}]).to_string())
        .create_async()
        .await;

    let body = registry(&server).scrape("nas").await.unwrap();
    let text = String::from_utf8(body).unwrap();

    login.assert_async().await;
    assert!(text.contains(r#"powerstore_nas_server_operational_status{IP="10.0.0.5",name="nas-1"} 1"#));
    assert!(text.contains(r#"powerstore_metricNas_avg_latency{IP="10.0.0.5",nas_id="nas-1"} 120.5"#));
}

#[tokio::test]
async fn test_failed_relogin_yields_an_empty_scrape() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/rest/login_session")
        .with_status(401)
        .with_body("bad credentials")
        .create_async()
        .await;
    server
        .mock("GET", "/api/rest/nas_server")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/api/rest/metrics/generate")
        .with_status(401)
        .create_async()
        .await;

    let registry = registry(&server);
    let body = registry.scrape("nas").await.unwrap();

    assert!(body.is_empty());
    assert_eq!(registry.client().budget().in_flight(), 0);
}
