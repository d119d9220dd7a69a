//! End-to-end scrape of the capacity group against a mocked array

use exporter_lib::{
    ArrayClient, Exporter, HealthRegistry, RequestBudget, StructuredLogger, Target,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

const IP: &str = "10.20.30.40";

async fn mock_login(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/api/rest/login_session")
        .with_status(200)
        .with_header("DELL-EMC-TOKEN", "token-1")
        .with_header("set-cookie", "auth_cookie=cookie-1; Path=/")
        .with_body("[]")
        .create_async()
        .await
}

async fn mock_capacity(server: &mut ServerGuard, appliance: &str, buckets: serde_json::Value) -> Mock {
    server
        .mock("POST", "/api/rest/metrics/generate")
        .match_body(Matcher::PartialJson(json!({
            "entity": "space_metrics_by_appliance",
            "entity_id": appliance,
            "interval": "One_Hour",
        })))
        .with_header("content-type", "application/json")
        .with_body(buckets.to_string())
        .expect(1)
        .create_async()
        .await
}

fn bucket(appliance: &str, used: u64) -> serde_json::Value {
    json!({
        "appliance_id": appliance,
        "timestamp": "2024-01-01T00:00:00Z",
        "last_logical_used": used,
        "last_physical_total": 1000,
        "last_efficiency_ratio": null,
    })
}

async fn start(server: &ServerGuard) -> Exporter {
    let target = Target::new(IP, "admin", "secret", "v3").with_api_limit(10);
    let client = ArrayClient::with_base_url(
        target,
        RequestBudget::new(4),
        &format!("{}/api/rest/", server.url()),
    )
    .unwrap();

    Exporter::start_clients(vec![client], &HealthRegistry::new(), &StructuredLogger::new("test")).await
}

#[tokio::test]
async fn test_capacity_scrape_reports_each_appliance_once() {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;

    let appliances = server
        .mock("GET", "/api/rest/appliance")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("select".into(), "id,name".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": "A1", "name": "appliance-1"},
                {"id": "A2", "name": "appliance-2"},
                {"id": "A3", "name": "appliance-3"},
            ])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    server
        .mock(
            "GET",
            Matcher::Regex(
                r"^/api/rest/(volume|volume_group_list_cma_view|eth_port|fc_port|hardware|nas_server|file_system)$"
                    .to_string(),
            ),
        )
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let a1 = mock_capacity(&mut server, "A1", json!([bucket("A1", 10), bucket("A1", 11)])).await;
    let a2 = mock_capacity(&mut server, "A2", json!([bucket("A2", 20)])).await;
    let a3 = mock_capacity(&mut server, "A3", json!([])).await;

    let exporter = start(&server).await;
    let body = exporter.scrape(IP, "capacity").await.unwrap();
    let text = String::from_utf8(body).unwrap();

    appliances.assert_async().await;
    a1.assert_async().await;
    a2.assert_async().await;
    a3.assert_async().await;

    assert!(text.contains(r#"powerstore_cap_last_logical_used{IP="10.20.30.40",appliance_id="A1"} 11"#));
    assert!(text.contains(r#"powerstore_cap_last_logical_used{IP="10.20.30.40",appliance_id="A2"} 20"#));
    assert!(text.contains(r#"powerstore_cap_last_physical_total{IP="10.20.30.40",appliance_id="A2"} 1000"#));
    assert!(!text.contains("A3"));
    assert!(!text.contains("last_efficiency_ratio{"));
}

#[tokio::test]
async fn test_failed_report_keeps_other_appliances() {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    server
        .mock("GET", "/api/rest/appliance")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(json!([{"id": "A1", "name": "a"}, {"id": "A2", "name": "b"}]).to_string())
        .create_async()
        .await;
    server
        .mock(
            "GET",
            Matcher::Regex(
                r"^/api/rest/(volume|volume_group_list_cma_view|eth_port|fc_port|hardware|nas_server|file_system)$"
                    .to_string(),
            ),
        )
        .match_query(Matcher::Any)
        .with_body("[]")
        .create_async()
        .await;

    mock_capacity(&mut server, "A1", json!([bucket("A1", 5)])).await;
    server
        .mock("POST", "/api/rest/metrics/generate")
        .match_body(Matcher::PartialJson(json!({"entity_id": "A2"})))
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let exporter = start(&server).await;
    let text = String::from_utf8(exporter.scrape(IP, "capacity").await.unwrap()).unwrap();

    assert!(text.contains(r#"appliance_id="A1"} 5"#));
    assert!(!text.contains(r#"appliance_id="A2""#));
}
