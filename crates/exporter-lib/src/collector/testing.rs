//! Shared fixtures for collector tests

use super::{Collector, Emitter, MetricSample};
use crate::cache::IdentityCache;
use crate::client::{ArrayClient, RequestBudget};
use crate::models::Target;
use mockito::{Matcher, Mock, Server};
use serde_json::Value;
use std::sync::Arc;

pub const TEST_IP: &str = "10.0.0.1";

pub fn client_for(server: &Server) -> Arc<ArrayClient> {
    let target = Target::new(TEST_IP, "admin", "secret", "v3");
    Arc::new(
        ArrayClient::with_base_url(target, RequestBudget::new(8), &format!("{}/api/rest/", server.url()))
            .unwrap(),
    )
}

pub fn empty_cache() -> IdentityCache {
    IdentityCache::new(TEST_IP)
}

/// Mock a GET listing of `resource`, any query
pub async fn mock_list(server: &mut Server, resource: &str, body: Value) -> Mock {
    server
        .mock("GET", format!("/api/rest/{}", resource).as_str())
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

/// Mock the report endpoint for one `(entity, id)` pair
pub async fn mock_report(server: &mut Server, entity: &str, id: &str, buckets: Value) -> Mock {
    server
        .mock("POST", "/api/rest/metrics/generate")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "entity": entity,
            "entity_id": id,
        })))
        .with_header("content-type", "application/json")
        .with_body(buckets.to_string())
        .create_async()
        .await
}

/// Run one pass and gather everything that was emitted
pub async fn collect_samples(collector: &dyn Collector) -> (crate::error::Result<()>, Vec<MetricSample>) {
    let (emitter, mut rx) = Emitter::channel();
    let result = collector.collect(&emitter).await;
    drop(emitter);

    let mut samples = Vec::new();
    while let Some(sample) = rx.recv().await {
        samples.push(sample);
    }
    (result, samples)
}

/// Samples named `name`, in emission order
pub fn named<'a>(samples: &'a [MetricSample], name: &str) -> Vec<&'a MetricSample> {
    samples.iter().filter(|s| s.name() == name).collect()
}
