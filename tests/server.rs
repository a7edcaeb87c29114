//! HTTP front end over a live listener.

mod common;

use std::sync::Arc;

use filing_harness::pipeline::Harness;
use filing_harness::server::router;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{offline_config, pdf, TRANSCRIPT};

async fn start(harness: Harness) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(harness));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn quote_site() -> MockServer {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ACME.NS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": { "result": [{ "meta": { "regularMarketPrice": 99.5 } }], "error": null }
        })))
        .mount(&site)
        .await;
    site
}

fn seeded_harness(tmp: &TempDir, site: &str) -> Harness {
    let config = offline_config(tmp.path(), site);
    let docs = config.storage.documents_dir();
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("transcript_q2.pdf"), pdf(&[TRANSCRIPT], None)).unwrap();
    Harness::new(config).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let base = start(seeded_harness(&tmp, "http://127.0.0.1:9")).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test(flavor = "multi_thread")]
async fn forecast_returns_answer_and_price() {
    let site = quote_site().await;
    let tmp = TempDir::new().unwrap();
    let base = start(seeded_harness(&tmp, &site.uri())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/forecast", base))
        .json(&json!({ "company": "ACME", "question": "Is revenue growing?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["company"], "ACME");
    assert_eq!(body["market"]["status"], "ok");
    assert_eq!(body["market"]["price"], 99.5);
    assert_eq!(
        body["answer"]["grounding_chunks"][0]["chunk"]["source_document_id"],
        "transcript_q2.pdf"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_question_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let base = start(seeded_harness(&tmp, "http://127.0.0.1:9")).await;

    let response = reqwest::Client::new()
        .post(format!("{}/forecast", base))
        .json(&json!({ "company": "ACME", "question": " " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test(flavor = "multi_thread")]
async fn index_then_quote() {
    let site = quote_site().await;
    let tmp = TempDir::new().unwrap();
    let base = start(seeded_harness(&tmp, &site.uri())).await;
    let client = reqwest::Client::new();

    let indexed: Value = client
        .post(format!("{}/index", base))
        .json(&json!({ "company": "ACME" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(indexed["empty"], false);
    assert_eq!(indexed["entries"], 1);

    let quote: Value = client
        .get(format!("{}/quote/acme", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote["symbol"], "ACME");
    assert_eq!(quote["price"], 99.5);
}
