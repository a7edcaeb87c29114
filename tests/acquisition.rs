//! Discovery, download, classification and retention against a local
//! stand-in for the company site.

mod common;

use std::collections::HashSet;

use filing_harness::download::{stored_documents, DownloadOutcome, Downloader};
use filing_harness::models::{AcquisitionSummary, DocumentKind, DocumentLink};
use filing_harness::pipeline::Harness;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{company_page, offline_config, pdf, PRESENTATION, RESULTS, TRANSCRIPT};

const PAGE: &str = "/company/ACME/consolidated/";

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn pdf_response(bytes: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(bytes)
}

/// Company page with one link of each shape: a direct PDF, a viewer
/// wrapper around a framed PDF, and a gateway that streams the PDF.
async fn mixed_site() -> MockServer {
    let server = MockServer::start().await;
    let page = company_page(&[
        ("/files/q2-call.pdf", "Q2 Call Transcript"),
        ("/xml-data/corpfiling/77/view.html", "Investor Deck"),
        ("/AnnPdfOpen.aspx?Pname=results.pdf", "Quarterly Results"),
    ]);
    serve(&server, PAGE, ResponseTemplate::new(200).set_body_string(page)).await;
    serve(&server, "/files/q2-call.pdf", pdf_response(pdf(&[TRANSCRIPT], None))).await;
    serve(
        &server,
        "/xml-data/corpfiling/77/view.html",
        ResponseTemplate::new(200)
            .set_body_string(r#"<html><body><iframe src="deck-77.pdf"></iframe></body></html>"#),
    )
    .await;
    serve(&server, "/xml-data/corpfiling/77/deck-77.pdf", pdf_response(pdf(&[PRESENTATION], None))).await;
    serve(&server, "/AnnPdfOpen.aspx", pdf_response(pdf(&[RESULTS], None))).await;
    server
}

async fn acquire(harness: Harness, company: &'static str) -> (Harness, AcquisitionSummary) {
    tokio::task::spawn_blocking(move || {
        let summary = harness.discover_and_download(company);
        (harness, summary)
    })
    .await
    .unwrap()
}

fn stored_kinds(harness: &Harness) -> HashSet<DocumentKind> {
    stored_documents(&harness.config().storage.documents_dir())
        .unwrap()
        .iter()
        .map(|p| DocumentKind::from_file_name(&p.file_name().unwrap().to_string_lossy()))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn downloads_every_link_shape_and_classifies() {
    let server = mixed_site().await;
    let tmp = TempDir::new().unwrap();
    let harness = Harness::new(offline_config(tmp.path(), &server.uri())).unwrap();

    let (harness, summary) = acquire(harness, "acme").await;

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.deleted, 0);
    assert_eq!(
        stored_kinds(&harness),
        HashSet::from([
            DocumentKind::Transcript,
            DocumentKind::Presentation,
            DocumentKind::FinancialReport,
        ])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn second_run_skips_identical_documents() {
    let server = mixed_site().await;
    let tmp = TempDir::new().unwrap();
    let harness = Harness::new(offline_config(tmp.path(), &server.uri())).unwrap();

    let (harness, first) = acquire(harness, "ACME").await;
    let (harness, second) = acquire(harness, "ACME").await;

    assert_eq!(first.downloaded, 3);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 3);
    let count = stored_documents(&harness.config().storage.documents_dir()).unwrap().len();
    assert_eq!(count, 3);
}

fn link(url: String, name: &str) -> DocumentLink {
    DocumentLink {
        source_url: url,
        suggested_filename: name.to_string(),
        discovered_kind: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn downloader_saves_once_and_points_duplicates_at_the_stored_file() {
    let server = MockServer::start().await;
    let bytes = pdf(&[TRANSCRIPT], None);
    serve(&server, "/files/call.pdf", pdf_response(bytes.clone())).await;
    serve(&server, "/mirror/call-copy.pdf", pdf_response(bytes)).await;
    serve(&server, "/files/missing.pdf", ResponseTemplate::new(404)).await;

    let tmp = TempDir::new().unwrap();
    let config = offline_config(tmp.path(), &server.uri());
    let dir = config.storage.documents_dir();
    let base = server.uri();

    tokio::task::spawn_blocking(move || {
        let mut downloader = Downloader::new(&config.acquire, &dir).unwrap();

        let doc = downloader
            .download(&link(format!("{}/files/call.pdf", base), "call.pdf"))
            .expect("first download is saved");
        assert_eq!(doc.classified_kind, DocumentKind::Transcript);
        assert_eq!(doc.origin_url, format!("{}/files/call.pdf", base));
        assert!(doc.local_path.exists());
        assert!(doc.local_path.starts_with(&dir));

        let copy = link(format!("{}/mirror/call-copy.pdf", base), "call-copy.pdf");
        assert!(downloader.download(&copy).is_none());
        match downloader.attempt(&copy) {
            DownloadOutcome::AlreadyPresent(stored) => assert_eq!(stored, doc.local_path),
            other => panic!("expected AlreadyPresent, got {:?}", other),
        }

        // A fresh downloader learns the stored paths from disk.
        let mut reopened = Downloader::new(&config.acquire, &dir).unwrap();
        match reopened.attempt(&copy) {
            DownloadOutcome::AlreadyPresent(stored) => assert_eq!(stored, doc.local_path),
            other => panic!("expected AlreadyPresent, got {:?}", other),
        }

        let missing = link(format!("{}/files/missing.pdf", base), "missing.pdf");
        assert!(downloader.download(&missing).is_none());
        assert_eq!(stored_documents(&dir).unwrap().len(), 1);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_link_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    let page = company_page(&[
        ("/files/missing.pdf", "Missing"),
        ("/files/error-page.pdf", "Error Page"),
        ("/files/q2-call.pdf", "Q2 Call Transcript"),
    ]);
    serve(&server, PAGE, ResponseTemplate::new(200).set_body_string(page)).await;
    serve(&server, "/files/missing.pdf", ResponseTemplate::new(404)).await;
    serve(
        &server,
        "/files/error-page.pdf",
        ResponseTemplate::new(200).set_body_string("<html>Access denied</html>"),
    )
    .await;
    serve(&server, "/files/q2-call.pdf", pdf_response(pdf(&[TRANSCRIPT], None))).await;

    let tmp = TempDir::new().unwrap();
    let harness = Harness::new(offline_config(tmp.path(), &server.uri())).unwrap();
    let (harness, summary) = acquire(harness, "ACME").await;

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(stored_kinds(&harness), HashSet::from([DocumentKind::Transcript]));
}

#[tokio::test(flavor = "multi_thread")]
async fn links_beyond_the_batch_limit_are_skipped() {
    let server = mixed_site().await;
    let tmp = TempDir::new().unwrap();
    let mut config = offline_config(tmp.path(), &server.uri());
    config.acquire.max_documents = 1;
    let harness = Harness::new(config).unwrap();

    let (_harness, summary) = acquire(harness, "ACME").await;

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.skipped, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_documents_are_swept_after_download() {
    let server = MockServer::start().await;
    let page = company_page(&[
        ("/files/old.pdf", "Old Results"),
        ("/files/q2-call.pdf", "Q2 Call Transcript"),
    ]);
    serve(&server, PAGE, ResponseTemplate::new(200).set_body_string(page)).await;
    serve(
        &server,
        "/files/old.pdf",
        pdf_response(pdf(&[RESULTS], Some("D:20100115093000Z"))),
    )
    .await;
    serve(&server, "/files/q2-call.pdf", pdf_response(pdf(&[TRANSCRIPT], None))).await;

    let tmp = TempDir::new().unwrap();
    let harness = Harness::new(offline_config(tmp.path(), &server.uri())).unwrap();
    let (harness, summary) = acquire(harness, "ACME").await;

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.deleted, 1);
    assert_eq!(stored_kinds(&harness), HashSet::from([DocumentKind::Transcript]));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_documents_section_yields_nothing() {
    let server = MockServer::start().await;
    serve(&server, PAGE, ResponseTemplate::new(200).set_body_string(company_page(&[]))).await;

    let tmp = TempDir::new().unwrap();
    let harness = Harness::new(offline_config(tmp.path(), &server.uri())).unwrap();
    let (_harness, summary) = acquire(harness, "ACME").await;

    assert_eq!(summary, AcquisitionSummary::default());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_or_unexpected_page_yields_nothing() {
    let server = MockServer::start().await;
    serve(&server, PAGE, ResponseTemplate::new(503)).await;
    serve(
        &server,
        "/company/OTHER/consolidated/",
        ResponseTemplate::new(200).set_body_string("<html><body>Maintenance</body></html>"),
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let harness = Harness::new(offline_config(tmp.path(), &server.uri())).unwrap();
    let (harness, down) = acquire(harness, "ACME").await;
    let (harness, changed) = acquire(harness, "OTHER").await;

    assert_eq!(down, AcquisitionSummary::default());
    assert_eq!(changed, AcquisitionSummary::default());
    assert!(stored_kinds(&harness).is_empty());
}
