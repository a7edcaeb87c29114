//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::Path;

use filing_harness::config::Config;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// A PDF with one page per entry in `pages`, optionally carrying a
/// `/CreationDate` in its info dictionary.
pub fn pdf(pages: &[&str], creation_date: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(date) = creation_date {
        let info_id = doc.add_object(dictionary! {
            "CreationDate" => Object::string_literal(date),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Offline configuration rooted at `data_dir`: hash embeddings, model
/// disabled, company pages served from `site`.
pub fn offline_config(data_dir: &Path, site: &str) -> Config {
    let mut config = Config::minimal(data_dir);
    config.acquire.base_url = site.to_string();
    config.acquire.timeout_secs = 5;
    config.embedding.provider = "hash".to_string();
    config.embedding.batch_size = 4;
    config.chunking.chunk_size = 200;
    config.chunking.overlap = 40;
    config.llm.provider = "disabled".to_string();
    config.market.base_url = site.to_string();
    config.market.timeout_secs = 5;
    config
}

/// Company page listing `links` as `(href, anchor text)` inside a
/// documents section.
pub fn company_page(links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{}\">{}</a></li>\n", href, text))
        .collect();
    format!(
        "<html><body><h1>ACME Ltd</h1>\
         <section id=\"documents\"><div class=\"documents\"><ul>\n{}</ul></div></section>\
         </body></html>",
        anchors
    )
}

pub const TRANSCRIPT: &str =
    "Earnings call transcript Q2. Revenue growth was strong and deal wins rose.";
pub const PRESENTATION: &str =
    "Investor presentation Q2. Margin expansion and digital demand remain healthy.";
pub const RESULTS: &str =
    "Financial results for the quarter. Net profit increased while attrition declined.";
