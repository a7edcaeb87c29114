//! Deterministic answer used when the model is unavailable or its reply
//! cannot be parsed. Built only from keyword presence in the retrieved
//! chunks, so it never states a number and never fails.

use crate::models::{Confidence, Direction, MetricTrend, ScoredChunk, StructuredAnswer};
use crate::prompt::DISCLAIMER;

pub const NO_DATA_SUMMARY: &str =
    "No indexed filing data is available for this company, so the question cannot be answered.";

/// (metric, keywords, note) checked against the retrieved text.
const METRIC_SIGNALS: [(&str, &[&str], &str); 5] = [
    ("revenue", &["revenue", "sales", "top line"], "Revenue is discussed in the retrieved excerpts."),
    ("growth", &["growth", "grew", "increase"], "Growth is mentioned in the retrieved excerpts."),
    ("margin", &["margin", "ebit", "operating profit"], "Margin performance is discussed."),
    ("profit", &["profit", "net income"], "Profitability figures are referenced."),
    ("demand", &["demand", "deal wins", "order book", "pipeline"], "Demand or deal commentary is present."),
];

const RISK_SIGNALS: [(&str, &str); 4] = [
    ("attrition", "Attrition or talent retention is flagged."),
    ("headwind", "Management mentions headwinds."),
    ("uncertain", "Management notes uncertainty in the environment."),
    ("decline", "A decline is mentioned in at least one excerpt."),
];

const OPPORTUNITY_SIGNALS: [(&str, &str); 3] = [
    ("deal", "Deal activity is highlighted."),
    ("expansion", "Expansion initiatives are mentioned."),
    ("digital", "Digital or technology demand is referenced."),
];

/// Fallback for the empty-index case.
pub fn no_data_answer() -> StructuredAnswer {
    StructuredAnswer {
        summary: NO_DATA_SUMMARY.to_string(),
        metric_trends: Vec::new(),
        outlook: "Unknown: no filings have been indexed.".to_string(),
        risks: Vec::new(),
        opportunities: Vec::new(),
        direction: Direction::Uncertain,
        confidence: Confidence::Low,
        limitations: "No data: the index is empty. Acquire documents and rebuild the index."
            .to_string(),
        disclaimer: DISCLAIMER.to_string(),
        follow_up_question: "Would you like to acquire this company's latest filings first?"
            .to_string(),
    }
}

/// Templated answer from the retrieved chunks. `reason` explains why the
/// model was not used and ends up in `limitations`.
pub fn degraded_answer(question: &str, chunks: &[ScoredChunk], reason: &str) -> StructuredAnswer {
    if chunks.is_empty() {
        let mut answer = no_data_answer();
        answer.limitations = format!("No data: no relevant excerpts were retrieved. {}", reason);
        return answer;
    }

    let text = chunks
        .iter()
        .map(|c| c.chunk.text.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let metric_trends: Vec<MetricTrend> = METRIC_SIGNALS
        .iter()
        .filter(|(_, keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(metric, _, note)| MetricTrend {
            metric: metric.to_string(),
            note: note.to_string(),
        })
        .collect();
    let risks: Vec<String> = RISK_SIGNALS
        .iter()
        .filter(|(k, _)| text.contains(k))
        .map(|(_, note)| note.to_string())
        .collect();
    let opportunities: Vec<String> = OPPORTUNITY_SIGNALS
        .iter()
        .filter(|(k, _)| text.contains(k))
        .map(|(_, note)| note.to_string())
        .collect();

    let mut sources: Vec<&str> = chunks
        .iter()
        .map(|c| c.chunk.source_document_id.as_str())
        .collect();
    sources.dedup();

    let topics = if metric_trends.is_empty() {
        "no recognised financial metrics".to_string()
    } else {
        metric_trends
            .iter()
            .map(|m| m.metric.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    StructuredAnswer {
        summary: format!(
            "Automated summary for \"{}\": {} relevant excerpt(s) from {} were retrieved, covering {}. Review the excerpts directly for figures.",
            question.trim(),
            chunks.len(),
            sources.join(", "),
            topics
        ),
        metric_trends,
        outlook: "Not assessed: no model analysis was available.".to_string(),
        risks,
        opportunities,
        direction: Direction::Uncertain,
        confidence: Confidence::Low,
        limitations: format!(
            "Degraded answer built from keyword matches only; no figures were interpreted. {}",
            reason
        ),
        disclaimer: DISCLAIMER.to_string(),
        follow_up_question: "Would you like the supporting excerpts for a specific metric?"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn hits(texts: &[&str]) -> Vec<ScoredChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ScoredChunk {
                score: 1.0 - i as f32 * 0.1,
                chunk: chunk_text("transcript_q2.pdf", t, 10_000, 0).unwrap().remove(0),
            })
            .collect()
    }

    #[test]
    fn keywords_become_trends_risks_and_opportunities() {
        let chunks = hits(&[
            "Revenue growth of 5% with margin improvement",
            "Attrition remains a headwind; deal pipeline is healthy",
        ]);
        let answer = degraded_answer("How was the quarter?", &chunks, "model unavailable");

        let metrics: Vec<&str> = answer.metric_trends.iter().map(|m| m.metric.as_str()).collect();
        assert_eq!(metrics, vec!["revenue", "growth", "margin", "demand"]);
        assert_eq!(answer.risks.len(), 2);
        assert_eq!(answer.opportunities, vec!["Deal activity is highlighted."]);
        assert!(answer.summary.contains("transcript_q2.pdf"));
        assert!(answer.limitations.contains("model unavailable"));
        assert!(!answer.summary.contains("5%"));
    }

    #[test]
    fn no_chunks_reports_no_data() {
        let answer = degraded_answer("Anything?", &[], "index empty");
        assert!(answer.limitations.starts_with("No data"));
        assert!(!answer.summary.is_empty());
        assert_eq!(answer.confidence, Confidence::Low);
    }
}
