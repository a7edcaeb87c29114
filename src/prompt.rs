//! Prompt assembly and response parsing for grounded answers.

use anyhow::{anyhow, bail, Result};

use crate::models::{ScoredChunk, StructuredAnswer};

pub const DISCLAIMER: &str =
    "This analysis is based solely on the provided filing excerpts and does not constitute investment advice.";

pub const SYSTEM_PROMPT: &str = r#"You are a financial analysis assistant reviewing a listed company's quarterly results, investor presentations and earnings-call transcripts.

Rules:
- Use ONLY the numbered context excerpts. Never invent, estimate or extrapolate figures; quote numbers exactly as they appear in the context or omit them.
- If the context does not answer part of the question, say so in "limitations".
- Do not give buy, sell or hold recommendations or any personal financial advice.
- Respond with a single JSON object and nothing else, using exactly these keys:

{
  "summary": "2-4 sentence answer to the question",
  "metric_trends": [{"metric": "revenue", "note": "trend as stated in the context"}],
  "outlook": "forward-looking qualitative assessment from management commentary",
  "risks": ["risk"],
  "opportunities": ["opportunity"],
  "direction": "positive | neutral | negative | uncertain",
  "confidence": "low | medium | high",
  "limitations": "what the context does not cover",
  "disclaimer": "statement that this is not investment advice",
  "follow_up_question": "one useful next question"
}"#;

/// Retrieved chunks as numbered, attributed excerpts, stopping before the
/// text would exceed `max_chars`.
pub fn build_context(chunks: &[ScoredChunk], max_chars: usize) -> String {
    let mut context = String::new();
    for (i, hit) in chunks.iter().enumerate() {
        let block = format!(
            "[{}] Source: {} (chunk {}, relevance {:.3})\n{}\n\n",
            i + 1,
            hit.chunk.source_document_id,
            hit.chunk.chunk_index,
            hit.score,
            hit.chunk.text.trim()
        );
        let used = context.chars().count();
        let block_len = block.chars().count();
        if used + block_len > max_chars {
            if used == 0 {
                // Always include something from the best hit.
                context.extend(block.chars().take(max_chars));
            }
            break;
        }
        context.push_str(&block);
    }
    context
}

pub fn user_prompt(question: &str, context: &str) -> String {
    format!(
        "Context excerpts:\n\n{}Question: {}\n\nAnswer with the JSON object only.",
        context, question
    )
}

/// Parse a model reply into the fixed schema.
///
/// Tolerates code fences and prose around the object. A missing
/// disclaimer is filled in; an empty summary is rejected.
pub fn parse_answer(reply: &str) -> Result<StructuredAnswer> {
    let start = reply
        .find('{')
        .ok_or_else(|| anyhow!("model reply contains no JSON object"))?;
    let end = reply
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| anyhow!("model reply contains no complete JSON object"))?;

    let mut answer: StructuredAnswer = serde_json::from_str(&reply[start..=end])
        .map_err(|e| anyhow!("model reply does not match the answer schema: {}", e))?;

    if answer.summary.trim().is_empty() {
        bail!("model reply has an empty summary");
    }
    if answer.disclaimer.trim().is_empty() {
        answer.disclaimer = DISCLAIMER.to_string();
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::models::{Confidence, Direction};

    fn hit(doc: &str, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            score,
            chunk: chunk_text(doc, text, 10_000, 0).unwrap().remove(0),
        }
    }

    const VALID: &str = r#"{
        "summary": "Revenue rose on deal wins.",
        "metric_trends": [{"metric": "revenue", "note": "up"}],
        "outlook": "Stable",
        "risks": ["Client budgets"],
        "opportunities": ["AI services"],
        "direction": "positive",
        "confidence": "medium",
        "limitations": "No segment data.",
        "disclaimer": "",
        "follow_up_question": "How did margins move?"
    }"#;

    #[test]
    fn parses_fenced_reply_and_fills_disclaimer() {
        let reply = format!("Here you go:\n```json\n{}\n```", VALID);
        let answer = parse_answer(&reply).unwrap();
        assert_eq!(answer.direction, Direction::Positive);
        assert_eq!(answer.confidence, Confidence::Medium);
        assert_eq!(answer.disclaimer, DISCLAIMER);
    }

    #[test]
    fn rejects_non_json_and_wrong_schema() {
        assert!(parse_answer("I cannot help with that.").is_err());
        assert!(parse_answer(r#"{"reply": "hello"}"#).is_err());
        assert!(parse_answer(&VALID.replace("Revenue rose on deal wins.", " ")).is_err());
        assert!(parse_answer(&VALID.replace("\"positive\"", "\"bullish\"")).is_err());
    }

    #[test]
    fn context_is_attributed_and_bounded() {
        let hits = vec![
            hit("transcript_q2.pdf", "Deal wins were strong.", 0.9),
            hit("deck.pdf", &"x".repeat(500), 0.5),
        ];
        let context = build_context(&hits, 200);
        assert!(context.starts_with("[1] Source: transcript_q2.pdf (chunk 0"));
        assert!(!context.contains("deck.pdf"));
        assert!(context.chars().count() <= 200);

        let tiny = build_context(&hits, 10);
        assert_eq!(tiny.chars().count(), 10);
    }
}
