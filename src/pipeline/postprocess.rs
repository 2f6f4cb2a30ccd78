//! Post-processing: turn an untrusted model reply into timetable blocks.
//!
//! Even with an explicit "JSON only" instruction, models regularly wrap the
//! reply in ```` ```json ```` fences or return the wrong top-level shape.
//! This module defends against those two failure shapes and nothing more:
//!
//! 1. take the text of the first candidate ([`candidate_text`]);
//! 2. strip code-fence markers ([`strip_code_fences`]);
//! 3. parse JSON and check for the `{"blocks": [...]}` envelope ([`parse_envelope`]).
//!
//! Every step returns `Result<_, ExtractionFailure>` and never panics, so the
//! caller can map each named failure uniformly.
//!
//! Individual blocks are *not* validated. [`contract_warnings`] reports
//! deviations for logging only; the payload is returned unchanged.

use crate::error::ExtractionFailure;
use crate::output::DayOfWeek;
use crate::providers::GenerateContentResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::error;

/// Run all three steps on a provider reply.
pub fn parse_completion(response: &GenerateContentResponse) -> Result<Vec<Value>, ExtractionFailure> {
    let text = candidate_text(response)?;
    parse_envelope(&strip_code_fences(&text))
}

// ── Step 1: first candidate ──────────────────────────────────────────────────

/// Concatenated, trimmed text of the first candidate's parts.
///
/// Parts without text (e.g. function calls) contribute nothing.
pub fn candidate_text(response: &GenerateContentResponse) -> Result<String, ExtractionFailure> {
    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .filter(|parts| !parts.is_empty())
        .ok_or(ExtractionFailure::NoCandidate)?;

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    Ok(text.trim().to_string())
}

// ── Step 2: strip fences ─────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?").unwrap());

/// Remove every ```` ```json ```` and ```` ``` ```` marker, then trim.
pub fn strip_code_fences(input: &str) -> String {
    RE_FENCE.replace_all(input, "").trim().to_string()
}

// ── Step 3: parse and check envelope ─────────────────────────────────────────

/// Parse `cleaned` as JSON and return its `blocks` array as-is.
pub fn parse_envelope(cleaned: &str) -> Result<Vec<Value>, ExtractionFailure> {
    let value: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            error!(raw = %cleaned, "Failed to parse JSON from generative model: {}", e);
            return Err(ExtractionFailure::InvalidJson {
                raw: cleaned.to_string(),
            });
        }
    };

    match value {
        Value::Object(mut map) => match map.remove("blocks") {
            Some(Value::Array(blocks)) => Ok(blocks),
            _ => Err(ExtractionFailure::MissingBlocks),
        },
        _ => Err(ExtractionFailure::MissingBlocks),
    }
}

// ── Diagnostics ──────────────────────────────────────────────────────────────

static RE_HHMM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap());

/// Describe every way `blocks` deviates from the extraction contract.
///
/// Checks: each block is an object, `dayOfWeek` is null or a known day, and
/// `startTime`/`endTime` are zero-padded 24-hour `HH:MM`. An empty result
/// means the blocks conform.
pub fn contract_warnings(blocks: &[Value]) -> Vec<String> {
    let mut warnings = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if !block.is_object() {
            warnings.push(format!("block {i}: not an object"));
            continue;
        }
        match block.get("dayOfWeek") {
            None | Some(Value::Null) => {}
            Some(Value::String(d)) if DayOfWeek::parse(d).is_some() => {}
            Some(other) => warnings.push(format!("block {i}: unexpected dayOfWeek {other}")),
        }
        for key in ["startTime", "endTime"] {
            match block.get(key) {
                Some(Value::String(t)) if RE_HHMM.is_match(t) => {}
                Some(other) => warnings.push(format!("block {i}: {key} {other} is not HH:MM")),
                None => warnings.push(format!("block {i}: {key} missing")),
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Candidate, Content, Part};
    use serde_json::json;

    fn response_with_parts(parts: Vec<Part>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".into()),
                    parts,
                }),
                finish_reason: None,
            }],
            usage_metadata: None,
        }
    }

    #[test]
    fn test_no_candidates() {
        let resp = GenerateContentResponse::default();
        assert_eq!(parse_completion(&resp), Err(ExtractionFailure::NoCandidate));
    }

    #[test]
    fn test_candidate_without_content() {
        let resp = GenerateContentResponse {
            candidates: vec![Candidate::default()],
            usage_metadata: None,
        };
        assert_eq!(candidate_text(&resp), Err(ExtractionFailure::NoCandidate));
    }

    #[test]
    fn test_candidate_with_empty_parts() {
        let resp = response_with_parts(vec![]);
        assert_eq!(candidate_text(&resp), Err(ExtractionFailure::NoCandidate));
    }

    #[test]
    fn test_parts_are_concatenated() {
        let resp = response_with_parts(vec![
            Part::text("  {\"blocks\":"),
            Part { text: None },
            Part::text("[]}\n"),
        ]);
        assert_eq!(candidate_text(&resp).unwrap(), "{\"blocks\":[]}");
        assert_eq!(parse_completion(&resp).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_only_first_candidate_is_used() {
        let mut resp = GenerateContentResponse::from_text("not json");
        resp.candidates
            .push(GenerateContentResponse::from_text(r#"{"blocks":[]}"#).candidates.remove(0));
        assert!(matches!(
            parse_completion(&resp),
            Err(ExtractionFailure::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_strip_json_fences() {
        let fenced = "```json\n{\"blocks\": []}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"blocks\": []}");
    }

    #[test]
    fn test_strip_bare_fences() {
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences(" {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_reply_parses() {
        let resp = GenerateContentResponse::from_text(
            "```json\n{\"blocks\":[{\"dayOfWeek\":\"Tue\",\"startTime\":\"09:00\",\"endTime\":\"10:00\",\"subject\":\"Art\",\"room\":null,\"teacher\":null}]}\n```",
        );
        let blocks = parse_completion(&resp).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["subject"], "Art");
        assert!(blocks[0]["room"].is_null());
    }

    #[test]
    fn test_invalid_json_keeps_raw_text() {
        let err = parse_envelope("{\"blocks\": [").unwrap_err();
        assert_eq!(
            err,
            ExtractionFailure::InvalidJson {
                raw: "{\"blocks\": [".into()
            }
        );
    }

    #[test]
    fn test_prose_reply_is_invalid_json() {
        let resp = GenerateContentResponse::from_text("Here is your timetable: Monday has Maths.");
        assert!(matches!(
            parse_completion(&resp),
            Err(ExtractionFailure::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_missing_blocks_key() {
        assert_eq!(
            parse_envelope(r#"{"timetable": []}"#),
            Err(ExtractionFailure::MissingBlocks)
        );
    }

    #[test]
    fn test_blocks_not_an_array() {
        assert_eq!(
            parse_envelope(r#"{"blocks": {"Mon": []}}"#),
            Err(ExtractionFailure::MissingBlocks)
        );
        assert_eq!(
            parse_envelope(r#"{"blocks": null}"#),
            Err(ExtractionFailure::MissingBlocks)
        );
    }

    #[test]
    fn test_top_level_array_is_missing_blocks() {
        assert_eq!(parse_envelope("[]"), Err(ExtractionFailure::MissingBlocks));
        assert_eq!(parse_envelope("null"), Err(ExtractionFailure::MissingBlocks));
    }

    #[test]
    fn test_blocks_returned_unvalidated() {
        let blocks = parse_envelope(r#"{"blocks": [1, "two", {"startTime": "8.55"}], "extra": true}"#)
            .unwrap();
        assert_eq!(blocks, vec![json!(1), json!("two"), json!({"startTime": "8.55"})]);
    }

    #[test]
    fn test_contract_warnings_clean_block() {
        let blocks = vec![json!({
            "dayOfWeek": "Mon", "startTime": "08:55", "endTime": "10:10",
            "subject": "Maths", "room": "Room 4", "teacher": "Mr Smith"
        })];
        assert!(contract_warnings(&blocks).is_empty());

        let unknown_day = vec![json!({"dayOfWeek": null, "startTime": "23:59", "endTime": "00:00"})];
        assert!(contract_warnings(&unknown_day).is_empty());
    }

    #[test]
    fn test_contract_warnings_report_deviations() {
        let blocks = vec![
            json!({"dayOfWeek": "Monday", "startTime": "8:55", "endTime": "24:00"}),
            json!("junk"),
            json!({"dayOfWeek": "Fri", "startTime": "09:00"}),
        ];
        let w = contract_warnings(&blocks);
        assert_eq!(w.len(), 5, "got: {w:?}");
        assert!(w[0].contains("dayOfWeek"));
        assert!(w[1].contains("startTime"));
        assert!(w[2].contains("endTime"));
        assert!(w[3].contains("not an object"));
        assert!(w[4].contains("endTime missing"));
    }
}
