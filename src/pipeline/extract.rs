//! Extraction stage: OCR text → timetable blocks via a generative model.
//!
//! One call per document, no retries. The prompt lives in [`crate::prompts`];
//! parsing of the reply lives in [`super::postprocess`].

use super::postprocess::{contract_warnings, parse_completion};
use crate::error::TimetableError;
use crate::prompts::{build_timetable_prompt, PROMPT_VERSION};
use crate::providers::{GenerateContentRequest, GenerationConfig, GenerativeModel};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Ask `model` to structure `ocr_text` and return the parsed `blocks` array.
///
/// Blocks are returned exactly as the model produced them. Deviations from
/// the block contract are logged at `warn` and do not fail the call.
pub async fn extract_blocks(
    model: &dyn GenerativeModel,
    ocr_text: &str,
    generation_config: GenerationConfig,
) -> Result<Vec<Value>, TimetableError> {
    let prompt = build_timetable_prompt(ocr_text);
    let request = GenerateContentRequest::user_prompt(prompt, generation_config);
    debug!(
        "Calling {} (prompt {}, temperature {}, max {} tokens)",
        model.describe(),
        PROMPT_VERSION,
        generation_config.temperature,
        generation_config.max_output_tokens
    );

    let start = Instant::now();
    let response = model.generate(&request).await?;
    if let Some(usage) = response.usage_metadata {
        debug!(
            "{}: {} input tokens, {} output tokens in {}ms",
            model.describe(),
            usage.prompt_token_count,
            usage.candidates_token_count,
            start.elapsed().as_millis()
        );
    }

    let blocks = parse_completion(&response)?;
    for w in contract_warnings(&blocks) {
        warn!("Timetable block off-contract: {}", w);
    }
    Ok(blocks)
}
