//! Instruction template for timetable extraction.
//!
//! The prompt is the contract between this crate and the generative model,
//! so it lives in one place and is built by a pure function. Tests inspect
//! the rendered prompt directly, which catches template regressions without
//! calling a live provider.
//!
//! Bump [`PROMPT_VERSION`] whenever the wording of the template changes.

/// Revision of [`TIMETABLE_PROMPT_TEMPLATE`], logged with every extraction.
pub const PROMPT_VERSION: &str = "timetable-v1";

/// Marker replaced by the raw OCR text.
const OCR_TEXT_PLACEHOLDER: &str = "{ocr_text}";

/// Instruction sent to the model. `{ocr_text}` is substituted verbatim.
pub const TIMETABLE_PROMPT_TEMPLATE: &str = r#"
You are a timetable parser.

The input below is OCR output taken from a teacher's weekly class timetable. It may be noisy.
Extract every scheduled block into clean JSON.

Every timetable block MUST have exactly these six fields:

{
  "dayOfWeek": string | null,  // one of "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"; null when unknown
  "startTime": "HH:MM",        // 24-hour clock, zero padded, e.g. "08:55"
  "endTime": "HH:MM",          // 24-hour clock, zero padded, e.g. "10:10"
  "subject": string | null,    // subject or label of the block, e.g. "Maths", "Register", "English B"
  "room": string | null,       // room or location when present, else null
  "teacher": string | null     // teacher name or initials when present, else null
}

Rules:
- Rewrite times such as "8.55" or "8:55" as "08:55".
- When the day of the week is unclear, use "dayOfWeek": null.
- Never invent information that is not in the text.
- Use null for any field that is missing.
- Reply with STRICTLY valid JSON only: no comments, no markdown, no surrounding prose.
- The top-level value MUST be exactly:
{ "blocks": [ TimetableBlock, TimetableBlock, ... ] }

OCR text to parse:
"""{ocr_text}"""
"#;

/// Render the extraction prompt for `ocr_text`.
///
/// The text is embedded as-is; nothing is escaped or trimmed, so the model
/// sees exactly what the OCR provider returned.
pub fn build_timetable_prompt(ocr_text: &str) -> String {
    TIMETABLE_PROMPT_TEMPLATE.replacen(OCR_TEXT_PLACEHOLDER, ocr_text, 1)
}
