// Shared prompt constants and prompt-building utilities.
// Each service that needs completions defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System instruction sent with every completion. Enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured scheduling assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended when a previous response was rejected. Replace `{violation}` before sending.
pub const CORRECTION_HINT_TEMPLATE: &str = "\n\nYOUR PREVIOUS RESPONSE WAS REJECTED: {violation}\n\
    Return a corrected JSON object that follows the schema above exactly. \
    Omit any entry you cannot express within the schema rather than guessing values.";

pub fn correction_hint(violation: &str) -> String {
    CORRECTION_HINT_TEMPLATE.replace("{violation}", violation)
}
