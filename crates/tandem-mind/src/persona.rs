//! Persona prompt composition.
//!
//! Builds the three prompt registers the persona speaks in: a direct
//! response to the current discussion, an optional interjection, and an
//! end-of-meeting reflection. All prompts fold in the persona identity,
//! the recent window, and any retrieved references.

use tandem_core::config::PersonaConfig;
use tandem_core::types::{ContextBundle, Reference, Utterance};

/// Token the model answers with when the persona should stay quiet.
pub const LISTEN_TOKEN: &str = "LISTEN";

/// Marker the model embeds in a reply when it lacks a fact; the
/// orchestrator strips it and runs the search collaborator before the
/// next turn.
pub const GAP_MARKER: &str = "[needs lookup]";

/// Compose the primary response prompt.
pub fn response_prompt(persona: &PersonaConfig, bundle: &ContextBundle, query: &str) -> String {
    format!(
        "You are {name}, a {role} with the following personality traits: {traits}.\n\
         \n\
         Recent discussion:\n{window}\n\
         \n\
         Relevant references:\n{references}\n\
         \n\
         Respond in {language} to: {query}\n\
         \n\
         Stay in character, be concise but informative, and move the\n\
         discussion forward. If you are missing a fact you would need to\n\
         answer well, include the marker {gap} in your reply.",
        name = persona.name,
        role = persona.role,
        traits = persona.personality_traits.join(", "),
        window = format_window(&bundle.window),
        references = format_references(&bundle.references),
        language = bundle.language_code,
        query = query,
        gap = GAP_MARKER,
    )
}

/// Compose the interjection prompt.
///
/// The model decides whether the persona has something worth adding; it
/// answers with `LISTEN` to stay quiet.
pub fn interjection_prompt(persona: &PersonaConfig, bundle: &ContextBundle) -> String {
    format!(
        "You are {name}, a {role} with the following personality traits: {traits}.\n\
         \n\
         Recent discussion:\n{window}\n\
         \n\
         Decide whether to interject. Only speak if your input is valuable\n\
         right now and moves the conversation forward. If not, respond with\n\
         exactly {listen}.",
        name = persona.name,
        role = persona.role,
        traits = persona.personality_traits.join(", "),
        window = format_window(&bundle.window),
        listen = LISTEN_TOKEN,
    )
}

/// Compose the end-of-meeting reflection prompt.
pub fn reflection_prompt(persona: &PersonaConfig, bundle: &ContextBundle) -> String {
    format!(
        "You are {name}, a {role} with the following personality traits: {traits}.\n\
         \n\
         Discussion transcript:\n{window}\n\
         \n\
         Reflect on the discussion and provide: key insights gained, areas\n\
         for further exploration, concerns or risks identified, and\n\
         suggested next steps.",
        name = persona.name,
        role = persona.role,
        traits = persona.personality_traits.join(", "),
        window = format_window(&bundle.window),
    )
}

/// Render the recent window as attributed transcript lines.
pub fn format_window(window: &[Utterance]) -> String {
    if window.is_empty() {
        return "(no recent messages)".to_string();
    }
    window
        .iter()
        .map(|u| format!("[{}] {}", u.speaker_id, u.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render references as a numbered list with similarity scores.
pub fn format_references(references: &[Reference]) -> String {
    if references.is_empty() {
        return "(none)".to_string();
    }
    references
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. ({:.2}) {}", i + 1, r.similarity_score, r.source_text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip the knowledge-gap marker from a reply.
///
/// Returns the cleaned text and whether the marker was present.
pub fn strip_gap_marker(reply: &str) -> (String, bool) {
    if reply.contains(GAP_MARKER) {
        let cleaned = reply.replace(GAP_MARKER, "");
        (cleaned.split_whitespace().collect::<Vec<_>>().join(" "), true)
    } else {
        (reply.trim().to_string(), false)
    }
}

// =============================================================================
// Tests
// =============================================================================
