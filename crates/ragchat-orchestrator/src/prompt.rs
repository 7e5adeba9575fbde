//! Prompt text and answer attribution.

use ragchat_core::types::ConversationTurn;

/// Source label for a retrieved chunk without a `source` entry.
pub const DEFAULT_SOURCE: &str = "from your document";

pub const SUMMARY_INSTRUCTION: &str =
    "Summarize the following documents/search results into a concise, clear answer:";

/// `(text, source)` pair contributed by retrieval or the web fallback.
pub type ContextPair = (String, String);

pub fn summary_prompt(text: &str) -> String {
    format!("{SUMMARY_INSTRUCTION}\n\n{text}")
}

pub fn compose_context(pairs: &[ContextPair]) -> String {
    pairs
        .iter()
        .map(|(text, source)| format!("{text} (Source: {source})"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(persona: &str, history: &str, context: &str, question: &str) -> String {
    format!(
        "{persona}\nHere is the conversation history:\n{history}\n\n\
         Based on the following documents/search results, answer the user's latest question:\n\
         Documents:\n{context}\n\nUser Question: {question}\nAnswer:"
    )
}

/// Appends the sources footer; the answer is returned unchanged when there
/// are no sources.
pub fn with_attribution(answer: String, sources: &[String]) -> String {
    if sources.is_empty() {
        return answer;
    }
    let list = sources.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n");
    format!("{answer}\n\n---\nSources used in answer:\n{list}")
}
