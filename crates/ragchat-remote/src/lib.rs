//! HTTP collaborators: an OpenAI-compatible chat model and DuckDuckGo
//! instant-answer search.

pub mod chat;
pub mod search;

pub use chat::OpenAiChat;
pub use search::DuckDuckGoSearch;
