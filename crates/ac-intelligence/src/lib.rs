//! Intelligence layer: the text oracles that decide when to commit and what
//! to say about it.
//!
//! - [`llm`]: provider abstraction over a completion API, with a Gemini
//!   implementation and a scripted mock for tests.
//! - [`prompts`]: prompt construction from a change report and preferences.
//! - [`oracle`]: judgment, description and session summary with timeouts
//!   and the fallbacks used when a call fails or no key is configured.

pub mod llm;
pub mod oracle;
pub mod prompts;
