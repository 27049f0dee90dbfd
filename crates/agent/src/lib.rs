//! Dialogue layer for the table-booking assistant.
//!
//! - `conversation`: intent and slot extraction (LLM-backed or keyword-only)
//! - `guardrails`: operating-hours checks on every requested time
//! - `holidays`: holiday lookup service and LLM date inference for the calendar resolver
//! - `renderer`: natural-language replies, from the LLM or tera templates
//! - `runtime`: the [`DialogueOrchestrator`] turn state machine
//!
//! The LLM only reads and phrases. Slot availability, hour validation and
//! every store mutation are decided by deterministic code.

pub mod conversation;
pub mod guardrails;
pub mod holidays;
pub mod llm;
pub mod prompts;
pub mod renderer;
pub mod runtime;

pub use conversation::{IntentExtractor, KeywordIntentExtractor, LlmIntentExtractor};
pub use holidays::{CalendarificClient, LlmDateInference};
pub use llm::{ChatCompletionsClient, LlmClient, LlmError};
pub use renderer::{LlmReplyRenderer, ReplyRenderer, TemplateReplyRenderer};
pub use runtime::{CancellationRequest, DialogueOrchestrator, TurnRequest, TurnResponse};
