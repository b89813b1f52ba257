//! Prompt assembly: template sources, per-row context, and composition.

pub mod composer;
pub mod row_context;
pub mod store;

pub use composer::{ordinal, ContextSection, PromptComposer, PromptInputs, DEFAULT_INSTRUCTION};
pub use row_context::{ContextCategory, RowContext};
pub use store::{CachedPromptStore, InMemoryPromptStore, JsonPromptStore, PromptStore, PromptStoreError};
