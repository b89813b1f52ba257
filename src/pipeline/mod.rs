pub mod chat;
pub mod documents;
pub mod gateway;
pub mod json_block;
pub mod matching;
pub mod output;
pub mod prompting;
pub mod remarks; // Remark generation orchestrator
pub mod standards;
