pub mod dataset;
pub mod mapping;
pub mod prompt;
pub mod standard;

pub use dataset::TabularDataset;
pub use mapping::{ItemMatch, MatchMapping};
pub use prompt::{PromptTemplate, PromptUsage, DEFAULT_PRIORITY};
pub use standard::{StandardInfo, UNKNOWN_STANDARD_ID};
