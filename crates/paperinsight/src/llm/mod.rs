pub mod client;

pub use client::{AnalysisClient, LlmClient, LlmConfig, LlmError};
