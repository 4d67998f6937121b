pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod llm;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod storage;
pub mod worker;

pub use config::{load_config, Config};
pub use db::paper_repo::PaperStatus;
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, ExtractError, PaperInsightError, Result, StorageError, WorkerError,
};
pub use extract::{Extractor, PdfExtractor};
pub use llm::{AnalysisClient, LlmClient, LlmConfig, LlmError};
pub use parser::{AnalysisFields, ParseError};
pub use pipeline::{Pipeline, PipelineError};
pub use prompt::{PromptBuilder, PromptConfig};
pub use storage::{ByteSource, DocumentStore};
pub use worker::{Job, JobResult, RetryPolicy, WorkerPool};
