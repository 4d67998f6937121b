//! The per-job step sequence: load, mark processing, extract, prompt,
//! invoke, parse, persist.

use std::sync::Arc;

use tracing::{info, info_span, Instrument};

use crate::config::Config;
use crate::db::paper_repo::{self, PaperStatus};
use crate::db::{analysis_repo, Database};
use crate::extract::{Extractor, PdfExtractor};
use crate::llm::{AnalysisClient, LlmClient};
use crate::parser;
use crate::prompt::PromptBuilder;
use crate::storage::{ByteSource, DocumentStore};
use crate::worker::Job;

use super::error::PipelineError;

pub struct Pipeline {
    db: Database,
    source: Arc<dyn ByteSource>,
    extractor: Arc<dyn Extractor>,
    prompt: PromptBuilder,
    client: Arc<dyn AnalysisClient>,
}

impl Pipeline {
    /// Constructor with injectable collaborators. Tests use this to
    /// substitute fakes for the store, extractor, and service client.
    pub fn new(
        db: Database,
        source: Arc<dyn ByteSource>,
        extractor: Arc<dyn Extractor>,
        prompt: PromptBuilder,
        client: Arc<dyn AnalysisClient>,
    ) -> Self {
        Self {
            db,
            source,
            extractor,
            prompt,
            client,
        }
    }

    /// Production constructor — wires the on-disk store, the PDF
    /// extractor, and the real service client from config.
    pub fn from_config(config: &Config, db: Database) -> Self {
        Self::new(
            db,
            Arc::new(DocumentStore::new(&config.upload_dir)),
            Arc::new(PdfExtractor::new()),
            PromptBuilder::new(config.prompt.clone()),
            Arc::new(LlmClient::new(config.llm.clone())),
        )
    }

    /// Runs one attempt for one paper, in order, short-circuiting on the
    /// first failing step. Status writes happen exactly as the lifecycle
    /// requires: the `processing` transition commits alone before any
    /// slow work, and the analysis upsert commits atomically with the
    /// `completed` transition.
    ///
    /// Re-running this for the same paper is safe: extraction and
    /// prompting are pure, and persistence overwrites by paper id.
    pub async fn run(&self, job: &Job) -> Result<(), PipelineError> {
        let span = info_span!("pipeline", paper_id = job.paper_id, attempt = job.attempt);
        self.run_inner(job).instrument(span).await
    }

    async fn run_inner(&self, job: &Job) -> Result<(), PipelineError> {
        // Step 1: load the paper; absent means abort, with no mutation.
        let paper = self
            .db
            .with_conn(|c| paper_repo::find_by_id(c, job.paper_id))?
            .ok_or(PipelineError::PaperNotFound(job.paper_id))?;

        // Step 2: mark processing in its own commit so readers observe
        // progress before the slow steps run.
        {
            let _step = info_span!("mark_processing").entered();
            self.db.with_conn(|c| {
                paper_repo::update_status(c, job.paper_id, PaperStatus::Processing, None)
            })?;
        }

        // Step 3: read the stored bytes and extract text.
        let text = {
            let _step = info_span!("extract_text").entered();
            let bytes = self.source.read(&paper.stored_filename)?;
            self.extractor.extract(&bytes)?
        };

        // Step 4: build the prompt and call the analysis service.
        let prompt = self.prompt.build(&text);
        let raw = self
            .client
            .generate(&prompt)
            .instrument(info_span!("generate"))
            .await?;

        // Step 5: map the response into analysis fields.
        let fields = parser::parse(&raw)?;

        // Step 6: upsert the analysis and settle `completed` in one
        // transaction — neither is observable without the other.
        {
            let _step = info_span!("persist").entered();
            self.db.with_tx(|tx| {
                analysis_repo::upsert(tx, job.paper_id, &fields)?;
                paper_repo::update_status(tx, job.paper_id, PaperStatus::Completed, None)
            })?;
        }

        info!(
            "Paper {} analyzed on attempt {} ({})",
            job.paper_id, job.attempt, paper.filename
        );
        Ok(())
    }
}
