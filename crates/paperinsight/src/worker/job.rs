//! Job and job-result types.
//!
//! A job is an ephemeral unit of work: a paper identifier plus an
//! attempt counter. All durable state lives on the paper and analysis
//! rows; losing a queued job is at worst a delivery-guarantee question,
//! never a data-loss one.

/// One in-flight attempt to process a paper through the pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub paper_id: i64,
    /// 1-based attempt counter, incremented on every scheduler retry.
    pub attempt: u32,
}

impl Job {
    pub fn new(paper_id: i64) -> Self {
        Self {
            paper_id,
            attempt: 1,
        }
    }

    /// The job the scheduler re-delivers after a retryable failure.
    pub fn next_attempt(&self) -> Self {
        Self {
            paper_id: self.paper_id,
            attempt: self.attempt + 1,
        }
    }
}

/// Terminal outcome of a job, published once retries are exhausted or
/// the job settles. Intermediate retries are not reported.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub paper_id: i64,
    /// Attempts consumed, including the final one.
    pub attempts: u32,
    pub success: bool,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job: &Job) -> Self {
        Self {
            paper_id: job.paper_id,
            attempts: job.attempt,
            success: true,
            error: None,
        }
    }

    pub fn failure(job: &Job, error: impl Into<String>) -> Self {
        Self {
            paper_id: job.paper_id,
            attempts: job.attempt,
            success: false,
            error: Some(error.into()),
        }
    }
}
