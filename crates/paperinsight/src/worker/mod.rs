pub mod job;
pub mod pool;
pub mod retry;

pub use job::{Job, JobResult};
pub use pool::WorkerPool;
pub use retry::RetryPolicy;
