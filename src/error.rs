use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Misuse on main thread: {0}")]
    MisuseOnMainThread(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Scheduler already initialized")]
    AlreadyInitialized,

    #[error("Scheduler not initialized")]
    NotInitialized,

    #[error("Worker limit exceeded: {0}")]
    WorkerLimitExceeded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
