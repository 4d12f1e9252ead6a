pub mod error;
pub mod model;

pub use error::PrepareError;
pub use model::{DownloadJob, LogEntry, LogLevel};
