#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("--jobs must be at least 1")]
    InvalidJobs,

    #[error("Cannot write {path}: {reason}")]
    Output { path: String, reason: String },

    #[error("Background task failed: {0}")]
    Task(String),
}
