use thiserror::Error;

/// Failure kinds surfaced to the transport layer.
///
/// Each variant maps to a distinct user-facing message in the bot glue;
/// none of them is fatal to the process or to other in-flight requests.
#[derive(Debug, Error)]
pub enum AppError {
    /// The input text contained no recognizable post URL.
    #[error("no recognizable post URL in input")]
    InvalidUrl,

    /// The extraction engine returned nothing usable for the URL.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// A quality was selected after the stored context was lost.
    #[error("quality selection expired")]
    SessionExpired,

    /// The engine failed to produce a file for the selected format.
    #[error("download failed: {0}")]
    Download(String),

    /// Stats recording failed; swallowed (logged) at the call site.
    #[error("stats recording failed: {0}")]
    Stats(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
