use thiserror::Error;

/// Extractor failure taxonomy. Extractors tag every failure with one of
/// these; the scheduler is the only consumer and decides retry/abandon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Upstream signalled quota exhaustion (HTTP 429 or an explicit quota
    /// response). `retry_after` is seconds when the upstream said so; the
    /// scheduler substitutes its configured default otherwise.
    #[error("rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    /// Timeout, 5xx, or a mid-stream parse failure. Retried with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// 4xx other than 429, malformed target, unsupported URL variant.
    /// Never retried.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ExtractError {
    /// Map an HTTP status to the taxonomy. `retry_after` comes from the
    /// Retry-After header when the caller parsed one.
    pub fn from_status(status: u16, retry_after: Option<u64>) -> Self {
        match status {
            429 => ExtractError::RateLimited { retry_after },
            s if s >= 500 => ExtractError::Transient(format!("upstream status {s}")),
            s => ExtractError::Permanent(format!("upstream status {s}")),
        }
    }
}

/// Pipeline-fatal conditions. Anything here aborts the run before apply.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("graph path does not exist: {0}")]
    GraphPath(String),

    #[error("queue overflow: {len} jobs exceeds max_queue_size {max}")]
    QueueFull { len: usize, max: usize },

    #[error("invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("outline error in {path}: {reason}")]
    Outline { path: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ExtractError::from_status(429, Some(7)),
            ExtractError::RateLimited { retry_after: Some(7) }
        );
        assert!(matches!(ExtractError::from_status(503, None), ExtractError::Transient(_)));
        assert!(matches!(ExtractError::from_status(404, None), ExtractError::Permanent(_)));
        assert!(matches!(ExtractError::from_status(403, None), ExtractError::Permanent(_)));
    }
}
