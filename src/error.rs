use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewsError>;

#[derive(Debug, Error)]
pub enum NewsError {
    /// Bad caller input; never retried.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// One source was unreachable or unparsable. Recovered by the aggregator.
    #[error("failed to fetch feed '{source_id}': {reason}")]
    FeedFetch { source_id: String, reason: String },

    #[error("all {attempted} requested sources failed")]
    AllSourcesFailed { attempted: usize },

    #[error("Source is disabled: {0}")]
    SourceDisabled(String),

    #[error("No enabled RSS sources found")]
    NoSources,
}

impl NewsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        NewsError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        NewsError::NotFound(msg.into())
    }

    pub fn feed_fetch(source_id: impl Into<String>, reason: impl ToString) -> Self {
        NewsError::FeedFetch {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the caller rather than by upstream feeds.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NewsError::Validation(_) | NewsError::NotFound(_) | NewsError::SourceDisabled(_)
        )
    }
}
