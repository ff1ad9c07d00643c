use crate::stream::SinkBuildError;

/// Configuration errors surfaced by [`LoggingContext::new`].
///
/// All of them are fatal at startup; nothing is retried.
///
/// [`LoggingContext::new`]: crate::LoggingContext::new
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("at least one stream must be configured")]
    NoStreams,

    #[error("stream #{index} could not be constructed: {source}")]
    Sink {
        index: usize,
        #[source]
        source: SinkBuildError,
    },

    #[error("logging context must be created inside a Tokio runtime")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
}
