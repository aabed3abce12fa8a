//! Unified error type.

/// A boxed error from outside the crate: a verifier, a resolver, a handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by onion's fallible operations.
///
/// Application-level errors (401, 404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures and errors that unwind through a pipeline without
/// any stage converting them into a response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("config: {0}")]
    Config(#[from] envy::Error),

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        source: matchit::InsertError,
    },

    /// A middleware name that is neither a registered stage nor a group.
    #[error("unknown middleware `{0}`")]
    UnknownStage(String),

    #[error("middleware group `{0}` contains itself")]
    GroupCycle(String),

    /// A stage failed to process the request.
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        source: BoxError,
    },

    /// The terminal handler failed.
    #[error("handler failed: {0}")]
    Terminal(#[source] BoxError),

    /// Never returned to callers; built only to be logged.
    #[error("terminate hook of `{stage}` failed: {source}")]
    TerminateHook {
        stage: &'static str,
        source: BoxError,
    },
}

impl Error {
    pub fn stage(stage: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Stage { stage, source: source.into() }
    }

    pub fn terminal(source: impl Into<BoxError>) -> Self {
        Self::Terminal(source.into())
    }
}
