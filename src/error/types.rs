use thiserror::Error;

/// Unified result type for the physical layout crate.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors surfaced while building, decoding or encoding physical layouts.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("layout has no keys")]
    EmptyLayout,
    #[error("no `compatible = \"zmk,physical-layout\"` nodes nor a single `keys` property found")]
    NoLayoutFound,
    #[error("no `display-name` property found for physical layout node `{node}`")]
    MissingDisplayName { node: String },
    #[error("no `keys` property found for layout \"{display_name}\"")]
    MissingKeys { display_name: String },
    #[error("unrecognized position binding `{tag}`")]
    UnrecognizedBinding { tag: String },
    #[error("malformed fixed-point number `{token}`")]
    MalformedNumber { token: String },
    #[error("key {index}: {reason}")]
    InvalidKey { index: usize, reason: &'static str },
    #[error("devicetree syntax error on line {line}: {message}")]
    DtsSyntax { line: usize, message: String },
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LayoutError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }
}
