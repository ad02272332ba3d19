use thiserror::Error;

/// The error taxonomy surfaced at the orchestrator boundary.
///
/// Every variant corresponds to one of the failure kinds a caller must be
/// able to distinguish; `main` is the only place these are rendered to text.
#[derive(Debug, Error)]
pub enum HistoError {
    #[error("unknown histogram id: {0}")]
    UnknownId(i64),
    #[error("bad header: {0}")]
    BadHeader(String),
    #[error("short read: expected {expected} bytes, found {found}")]
    ShortRead { expected: u64, found: u64 },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("bad rebin: {0}")]
    BadRebin(String),
    #[error("bad configuration: {0}")]
    BadConfig(String),
    #[error("unsupported dimensionality: {0}")]
    UnsupportedDim(u16),
    #[error("polygon malformed: {0}")]
    PolygonMalformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
