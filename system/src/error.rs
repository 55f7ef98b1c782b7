use thiserror::Error;

/// A received snapshot could not be turned back into pixels. The receiver keeps
/// whatever it was showing before.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] png::DecodingError),
    #[error("cannot encode snapshot: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("snapshot of {width}x{height} exceeds the {limit}px side limit")]
    TooLarge { width: u32, height: u32, limit: u32 },
    #[error("unsupported snapshot color type {0:?}")]
    ColorType(png::ColorType),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("cannot encode message: {0}")]
    Encode(#[source] bincode::Error),
    #[error("cannot decode message: {0}")]
    Decode(#[source] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected a color like #rrggbb, got {0:?}")]
pub struct InvalidColor(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tool {0:?}")]
pub struct InvalidTool(pub String);
