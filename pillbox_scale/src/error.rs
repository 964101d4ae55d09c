use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("scale state lock poisoned")]
    Poisoned,
    #[error("tare rejected by the scale")]
    TareRejected,
    #[error("bad trace row {row}: {reason}")]
    Trace { row: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, ScaleError>;
