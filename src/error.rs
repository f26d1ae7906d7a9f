use thiserror::Error;

/// Failure kinds surfaced by the map pipeline.
#[derive(Debug, Error)]
pub enum MapError {
    /// A dataset could not be fetched or decoded. Fatal for initialization.
    #[error("data unavailable from {origin}: {reason}")]
    DataUnavailable { origin: String, reason: String },

    #[error("invalid scale range: max ({max}) must be finite and greater than min ({min})")]
    InvalidScaleRange { min: f64, max: f64 },

    #[error("palette needs at least 2 colors, got {0}")]
    PaletteTooSmall(usize),

    #[error("dataset '{0}' has no usable values")]
    EmptyDataset(String),

    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),
}

impl MapError {
    pub fn unavailable(origin: impl Into<String>, reason: impl ToString) -> Self {
        MapError::DataUnavailable {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type MapResult<T> = Result<T, MapError>;
