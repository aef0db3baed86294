use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VadError {
    #[error("invalid sub-window: {got} samples not usable at {sample_rate_hz} Hz")]
    InvalidWindow { got: usize, sample_rate_hz: u32 },

    #[error("detector failure: {0}")]
    Detector(String),
}
