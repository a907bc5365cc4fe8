use thiserror::Error;

use opt_core::SpaceError;
use opt_sampler::SamplerError;
use opt_types::SettingsError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid configuration: {0}")]
    InvalidSpace(#[from] SpaceError),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
