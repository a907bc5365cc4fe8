pub mod acquisition;
pub mod error;
pub mod gp;
pub mod kernel;
pub mod sampler;
pub mod sequence;

pub use acquisition::Acquisition;
pub use error::SamplerError;
pub use gp::{GaussianProcess, Prediction};
pub use kernel::Matern52;
pub use sampler::{AcquisitionKind, BayesSampler, EarlyStopConfig, Proposal, Sampler};
pub use sequence::{initial_design_length, InitialDesignKind};
