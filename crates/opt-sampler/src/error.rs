use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("sampler has no dimensions to propose over")]
    EmptySpace,
    #[error("dimension `{0}` has a degenerate encoded range")]
    DegenerateRange(String),
}
