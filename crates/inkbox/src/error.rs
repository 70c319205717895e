//! Error type shared by every fallible simulation operation.

use crate::grid::GridDims;

/// Failure raised by field allocation, configuration checks or a kernel dispatch.
///
/// A failed operation never swaps the field it was writing, so the front
/// buffers still hold the last completed state and remain safe to render.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A grid field could not be allocated. Fatal to the owning simulation.
    ResourceInitialization(String),
    /// A parameter is out of range or a kernel is missing a uniform.
    InvalidConfiguration(String),
    /// An op's inputs disagree in grid size. Channel counts may differ:
    /// kernels read and write whole cells and the channel count only
    /// describes how many components are meaningful.
    DimensionMismatch {
        op: &'static str,
        expected: GridDims,
        found: GridDims,
    },
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::ResourceInitialization(msg) => {
                write!(f, "Resource initialization failed: {}", msg)
            }
            SimError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            SimError::DimensionMismatch {
                op,
                expected,
                found,
            } => write!(
                f,
                "Dimension mismatch in {}: expected {}, found {}",
                op, expected, found
            ),
        }
    }
}

impl std::error::Error for SimError {}

/// Shorthand used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;
