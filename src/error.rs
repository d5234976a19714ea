// error.rs
use std::fmt;

/// Errors surfaced by the basis registry, integral engine, and SCF driver.
/// Convergence failures are not errors: they are terminal states reported
/// through `ScfOutcome` so callers can inspect the partial result.
#[derive(Debug, Clone, PartialEq)]
pub enum ScfError {
    /// An atom type has no entry in the requested basis set.
    InvalidBasisSpec { element: String, basis: String },
    /// Inconsistent user input (impossible charge, odd electron count, ...).
    InvalidConfig(String),
    /// An intermediate recursion term left the representable range while
    /// evaluating an integral block. The calculation is aborted; the
    /// offending shell indices are reported.
    IntegralOverflow { shells: Vec<usize> },
    /// The DIIS linear system is singular (collinear error vectors).
    SingularExtrapolation,
}

impl fmt::Display for ScfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScfError::InvalidBasisSpec { element, basis } => {
                write!(f, "no entry for element {} in basis set '{}'", element, basis)
            }
            ScfError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            ScfError::IntegralOverflow { shells } => {
                write!(f, "integral recursion overflow for shells {:?}", shells)
            }
            ScfError::SingularExtrapolation => {
                write!(f, "DIIS extrapolation system is singular")
            }
        }
    }
}

impl std::error::Error for ScfError {}
