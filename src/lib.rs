pub mod basis;
pub mod boys;
pub mod diis;
pub mod error;
pub mod fock;
pub mod hermite;
pub mod input;
pub mod int1e;
pub mod int2e;
pub mod molecule;
pub mod scf;
pub mod screening;
pub mod utils;

pub use basis::{BasisSet, Shell};
pub use error::ScfError;
pub use fock::{FockBuilder, XcFunctional, XcGrid};
pub use molecule::{LengthUnit, Molecule};
pub use scf::{
    CancelToken, DispersionCorrection, InitialGuess, OrbitalSet, Rhf, ScfConfig, ScfOutcome,
    ScfResult, ScfState,
};
pub use screening::{PairCache, ShellQuartet};
