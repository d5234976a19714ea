// scf.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;
use ndarray::{s, Array1, Array2};
use ndarray_linalg::{Eigh, UPLO};

use crate::basis::BasisSet;
use crate::diis::Diis;
use crate::error::ScfError;
use crate::fock::{FockBuilder, XcFunctional, XcGrid};
use crate::int1e::{core_hamiltonian, overlap_matrix};
use crate::molecule::Molecule;
use crate::screening::PairCache;

/// Eigenvalues of S below this are treated as a linear dependency and
/// projected out of the orthogonalizer.
const LINDEP_TOL: f64 = 1e-10;

/// Energy rise counted as a divergence step.
const DIVERGENCE_RISE: f64 = 1e-4;

/// Consecutive rises before the driver gives up as diverged.
const DIVERGENCE_PATIENCE: usize = 3;

/// Loewdin symmetric orthogonalizer X = S^{-1/2}, projecting out the
/// near-null space of S so linearly dependent basis sets stay solvable.
/// # Arguments
///     `s`: Array2, overlap matrix; only the lower triangle is read.
///     `tol`: eigenvalues of S below this are dropped.
pub fn loewdin_x(s: &Array2<f64>, tol: f64) -> Array2<f64> {
    // S = U Lambda U^T
    let (lambdas, evecs) = s.eigh(UPLO::Lower).expect("overlap diagonalization");
    // Lambda^{-1/2} with projection.
    let invsqrt: Array1<f64> =
        lambdas.mapv(|x| if x > tol { 1.0 / x.sqrt() } else { 0.0 });
    let d = Array2::from_diag(&invsqrt);
    // X = U Lambda^{-1/2} U^T
    evecs.dot(&d).dot(&evecs.t())
}

/// Solve the generalized eigenproblem F C = S C e given X = S^{-1/2}.
/// Eigenvalues come out ascending, so Aufbau occupation is a slice.
pub fn solve_roothaan(f: &Array2<f64>, x: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    // F~ = X^T F X, then F~ U = U e and C = X U.
    let ft = x.t().dot(f).dot(x);
    let (epsilon, u) = ft.eigh(UPLO::Lower).expect("Fock diagonalization");
    (epsilon, x.dot(&u))
}

/// Initial density choice.
#[derive(Debug, Clone)]
pub enum InitialGuess {
    /// Diagonalize the core Hamiltonian.
    Core,
    /// Diagonal atomic-style occupation (2.0 on the lowest AOs).
    AtomicDensity,
    /// Caller-supplied density matrix.
    User(Array2<f64>),
}

/// SCF configuration. An explicit object handed to the driver, never
/// process-wide state, so independent calculations cannot interfere.
#[derive(Debug, Clone)]
pub struct ScfConfig {
    /// Energy convergence threshold (Hartree).
    pub conv_tol: f64,
    /// Orbital-gradient norm threshold; defaults to sqrt(conv_tol).
    pub conv_tol_grad: Option<f64>,
    /// Iteration cap.
    pub max_cycle: usize,
    /// DIIS history window; 0 disables DIIS.
    pub diis_space: usize,
    /// First cycle on which DIIS extrapolation may act.
    pub diis_start_cycle: usize,
    /// Schwarz screening cutoff; 0.0 disables screening.
    pub screening_threshold: f64,
    /// Virtual-orbital level shift (Hartree).
    pub level_shift: f64,
    /// Fock damping factor for the cycles before DIIS starts.
    pub damp: f64,
    pub initial_guess: InitialGuess,
    /// Print the per-cycle convergence table.
    pub verbose: bool,
}

impl Default for ScfConfig {
    fn default() -> Self {
        ScfConfig {
            conv_tol: 1e-9,
            conv_tol_grad: None,
            max_cycle: 100,
            diis_space: 8,
            diis_start_cycle: 1,
            screening_threshold: 1e-12,
            level_shift: 0.0,
            damp: 0.0,
            initial_guess: InitialGuess::Core,
            verbose: false,
        }
    }
}

/// Shareable cancellation flag, checked between iterations only so an
/// abort never leaves a half-accumulated Fock matrix behind.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal condition of an SCF run. Convergence failures are data, not
/// errors: callers (geometry optimizers, scans) inspect and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScfOutcome {
    Converged,
    MaxIterExceeded,
    Diverged,
    Cancelled,
}

/// Driver state, observable while the driver is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScfState {
    Initialized,
    Iterating(usize),
    Finished(ScfOutcome),
}

/// Orbital energies and coefficients from one diagonalization. A value:
/// each iteration produces a fresh set rather than mutating the old one.
#[derive(Debug, Clone)]
pub struct OrbitalSet {
    pub energies: Array1<f64>,
    pub coefficients: Array2<f64>,
}

/// Result of an SCF run; present even for non-converged outcomes so the
/// best available state can be inspected.
#[derive(Debug, Clone)]
pub struct ScfResult {
    /// Total energy: electronic + nuclear repulsion (+ dispersion).
    pub energy: f64,
    pub density: Array2<f64>,
    pub orbitals: OrbitalSet,
    pub converged: bool,
    pub iterations: usize,
    pub outcome: ScfOutcome,
}

/// Post-convergence dispersion correction, supplied by the caller.
pub trait DispersionCorrection {
    fn energy(&self, mol: &Molecule) -> f64;
}

/// Restricted Hartree-Fock / Kohn-Sham driver.
pub struct Rhf<'a> {
    mol: &'a Molecule,
    basis: &'a BasisSet,
    config: ScfConfig,
    n_occ: usize,
    xc: Option<(&'a dyn XcFunctional, &'a XcGrid)>,
    dispersion: Option<&'a dyn DispersionCorrection>,
    cancel: Option<CancelToken>,
    state: ScfState,
}

impl<'a> Rhf<'a> {
    pub fn new(mol: &'a Molecule, basis: &'a BasisSet, config: ScfConfig) -> Result<Self, ScfError> {
        if mol.multiplicity != 1 {
            return Err(ScfError::InvalidConfig(format!(
                "restricted driver requires multiplicity 1, got {}",
                mol.multiplicity
            )));
        }
        let n_elec = mol.n_electrons();
        if n_elec % 2 != 0 {
            return Err(ScfError::InvalidConfig(format!(
                "restricted driver requires an even electron count, got {}",
                n_elec
            )));
        }
        let n_occ = n_elec / 2;
        if n_occ > basis.n_ao() {
            return Err(ScfError::InvalidConfig(format!(
                "{} occupied orbitals exceed {} basis functions",
                n_occ,
                basis.n_ao()
            )));
        }
        Ok(Rhf {
            mol,
            basis,
            config,
            n_occ,
            xc: None,
            dispersion: None,
            cancel: None,
            state: ScfState::Initialized,
        })
    }

    pub fn with_xc(mut self, functional: &'a dyn XcFunctional, grid: &'a XcGrid) -> Self {
        self.xc = Some((functional, grid));
        self
    }

    pub fn with_dispersion(mut self, correction: &'a dyn DispersionCorrection) -> Self {
        self.dispersion = Some(correction);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> ScfState {
        self.state
    }

    fn initial_density(
        &self,
        h: &Array2<f64>,
        x: &Array2<f64>,
    ) -> Result<Array2<f64>, ScfError> {
        let n = self.basis.n_ao();
        match &self.config.initial_guess {
            InitialGuess::Core => {
                let (_, c) = solve_roothaan(h, x);
                Ok(density_from_orbitals(&c, self.n_occ))
            }
            InitialGuess::AtomicDensity => {
                let mut d = Array2::<f64>::zeros((n, n));
                for i in 0..self.n_occ {
                    d[(i, i)] = 2.0;
                }
                Ok(d)
            }
            InitialGuess::User(d) => {
                if d.dim() != (n, n) {
                    return Err(ScfError::InvalidConfig(format!(
                        "user density is {:?}, basis has {} functions",
                        d.dim(),
                        n
                    )));
                }
                Ok(d.clone())
            }
        }
    }

    /// Run the SCF loop to a terminal state. Numerically fatal conditions
    /// (overflowing integrals, bad input) come back as `Err`; convergence
    /// failures come back as an `Ok` result with the matching outcome.
    pub fn run(&mut self) -> Result<ScfResult, ScfError> {
        let cfg = self.config.clone();
        let conv_tol_grad = cfg.conv_tol_grad.unwrap_or_else(|| cfg.conv_tol.sqrt());

        let s_mat = overlap_matrix(self.basis)?;
        let h = core_hamiltonian(self.basis, self.mol)?;
        let x = loewdin_x(&s_mat, LINDEP_TOL);
        let cache = PairCache::build(self.basis)?;
        let mut builder = FockBuilder::new(self.basis, &cache, cfg.screening_threshold);
        if let Some((functional, grid)) = self.xc {
            builder = builder.with_xc(functional, grid);
        }

        let e_nuc = self.mol.nuclear_repulsion();
        let mut d = self.initial_density(&h, &x)?;
        let mut diis = Diis::new(cfg.diis_space.max(1));

        let mut orbitals = OrbitalSet {
            energies: Array1::zeros(self.basis.n_ao()),
            coefficients: Array2::eye(self.basis.n_ao()),
        };
        let mut e_last = f64::INFINITY;
        let mut f_prev: Option<Array2<f64>> = None;
        let mut rises = 0usize;
        let remedied = cfg.level_shift > 0.0 || cfg.damp > 0.0;

        if cfg.verbose {
            println!("{:>4} {:>16} {:>12} {:>12}", "i", "E", "dE", "|FDS-SDF|");
        }

        let mut outcome = ScfOutcome::MaxIterExceeded;
        let mut cycle = 0usize;
        while cycle < cfg.max_cycle {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                outcome = ScfOutcome::Cancelled;
                break;
            }
            self.state = ScfState::Iterating(cycle);

            // Fock pieces and the energy of the current density.
            let contribution = builder.two_electron(&d)?;
            let f_raw = &h + &contribution.coulomb_exchange + &contribution.vxc;
            let e_new = e_nuc
                + (&d * &h).sum()
                + 0.5 * (&d * &contribution.coulomb_exchange).sum()
                + contribution.exc;
            let grad_norm = frobenius(&Diis::build_error(&f_raw, &d, &s_mat));

            let mut f_use = f_raw.clone();

            // Damping on the pre-DIIS cycles.
            if cfg.damp > 0.0 && cycle < cfg.diis_start_cycle {
                if let Some(prev) = &f_prev {
                    f_use = &f_use * (1.0 - cfg.damp) + prev * cfg.damp;
                }
            }
            f_prev = Some(f_use.clone());

            // DIIS extrapolation, falling back to the raw Fock when the
            // small linear system degenerates.
            if cfg.diis_space > 0 && cycle >= cfg.diis_start_cycle {
                diis.push(&f_use, &d, &s_mat);
                match diis.extrapolate() {
                    Ok(Some(fx)) => f_use = fx,
                    Ok(None) => {}
                    Err(ScfError::SingularExtrapolation) => {
                        warn!("cycle {}: singular DIIS system, using unextrapolated Fock", cycle);
                    }
                    Err(other) => return Err(other),
                }
            }

            // Level shift pushes virtuals up: F + shift (S - S D/2 S).
            if cfg.level_shift > 0.0 {
                let sds = s_mat.dot(&(&d * 0.5)).dot(&s_mat);
                f_use = f_use + (&s_mat - &sds) * cfg.level_shift;
            }

            let (e_orb, c) = solve_roothaan(&f_use, &x);
            orbitals = OrbitalSet { energies: e_orb, coefficients: c };
            let d_new = density_from_orbitals(&orbitals.coefficients, self.n_occ);

            let d_e = e_new - e_last;
            if cfg.verbose {
                println!("{:4} {:16.10} {:12.4e} {:12.4e}", cycle, e_new, d_e, grad_norm);
            }

            if cycle > 0 && d_e.abs() < cfg.conv_tol && grad_norm < conv_tol_grad {
                e_last = e_new;
                outcome = ScfOutcome::Converged;
                cycle += 1;
                break;
            }

            // Divergence watchdog: sustained energy rises with no remedy
            // configured are reported, not silently tolerated.
            if cycle > 0 && d_e > DIVERGENCE_RISE {
                rises += 1;
                if rises >= DIVERGENCE_PATIENCE && !remedied {
                    e_last = e_new;
                    outcome = ScfOutcome::Diverged;
                    break;
                }
            } else {
                rises = 0;
            }

            d = d_new;
            e_last = e_new;
            cycle += 1;
        }

        let mut energy = e_last;
        if outcome == ScfOutcome::Converged {
            if let Some(correction) = self.dispersion {
                energy += correction.energy(self.mol);
            }
        }

        self.state = ScfState::Finished(outcome);
        Ok(ScfResult {
            energy,
            density: d,
            orbitals,
            converged: outcome == ScfOutcome::Converged,
            iterations: cycle,
            outcome,
        })
    }
}

/// D = 2 C_occ C_occ^T.
fn density_from_orbitals(c: &Array2<f64>, n_occ: usize) -> Array2<f64> {
    let c_occ = c.slice(s![.., 0..n_occ]);
    c_occ.dot(&c_occ.t()) * 2.0
}

fn frobenius(m: &Array2<f64>) -> f64 {
    (m * m).sum().sqrt()
}
