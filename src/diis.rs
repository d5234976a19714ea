// diis.rs
use ndarray::{s, Array1, Array2};
use ndarray_linalg::Solve;

use crate::error::ScfError;

/// Pulay DIIS storage: bounded FIFO history of Fock and error matrices.
/// Owned by the SCF driver; cleared at the start of each calculation.
pub struct Diis {
    m: usize, // Size of the DIIS subspace, number of past SCF iterations with stored history.
    f_hist: Vec<Array2<f64>>,
    e_hist: Vec<Array2<f64>>,
}

impl Diis {
    /// Constructor, initialises an empty history with capacity `m`.
    /// # Arguments:
    ///     `m`: usize, size of the DIIS space.
    pub fn new(m: usize) -> Self {
        Self { m, f_hist: Vec::with_capacity(m), e_hist: Vec::with_capacity(m) }
    }

    /// Calculate the Pulay DIIS error E = F D S - S D F.
    /// # Arguments:
    ///     `f`: Array2, Fock matrix.
    ///     `d`: Array2, density matrix.
    ///     `s`: Array2, AO overlap matrix.
    pub fn build_error(f: &Array2<f64>, d: &Array2<f64>, s: &Array2<f64>) -> Array2<f64> {
        let fds = f.dot(d).dot(s);
        let sdf = s.dot(d).dot(f);
        &fds - &sdf
    }

    /// Add the (Fock, error) pair of the current cycle to the history,
    /// evicting the oldest entry once the window is exceeded.
    /// # Arguments:
    ///     `f`: Array2, Fock matrix.
    ///     `d`: Array2, density matrix.
    ///     `s`: Array2, AO overlap matrix.
    pub fn push(&mut self, f: &Array2<f64>, d: &Array2<f64>, s: &Array2<f64>) {
        let e = Self::build_error(f, d, s);
        self.f_hist.push(f.clone());
        self.e_hist.push(e);

        // Cap the subspace at size m.
        if self.f_hist.len() > self.m {
            self.f_hist.remove(0);
            self.e_hist.remove(0);
        }
    }

    /// Frobenius norm of the most recent error matrix, if any.
    pub fn last_error_norm(&self) -> Option<f64> {
        self.e_hist.last().map(|e| (e * e).sum().sqrt())
    }

    /// Number of stored history entries.
    pub fn len(&self) -> usize {
        self.e_hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e_hist.is_empty()
    }

    /// Drop all history (start of a new calculation).
    pub fn clear(&mut self) {
        self.f_hist.clear();
        self.e_hist.clear();
    }

    /// Extrapolate F_DIIS = sum_i c_i F_i, with the weights minimizing
    /// |sum_i c_i E_i| subject to sum_i c_i = 1. Returns `Ok(None)` while
    /// the history is too short to extrapolate, and
    /// `Err(SingularExtrapolation)` when the augmented system cannot be
    /// solved (collinear error vectors); the caller falls back to the
    /// unextrapolated Fock in that case.
    pub fn extrapolate(&self) -> Result<Option<Array2<f64>>, ScfError> {
        let m = self.e_hist.len();
        if m < 2 {
            return Ok(None);
        }

        // Augmented system: B_ij = <E_i|E_j> bordered by a row/column of
        // ones, rhs = [0 .. 0 1].
        let mut aug = Array2::<f64>::zeros((m + 1, m + 1));
        for i in 0..m {
            for j in 0..m {
                aug[(i, j)] = (&self.e_hist[i] * &self.e_hist[j]).sum();
            }
            aug[(i, m)] = 1.0;
            aug[(m, i)] = 1.0;
        }
        let mut rhs = Array1::<f64>::zeros(m + 1);
        rhs[m] = 1.0;

        let sol = aug.solve_into(rhs).map_err(|_| ScfError::SingularExtrapolation)?;
        if sol.iter().any(|c| !c.is_finite()) {
            return Err(ScfError::SingularExtrapolation);
        }
        let c = sol.slice(s![0..m]);

        let mut f_diis = &self.f_hist[0] * c[0];
        for i in 1..m {
            f_diis = f_diis + &self.f_hist[i] * c[i];
        }
        Ok(Some(f_diis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// With s = I and d projecting on the first AO, the commutator error
    /// of this Fock is [[0, -b], [c, 0]].
    fn toy(a: f64, b: f64, c: f64) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let s = Array2::<f64>::eye(2);
        let f = array![[a, b], [c, -a]];
        let d = array![[1.0, 0.0], [0.0, 0.0]];
        (f, d, s)
    }

    #[test]
    fn history_is_bounded_fifo() {
        let mut diis = Diis::new(3);
        for i in 0..6 {
            let (f, d, s) = toy(i as f64, 0.1 * (i + 1) as f64, 1.0);
            diis.push(&f, &d, &s);
        }
        assert_eq!(diis.len(), 3);
        // Oldest entries evicted: the first stored Fock is now i = 3.
        assert!((diis.f_hist[0][(0, 0)] - 3.0).abs() < 1e-14);
    }

    #[test]
    fn identical_error_vectors_are_singular() {
        let mut diis = Diis::new(5);
        let (f, d, s) = toy(1.0, 0.5, 0.8);
        diis.push(&f, &d, &s);
        diis.push(&f, &d, &s);
        assert_eq!(diis.extrapolate().unwrap_err(), ScfError::SingularExtrapolation);
    }

    #[test]
    fn short_history_yields_none() {
        let mut diis = Diis::new(5);
        let (f, d, s) = toy(1.0, 0.5, 0.8);
        diis.push(&f, &d, &s);
        assert!(diis.extrapolate().unwrap().is_none());
    }

    #[test]
    fn extrapolation_is_affine_in_history() {
        let mut diis = Diis::new(5);
        let (f1, d, s) = toy(1.0, 1.0, 0.5);
        let (f2, _, _) = toy(2.0, 0.3, 1.7);
        diis.push(&f1, &d, &s);
        diis.push(&f2, &d, &s);
        let f = diis.extrapolate().unwrap().unwrap();
        // Recover the weight from one entry, then every other entry must
        // be consistent with the same affine combination.
        let w = (f[(0, 0)] - f2[(0, 0)]) / (f1[(0, 0)] - f2[(0, 0)]);
        for idx in [(0, 1), (1, 0), (1, 1)] {
            let want = w * f1[idx] + (1.0 - w) * f2[idx];
            assert!((f[idx] - want).abs() < 1e-12);
        }
    }

    #[test]
    fn clear_resets_history() {
        let mut diis = Diis::new(4);
        let (f, d, s) = toy(1.0, 0.2, 0.4);
        diis.push(&f, &d, &s);
        diis.clear();
        assert!(diis.is_empty());
        assert!(diis.last_error_norm().is_none());
    }
}
