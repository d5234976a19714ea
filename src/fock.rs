// fock.rs
//
// Contracts screened shell-quartet integral blocks with the current
// density matrix into the two-electron part of the Fock matrix (direct
// SCF: every Fock build re-evaluates the surviving integrals). Work is
// split into fixed-size quartet batches; each batch accumulates into
// private J/K buffers and the batch results are summed in a fixed order,
// so identical inputs reproduce identical matrices bit for bit.

use ndarray::Array2;
use rayon::prelude::*;

use crate::basis::BasisSet;
use crate::error::ScfError;
use crate::int2e::eri_block;
use crate::screening::{PairCache, ShellQuartet};

const QUARTET_BATCH: usize = 64;

/// Quadrature grid handed through to the exchange-correlation
/// collaborator; opaque to the Fock builder itself.
pub struct XcGrid {
    pub points: Vec<[f64; 3]>,
    pub weights: Vec<f64>,
}

/// Capability interface for an external exchange-correlation functional.
/// Pure Hartree-Fock corresponds to no functional (full exact exchange).
pub trait XcFunctional: Sync {
    /// Fraction of exact exchange mixed into the Fock matrix.
    fn exact_exchange_fraction(&self) -> f64;
    /// Evaluate the functional for a density on a grid, returning the
    /// energy contribution and the potential matrix.
    fn evaluate(&self, density: &Array2<f64>, grid: &XcGrid) -> (f64, Array2<f64>);
}

/// Two-electron contribution of one Fock build.
pub struct FockContribution {
    /// J - x/2 K, contracted from the screened integrals.
    pub coulomb_exchange: Array2<f64>,
    /// Exchange-correlation potential matrix (zero without a functional).
    pub vxc: Array2<f64>,
    /// Exchange-correlation energy (zero without a functional).
    pub exc: f64,
}

/// Builds Fock-matrix contributions for a fixed basis and screening
/// setup. Pure function of the density passed to `two_electron`; holds
/// no iteration state.
pub struct FockBuilder<'a> {
    basis: &'a BasisSet,
    cache: &'a PairCache,
    threshold: f64,
    xc: Option<(&'a dyn XcFunctional, &'a XcGrid)>,
}

impl<'a> FockBuilder<'a> {
    pub fn new(basis: &'a BasisSet, cache: &'a PairCache, threshold: f64) -> Self {
        FockBuilder { basis, cache, threshold, xc: None }
    }

    /// Plug in an exchange-correlation functional and its grid.
    pub fn with_xc(mut self, functional: &'a dyn XcFunctional, grid: &'a XcGrid) -> Self {
        self.xc = Some((functional, grid));
        self
    }

    /// Contract the screened quartets with `density`, producing
    /// J - x/2 K (plus the XC pieces when a functional is attached).
    pub fn two_electron(&self, density: &Array2<f64>) -> Result<FockContribution, ScfError> {
        let n = self.basis.n_ao();
        let x_hf = self
            .xc
            .map(|(f, _)| f.exact_exchange_fraction())
            .unwrap_or(1.0);

        let quartets: Vec<ShellQuartet> =
            self.cache.screened_quartets(self.threshold).collect();

        let partials: Result<Vec<(Array2<f64>, Array2<f64>)>, ScfError> = quartets
            .par_chunks(QUARTET_BATCH)
            .map(|batch| self.accumulate_batch(batch, density, n))
            .collect();

        // Fixed-order reduction over the batch list keeps the summation
        // order independent of the worker schedule.
        let mut j_mat = Array2::<f64>::zeros((n, n));
        let mut k_mat = Array2::<f64>::zeros((n, n));
        for (j_part, k_part) in partials? {
            j_mat += &j_part;
            k_mat += &k_part;
        }

        let coulomb_exchange = &j_mat - &(&k_mat * (0.5 * x_hf));

        let (exc, vxc) = match self.xc {
            Some((functional, grid)) => functional.evaluate(density, grid),
            None => (0.0, Array2::zeros((n, n))),
        };
        Ok(FockContribution { coulomb_exchange, vxc, exc })
    }

    /// J/K accumulation for one quartet batch into private buffers.
    fn accumulate_batch(
        &self,
        batch: &[ShellQuartet],
        density: &Array2<f64>,
        n: usize,
    ) -> Result<(Array2<f64>, Array2<f64>), ScfError> {
        let mut j_mat = Array2::<f64>::zeros((n, n));
        let mut k_mat = Array2::<f64>::zeros((n, n));

        for q in batch {
            let block = eri_block(
                self.basis,
                self.cache.pair(q.i, q.j),
                self.cache.pair(q.k, q.l),
            )?;
            let perms = q.slot_permutations();
            let offs = [
                self.basis.offset(q.i),
                self.basis.offset(q.j),
                self.basis.offset(q.k),
                self.basis.offset(q.l),
            ];
            let dims = block.dim();
            for a in 0..dims.0 {
                for b in 0..dims.1 {
                    for c in 0..dims.2 {
                        for d in 0..dims.3 {
                            let v = block[(a, b, c, d)];
                            if v == 0.0 {
                                continue;
                            }
                            let mu = [offs[0] + a, offs[1] + b, offs[2] + c, offs[3] + d];
                            // One scatter per distinct shell-level
                            // permutation realizes the multiplicity.
                            for sp in &perms {
                                let (m0, m1, m2, m3) = (
                                    mu[sp[0] as usize],
                                    mu[sp[1] as usize],
                                    mu[sp[2] as usize],
                                    mu[sp[3] as usize],
                                );
                                j_mat[(m0, m1)] += density[(m2, m3)] * v;
                                k_mat[(m0, m2)] += density[(m1, m3)] * v;
                            }
                        }
                    }
                }
            }
        }
        Ok((j_mat, k_mat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::int1e::overlap_matrix;
    use crate::int2e::eri_shell_quartet;
    use crate::molecule::{LengthUnit, Molecule};
    use ndarray::Array4;

    fn water() -> (Molecule, BasisSet) {
        let mol =
            Molecule::parse("O 0 0 0\nH 1.8 0 0\nH 0 1.8 0", LengthUnit::Bohr, 0, 1).unwrap();
        let basis = BasisSet::assign(&mol, "sto-3g").unwrap();
        (mol, basis)
    }

    /// Reference: the full AO ERI tensor from the unscreened quartic loop.
    fn dense_eri(basis: &BasisSet) -> Array4<f64> {
        let n = basis.n_ao();
        let mut eri = Array4::<f64>::zeros((n, n, n, n));
        for i in 0..basis.n_shells() {
            for j in 0..basis.n_shells() {
                for k in 0..basis.n_shells() {
                    for l in 0..basis.n_shells() {
                        let block = eri_shell_quartet(basis, i, j, k, l).unwrap();
                        let (oi, oj, ok, ol) = (
                            basis.offset(i),
                            basis.offset(j),
                            basis.offset(k),
                            basis.offset(l),
                        );
                        for ((a, b, c, d), &v) in block.indexed_iter() {
                            eri[(oi + a, oj + b, ok + c, ol + d)] = v;
                        }
                    }
                }
            }
        }
        eri
    }

    fn reference_jk(eri: &Array4<f64>, d: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let n = d.nrows();
        let mut j = Array2::<f64>::zeros((n, n));
        let mut k = Array2::<f64>::zeros((n, n));
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        j[(p, q)] += eri[(p, q, r, s)] * d[(r, s)];
                        k[(p, q)] += eri[(p, r, q, s)] * d[(r, s)];
                    }
                }
            }
        }
        (j, k)
    }

    #[test]
    fn matches_dense_contraction() {
        let (_, basis) = water();
        let cache = PairCache::build(&basis).unwrap();
        // A symmetric stand-in density with off-diagonal structure.
        let d = overlap_matrix(&basis).unwrap();
        let builder = FockBuilder::new(&basis, &cache, 0.0);
        let got = builder.two_electron(&d).unwrap();

        let eri = dense_eri(&basis);
        let (j, k) = reference_jk(&eri, &d);
        let want = &j - &(&k * 0.5);

        let diff = (&got.coulomb_exchange - &want)
            .iter()
            .fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(diff < 1e-10, "max deviation {}", diff);
    }

    #[test]
    fn reproducible_bitwise() {
        let (_, basis) = water();
        let cache = PairCache::build(&basis).unwrap();
        let d = overlap_matrix(&basis).unwrap();
        let builder = FockBuilder::new(&basis, &cache, 1e-12);
        let a = builder.two_electron(&d).unwrap().coulomb_exchange;
        let b = builder.two_electron(&d).unwrap().coulomb_exchange;
        assert_eq!(a, b);
    }

    #[test]
    fn screening_threshold_only_changes_cost() {
        let (_, basis) = water();
        let cache = PairCache::build(&basis).unwrap();
        let d = overlap_matrix(&basis).unwrap();
        let exact = FockBuilder::new(&basis, &cache, 0.0)
            .two_electron(&d)
            .unwrap()
            .coulomb_exchange;
        let screened = FockBuilder::new(&basis, &cache, 1e-10)
            .two_electron(&d)
            .unwrap()
            .coulomb_exchange;
        let diff = (&exact - &screened).iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(diff < 1e-8, "screening changed the result by {}", diff);
    }

    struct HalfExchange;
    impl XcFunctional for HalfExchange {
        fn exact_exchange_fraction(&self) -> f64 {
            0.5
        }
        fn evaluate(&self, density: &Array2<f64>, _grid: &XcGrid) -> (f64, Array2<f64>) {
            (0.0, Array2::zeros(density.raw_dim()))
        }
    }

    #[test]
    fn exchange_fraction_scales_k() {
        let (_, basis) = water();
        let cache = PairCache::build(&basis).unwrap();
        let d = overlap_matrix(&basis).unwrap();
        let grid = XcGrid { points: Vec::new(), weights: Vec::new() };
        let hybrid = HalfExchange;

        let full = FockBuilder::new(&basis, &cache, 0.0)
            .two_electron(&d)
            .unwrap()
            .coulomb_exchange;
        let half = FockBuilder::new(&basis, &cache, 0.0)
            .with_xc(&hybrid, &grid)
            .two_electron(&d)
            .unwrap()
            .coulomb_exchange;

        let eri = dense_eri(&basis);
        let (_, k) = reference_jk(&eri, &d);
        let diff = (&half - &full - &(&k * 0.25))
            .iter()
            .fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(diff < 1e-10, "hybrid exchange mismatch {}", diff);
    }
}
