// screening.rs
//
// Decides which shell quartets reach the integral engine. Permutational
// symmetry keeps one canonical representative (i >= j, k >= l, bra pair
// >= ket pair) per equivalence class, tagged with its multiplicity; the
// Schwarz inequality |(ab|cd)| <= sqrt((ab|ab)) sqrt((cd|cd)) drops
// quartets that cannot exceed the threshold. The pair-level bound is
// computed once per shell pair (quadratic cost) and reused by every
// quartet sharing the pair.

use ndarray::Array2;
use rayon::prelude::*;

use crate::basis::BasisSet;
use crate::error::ScfError;
use crate::int2e::{eri_block, ShellPair};

/// Canonical representative of a permutational equivalence class of shell
/// quartets. `weight` is the number of distinct ordered index tuples in
/// the class (1, 2, 4, or 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellQuartet {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub l: usize,
    pub weight: u32,
}

impl ShellQuartet {
    /// Distinct slot permutations of (i, j, k, l) under the eightfold
    /// ERI symmetry group, deduplicated by the shell tuple they produce;
    /// the list length equals `weight`. The Fock builder scatters the
    /// computed block once per entry, which realizes the multiplicity
    /// exactly.
    pub fn slot_permutations(&self) -> Vec<[u8; 4]> {
        const GROUP: [[u8; 4]; 8] = [
            [0, 1, 2, 3],
            [1, 0, 2, 3],
            [0, 1, 3, 2],
            [1, 0, 3, 2],
            [2, 3, 0, 1],
            [3, 2, 0, 1],
            [2, 3, 1, 0],
            [3, 2, 1, 0],
        ];
        let shells = [self.i, self.j, self.k, self.l];
        let mut seen: Vec<[usize; 4]> = Vec::with_capacity(8);
        let mut out = Vec::with_capacity(8);
        for sp in GROUP {
            let tuple = [
                shells[sp[0] as usize],
                shells[sp[1] as usize],
                shells[sp[2] as usize],
                shells[sp[3] as usize],
            ];
            if !seen.contains(&tuple) {
                seen.push(tuple);
                out.push(sp);
            }
        }
        out
    }

    /// The distinct ordered shell tuples of this equivalence class.
    pub fn permutations(&self) -> Vec<[usize; 4]> {
        let shells = [self.i, self.j, self.k, self.l];
        self.slot_permutations()
            .into_iter()
            .map(|sp| {
                [
                    shells[sp[0] as usize],
                    shells[sp[1] as usize],
                    shells[sp[2] as usize],
                    shells[sp[3] as usize],
                ]
            })
            .collect()
    }
}

/// Per-shell-pair precomputation: primitive product data for the ERI
/// engine plus the Schwarz diagonal bound q_ij = sqrt(max |(ij|ij)|).
pub struct PairCache {
    n_shells: usize,
    pairs: Vec<ShellPair>,
    schwarz: Array2<f64>,
}

impl PairCache {
    pub fn build(basis: &BasisSet) -> Result<Self, ScfError> {
        let n = basis.n_shells();
        let index_pairs: Vec<(usize, usize)> =
            (0..n).flat_map(|i| (0..=i).map(move |j| (i, j))).collect();

        let built: Vec<Result<(ShellPair, f64), ScfError>> = index_pairs
            .par_iter()
            .map(|&(i, j)| {
                let pair = ShellPair::build(basis, i, j);
                let diag = eri_block(basis, &pair, &pair)?;
                let dims = diag.dim();
                let mut qmax = 0.0f64;
                for a in 0..dims.0 {
                    for b in 0..dims.1 {
                        qmax = qmax.max(diag[(a, b, a, b)].abs());
                    }
                }
                Ok((pair, qmax.sqrt()))
            })
            .collect();

        let mut pairs = Vec::with_capacity(index_pairs.len());
        let mut schwarz = Array2::<f64>::zeros((n, n));
        for (res, &(i, j)) in built.into_iter().zip(&index_pairs) {
            let (pair, q) = res?;
            pairs.push(pair);
            schwarz[(i, j)] = q;
            schwarz[(j, i)] = q;
        }
        Ok(PairCache { n_shells: n, pairs, schwarz })
    }

    #[inline]
    fn tri(i: usize, j: usize) -> usize {
        debug_assert!(i >= j);
        i * (i + 1) / 2 + j
    }

    /// Pair data for shells (i, j) with i >= j.
    pub fn pair(&self, i: usize, j: usize) -> &ShellPair {
        &self.pairs[Self::tri(i, j)]
    }

    /// Cached Schwarz bound sqrt(max |(ij|ij)|).
    pub fn schwarz(&self, i: usize, j: usize) -> f64 {
        self.schwarz[(i, j)]
    }

    pub fn n_shells(&self) -> usize {
        self.n_shells
    }

    /// Lazy stream of canonical quartets surviving the Schwarz test at
    /// `threshold`. A threshold of zero emits every unique quartet.
    pub fn screened_quartets(&self, threshold: f64) -> ScreenedQuartets<'_> {
        ScreenedQuartets { cache: self, threshold, bra: 0, ket: 0 }
    }
}

/// Iterator over canonical quartets, bra pair index >= ket pair index,
/// pairs enumerated in triangular order.
pub struct ScreenedQuartets<'a> {
    cache: &'a PairCache,
    threshold: f64,
    bra: usize,
    ket: usize,
}

impl ScreenedQuartets<'_> {
    fn unpack(pair_index: usize) -> (usize, usize) {
        // Invert tri(i, j): largest i with i(i+1)/2 <= pair_index.
        let mut i = (((8 * pair_index + 1) as f64).sqrt() as usize).saturating_sub(1) / 2;
        while (i + 1) * (i + 2) / 2 <= pair_index {
            i += 1;
        }
        (i, pair_index - i * (i + 1) / 2)
    }
}

impl Iterator for ScreenedQuartets<'_> {
    type Item = ShellQuartet;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.cache.n_shells;
        let n_pairs = n * (n + 1) / 2;
        loop {
            if self.bra >= n_pairs {
                return None;
            }
            let bra = self.bra;
            let ket = self.ket;
            if self.ket == bra {
                self.bra += 1;
                self.ket = 0;
            } else {
                self.ket += 1;
            }

            let (i, j) = Self::unpack(bra);
            let (k, l) = Self::unpack(ket);
            if self.cache.schwarz[(i, j)] * self.cache.schwarz[(k, l)] < self.threshold {
                continue;
            }
            let mut weight = 1;
            if i != j {
                weight *= 2;
            }
            if k != l {
                weight *= 2;
            }
            if bra != ket {
                weight *= 2;
            }
            return Some(ShellQuartet { i, j, k, l, weight });
        }
    }
}
