// hermite.rs
//
// Hermite-Gaussian machinery shared by the one- and two-electron integral
// paths. The textbook recursions are evaluated iteratively into flat
// tables (no call recursion): `ECoeffs` holds the 1-D Hermite expansion
// coefficients E_t^{ij} of a primitive product, `RTable` the auxiliary
// Coulomb integrals R_{tuv} derived from the Boys function.

use crate::boys::boys;

/// Hermite expansion coefficients E_t^{ij} for one Cartesian direction of
/// a primitive pair, t in 0..=i+j. The Gaussian-product prefactor
/// exp(-mu * ab^2) is folded into the seed, so contracting E-tables of the
/// three directions yields the full product Gaussian.
#[derive(Debug, Clone)]
pub struct ECoeffs {
    lb: usize,
    tmax: usize,
    data: Vec<f64>,
}

impl ECoeffs {
    /// Build the table for exponents `a`, `b` and center separation
    /// `ab` = A - B along this direction.
    pub fn build(la: usize, lb: usize, a: f64, b: f64, ab: f64) -> Self {
        let p = a + b;
        let half_over_p = 0.5 / p;
        let mu = a * b / p;
        // P - A and P - B with P the product center.
        let pa = -b * ab / p;
        let pb = a * ab / p;

        let tmax = la + lb;
        let stride = tmax + 1;
        let mut data = vec![0.0; (la + 1) * (lb + 1) * stride];
        data[0] = (-mu * ab * ab).exp();

        let idx = |i: usize, j: usize, t: usize| (i * (lb + 1) + j) * stride + t;
        for i in 0..=la {
            for j in 0..=lb {
                if i == 0 && j == 0 {
                    continue;
                }
                // Raise either i (from i-1,j) or j (from i,j-1); the two
                // recursions differ only in the P-A vs P-B factor.
                let (src_i, src_j, shift) = if j == 0 { (i - 1, 0, pa) } else { (i, j - 1, pb) };
                let nmax = src_i + src_j;
                for t in 0..=(i + j) {
                    let mut v = shift * get_or_zero(&data, idx(src_i, src_j, t), t, nmax);
                    if t > 0 {
                        v += half_over_p * data[idx(src_i, src_j, t - 1)];
                    }
                    if t < nmax {
                        v += (t + 1) as f64 * data[idx(src_i, src_j, t + 1)];
                    }
                    data[idx(i, j, t)] = v;
                }
            }
        }
        ECoeffs { lb, tmax, data }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, t: usize) -> f64 {
        debug_assert!(j <= self.lb);
        if t > i + j {
            return 0.0;
        }
        self.data[(i * (self.lb + 1) + j) * (self.tmax + 1) + t]
    }
}

#[inline]
fn get_or_zero(data: &[f64], idx: usize, t: usize, nmax: usize) -> f64 {
    if t > nmax {
        0.0
    } else {
        data[idx]
    }
}

/// Auxiliary Hermite-Coulomb integrals R_{tuv}(alpha, PQ) for all
/// t + u + v <= n_max, built from Boys values by the three-term order
/// recursion. Stored as a flat (n_max+1)^3 arena; only two order layers
/// are alive during construction.
#[derive(Debug, Clone)]
pub struct RTable {
    dim: usize,
    data: Vec<f64>,
}

impl RTable {
    /// # Arguments
    ///     `n_max`: highest total Hermite order t+u+v needed.
    ///     `alpha`: effective exponent of the Coulomb kernel.
    ///     `pq`: separation of the two product centers.
    pub fn build(n_max: usize, alpha: f64, pq: [f64; 3]) -> Self {
        let dim = n_max + 1;
        let r2 = pq[0] * pq[0] + pq[1] * pq[1] + pq[2] * pq[2];
        let t_arg = alpha * r2;

        let mut fm = vec![0.0; n_max + 1];
        boys(&mut fm, t_arg, n_max);

        let cube = dim * dim * dim;
        let at = |t: usize, u: usize, v: usize| (t * dim + u) * dim + v;

        // Layer n holds R^n_{tuv}; march n downward so layer n only ever
        // reads layer n+1.
        let mut prev = vec![0.0; cube];
        let mut cur = vec![0.0; cube];
        // Seed with R^n_{000} = (-2 alpha)^n F_n.
        prev[at(0, 0, 0)] = (-2.0 * alpha).powi(n_max as i32) * fm[n_max];

        for n in (0..n_max).rev() {
            cur[..cube].fill(0.0);
            cur[at(0, 0, 0)] = (-2.0 * alpha).powi(n as i32) * fm[n];
            let reach = n_max - n;
            for total in 1..=reach {
                for t in 0..=total {
                    for u in 0..=(total - t) {
                        let v = total - t - u;
                        let val = if t >= 1 {
                            let mut x = pq[0] * prev[at(t - 1, u, v)];
                            if t >= 2 {
                                x += (t - 1) as f64 * prev[at(t - 2, u, v)];
                            }
                            x
                        } else if u >= 1 {
                            let mut x = pq[1] * prev[at(t, u - 1, v)];
                            if u >= 2 {
                                x += (u - 1) as f64 * prev[at(t, u - 2, v)];
                            }
                            x
                        } else {
                            let mut x = pq[2] * prev[at(t, u, v - 1)];
                            if v >= 2 {
                                x += (v - 1) as f64 * prev[at(t, u, v - 2)];
                            }
                            x
                        };
                        cur[at(t, u, v)] = val;
                    }
                }
            }
            std::mem::swap(&mut prev, &mut cur);
        }

        RTable { dim, data: prev }
    }

    #[inline]
    pub fn get(&self, t: usize, u: usize, v: usize) -> f64 {
        self.data[(t * self.dim + u) * self.dim + v]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e00_is_product_prefactor() {
        let (a, b, ab) = (0.7, 1.3, 0.9);
        let e = ECoeffs::build(0, 0, a, b, ab);
        let mu = a * b / (a + b);
        assert!((e.get(0, 0, 0) - (-mu * ab * ab).exp()).abs() < 1e-15);
    }

    #[test]
    fn e11_matches_closed_form() {
        // E_0^{11} = (PA * PB + 1/(2p)) * E_0^{00}
        let (a, b, ab) = (0.8, 0.5, 1.1);
        let p = a + b;
        let e = ECoeffs::build(1, 1, a, b, ab);
        let pa = -b * ab / p;
        let pb = a * ab / p;
        let expect = (pa * pb + 0.5 / p) * e.get(0, 0, 0);
        assert!((e.get(1, 1, 0) - expect).abs() < 1e-14);
    }

    #[test]
    fn r000_is_boys_zero() {
        let pq = [0.3, -0.2, 0.5];
        let alpha = 1.7;
        let r = RTable::build(3, alpha, pq);
        let t = alpha * (pq[0] * pq[0] + pq[1] * pq[1] + pq[2] * pq[2]);
        let mut f = [0.0; 1];
        boys(&mut f, t, 0);
        assert!((r.get(0, 0, 0) - f[0]).abs() < 1e-14);
    }

    #[test]
    fn odd_orders_vanish_at_coincident_centers() {
        let r = RTable::build(4, 0.9, [0.0, 0.0, 0.0]);
        assert_eq!(r.get(1, 0, 0), 0.0);
        assert_eq!(r.get(0, 3, 0), 0.0);
        assert_eq!(r.get(1, 1, 1), 0.0);
        assert!(r.get(2, 0, 0).abs() > 0.0);
    }
}
