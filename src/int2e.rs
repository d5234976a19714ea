// int2e.rs
//
// Two-electron repulsion integrals (ab|cd) in chemist notation over
// contracted Cartesian shells. Each quartet is evaluated by contracting
// the bra and ket Hermite expansions against one shared R-table per
// primitive quartet, so all auxiliaries are computed once per call and
// reused across the whole component block.

use std::f64::consts::PI;

use ndarray::Array4;

use crate::basis::BasisSet;
use crate::error::ScfError;
use crate::hermite::{ECoeffs, RTable};
use crate::int1e::PRIM_CUTOFF;

/// Product data for one surviving primitive pair of a shell pair. The
/// E-tables already carry the Gaussian-product prefactor, so `coef` is
/// just the product of contraction coefficients.
#[derive(Debug, Clone)]
pub struct PrimPair {
    pub p: f64,
    pub centre: [f64; 3],
    pub coef: f64,
    pub e: [ECoeffs; 3],
}

/// Precomputed pair of shells: the quadratic-cost part of the ERI work,
/// shared by every quartet containing the pair (and reused across all SCF
/// iterations of a direct build).
#[derive(Debug, Clone)]
pub struct ShellPair {
    pub i: usize,
    pub j: usize,
    pub l_total: usize,
    pub prims: Vec<PrimPair>,
}

impl ShellPair {
    pub fn build(basis: &BasisSet, i: usize, j: usize) -> Self {
        let sa = basis.shell(i);
        let sb = basis.shell(j);
        let la = sa.l as usize;
        let lb = sb.l as usize;
        let ab = [
            sa.center[0] - sb.center[0],
            sa.center[1] - sb.center[1],
            sa.center[2] - sb.center[2],
        ];
        let r2 = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];

        let mut prims = Vec::with_capacity(sa.prims.len() * sb.prims.len());
        for &(a, ca) in &sa.prims {
            for &(b, cb) in &sb.prims {
                let p = a + b;
                if a * b / p * r2 > PRIM_CUTOFF {
                    continue;
                }
                let centre = [
                    (a * sa.center[0] + b * sb.center[0]) / p,
                    (a * sa.center[1] + b * sb.center[1]) / p,
                    (a * sa.center[2] + b * sb.center[2]) / p,
                ];
                prims.push(PrimPair {
                    p,
                    centre,
                    coef: ca * cb,
                    e: [
                        ECoeffs::build(la, lb, a, b, ab[0]),
                        ECoeffs::build(la, lb, a, b, ab[1]),
                        ECoeffs::build(la, lb, a, b, ab[2]),
                    ],
                });
            }
        }
        ShellPair { i, j, l_total: la + lb, prims }
    }
}

/// Contracted ERI block (ab|cd) for a bra and ket shell pair, shape
/// (nfa, nfb, nfc, nfd). Fails with `IntegralOverflow` if any value left
/// the representable range during the recursions.
pub fn eri_block(
    basis: &BasisSet,
    bra: &ShellPair,
    ket: &ShellPair,
) -> Result<Array4<f64>, ScfError> {
    let (sa, sb) = (basis.shell(bra.i), basis.shell(bra.j));
    let (sc, sd) = (basis.shell(ket.i), basis.shell(ket.j));
    let n_total = bra.l_total + ket.l_total;

    let mut out =
        Array4::<f64>::zeros((sa.n_comp(), sb.n_comp(), sc.n_comp(), sd.n_comp()));

    for pb in &bra.prims {
        for pk in &ket.prims {
            let (p, q) = (pb.p, pk.p);
            let alpha = p * q / (p + q);
            let pq = [
                pb.centre[0] - pk.centre[0],
                pb.centre[1] - pk.centre[1],
                pb.centre[2] - pk.centre[2],
            ];
            let rt = RTable::build(n_total, alpha, pq);
            let pref =
                pb.coef * pk.coef * 2.0 * PI.powf(2.5) / (p * q * (p + q).sqrt());

            for (ma, &ia) in sa.comps.iter().enumerate() {
                for (mb, &jb) in sb.comps.iter().enumerate() {
                    let ax = [ia[0] as usize, ia[1] as usize, ia[2] as usize];
                    let bx = [jb[0] as usize, jb[1] as usize, jb[2] as usize];
                    for (mc, &kc) in sc.comps.iter().enumerate() {
                        for (md, &ld) in sd.comps.iter().enumerate() {
                            let cx = [kc[0] as usize, kc[1] as usize, kc[2] as usize];
                            let dx = [ld[0] as usize, ld[1] as usize, ld[2] as usize];

                            let mut acc = 0.0;
                            for t in 0..=(ax[0] + bx[0]) {
                                let ext = pb.e[0].get(ax[0], bx[0], t);
                                for u in 0..=(ax[1] + bx[1]) {
                                    let exu = pb.e[1].get(ax[1], bx[1], u);
                                    for v in 0..=(ax[2] + bx[2]) {
                                        let bra_e =
                                            ext * exu * pb.e[2].get(ax[2], bx[2], v);
                                        if bra_e == 0.0 {
                                            continue;
                                        }
                                        let mut ket_sum = 0.0;
                                        for tt in 0..=(cx[0] + dx[0]) {
                                            let kt = pk.e[0].get(cx[0], dx[0], tt);
                                            for uu in 0..=(cx[1] + dx[1]) {
                                                let ku = pk.e[1].get(cx[1], dx[1], uu);
                                                for vv in 0..=(cx[2] + dx[2]) {
                                                    let sign = if (tt + uu + vv) % 2 == 0 {
                                                        1.0
                                                    } else {
                                                        -1.0
                                                    };
                                                    ket_sum += sign
                                                        * kt
                                                        * ku
                                                        * pk.e[2].get(cx[2], dx[2], vv)
                                                        * rt.get(t + tt, u + uu, v + vv);
                                                }
                                            }
                                        }
                                        acc += bra_e * ket_sum;
                                    }
                                }
                            }
                            out[(ma, mb, mc, md)] += pref
                                * acc
                                * sa.comp_norms[ma]
                                * sb.comp_norms[mb]
                                * sc.comp_norms[mc]
                                * sd.comp_norms[md];
                        }
                    }
                }
            }
        }
    }

    if out.iter().any(|v| !v.is_finite()) {
        return Err(ScfError::IntegralOverflow {
            shells: vec![bra.i, bra.j, ket.i, ket.j],
        });
    }
    Ok(out)
}

/// Convenience entry point building the two pair tables on the fly.
pub fn eri_shell_quartet(
    basis: &BasisSet,
    i: usize,
    j: usize,
    k: usize,
    l: usize,
) -> Result<Array4<f64>, ScfError> {
    let bra = ShellPair::build(basis, i, j);
    let ket = ShellPair::build(basis, k, l);
    eri_block(basis, &bra, &ket)
}
