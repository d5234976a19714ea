// int1e.rs
//
// One-electron integrals over contracted Cartesian Gaussian shells:
// overlap, kinetic energy, and nuclear attraction, assembled per shell
// pair from the Hermite tables in `hermite`.

use std::f64::consts::PI;

use ndarray::Array2;

use crate::basis::{BasisSet, Shell};
use crate::error::ScfError;
use crate::hermite::{ECoeffs, RTable};
use crate::molecule::Molecule;

/// Primitive pairs whose Gaussian product prefactor underflows below
/// exp(-60) contribute nothing at double precision.
pub(crate) const PRIM_CUTOFF: f64 = 60.0;

/// Overlap block <a|b> for one shell pair, shape (nfa, nfb).
pub fn overlap_block(sa: &Shell, sb: &Shell) -> Array2<f64> {
    pair_block(sa, sb, |tables, p, ia, ja| {
        let pref = (PI / p).powf(1.5);
        pref * tables[0].get(ia[0], ja[0], 0)
            * tables[1].get(ia[1], ja[1], 0)
            * tables[2].get(ia[2], ja[2], 0)
    })
}

/// Kinetic-energy block <a|-nabla^2/2|b> for one shell pair.
pub fn kinetic_block(sa: &Shell, sb: &Shell) -> Array2<f64> {
    let la = sa.l as usize;
    let lb = sb.l as usize;
    let ab = [
        sa.center[0] - sb.center[0],
        sa.center[1] - sb.center[1],
        sa.center[2] - sb.center[2],
    ];
    let r2 = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];

    let nfa = sa.n_comp();
    let nfb = sb.n_comp();
    let mut out = Array2::<f64>::zeros((nfa, nfb));

    for &(a, ca) in &sa.prims {
        for &(b, cb) in &sb.prims {
            let p = a + b;
            if a * b / p * r2 > PRIM_CUTOFF {
                continue;
            }
            // E-tables extended by two in j for the d^2/dx^2 terms.
            let tables = [
                ECoeffs::build(la, lb + 2, a, b, ab[0]),
                ECoeffs::build(la, lb + 2, a, b, ab[1]),
                ECoeffs::build(la, lb + 2, a, b, ab[2]),
            ];
            let pref = ca * cb * (PI / p).powf(1.5);

            // 1-D kinetic operator acting on the ket:
            // T(i,j) = -2 b^2 S(i,j+2) + b(2j+1) S(i,j) - j(j-1)/2 S(i,j-2)
            let t1d = |d: usize, i: usize, j: usize| -> f64 {
                let e = &tables[d];
                let mut t = -2.0 * b * b * e.get(i, j + 2, 0)
                    + b * (2 * j + 1) as f64 * e.get(i, j, 0);
                if j >= 2 {
                    t -= 0.5 * (j * (j - 1)) as f64 * e.get(i, j - 2, 0);
                }
                t
            };

            for (ma, &ia) in sa.comps.iter().enumerate() {
                for (mb, &jb) in sb.comps.iter().enumerate() {
                    let ia = [ia[0] as usize, ia[1] as usize, ia[2] as usize];
                    let jb = [jb[0] as usize, jb[1] as usize, jb[2] as usize];
                    let sx = tables[0].get(ia[0], jb[0], 0);
                    let sy = tables[1].get(ia[1], jb[1], 0);
                    let sz = tables[2].get(ia[2], jb[2], 0);
                    let t = t1d(0, ia[0], jb[0]) * sy * sz
                        + sx * t1d(1, ia[1], jb[1]) * sz
                        + sx * sy * t1d(2, ia[2], jb[2]);
                    out[(ma, mb)] +=
                        pref * t * sa.comp_norms[ma] * sb.comp_norms[mb];
                }
            }
        }
    }
    out
}

/// Nuclear-attraction block <a| sum_C -Z_C/|r-R_C| |b> for one shell pair.
pub fn nuclear_block(sa: &Shell, sb: &Shell, mol: &Molecule) -> Array2<f64> {
    let la = sa.l as usize;
    let lb = sb.l as usize;
    let n_total = la + lb;
    let ab = [
        sa.center[0] - sb.center[0],
        sa.center[1] - sb.center[1],
        sa.center[2] - sb.center[2],
    ];
    let r2 = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];

    let nfa = sa.n_comp();
    let nfb = sb.n_comp();
    let mut out = Array2::<f64>::zeros((nfa, nfb));

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
            let tables = [
                ECoeffs::build(la, lb, a, b, ab[0]),
                ECoeffs::build(la, lb, a, b, ab[1]),
                ECoeffs::build(la, lb, a, b, ab[2]),
            ];
            let pref = ca * cb * 2.0 * PI / p;

            for atom in &mol.atoms {
                let pc = [
                    centre[0] - atom.position[0],
                    centre[1] - atom.position[1],
                    centre[2] - atom.position[2],
                ];
                let rt = RTable::build(n_total, p, pc);
                let z = atom.charge as f64;

                for (ma, &ia) in sa.comps.iter().enumerate() {
                    for (mb, &jb) in sb.comps.iter().enumerate() {
                        let ia = [ia[0] as usize, ia[1] as usize, ia[2] as usize];
                        let jb = [jb[0] as usize, jb[1] as usize, jb[2] as usize];
                        let mut v = 0.0;
                        for t in 0..=(ia[0] + jb[0]) {
                            let ex = tables[0].get(ia[0], jb[0], t);
                            for u in 0..=(ia[1] + jb[1]) {
                                let ey = tables[1].get(ia[1], jb[1], u);
                                for w in 0..=(ia[2] + jb[2]) {
                                    v += ex
                                        * ey
                                        * tables[2].get(ia[2], jb[2], w)
                                        * rt.get(t, u, w);
                                }
                            }
                        }
                        out[(ma, mb)] -=
                            z * pref * v * sa.comp_norms[ma] * sb.comp_norms[mb];
                    }
                }
            }
        }
    }
    out
}

/// Shared contracted-pair driver for operators that only need the E_0
/// coefficients (overlap-like).
fn pair_block<F>(sa: &Shell, sb: &Shell, eval: F) -> Array2<f64>
where
    F: Fn(&[ECoeffs; 3], f64, [usize; 3], [usize; 3]) -> f64,
{
    let la = sa.l as usize;
    let lb = sb.l as usize;
    let ab = [
        sa.center[0] - sb.center[0],
        sa.center[1] - sb.center[1],
        sa.center[2] - sb.center[2],
    ];
    let r2 = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];

    let nfa = sa.n_comp();
    let nfb = sb.n_comp();
    let mut out = Array2::<f64>::zeros((nfa, nfb));

    for &(a, ca) in &sa.prims {
        for &(b, cb) in &sb.prims {
            let p = a + b;
            if a * b / p * r2 > PRIM_CUTOFF {
                continue;
            }
            let tables = [
                ECoeffs::build(la, lb, a, b, ab[0]),
                ECoeffs::build(la, lb, a, b, ab[1]),
                ECoeffs::build(la, lb, a, b, ab[2]),
            ];
            for (ma, &ia) in sa.comps.iter().enumerate() {
                for (mb, &jb) in sb.comps.iter().enumerate() {
                    let ia = [ia[0] as usize, ia[1] as usize, ia[2] as usize];
                    let jb = [jb[0] as usize, jb[1] as usize, jb[2] as usize];
                    out[(ma, mb)] += ca
                        * cb
                        * eval(&tables, p, ia, jb)
                        * sa.comp_norms[ma]
                        * sb.comp_norms[mb];
                }
            }
        }
    }
    out
}

fn assemble<F>(basis: &BasisSet, block: F) -> Result<Array2<f64>, ScfError>
where
    F: Fn(&Shell, &Shell) -> Array2<f64>,
{
    let n = basis.n_ao();
    let mut m = Array2::<f64>::zeros((n, n));
    for i in 0..basis.n_shells() {
        let oi = basis.offset(i);
        for j in 0..=i {
            let oj = basis.offset(j);
            let blk = block(basis.shell(i), basis.shell(j));
            if blk.iter().any(|v| !v.is_finite()) {
                return Err(ScfError::IntegralOverflow { shells: vec![i, j] });
            }
            for (a, row) in blk.outer_iter().enumerate() {
                for (b, &v) in row.iter().enumerate() {
                    m[(oi + a, oj + b)] = v;
                    m[(oj + b, oi + a)] = v;
                }
            }
        }
    }
    Ok(m)
}

/// Full overlap matrix S.
pub fn overlap_matrix(basis: &BasisSet) -> Result<Array2<f64>, ScfError> {
    assemble(basis, overlap_block)
}

/// Full kinetic-energy matrix T.
pub fn kinetic_matrix(basis: &BasisSet) -> Result<Array2<f64>, ScfError> {
    assemble(basis, kinetic_block)
}

/// Full nuclear-attraction matrix V.
pub fn nuclear_matrix(basis: &BasisSet, mol: &Molecule) -> Result<Array2<f64>, ScfError> {
    assemble(basis, |a, b| nuclear_block(a, b, mol))
}

/// Core Hamiltonian H = T + V.
pub fn core_hamiltonian(basis: &BasisSet, mol: &Molecule) -> Result<Array2<f64>, ScfError> {
    Ok(kinetic_matrix(basis)? + nuclear_matrix(basis, mol)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::LengthUnit;

    fn h2() -> (Molecule, BasisSet) {
        let mol = Molecule::parse("H 0 0 0\nH 0 0 1.4", LengthUnit::Bohr, 0, 1).unwrap();
        let basis = BasisSet::assign(&mol, "sto-3g").unwrap();
        (mol, basis)
    }

    #[test]
    fn self_overlap_is_unity_all_l() {
        // Contracted two-primitive shells for l = 0..=4: every diagonal
        // component must come out exactly normalized.
        let mol = Molecule::parse("H 0 0 0", LengthUnit::Bohr, 0, 2).unwrap();
        for l in 0..=4u32 {
            let basis = BasisSet::from_shells(
                &mol,
                &[vec![(l, vec![(1.3, 0.4), (0.25, 0.7)])]],
            )
            .unwrap();
            let s = overlap_matrix(&basis).unwrap();
            for m in 0..basis.n_ao() {
                assert!(
                    (s[(m, m)] - 1.0).abs() < 1e-12,
                    "l={} component {}: {}",
                    l,
                    m,
                    s[(m, m)]
                );
            }
        }
    }

    #[test]
    fn h2_overlap_literature_value() {
        let (_, basis) = h2();
        let s = overlap_matrix(&basis).unwrap();
        // Szabo & Ostlund, H2/STO-3G at R = 1.4 bohr.
        assert!((s[(0, 1)] - 0.6593).abs() < 1e-3, "S12 = {}", s[(0, 1)]);
        assert!((s[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn h2_kinetic_literature_values() {
        let (_, basis) = h2();
        let t = kinetic_matrix(&basis).unwrap();
        assert!((t[(0, 0)] - 0.7600).abs() < 1e-3, "T11 = {}", t[(0, 0)]);
        assert!((t[(0, 1)] - 0.2365).abs() < 1e-3, "T12 = {}", t[(0, 1)]);
    }

    #[test]
    fn hydrogen_core_energy() {
        // <1s|T + V|1s> for STO-3G hydrogen is the familiar -0.4666 Ha.
        let mol = Molecule::parse("H 0 0 0", LengthUnit::Bohr, 0, 2).unwrap();
        let basis = BasisSet::assign(&mol, "sto-3g").unwrap();
        let h = core_hamiltonian(&basis, &mol).unwrap();
        assert!((h[(0, 0)] + 0.4666).abs() < 2e-3, "H11 = {}", h[(0, 0)]);
    }

    #[test]
    fn matrices_are_symmetric() {
        let mol =
            Molecule::parse("O 0 0 0\nH 1.8 0 0\nH 0 1.8 0", LengthUnit::Bohr, 0, 1).unwrap();
        let basis = BasisSet::assign(&mol, "sto-3g").unwrap();
        for m in [
            overlap_matrix(&basis).unwrap(),
            kinetic_matrix(&basis).unwrap(),
            nuclear_matrix(&basis, &mol).unwrap(),
        ] {
            let n = basis.n_ao();
            for i in 0..n {
                for j in 0..n {
                    assert!((m[(i, j)] - m[(j, i)]).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn nuclear_attraction_is_negative_on_diagonal() {
        let (mol, basis) = h2();
        let v = nuclear_matrix(&basis, &mol).unwrap();
        assert!(v[(0, 0)] < 0.0);
        assert!(v[(1, 1)] < 0.0);
    }
}
