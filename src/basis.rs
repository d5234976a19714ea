// basis.rs
use std::f64::consts::PI;

use crate::error::ScfError;
use crate::molecule::Molecule;

/// Number of Cartesian components for angular momentum l: (l+1)(l+2)/2.
#[inline]
pub fn ncart(l: u32) -> usize {
    ((l + 1) * (l + 2) / 2) as usize
}

/// Double factorial (2n-1)!! with (-1)!! = 1.
fn double_factorial_odd(n: u32) -> f64 {
    let mut acc = 1.0;
    let mut k = 2.0 * n as f64 - 1.0;
    while k > 1.0 {
        acc *= k;
        k -= 2.0;
    }
    acc
}

/// One contracted Gaussian shell: a group of primitives sharing a center
/// and angular momentum. Contraction coefficients are stored with the
/// primitive and contracted normalization folded in, so a diagonal overlap
/// integral over any component of the shell evaluates to 1. Immutable once
/// constructed; owned by the `BasisSet`.
#[derive(Debug, Clone)]
pub struct Shell {
    pub center: [f64; 3],
    pub l: u32,
    /// (exponent, normalized contraction coefficient) pairs, non-empty.
    pub prims: Vec<(f64, f64)>,
    /// Cartesian exponent triples (lx, ly, lz), resolved once per shell.
    pub comps: Vec<[u32; 3]>,
    /// Per-component scale relative to the (l,0,0) normalization.
    pub comp_norms: Vec<f64>,
}

impl Shell {
    /// Build a shell from raw exponents and contraction coefficients,
    /// normalizing so that every diagonal self-overlap equals 1.
    /// # Arguments
    ///     `center`: position in bohr.
    ///     `l`: angular momentum quantum number.
    ///     `prims`: (exponent, raw coefficient) pairs.
    pub fn contracted(center: [f64; 3], l: u32, prims: &[(f64, f64)]) -> Result<Self, ScfError> {
        if prims.is_empty() {
            return Err(ScfError::InvalidConfig("empty contraction".to_string()));
        }
        if prims.iter().any(|&(a, _)| a <= 0.0 || !a.is_finite()) {
            return Err(ScfError::InvalidConfig(
                "primitive exponents must be strictly positive".to_string(),
            ));
        }

        // Scale each coefficient by the primitive (l,0,0) norm, then
        // renormalize the contraction so the shell self-overlap is 1.
        let dfl = double_factorial_odd(l);
        let prim_norm = |a: f64| -> f64 {
            ((2.0 * a / PI).powi(3) * (4.0 * a).powi(2 * l as i32) / (dfl * dfl)).sqrt().sqrt()
        };
        let mut scaled: Vec<(f64, f64)> =
            prims.iter().map(|&(a, c)| (a, c * prim_norm(a))).collect();

        let mut self_overlap = 0.0;
        for &(ak, ck) in &scaled {
            for &(am, cm) in &scaled {
                let p = ak + am;
                self_overlap += ck * cm * dfl / (2.0 * p).powi(l as i32) * (PI / p).powf(1.5);
            }
        }
        let renorm = 1.0 / self_overlap.sqrt();
        for prim in scaled.iter_mut() {
            prim.1 *= renorm;
        }

        // Component order follows the usual Cartesian convention:
        // highest x power first, then y within it.
        let mut comps = Vec::with_capacity(ncart(l));
        for lx in (0..=l).rev() {
            for ly in (0..=(l - lx)).rev() {
                comps.push([lx, ly, l - lx - ly]);
            }
        }
        let comp_norms = comps
            .iter()
            .map(|&[lx, ly, lz]| {
                (dfl / (double_factorial_odd(lx)
                    * double_factorial_odd(ly)
                    * double_factorial_odd(lz)))
                .sqrt()
            })
            .collect();

        Ok(Shell { center, l, prims: scaled, comps, comp_norms })
    }

    /// Number of Cartesian basis functions carried by this shell.
    pub fn n_comp(&self) -> usize {
        self.comps.len()
    }
}

/// Raw shell data for one element: (l, [(exponent, coefficient)]).
pub type ElementShells = Vec<(u32, Vec<(f64, f64)>)>;

/// Ordered sequence of shells for one molecule, with AO offsets.
#[derive(Debug, Clone)]
pub struct BasisSet {
    pub name: String,
    pub shells: Vec<Shell>,
    /// AO index of the first component of each shell.
    offsets: Vec<usize>,
    n_ao: usize,
}

impl BasisSet {
    /// Resolve a named basis for a molecule. Fails with `InvalidBasisSpec`
    /// when an element has no entry in the requested set.
    pub fn assign(mol: &Molecule, name: &str) -> Result<Self, ScfError> {
        let key = name.to_ascii_lowercase();
        if key != "sto-3g" {
            return Err(ScfError::InvalidConfig(format!("unknown basis set '{}'", name)));
        }
        let mut shells = Vec::new();
        for atom in &mol.atoms {
            let element = sto3g_shells(atom.charge).ok_or_else(|| ScfError::InvalidBasisSpec {
                element: atom.symbol.clone(),
                basis: name.to_string(),
            })?;
            for (l, prims) in element {
                shells.push(Shell::contracted(atom.position, l, &prims)?);
            }
        }
        Self::from_parts(name.to_string(), shells)
    }

    /// Build a basis from explicit per-atom shell data, in atom order.
    /// # Arguments
    ///     `mol`: geometry supplying the shell centers.
    ///     `per_atom`: for each atom, its shells as (l, primitive list).
    pub fn from_shells(mol: &Molecule, per_atom: &[ElementShells]) -> Result<Self, ScfError> {
        if per_atom.len() != mol.atoms.len() {
            return Err(ScfError::InvalidConfig(format!(
                "shell data for {} atoms, geometry has {}",
                per_atom.len(),
                mol.atoms.len()
            )));
        }
        let mut shells = Vec::new();
        for (atom, entries) in mol.atoms.iter().zip(per_atom) {
            for (l, prims) in entries {
                shells.push(Shell::contracted(atom.position, *l, prims)?);
            }
        }
        Self::from_parts("custom".to_string(), shells)
    }

    fn from_parts(name: String, shells: Vec<Shell>) -> Result<Self, ScfError> {
        if shells.is_empty() {
            return Err(ScfError::InvalidConfig("basis contains no shells".to_string()));
        }
        let mut offsets = Vec::with_capacity(shells.len());
        let mut n_ao = 0;
        for sh in &shells {
            offsets.push(n_ao);
            n_ao += sh.n_comp();
        }
        Ok(BasisSet { name, shells, offsets, n_ao })
    }

    pub fn n_shells(&self) -> usize {
        self.shells.len()
    }

    /// Total number of Cartesian basis functions.
    pub fn n_ao(&self) -> usize {
        self.n_ao
    }

    /// AO index of the first component of shell `i`.
    pub fn offset(&self, i: usize) -> usize {
        self.offsets[i]
    }

    pub fn shell(&self, i: usize) -> &Shell {
        &self.shells[i]
    }
}

// STO-3G is defined by three universal least-squares expansions of Slater
// functions, scaled per element by zeta^2 (Hehre, Stewart, Pople 1969).
const STO3G_1S_EXP: [f64; 3] = [2.227660584, 0.405771156, 0.109818];
const STO3G_1S_COEF: [f64; 3] = [0.154328967, 0.535328142, 0.444634542];
const STO3G_2SP_EXP: [f64; 3] = [0.994203, 0.231031, 0.0751386];
const STO3G_2S_COEF: [f64; 3] = [-0.099967229, 0.399512826, 0.700115469];
const STO3G_2P_COEF: [f64; 3] = [0.155916275, 0.607683719, 0.391957393];

/// (zeta_1s, zeta_2sp) per element, H through Ne.
const STO3G_ZETA: [(f64, f64); 10] = [
    (1.24, 0.0),
    (1.69, 0.0),
    (2.69, 0.80),
    (3.68, 1.15),
    (4.68, 1.50),
    (5.67, 1.72),
    (6.67, 1.95),
    (7.66, 2.25),
    (8.65, 2.55),
    (9.64, 2.88),
];

fn scaled(exps: &[f64; 3], coefs: &[f64; 3], zeta: f64) -> Vec<(f64, f64)> {
    let z2 = zeta * zeta;
    exps.iter().zip(coefs).map(|(&e, &c)| (e * z2, c)).collect()
}

fn sto3g_shells(z: u32) -> Option<ElementShells> {
    if z == 0 || z as usize > STO3G_ZETA.len() {
        return None;
    }
    let (z1, z2) = STO3G_ZETA[z as usize - 1];
    let mut out: ElementShells = vec![(0, scaled(&STO3G_1S_EXP, &STO3G_1S_COEF, z1))];
    if z > 2 {
        out.push((0, scaled(&STO3G_2SP_EXP, &STO3G_2S_COEF, z2)));
        out.push((1, scaled(&STO3G_2SP_EXP, &STO3G_2P_COEF, z2)));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::LengthUnit;

    fn water() -> Molecule {
        Molecule::parse("O 0 0 0\nH 1.8 0 0\nH 0 1.8 0", LengthUnit::Bohr, 0, 1).unwrap()
    }

    #[test]
    fn water_sto3g_counts() {
        let basis = BasisSet::assign(&water(), "STO-3G").unwrap();
        // O: 1s + 2s + 2p(3), H: 1s each.
        assert_eq!(basis.n_shells(), 5);
        assert_eq!(basis.n_ao(), 7);
        assert_eq!(basis.offset(3), 5);
    }

    #[test]
    fn missing_element_is_invalid_basis_spec() {
        let mol = Molecule::parse("Na 0 0 0", LengthUnit::Bohr, 0, 1).unwrap();
        let err = BasisSet::assign(&mol, "sto-3g").unwrap_err();
        assert_eq!(
            err,
            ScfError::InvalidBasisSpec { element: "Na".to_string(), basis: "sto-3g".to_string() }
        );
    }

    #[test]
    fn rejects_nonpositive_exponent() {
        let err = Shell::contracted([0.0; 3], 0, &[(-1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, ScfError::InvalidConfig(_)));
    }

    #[test]
    fn component_enumeration() {
        let sh = Shell::contracted([0.0; 3], 2, &[(1.0, 1.0)]).unwrap();
        assert_eq!(sh.n_comp(), 6);
        assert_eq!(sh.comps[0], [2, 0, 0]);
        assert_eq!(sh.comps[1], [1, 1, 0]);
        assert_eq!(sh.comps[5], [0, 0, 2]);
        // xy-type components need a sqrt(3) relative to xx-type.
        assert!((sh.comp_norms[1] - 3f64.sqrt()).abs() < 1e-14);
        assert!((sh.comp_norms[0] - 1.0).abs() < 1e-14);
    }
}
