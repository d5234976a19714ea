// molecule.rs
use crate::error::ScfError;

/// Bohr per Angstrom.
pub const ANGSTROM_TO_BOHR: f64 = 1.889726124565062;

const ELEMENTS: [&str; 18] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar",
];

/// Nuclear charge for an element symbol, if known.
pub fn atomic_number(symbol: &str) -> Option<u32> {
    ELEMENTS
        .iter()
        .position(|&s| s.eq_ignore_ascii_case(symbol))
        .map(|i| i as u32 + 1)
}

/// One atom: element symbol, nuclear charge, position in bohr.
#[derive(Debug, Clone)]
pub struct Atom {
    pub symbol: String,
    pub charge: u32,
    pub position: [f64; 3],
}

/// Length unit of the input coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Bohr,
    Angstrom,
}

impl LengthUnit {
    pub fn parse(s: &str) -> Result<Self, ScfError> {
        match s.to_ascii_lowercase().as_str() {
            "bohr" | "au" => Ok(LengthUnit::Bohr),
            "angstrom" | "ang" | "a" => Ok(LengthUnit::Angstrom),
            other => Err(ScfError::InvalidConfig(format!("unknown length unit '{}'", other))),
        }
    }
}

/// Molecular geometry plus total charge and spin multiplicity.
/// Coordinates are stored in bohr regardless of the input unit.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub charge: i32,
    pub multiplicity: u32,
}

impl Molecule {
    /// Parse a geometry from lines of the form `H 0.0 0.0 1.4`.
    /// # Arguments
    ///     `text`: str, one atom per non-empty line: symbol x y z.
    ///     `unit`: LengthUnit, unit of the coordinates in `text`.
    ///     `charge`: total molecular charge.
    ///     `multiplicity`: spin multiplicity 2S + 1.
    pub fn parse(
        text: &str,
        unit: LengthUnit,
        charge: i32,
        multiplicity: u32,
    ) -> Result<Self, ScfError> {
        let scale = match unit {
            LengthUnit::Bohr => 1.0,
            LengthUnit::Angstrom => ANGSTROM_TO_BOHR,
        };
        let mut atoms = Vec::new();
        for line in text.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 4 {
                return Err(ScfError::InvalidConfig(format!(
                    "malformed geometry line '{}'",
                    line.trim()
                )));
            }
            let symbol = fields[0].to_string();
            let z = atomic_number(&symbol).ok_or_else(|| {
                ScfError::InvalidConfig(format!("unknown element '{}'", symbol))
            })?;
            let mut position = [0.0; 3];
            for (slot, field) in position.iter_mut().zip(&fields[1..]) {
                *slot = field.parse::<f64>().map_err(|_| {
                    ScfError::InvalidConfig(format!("bad coordinate '{}'", field))
                })? * scale;
            }
            atoms.push(Atom { symbol, charge: z, position });
        }
        if atoms.is_empty() {
            return Err(ScfError::InvalidConfig("empty geometry".to_string()));
        }
        let mol = Molecule { atoms, charge, multiplicity };
        mol.validate()?;
        Ok(mol)
    }

    fn validate(&self) -> Result<(), ScfError> {
        let nuclear: i64 = self.atoms.iter().map(|a| a.charge as i64).sum();
        if nuclear - self.charge as i64 <= 0 {
            return Err(ScfError::InvalidConfig(format!(
                "charge {} leaves no electrons",
                self.charge
            )));
        }
        Ok(())
    }

    /// Number of electrons after applying the total charge.
    pub fn n_electrons(&self) -> usize {
        let nuclear: i64 = self.atoms.iter().map(|a| a.charge as i64).sum();
        (nuclear - self.charge as i64) as usize
    }

    /// Nuclear-nuclear repulsion energy, sum over pairs of Z_a Z_b / R_ab.
    pub fn nuclear_repulsion(&self) -> f64 {
        let mut e = 0.0;
        for (i, a) in self.atoms.iter().enumerate() {
            for b in self.atoms.iter().take(i) {
                let r = distance(&a.position, &b.position);
                e += (a.charge as f64) * (b.charge as f64) / r;
            }
        }
        e
    }
}

/// Euclidean distance between two points.
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}
