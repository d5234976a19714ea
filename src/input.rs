use rlua::{Lua, Table};
use std::fs;

use crate::scf::{InitialGuess, ScfConfig};

// Storage for mol info.
pub struct MolOptions {
    pub atoms: Vec<String>,
    pub basis: String,
    pub unit: String,
    pub charge: i32,
    pub spin: u32,
}

// Storage for output options.
pub struct WriteOptions {
    pub verbose: bool,
    pub print_coeffs: bool,
}

/// Storage for input file parameters.
pub struct Input {
    pub mol: MolOptions,
    pub scf: ScfConfig,
    pub write: WriteOptions,
}

/// Read input parameters from a lua file and assign to an Input object.
/// # Arguments
///     path: str, file path to input file.
pub fn load_input(path: &str) -> Input {
    let src = fs::read_to_string(path).unwrap();
    let lua = Lua::new();

    let ctx = lua;
    ctx.load(&src).exec().unwrap();
    let globals = ctx.globals();

    // Table headers.
    let mol_tbl: Table = globals.get("mol").unwrap();
    let scf_tbl: Option<Table> = globals.get("scf").unwrap_or(None);
    let write_tbl: Option<Table> = globals.get("write").unwrap_or(None);

    // Mol table.
    let atoms_tbl: Table = mol_tbl.get("atoms").unwrap();
    let atoms: Vec<String> = atoms_tbl.sequence_values::<String>().map(|x| x.unwrap()).collect();
    let basis: String = mol_tbl.get("basis").unwrap();
    let unit: String = mol_tbl.get("unit").unwrap_or_else(|_| "angstrom".to_string());
    let charge: i32 = mol_tbl.get("charge").unwrap_or(0);
    let spin: u32 = mol_tbl.get("spin").unwrap_or(1);
    let mol = MolOptions { atoms, basis, unit, charge, spin };

    // SCF table; anything unspecified keeps the library default.
    let defaults = ScfConfig::default();
    let mut scf = match scf_tbl {
        Some(t) => {
            let initial_guess = match t
                .get::<_, String>("initial_guess")
                .unwrap_or_else(|_| "core".to_string())
                .as_str()
            {
                "core" => InitialGuess::Core,
                "atomic" => InitialGuess::AtomicDensity,
                other => {
                    eprintln!("initial_guess must be 'core' or 'atomic', got '{}'", other);
                    std::process::exit(1);
                }
            };
            ScfConfig {
                conv_tol: t.get("conv_tol").unwrap_or(defaults.conv_tol),
                conv_tol_grad: t.get::<_, Option<f64>>("conv_tol_grad").unwrap_or(None),
                max_cycle: t.get("max_cycle").unwrap_or(defaults.max_cycle),
                diis_space: t.get("diis_space").unwrap_or(defaults.diis_space),
                diis_start_cycle: t
                    .get("diis_start_cycle")
                    .unwrap_or(defaults.diis_start_cycle),
                screening_threshold: t
                    .get("screening_threshold")
                    .unwrap_or(defaults.screening_threshold),
                level_shift: t.get("level_shift").unwrap_or(defaults.level_shift),
                damp: t.get("damp").unwrap_or(defaults.damp),
                initial_guess,
                verbose: false,
            }
        }
        None => defaults,
    };

    // Write table.
    let write = match write_tbl {
        Some(t) => WriteOptions {
            verbose: t.get("verbose").unwrap_or(false),
            print_coeffs: t.get("print_coeffs").unwrap_or(false),
        },
        None => WriteOptions { verbose: false, print_coeffs: false },
    };
    scf.verbose = write.verbose;

    Input { mol, scf, write }
}
