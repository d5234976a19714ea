// main.rs
use std::time::Instant;

use hf_rs::input::load_input;
use hf_rs::utils::print_array2;
use hf_rs::{BasisSet, LengthUnit, Molecule, Rhf, ScfOutcome};

fn main() {
    let t_total = Instant::now();
    let input_path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("Usage: cargo run <input.lua>");
            std::process::exit(1);
        }
    };

    let input = load_input(&input_path);

    let geometry = input.mol.atoms.join("\n");
    let unit = LengthUnit::parse(&input.mol.unit).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
    let mol = Molecule::parse(&geometry, unit, input.mol.charge, input.mol.spin)
        .unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        });
    let basis = BasisSet::assign(&mol, &input.mol.basis).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });

    println!(
        "{} atoms, {} shells, {} basis functions, {} electrons",
        mol.atoms.len(),
        basis.n_shells(),
        basis.n_ao(),
        mol.n_electrons()
    );

    let t_scf = Instant::now();
    let mut driver = Rhf::new(&mol, &basis, input.scf).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
    let result = match driver.run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("SCF aborted: {}", e);
            std::process::exit(1);
        }
    };
    let d_scf = t_scf.elapsed();

    println!("{}", "=".repeat(60));
    match result.outcome {
        ScfOutcome::Converged => {
            println!("SCF converged in {} cycles.", result.iterations)
        }
        ScfOutcome::MaxIterExceeded => {
            println!("SCF not converged after {} cycles.", result.iterations)
        }
        ScfOutcome::Diverged => println!("SCF diverged after {} cycles.", result.iterations),
        ScfOutcome::Cancelled => println!("SCF cancelled after {} cycles.", result.iterations),
    }
    println!("E(total): {:.10} Ha", result.energy);
    println!("E(nuclear repulsion): {:.10} Ha", mol.nuclear_repulsion());
    println!("Orbital energies:");
    for (i, e) in result.orbitals.energies.iter().enumerate() {
        let occ = if i < mol.n_electrons() / 2 { 2 } else { 0 };
        println!("{:4}  occ {}  {:14.8}", i, occ, e);
    }
    if input.write.print_coeffs {
        println!("MO coefficients:");
        print_array2(&result.orbitals.coefficients);
    }
    println!("Total SCF time: {:?}", d_scf);
    println!("Total wall time: {:?}", t_total.elapsed());
}
