// End-to-end SCF runs against known chemistry: a hydrogen-fluoride
// diatomic and water in the minimal basis, plus the geometric invariance
// properties a correct integral engine must satisfy.

use approx::assert_abs_diff_eq;
use hf_rs::int1e::overlap_matrix;
use hf_rs::{BasisSet, LengthUnit, Molecule, Rhf, ScfConfig, ScfOutcome};

fn run(geometry: &str, config: ScfConfig) -> hf_rs::ScfResult {
    let mol = Molecule::parse(geometry, LengthUnit::Bohr, 0, 1).unwrap();
    let basis = BasisSet::assign(&mol, "sto-3g").unwrap();
    Rhf::new(&mol, &basis, config).unwrap().run().unwrap()
}

#[test]
fn hydrogen_fluoride_converges() {
    let config = ScfConfig {
        conv_tol: 1e-9,
        diis_space: 8,
        max_cycle: 100,
        ..ScfConfig::default()
    };
    let result = run("F 0 0 0\nH 0 0 1.7325", config);
    assert_eq!(result.outcome, ScfOutcome::Converged);
    assert!(result.iterations < 100);
    // Minimal-basis RHF total energy for HF sits a little below -98.5 Ha.
    assert!(
        result.energy > -99.0 && result.energy < -98.0,
        "E = {}",
        result.energy
    );
}

#[test]
fn hydrogen_fluoride_rotation_invariant() {
    // Same bond along z, x, and an oblique direction; with p functions in
    // play this exercises the full Cartesian integral machinery.
    let config = ScfConfig::default();
    let e_z = run("F 0 0 0\nH 0 0 1.7325", config.clone()).energy;
    let e_x = run("F 0 0 0\nH 1.7325 0 0", config.clone()).energy;
    let c = 1.7325 / 3f64.sqrt();
    let oblique = format!("F 0 0 0\nH {} {} {}", c, c, c);
    let e_d = run(&oblique, config).energy;
    assert_abs_diff_eq!(e_z, e_x, epsilon = 1e-8);
    assert_abs_diff_eq!(e_z, e_d, epsilon = 1e-8);
}

#[test]
fn hydrogen_fluoride_translation_invariant() {
    let config = ScfConfig::default();
    let e_origin = run("F 0 0 0\nH 0 0 1.7325", config.clone()).energy;
    let e_shifted = run("F 5.0 -3.0 2.5\nH 5.0 -3.0 4.2325", config).energy;
    assert_abs_diff_eq!(e_origin, e_shifted, epsilon = 1e-8);
}

#[test]
fn screening_does_not_change_the_answer() {
    let exact = ScfConfig { screening_threshold: 0.0, ..ScfConfig::default() };
    let screened = ScfConfig { screening_threshold: 1e-10, ..ScfConfig::default() };
    let e_exact = run("F 0 0 0\nH 0 0 1.7325", exact).energy;
    let e_screened = run("F 0 0 0\nH 0 0 1.7325", screened).energy;
    assert_abs_diff_eq!(e_exact, e_screened, epsilon = 1e-8);
}

#[test]
fn water_converges_and_density_is_idempotent() {
    let geometry = "O 0 0 0\nH 1.809 0 0\nH -0.453 1.751 0";
    let mol = Molecule::parse(geometry, LengthUnit::Bohr, 0, 1).unwrap();
    let basis = BasisSet::assign(&mol, "sto-3g").unwrap();
    let result = Rhf::new(&mol, &basis, ScfConfig::default()).unwrap().run().unwrap();
    assert_eq!(result.outcome, ScfOutcome::Converged);
    assert!(
        result.energy > -75.5 && result.energy < -74.3,
        "E = {}",
        result.energy
    );

    let s = overlap_matrix(&basis).unwrap();
    let half = &result.density * 0.5;
    let dsd = half.dot(&s).dot(&half);
    let deviation = (&dsd - &half).iter().fold(0.0f64, |m, v| m.max(v.abs()));
    assert!(deviation < 1e-6, "D/2 S D/2 deviates by {}", deviation);
}

#[test]
fn atomic_guess_reaches_the_same_energy() {
    let core = ScfConfig::default();
    let atomic = ScfConfig {
        initial_guess: hf_rs::InitialGuess::AtomicDensity,
        ..ScfConfig::default()
    };
    let e_core = run("F 0 0 0\nH 0 0 1.7325", core).energy;
    let e_atomic = run("F 0 0 0\nH 0 0 1.7325", atomic).energy;
    assert_abs_diff_eq!(e_core, e_atomic, epsilon = 1e-7);
}
