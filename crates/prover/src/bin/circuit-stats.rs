//! Circuit statistics utility - reports constraint counts and proof timing
//!
//! Usage:
//!   cargo run --release --bin circuit-stats           # Constraint counts per depth
//!   cargo run --release --bin circuit-stats -- --time # Include proof timing at the default depth

use std::sync::Arc;
use std::time::Instant;

use ark_bn254::Fr;
use ark_ff::Zero;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_std::rand::{rngs::StdRng, SeedableRng};

use ballot_circuits::{IncrementalMerkleTree, MembershipCircuit, PoseidonHasher, DEFAULT_TREE_DEPTH};
use ballot_prover::{setup::setup_voting, ArkworksBackend, ProofEngine, WitnessAssembler};

const DEPTHS: [usize; 5] = [DEFAULT_TREE_DEPTH, 10, 16, 20, 32];

fn count_constraints(depth: usize, hasher: &PoseidonHasher) -> Result<usize, String> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    // empty circuits use dummy values, the count is still accurate
    MembershipCircuit::empty(depth, hasher.clone())
        .generate_constraints(cs.clone())
        .map_err(|e| e.to_string())?;
    Ok(cs.num_constraints())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let include_timing = std::env::args().any(|a| a == "--time");
    let hasher = PoseidonHasher::new()?;

    println!("BALLOT MEMBERSHIP CIRCUIT STATS\n");
    println!("Depth   Max voters      Constraints");
    println!("───────────────────────────────────");

    for depth in DEPTHS {
        let count = count_constraints(depth, &hasher)?;
        println!("{:>5}   {:>10}   {:>14}", depth, 1u64 << depth, count);
    }

    if include_timing {
        run_timing_benchmarks(&hasher)?;
    } else {
        println!("\n(Run with --time to include proof generation timing)");
    }
    Ok(())
}

fn run_timing_benchmarks(hasher: &PoseidonHasher) -> Result<(), Box<dyn std::error::Error>> {
    const RUNS: u32 = 3;
    let depth = DEFAULT_TREE_DEPTH;

    println!("\nPROOF TIMING (depth {depth}, {RUNS} runs)\n");

    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(42);
    let keys = Arc::new(setup_voting(depth, hasher.clone(), &mut rng)?);
    println!("Setup:  {:?}", start.elapsed());

    let assembler = WitnessAssembler::new(hasher.clone());
    let (secret, nullifier) = (Fr::from(1u64), Fr::from(2u64));
    let tree = IncrementalMerkleTree::build(depth, Fr::zero(), hasher.clone(), &[assembler.commitment(secret, nullifier)])?;
    let witness = assembler.assemble(secret, nullifier, &tree, 0)?;

    let engine = ProofEngine::new(Arc::new(ArkworksBackend::new(keys, depth, hasher.clone())));
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;

    // warm up
    runtime.block_on(engine.prove(&witness))?;

    let start = Instant::now();
    for _ in 0..RUNS {
        runtime.block_on(engine.prove(&witness))?;
    }
    println!("Prove:  {:?} avg", start.elapsed() / RUNS);
    Ok(())
}
