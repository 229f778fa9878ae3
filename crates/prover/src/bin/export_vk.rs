//! Export the membership verifying key.
//!
//! Loads keys from `KEYS_DIR` (default `keys`), running the trusted setup
//! first when none exist, and writes:
//! - `verification_key.json` in snarkjs' layout, for verifier contract generation
//! - `verifying_key.hex`, the arkworks compressed encoding

use std::path::PathBuf;

use ark_bn254::{G1Affine, G2Affine};
use ballot_circuits::encoding::field_to_decimal;
use ballot_circuits::DEFAULT_TREE_DEPTH;
use ballot_prover::setup::CircuitKeys;
use serde_json::{json, Value};

fn g1(p: &G1Affine) -> Value {
    json!([field_to_decimal(&p.x), field_to_decimal(&p.y), "1"])
}

fn g2(p: &G2Affine) -> Value {
    json!([
        [field_to_decimal(&p.x.c0), field_to_decimal(&p.x.c1)],
        [field_to_decimal(&p.y.c0), field_to_decimal(&p.y.c1)],
        ["1", "0"]
    ])
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let keys_dir = PathBuf::from(std::env::var("KEYS_DIR").unwrap_or_else(|_| "keys".to_string()));
    let depth = match std::env::var("TREE_DEPTH") {
        Ok(v) => v.parse()?,
        Err(_) => DEFAULT_TREE_DEPTH,
    };

    println!("Loading or generating circuit keys in {:?} (depth {})...", keys_dir, depth);
    let keys = CircuitKeys::load_or_setup(&keys_dir, depth)?;
    let vk = &keys.voting.verifying_key;

    let json = json!({
        "protocol": "groth16",
        "curve": "bn128",
        "nPublic": vk.gamma_abc_g1.len() - 1,
        "vk_alpha_1": g1(&vk.alpha_g1),
        "vk_beta_2": g2(&vk.beta_g2),
        "vk_gamma_2": g2(&vk.gamma_g2),
        "vk_delta_2": g2(&vk.delta_g2),
        "IC": vk.gamma_abc_g1.iter().map(g1).collect::<Vec<_>>(),
    });

    let json_path = keys_dir.join("verification_key.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&json)?)?;
    println!("JSON exported to {:?}", json_path);

    let vk_bytes = keys.voting.serialize_vk()?;
    let hex_path = keys_dir.join("verifying_key.hex");
    std::fs::write(&hex_path, format!("0x{}\n", hex::encode(&vk_bytes)))?;
    println!("Voting VK ({} bytes) exported to {:?}", vk_bytes.len(), hex_path);

    Ok(())
}
