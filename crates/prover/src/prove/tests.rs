use std::sync::Arc;
use std::time::Duration;

use ark_ff::Zero;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use ballot_circuits::IncrementalMerkleTree;

use super::*;
use crate::setup::setup_voting;
use crate::witness::WitnessAssembler;

struct Fixture {
    hasher: PoseidonHasher,
    keys: Arc<CircuitKeyPair>,
    witness: MembershipWitness,
}

fn fixture() -> Fixture {
    let mut rng = StdRng::seed_from_u64(42);
    let hasher = PoseidonHasher::new().unwrap();
    let keys = Arc::new(setup_voting(3, hasher.clone(), &mut rng).unwrap());

    let (secret, nullifier) = (Fr::from(99u64), Fr::from(100u64));
    let leaves = vec![
        Fr::from(1u64),
        Fr::from(2u64),
        hasher.hash_two(secret, nullifier),
    ];
    let tree = IncrementalMerkleTree::build(3, Fr::zero(), hasher.clone(), &leaves).unwrap();
    let witness = WitnessAssembler::new(hasher.clone())
        .assemble(secret, nullifier, &tree, 2)
        .unwrap();

    Fixture {
        hasher,
        keys,
        witness,
    }
}

/// Backend returning a fixed proof, for engine post-processing tests.
struct FixedBackend(RawProof);

#[async_trait]
impl ProvingBackend for FixedBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn full_prove(&self, _input: &CircuitInput) -> Result<RawProof, ProvingError> {
        Ok(self.0.clone())
    }
}

fn fixed_proof(public_signals: Vec<String>) -> RawProof {
    RawProof {
        proof: SnarkjsProof {
            pi_a: vec!["1".into(), "2".into(), "1".into()],
            pi_b: vec![
                vec!["3".into(), "4".into()],
                vec!["5".into(), "6".into()],
                vec!["1".into(), "0".into()],
            ],
            pi_c: vec!["7".into(), "8".into(), "1".into()],
            protocol: None,
            curve: None,
        },
        public_signals,
    }
}

#[tokio::test]
async fn test_arkworks_backend_snarkjs_shape() {
    let f = fixture();
    let backend = ArkworksBackend::new(f.keys.clone(), 3, f.hasher.clone());

    let raw = backend.full_prove(&f.witness.to_circuit_input()).await.unwrap();

    assert_eq!(raw.proof.pi_a.len(), 3);
    assert_eq!(raw.proof.pi_a[2], "1");
    assert_eq!(raw.proof.pi_b.len(), 3);
    assert_eq!(raw.proof.pi_b[2], vec!["1", "0"]);
    assert_eq!(
        raw.public_signals,
        vec![f.witness.root.clone(), f.witness.nullifier_hash.clone()]
    );
}

#[tokio::test]
async fn test_arkworks_backend_rejects_stale_root() {
    let f = fixture();
    let backend = ArkworksBackend::new(f.keys.clone(), 3, f.hasher.clone());

    let mut input = f.witness.to_circuit_input();
    input.root = "42".into();

    let err = backend.full_prove(&input).await.unwrap_err();
    assert!(matches!(err, ProvingError::Unsatisfied(_)), "{err}");
}

/// Runs without a runtime, the way the blocking pool calls it.
#[test]
fn test_blocking_prover_checks_satisfiability() {
    let f = fixture();
    let mut input = f.witness.to_circuit_input();

    let circuit = input.to_circuit(f.hasher.clone()).unwrap();
    assert!(prove_blocking(&f.keys, circuit).is_ok());

    input.root = "42".into();
    let circuit = input.to_circuit(f.hasher.clone()).unwrap();
    let err = prove_blocking(&f.keys, circuit).unwrap_err();
    assert!(matches!(err, ProvingError::Unsatisfied(_)), "{err}");
}

#[tokio::test]
async fn test_arkworks_backend_rejects_other_depth() {
    let f = fixture();
    let backend = ArkworksBackend::new(f.keys.clone(), 4, f.hasher.clone());

    let err = backend.full_prove(&f.witness.to_circuit_input()).await.unwrap_err();
    assert!(matches!(
        err,
        ProvingError::DepthMismatch {
            expected: 4,
            actual: 3
        }
    ));
}

#[tokio::test]
async fn test_engine_checks_public_signals() {
    let f = fixture();

    let matching = fixed_proof(vec![f.witness.nullifier_hash.clone(), f.witness.root.clone()]);
    let engine = ProofEngine::new(Arc::new(FixedBackend(matching)));
    let artifact = engine.prove(&f.witness).await.unwrap();
    assert_eq!(artifact.b[0], ["4".to_string(), "3".to_string()]);

    let foreign = fixed_proof(vec!["1".into(), f.witness.nullifier_hash.clone()]);
    let engine = ProofEngine::new(Arc::new(FixedBackend(foreign)));
    assert!(matches!(
        engine.prove(&f.witness).await,
        Err(ProvingError::PublicSignalMismatch { .. })
    ));
}

#[tokio::test]
async fn test_engine_is_deterministic_in_public_signals() {
    let f = fixture();
    let engine = ProofEngine::new(Arc::new(Backend::Arkworks(ArkworksBackend::new(
        f.keys.clone(),
        3,
        f.hasher.clone(),
    ))));
    assert_eq!(engine.backend_name(), "arkworks");

    let first = engine.prove(&f.witness).await.unwrap();
    let second = engine.prove(&f.witness).await.unwrap();

    assert_eq!(first.public_inputs, second.public_inputs);
}

#[tokio::test]
async fn test_snarkjs_missing_artifacts() {
    let f = fixture();
    let dir = tempfile::tempdir().unwrap();
    let backend = SnarkjsBackend::from_artifacts_dir("snarkjs", dir.path(), Duration::from_secs(5));

    assert_eq!(backend.wasm(), dir.path().join("voting").join("Voting.wasm"));
    let err = backend.full_prove(&f.witness.to_circuit_input()).await.unwrap_err();
    assert!(matches!(err, ProvingError::ArtifactMissing(path) if path.ends_with("Voting.wasm")));
}

#[cfg(unix)]
mod process {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in `snarkjs` script plus empty circuit artifacts.
    fn fake_snarkjs(script_body: &str) -> (tempfile::TempDir, SnarkjsBackend) {
        let dir = tempfile::tempdir().unwrap();
        let voting = dir.path().join("voting");
        std::fs::create_dir_all(&voting).unwrap();
        std::fs::write(voting.join("Voting.wasm"), b"").unwrap();
        std::fs::write(voting.join("circuit_final.zkey"), b"").unwrap();

        let bin = dir.path().join("snarkjs");
        std::fs::write(&bin, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backend = SnarkjsBackend::from_artifacts_dir(&bin, dir.path(), Duration::from_secs(10));
        (dir, backend)
    }

    #[tokio::test]
    async fn test_snarkjs_outputs_are_read_back() {
        let f = fixture();
        let (_dir, backend) = fake_snarkjs(
            r#"[ "$1 $2" = "groth16 fullprove" ] || exit 2
grep -q nullifierHash "$3" || exit 3
echo '{"pi_a":["1","2","1"],"pi_b":[["3","4"],["5","6"],["1","0"]],"pi_c":["7","8","1"],"protocol":"groth16","curve":"bn128"}' > "$6"
echo '["10","11"]' > "$7""#,
        );

        let raw = backend.full_prove(&f.witness.to_circuit_input()).await.unwrap();
        assert_eq!(raw.public_signals, vec!["10", "11"]);
        assert_eq!(raw.proof.pi_b[1], vec!["5", "6"]);
        assert_eq!(raw.proof.curve.as_deref(), Some("bn128"));
    }

    #[tokio::test]
    async fn test_snarkjs_assert_failure_is_unsatisfied() {
        let f = fixture();
        let (_dir, backend) = fake_snarkjs("echo 'Error: Assert Failed. Error in template Voting' >&2\nexit 1");

        let err = backend.full_prove(&f.witness.to_circuit_input()).await.unwrap_err();
        assert!(matches!(err, ProvingError::Unsatisfied(_)), "{err}");
    }

    #[tokio::test]
    async fn test_snarkjs_other_failure() {
        let f = fixture();
        let (_dir, backend) = fake_snarkjs("echo 'zkey is corrupted' >&2\nexit 1");

        let err = backend.full_prove(&f.witness.to_circuit_input()).await.unwrap_err();
        assert!(matches!(err, ProvingError::ProofGeneration(ref m) if m.contains("corrupted")));
    }
}
