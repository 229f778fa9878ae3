//! Verifier call arguments.
//!
//! The on-chain verifier takes `(uint[2] a, uint[2][2] b, uint[2] c, uint[] input)`.
//! Its G2 element `b` expects each Fq2 coordinate as `[c1, c0]`, the
//! reverse of how snarkjs writes `pi_b`.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use ballot_circuits::encoding::{normalize_integer_string, parse_integer, EncodingError};

use crate::prove::RawProof;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalldataError {
    #[error("malformed proof: {0}")]
    Malformed(String),

    #[error("calldata holds {actual} values, need at least {expected}")]
    TooShort { expected: usize, actual: usize },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// A proof in verifier argument order, every value a canonical decimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofArtifact {
    pub a: [String; 2],
    pub b: [[String; 2]; 2],
    pub c: [String; 2],
    pub public_inputs: Vec<String>,
}

impl ProofArtifact {
    /// Flatten a backend proof into verifier order.
    pub fn from_raw(raw: &RawProof) -> Result<Self, CalldataError> {
        let proof = &raw.proof;
        let pi_a = pair(&proof.pi_a, "pi_a")?;
        let pi_c = pair(&proof.pi_c, "pi_c")?;
        if proof.pi_b.len() < 2 {
            return Err(CalldataError::Malformed("pi_b needs two rows".into()));
        }
        let bx = pair(&proof.pi_b[0], "pi_b[0]")?;
        let by = pair(&proof.pi_b[1], "pi_b[1]")?;

        let public_inputs = raw
            .public_signals
            .iter()
            .map(|s| normalize_integer_string(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            a: pi_a,
            b: [[bx[1].clone(), bx[0].clone()], [by[1].clone(), by[0].clone()]],
            c: pi_c,
            public_inputs,
        })
    }

    /// All values in call order: a, b (row-major), c, inputs.
    pub fn flatten(&self) -> Vec<&str> {
        let mut values: Vec<&str> = Vec::with_capacity(8 + self.public_inputs.len());
        values.extend(self.a.iter().map(String::as_str));
        values.extend(self.b.iter().flatten().map(String::as_str));
        values.extend(self.c.iter().map(String::as_str));
        values.extend(self.public_inputs.iter().map(String::as_str));
        values
    }

    /// Render like snarkjs `exportSolidityCallData`:
    /// `["0x..","0x.."],[["0x..","0x.."],[..]],["0x..","0x.."],["0x..",..]`.
    pub fn to_solidity_calldata(&self) -> Result<String, CalldataError> {
        let word = |v: &String| -> Result<String, CalldataError> {
            Ok(format!("\"{}\"", to_word_hex(v)?))
        };
        let list = |vs: &[String]| -> Result<String, CalldataError> {
            Ok(format!("[{}]", vs.iter().map(word).collect::<Result<Vec<_>, _>>()?.join(",")))
        };

        Ok(format!(
            "{},[{},{}],{},{}",
            list(&self.a)?,
            list(&self.b[0])?,
            list(&self.b[1])?,
            list(&self.c)?,
            list(&self.public_inputs)?,
        ))
    }

    /// Parse calldata rendered by [`Self::to_solidity_calldata`] or snarkjs.
    ///
    /// Brackets, quotes and whitespace are ignored; the first eight values
    /// are the proof, the rest are public inputs.
    pub fn parse_solidity_calldata(calldata: &str) -> Result<Self, CalldataError> {
        let cleaned: String = calldata
            .chars()
            .filter(|c| !matches!(c, '"' | '[' | ']') && !c.is_whitespace())
            .collect();
        let values = cleaned
            .split(',')
            .filter(|v| !v.is_empty())
            .map(normalize_integer_string)
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() < 8 {
            return Err(CalldataError::TooShort {
                expected: 8,
                actual: values.len(),
            });
        }

        Ok(Self {
            a: [values[0].clone(), values[1].clone()],
            b: [
                [values[2].clone(), values[3].clone()],
                [values[4].clone(), values[5].clone()],
            ],
            c: [values[6].clone(), values[7].clone()],
            public_inputs: values[8..].to_vec(),
        })
    }

    /// `[a, b, c, input]` as a JSON array, for web3 clients.
    pub fn to_args(&self) -> Value {
        json!([self.a, self.b, self.c, self.public_inputs])
    }
}

fn pair(values: &[String], name: &str) -> Result<[String; 2], CalldataError> {
    if values.len() < 2 {
        return Err(CalldataError::Malformed(format!("{name} needs two coordinates")));
    }
    Ok([
        normalize_integer_string(&values[0])?,
        normalize_integer_string(&values[1])?,
    ])
}

fn to_word_hex(value: &str) -> Result<String, CalldataError> {
    let n: BigUint = parse_integer(value)?;
    Ok(format!("0x{:0>64}", n.to_str_radix(16)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prove::SnarkjsProof;

    fn raw() -> RawProof {
        RawProof {
            proof: SnarkjsProof {
                pi_a: vec!["1".into(), "2".into(), "1".into()],
                pi_b: vec![
                    vec!["3".into(), "4".into()],
                    vec!["5".into(), "0x6".into()],
                    vec!["1".into(), "0".into()],
                ],
                pi_c: vec!["7".into(), "8".into(), "1".into()],
                protocol: Some("groth16".into()),
                curve: Some("bn128".into()),
            },
            public_signals: vec!["0x0a".into(), "11".into()],
        }
    }

    #[test]
    fn test_g2_coordinates_swapped() {
        let artifact = ProofArtifact::from_raw(&raw()).unwrap();

        assert_eq!(artifact.a, ["1".to_string(), "2".to_string()]);
        assert_eq!(
            artifact.b,
            [
                ["4".to_string(), "3".to_string()],
                ["6".to_string(), "5".to_string()]
            ]
        );
        assert_eq!(artifact.c, ["7".to_string(), "8".to_string()]);
        assert_eq!(artifact.public_inputs, vec!["10", "11"]);
        assert_eq!(
            artifact.flatten(),
            vec!["1", "2", "4", "3", "6", "5", "7", "8", "10", "11"]
        );
    }

    #[test]
    fn test_solidity_calldata_layout() {
        let artifact = ProofArtifact::from_raw(&raw()).unwrap();
        let calldata = artifact.to_solidity_calldata().unwrap();

        let one = format!("\"0x{:0>64}\"", "1");
        assert!(calldata.starts_with(&format!("[{one},")));
        assert!(calldata.contains(&format!("[[\"0x{:0>64}\"", "4")));
        assert!(calldata.ends_with(&format!("\"0x{:0>64}\"]", "b")));

        assert_eq!(ProofArtifact::parse_solidity_calldata(&calldata).unwrap(), artifact);
    }

    #[test]
    fn test_parse_snarkjs_output() {
        let calldata = "[\"0x01\", \"0x02\"],[[\"0x03\", \"0x04\"],[\"0x05\", \"0x06\"]],[\"0x07\", \"0x08\"],[\"0x09\"]\n";
        let artifact = ProofArtifact::parse_solidity_calldata(calldata).unwrap();

        assert_eq!(artifact.b[1], ["5".to_string(), "6".to_string()]);
        assert_eq!(artifact.public_inputs, vec!["9"]);
    }

    #[test]
    fn test_malformed_inputs() {
        let mut short = raw();
        short.proof.pi_b.truncate(1);
        assert!(matches!(ProofArtifact::from_raw(&short), Err(CalldataError::Malformed(_))));

        let mut garbage = raw();
        garbage.public_signals[0] = "abc".into();
        assert!(matches!(ProofArtifact::from_raw(&garbage), Err(CalldataError::Encoding(_))));

        assert_eq!(
            ProofArtifact::parse_solidity_calldata("[\"0x1\"]"),
            Err(CalldataError::TooShort { expected: 8, actual: 1 })
        );
    }

    #[test]
    fn test_args_shape() {
        let args = ProofArtifact::from_raw(&raw()).unwrap().to_args();
        assert_eq!(args[1][0][0], "4");
        assert_eq!(args[3][1], "11");
    }
}
