//! Wire shapes returned to callers.
//!
//! Roots and path nodes are 64 lowercase hex characters (big-endian, zero
//! padded). Positions are the strings `"0"` and `"1"`.

use serde::{Deserialize, Serialize};

use crate::{AppendOutcome, FieldElement, InclusionProof, OperationKind};

/// Response to an add-commitment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommitmentResponse {
    /// Leaf index
    pub index: usize,
    /// Root after the append
    pub root_hex: String,
}

impl From<&AppendOutcome> for AddCommitmentResponse {
    fn from(outcome: &AppendOutcome) -> Self {
        Self {
            index: outcome.index,
            root_hex: outcome.root.to_hex(),
        }
    }
}

/// Response to a proof request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    /// Root the path hashes up to
    pub root_hex: String,
    /// Siblings in leaf-to-root order
    pub path: Vec<String>,
    /// `"0"` if the path node is the left child at that level, `"1"` if right
    pub path_positions: Vec<String>,
}

impl From<&InclusionProof> for ProofResponse {
    fn from(proof: &InclusionProof) -> Self {
        Self {
            root_hex: proof.root.to_hex(),
            path: proof.siblings.iter().map(FieldElement::to_hex).collect(),
            path_positions: proof.positions.iter().map(u8::to_string).collect(),
        }
    }
}

/// Response to a root request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    /// Operation kind queried
    pub kind: OperationKind,
    /// Current root
    pub root_hex: String,
    /// Leaves under that root
    pub leaf_count: usize,
}
