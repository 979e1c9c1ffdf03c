//! Operation kinds and the trees they write to.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Kind of shielded operation that produced a commitment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Public value entering the pool
    Deposit,
    /// Note-to-note transfer inside the pool
    Transfer,
    /// Value leaving the pool
    Withdrawal,
}

impl OperationKind {
    /// Tree that holds this kind's commitments.
    ///
    /// Transfer outputs go into the deposit tree. A note created by a
    /// transfer must be provable against the same root a later withdrawal
    /// checks, so the two kinds share one tree.
    pub const fn tree(self) -> TreeId {
        match self {
            Self::Deposit | Self::Transfer => TreeId::Deposit,
            Self::Withdrawal => TreeId::Withdrawal,
        }
    }
}

/// Physical commitment tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TreeId {
    /// Shared by deposits and transfers
    Deposit,
    /// Withdrawals only
    Withdrawal,
}

impl TreeId {
    /// Operation kinds that write to this tree.
    pub fn kinds(self) -> &'static [OperationKind] {
        match self {
            Self::Deposit => &[OperationKind::Deposit, OperationKind::Transfer],
            Self::Withdrawal => &[OperationKind::Withdrawal],
        }
    }
}
