//! # Dues
//!
//! A due is the debt one member owes the payer of a finalized expense.
//! It moves through `Outstanding -> PaidPendingConfirm -> Settled`.

use crate::money::Amount;
use crate::{DueId, ExpenseId, GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A debt between two users tied to one expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Due {
    pub id: DueId,
    pub expense_id: ExpenseId,
    pub group_id: GroupId,
    pub debtor: UserId,
    pub creditor: UserId,
    pub amount: Amount,
    /// Set by the debtor once payment has been sent.
    pub paid: bool,
    /// Set by the creditor once payment has arrived. Implies `paid`.
    pub received: bool,
}

impl Due {
    #[must_use]
    pub fn stage(&self) -> DueStage {
        if self.received {
            DueStage::Settled
        } else if self.paid {
            DueStage::PaidPendingConfirm
        } else {
            DueStage::Outstanding
        }
    }

    /// Still counts towards balances.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.received
    }

    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.debtor == user || self.creditor == user
    }
}

/// Settlement stage of a single due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStage {
    Outstanding,
    PaidPendingConfirm,
    Settled,
}

impl fmt::Display for DueStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outstanding => write!(f, "outstanding"),
            Self::PaidPendingConfirm => write!(f, "paid, awaiting confirmation"),
            Self::Settled => write!(f, "settled"),
        }
    }
}
