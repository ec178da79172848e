//! Canonical binary snapshot format.
//!
//! ```text
//! +--------+---------+----------+---------------------------+
//! | "SPLZ" | version | reserved | postcard(LedgerSnapshot)  |
//! | 4 B    | u16 LE  | 2 B      | ...                       |
//! +--------+---------+----------+---------------------------+
//! ```
//!
//! Records are written in id order, so encoding the same ledger twice
//! yields identical bytes.

use crate::due::Due;
use crate::expense::Expense;
use crate::ledger::{IdKind, Ledger, LedgerStore};
use crate::model::{Group, User};
use crate::{Result, SpliitzError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File magic.
pub const MAGIC: [u8; 4] = *b"SPLZ";

/// Current snapshot format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 8;

// =============================================================================
// ID COUNTERS
// =============================================================================

/// Last id handed out per kind. Zero means none yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub user: u64,
    pub group: u64,
    pub expense: u64,
    pub due: u64,
}

impl IdCounters {
    fn slot(&mut self, kind: IdKind) -> &mut u64 {
        match kind {
            IdKind::User => &mut self.user,
            IdKind::Group => &mut self.group,
            IdKind::Expense => &mut self.expense,
            IdKind::Due => &mut self.due,
        }
    }

    /// Hand out the next id of `kind`.
    pub fn allocate(&mut self, kind: IdKind) -> Result<u64> {
        let slot = self.slot(kind);
        let id = slot.checked_add(1).ok_or(SpliitzError::Overflow)?;
        *slot = id;
        Ok(id)
    }

    /// Raise `kind`'s counter so it is at least `id`.
    pub fn observe(&mut self, kind: IdKind, id: u64) {
        let slot = self.slot(kind);
        if id > *slot {
            *slot = id;
        }
    }

    /// Raise every counter past the largest id present in the maps.
    pub(crate) fn cover<U, G, E, D>(
        &mut self,
        users: &BTreeMap<crate::UserId, U>,
        groups: &BTreeMap<crate::GroupId, G>,
        expenses: &BTreeMap<crate::ExpenseId, E>,
        dues: &BTreeMap<crate::DueId, D>,
    ) {
        if let Some(id) = users.keys().next_back() {
            self.observe(IdKind::User, id.0);
        }
        if let Some(id) = groups.keys().next_back() {
            self.observe(IdKind::Group, id.0);
        }
        if let Some(id) = expenses.keys().next_back() {
            self.observe(IdKind::Expense, id.0);
        }
        if let Some(id) = dues.keys().next_back() {
            self.observe(IdKind::Due, id.0);
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Complete, backend-independent copy of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub counters: IdCounters,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub expenses: Vec<Expense>,
    pub dues: Vec<Due>,
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a snapshot with the canonical header.
pub fn encode_snapshot(snapshot: &LedgerSnapshot) -> Result<Vec<u8>> {
    let body = postcard::to_stdvec(snapshot)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a canonical snapshot, validating the header.
pub fn decode_snapshot(bytes: &[u8]) -> Result<LedgerSnapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(SpliitzError::Format(format!(
            "snapshot is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }
    if bytes[..4] != MAGIC {
        return Err(SpliitzError::Format("bad magic, not a Spliitz snapshot".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(SpliitzError::Format(format!(
            "unsupported snapshot version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let (snapshot, rest) = postcard::take_from_bytes::<LedgerSnapshot>(&bytes[HEADER_LEN..])?;
    if !rest.is_empty() {
        return Err(SpliitzError::Format(format!(
            "{} trailing bytes after snapshot",
            rest.len()
        )));
    }
    Ok(snapshot)
}

/// Export any ledger backend in canonical form.
pub fn export_canonical(store: &dyn LedgerStore) -> Result<Vec<u8>> {
    encode_snapshot(&store.snapshot()?)
}

/// Rebuild an in-memory ledger from canonical bytes.
pub fn import_canonical(bytes: &[u8]) -> Result<Ledger> {
    decode_snapshot(bytes).map(Ledger::from)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GroupId, UserId};

    fn sample() -> Ledger {
        let mut ledger = Ledger::new();
        let _ = ledger.next_id(IdKind::User);
        let _ = ledger.put_user(User {
            id: UserId(1),
            name: "Alice".to_string(),
        });
        let _ = ledger.next_id(IdKind::Group);
        let _ = ledger.put_group(Group::new(GroupId(1), "Flat", UserId(1)));
        ledger
    }

    #[test]
    fn header_is_written() {
        let bytes = export_canonical(&sample()).expect("encode");
        assert_eq!(&bytes[..4], b"SPLZ");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = export_canonical(&sample()).expect("encode");
        let b = export_canonical(&sample()).expect("encode");
        assert_eq!(a, b);
    }

    #[test]
    fn import_restores_ledger() {
        let original = sample();
        let bytes = export_canonical(&original).expect("encode");
        let restored = import_canonical(&bytes).expect("decode");
        assert_eq!(restored, original);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = export_canonical(&sample()).expect("encode");
        bytes[0] = b'X';
        assert!(matches!(decode_snapshot(&bytes), Err(SpliitzError::Format(_))));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = export_canonical(&sample()).expect("encode");
        bytes[4] = 9;
        assert!(matches!(decode_snapshot(&bytes), Err(SpliitzError::Format(_))));
    }

    #[test]
    fn rejects_truncated_and_trailing_input() {
        assert!(decode_snapshot(b"SPL").is_err());

        let mut bytes = export_canonical(&sample()).expect("encode");
        bytes.push(0xFF);
        assert!(decode_snapshot(&bytes).is_err());
    }
}
