//! # Storage Module
//!
//! Durable ledger storage using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (a batch of dues lands in one commit)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)

mod redb_ledger;

pub use redb_ledger::RedbLedger;
