//! Range Locking Integration Tests
//!
//! Tests for the lock tree manager through the public API:
//! read/write exclusion, borderwrite bookkeeping, waiting requests,
//! deadlock detection, escalation and lock tree lifetime.

#[path = "../common/mod.rs"]
mod common;

mod borderwrite;
mod config;
mod deadlock;
mod duplicates;
mod escalation;
mod lifetime;
