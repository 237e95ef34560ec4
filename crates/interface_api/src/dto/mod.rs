//! Request and response bodies
//!
//! Monetary values cross the wire as decimal strings, IDs as bare UUIDs.

pub mod fees;
pub mod ledger;
