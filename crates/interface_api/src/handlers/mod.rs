//! Request handlers

pub mod fees;
pub mod health;
pub mod ledger;
