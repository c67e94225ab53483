//! Request handlers, one module per resource

pub mod audit;
pub mod balances;
pub mod collections;
pub mod commissions;
pub mod health;
pub mod payments;
pub mod settlements;
