//! State management for orders and rider assignments.
//!
//! The order state machine validates lifecycle transitions; the rider ledger
//! keeps rider profiles in step with the delivery transitions.

pub mod ledger;
pub mod order;

pub use ledger::RiderLedger;
pub use order::{OrderStateError, OrderStateMachine};
