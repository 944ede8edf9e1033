//! Handlers for customer, store-owner and rider operations.
//!
//! The cart manager owns cart edits, the order handler owns checkout and
//! review, and the delivery handler owns the rider transitions.

pub mod cart;
pub mod delivery;
pub mod order;

pub use cart::{CartManager, CartUpdate};
pub use delivery::DeliveryHandler;
pub use order::{OrderHandler, ReviewOutcome};
