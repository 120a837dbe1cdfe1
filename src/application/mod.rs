//! Application layer: the purchase transaction coordinator.
//!
//! `TransactionCoordinator` is the entry point for the application. It serializes
//! purchase attempts, correlates asynchronous storefront events with them and
//! recovers purchases nobody was waiting for.

pub mod coordinator;
