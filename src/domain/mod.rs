//! Domain types and the ports the coordinator talks through.

pub mod notification;
pub mod ports;
pub mod product;
pub mod transaction;
