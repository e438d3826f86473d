//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the demustering software, i.e. everything
//! that crosses the boundary between one vehicle's behaviour and the outside world.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Messages exchanged between vehicles (trajectory and speed broadcasts)
pub mod msg;
