//! Host side of a set of SMPP-style binds.
//!
//! Here the public APIs of the binds and the host configuration are exposed.

pub mod binds;
pub mod config;
