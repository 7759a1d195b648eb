//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Connectivity monitor: checks the upstream origin and fires the
//!   progress sync when connectivity returns

mod connectivity;

pub use connectivity::{check_connectivity, spawn_connectivity_monitor};
