//! Command implementations

pub mod catalog;
pub(crate) mod common;
pub mod plan;
pub mod status;
pub mod up;
pub mod verify;
