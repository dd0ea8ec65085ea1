//! CLI command implementations.

pub mod cards;
pub mod common;
pub mod export;
pub mod info;
pub mod simulate;
