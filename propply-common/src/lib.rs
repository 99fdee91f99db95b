//! Propply common library
//!
//! Shared vocabulary for the Propply services: NYC property identifiers,
//! borough codes, block/lot formatting, configuration and error types.

pub mod config;
pub mod error;
pub mod property;

pub use error::{Error, Result};
pub use property::{Borough, PropertyIdentifier};
