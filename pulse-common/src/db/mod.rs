//! Database schema and initialization

pub mod init;

pub use init::*;
