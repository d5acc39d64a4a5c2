//! Catalog Management Module
//!
//! Maps table ids to the files that store them.

pub mod catalog;

pub use self::catalog::Catalog;
