//! # vitrine-shared
//!
//! Domain models and remote document codecs shared by every Vitrine crate.
//!
//! The local cache persists these models directly; the cloud layer converts
//! them to and from untyped field-map documents via [`document`].

pub mod constants;
pub mod document;
pub mod models;

pub use models::*;
