//! dotquery Core Library
//!
//! This crate provides the data model, document providers and error
//! handling shared by every dotquery component.
//!
//! # Modules
//!
//! - `value` - The tree value model queries navigate
//! - `provider` - Decoders that turn document text into trees
//! - `error` - Error types and result aliases

pub mod error;
pub mod provider;
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use provider::{
    DEFAULT_PROVIDER, DirectJsonProvider, ProviderRegistry, StandardJsonProvider, TreeProvider,
};
pub use value::TreeValue;
