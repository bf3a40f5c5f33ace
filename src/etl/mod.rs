//! Core extraction abstractions
//!
//! This module provides the trait definitions shared by every source
//! (extractors producing a [`Table`](crate::Table)) and every destination
//! (loaders persisting one).

mod extract;
mod load;

pub use extract::Extractor;
pub use load::Loader;
