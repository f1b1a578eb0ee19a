//! Core types and traits for pathwatch.
//!
//! Shared between the I/O scheduler and the directory model: snapshot
//! elements, update events, the canonical sibling ordering, text charsets,
//! and the filesystem error taxonomy.

mod charset;
mod element;
mod error;
mod update;

pub use charset::Charset;
pub use element::{PathElement, compare_entries, sort_siblings};
pub use error::FsError;
pub use update::{Initiator, Update, UpdateKind};
