#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `walk` provides the deterministic filesystem traversal used by the
//! directory mirroring engine when enumerating the source and destination
//! trees. The walker yields regular files, directories, and symbolic links in
//! depth-first order with siblings sorted lexicographically, so two
//! independent walks over logically identical trees produce identical
//! sequences. That ordering guarantee is what allows the engine to merge the
//! two sides with a lockstep sorted-merge instead of materializing either
//! tree in memory.
//!
//! # Design
//!
//! - [`WalkBuilder`] configures a traversal rooted at a specific directory.
//! - [`Walker`] implements [`Iterator`] and yields [`WalkEntry`] values.
//!   Directory contents are processed before the walker moves to the next
//!   sibling, keeping the sequence deterministic regardless of the underlying
//!   filesystem's iteration order.
//! - [`WalkError`] describes I/O failures encountered while reading
//!   directories or querying metadata. Errors capture the offending path so
//!   the engine can record a per-item failure and keep going.
//!
//! # Invariants
//!
//! - Relative paths never contain `..` segments; every yielded entry resides
//!   within the configured root.
//! - Symbolic links are probed via their own metadata and never followed into
//!   a new subtree, so cyclic links cannot cause infinite traversal.
//! - A failure to read one directory or one entry's metadata terminates only
//!   that part of the traversal: the error is yielded in sequence and the
//!   walker continues with the remaining siblings.
//!
//! # Errors
//!
//! Traversal emits [`WalkError`] when directory contents cannot be listed or
//! entry metadata cannot be queried. Callers can reach the original
//! [`std::io::Error`] through [`std::error::Error::source`].

mod builder;
mod entry;
mod error;
mod walker;

pub use builder::WalkBuilder;
pub use entry::WalkEntry;
pub use error::{WalkError, WalkErrorKind};
pub use walker::Walker;
