#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `metadata` captures point-in-time snapshots of filesystem items and
//! applies source metadata onto mirrored destination items. The crate is the
//! single place that interprets `stat` results for the mirroring engine:
//! [`ItemDescriptor`] records the kind, size, modification time, and
//! permission bits the comparator needs, while the `apply_*` helpers copy
//! permission bits and timestamps after content has been written.
//!
//! # Design
//!
//! - [`probe`] turns a path into an [`ItemDescriptor`]. A path that does not
//!   exist produces a [`ItemKind::Missing`] descriptor rather than an error;
//!   only genuine I/O failures (an unreadable parent, for instance) surface
//!   as [`MetadataError`].
//! - Descriptors are immutable snapshots. They are created fresh on every
//!   traversal and discarded after the comparison that consumes them.
//! - Modification times are compared at millisecond precision so trees that
//!   cross filesystems with coarser timestamp granularity still converge.
//!
//! # Errors
//!
//! Every failure carries the operation context, the offending path, and the
//! underlying [`std::io::Error`].

mod apply;
mod descriptor;
mod error;

pub use apply::{
    apply_directory_metadata, apply_file_metadata, apply_symlink_metadata, set_mode_bits,
};
pub use descriptor::{ItemDescriptor, ItemKind, probe, relative_key};
pub use error::MetadataError;
