#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` computes streaming MD5 content digests for the mirroring
//! engine. Digests are the tie-break the comparator reaches for in FULL mode
//! when size and modification time match but content equality still has to
//! be confirmed. MD5 is used for equality detection only; collision
//! resistance is not a requirement here.
//!
//! # Design
//!
//! - [`Md5`] wraps the pure-Rust `md-5` implementation behind the
//!   incremental `update`/`finalize` shape the engine consumes.
//! - [`digest_file`] streams a file through the hasher in fixed-size chunks
//!   so memory use stays bounded regardless of file size.
//!
//! # Errors
//!
//! A file that vanishes or becomes unreadable mid-stream surfaces as a
//! [`ChecksumError`] carrying the path and the underlying I/O failure. The
//! caller must report it; an interrupted digest never silently counts as
//! "changed" or "unchanged".

mod md5sum;

pub use md5sum::{ChecksumError, DIGEST_LENGTH, Md5, digest_file};
