#![forbid(unsafe_code)]
//! Error types for e2cat.
//!
//! # Error Taxonomy
//!
//! e2cat uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `e2c-types` | On-disk format violations detected during byte parsing |
//! | Runtime | `Ext2Error` | `e2c-error` (this crate) | User-facing errors for CLI and API consumers |
//!
//! ## Mapping Policy: ParseError → Ext2Error
//!
//! `e2c-error` is intentionally independent of `e2c-types` and `e2c-ondisk`
//! to avoid cyclic dependencies. The conversion from `ParseError` to
//! `Ext2Error` is implemented in `e2c-core`, which depends on both crates.
//!
//! The mapping rules are:
//!
//! | ParseError Variant | Ext2Error Variant | Rationale |
//! |--------------------|-------------------|-----------|
//! | `InsufficientData` | `Corruption` | Truncated metadata indicates corruption or a truncated image |
//! | `InvalidMagic` | `Format` | Wrong magic means wrong filesystem type, not corruption |
//! | `InvalidField` | `Format` / `UnsupportedFeature` / `UnsupportedBlockSize` / `InvalidGeometry` | `e2c-core` adds open-validation context from field+reason |
//! | `IntegerConversion` | `Corruption` | Arithmetic overflow in parsed values suggests corruption |
//!
//! `NotFound` is the only recoverable outcome of the whole system: a path
//! component that does not exist in its parent directory. It is an ordinary,
//! expected result, never retried, and short-circuits resolution.
//!
//! ## errno Mapping
//!
//! Every `Ext2Error` variant maps to exactly one POSIX errno via
//! [`Ext2Error::to_errno`]. The mapping is exhaustive (no wildcard arms) so
//! adding a new variant is a compile error until its errno is assigned.
//! The CLI uses the errno as its process exit code.
//!
//! | Variant | errno | Constant |
//! |---------|-------|----------|
//! | `Io` | `EIO` | 5 |
//! | `Corruption` | `EIO` | 5 |
//! | `Format` | `EINVAL` | 22 |
//! | `Parse` | `EINVAL` | 22 |
//! | `UnsupportedFeature` | `EOPNOTSUPP` | 95 |
//! | `UnsupportedBlockSize` | `EOPNOTSUPP` | 95 |
//! | `InvalidGeometry` | `EINVAL` | 22 |
//! | `NotFound` | `ENOENT` | 2 |
//! | `NotDirectory` | `ENOTDIR` | 20 |
//! | `IsDirectory` | `EISDIR` | 21 |

use thiserror::Error;

/// Unified error type for all e2cat operations.
///
/// This is the canonical error type returned by CLI commands and public API
/// surfaces. Internal parse errors (`ParseError` from `e2c-types`) are
/// converted into `Ext2Error` at the `e2c-core` boundary.
#[derive(Debug, Error)]
pub enum Ext2Error {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk metadata corruption detected at a known byte offset.
    #[error("corrupt metadata at offset {offset}: {detail}")]
    Corruption { offset: u64, detail: String },

    /// Invalid on-disk format (wrong magic, not an ext2 image).
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Parse-layer error surfaced to the user.
    ///
    /// Carries the string representation of a `ParseError` when neither the
    /// byte offset nor open-validation context is known. Prefer `Corruption`
    /// or `Format` where they apply.
    #[error("parse error: {0}")]
    Parse(String),

    /// The image uses a layout this build does not support.
    ///
    /// The principal case is an image reporting more than one block group:
    /// the resolver's address arithmetic assumes exactly one, so such images
    /// are rejected at open time rather than silently mislocating every
    /// inode. Maps to `EOPNOTSUPP` to distinguish "we don't support this"
    /// from "this image is broken."
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The image's block size is valid ext2 but unsupported by this build.
    #[error("unsupported block size: {0}")]
    UnsupportedBlockSize(String),

    /// On-disk geometry is invalid or out of the supported range.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A path (or one of its components) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory operation was attempted on a non-directory.
    #[error("not a directory")]
    NotDirectory,

    /// A file operation was attempted on a directory.
    #[error("is a directory")]
    IsDirectory,
}

impl Ext2Error {
    /// Convert this error into a POSIX errno.
    ///
    /// The mapping is exhaustive — every variant has an explicit arm. Adding
    /// a new variant without updating this function is a compile error.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::Corruption { .. } => libc::EIO,
            Self::Format(_) | Self::Parse(_) | Self::InvalidGeometry(_) => libc::EINVAL,
            Self::UnsupportedFeature(_) | Self::UnsupportedBlockSize(_) => libc::EOPNOTSUPP,
            Self::NotFound(_) => libc::ENOENT,
            Self::NotDirectory => libc::ENOTDIR,
            Self::IsDirectory => libc::EISDIR,
        }
    }
}

/// Result alias using `Ext2Error`.
pub type Result<T> = std::result::Result<T, Ext2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_covers_all_variants() {
        let cases: Vec<(Ext2Error, libc::c_int)> = vec![
            (Ext2Error::Io(std::io::Error::other("test")), libc::EIO),
            (
                Ext2Error::Corruption {
                    offset: 0,
                    detail: "test".into(),
                },
                libc::EIO,
            ),
            (Ext2Error::Format("test".into()), libc::EINVAL),
            (Ext2Error::Parse("test".into()), libc::EINVAL),
            (
                Ext2Error::UnsupportedFeature("multiple block groups".into()),
                libc::EOPNOTSUPP,
            ),
            (
                Ext2Error::UnsupportedBlockSize("8192".into()),
                libc::EOPNOTSUPP,
            ),
            (
                Ext2Error::InvalidGeometry("blocks_per_group=0".into()),
                libc::EINVAL,
            ),
            (Ext2Error::NotFound("/missing".into()), libc::ENOENT),
            (Ext2Error::NotDirectory, libc::ENOTDIR),
            (Ext2Error::IsDirectory, libc::EISDIR),
        ];

        for (error, expected_errno) in &cases {
            assert_eq!(
                error.to_errno(),
                *expected_errno,
                "wrong errno for {error:?}",
            );
        }
    }

    #[test]
    fn io_error_preserves_raw_os_error() {
        let raw = std::io::Error::from_raw_os_error(libc::EPERM);
        let err = Ext2Error::Io(raw);
        assert_eq!(err.to_errno(), libc::EPERM);
    }

    #[test]
    fn display_formatting() {
        let err = Ext2Error::Corruption {
            offset: 2048,
            detail: "bad rec_len".into(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt metadata at offset 2048: bad rec_len"
        );

        let nf = Ext2Error::NotFound("/files/missing.txt".into());
        assert_eq!(nf.to_string(), "not found: /files/missing.txt");

        let unsup = Ext2Error::UnsupportedFeature("multiple block groups".into());
        assert_eq!(
            unsup.to_string(),
            "unsupported feature: multiple block groups"
        );

        assert_eq!(Ext2Error::IsDirectory.to_string(), "is a directory");
        assert_eq!(Ext2Error::NotDirectory.to_string(), "not a directory");
    }

    #[test]
    fn open_validation_errnos_are_distinct() {
        // UnsupportedFeature/UnsupportedBlockSize are EOPNOTSUPP, not EINVAL:
        // "can't read this image" and "this image is broken" are different
        // answers for a caller deciding whether to retry with another tool.
        let unsup = Ext2Error::UnsupportedFeature("multiple block groups".into());
        let blk = Ext2Error::UnsupportedBlockSize("8192".into());
        let geom = Ext2Error::InvalidGeometry("bad block size".into());
        let fmt = Ext2Error::Format("bad magic".into());

        assert_eq!(unsup.to_errno(), libc::EOPNOTSUPP);
        assert_eq!(blk.to_errno(), libc::EOPNOTSUPP);
        assert_eq!(geom.to_errno(), libc::EINVAL);
        assert_eq!(fmt.to_errno(), libc::EINVAL);
        assert_ne!(unsup.to_errno(), geom.to_errno());
    }
}
