#![forbid(unsafe_code)]
//! Open/validate facade over simplified ext2 images.
//!
//! [`Ext2Fs`] owns the raw image bytes, validates the volume contract once
//! at open time (supported block size, sane geometry, exactly one block
//! group), and exposes path-based operations — resolve, read, list — with
//! the user-facing [`Ext2Error`] taxonomy. The on-disk parsing itself lives
//! in `e2c-ondisk` and reports `ParseError`; this crate converts at the
//! boundary.

use e2c_error::Ext2Error;
use e2c_ondisk::{Ext2DirEntry, Ext2ImageReader, Ext2Inode, Ext2Superblock};
use e2c_types::{InodeNumber, ParseError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// ── ParseError boundary conversion ──────────────────────────────────────────

/// Convert a parse-layer error into the user-facing error type.
///
/// Open-validation failures carry context in their field name: feature and
/// group-count violations become `UnsupportedFeature`, block-size range
/// violations become `UnsupportedBlockSize`, and the remaining geometry
/// fields become `InvalidGeometry`. Everything structural (bad magic,
/// truncation, overflow) maps per the table in `e2c-error`.
#[must_use]
pub fn parse_error_to_ext2(err: &ParseError) -> Ext2Error {
    match err {
        ParseError::InsufficientData {
            needed,
            offset,
            actual,
        } => Ext2Error::Corruption {
            offset: *offset as u64,
            detail: format!("need {needed} bytes, got {actual}"),
        },
        ParseError::InvalidMagic { expected, actual } => Ext2Error::Format(format!(
            "bad superblock magic: expected {expected:#x}, got {actual:#x}"
        )),
        ParseError::InvalidField { field, reason } => match *field {
            "block_group_count" => Ext2Error::UnsupportedFeature(format!("{field}: {reason}")),
            "block_size" | "s_log_block_size" => {
                Ext2Error::UnsupportedBlockSize(format!("{field}: {reason}"))
            }
            f if f.starts_with("s_") => Ext2Error::InvalidGeometry(format!("{field}: {reason}")),
            _ => Ext2Error::Format(format!("{field}: {reason}")),
        },
        ParseError::IntegerConversion { field } => Ext2Error::Corruption {
            offset: 0,
            detail: format!("integer conversion failed: {field}"),
        },
    }
}

// ── Open options & geometry ─────────────────────────────────────────────────

/// Options controlling how a filesystem image is opened.
///
/// By default, open-time validation is enabled. Disable it only for
/// recovery or diagnostic workflows where reading a partially-corrupt
/// image is intentional.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Skip open-time validation (geometry, block size, group count).
    pub skip_validation: bool,
}

#[allow(clippy::derivable_impls)]
impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            skip_validation: false,
        }
    }
}

/// Pre-computed geometry derived from the superblock.
///
/// Computed once at open time so downstream code does not re-derive it on
/// every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Geometry {
    /// Block size in bytes (1024, 2048, or 4096).
    pub block_size: u32,
    /// Total number of blocks.
    pub blocks_count: u32,
    /// Total number of inodes.
    pub inodes_count: u32,
    /// Number of inodes per block group.
    pub inodes_per_group: u32,
    /// On-disk inode record size in bytes.
    pub inode_size: u32,
    /// First non-reserved inode number.
    pub first_ino: u32,
    /// Number of block groups (always 1 for validated volumes).
    pub groups_count: u32,
    /// Volume label from the superblock.
    pub volume_name: String,
}

// ── Ext2Fs ──────────────────────────────────────────────────────────────────

/// An opened, validated ext2 image, ready for path-based reads.
///
/// Owns the image bytes; all operations are read-only, so a shared
/// reference can be used concurrently from multiple threads without
/// locking.
///
/// # Opening an image
///
/// ```ignore
/// let fs = Ext2Fs::open("floppy.img")?;
/// let (ino, _inode) = fs.resolve_path("/files/hello.txt")?;
/// println!("inode {ino}");
/// ```
pub struct Ext2Fs {
    image: Vec<u8>,
    reader: Ext2ImageReader,
    geometry: Ext2Geometry,
}

impl std::fmt::Debug for Ext2Fs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ext2Fs")
            .field("geometry", &self.geometry)
            .field("image_len", &self.image.len())
            .finish()
    }
}

impl Ext2Fs {
    /// Open an image file at `path` with default options (validation enabled).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Ext2Error> {
        Self::open_with_options(path, &OpenOptions::default())
    }

    /// Open an image file with custom options.
    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: &OpenOptions,
    ) -> Result<Self, Ext2Error> {
        let image = std::fs::read(path.as_ref())?;
        Self::from_bytes(image, options)
    }

    /// Open a filesystem from an already-loaded image buffer.
    pub fn from_bytes(image: Vec<u8>, options: &OpenOptions) -> Result<Self, Ext2Error> {
        let reader = Ext2ImageReader::new(&image).map_err(|e| parse_error_to_ext2(&e))?;

        if !options.skip_validation {
            reader.sb.validate().map_err(|e| parse_error_to_ext2(&e))?;
        }

        let geometry = geometry_from_superblock(&reader.sb);
        debug!(
            block_size = geometry.block_size,
            blocks = geometry.blocks_count,
            inodes = geometry.inodes_count,
            groups = geometry.groups_count,
            "opened ext2 image"
        );

        Ok(Self {
            image,
            reader,
            geometry,
        })
    }

    /// The parsed superblock.
    #[must_use]
    pub fn superblock(&self) -> &Ext2Superblock {
        &self.reader.sb
    }

    /// Pre-computed volume geometry.
    #[must_use]
    pub fn geometry(&self) -> &Ext2Geometry {
        &self.geometry
    }

    /// The volume's block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.geometry.block_size
    }

    /// Read an inode by number.
    pub fn read_inode(&self, ino: InodeNumber) -> Result<Ext2Inode, Ext2Error> {
        self.reader
            .read_inode(&self.image, ino)
            .map_err(|e| parse_error_to_ext2(&e))
    }

    /// Resolve an absolute path to an inode number and parsed inode.
    ///
    /// A missing component — and, by the preserved contract of the resolver,
    /// the bare root path `/` or any path without a leading `/` — yields
    /// [`Ext2Error::NotFound`], the single recoverable outcome of the
    /// system.
    pub fn resolve_path(&self, path: &str) -> Result<(InodeNumber, Ext2Inode), Ext2Error> {
        let resolved = self
            .reader
            .resolve_path(&self.image, path)
            .map_err(|e| parse_error_to_ext2(&e))?;

        match resolved {
            Some((ino, inode)) => {
                debug!(path, inode = ino.0, "resolved path");
                Ok((ino, inode))
            }
            None => Err(Ext2Error::NotFound(path.to_owned())),
        }
    }

    /// Read a regular file's entire contents by path.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, Ext2Error> {
        let (_, inode) = self.resolve_path(path)?;
        if inode.is_dir() {
            return Err(Ext2Error::IsDirectory);
        }

        let size = usize::try_from(inode.size).map_err(|_| Ext2Error::Corruption {
            offset: 0,
            detail: "file size exceeds addressable range".to_owned(),
        })?;
        let mut buf = vec![0_u8; size];
        let n = self
            .reader
            .read_inode_data(&self.image, &inode, 0, &mut buf)
            .map_err(|e| parse_error_to_ext2(&e))?;
        buf.truncate(n);
        Ok(buf)
    }

    /// List a directory's entries by path.
    pub fn read_dir(&self, path: &str) -> Result<Vec<Ext2DirEntry>, Ext2Error> {
        let (_, inode) = self.resolve_path(path)?;
        if !inode.is_dir() {
            return Err(Ext2Error::NotDirectory);
        }
        self.reader
            .read_dir(&self.image, &inode)
            .map_err(|e| parse_error_to_ext2(&e))
    }
}

fn geometry_from_superblock(sb: &Ext2Superblock) -> Ext2Geometry {
    Ext2Geometry {
        block_size: sb.block_size,
        blocks_count: sb.blocks_count,
        inodes_count: sb.inodes_count,
        inodes_per_group: sb.inodes_per_group,
        inode_size: sb.inode_record_size(),
        first_ino: sb.first_ino,
        groups_count: sb.groups_count(),
        volume_name: sb.volume_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2c_types::{
        EXT2_GROUP_DESC_OFFSET, EXT2_SUPER_MAGIC, EXT2_SUPERBLOCK_OFFSET, S_IFDIR, S_IFREG,
    };

    // ── Fixture image ────────────────────────────────────────────────────
    //
    // 64K, 1K blocks, one group: root (inode 2) → files/ (11) →
    // files/hello.txt (12, "Hello, world!\n").

    const INODE_TABLE_BLOCK: u32 = 5;
    const ROOT_DIR_BLOCK: u32 = 21;
    const FILES_DIR_BLOCK: u32 = 22;
    const FILE_BLOCK: u32 = 23;
    const FILES_INO: u32 = 11;
    const HELLO_INO: u32 = 12;
    const CONTENT: &[u8] = b"Hello, world!\n";

    fn put_superblock(image: &mut [u8]) {
        let sb = EXT2_SUPERBLOCK_OFFSET;
        image[sb + 0x38..sb + 0x3A].copy_from_slice(&EXT2_SUPER_MAGIC.to_le_bytes());
        image[sb..sb + 0x04].copy_from_slice(&16_u32.to_le_bytes()); // inodes_count
        image[sb + 0x04..sb + 0x08].copy_from_slice(&64_u32.to_le_bytes()); // blocks_count
        image[sb + 0x14..sb + 0x18].copy_from_slice(&1_u32.to_le_bytes()); // first_data_block
        image[sb + 0x20..sb + 0x24].copy_from_slice(&8192_u32.to_le_bytes()); // blocks_per_group
        image[sb + 0x28..sb + 0x2C].copy_from_slice(&16_u32.to_le_bytes()); // inodes_per_group
        image[sb + 0x4C..sb + 0x50].copy_from_slice(&1_u32.to_le_bytes()); // rev_level
        image[sb + 0x54..sb + 0x58].copy_from_slice(&11_u32.to_le_bytes()); // first_ino
        image[sb + 0x58..sb + 0x5A].copy_from_slice(&128_u16.to_le_bytes()); // inode_size
        image[sb + 0x78..sb + 0x7E].copy_from_slice(b"floppy"); // volume_name
    }

    fn put_inode(image: &mut [u8], ino: u32, mode: u16, size: u32, block0: u32) {
        let off = (INODE_TABLE_BLOCK * 1024 + (ino - 1) * 128) as usize;
        image[off..off + 2].copy_from_slice(&mode.to_le_bytes());
        image[off + 0x04..off + 0x08].copy_from_slice(&size.to_le_bytes());
        image[off + 0x1A..off + 0x1C].copy_from_slice(&1_u16.to_le_bytes());
        image[off + 0x28..off + 0x2C].copy_from_slice(&block0.to_le_bytes());
    }

    fn put_entry(
        image: &mut [u8],
        off: usize,
        ino: u32,
        rec_len: u16,
        file_type: u8,
        name: &[u8],
    ) -> usize {
        image[off..off + 4].copy_from_slice(&ino.to_le_bytes());
        image[off + 4..off + 6].copy_from_slice(&rec_len.to_le_bytes());
        image[off + 6] = u8::try_from(name.len()).unwrap();
        image[off + 7] = file_type;
        image[off + 8..off + 8 + name.len()].copy_from_slice(name);
        off + usize::from(rec_len)
    }

    fn end_entries(image: &mut [u8], off: usize, block_end: usize) {
        let remaining = u16::try_from(block_end - off).unwrap();
        image[off..off + 4].copy_from_slice(&0_u32.to_le_bytes());
        image[off + 4..off + 6].copy_from_slice(&remaining.to_le_bytes());
    }

    fn build_ext2_image() -> Vec<u8> {
        let mut image = vec![0_u8; 64 * 1024];
        put_superblock(&mut image);

        let gd = EXT2_GROUP_DESC_OFFSET;
        image[gd + 0x08..gd + 0x0C].copy_from_slice(&INODE_TABLE_BLOCK.to_le_bytes());

        put_inode(&mut image, 2, S_IFDIR | 0o755, 1024, ROOT_DIR_BLOCK);
        put_inode(&mut image, FILES_INO, S_IFDIR | 0o755, 1024, FILES_DIR_BLOCK);
        put_inode(
            &mut image,
            HELLO_INO,
            S_IFREG | 0o644,
            u32::try_from(CONTENT.len()).unwrap(),
            FILE_BLOCK,
        );

        let root = (ROOT_DIR_BLOCK * 1024) as usize;
        let mut off = root;
        off = put_entry(&mut image, off, 2, 12, 2, b".");
        off = put_entry(&mut image, off, 2, 12, 2, b"..");
        off = put_entry(&mut image, off, FILES_INO, 16, 2, b"files");
        end_entries(&mut image, off, root + 1024);

        let files = (FILES_DIR_BLOCK * 1024) as usize;
        let mut off = files;
        off = put_entry(&mut image, off, FILES_INO, 12, 2, b".");
        off = put_entry(&mut image, off, 2, 12, 2, b"..");
        off = put_entry(&mut image, off, HELLO_INO, 20, 1, b"hello.txt");
        end_entries(&mut image, off, files + 1024);

        let data = (FILE_BLOCK * 1024) as usize;
        image[data..data + CONTENT.len()].copy_from_slice(CONTENT);

        image
    }

    // ── Open / validation ────────────────────────────────────────────────

    #[test]
    fn open_options_default_enables_validation() {
        let opts = OpenOptions::default();
        assert!(!opts.skip_validation);
    }

    #[test]
    fn open_valid_image() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        assert_eq!(fs.block_size(), 1024);
        assert_eq!(fs.geometry().inodes_count, 16);
        assert_eq!(fs.geometry().groups_count, 1);
        assert_eq!(fs.geometry().volume_name, "floppy");
        assert_eq!(fs.superblock().magic, EXT2_SUPER_MAGIC);
    }

    #[test]
    fn open_rejects_garbage() {
        let garbage = vec![0xAB_u8; 64 * 1024];
        let err = Ext2Fs::from_bytes(garbage, &OpenOptions::default()).unwrap_err();
        assert_eq!(err.to_errno(), libc::EINVAL); // Format error
    }

    #[test]
    fn open_rejects_truncated_image() {
        let err = Ext2Fs::from_bytes(vec![0_u8; 512], &OpenOptions::default()).unwrap_err();
        assert!(matches!(err, Ext2Error::Corruption { .. }));
    }

    #[test]
    fn open_rejects_multi_group_image() {
        let mut image = build_ext2_image();
        let sb = EXT2_SUPERBLOCK_OFFSET;
        // Shrink the group span so the block count implies three groups.
        image[sb + 0x04..sb + 0x08].copy_from_slice(&200_u32.to_le_bytes());
        image[sb + 0x20..sb + 0x24].copy_from_slice(&64_u32.to_le_bytes());

        let err = Ext2Fs::from_bytes(image.clone(), &OpenOptions::default()).unwrap_err();
        assert!(
            matches!(err, Ext2Error::UnsupportedFeature(_)),
            "expected UnsupportedFeature, got {err:?}",
        );
        assert_eq!(err.to_errno(), libc::EOPNOTSUPP);

        // skip_validation bypasses the group-count check.
        let opts = OpenOptions {
            skip_validation: true,
        };
        let fs = Ext2Fs::from_bytes(image, &opts).unwrap();
        assert!(fs.geometry().groups_count > 1);
    }

    #[test]
    fn open_rejects_unsupported_block_size() {
        let mut image = build_ext2_image();
        let sb = EXT2_SUPERBLOCK_OFFSET;
        image[sb + 0x18..sb + 0x1C].copy_from_slice(&3_u32.to_le_bytes()); // 8192
        image[sb + 0x14..sb + 0x18].copy_from_slice(&0_u32.to_le_bytes());

        let err = Ext2Fs::from_bytes(image, &OpenOptions::default()).unwrap_err();
        assert!(matches!(err, Ext2Error::UnsupportedBlockSize(_)));
        assert_eq!(err.to_errno(), libc::EOPNOTSUPP);
    }

    #[test]
    fn open_reads_image_from_file() {
        use std::io::Write;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&build_ext2_image()).unwrap();
        tmp.flush().unwrap();

        let fs = Ext2Fs::open(tmp.path()).unwrap();
        assert_eq!(fs.block_size(), 1024);
    }

    #[test]
    fn debug_format_mentions_geometry() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let debug = format!("{fs:?}");
        assert!(debug.contains("Ext2Fs"));
        assert!(debug.contains("image_len"));
    }

    // ── parse_error_to_ext2 mapping ──────────────────────────────────────

    #[test]
    fn parse_error_mapping() {
        let e = parse_error_to_ext2(&ParseError::InvalidField {
            field: "block_group_count",
            reason: "image reports more than one block group",
        });
        assert!(matches!(e, Ext2Error::UnsupportedFeature(_)));

        let e = parse_error_to_ext2(&ParseError::InvalidField {
            field: "block_size",
            reason: "unsupported",
        });
        assert!(matches!(e, Ext2Error::UnsupportedBlockSize(_)));

        let e = parse_error_to_ext2(&ParseError::InvalidField {
            field: "s_blocks_per_group",
            reason: "cannot be zero",
        });
        assert!(matches!(e, Ext2Error::InvalidGeometry(_)));

        let e = parse_error_to_ext2(&ParseError::InvalidField {
            field: "de_rec_len",
            reason: "directory entry rec_len < 8 or misaligned",
        });
        assert!(matches!(e, Ext2Error::Format(_)));

        let e = parse_error_to_ext2(&ParseError::InvalidMagic {
            expected: 0xEF53,
            actual: 0,
        });
        assert!(matches!(e, Ext2Error::Format(_)));

        let e = parse_error_to_ext2(&ParseError::InsufficientData {
            needed: 100,
            offset: 1024,
            actual: 50,
        });
        assert!(matches!(e, Ext2Error::Corruption { offset: 1024, .. }));

        let e = parse_error_to_ext2(&ParseError::IntegerConversion { field: "x" });
        assert!(matches!(e, Ext2Error::Corruption { .. }));
    }

    // ── Path operations ──────────────────────────────────────────────────

    #[test]
    fn resolve_path_returns_fixture_inode() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let (ino, inode) = fs.resolve_path("/files/hello.txt").unwrap();
        assert_eq!(ino, InodeNumber(HELLO_INO));
        assert!(inode.is_regular_file());
    }

    #[test]
    fn resolve_path_missing_is_enoent() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();

        let err = fs.resolve_path("/files/missing.txt").unwrap_err();
        assert!(matches!(err, Ext2Error::NotFound(_)));
        assert_eq!(err.to_errno(), libc::ENOENT);

        let err = fs.resolve_path("/nope").unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn resolve_bare_root_is_enoent() {
        // Preserved resolver contract: "/" is not found, not the root inode.
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let err = fs.resolve_path("/").unwrap_err();
        assert!(matches!(err, Ext2Error::NotFound(_)));
    }

    #[test]
    fn resolve_relative_path_is_enoent() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        assert!(fs.resolve_path("files/hello.txt").is_err());
    }

    #[test]
    fn read_file_returns_contents() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        assert_eq!(fs.read_file("/files/hello.txt").unwrap(), CONTENT);
    }

    #[test]
    fn read_file_on_directory_is_eisdir() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let err = fs.read_file("/files").unwrap_err();
        assert!(matches!(err, Ext2Error::IsDirectory));
        assert_eq!(err.to_errno(), libc::EISDIR);
    }

    #[test]
    fn read_dir_lists_entries() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let entries = fs.read_dir("/files").unwrap();
        let names: Vec<_> = entries.iter().map(Ext2DirEntry::name_str).collect();
        assert_eq!(names, vec![".", "..", "hello.txt"]);
    }

    #[test]
    fn read_dir_on_file_is_enotdir() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let err = fs.read_dir("/files/hello.txt").unwrap_err();
        assert!(matches!(err, Ext2Error::NotDirectory));
        assert_eq!(err.to_errno(), libc::ENOTDIR);
    }

    #[test]
    fn geometry_serializes() {
        let fs = Ext2Fs::from_bytes(build_ext2_image(), &OpenOptions::default()).unwrap();
        let json = serde_json::to_string(fs.geometry()).unwrap();
        let deser: Ext2Geometry = serde_json::from_str(&json).unwrap();
        assert_eq!(&deser, fs.geometry());
    }
}
