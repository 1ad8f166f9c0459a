#![forbid(unsafe_code)]

use e2c_types::{
    BlockNumber, BlockSize, EXT2_DIRECT_BLOCKS, EXT2_GROUP_DESC_OFFSET, EXT2_GROUP_DESC_SIZE,
    EXT2_N_BLOCKS, EXT2_SUPER_MAGIC, EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE, InodeNumber,
    ParseError, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG, block_size_from_log, ensure_slice, read_fixed,
    read_le_u16, read_le_u32, trim_nul_padded, u64_to_usize,
};
use serde::{Deserialize, Serialize};

// ── Superblock ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Superblock {
    // ── Core geometry ────────────────────────────────────────────────────
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub reserved_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inode_size: u16,
    pub first_ino: u32,

    // ── Identity ─────────────────────────────────────────────────────────
    pub magic: u16,
    pub uuid: [u8; 16],
    pub volume_name: String,
    pub last_mounted: String,

    // ── Revision & OS ────────────────────────────────────────────────────
    pub rev_level: u32,
    pub minor_rev_level: u16,
    pub creator_os: u32,

    // ── State ────────────────────────────────────────────────────────────
    pub state: u16,
    pub errors: u16,
    pub mnt_count: u16,
    pub max_mnt_count: u16,

    // ── Timestamps ───────────────────────────────────────────────────────
    pub mtime: u32,
    pub wtime: u32,
    pub lastcheck: u32,
    pub checkinterval: u32,
}

impl Ext2Superblock {
    /// Parse an ext2 superblock from a 1024-byte superblock region.
    pub fn parse_superblock_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < EXT2_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, 0x38)?;
        if magic != EXT2_SUPER_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: u32::from(EXT2_SUPER_MAGIC),
                actual: u32::from(magic),
            });
        }

        let log_block_size = read_le_u32(region, 0x18)?;
        let Some(raw_block_size) = block_size_from_log(log_block_size) else {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "invalid shift",
            });
        };
        let block_size = BlockSize::new(raw_block_size)?.get();

        Ok(Self {
            // Core geometry
            inodes_count: read_le_u32(region, 0x00)?,
            blocks_count: read_le_u32(region, 0x04)?,
            reserved_blocks_count: read_le_u32(region, 0x08)?,
            free_blocks_count: read_le_u32(region, 0x0C)?,
            free_inodes_count: read_le_u32(region, 0x10)?,
            first_data_block: read_le_u32(region, 0x14)?,
            log_block_size,
            block_size,
            blocks_per_group: read_le_u32(region, 0x20)?,
            inodes_per_group: read_le_u32(region, 0x28)?,
            inode_size: read_le_u16(region, 0x58)?,
            first_ino: read_le_u32(region, 0x54)?,

            // Identity
            magic,
            uuid: read_fixed::<16>(region, 0x68)?,
            volume_name: trim_nul_padded(&read_fixed::<16>(region, 0x78)?),
            last_mounted: trim_nul_padded(&read_fixed::<64>(region, 0x88)?),

            // Revision & OS
            rev_level: read_le_u32(region, 0x4C)?,
            minor_rev_level: read_le_u16(region, 0x3E)?,
            creator_os: read_le_u32(region, 0x48)?,

            // State
            state: read_le_u16(region, 0x3A)?,
            errors: read_le_u16(region, 0x3C)?,
            mnt_count: read_le_u16(region, 0x34)?,
            max_mnt_count: read_le_u16(region, 0x36)?,

            // Timestamps
            mtime: read_le_u32(region, 0x2C)?,
            wtime: read_le_u32(region, 0x30)?,
            lastcheck: read_le_u32(region, 0x40)?,
            checkinterval: read_le_u32(region, 0x44)?,
        })
    }

    /// Parse an ext2 superblock from a full disk image.
    ///
    /// The superblock always lives at byte offset 1024 regardless of block
    /// size.
    pub fn parse_from_image(image: &[u8]) -> Result<Self, ParseError> {
        let region = ensure_slice(image, EXT2_SUPERBLOCK_OFFSET, EXT2_SUPERBLOCK_SIZE)?;
        Self::parse_superblock_region(region)
    }

    /// On-disk inode record size in bytes.
    ///
    /// Revision 0 volumes use a fixed 128-byte record; revision 1+ volumes
    /// carry the size in `s_inode_size`. The record size is per-volume, not
    /// a constant.
    #[must_use]
    pub fn inode_record_size(&self) -> u32 {
        if self.rev_level == 0 {
            128
        } else {
            u32::from(self.inode_size)
        }
    }

    /// Number of block groups this superblock describes.
    #[must_use]
    pub fn groups_count(&self) -> u32 {
        if self.blocks_per_group == 0 {
            return 0;
        }
        self.blocks_count
            .saturating_sub(self.first_data_block)
            .div_ceil(self.blocks_per_group)
    }

    /// Run open-time validation.
    ///
    /// Checks geometry, the supported block-size range, and the
    /// single-block-group precondition. The address arithmetic downstream
    /// assumes exactly one block group; an image reporting more would have
    /// every inode silently mislocated, so such images are rejected here
    /// instead.
    pub fn validate(&self) -> Result<(), ParseError> {
        // ── block size ──────────────────────────────────────────────────
        if !matches!(self.block_size, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "block_size",
                reason: "unsupported (1K/2K/4K ext2 only)",
            });
        }

        // ── per-group geometry ──────────────────────────────────────────
        if self.blocks_per_group == 0 {
            return Err(ParseError::InvalidField {
                field: "s_blocks_per_group",
                reason: "cannot be zero",
            });
        }
        if self.blocks_per_group > self.block_size.saturating_mul(8) {
            return Err(ParseError::InvalidField {
                field: "s_blocks_per_group",
                reason: "exceeds block_size * 8 (block bitmap capacity)",
            });
        }
        if self.inodes_per_group == 0 {
            return Err(ParseError::InvalidField {
                field: "s_inodes_per_group",
                reason: "cannot be zero",
            });
        }
        if self.inodes_per_group > self.block_size.saturating_mul(8) {
            return Err(ParseError::InvalidField {
                field: "s_inodes_per_group",
                reason: "exceeds block_size * 8 (inode bitmap capacity)",
            });
        }

        // ── inode record size ───────────────────────────────────────────
        let rec = self.inode_record_size();
        if rec < 128 {
            return Err(ParseError::InvalidField {
                field: "s_inode_size",
                reason: "must be >= 128",
            });
        }
        if !rec.is_power_of_two() {
            return Err(ParseError::InvalidField {
                field: "s_inode_size",
                reason: "must be a power of two",
            });
        }
        if rec > self.block_size {
            return Err(ParseError::InvalidField {
                field: "s_inode_size",
                reason: "inode_size exceeds block_size",
            });
        }

        // ── first_data_block ────────────────────────────────────────────
        if self.first_data_block >= self.blocks_count {
            return Err(ParseError::InvalidField {
                field: "s_first_data_block",
                reason: "first_data_block >= blocks_count",
            });
        }
        if self.block_size == 1024 && self.first_data_block != 1 {
            return Err(ParseError::InvalidField {
                field: "s_first_data_block",
                reason: "must be 1 for 1K block size",
            });
        }
        if self.block_size > 1024 && self.first_data_block != 0 {
            return Err(ParseError::InvalidField {
                field: "s_first_data_block",
                reason: "must be 0 for block sizes > 1K",
            });
        }

        // ── single block group ──────────────────────────────────────────
        let groups = self.groups_count();
        if groups == 0 {
            return Err(ParseError::InvalidField {
                field: "s_blocks_count",
                reason: "zero block groups (blocks_count too small)",
            });
        }
        if groups > 1 {
            return Err(ParseError::InvalidField {
                field: "block_group_count",
                reason: "image reports more than one block group",
            });
        }

        // ── inode counts vs single-group geometry ───────────────────────
        if self.inodes_count == 0 {
            return Err(ParseError::InvalidField {
                field: "s_inodes_count",
                reason: "cannot be zero",
            });
        }
        if self.inodes_count > self.inodes_per_group {
            return Err(ParseError::InvalidField {
                field: "s_inodes_count",
                reason: "inodes_count exceeds inodes_per_group for a single group",
            });
        }

        Ok(())
    }
}

// ── Block group descriptor ──────────────────────────────────────────────────

/// The single block group descriptor (`ext2_group_desc`, 32 bytes).
///
/// It sits at the byte directly after the 1024-byte superblock region. Real
/// ext2 volumes have one descriptor per group in a table starting at the
/// block after the superblock; with exactly one group and the descriptor
/// location fixed, the two layouts coincide for 1K-block volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2GroupDesc {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
}

impl Ext2GroupDesc {
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < EXT2_GROUP_DESC_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT2_GROUP_DESC_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            block_bitmap: read_le_u32(bytes, 0x00)?,
            inode_bitmap: read_le_u32(bytes, 0x04)?,
            inode_table: read_le_u32(bytes, 0x08)?,
            free_blocks_count: read_le_u16(bytes, 0x0C)?,
            free_inodes_count: read_le_u16(bytes, 0x0E)?,
            used_dirs_count: read_le_u16(bytes, 0x10)?,
        })
    }
}

// ── Inode ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2Inode {
    pub mode: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u64,
    pub links_count: u16,
    pub blocks: u32,
    pub flags: u32,
    pub generation: u32,
    pub file_acl: u32,

    // ── Timestamps (seconds) ─────────────────────────────────────────────
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,

    /// Block pointer array: 12 direct pointers, then single/double/triple
    /// indirect. Only the direct pointers are consumed here.
    pub block: [u32; EXT2_N_BLOCKS],
}

impl Ext2Inode {
    /// Parse an ext2 inode from raw bytes. Requires at least 128 bytes;
    /// larger on-disk records carry extensions this reader does not consume.
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 128 {
            return Err(ParseError::InsufficientData {
                needed: 128,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let mut block = [0_u32; EXT2_N_BLOCKS];
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = read_le_u32(bytes, 0x28 + i * 4)?;
        }

        Ok(Self {
            mode: read_le_u16(bytes, 0x00)?,
            uid: read_le_u16(bytes, 0x02)?,
            gid: read_le_u16(bytes, 0x18)?,
            size: u64::from(read_le_u32(bytes, 0x04)?),
            links_count: read_le_u16(bytes, 0x1A)?,
            blocks: read_le_u32(bytes, 0x1C)?,
            flags: read_le_u32(bytes, 0x20)?,
            generation: read_le_u32(bytes, 0x64)?,
            file_acl: read_le_u32(bytes, 0x68)?,
            atime: read_le_u32(bytes, 0x08)?,
            ctime: read_le_u32(bytes, 0x0C)?,
            mtime: read_le_u32(bytes, 0x10)?,
            dtime: read_le_u32(bytes, 0x14)?,
            block,
        })
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        (self.mode & S_IFMT) == S_IFDIR
    }

    #[must_use]
    pub fn is_regular_file(&self) -> bool {
        (self.mode & S_IFMT) == S_IFREG
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        (self.mode & S_IFMT) == S_IFLNK
    }

    /// The inode's first data block, or `None` when no block is mapped.
    #[must_use]
    pub fn first_block(&self) -> Option<BlockNumber> {
        (self.block[0] != 0).then_some(BlockNumber(self.block[0]))
    }

    /// The 12 direct block pointers.
    #[must_use]
    pub fn direct_blocks(&self) -> &[u32] {
        &self.block[..EXT2_DIRECT_BLOCKS]
    }
}

// ── Directory entry parsing ─────────────────────────────────────────────────

/// ext2 file type constants from directory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ext2FileType {
    Unknown = 0,
    RegFile = 1,
    Dir = 2,
    Chrdev = 3,
    Blkdev = 4,
    Fifo = 5,
    Sock = 6,
    Symlink = 7,
}

impl Ext2FileType {
    #[must_use]
    pub fn from_raw(val: u8) -> Self {
        match val {
            1 => Self::RegFile,
            2 => Self::Dir,
            3 => Self::Chrdev,
            4 => Self::Blkdev,
            5 => Self::Fifo,
            6 => Self::Sock,
            7 => Self::Symlink,
            _ => Self::Unknown,
        }
    }

    /// Single-character tag for listings (`d`, `-`, `l`, ...).
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            Self::RegFile => '-',
            Self::Dir => 'd',
            Self::Chrdev => 'c',
            Self::Blkdev => 'b',
            Self::Fifo => 'p',
            Self::Sock => 's',
            Self::Symlink => 'l',
            Self::Unknown => '?',
        }
    }
}

/// ext2 directory entry header size (`ext2_dir_entry_2`).
const DIR_ENTRY_HEADER_LEN: usize = 8;

/// A `file_type` of 0 terminates the list of valid entries in a block.
///
/// Directory blocks written by the volumes this reader supports either end
/// with such a record or are fully packed; there is no entry count.
const DIR_ENTRY_END: u8 = 0;

/// A parsed ext2 directory entry (`ext2_dir_entry_2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext2DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: Ext2FileType,
    pub name: Vec<u8>,
}

impl Ext2DirEntry {
    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether this is the `.` entry.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    /// Whether this is the `..` entry.
    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// A borrowed directory entry (zero-copy reference into the block buffer).
///
/// Unlike [`Ext2DirEntry`] which owns its name bytes via `Vec<u8>`,
/// `Ext2DirEntryRef` borrows the name slice from the block buffer. This
/// avoids per-entry heap allocation when scanning directory blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ext2DirEntryRef<'a> {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: Ext2FileType,
    pub name: &'a [u8],
}

impl Ext2DirEntryRef<'_> {
    /// Convert to an owned [`Ext2DirEntry`] (allocates name bytes).
    #[must_use]
    pub fn to_owned(&self) -> Ext2DirEntry {
        Ext2DirEntry {
            inode: self.inode,
            rec_len: self.rec_len,
            name_len: self.name_len,
            file_type: self.file_type,
            name: self.name.to_vec(),
        }
    }

    /// Return the name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

/// A bounded iterator over ext2 directory entries in a block buffer.
///
/// Directory entries form a variable-stride list: each record declares its
/// own `rec_len`, the byte distance to the next record (records are 4-byte
/// aligned and sized to their name). The iterator advances by each declared
/// `rec_len`, yields `Result<Ext2DirEntryRef<'a>, ParseError>` for each live
/// entry (inode != 0), and stops at the end-of-entries record (file_type 0)
/// or the end of the block. A corrupt `rec_len` (< 8, misaligned, or
/// extending past the block) is an error, not a runaway scan.
pub struct DirBlockIter<'a> {
    block: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> DirBlockIter<'a> {
    /// Create a new iterator over directory entries in `block`.
    #[must_use]
    pub fn new(block: &'a [u8]) -> Self {
        Self {
            block,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for DirBlockIter<'a> {
    type Item = Result<Ext2DirEntryRef<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.offset + DIR_ENTRY_HEADER_LEN > self.block.len() {
                return None;
            }

            let inode = match read_le_u32(self.block, self.offset) {
                Ok(v) => v,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let rec_len_raw = match read_le_u16(self.block, self.offset + 4) {
                Ok(v) => v,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let name_len = self.block[self.offset + 6];
            let file_type_raw = self.block[self.offset + 7];

            // End of valid entries.
            if file_type_raw == DIR_ENTRY_END {
                self.done = true;
                return None;
            }

            let rec_len = usize::from(rec_len_raw);
            if rec_len < DIR_ENTRY_HEADER_LEN || (rec_len % 4) != 0 {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "de_rec_len",
                    reason: "directory entry rec_len < 8 or misaligned",
                }));
            }
            let entry_end = self.offset + rec_len;
            if entry_end > self.block.len() {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "de_rec_len",
                    reason: "directory entry extends past block boundary",
                }));
            }

            // Skip deleted entries (inode == 0).
            if inode == 0 {
                self.offset = entry_end;
                continue;
            }

            let name_end = self.offset + DIR_ENTRY_HEADER_LEN + usize::from(name_len);
            if name_end > entry_end {
                self.done = true;
                return Some(Err(ParseError::InvalidField {
                    field: "de_name_len",
                    reason: "name extends past rec_len",
                }));
            }

            let name = &self.block[self.offset + DIR_ENTRY_HEADER_LEN..name_end];
            self.offset = entry_end;

            return Some(Ok(Ext2DirEntryRef {
                inode,
                rec_len: rec_len_raw,
                name_len,
                file_type: Ext2FileType::from_raw(file_type_raw),
                name,
            }));
        }
    }
}

/// Create an iterator over directory entries in a block buffer.
///
/// This is a convenience wrapper around [`DirBlockIter::new`].
#[must_use]
pub fn iter_dir_block(block: &[u8]) -> DirBlockIter<'_> {
    DirBlockIter::new(block)
}

/// Parse all live directory entries from a single directory data block.
pub fn parse_dir_block(block: &[u8]) -> Result<Vec<Ext2DirEntry>, ParseError> {
    iter_dir_block(block)
        .map(|r| r.map(|e| e.to_owned()))
        .collect()
}

/// Look up a single name in a directory data block.
///
/// The comparison is case-sensitive and byte-exact over exactly `name_len`
/// bytes: names of equal length that differ anywhere never match, and names
/// that merely share a prefix never match. An empty `target` matches
/// nothing.
pub fn lookup_in_dir_block<'a>(
    block: &'a [u8],
    target: &[u8],
) -> Result<Option<Ext2DirEntryRef<'a>>, ParseError> {
    if target.is_empty() {
        return Ok(None);
    }
    for result in iter_dir_block(block) {
        let entry = result?;
        if entry.name == target {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

// ── Path splitting ──────────────────────────────────────────────────────────

/// Split an absolute path into its ordered components.
///
/// `split_path("/a/b/c")` returns `["a", "b", "c"]`: the empty segment
/// before the leading `/` is discarded. Doubled or trailing slashes produce
/// empty components; an empty component matches no directory entry, so the
/// resolver reports such paths as not found rather than collapsing the
/// slashes.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').skip(1).collect()
}

// ── Image reader ────────────────────────────────────────────────────────────

/// Parsed context for reading ext2 structures from an in-memory image.
///
/// Caches the superblock so that repeated lookups avoid re-parsing it. The
/// image itself is always passed in by slice and never mutated; a reader may
/// be shared freely across threads.
#[derive(Debug, Clone)]
pub struct Ext2ImageReader {
    pub sb: Ext2Superblock,
    bs: BlockSize,
}

impl Ext2ImageReader {
    /// Create a reader by parsing the superblock from `image`.
    pub fn new(image: &[u8]) -> Result<Self, ParseError> {
        let sb = Ext2Superblock::parse_from_image(image)?;
        let bs = BlockSize::new(sb.block_size)?;
        Ok(Self { sb, bs })
    }

    /// The volume's block size.
    #[must_use]
    pub fn block_size(&self) -> BlockSize {
        self.bs
    }

    /// Read a data block by block number, returning a slice.
    ///
    /// Block numbering starts at the image start: block 0 is the first
    /// `block_size` bytes of the image.
    pub fn read_block<'a>(
        &self,
        image: &'a [u8],
        block: BlockNumber,
    ) -> Result<&'a [u8], ParseError> {
        let byte = self
            .bs
            .block_to_byte(block)
            .ok_or(ParseError::InvalidField {
                field: "block_offset",
                reason: "overflow computing block byte offset",
            })?;
        let offset = u64_to_usize(byte, "block_offset")?;
        ensure_slice(image, offset, self.bs.get() as usize)
    }

    /// Read the block group descriptor.
    ///
    /// Supported volumes have exactly one group (enforced by
    /// [`Ext2Superblock::validate`]), so there is no group index parameter:
    /// the single descriptor sits directly after the superblock region.
    pub fn read_group_desc(&self, image: &[u8]) -> Result<Ext2GroupDesc, ParseError> {
        let slice = ensure_slice(image, EXT2_GROUP_DESC_OFFSET, EXT2_GROUP_DESC_SIZE)?;
        Ext2GroupDesc::parse_from_bytes(slice)
    }

    /// Read an inode by inode number.
    ///
    /// Inode numbers are 1-based: inode `n` is record `n - 1` of the inode
    /// table, whose starting block comes from the group descriptor and whose
    /// record size comes from the superblock.
    pub fn read_inode(&self, image: &[u8], ino: InodeNumber) -> Result<Ext2Inode, ParseError> {
        if ino.0 == 0 {
            return Err(ParseError::InvalidField {
                field: "inode_number",
                reason: "inode 0 is invalid in ext2",
            });
        }
        if ino.0 > self.sb.inodes_count {
            return Err(ParseError::InvalidField {
                field: "inode_number",
                reason: "inode number exceeds inodes_count",
            });
        }

        let gd = self.read_group_desc(image)?;
        let table_start_byte = self
            .bs
            .block_to_byte(BlockNumber(gd.inode_table))
            .ok_or(ParseError::InvalidField {
                field: "bg_inode_table",
                reason: "overflow computing inode table byte offset",
            })?;

        let rec = u64::from(self.sb.inode_record_size());
        let inode_byte = table_start_byte
            .checked_add(u64::from(ino.0 - 1) * rec)
            .ok_or(ParseError::InvalidField {
                field: "inode_offset",
                reason: "overflow computing inode byte offset",
            })?;

        let offset = u64_to_usize(inode_byte, "inode_offset")?;
        let slice = ensure_slice(image, offset, self.sb.inode_record_size() as usize)?;
        Ext2Inode::parse_from_bytes(slice)
    }

    /// Convenience: read the root directory's inode (inode 2).
    pub fn root_inode(&self, image: &[u8]) -> Result<Ext2Inode, ParseError> {
        self.read_inode(image, InodeNumber::ROOT)
    }

    // ── Directory operations ────────────────────────────────────────────

    /// Look up a single name in a directory inode.
    ///
    /// Only the directory's first data block is scanned; directories
    /// spanning multiple blocks are outside the supported volume contract.
    /// A directory with no mapped first block contains nothing.
    pub fn lookup(
        &self,
        image: &[u8],
        dir_inode: &Ext2Inode,
        name: &[u8],
    ) -> Result<Option<Ext2DirEntry>, ParseError> {
        let Some(first) = dir_inode.first_block() else {
            return Ok(None);
        };
        let block = self.read_block(image, first)?;
        Ok(lookup_in_dir_block(block, name)?.map(|e| e.to_owned()))
    }

    /// Read all live directory entries from a directory inode's first block.
    pub fn read_dir(
        &self,
        image: &[u8],
        dir_inode: &Ext2Inode,
    ) -> Result<Vec<Ext2DirEntry>, ParseError> {
        let Some(first) = dir_inode.first_block() else {
            return Ok(Vec::new());
        };
        let block = self.read_block(image, first)?;
        parse_dir_block(block)
    }

    // ── Path resolution ─────────────────────────────────────────────────

    /// Resolve an absolute path to an inode number and parsed inode.
    ///
    /// Each component is looked up in the current directory's first block;
    /// a missing component short-circuits to `Ok(None)` with no partial
    /// result. Resolution is strictly sequential down a single chain — no
    /// backtracking, no retries.
    ///
    /// Two deliberate contract points, preserved from the behavior this
    /// reader reproduces:
    /// - A path that does not start with `/`, and the bare root path `/`
    ///   itself, resolve to `Ok(None)` — not to the root inode.
    /// - Intermediate components are not checked to be directories. Walking
    ///   "through" a regular file reads its first data block as if it were a
    ///   directory block; all reads stay bounds-checked, so the outcome is a
    ///   not-found or a parse error, never an out-of-range read.
    pub fn resolve_path(
        &self,
        image: &[u8],
        path: &str,
    ) -> Result<Option<(InodeNumber, Ext2Inode)>, ParseError> {
        if !path.starts_with('/') {
            return Ok(None);
        }

        let mut current = self.root_inode(image)?;
        let mut found: Option<InodeNumber> = None;

        for component in split_path(path) {
            let Some(entry) = self.lookup(image, &current, component.as_bytes())? else {
                return Ok(None);
            };
            let ino = InodeNumber(entry.inode);
            current = self.read_inode(image, ino)?;
            found = Some(ino);
        }

        Ok(found.map(|ino| (ino, current)))
    }

    // ── File data reading ───────────────────────────────────────────────

    /// Read file data from an inode starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes actually read (less than `buf.len()` when
    /// the read extends past EOF). Only the 12 direct block pointers are
    /// consumed: data past them, or an unmapped pointer inside the file
    /// length, is an explicit error (indirect blocks and sparse holes are
    /// unsupported).
    pub fn read_inode_data(
        &self,
        image: &[u8],
        inode: &Ext2Inode,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, ParseError> {
        let file_size = inode.size;
        if offset >= file_size {
            return Ok(0);
        }

        let available = file_size - offset;
        let to_read = usize::try_from(available.min(buf.len() as u64)).unwrap_or(buf.len());

        let bs = u64::from(self.bs.get());
        let bs_usize = self.bs.get() as usize;
        let mut bytes_read = 0_usize;

        while bytes_read < to_read {
            let current_offset = offset + bytes_read as u64;
            let logical = u64_to_usize(current_offset / bs, "logical_block")?;
            if logical >= EXT2_DIRECT_BLOCKS {
                return Err(ParseError::InvalidField {
                    field: "i_block",
                    reason: "file data beyond direct blocks (indirect blocks unsupported)",
                });
            }
            let ptr = inode.block[logical];
            if ptr == 0 {
                return Err(ParseError::InvalidField {
                    field: "i_block",
                    reason: "unmapped data block inside file length (sparse files unsupported)",
                });
            }

            // block_size <= 65536 so the modulus always fits in usize
            #[allow(clippy::cast_possible_truncation)]
            let offset_in_block = (current_offset % bs) as usize;
            let chunk = (bs_usize - offset_in_block).min(to_read - bytes_read);

            let block_data = self.read_block(image, BlockNumber(ptr))?;
            buf[bytes_read..bytes_read + chunk]
                .copy_from_slice(&block_data[offset_in_block..offset_in_block + chunk]);

            bytes_read += chunk;
        }

        Ok(bytes_read)
    }
}
