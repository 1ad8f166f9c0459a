#![forbid(unsafe_code)]
//! On-disk format parsing for simplified single-block-group ext2 images.
//!
//! Pure parsing crate — no I/O, no side effects. Parses byte slices into
//! typed Rust structures representing the ext2 superblock, the block group
//! descriptor, inodes, and directory entries, and resolves absolute paths
//! to inode numbers over an in-memory image.

pub mod ext2;

pub use ext2::{
    DirBlockIter, Ext2DirEntry, Ext2DirEntryRef, Ext2FileType, Ext2GroupDesc, Ext2ImageReader,
    Ext2Inode, Ext2Superblock, iter_dir_block, lookup_in_dir_block, parse_dir_block, split_path,
};
