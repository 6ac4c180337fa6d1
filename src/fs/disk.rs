use crate::*;

pub const BLOCKFS_MAGIC: u32 = 0x424C4B46; // "BLKF"

/// Bits per bitmap block.
pub const BLK_BITS: usize = BLK_SZ * 8;

/// Block 0 is the boot sector, block 1 the superblock, the freemap starts
/// at block 2. The inode table follows the freemap, data blocks the table.
pub const SUPERBLOCK_BLK: u32 = 1;
pub const FREEMAP_BLK: u32 = 2;

pub const NDIRECT: usize = 10;
/// Block numbers per index block.
pub const NINDIRECT: usize = BLK_SZ / 4;

/// Largest file the pointer tree can address, in blocks.
pub const MAX_FILE_BLKS: u32 = (NDIRECT + NINDIRECT + NINDIRECT * NINDIRECT) as u32;

pub const MAX_NAME_LEN: usize = 58;
pub const MAX_SYMLINK_LEN: usize = 60;

pub const FTYPE_REG: u32 = 0;
pub const FTYPE_DIR: u32 = 1;
pub const FTYPE_LNK: u32 = 2;

/// Inode slot size. The regular/directory header is 64 bytes; the symlink
/// variant (12-byte header plus the inline path) needs 73, so slots are 128
/// bytes and eight of them pack a block.
pub const INODE_SZ: usize = 128;
pub const INODE_PER_BLK: usize = BLK_SZ / INODE_SZ;

pub const ZERO_INODE: [u8; INODE_SZ] = [0u8; INODE_SZ];

#[repr(C)]
#[derive(Clone, Default)]
pub struct DSuperBlock {
    pub magic: u32,
    /// total blocks on the disk
    pub nblocks: u32,
    /// inode table capacity
    pub ninodes: u32,
    /// first block of the inode table
    pub first_inode_blk: u32,
}
rw_as_blob!(DSuperBlock);

/// Header shared by regular files and directories. For a directory, `size`
/// is the dirent area size and is always a multiple of `DIRENT_SZ`.
#[repr(C)]
#[derive(Clone, Default)]
pub struct DInode {
    pub size: u32,
    pub ftype: u32,
    pub nlink: u32,
    pub mode: u32,
    pub direct: [u32; NDIRECT],
    pub indirect: u32,
    pub indirect2: u32,
}
rw_as_blob!(DInode);

/// Symlink slots reinterpret the tail: the target lives inline,
/// NUL-terminated, and `size` is its byte length.
#[repr(C)]
#[derive(Clone)]
pub struct DSymlinkInode {
    pub size: u32,
    pub ftype: u32,
    pub nlink: u32,
    pub target: [u8; MAX_SYMLINK_LEN + 1],
}
rw_as_blob!(DSymlinkInode);

impl Default for DSymlinkInode {
    fn default() -> Self {
        Self {
            size: 0,
            ftype: FTYPE_LNK,
            nlink: 0,
            target: [0u8; MAX_SYMLINK_LEN + 1],
        }
    }
}

pub const DIRENT_SZ: usize = 64;
pub const DIRENT_PER_BLK: usize = BLK_SZ / DIRENT_SZ;

/// A directory entry slot. `ino == 0` marks a tombstone that a later create
/// may reuse. The name is NUL-terminated inside the fixed buffer.
#[repr(C)]
#[derive(Clone)]
pub struct DiskDirEntry {
    pub ino: u32,
    pub name: [u8; MAX_NAME_LEN + 1],
    _pad: [u8; 1],
}
rw_as_blob!(DiskDirEntry);

impl DiskDirEntry {
    pub fn tombstone() -> Self {
        Self {
            ino: 0,
            name: [0u8; MAX_NAME_LEN + 1],
            _pad: [0u8; 1],
        }
    }

    pub fn new(ino: u32, name: &str) -> Self {
        debug_assert!(name.len() <= MAX_NAME_LEN);
        let mut de = Self::tombstone();
        de.ino = ino;
        de.name[..name.len()].copy_from_slice(name.as_bytes());
        de
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        &self.name[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FileType;
    use core::mem::size_of;

    #[test]
    fn layout_matches_the_wire_format() {
        assert_eq!(size_of::<DSuperBlock>(), 16);
        assert_eq!(size_of::<DInode>(), 64);
        assert!(size_of::<DSymlinkInode>() <= INODE_SZ);
        assert_eq!(size_of::<DiskDirEntry>(), DIRENT_SZ);
        assert_eq!(MAX_FILE_BLKS, 65802);
    }

    #[test]
    fn ftype_words_match_the_enum() {
        assert_eq!(Into::<u32>::into(FileType::Reg), FTYPE_REG);
        assert_eq!(Into::<u32>::into(FileType::Dir), FTYPE_DIR);
        assert_eq!(Into::<u32>::into(FileType::Lnk), FTYPE_LNK);
        assert_eq!(FileType::from_raw(FTYPE_LNK).unwrap(), FileType::Lnk);
        assert!(FileType::from_raw(9).is_err());
    }

    #[test]
    fn dirent_names_are_nul_terminated() {
        let de = DiskDirEntry::new(7, "hello");
        assert_eq!(de.name_bytes(), b"hello");
        assert_eq!(de.name[5], 0);
        let full = DiskDirEntry::new(8, &"x".repeat(MAX_NAME_LEN));
        assert_eq!(de.ino, 7);
        assert_eq!(full.name_bytes().len(), MAX_NAME_LEN);
        assert_eq!(full.name[MAX_NAME_LEN], 0);
    }
}
