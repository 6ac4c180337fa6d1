use crate::*;
use super::disk::*;
use crate::storage::RamDisk;
use crate::vfs::InodeID;

/// Decoded superblock plus the disk geometry derived from it. Geometry is
/// fixed at build time; nothing here changes after `load`.
#[derive(Clone, Debug)]
pub struct SuperBlock {
    pub magic: u32,
    pub nblocks: u32,
    pub ninodes: u32,
    pub first_inode_blk: u32,
}

impl SuperBlock {
    pub fn new(nblocks: u32, ninodes: u32) -> Self {
        let freemap_blks = (nblocks as usize).div_ceil(BLK_BITS) as u32;
        Self {
            magic: BLOCKFS_MAGIC,
            nblocks,
            ninodes,
            first_inode_blk: FREEMAP_BLK + freemap_blks,
        }
    }

    pub fn load(disk: &RamDisk) -> FsResult<Self> {
        let mut dsb = DSuperBlock::default();
        disk.read_bytes(SUPERBLOCK_BLK, 0, dsb.as_mut())?;

        let sb = Self {
            magic: dsb.magic,
            nblocks: dsb.nblocks,
            ninodes: dsb.ninodes,
            first_inode_blk: dsb.first_inode_blk,
        };

        if sb.magic != BLOCKFS_MAGIC
            || sb.nblocks > disk.nr_blocks()
            || sb.first_inode_blk != FREEMAP_BLK + sb.freemap_blks()
            || sb.ninodes < 2
            || sb.first_data_blk() >= sb.nblocks
        {
            return Err(FsError::Corrupted);
        }
        Ok(sb)
    }

    pub fn write(&self, disk: &mut RamDisk) -> FsResult<()> {
        let dsb = DSuperBlock {
            magic: self.magic,
            nblocks: self.nblocks,
            ninodes: self.ninodes,
            first_inode_blk: self.first_inode_blk,
        };
        disk.write_bytes(SUPERBLOCK_BLK, 0, dsb.as_ref())
    }

    /// Blocks occupied by the free bitmap, one bit per disk block.
    pub fn freemap_blks(&self) -> u32 {
        (self.nblocks as usize).div_ceil(BLK_BITS) as u32
    }

    /// Blocks occupied by the inode table.
    pub fn itable_blks(&self) -> u32 {
        (self.ninodes as usize * INODE_SZ).div_ceil(BLK_SZ) as u32
    }

    /// First block the allocator may hand out. Everything below it (boot
    /// sector, superblock, freemap, inode table) is reserved.
    pub fn first_data_blk(&self) -> u32 {
        self.first_inode_blk + self.itable_blks()
    }

    /// Location of an inode slot: (block number, byte offset within block).
    pub fn inode_pos(&self, ino: InodeID) -> FsResult<(u32, usize)> {
        if ino >= self.ninodes {
            return Err(FsError::NotFound);
        }
        let blk = self.first_inode_blk + ino / INODE_PER_BLK as u32;
        let off = (ino as usize % INODE_PER_BLK) * INODE_SZ;
        Ok((blk, off))
    }
}
