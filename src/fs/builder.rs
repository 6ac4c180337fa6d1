use crate::*;
use super::bitmap;
use super::inode::{write_inode, Inode};
use super::superblock::SuperBlock;
use crate::storage::RamDisk;
use crate::vfs::FilePerm;

/// Lay out a fresh disk image: boot sector, superblock, freemap, inode
/// table with the root directory, and a fully free data region.
pub fn mkfs(nblocks: u32, ninodes: u32) -> FsResult<RamDisk> {
    let sb = SuperBlock::new(nblocks, ninodes);
    if ninodes < 2 || sb.first_data_blk() >= nblocks {
        // no room for even one data block
        return Err(FsError::NoSpace);
    }

    let mut disk = RamDisk::new(nblocks as usize);
    sb.write(&mut disk)?;

    // everything below the first data block stays marked in-use
    for blockno in sb.first_data_blk()..nblocks {
        bitmap::mark_free(&mut disk, blockno)?;
    }

    let root = Inode::new_dir(ROOT_INO, FilePerm::from_mode(0o755));
    write_inode(&mut disk, &sb, &root)?;

    info!(
        "built image: {} blocks, {} inodes, {} data blocks",
        nblocks,
        ninodes,
        nblocks - sb.first_data_blk()
    );
    Ok(disk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::FileType;

    #[test]
    fn fresh_images_hold_an_empty_root() {
        let disk = mkfs(128, 32).unwrap();
        let sb = SuperBlock::load(&disk).unwrap();

        let root = super::super::inode::read_inode(&disk, &sb, ROOT_INO).unwrap();
        assert!(root.is_live());
        assert_eq!(root.tp, FileType::Dir);
        assert_eq!(root.size, 0);

        // every data block is free, every reserved block is not
        assert_eq!(
            bitmap::count_free(&disk, &sb).unwrap(),
            sb.nblocks - sb.first_data_blk()
        );
        for blockno in 0..sb.first_data_blk() {
            assert!(!bitmap::is_free(&disk, blockno).unwrap());
        }
    }

    #[test]
    fn refuses_degenerate_geometries() {
        // 16 inodes need blocks 0..5 reserved, so 5 blocks leave no data room
        assert_eq!(mkfs(5, 16).err(), Some(FsError::NoSpace));
        assert_eq!(mkfs(128, 1).err(), Some(FsError::NoSpace));
        assert!(mkfs(6, 16).is_ok());
    }
}
