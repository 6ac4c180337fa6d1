use crate::*;
use super::disk::*;
use super::inode::{change_size, Inode};
use super::superblock::SuperBlock;
use crate::storage::RamDisk;
use crate::vfs::InodeID;

/// A directory's contents is a packed run of `DIRENT_SZ` slots read and
/// written through the owning inode's pointer tree. Slot offsets are byte
/// offsets into that file.
pub(crate) fn read_dirent(disk: &RamDisk, dir: &Inode, off: usize) -> FsResult<DiskDirEntry> {
    let mut de = DiskDirEntry::tombstone();
    let n = dir.read_at(disk, off, de.as_mut())?;
    if n != DIRENT_SZ {
        return Err(FsError::Corrupted);
    }
    Ok(de)
}

pub(crate) fn write_dirent(
    disk: &mut RamDisk,
    sb: &SuperBlock,
    dir: &mut Inode,
    off: usize,
    de: &DiskDirEntry,
) -> FsResult<()> {
    dir.write_at(disk, sb, off, de.as_ref())?;
    Ok(())
}

/// Mark the slot at `off` as a tombstone. Only the inode number is cleared;
/// the stale name is dead weight a later reuse overwrites.
pub(crate) fn tombstone_dirent(
    disk: &mut RamDisk,
    sb: &SuperBlock,
    dir: &mut Inode,
    off: usize,
) -> FsResult<()> {
    dir.write_at(disk, sb, off, &0u32.to_le_bytes())?;
    Ok(())
}

/// Linear scan for a live entry whose name matches byte-for-byte.
/// Returns the slot's byte offset and the inode it names.
pub(crate) fn find_dirent(
    disk: &RamDisk,
    dir: &Inode,
    name: &str,
) -> FsResult<Option<(usize, InodeID)>> {
    let mut off = 0;
    while off < dir.size as usize {
        let de = read_dirent(disk, dir, off)?;
        if de.ino != 0 && de.name_bytes() == name.as_bytes() {
            return Ok(Some((off, de.ino)));
        }
        off += DIRENT_SZ;
    }
    Ok(None)
}

/// Offset of the first tombstone, extending the directory by one slot when
/// none exists. Extension crosses into a fresh zero-filled block at most
/// once per `DIRENT_PER_BLK` slots.
pub(crate) fn blank_dirent(
    disk: &mut RamDisk,
    sb: &SuperBlock,
    dir: &mut Inode,
) -> FsResult<usize> {
    let mut off = 0;
    while off < dir.size as usize {
        if read_dirent(disk, dir, off)?.ino == 0 {
            return Ok(off);
        }
        off += DIRENT_SZ;
    }
    change_size(disk, sb, dir, (off + DIRENT_SZ) as u32)?;
    Ok(off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::builder::mkfs;
    use crate::vfs::FilePerm;

    fn dir_fixture() -> (RamDisk, SuperBlock, Inode) {
        let disk = mkfs(256, 16).unwrap();
        let sb = SuperBlock::load(&disk).unwrap();
        let dir = Inode::new_dir(3, FilePerm::from_mode(0o755));
        (disk, sb, dir)
    }

    #[test]
    fn slots_fill_then_spill_into_a_new_block() {
        let (mut disk, sb, mut dir) = dir_fixture();
        for i in 0..DIRENT_PER_BLK + 1 {
            let off = blank_dirent(&mut disk, &sb, &mut dir).unwrap();
            assert_eq!(off, i * DIRENT_SZ);
            let de = DiskDirEntry::new(4 + i as u32, &format!("f{:03}", i));
            write_dirent(&mut disk, &sb, &mut dir, off, &de).unwrap();
        }
        // one slot past a block boundary costs exactly one more block
        assert_eq!(dir.size as usize, (DIRENT_PER_BLK + 1) * DIRENT_SZ);
        assert_eq!(dir.nblocks(), 2);
    }

    #[test]
    fn lookups_match_whole_names_only() {
        let (mut disk, sb, mut dir) = dir_fixture();
        let off = blank_dirent(&mut disk, &sb, &mut dir).unwrap();
        write_dirent(&mut disk, &sb, &mut dir, off, &DiskDirEntry::new(9, "alpha")).unwrap();

        assert_eq!(find_dirent(&disk, &dir, "alpha").unwrap(), Some((0, 9)));
        assert_eq!(find_dirent(&disk, &dir, "alph").unwrap(), None);
        assert_eq!(find_dirent(&disk, &dir, "alphas").unwrap(), None);
    }

    #[test]
    fn tombstones_are_skipped_and_reused() {
        let (mut disk, sb, mut dir) = dir_fixture();
        for (i, name) in ["one", "two", "three"].iter().enumerate() {
            let off = blank_dirent(&mut disk, &sb, &mut dir).unwrap();
            write_dirent(
                &mut disk,
                &sb,
                &mut dir,
                off,
                &DiskDirEntry::new(4 + i as u32, name),
            )
            .unwrap();
        }

        let (off, ino) = find_dirent(&disk, &dir, "two").unwrap().unwrap();
        assert_eq!(ino, 5);
        tombstone_dirent(&mut disk, &sb, &mut dir, off).unwrap();
        assert_eq!(find_dirent(&disk, &dir, "two").unwrap(), None);

        // the tombstone is the first blank slot again, no growth
        let size_before = dir.size;
        assert_eq!(blank_dirent(&mut disk, &sb, &mut dir).unwrap(), off);
        assert_eq!(dir.size, size_before);
    }
}
