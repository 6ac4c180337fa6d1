pub mod superblock;
pub mod disk;
pub mod bitmap;
pub mod inode;
pub mod dir;
pub mod symlink;
pub mod builder;

use crate::*;
use crate::storage::RamDisk;
use crate::vfs::*;
use disk::*;
use inode::*;
use spin::RwLock;
use std::collections::HashSet;
use superblock::SuperBlock;

/// Inode conventionally holding the diagnostic journal. Never consulted by
/// any correctness path.
pub const JOURNAL_INO: InodeID = 2;

fn check_name(name: &str) -> FsResult<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// The filesystem: a superblock's worth of geometry over a block arena.
/// The host serializes entry, so the lock is structural rather than
/// contended; nothing here holds block references across a mutation.
pub struct BlockFs {
    sb: SuperBlock,
    disk: RwLock<RamDisk>,
}

impl BlockFs {
    /// Mount an existing image.
    pub fn new(disk: RamDisk) -> FsResult<Self> {
        let sb = SuperBlock::load(&disk)?;
        let root = read_inode(&disk, &sb, ROOT_INO)?;
        if !root.is_live() || root.tp != FileType::Dir {
            return Err(FsError::Corrupted);
        }
        Ok(Self {
            sb,
            disk: RwLock::new(disk),
        })
    }

    /// Build and mount a fresh image.
    pub fn format(nblocks: u32, ninodes: u32) -> FsResult<Self> {
        Self::new(builder::mkfs(nblocks, ninodes)?)
    }

    pub fn into_disk(self) -> RamDisk {
        self.disk.into_inner()
    }

    fn load_live(&self, disk: &RamDisk, iid: InodeID) -> FsResult<Inode> {
        let i = read_inode(disk, &self.sb, iid)?;
        if !i.is_live() {
            return Err(FsError::NotFound);
        }
        Ok(i)
    }

    fn load_dir(&self, disk: &RamDisk, iid: InodeID) -> FsResult<Inode> {
        let d = self.load_live(disk, iid)?;
        if d.tp != FileType::Dir {
            return Err(FsError::NotADirectory);
        }
        Ok(d)
    }

    /// First free inode slot. Slot 0 is reserved by convention and never
    /// handed out.
    fn alloc_inode(&self, disk: &RamDisk) -> FsResult<InodeID> {
        for ino in 1..self.sb.ninodes {
            if !read_inode(disk, &self.sb, ino)?.is_live() {
                return Ok(ino);
            }
        }
        Err(FsError::NoSpace)
    }

    /// The directory whose dirent names `iid`. Root is its own parent.
    fn parent_of(&self, disk: &RamDisk, iid: InodeID) -> FsResult<InodeID> {
        if iid == ROOT_INO {
            return Ok(ROOT_INO);
        }
        for ino in 1..self.sb.ninodes {
            let i = read_inode(disk, &self.sb, ino)?;
            if !i.is_live() || i.tp != FileType::Dir {
                continue;
            }
            let mut off = 0;
            while off < i.size as usize {
                if dir::read_dirent(disk, &i, off)?.ino == iid {
                    return Ok(ino);
                }
                off += DIRENT_SZ;
            }
        }
        // orphan directory, fall back to root rather than fail readdir
        warn!("inode {} has no referencing directory", iid);
        Ok(ROOT_INO)
    }

    /// Dump the journal file to the log. Purely diagnostic: reads the inode
    /// at `JOURNAL_INO` as text and reports what it finds, touching nothing.
    pub fn replay_journal(&self) {
        let disk = self.disk.read();
        let journal = match read_inode(&disk, &self.sb, JOURNAL_INO) {
            Ok(j) if j.is_live() && j.tp == FileType::Reg => j,
            _ => {
                info!("no journal to replay");
                return;
            }
        };
        info!("replaying journal ({} bytes)", journal.size);
        let mut pos = 0usize;
        let mut buf = [0u8; BLK_SZ];
        while pos < journal.size as usize {
            match journal.read_at(&disk, pos, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    info!("{}", String::from_utf8_lossy(&buf[..n]));
                    pos += n;
                }
                Err(e) => {
                    warn!("journal replay aborted: {}", e);
                    return;
                }
            }
        }
        info!("finished replaying journal");
    }

    /// Whole-image consistency check: sizes against reachable blocks, the
    /// freemap against the pointer trees (both directions), dirent targets,
    /// and the global link count. Cheap enough to run after every test.
    pub fn fsck(&self) -> FsResult<()> {
        let disk = self.disk.read();
        let sb = &self.sb;

        let root = read_inode(&disk, sb, ROOT_INO)?;
        if !root.is_live() || root.tp != FileType::Dir {
            warn!("fsck: root inode missing or not a directory");
            return Err(FsError::Corrupted);
        }

        let mut referenced: HashSet<u32> = HashSet::new();
        let mut claim = |disk: &RamDisk, blockno: u32| -> FsResult<()> {
            if blockno < sb.first_data_blk() || blockno >= sb.nblocks {
                warn!("fsck: pointer into the reserved region: {}", blockno);
                return Err(FsError::Corrupted);
            }
            if bitmap::is_free(disk, blockno)? {
                warn!("fsck: referenced block {} is marked free", blockno);
                return Err(FsError::Corrupted);
            }
            if !referenced.insert(blockno) {
                warn!("fsck: block {} has two owners", blockno);
                return Err(FsError::Corrupted);
            }
            Ok(())
        };

        let mut nlink_total: u64 = 0;
        let mut dirent_total: u64 = 0;

        for ino in 1..sb.ninodes {
            let i = read_inode(&disk, sb, ino)?;
            if !i.is_live() {
                continue;
            }
            nlink_total += i.nlink as u64;

            if let InodeExt::Blocks(p) = &i.ext {
                let nblks = size_to_blks(i.size);
                for b in 0..nblks {
                    let blockno = i
                        .blockno_at(&disk, b * BLK_SZ as u32)
                        .ok_or(FsError::Corrupted)?;
                    claim(&disk, blockno)?;
                }
                if nblks as usize > NDIRECT {
                    claim(&disk, p.indirect)?;
                }
                let ind_cap = (NDIRECT + NINDIRECT) as u32;
                if nblks > ind_cap {
                    claim(&disk, p.indirect2)?;
                    let inner_cnt = (nblks - ind_cap).div_ceil(NINDIRECT as u32);
                    for outer in 0..inner_cnt {
                        let ind = disk.read_slot(p.indirect2, outer as usize)?;
                        claim(&disk, ind)?;
                    }
                }
            }

            if i.tp == FileType::Dir {
                if i.size as usize % DIRENT_SZ != 0 {
                    warn!("fsck: directory {} has a ragged size {}", ino, i.size);
                    return Err(FsError::Corrupted);
                }
                let mut off = 0;
                while off < i.size as usize {
                    let de = dir::read_dirent(&disk, &i, off)?;
                    if de.ino != 0 {
                        dirent_total += 1;
                        if !read_inode(&disk, sb, de.ino)?.is_live() {
                            warn!("fsck: dirent at {}+{} names dead inode {}", ino, off, de.ino);
                            return Err(FsError::Corrupted);
                        }
                    }
                    off += DIRENT_SZ;
                }
            }
        }

        // every live link is a dirent, plus the root which has none
        if nlink_total != dirent_total + 1 {
            warn!(
                "fsck: {} links but {} dirents",
                nlink_total, dirent_total
            );
            return Err(FsError::Corrupted);
        }

        // the other direction: an in-use data block nobody references leaks
        for blockno in sb.first_data_blk()..sb.nblocks {
            if !bitmap::is_free(&disk, blockno)? && !referenced.contains(&blockno) {
                warn!("fsck: block {} is in use but unreferenced", blockno);
                return Err(FsError::Corrupted);
            }
        }

        Ok(())
    }
}

impl FileSystem for BlockFs {
    fn finfo(&self) -> FsResult<FsInfo> {
        let disk = self.disk.read();
        let mut files = 0;
        let mut ffree = 0;
        for ino in 1..self.sb.ninodes {
            if read_inode(&disk, &self.sb, ino)?.is_live() {
                files += 1;
            } else {
                ffree += 1;
            }
        }
        let bfree = bitmap::count_free(&disk, &self.sb)? as usize;
        Ok(FsInfo {
            magic: self.sb.magic,
            bsize: BLK_SZ,
            blocks: self.sb.nblocks as usize,
            bfree,
            bavail: bfree,
            files,
            ffree,
            namemax: MAX_NAME_LEN,
            frsize: BLK_SZ,
        })
    }

    fn iread(&self, iid: InodeID, offset: usize, to: &mut [u8]) -> FsResult<usize> {
        let disk = self.disk.read();
        let i = self.load_live(&disk, iid)?;
        match i.tp {
            FileType::Dir => Err(FsError::IsADirectory),
            FileType::Lnk => Err(FsError::NotPermitted),
            FileType::Reg => i.read_at(&disk, offset, to),
        }
    }

    fn iwrite(&self, iid: InodeID, offset: usize, from: &[u8], append: bool) -> FsResult<usize> {
        let mut disk = self.disk.write();
        let mut i = self.load_live(&disk, iid)?;
        match i.tp {
            FileType::Dir => return Err(FsError::IsADirectory),
            FileType::Lnk => return Err(FsError::NotPermitted),
            FileType::Reg => {}
        }
        let pos = if append { i.size as usize } else { offset };
        let written = i.write_at(&mut disk, &self.sb, pos, from)?;
        write_inode(&mut disk, &self.sb, &i)?;
        Ok(written)
    }

    fn get_meta(&self, iid: InodeID) -> FsResult<Metadata> {
        let disk = self.disk.read();
        let i = self.load_live(&disk, iid)?;
        Ok(Metadata {
            iid,
            size: i.size as u64,
            blocks: i.nblocks() as u64,
            ftype: i.tp,
            perm: i.perm,
            // the synthetic dot-dot entry counts as a link to a directory
            nlinks: i.nlink + (i.tp == FileType::Dir) as u32,
        })
    }

    fn set_meta(&self, iid: InodeID, set_md: SetMetadata) -> FsResult<()> {
        let mut disk = self.disk.write();
        let mut i = self.load_live(&disk, iid)?;
        match set_md {
            SetMetadata::Size(sz) => {
                // truncating a directory from outside is never legal
                if i.tp != FileType::Reg {
                    return Err(FsError::NotPermitted);
                }
                let want: u32 = sz.try_into().map_err(|_| FsError::NoSpace)?;
                change_size(&mut disk, &self.sb, &mut i, want)?;
            }
            SetMetadata::Permission(perm) => i.perm = perm,
        }
        write_inode(&mut disk, &self.sb, &i)
    }

    fn iread_link(&self, iid: InodeID) -> FsResult<String> {
        let disk = self.disk.read();
        let i = self.load_live(&disk, iid)?;
        match i.ext {
            InodeExt::Lnk(target) => Ok(target),
            _ => Err(FsError::NotPermitted),
        }
    }

    fn follow_link(&self, iid: InodeID, uid: u32) -> FsResult<String> {
        let target = self.iread_link(iid)?;
        Ok(symlink::resolve_target(&target, uid))
    }

    fn create(&self, parent: InodeID, name: &str, perm: FilePerm) -> FsResult<InodeID> {
        check_name(name)?;
        let mut disk = self.disk.write();
        let mut dir = self.load_dir(&disk, parent)?;
        if dir::find_dirent(&disk, &dir, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let ino = self.alloc_inode(&disk)?;
        let off = dir::blank_dirent(&mut disk, &self.sb, &mut dir)?;

        // the slot may have had a previous life; it starts over from zero
        clear_inode(&mut disk, &self.sb, ino)?;
        write_inode(&mut disk, &self.sb, &Inode::new_reg(ino, perm))?;
        dir::write_dirent(&mut disk, &self.sb, &mut dir, off, &DiskDirEntry::new(ino, name))?;
        write_inode(&mut disk, &self.sb, &dir)?;
        debug!("created {:?} as inode {}", name, ino);
        Ok(ino)
    }

    fn link(&self, parent: InodeID, name: &str, linkto: InodeID) -> FsResult<()> {
        check_name(name)?;
        let mut disk = self.disk.write();
        let mut target = self.load_live(&disk, linkto)?;

        // hard links to directories would make the tree a graph
        if target.tp == FileType::Dir {
            return Err(FsError::NotPermitted);
        }

        let mut dir = self.load_dir(&disk, parent)?;
        if dir::find_dirent(&disk, &dir, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let off = dir::blank_dirent(&mut disk, &self.sb, &mut dir)?;
        dir::write_dirent(
            &mut disk,
            &self.sb,
            &mut dir,
            off,
            &DiskDirEntry::new(linkto, name),
        )?;
        target.nlink += 1;
        write_inode(&mut disk, &self.sb, &target)?;
        write_inode(&mut disk, &self.sb, &dir)?;
        Ok(())
    }

    fn unlink(&self, parent: InodeID, name: &str) -> FsResult<()> {
        let mut disk = self.disk.write();
        let mut dir = self.load_dir(&disk, parent)?;
        let (off, ino) = dir::find_dirent(&disk, &dir, name)?.ok_or(FsError::NotFound)?;
        let mut target = self.load_live(&disk, ino)?;

        if target.tp == FileType::Dir {
            // only an empty directory may go
            let mut doff = 0;
            while doff < target.size as usize {
                if dir::read_dirent(&disk, &target, doff)?.ino != 0 {
                    return Err(FsError::NotPermitted);
                }
                doff += DIRENT_SZ;
            }
        }

        dir::tombstone_dirent(&mut disk, &self.sb, &mut dir, off)?;
        write_inode(&mut disk, &self.sb, &dir)?;

        target.nlink -= 1;
        if target.nlink == 0 {
            // last link gone: give back every block, then the slot itself
            if let InodeExt::Blocks(_) = target.ext {
                change_size(&mut disk, &self.sb, &mut target, 0)?;
            }
            clear_inode(&mut disk, &self.sb, ino)?;
            debug!("released inode {}", ino);
        } else {
            write_inode(&mut disk, &self.sb, &target)?;
        }
        Ok(())
    }

    fn symlink(&self, parent: InodeID, name: &str, to: &str) -> FsResult<InodeID> {
        check_name(name)?;
        symlink::check_target(to)?;
        let mut disk = self.disk.write();
        let mut dir = self.load_dir(&disk, parent)?;
        if dir::find_dirent(&disk, &dir, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let ino = self.alloc_inode(&disk)?;
        let off = dir::blank_dirent(&mut disk, &self.sb, &mut dir)?;

        clear_inode(&mut disk, &self.sb, ino)?;
        write_inode(&mut disk, &self.sb, &Inode::new_symlink(ino, to))?;
        dir::write_dirent(&mut disk, &self.sb, &mut dir, off, &DiskDirEntry::new(ino, name))?;
        write_inode(&mut disk, &self.sb, &dir)?;
        Ok(ino)
    }

    fn lookup(&self, iid: InodeID, name: &str) -> FsResult<Option<InodeID>> {
        check_name(name)?;
        let disk = self.disk.read();
        let dir = self.load_dir(&disk, iid)?;
        Ok(dir::find_dirent(&disk, &dir, name)?.map(|(_, ino)| ino))
    }

    fn next_entry(
        &self,
        iid: InodeID,
        pos: usize,
    ) -> FsResult<Option<(usize, InodeID, String, FileType)>> {
        let disk = self.disk.read();
        let dir = self.load_dir(&disk, iid)?;

        if pos == 0 {
            return Ok(Some((1, iid, ".".to_string(), FileType::Dir)));
        }
        if pos == 1 {
            let parent = self.parent_of(&disk, iid)?;
            return Ok(Some((2, parent, "..".to_string(), FileType::Dir)));
        }

        // positions from 2 on are dirent indices, not byte offsets
        let mut pos = pos;
        loop {
            let off = (pos - 2) * DIRENT_SZ;
            if off >= dir.size as usize {
                return Ok(None);
            }
            let de = dir::read_dirent(&disk, &dir, off)?;
            pos += 1;
            if de.ino == 0 {
                continue;
            }
            let name = String::from_utf8_lossy(de.name_bytes()).into_owned();
            let tp = read_inode(&disk, &self.sb, de.ino)?.tp;
            return Ok(Some((pos, de.ino, name, tp)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> BlockFs {
        BlockFs::format(512, 128).unwrap()
    }

    fn list_names(fs: &BlockFs, iid: InodeID) -> Vec<String> {
        let mut names = Vec::new();
        let mut pos = 0;
        while let Some((next, _, name, _)) = fs.next_entry(iid, pos).unwrap() {
            names.push(name);
            pos = next;
        }
        names
    }

    #[test]
    fn written_bytes_read_back_identically() {
        let fs = fixture();
        let f = fs.create(ROOT_INO, "data", FilePerm::from_mode(0o644)).unwrap();

        let payload: Vec<u8> = (0..40_000u32).map(|i| (i * 7 % 256) as u8).collect();
        assert_eq!(fs.iwrite(f, 0, &payload, false).unwrap(), payload.len());

        let mut back = vec![0u8; payload.len()];
        assert_eq!(fs.iread(f, 0, &mut back).unwrap(), payload.len());
        assert_eq!(back, payload);
        fs.fsck().unwrap();
    }

    #[test]
    fn append_lands_at_end_of_file_regardless_of_offset() {
        let fs = fixture();
        let f = fs.create(ROOT_INO, "log", FilePerm::from_mode(0o644)).unwrap();
        fs.iwrite(f, 0, &[0xAAu8; 100], false).unwrap();

        // offset 0 plus the append flag still writes at byte 100
        fs.iwrite(f, 0, &[0xBBu8; 50], true).unwrap();
        let meta = fs.get_meta(f).unwrap();
        assert_eq!(meta.size, 150);

        let mut back = vec![0u8; 150];
        fs.iread(f, 0, &mut back).unwrap();
        assert!(back[..100].iter().all(|&b| b == 0xAA));
        assert!(back[100..].iter().all(|&b| b == 0xBB));
        fs.fsck().unwrap();
    }

    #[test]
    fn create_then_unlink_returns_every_block() {
        let fs = fixture();
        let free0 = fs.finfo().unwrap().bfree;

        let f = fs.create(ROOT_INO, "victim", FilePerm::from_mode(0o644)).unwrap();
        fs.iwrite(f, 0, &vec![7u8; 20 * BLK_SZ], false).unwrap();
        assert!(fs.finfo().unwrap().bfree < free0);

        fs.unlink(ROOT_INO, "victim").unwrap();
        assert_eq!(fs.finfo().unwrap().bfree, free0);
        assert_eq!(fs.lookup(ROOT_INO, "victim").unwrap(), None);
        fs.fsck().unwrap();
    }

    #[test]
    fn a_hundred_files_and_tombstone_reuse() {
        let fs = fixture();
        let mut inos = HashSet::new();
        for i in 0..100 {
            let ino = fs
                .create(ROOT_INO, &format!("f{:03}", i), FilePerm::from_mode(0o644))
                .unwrap();
            assert!(inos.insert(ino), "inode {} handed out twice", ino);
        }
        assert_eq!(list_names(&fs, ROOT_INO).len(), 102); // . and ..

        for i in (0..100).step_by(2) {
            fs.unlink(ROOT_INO, &format!("f{:03}", i)).unwrap();
        }
        let names = list_names(&fs, ROOT_INO);
        assert_eq!(names.len(), 52);
        assert!(names.contains(&"f001".to_string()));
        assert!(!names.contains(&"f000".to_string()));

        // a new file reuses the first tombstone instead of growing the dir
        let size_before = fs.get_meta(ROOT_INO).unwrap().size;
        fs.create(ROOT_INO, "reuse", FilePerm::from_mode(0o644)).unwrap();
        assert_eq!(fs.get_meta(ROOT_INO).unwrap().size, size_before);
        let names = list_names(&fs, ROOT_INO);
        assert_eq!(names[2], "reuse"); // first slot after . and ..
        fs.fsck().unwrap();
    }

    #[test]
    fn conditional_symlinks_resolve_by_uid() {
        let fs = fixture();
        let cond = fs.symlink(ROOT_INO, "cond", "root?/a:/b").unwrap();
        let plain = fs.symlink(ROOT_INO, "plain", "/plain").unwrap();

        assert_eq!(fs.follow_link(cond, 0).unwrap(), "/a");
        assert_eq!(fs.follow_link(cond, 1000).unwrap(), "/b");
        assert_eq!(fs.follow_link(plain, 0).unwrap(), "/plain");
        assert_eq!(fs.follow_link(plain, 1000).unwrap(), "/plain");

        // readlink reports the stored target raw, sized to its byte length
        assert_eq!(fs.iread_link(cond).unwrap(), "root?/a:/b");
        assert_eq!(fs.get_meta(cond).unwrap().size, 10);
        fs.fsck().unwrap();
    }

    #[test]
    fn growth_past_the_disk_is_invisible() {
        let fs = BlockFs::format(64, 16).unwrap();
        let f = fs.create(ROOT_INO, "big", FilePerm::from_mode(0o644)).unwrap();
        fs.iwrite(f, 0, &vec![1u8; 4 * BLK_SZ], false).unwrap();

        let free_before = fs.finfo().unwrap().bfree;
        let err = fs.iwrite(f, 0, &vec![2u8; 200 * BLK_SZ], false);
        assert_eq!(err.err(), Some(FsError::NoSpace));
        assert_eq!(fs.get_meta(f).unwrap().size, 4 * BLK_SZ as u64);
        assert_eq!(fs.finfo().unwrap().bfree, free_before);

        // the original contents survived the failed write
        let mut back = vec![0u8; BLK_SZ];
        fs.iread(f, 0, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 1));
        fs.fsck().unwrap();
    }

    #[test]
    fn hard_links_share_an_inode_until_the_last_goes() {
        let fs = fixture();
        let f = fs.create(ROOT_INO, "orig", FilePerm::from_mode(0o644)).unwrap();
        fs.iwrite(f, 0, b"shared", false).unwrap();

        fs.link(ROOT_INO, "alias", f).unwrap();
        assert_eq!(fs.lookup(ROOT_INO, "alias").unwrap(), Some(f));
        assert_eq!(fs.get_meta(f).unwrap().nlinks, 2);
        assert_eq!(
            fs.link(ROOT_INO, "alias", f).err(),
            Some(FsError::AlreadyExists)
        );

        fs.unlink(ROOT_INO, "orig").unwrap();
        let mut back = [0u8; 6];
        fs.iread(f, 0, &mut back).unwrap();
        assert_eq!(&back, b"shared");

        fs.unlink(ROOT_INO, "alias").unwrap();
        assert_eq!(fs.iread(f, 0, &mut back).err(), Some(FsError::NotFound));
        fs.fsck().unwrap();
    }

    #[test]
    fn readdir_emits_dot_entries_then_slots() {
        let fs = fixture();
        fs.create(ROOT_INO, "a", FilePerm::from_mode(0o644)).unwrap();
        fs.symlink(ROOT_INO, "l", "/t").unwrap();

        let (p1, ino, name, tp) = fs.next_entry(ROOT_INO, 0).unwrap().unwrap();
        assert_eq!((p1, ino, name.as_str(), tp), (1, ROOT_INO, ".", FileType::Dir));
        let (p2, ino, name, _) = fs.next_entry(ROOT_INO, p1).unwrap().unwrap();
        assert_eq!((p2, ino, name.as_str()), (2, ROOT_INO, ".."));

        let (p3, _, name, tp) = fs.next_entry(ROOT_INO, p2).unwrap().unwrap();
        assert_eq!((name.as_str(), tp), ("a", FileType::Reg));
        let (_, _, name, tp) = fs.next_entry(ROOT_INO, p3).unwrap().unwrap();
        assert_eq!((name.as_str(), tp), ("l", FileType::Lnk));

        // tombstones advance the position without being emitted
        fs.unlink(ROOT_INO, "a").unwrap();
        let (p, _, name, _) = fs.next_entry(ROOT_INO, 2).unwrap().unwrap();
        assert_eq!((p, name.as_str()), (4, "l"));
        assert_eq!(fs.next_entry(ROOT_INO, p).unwrap(), None);
    }

    #[test]
    fn name_limits_apply_everywhere() {
        let fs = fixture();
        let long = "n".repeat(MAX_NAME_LEN + 1);
        let perm = FilePerm::from_mode(0o644);
        assert_eq!(fs.create(ROOT_INO, &long, perm).err(), Some(FsError::NameTooLong));
        assert_eq!(fs.lookup(ROOT_INO, &long).err(), Some(FsError::NameTooLong));
        assert_eq!(
            fs.symlink(ROOT_INO, "s", &"t".repeat(MAX_SYMLINK_LEN + 1)).err(),
            Some(FsError::NameTooLong)
        );

        let ok = "n".repeat(MAX_NAME_LEN);
        fs.create(ROOT_INO, &ok, perm).unwrap();
        assert!(fs.lookup(ROOT_INO, &ok).unwrap().is_some());
        fs.fsck().unwrap();
    }

    #[test]
    fn truncate_is_for_regular_files_only() {
        let fs = fixture();
        assert_eq!(
            fs.set_meta(ROOT_INO, SetMetadata::Size(0)).err(),
            Some(FsError::NotPermitted)
        );

        let f = fs.create(ROOT_INO, "t", FilePerm::from_mode(0o644)).unwrap();
        fs.iwrite(f, 0, &vec![9u8; 5000], false).unwrap();
        fs.set_meta(f, SetMetadata::Size(100)).unwrap();
        assert_eq!(fs.get_meta(f).unwrap().size, 100);
        assert_eq!(fs.get_meta(f).unwrap().blocks, 1);
        fs.fsck().unwrap();
    }

    #[test]
    fn journal_replay_is_read_only() {
        let _ = env_logger::builder().is_test(true).try_init();
        let fs = fixture();
        // first create lands on the journal's conventional slot
        let j = fs.create(ROOT_INO, ".journal", FilePerm::from_mode(0o600)).unwrap();
        assert_eq!(j, JOURNAL_INO);
        fs.iwrite(j, 0, b"op=create name=x\nop=unlink name=x\n", false).unwrap();

        let free_before = fs.finfo().unwrap().bfree;
        fs.replay_journal();
        assert_eq!(fs.finfo().unwrap().bfree, free_before);
        assert_eq!(fs.get_meta(j).unwrap().size, 34);
        fs.fsck().unwrap();
    }
}
