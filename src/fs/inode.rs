use crate::*;
use super::bitmap;
use super::disk::*;
use super::superblock::SuperBlock;
use crate::storage::RamDisk;
use crate::vfs::{FilePerm, FileType, InodeID, PERM_MASK};
use core::mem::size_of;

/// The pointer tree rooted at a regular or directory inode. Every field is
/// an owned block number; 0 means "no block".
#[derive(Clone, Default)]
pub struct BlockPtrs {
    pub direct: [u32; NDIRECT],
    pub indirect: u32,
    pub indirect2: u32,
}

/// Regular files and directories address data through the pointer tree;
/// symlinks keep their target inline and own no blocks at all.
pub enum InodeExt {
    Blocks(BlockPtrs),
    Lnk(String),
}

pub struct Inode {
    pub ino: InodeID,
    pub tp: FileType,
    pub nlink: u32,
    pub perm: FilePerm,
    pub size: u32,
    pub ext: InodeExt,
}

pub fn size_to_blks(size: u32) -> u32 {
    size.div_ceil(BLK_SZ as u32)
}

/// Where file block `b` lives in the pointer tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockPath {
    Direct(usize),
    /// Slot in the inode's single indirect block.
    Indirect(usize),
    /// `outer` slot of the doubly-indirect block names an indirect block
    /// whose `inner` slot is the data block.
    Indirect2 { outer: usize, inner: usize },
}

pub(crate) fn block_path(b: u32) -> FsResult<BlockPath> {
    let b = b as usize;
    if b < NDIRECT {
        Ok(BlockPath::Direct(b))
    } else if b < NDIRECT + NINDIRECT {
        Ok(BlockPath::Indirect(b - NDIRECT))
    } else if b < MAX_FILE_BLKS as usize {
        let off = b - NDIRECT - NINDIRECT;
        Ok(BlockPath::Indirect2 {
            outer: off / NINDIRECT,
            inner: off % NINDIRECT,
        })
    } else {
        Err(FsError::NoSpace)
    }
}

impl Inode {
    pub fn new_reg(ino: InodeID, perm: FilePerm) -> Self {
        Self {
            ino,
            tp: FileType::Reg,
            nlink: 1,
            perm,
            size: 0,
            ext: InodeExt::Blocks(BlockPtrs::default()),
        }
    }

    pub fn new_dir(ino: InodeID, perm: FilePerm) -> Self {
        Self {
            ino,
            tp: FileType::Dir,
            nlink: 1,
            perm,
            size: 0,
            ext: InodeExt::Blocks(BlockPtrs::default()),
        }
    }

    pub fn new_symlink(ino: InodeID, target: &str) -> Self {
        debug_assert!(target.len() <= MAX_SYMLINK_LEN);
        Self {
            ino,
            tp: FileType::Lnk,
            nlink: 1,
            // symlink permissions are always 0777, they are not consulted
            perm: FilePerm::from_bits_truncate(PERM_MASK),
            size: target.len() as u32,
            ext: InodeExt::Lnk(target.to_string()),
        }
    }

    pub fn is_live(&self) -> bool {
        self.nlink > 0
    }

    pub fn nblocks(&self) -> u32 {
        match self.ext {
            InodeExt::Blocks(_) => size_to_blks(self.size),
            InodeExt::Lnk(_) => 0,
        }
    }

    /// Physical block holding the `offset`th byte, or None when the offset
    /// is past end-of-file or the inode keeps no blocks (symlink). A None
    /// inside the file's extent means the pointer tree is damaged.
    pub fn blockno_at(&self, disk: &RamDisk, offset: u32) -> Option<u32> {
        let ptrs = match &self.ext {
            InodeExt::Blocks(p) => p,
            InodeExt::Lnk(_) => return None,
        };
        if offset >= self.size {
            return None;
        }
        let blockno = match block_path(offset / BLK_SZ as u32).ok()? {
            BlockPath::Direct(i) => ptrs.direct[i],
            BlockPath::Indirect(i) => {
                if ptrs.indirect == 0 {
                    0
                } else {
                    disk.read_slot(ptrs.indirect, i).ok()?
                }
            }
            BlockPath::Indirect2 { outer, inner } => {
                if ptrs.indirect2 == 0 {
                    return None;
                }
                let ind = disk.read_slot(ptrs.indirect2, outer).ok()?;
                if ind == 0 {
                    0
                } else {
                    disk.read_slot(ind, inner).ok()?
                }
            }
        };
        if blockno == 0 {
            None
        } else {
            Some(blockno)
        }
    }

    /// Read into `buf`, clamped so the copy never runs past end-of-file.
    pub fn read_at(&self, disk: &RamDisk, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        if let InodeExt::Lnk(_) = self.ext {
            return Err(FsError::NotPermitted);
        }
        let size = self.size as usize;
        if offset >= size {
            return Ok(0);
        }
        let count = buf.len().min(size - offset);

        let mut done = 0;
        let mut pos = offset;
        while done < count {
            let blockno = self
                .blockno_at(disk, pos as u32)
                .ok_or(FsError::Corrupted)?;
            let in_blk = pos % BLK_SZ;
            let n = (BLK_SZ - in_blk).min(count - done);
            let blk = disk.block(blockno)?;
            buf[done..done + n].copy_from_slice(&blk[in_blk..in_blk + n]);
            done += n;
            pos += n;
        }
        Ok(count)
    }

    /// Write `buf` at `offset`, growing the file when the write runs past
    /// the current end. Propagates the growth failure untouched.
    pub fn write_at(
        &mut self,
        disk: &mut RamDisk,
        sb: &SuperBlock,
        offset: usize,
        buf: &[u8],
    ) -> FsResult<usize> {
        if let InodeExt::Lnk(_) = self.ext {
            return Err(FsError::NotPermitted);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset.checked_add(buf.len()).ok_or(FsError::NoSpace)?;
        if end > self.size as usize {
            let want: u32 = end.try_into().map_err(|_| FsError::NoSpace)?;
            change_size(disk, sb, self, want)?;
        }

        let mut done = 0;
        let mut pos = offset;
        while done < buf.len() {
            let blockno = self
                .blockno_at(disk, pos as u32)
                .ok_or(FsError::Corrupted)?;
            let in_blk = pos % BLK_SZ;
            let n = (BLK_SZ - in_blk).min(buf.len() - done);
            let blk = disk.block_mut(blockno)?;
            blk[in_blk..in_blk + n].copy_from_slice(&buf[done..done + n]);
            done += n;
            pos += n;
        }
        Ok(buf.len())
    }
}

/// Append one data block to the file, allocating a fresh indirect or
/// doubly-indirect block when the new index crosses a tier boundary. All
/// needed blocks are claimed up front; on exhaustion every block claimed by
/// this call is returned before the error surfaces, so the inode and the
/// freemap are exactly as they were.
pub(crate) fn add_block(disk: &mut RamDisk, sb: &SuperBlock, inode: &mut Inode) -> FsResult<()> {
    let n = size_to_blks(inode.size);
    if n >= MAX_FILE_BLKS {
        return Err(FsError::NoSpace);
    }
    let path = block_path(n)?;
    let ptrs = match &mut inode.ext {
        InodeExt::Blocks(p) => p,
        InodeExt::Lnk(_) => return Err(FsError::NotPermitted),
    };

    // data block, plus a new indirect chain prefix when `n` is the first
    // occupant of its indirect (and possibly doubly-indirect) block
    let needed: usize = match path {
        BlockPath::Direct(_) => 1,
        BlockPath::Indirect(i) => {
            if i == 0 {
                2
            } else {
                1
            }
        }
        BlockPath::Indirect2 { outer: 0, inner: 0 } => 3,
        BlockPath::Indirect2 { inner: 0, .. } => 2,
        BlockPath::Indirect2 { .. } => 1,
    };

    let mut got = [0u32; 3];
    for i in 0..needed {
        match bitmap::alloc_block(disk, sb) {
            Ok(b) => got[i] = b,
            Err(e) => {
                for claimed in got[..i].iter().rev() {
                    bitmap::free_block(disk, sb, *claimed)?;
                }
                return Err(e);
            }
        }
    }
    for claimed in &got[..needed] {
        disk.zero_block(*claimed)?;
    }

    // link child before parent so a reader never sees a dangling slot
    let data = got[0];
    match path {
        BlockPath::Direct(i) => ptrs.direct[i] = data,
        BlockPath::Indirect(i) => {
            if needed == 2 {
                ptrs.indirect = got[1];
            }
            if ptrs.indirect == 0 {
                return Err(FsError::Corrupted);
            }
            disk.write_slot(ptrs.indirect, i, data)?;
        }
        BlockPath::Indirect2 { outer, inner } => match needed {
            3 => {
                disk.write_slot(got[1], 0, data)?;
                disk.write_slot(got[2], 0, got[1])?;
                ptrs.indirect2 = got[2];
            }
            2 => {
                if ptrs.indirect2 == 0 {
                    return Err(FsError::Corrupted);
                }
                disk.write_slot(got[1], inner, data)?;
                disk.write_slot(ptrs.indirect2, outer, got[1])?;
            }
            _ => {
                if ptrs.indirect2 == 0 {
                    return Err(FsError::Corrupted);
                }
                let ind = disk.read_slot(ptrs.indirect2, outer)?;
                if ind == 0 {
                    return Err(FsError::Corrupted);
                }
                disk.write_slot(ind, inner, data)?;
            }
        },
    }

    inode.size += BLK_SZ as u32;
    Ok(())
}

/// Remove the last data block, releasing the indirect and doubly-indirect
/// blocks whose last occupant it was and clearing every referring slot.
pub(crate) fn remove_block(disk: &mut RamDisk, sb: &SuperBlock, inode: &mut Inode) -> FsResult<()> {
    let n = size_to_blks(inode.size);
    if n == 0 {
        return Err(FsError::Corrupted);
    }
    let path = block_path(n - 1)?;
    let ptrs = match &mut inode.ext {
        InodeExt::Blocks(p) => p,
        InodeExt::Lnk(_) => return Err(FsError::NotPermitted),
    };

    match path {
        BlockPath::Direct(i) => {
            if ptrs.direct[i] == 0 {
                return Err(FsError::Corrupted);
            }
            bitmap::free_block(disk, sb, ptrs.direct[i])?;
            ptrs.direct[i] = 0;
        }
        BlockPath::Indirect(i) => {
            if ptrs.indirect == 0 {
                return Err(FsError::Corrupted);
            }
            let data = disk.read_slot(ptrs.indirect, i)?;
            if data == 0 {
                return Err(FsError::Corrupted);
            }
            bitmap::free_block(disk, sb, data)?;
            disk.write_slot(ptrs.indirect, i, 0)?;
            if i == 0 {
                // the removed block was the indirect block's last occupant
                bitmap::free_block(disk, sb, ptrs.indirect)?;
                ptrs.indirect = 0;
            }
        }
        BlockPath::Indirect2 { outer, inner } => {
            if ptrs.indirect2 == 0 {
                return Err(FsError::Corrupted);
            }
            let ind = disk.read_slot(ptrs.indirect2, outer)?;
            if ind == 0 {
                return Err(FsError::Corrupted);
            }
            let data = disk.read_slot(ind, inner)?;
            if data == 0 {
                return Err(FsError::Corrupted);
            }
            bitmap::free_block(disk, sb, data)?;
            disk.write_slot(ind, inner, 0)?;
            if inner == 0 {
                bitmap::free_block(disk, sb, ind)?;
                disk.write_slot(ptrs.indirect2, outer, 0)?;
                if outer == 0 {
                    bitmap::free_block(disk, sb, ptrs.indirect2)?;
                    ptrs.indirect2 = 0;
                }
            }
        }
    }

    inode.size = inode.size.saturating_sub(BLK_SZ as u32);
    Ok(())
}

/// Resize to exactly `want` bytes, one block at a time. When growth hits
/// the end of the disk, the file is shrunk back to its original size before
/// the error is returned: a failed resize is invisible.
pub(crate) fn change_size(
    disk: &mut RamDisk,
    sb: &SuperBlock,
    inode: &mut Inode,
    want: u32,
) -> FsResult<()> {
    if let InodeExt::Lnk(_) = inode.ext {
        return Err(FsError::NotPermitted);
    }
    let orig = inode.size;
    while size_to_blks(inode.size) < size_to_blks(want) {
        if let Err(e) = add_block(disk, sb, inode) {
            while size_to_blks(inode.size) > size_to_blks(orig) {
                remove_block(disk, sb, inode)?;
            }
            inode.size = orig;
            return Err(e);
        }
    }
    while size_to_blks(inode.size) > size_to_blks(want) {
        remove_block(disk, sb, inode)?;
    }
    inode.size = want;
    Ok(())
}

pub fn read_inode(disk: &RamDisk, sb: &SuperBlock, ino: InodeID) -> FsResult<Inode> {
    let (blk, off) = sb.inode_pos(ino)?;
    let mut header = DInode::default();
    disk.read_bytes(blk, off, header.as_mut())?;
    let tp = FileType::from_raw(header.ftype)?;

    if tp == FileType::Lnk {
        let mut dl = DSymlinkInode::default();
        disk.read_bytes(blk, off, dl.as_mut())?;
        let len = dl.size as usize;
        if len > MAX_SYMLINK_LEN {
            return Err(FsError::Corrupted);
        }
        let target = core::str::from_utf8(&dl.target[..len])
            .map_err(|_| FsError::Corrupted)?
            .to_string();
        Ok(Inode {
            ino,
            tp,
            nlink: dl.nlink,
            perm: FilePerm::from_bits_truncate(PERM_MASK),
            size: dl.size,
            ext: InodeExt::Lnk(target),
        })
    } else {
        Ok(Inode {
            ino,
            tp,
            nlink: header.nlink,
            perm: FilePerm::from_mode(header.mode),
            size: header.size,
            ext: InodeExt::Blocks(BlockPtrs {
                direct: header.direct,
                indirect: header.indirect,
                indirect2: header.indirect2,
            }),
        })
    }
}

pub fn write_inode(disk: &mut RamDisk, sb: &SuperBlock, inode: &Inode) -> FsResult<()> {
    let (blk, off) = sb.inode_pos(inode.ino)?;
    let mut slot = ZERO_INODE;
    match &inode.ext {
        InodeExt::Blocks(p) => {
            let di = DInode {
                size: inode.size,
                ftype: inode.tp.into(),
                nlink: inode.nlink,
                mode: inode.perm.bits() as u32,
                direct: p.direct,
                indirect: p.indirect,
                indirect2: p.indirect2,
            };
            slot[..size_of::<DInode>()].copy_from_slice(di.as_ref());
        }
        InodeExt::Lnk(target) => {
            let mut dl = DSymlinkInode {
                size: inode.size,
                nlink: inode.nlink,
                ..Default::default()
            };
            dl.target[..target.len()].copy_from_slice(target.as_bytes());
            slot[..size_of::<DSymlinkInode>()].copy_from_slice(dl.as_ref());
        }
    }
    disk.write_bytes(blk, off, &slot)
}

/// Zero an inode slot. A freed inode must carry nothing over into its next
/// life: no stale pointers, no stale size.
pub fn clear_inode(disk: &mut RamDisk, sb: &SuperBlock, ino: InodeID) -> FsResult<()> {
    let (blk, off) = sb.inode_pos(ino)?;
    disk.write_bytes(blk, off, &ZERO_INODE)
}
