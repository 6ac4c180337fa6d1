use crate::*;
use bitflags::bitflags;

/// On-disk inode number. The adapter narrows the host's 64-bit ino to this.
pub type InodeID = u32;

#[derive(Debug, Default)]
pub struct FsInfo {
    /// File system type
    pub magic: u32,
    /// File system block size
    pub bsize: usize,
    /// Total number of blocks on the file system
    pub blocks: usize,
    /// Total number of free blocks
    pub bfree: usize,
    /// Number of free blocks available to non-privileged process
    pub bavail: usize,
    /// Total number of live inodes
    pub files: usize,
    /// Total number of free inode slots
    pub ffree: usize,
    /// Maximum filename length
    pub namemax: usize,
    /// Fundamental file system block size
    pub frsize: usize,
}

/// The boundary between the host adapter and the filesystem core. The host
/// serializes entry; implementations hold no long-lived locks across calls.
pub trait FileSystem: Sync + Send {
    /// init fs
    fn init(&self) -> FsResult<()> {
        Ok(())
    }

    /// destroy this fs, called once all workloads are finished
    fn destroy(&self) -> FsResult<()> {
        Ok(())
    }

    /// get fs stat info in superblock
    fn finfo(&self) -> FsResult<FsInfo> {
        Err(FsError::NotSupported)
    }

    /// read content of inode
    fn iread(&self, _iid: InodeID, _offset: usize, _to: &mut [u8]) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    /// write content of inode, growing it when the write runs past the end;
    /// `append` positions the write at end-of-file first
    fn iwrite(&self, _iid: InodeID, _offset: usize, _from: &[u8], _append: bool) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    /// get metadata of inode
    fn get_meta(&self, _iid: InodeID) -> FsResult<Metadata> {
        Err(FsError::NotSupported)
    }

    /// set metadata of inode
    fn set_meta(&self, _iid: InodeID, _set_md: SetMetadata) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    /// read the raw stored target, only if inode is a symlink
    fn iread_link(&self, _iid: InodeID) -> FsResult<String> {
        Err(FsError::NotSupported)
    }

    /// resolve the stored target for the calling identity; the returned
    /// string is a fresh owned buffer
    fn follow_link(&self, _iid: InodeID, _uid: u32) -> FsResult<String> {
        Err(FsError::NotSupported)
    }

    /// create a regular file
    fn create(&self, _parent: InodeID, _name: &str, _perm: FilePerm) -> FsResult<InodeID> {
        Err(FsError::NotSupported)
    }

    /// create hard link
    fn link(&self, _parent: InodeID, _name: &str, _linkto: InodeID) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    /// remove a link to inode
    fn unlink(&self, _parent: InodeID, _name: &str) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    /// create symlink
    fn symlink(&self, _parent: InodeID, _name: &str, _to: &str) -> FsResult<InodeID> {
        Err(FsError::NotSupported)
    }

    /// lookup name in inode only if inode is a dir
    fn lookup(&self, _iid: InodeID, _name: &str) -> FsResult<Option<InodeID>> {
        Err(FsError::NotSupported)
    }

    /// Next directory entry at directory position `pos`. Positions 0 and 1
    /// are the synthetic `.` and `..`; position n >= 2 names the dirent slot
    /// n - 2. Returns `(next_pos, ino, name, ftype)` with `next_pos` the
    /// position to resume from, or None at end of directory.
    fn next_entry(
        &self,
        _iid: InodeID,
        _pos: usize,
    ) -> FsResult<Option<(usize, InodeID, String, FileType)>> {
        Err(FsError::NotSupported)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum FileType {
    #[default] Reg,
    Dir,
    Lnk,
}

impl FileType {
    pub fn from_raw(value: u32) -> FsResult<Self> {
        match value {
            0 => Ok(FileType::Reg),
            1 => Ok(FileType::Dir),
            2 => Ok(FileType::Lnk),
            _ => Err(FsError::Corrupted),
        }
    }
}

impl Into<u32> for FileType {
    fn into(self) -> u32 {
        match self {
            FileType::Reg => 0,
            FileType::Dir => 1,
            FileType::Lnk => 2,
        }
    }
}

#[cfg(feature = "fuse")]
impl Into<fuser::FileType> for FileType {
    fn into(self) -> fuser::FileType {
        match self {
            FileType::Reg => fuser::FileType::RegularFile,
            FileType::Dir => fuser::FileType::Directory,
            FileType::Lnk => fuser::FileType::Symlink,
        }
    }
}

bitflags! {
    #[derive(Debug, Eq, PartialEq, Clone, Copy)]
    pub struct FilePerm: u16 {
        const U_R = 0o0400;
        const U_W = 0o0200;
        const U_X = 0o0100;
        const G_R = 0o0040;
        const G_W = 0o0020;
        const G_X = 0o0010;
        const O_R = 0o0004;
        const O_W = 0o0002;
        const O_X = 0o0001;
    }
}

pub const PERM_MASK: u16 = 0o0777;

impl FilePerm {
    /// Permission bits of a raw mode word, dropping anything else.
    pub fn from_mode(mode: u32) -> Self {
        FilePerm::from_bits_truncate(mode as u16 & PERM_MASK)
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Metadata {
    /// Inode number
    pub iid: InodeID,
    /// Size in bytes
    pub size: u64,
    /// Size in blocks
    pub blocks: u64,
    /// Type of file
    pub ftype: FileType,
    /// Permission
    pub perm: FilePerm,
    /// Number of hard links
    pub nlinks: u32,
}

#[cfg(feature = "fuse")]
impl Into<fuser::FileAttr> for Metadata {
    fn into(self) -> fuser::FileAttr {
        // Everything looks owned by root and touched just now: the on-disk
        // format tracks neither owners nor timestamps.
        let now = std::time::SystemTime::now();
        fuser::FileAttr {
            ino: self.iid as u64,
            size: self.size,
            blocks: self.blocks,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind: self.ftype.into(),
            perm: self.perm.bits(),
            nlink: self.nlinks,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: BLK_SZ as u32,
            flags: 0,
        }
    }
}

#[derive(Clone)]
pub enum SetMetadata {
    Size(usize),
    Permission(FilePerm),
}
