use fuser::*;
use libc::c_int;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::SystemTime;

use blockfs::fs::BlockFs;
use blockfs::storage::RamDisk;
use blockfs::vfs::{self, FilePerm, InodeID, SetMetadata};
use blockfs::*;

/// Geometry of a freshly formatted image: 8 MiB, 1024 files.
const DEFAULT_NBLOCKS: u32 = 8192;
const DEFAULT_NINODES: u32 = 1024;

const DEFAULT_TTL: std::time::Duration = std::time::Duration::new(1, 0);

struct BlockFsHost {
    fs: Box<dyn vfs::FileSystem>,
}

macro_rules! fuse_try {
    ($res:expr, $reply:expr) => {
        match $res {
            Ok(v) => v,
            Err(e) => {
                $reply.error(e.into());
                return;
            }
        }
    };
}

fn ino32(ino: u64) -> FsResult<InodeID> {
    ino.try_into().map_err(|_| FsError::NotFound)
}

fn name_str(name: &OsStr) -> Option<&str> {
    name.to_str()
}

impl Filesystem for BlockFsHost {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        self.fs.init().map_err(|e| e.into())
    }

    fn destroy(&mut self) {
        self.fs.destroy().unwrap();
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let parent = fuse_try!(ino32(parent), reply);
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        if let Some(iid) = fuse_try!(self.fs.lookup(parent, name), reply) {
            let meta = fuse_try!(self.fs.get_meta(iid), reply);
            reply.entry(&DEFAULT_TTL, &meta.into(), 0);
        } else {
            debug!("lookup of {:?} found nothing", name);
            reply.error(FsError::NotFound.into());
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let iid = fuse_try!(ino32(ino), reply);
        let meta = fuse_try!(self.fs.get_meta(iid), reply);
        reply.attr(&DEFAULT_TTL, &meta.into());
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let iid = fuse_try!(ino32(ino), reply);
        // only size and permission changes reach the disk format;
        // ownership and timestamps have nowhere to live
        if let Some(size) = size {
            fuse_try!(
                self.fs.set_meta(iid, SetMetadata::Size(size as usize)),
                reply
            );
        }
        if let Some(mode) = mode {
            fuse_try!(
                self.fs
                    .set_meta(iid, SetMetadata::Permission(FilePerm::from_mode(mode))),
                reply
            );
        }
        let meta = fuse_try!(self.fs.get_meta(iid), reply);
        reply.attr(&DEFAULT_TTL, &meta.into());
    }

    fn readlink(&mut self, req: &Request<'_>, ino: u64, reply: ReplyData) {
        let iid = fuse_try!(ino32(ino), reply);
        // conditional targets resolve against the caller's identity
        let path = fuse_try!(self.fs.follow_link(iid, req.uid()), reply);
        reply.data(path.as_bytes());
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let parent = fuse_try!(ino32(parent), reply);
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        fuse_try!(self.fs.unlink(parent, name), reply);
        reply.ok();
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let parent = fuse_try!(ino32(parent), reply);
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        fuse_try!(self.fs.unlink(parent, name), reply);
        reply.ok();
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let parent = fuse_try!(ino32(parent), reply);
        let (Some(name), Some(target)) = (name_str(link_name), target.to_str()) else {
            reply.error(libc::EINVAL);
            return;
        };
        let iid = fuse_try!(self.fs.symlink(parent, name, target), reply);
        let meta = fuse_try!(self.fs.get_meta(iid), reply);
        reply.entry(&DEFAULT_TTL, &meta.into(), 0);
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let iid = fuse_try!(ino32(ino), reply);
        let parent = fuse_try!(ino32(newparent), reply);
        let Some(name) = name_str(newname) else {
            reply.error(libc::EINVAL);
            return;
        };
        fuse_try!(self.fs.link(parent, name, iid), reply);
        let meta = fuse_try!(self.fs.get_meta(iid), reply);
        reply.entry(&DEFAULT_TTL, &meta.into(), 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        assert!(offset >= 0);
        let iid = fuse_try!(ino32(ino), reply);
        let mut buf = vec![0u8; size as usize];
        let read = fuse_try!(self.fs.iread(iid, offset as usize, &mut buf), reply);
        buf.truncate(read);
        reply.data(&buf);
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        assert!(offset >= 0);
        let iid = fuse_try!(ino32(ino), reply);
        let append = flags & libc::O_APPEND != 0;
        let written = fuse_try!(
            self.fs.iwrite(iid, offset as usize, data, append),
            reply
        );
        reply.written(written as u32);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        assert!(offset >= 0);
        let iid = fuse_try!(ino32(ino), reply);
        let mut pos = offset as usize;
        loop {
            match fuse_try!(self.fs.next_entry(iid, pos), reply) {
                Some((next, entry_ino, name, ft)) => {
                    if reply.add(entry_ino as u64, next as i64, ft.into(), OsString::from(name)) {
                        debug!("readdir buffer full");
                        break;
                    }
                    pos = next;
                }
                None => break,
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let info = fuse_try!(self.fs.finfo(), reply);
        reply.statfs(
            info.blocks as u64,
            info.bfree as u64,
            info.bavail as u64,
            info.files as u64,
            info.ffree as u64,
            info.bsize as u32,
            info.namemax as u32,
            info.frsize as u32,
        );
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let parent = fuse_try!(ino32(parent), reply);
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let iid = fuse_try!(
            self.fs.create(parent, name, FilePerm::from_mode(mode)),
            reply
        );
        let meta = fuse_try!(self.fs.get_meta(iid), reply);
        reply.created(&DEFAULT_TTL, &meta.into(), 0, 0, 0);
    }
}

fn main() -> FsResult<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let args: Vec<String> = std::env::args().collect();
    assert!(args.len() >= 2, "usage: blockfs <mountpoint> [image]");
    let mount = Path::new(&args[1]);

    // a named image is mounted in place; otherwise a fresh one is built
    let fs = if args.len() >= 3 {
        info!("loading image {}", args[2]);
        BlockFs::new(RamDisk::load(Path::new(&args[2]))?)?
    } else {
        info!(
            "formatting fresh image: {} blocks, {} inodes",
            DEFAULT_NBLOCKS, DEFAULT_NINODES
        );
        BlockFs::format(DEFAULT_NBLOCKS, DEFAULT_NINODES)?
    };

    fs.replay_journal();

    info!("mounting at {}", mount.display());
    fuser::mount2(
        BlockFsHost { fs: Box::new(fs) },
        mount,
        &vec![
            MountOption::FSName("blockfs".into()),
            MountOption::AutoUnmount,
            MountOption::DefaultPermissions,
        ],
    )
    .unwrap();

    Ok(())
}
