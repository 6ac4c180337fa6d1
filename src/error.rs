use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("free block bitmap or inode table is exhausted")]
    NoSpace,
    #[error("file name or symlink target is too long")]
    NameTooLong,
    #[error("directory entry already exists")]
    AlreadyExists,
    #[error("cannot find requested resource")]
    NotFound,
    #[error("user buffer is not accessible")]
    BadAddress,
    #[error("filesystem metadata is inconsistent")]
    Corrupted,
    #[error("operation is not permitted on this inode")]
    NotPermitted,
    #[error("requested resource is not a directory")]
    NotADirectory,
    #[error("requested resource is a directory")]
    IsADirectory,
    #[error("host refused to allocate a handle")]
    OutOfMemory,
    #[error("operation or request not supported")]
    NotSupported,
}

pub type FsResult<T> = Result<T, FsError>;

use libc::c_int;
impl Into<c_int> for FsError {
    fn into(self) -> c_int {
        match self {
            FsError::NoSpace => libc::ENOSPC,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NotFound => libc::ENOENT,
            FsError::BadAddress => libc::EFAULT,
            FsError::Corrupted => libc::EIO,
            FsError::NotPermitted => libc::EPERM,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::OutOfMemory => libc::ENOMEM,
            FsError::NotSupported => libc::ENOSYS,
        }
    }
}
