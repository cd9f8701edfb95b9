//! A `fuser::Filesystem` adaptor over `bmfs_core::Fs`, mounting a BMFS
//! disk image as a host directory. There is no on-disk inode table; inode
//! numbers are synthesized from each entry's table offset and cached for
//! the life of the mount (`ino_for`/`path_of`), since FUSE addresses every
//! later call by inode rather than by path.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, UNIX_EPOCH};

use bmfs_core::{Entry, EntryType, Error, Fs, OpenMode};
use bmfs_disk::FileDisk;
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};

const TTL: Duration = Duration::from_secs(1);

/// The inode FUSE requires the root directory to carry. Everything else
/// is synthesized from its entry's table offset, which never collides
/// with `1` (the smallest region BMFS ever allocates sits past the header,
/// table, and root entry).
const ROOT_INO: u64 = 1;

/// Mounts `fs` as a FUSE file system. Owns the `Fs` for the lifetime of
/// the mount, matching `spec.md` §5's single-instance ownership model.
pub struct BmfsFuse {
    fs: Fs<FileDisk>,
    paths: HashMap<u64, String>,
}

impl BmfsFuse {
    pub fn new(fs: Fs<FileDisk>) -> Self {
        let mut paths = HashMap::new();
        paths.insert(ROOT_INO, String::from("/"));
        Self { fs, paths }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    fn ino_for(&mut self, path: &str, entry: &Entry) -> u64 {
        let ino = if path == "/" { ROOT_INO } else { entry.offset };
        self.paths.entry(ino).or_insert_with(|| path.to_string());
        ino
    }

    fn attr(entry: &Entry, ino: u64) -> FileAttr {
        let kind = match entry.entry_type {
            EntryType::Directory => FileType::Directory,
            _ => FileType::RegularFile,
        };
        let mtime = UNIX_EPOCH + Duration::from_secs(entry.modification_time);
        let ctime = UNIX_EPOCH + Duration::from_secs(entry.creation_time);
        FileAttr {
            ino,
            size: entry.size,
            blocks: entry.size.div_ceil(512),
            atime: mtime,
            mtime,
            ctime,
            crtime: ctime,
            kind,
            perm: if kind == FileType::Directory { 0o755 } else { 0o644 },
            nlink: 1,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Maps a facade error onto the POSIX errno `reply.error` expects,
/// distinct from `Error::to_errno`'s BMFS wire-level negative codes.
fn errno_of(err: Error) -> i32 {
    match err {
        Error::Fault => libc::EFAULT,
        Error::Invalid => libc::EINVAL,
        Error::NotFound => libc::ENOENT,
        Error::IsDir => libc::EISDIR,
        Error::NotDir => libc::ENOTDIR,
        Error::Exists => libc::EEXIST,
        Error::NoSpace => libc::ENOSPC,
        Error::NotEmpty => libc::ENOTEMPTY,
        Error::Io => libc::EIO,
        Error::NoSys => libc::ENOSYS,
        Error::Perm => libc::EACCES,
        Error::NoMem => libc::ENOMEM,
    }
}

impl Filesystem for BmfsFuse {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let child_path = join(&parent_path, name);
        match self.fs.metadata(&child_path) {
            Ok(entry) => {
                let ino = self.ino_for(&child_path, &entry);
                reply.entry(&TTL, &Self::attr(&entry, ino), 0);
            }
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.metadata(&path) {
            Ok(entry) => reply.attr(&TTL, &Self::attr(&entry, ino)),
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut dir = match self.fs.open_dir(&path) {
            Ok(dir) => dir,
            Err(err) => {
                reply.error(errno_of(err));
                return;
            }
        };

        let mut index = 0i64;
        if offset == 0 {
            if reply.add(ino, 1, FileType::Directory, ".") {
                return;
            }
            if reply.add(ino, 2, FileType::Directory, "..") {
                return;
            }
        }
        index += 2;

        loop {
            let entry = match dir.next() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    reply.error(errno_of(err));
                    return;
                }
            };
            index += 1;
            if index <= offset {
                continue;
            }
            let child_path = join(&path, entry.name_str());
            let kind = match entry.entry_type {
                EntryType::Directory => FileType::Directory,
                _ => FileType::RegularFile,
            };
            let child_ino = self.ino_for(&child_path, &entry);
            if reply.add(child_ino, index, kind, entry.name_str()) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
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
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut file = match self.fs.open_file(&path, OpenMode::Read) {
            Ok(file) => file,
            Err(err) => {
                reply.error(errno_of(err));
                return;
            }
        };
        if file.seek(offset as u64, bmfs_core::Whence::Start).is_err() {
            reply.error(libc::EINVAL);
            return;
        }
        let mut buf = vec![0u8; size as usize];
        match file.read(&mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut file = match self.fs.open_file(&path, OpenMode::Write) {
            Ok(file) => file,
            Err(err) => {
                reply.error(errno_of(err));
                return;
            }
        };
        if file.seek(offset as u64, bmfs_core::Whence::Start).is_err() {
            reply.error(libc::EINVAL);
            return;
        }
        match file.write(data) {
            Ok(n) => reply.written(n as u32),
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let child_path = join(&parent_path, name);
        if let Err(err) = self.fs.create_file(&child_path) {
            reply.error(errno_of(err));
            return;
        }
        match self.fs.metadata(&child_path) {
            Ok(entry) => {
                let ino = self.ino_for(&child_path, &entry);
                reply.created(&TTL, &Self::attr(&entry, ino), 0, 0, 0);
            }
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let child_path = join(&parent_path, name);
        if let Err(err) = self.fs.create_dir(&child_path) {
            reply.error(errno_of(err));
            return;
        }
        match self.fs.metadata(&child_path) {
            Ok(entry) => {
                let ino = self.ino_for(&child_path, &entry);
                reply.entry(&TTL, &Self::attr(&entry, ino), 0);
            }
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.delete_file(&join(&parent_path, name)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_of(err)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.delete_dir(&join(&parent_path, name)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno_of(err)),
        }
    }
}
