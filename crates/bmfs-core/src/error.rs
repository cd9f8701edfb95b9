//! The error taxonomy shared by every BMFS component.
//!
//! Every facade operation returns a single [`Error`] variant; there are no
//! panics on contract violations from callers and no retries anywhere in
//! this crate.

/// Canonical negative error codes, matching the BMFS wire-level contract.
///
/// These are the exact magnitudes a C host or CLI would see; [`Error::to_errno`]
/// maps each variant to one of them.
pub mod errno {
    pub const FAULT: i32 = -1;
    pub const INVAL: i32 = -2;
    pub const NOENT: i32 = -3;
    pub const ISDIR: i32 = -4;
    pub const EXIST: i32 = -5;
    pub const NOTDIR: i32 = -6;
    pub const NOSPC: i32 = -7;
    pub const NOSYS: i32 = -8;
    pub const IO: i32 = -9;
    pub const PERM: i32 = -10;
    pub const NOTEMPTY: i32 = -11;
    pub const NOMEM: i32 = -12;
}

/// Every error a BMFS operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A null required argument or an uninitialized structure was used.
    #[error("fault: required argument missing or structure uninitialized")]
    Fault,
    /// Malformed input, or an out-of-range seek.
    #[error("invalid argument")]
    Invalid,
    /// The entry does not exist.
    #[error("no such file or directory")]
    NotFound,
    /// A file operation was requested on a path that names a directory.
    #[error("is a directory")]
    IsDir,
    /// A directory operation was requested on a path that names a file.
    #[error("not a directory")]
    NotDir,
    /// An entry already exists at the requested path.
    #[error("entry already exists")]
    Exists,
    /// The allocation table or the disk itself has no room left.
    #[error("no space left on device")]
    NoSpace,
    /// A directory delete was requested but the directory is not empty.
    #[error("directory not empty")]
    NotEmpty,
    /// The disk back end reported a failure.
    #[error("I/O error")]
    Io,
    /// The requested operation is not implemented.
    #[error("function not implemented")]
    NoSys,
    /// Reserved for permission checks; the core never returns this itself.
    #[error("permission denied")]
    Perm,
    /// An allocation of host memory failed.
    #[error("out of memory")]
    NoMem,
}

impl Error {
    /// Maps this error onto the canonical negative code from `errno`.
    pub const fn to_errno(self) -> i32 {
        match self {
            Error::Fault => errno::FAULT,
            Error::Invalid => errno::INVAL,
            Error::NotFound => errno::NOENT,
            Error::IsDir => errno::ISDIR,
            Error::Exists => errno::EXIST,
            Error::NotDir => errno::NOTDIR,
            Error::NoSpace => errno::NOSPC,
            Error::NotEmpty => errno::NOTEMPTY,
            Error::Io => errno::IO,
            Error::NoSys => errno::NOSYS,
            Error::Perm => errno::PERM,
            Error::NoMem => errno::NOMEM,
        }
    }
}

/// The result type returned by every BMFS operation.
pub type Result<T> = core::result::Result<T, Error>;
