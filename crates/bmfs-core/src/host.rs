//! The advisory lock a host may provide around mutating facade operations.
//!
//! `spec.md` §6.4 describes a C function-pointer table (`init`/`done`/
//! `malloc`/`free`/`lock`/`unlock`). `malloc`/`free` are not reified here:
//! Rust's global allocator already plays that role, and those hooks are
//! only ever invoked from the facade in the original design, never from a
//! leaf component, so a leaf implementation is free to omit them (see
//! `DESIGN.md`). `lock`/`unlock` remain, as [`HostLock`].

use crate::error::Error;

/// A host-provided advisory lock, taken around every mutating facade
/// operation. A null host defaults to the no-op implementation for `()`.
pub trait HostLock {
    /// Acquires the lock.
    fn lock(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Releases the lock.
    fn unlock(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// The default no-op host: single-threaded use, trusts the caller.
impl HostLock for () {}

/// An RAII guard that releases a [`HostLock`] on drop, so an early `?`
/// return from inside a mutating facade method still unlocks.
pub(crate) struct LockGuard<'a, H: HostLock> {
    host: &'a H,
}

impl<'a, H: HostLock> LockGuard<'a, H> {
    pub(crate) fn acquire(host: &'a H) -> Result<Self, Error> {
        host.lock()?;
        Ok(Self { host })
    }
}

impl<'a, H: HostLock> Drop for LockGuard<'a, H> {
    fn drop(&mut self) {
        let _ = self.host.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct CountingLock {
        locks: Cell<u32>,
        unlocks: Cell<u32>,
    }

    impl HostLock for CountingLock {
        fn lock(&self) -> Result<(), Error> {
            self.locks.set(self.locks.get() + 1);
            Ok(())
        }

        fn unlock(&self) -> Result<(), Error> {
            self.unlocks.set(self.unlocks.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn guard_unlocks_on_drop() {
        let host = CountingLock {
            locks: Cell::new(0),
            unlocks: Cell::new(0),
        };
        {
            let _guard = LockGuard::acquire(&host).unwrap();
            assert_eq!(host.locks.get(), 1);
            assert_eq!(host.unlocks.get(), 0);
        }
        assert_eq!(host.unlocks.get(), 1);
    }

    #[test]
    fn null_host_is_a_no_op() {
        let host = ();
        let guard = LockGuard::acquire(&host).unwrap();
        drop(guard);
    }
}
