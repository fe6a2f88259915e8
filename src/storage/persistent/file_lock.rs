//! Exclusive directory lock.
//!
//! Only one process may open a graph directory at a time. The lock is taken
//! with a non-blocking OS-level lock on a marker file inside the directory and
//! is released when the [`FileLock`] (and with it the file handle) is dropped.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

/// Name of the marker file inside a graph directory.
pub const LOCK_FILE_NAME: &str = "kgraph.lock";

/// Held exclusive lock on a graph directory.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Locks `dir` for exclusive use.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if another handle holds the lock
    /// - `ErrorKind::Unsupported` on platforms without file locking
    /// - any error from creating the marker file
    pub fn acquire(dir: &Path) -> IoResult<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        lock_exclusive(&file)?;

        Ok(Self { _file: file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn held_elsewhere() -> IoError {
    IoError::new(ErrorKind::WouldBlock, "graph directory is locked by another process")
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> IoResult<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(());
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(held_elsewhere());
    }
    Err(err)
}

#[cfg(windows)]
fn lock_exclusive(file: &File) -> IoResult<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: the handle is owned by `file`; OVERLAPPED is plain data.
    let ok = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if ok == 0 {
        return Err(held_elsewhere());
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn lock_exclusive(_file: &File) -> IoResult<()> {
    Err(IoError::new(
        ErrorKind::Unsupported,
        "file locking is not supported on this platform",
    ))
}
