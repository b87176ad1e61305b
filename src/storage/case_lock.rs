//! Cross-process lock on a case directory.
//!
//! A single-user case may be opened by one `Case` at a time. The lock is an
//! exclusive, non-blocking OS file lock on `<case dir>/.case.lock`; it is
//! held for the lifetime of the `CaseLock` and released when the file is
//! closed on drop.
//!
//! The holder writes its process id into the lock file so a process that is
//! turned away can report who has the case open.

use std::fs::{self, File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE_NAME: &str = ".case.lock";

/// Exclusive lock on a case directory.
#[derive(Debug)]
pub struct CaseLock {
    _file: File,
    path: PathBuf,
}

impl CaseLock {
    /// Attempt to lock the case directory `dir`.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if the case is already open elsewhere
    /// - `ErrorKind::PermissionDenied` if the lock file cannot be written
    pub fn acquire(dir: &Path) -> IoResult<Self> {
        let lock_path = dir.join(LOCK_FILE_NAME);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        Self::try_lock(&file)?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_data()?;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }

    /// Process id recorded by the current holder of `dir`, if readable.
    #[must_use]
    pub fn holder(dir: &Path) -> Option<u32> {
        fs::read_to_string(dir.join(LOCK_FILE_NAME))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> IoResult<()> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        // SAFETY: `fd` is a valid descriptor owned by `file` for this call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

        if result != 0 {
            let errno = IoError::last_os_error();
            if errno.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Err(IoError::new(
                    ErrorKind::WouldBlock,
                    "case is already open",
                ));
            }
            return Err(errno);
        }

        Ok(())
    }

    #[cfg(windows)]
    fn try_lock(file: &File) -> IoResult<()> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
        };

        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: `handle` is valid for the duration of the call and the
        // zeroed OVERLAPPED is a valid argument for a synchronous lock.
        let result = unsafe {
            let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };

        if result == 0 {
            let err = IoError::last_os_error();
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("case is already open: {err}"),
            ));
        }

        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn try_lock(_file: &File) -> IoResult<()> {
        Err(IoError::new(
            ErrorKind::Unsupported,
            "case locking not supported on this platform",
        ))
    }
}
