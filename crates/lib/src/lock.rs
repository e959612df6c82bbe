//! File-based checkout locking.
//!
//! Fetching and compiling in place is not safe against a second invocation
//! on the same checkout, so a hook holds an exclusive advisory lock on
//! `subforge.lock` inside the checkout's VCS metadata directory for its whole
//! run. The working tree itself is never touched. A contending invocation
//! fails immediately instead of waiting.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::LOCK_FILENAME;
use crate::preflight;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub hook: String,
  pub root: PathBuf,
}

impl LockMetadata {
  pub fn started_at(&self) -> String {
    let time = UNIX_EPOCH + Duration::from_secs(self.started_at_unix);
    humantime::format_rfc3339_seconds(time).to_string()
  }
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error("no VCS metadata directory to hold the lock under {}", root.display())]
  NoMetadataDir { root: PathBuf },

  #[error(
    "checkout is locked by another build: {hook} (PID {pid}, started {started_at})\n\
     If you're sure no subforge process is running, remove the lock file:\n  {}",
    lock_path.display()
  )]
  Contention {
    hook: String,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "checkout is locked (could not read lock metadata)\n\
     If you're sure no subforge process is running, remove the lock file:\n  {}",
    lock_path.display()
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Exclusive lock on a checkout, released on drop.
#[derive(Debug)]
pub struct BuildLock {
  file: File,
  lock_path: PathBuf,
}

impl BuildLock {
  /// Take the lock for `root`, recording `hook` as the holder.
  pub fn acquire(root: &Path, hook: &str) -> Result<Self, LockError> {
    let lock_path = lock_path_for(root).ok_or_else(|| LockError::NoMetadataDir {
      root: root.to_path_buf(),
    })?;
    let file = open_lock_file(&lock_path)?;

    if let Err(err) = try_lock(&file) {
      if is_contention(&err) {
        return Err(read_contention_error(&lock_path));
      }
      return Err(LockError::LockFailed(err));
    }

    write_metadata(&file, hook, root)?;

    Ok(BuildLock { file, lock_path })
  }

  /// Report the current holder of the lock on `root`, if any.
  ///
  /// Briefly takes the lock when it is free, so this never races with an
  /// acquisition into reporting a stale holder.
  pub fn holder(root: &Path) -> Result<Option<LockMetadata>, LockError> {
    let Some(lock_path) = lock_path_for(root).filter(|p| p.exists()) else {
      return Ok(None);
    };

    let file = open_lock_file(&lock_path)?;
    match try_lock(&file) {
      Ok(()) => Ok(None),
      Err(err) if is_contention(&err) => Ok(read_metadata_from(&lock_path)),
      Err(err) => Err(LockError::LockFailed(err)),
    }
  }

  /// Read the metadata through the held handle.
  ///
  /// Opening a second handle would fail on Windows, where locks are mandatory.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

/// Where the lock for `root` lives, or `None` outside a checkout.
pub fn lock_path_for(root: &Path) -> Option<PathBuf> {
  preflight::metadata_dir(root).map(|dir| dir.join(LOCK_FILENAME))
}

fn open_lock_file(lock_path: &Path) -> Result<File, LockError> {
  OpenOptions::new()
    .read(true)
    .write(true)
    .create(true)
    .truncate(false)
    .open(lock_path)
    .map_err(LockError::OpenFile)
}

fn write_metadata(file: &File, hook: &str, root: &Path) -> Result<(), LockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    hook: hook.to_string(),
    root: root.to_path_buf(),
  };

  file.set_len(0).map_err(LockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  writer.seek(SeekFrom::Start(0)).map_err(LockError::WriteMetadata)?;
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| LockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(LockError::WriteMetadata)?;

  Ok(())
}

fn read_metadata_from(lock_path: &Path) -> Option<LockMetadata> {
  let mut file = File::open(lock_path).ok()?;
  let mut contents = String::new();
  file.read_to_string(&mut contents).ok()?;
  serde_json::from_str(&contents).ok()
}

fn read_contention_error(lock_path: &Path) -> LockError {
  match read_metadata_from(lock_path) {
    Some(metadata) => LockError::Contention {
      started_at: metadata.started_at(),
      hook: metadata.hook,
      pid: metadata.pid,
      lock_path: lock_path.to_path_buf(),
    },
    None => LockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn is_contention(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(windows)]
fn is_contention(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;

  err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
