//! Advisory file locking for cache writers.
//!
//! Writers serialize through an exclusive lock on a dedicated lock file next
//! to the cache file. Readers never take the lock; they rely on atomic rename
//! for consistency.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::CacheError;

/// How long a writer waits for the lock before giving up.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between non-blocking acquisition attempts.
const LOCK_RETRY_SLEEP: Duration = Duration::from_millis(10);

/// Runs `f` while holding an exclusive advisory lock on `lock_path`.
///
/// The lock file is created (mode 0600) if missing. Acquisition spins with a
/// non-blocking attempt every 10 ms until [`LOCK_TIMEOUT`] elapses. The lock
/// is released when the guard drops, so every exit path, including panics
/// inside `f`, unlocks.
pub fn with_exclusive_lock<T, F>(lock_path: &Path, f: F) -> Result<T, CacheError>
where
    F: FnOnce() -> Result<T, CacheError>,
{
    with_exclusive_lock_timeout(lock_path, LOCK_TIMEOUT, f)
}

pub(crate) fn with_exclusive_lock_timeout<T, F>(
    lock_path: &Path,
    timeout: Duration,
    f: F,
) -> Result<T, CacheError>
where
    F: FnOnce() -> Result<T, CacheError>,
{
    let file = open_lock_file(lock_path)?;
    let deadline = Instant::now() + timeout;

    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => break,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(CacheError::LockTimeout(timeout));
                }
                thread::sleep(LOCK_RETRY_SLEEP);
            }
            Err(err) => return Err(CacheError::Io(err)),
        }
    }

    let _guard = LockGuard { file };
    f()
}

struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File, CacheError> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    Ok(options.open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    #[test]
    fn runs_closure_and_returns_value() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock_path = dir.path().join("cache.json.lock");

        let out = with_exclusive_lock(&lock_path, || Ok(42)).unwrap();
        assert_eq!(out, 42);
        assert!(lock_path.exists());
    }

    #[test]
    fn second_locker_waits_for_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock_path = Arc::new(dir.path().join("cache.json.lock"));
        let released = Arc::new(AtomicBool::new(false));
        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let lock_path = Arc::clone(&lock_path);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                with_exclusive_lock(&lock_path, || {
                    acquired_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    released.store(true, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
            })
        };

        acquired_rx.recv().unwrap();

        let waiter = {
            let lock_path = Arc::clone(&lock_path);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                with_exclusive_lock(&lock_path, || {
                    // Thread A must have released before we ever get here.
                    assert!(released.load(Ordering::SeqCst));
                    Ok(())
                })
                .unwrap();
            })
        };

        thread::sleep(Duration::from_millis(100));
        release_tx.send(()).unwrap();

        holder.join().unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn lock_released_after_closure_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock_path = dir.path().join("cache.json.lock");

        let err = with_exclusive_lock::<(), _>(&lock_path, || Err(CacheError::NotFound));
        assert!(matches!(err, Err(CacheError::NotFound)));

        // Reacquisition with a short timeout succeeds immediately.
        let out =
            with_exclusive_lock_timeout(&lock_path, Duration::from_millis(50), || Ok(7)).unwrap();
        assert_eq!(out, 7);
    }

    #[test]
    fn lock_released_after_panic() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock_path = dir.path().join("cache.json.lock");

        let panicked = std::panic::catch_unwind(|| {
            let _ = with_exclusive_lock::<(), _>(&lock_path, || panic!("boom"));
        });
        assert!(panicked.is_err());

        let out =
            with_exclusive_lock_timeout(&lock_path, Duration::from_millis(50), || Ok(1)).unwrap();
        assert_eq!(out, 1);
    }

    #[test]
    fn times_out_when_lock_is_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock_path = Arc::new(dir.path().join("cache.json.lock"));
        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let lock_path = Arc::clone(&lock_path);
            thread::spawn(move || {
                with_exclusive_lock(&lock_path, || {
                    acquired_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
                .unwrap();
            })
        };

        acquired_rx.recv().unwrap();

        let err = with_exclusive_lock_timeout(&lock_path, Duration::from_millis(80), || Ok(()));
        assert!(matches!(err, Err(CacheError::LockTimeout(_))));

        release_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn lock_file_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let lock_path = dir.path().join("cache.json.lock");
        with_exclusive_lock(&lock_path, || Ok(())).unwrap();

        let mode = std::fs::metadata(&lock_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
