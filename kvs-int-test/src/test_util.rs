use kvs::errors::{ErrorKind, KvsError, KvsResult};
use kvs::Kvs;
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Backend a test context is created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestBackend {
    Memory,
    Fjall,
}

/// Both backends, for tests that must behave the same on either.
pub const ALL_BACKENDS: [TestBackend; 2] = [TestBackend::Memory, TestBackend::Fjall];

/// Runs a test with retry logic and error handling.
///
/// `after` runs whether or not the test succeeded, so on-disk stores are
/// always cleaned up.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(&mut TestContext) -> KvsResult<()> + std::panic::RefUnwindSafe,
    B: Fn() -> KvsResult<TestContext> + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> KvsResult<()> + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            let mut ctx = match before() {
                Ok(ctx) => ctx,
                Err(e) => {
                    return Err((format!("Before run failed: {:?}", e), backtrace.to_string()))
                }
            };

            match test(&mut ctx) {
                Ok(_) => match after(ctx) {
                    Ok(_) => Ok(()),
                    Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                },
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            }
        });

        let elapsed = start_time.elapsed();
        let err_msg = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                if !bt.is_empty() && !bt.contains("disabled") {
                    format!("{}\nBacktrace:\n{}", e, bt)
                } else {
                    e
                }
            }
            Err(panic_err) => {
                if let Some(s) = panic_err.downcast_ref::<&str>() {
                    format!("Panic: {}", s)
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    format!("Panic: {}", s)
                } else {
                    "Panic: unknown payload".to_string()
                }
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("{}", err_msg);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(err_msg);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A store under test and, for persistent stores, its directory.
pub struct TestContext {
    backend: TestBackend,
    path: Option<PathBuf>,
    store: Kvs,
}

impl TestContext {
    pub fn new(backend: TestBackend, path: Option<PathBuf>, store: Kvs) -> Self {
        Self {
            backend,
            path,
            store,
        }
    }

    pub fn backend(&self) -> TestBackend {
        self.backend
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn store(&self) -> &Kvs {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Kvs {
        &mut self.store
    }

    /// Closes the store and opens it again with `flag`.
    ///
    /// A transient store comes back empty.
    pub fn reopen(&mut self, flag: &str) -> KvsResult<()> {
        self.store.close()?;
        self.store = match &self.path {
            Some(path) => open_persistent(path, flag)?,
            None => Kvs::builder().flag(flag).open()?,
        };
        Ok(())
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join("kvs-int-test").join(id.to_string())
}

/// Opens a persistent store tuned for tests.
pub fn open_persistent(path: &Path, flag: &str) -> KvsResult<Kvs> {
    // low_memory_preset keeps one flush and one compaction worker per store
    Kvs::builder()
        .database(path)
        .flag(flag)
        .low_memory_preset()
        .open()
}

pub fn create_test_context(backend: TestBackend) -> KvsResult<TestContext> {
    match backend {
        TestBackend::Memory => Ok(TestContext::new(backend, None, Kvs::open(":memory:")?)),
        TestBackend::Fjall => create_persistent_context(),
    }
}

fn create_persistent_context() -> KvsResult<TestContext> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut last_error: Option<KvsError> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let path = random_path();
        if path.exists() {
            let _ = fs::remove_dir_all(&path);
            thread::sleep(Duration::from_millis(10));
        }

        match open_persistent(&path, "c") {
            Ok(store) => return Ok(TestContext::new(TestBackend::Fjall, Some(path), store)),
            Err(e) => {
                let _ = fs::remove_dir_all(&path);
                if attempt < MAX_ATTEMPTS {
                    eprintln!(
                        "Warning: Failed to create test context (attempt {}/{}): {:?}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        KvsError::new("Failed to create test context", ErrorKind::InternalError)
    }))
}

/// Closes the store and removes its directory.
pub fn cleanup(mut ctx: TestContext) -> KvsResult<()> {
    if let Err(e) = ctx.store.close() {
        eprintln!("Warning: Failed to close store: {:?}", e);
    }

    let Some(path) = ctx.path.take() else {
        return Ok(());
    };
    drop(ctx);

    // give the engine time to release file handles
    thread::sleep(Duration::from_millis(50));
    remove_dir_with_retry(&path);
    Ok(())
}

fn remove_dir_with_retry(path: &Path) {
    let max_retries = 15;
    let mut base_delay_ms = 50u64;

    for retry in 0..max_retries {
        if !path.exists() {
            return;
        }

        match fs::remove_dir_all(path) {
            Ok(_) => return,
            Err(e) if retry < max_retries - 1 => match e.kind() {
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::WouldBlock => {
                    let jitter = (retry as u64 * 7) % 20;
                    thread::sleep(Duration::from_millis(base_delay_ms + jitter));
                    base_delay_ms = std::cmp::min(base_delay_ms * 2, 1000);
                }
                std::io::ErrorKind::NotFound => return,
                _ => {
                    thread::sleep(Duration::from_millis(base_delay_ms));
                    base_delay_ms = std::cmp::min(base_delay_ms + 50, 500);
                }
            },
            Err(e) => {
                // leftovers in the temp dir are removed by the OS eventually
                eprintln!(
                    "Warning: Failed to remove test directory {} after {} attempts: {:?}",
                    path.display(),
                    max_retries,
                    e
                );
                return;
            }
        }
    }
}
