//! The POSIX facade.
//!
//! Every call follows the same path: look up the strategy bound to the
//! operation, run it, and on failure report the exact cause to the
//! [`ErrorSink`] before returning the coarse [`ErrorKind`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vposix_config::{log_facade_debug, Config, TtyProbe};
use vposix_exec::{ProcessRunner, Runner};
use vposix_layout::Platform;

use crate::descriptor::Descriptor;
use crate::dispatch::DispatchTable;
use crate::env::EnvMap;
use crate::error::{BackendError, ErrorKind};
use crate::fallback::Fallback;
use crate::filestat::FileStat;
use crate::passwd::{Passwd, PasswdCursor};
use crate::sink::{ErrorReport, ErrorSink, TracingSink};
use crate::strategy::{IdKind, Op, Strategy};

pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Link target capacity used by [`Posix::readlink`]
pub const PATH_MAX: usize = 4096;

pub struct Posix {
    platform: Platform,
    table: DispatchTable,
    sink: Arc<dyn ErrorSink>,
    env: Arc<EnvMap>,
    tty: TtyProbe,
}

/// Builder for [`Posix`]; every part defaults to the process-wide one.
#[derive(Default)]
pub struct PosixBuilder {
    config: Option<Config>,
    sink: Option<Arc<dyn ErrorSink>>,
    runner: Option<Arc<dyn Runner>>,
    env: Option<Arc<EnvMap>>,
    platform: Option<Platform>,
    passwd_file: Option<PathBuf>,
    native: Option<Option<Arc<dyn Strategy>>>,
    fallback: Option<Arc<dyn Strategy>>,
}

impl PosixBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Executor for the fallback strategy's external utilities.
    pub fn runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn env(mut self, env: Arc<EnvMap>) -> Self {
        self.env = Some(env);
        self
    }

    /// Target platform. The native strategy only exists for the host.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// `passwd(5)` file enumerated by the native strategy.
    pub fn passwd_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.passwd_file = Some(path.into());
        self
    }

    /// Replace the native strategy; `None` disables it.
    pub fn native_strategy(mut self, native: Option<Arc<dyn Strategy>>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn fallback_strategy(mut self, fallback: Arc<dyn Strategy>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn build(self) -> Posix {
        let config = self
            .config
            .unwrap_or_else(|| vposix_config::config().clone());
        let platform = self.platform.unwrap_or_else(Platform::current);
        let env = self.env.unwrap_or_else(|| Arc::new(EnvMap::capture()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        let fallback = match self.fallback {
            Some(fallback) => fallback,
            None => {
                let runner = self
                    .runner
                    .unwrap_or_else(|| Arc::new(ProcessRunner::new()));
                Arc::new(Fallback::new(runner, config.fallback.clone(), env.clone()))
            }
        };
        let native = match self.native {
            Some(native) => native,
            None => host_native(platform, self.passwd_file),
        };

        let table = DispatchTable::resolve(config.strategy.mode, native, fallback);
        log_facade_debug!(
            "dispatch table resolved",
            platform = display(platform),
            table = tracing::field::debug(&table),
        );

        Posix {
            platform,
            table,
            sink,
            env,
            tty: config.tty.probe,
        }
    }
}

#[cfg(unix)]
fn host_native(platform: Platform, passwd_file: Option<PathBuf>) -> Option<Arc<dyn Strategy>> {
    let native = crate::native::Native::probe(platform)?;
    let native = match passwd_file {
        Some(path) => native.with_passwd_file(path),
        None => native,
    };
    Some(Arc::new(native))
}

#[cfg(not(unix))]
fn host_native(_platform: Platform, _passwd_file: Option<PathBuf>) -> Option<Arc<dyn Strategy>> {
    None
}

impl Posix {
    /// Facade from the global config, logging sink, real processes and a
    /// snapshot of the process environment.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PosixBuilder {
        PosixBuilder::default()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn env(&self) -> &EnvMap {
        &self.env
    }

    fn fail<T>(&self, err: BackendError) -> Result<T> {
        let kind = err.kind();
        self.sink.report(&ErrorReport {
            kind,
            errno: err.raw_os_error(),
            context: err.to_string(),
        });
        Err(kind)
    }

    fn strategy(&self, op: Op) -> Result<&dyn Strategy> {
        match self.table.get(op) {
            Some(strategy) => {
                log_facade_debug!("dispatch", op = op.name(), strategy = strategy.name());
                Ok(strategy)
            }
            None => {
                self.sink.unimplemented(op.name());
                Err(ErrorKind::Unimplemented)
            }
        }
    }

    fn settle<T>(&self, result: crate::error::Result<T>) -> Result<T> {
        result.or_else(|e| self.fail(e))
    }

    fn dispatch<T>(
        &self,
        op: Op,
        call: impl FnOnce(&dyn Strategy) -> crate::error::Result<T>,
    ) -> Result<T> {
        let strategy = self.strategy(op)?;
        self.settle(call(strategy))
    }

    // ========================================================================
    // File metadata
    // ========================================================================

    /// Metadata of the file `path` resolves to.
    ///
    /// The path is canonicalised first, which doubles as the existence
    /// check. The file can still change or vanish before it is read; that
    /// race is accepted.
    pub fn stat(&self, path: impl AsRef<Path>) -> Result<FileStat> {
        let path = path.as_ref();
        let strategy = self.strategy(Op::Stat)?;
        let resolved = match fs::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(BackendError::io("stat", path, e)),
        };
        self.settle(strategy.stat(&resolved))
    }

    /// Metadata of `path` itself, without following a final symlink.
    ///
    /// Checks existence before populating; not atomic, see [`Posix::stat`].
    pub fn lstat(&self, path: impl AsRef<Path>) -> Result<FileStat> {
        let path = path.as_ref();
        let strategy = self.strategy(Op::Lstat)?;
        if let Err(e) = fs::symlink_metadata(path) {
            if e.kind() == io::ErrorKind::NotFound {
                return self.fail(BackendError::io("lstat", path, e));
            }
        }
        self.settle(strategy.lstat(path))
    }

    // ========================================================================
    // Permissions, ownership, links
    // ========================================================================

    pub fn chmod(&self, path: impl AsRef<Path>, mode: u32) -> Result<()> {
        self.dispatch(Op::Chmod, |s| s.chmod(path.as_ref(), mode))
    }

    /// `None` leaves the owner or group unchanged.
    ///
    /// On the fallback path owner and group change separately; a
    /// [`ErrorKind::PartialFailure`] means one of them took effect.
    pub fn chown(&self, path: impl AsRef<Path>, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        if uid.is_none() && gid.is_none() {
            return Ok(());
        }
        self.dispatch(Op::Chown, |s| s.chown(path.as_ref(), uid, gid))
    }

    pub fn link(&self, original: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
        self.dispatch(Op::Link, |s| s.link(original.as_ref(), link.as_ref()))
    }

    pub fn symlink(&self, target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
        self.dispatch(Op::Symlink, |s| s.symlink(target.as_ref(), link.as_ref()))
    }

    /// Target of a symbolic link, up to [`PATH_MAX`] bytes.
    pub fn readlink(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let target = self.dispatch(Op::Readlink, |s| s.readlink(path.as_ref(), PATH_MAX))?;
        Ok(bytes_to_path(target))
    }

    /// Copy the link target into `buf` and return its length.
    ///
    /// A target longer than `buf` fails and leaves `buf` untouched.
    pub fn readlink_into(&self, path: impl AsRef<Path>, buf: &mut [u8]) -> Result<usize> {
        let target = self.dispatch(Op::Readlink, |s| s.readlink(path.as_ref(), buf.len()))?;
        if target.len() > buf.len() {
            return self.fail(BackendError::Capacity {
                len: target.len(),
                capacity: buf.len(),
            });
        }
        buf[..target.len()].copy_from_slice(&target);
        Ok(target.len())
    }

    pub fn mkdir(&self, path: impl AsRef<Path>, mode: u32) -> Result<()> {
        self.dispatch(Op::Mkdir, |s| s.mkdir(path.as_ref(), mode))
    }

    /// Set access and modification times in whole seconds since the epoch.
    pub fn utime(&self, path: impl AsRef<Path>, atime: i64, mtime: i64) -> Result<()> {
        self.dispatch(Op::Utime, |s| s.utime(path.as_ref(), atime, mtime))
    }

    // ========================================================================
    // User database
    // ========================================================================

    /// `Ok(None)` when no such user exists.
    pub fn getpwnam(&self, name: &str) -> Result<Option<Passwd>> {
        self.dispatch(Op::Getpwnam, |s| s.getpwnam(name))
    }

    /// `Ok(None)` when no such user exists.
    pub fn getpwuid(&self, uid: u32) -> Result<Option<Passwd>> {
        self.dispatch(Op::Getpwuid, |s| s.getpwuid(uid))
    }

    /// Start an enumeration over a fresh snapshot of the database.
    pub fn setpwent(&self) -> Result<PasswdCursor> {
        let entries = self.dispatch(Op::Getpwent, |s| s.passwd_entries())?;
        Ok(PasswdCursor::new(entries))
    }

    pub fn getpwent(&self, cursor: &mut PasswdCursor) -> Option<Passwd> {
        cursor.next_entry()
    }

    /// Finish an enumeration; the cursor starts over if used again.
    pub fn endpwent(&self, cursor: &mut PasswdCursor) {
        cursor.rewind();
    }

    // ========================================================================
    // Process identity
    // ========================================================================

    pub fn getpid(&self) -> u32 {
        std::process::id()
    }

    fn id(&self, which: IdKind) -> Result<u32> {
        self.dispatch(which.op(), |s| s.id(which))
    }

    pub fn getuid(&self) -> Result<u32> {
        self.id(IdKind::RealUid)
    }

    pub fn geteuid(&self) -> Result<u32> {
        self.id(IdKind::EffectiveUid)
    }

    pub fn getgid(&self) -> Result<u32> {
        self.id(IdKind::RealGid)
    }

    pub fn getegid(&self) -> Result<u32> {
        self.id(IdKind::EffectiveGid)
    }

    pub fn getlogin(&self) -> Result<Option<String>> {
        self.dispatch(Op::Getlogin, |s| s.getlogin())
    }

    // ========================================================================
    // Descriptors
    // ========================================================================

    /// Whether `fd` is a terminal.
    ///
    /// With the default [`TtyProbe::Static`] policy this is true exactly
    /// for 0, 1 and 2 whatever they are connected to.
    pub fn isatty(&self, fd: i32) -> bool {
        match self.tty {
            TtyProbe::Static => (0..=2).contains(&fd),
            TtyProbe::Os => os_isatty(fd),
        }
    }

    /// Raw file descriptor behind `descriptor`, if there is one.
    pub fn getfd<D: Descriptor + ?Sized>(&self, descriptor: Option<&D>) -> Option<i32> {
        descriptor.and_then(|d| d.raw_fd())
    }

    /// Raw handle behind `descriptor`, if there is one.
    pub fn gethandle<D: Descriptor + ?Sized>(&self, descriptor: Option<&D>) -> Option<i64> {
        descriptor.and_then(|d| d.raw_handle())
    }
}

impl Default for Posix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(unix)]
fn os_isatty(fd: i32) -> bool {
    // SAFETY: isatty only inspects the descriptor number
    unsafe { libc::isatty(fd) == 1 }
}

#[cfg(not(unix))]
fn os_isatty(fd: i32) -> bool {
    use std::io::IsTerminal;
    match fd {
        0 => io::stdin().is_terminal(),
        1 => io::stdout().is_terminal(),
        2 => io::stderr().is_terminal(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use vposix_config::StrategyMode;
    use vposix_exec::testing::{Scripted, ScriptedRunner};

    fn fallback_posix(runner: Arc<ScriptedRunner>, sink: Arc<RecordingSink>) -> Posix {
        let mut config = Config::default();
        config.strategy.mode = StrategyMode::Fallback;
        Posix::builder()
            .config(config)
            .runner(runner)
            .sink(sink)
            .env(Arc::new(EnvMap::new()))
            .native_strategy(None)
            .build()
    }

    #[test]
    fn test_static_isatty() {
        let posix = fallback_posix(Arc::new(ScriptedRunner::new()), Arc::new(RecordingSink::new()));
        for fd in 0..=2 {
            assert!(posix.isatty(fd));
        }
        for fd in [-1, 3, 4, 255, i32::MAX] {
            assert!(!posix.isatty(fd));
        }
    }

    #[test]
    fn test_chown_without_changes_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        let sink = Arc::new(RecordingSink::new());
        let posix = fallback_posix(runner.clone(), sink.clone());
        posix.chown("anything", None, None).unwrap();
        assert!(runner.calls().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_every_error_is_reported() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("ln", Scripted::exit(1));
        let sink = Arc::new(RecordingSink::new());
        let posix = fallback_posix(runner, sink.clone());

        assert_eq!(posix.link("a", "b"), Err(ErrorKind::Io));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ErrorKind::Io);
        assert!(reports[0].context.contains("`ln` exited with status 1"));
    }

    #[test]
    fn test_readlink_into_success_copies_prefix() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("readlink", Scripted::output(0, "abc\n"));
        let posix = fallback_posix(runner, Arc::new(RecordingSink::new()));

        let mut buf = [b'-'; 8];
        assert_eq!(posix.readlink_into("l", &mut buf), Ok(3));
        assert_eq!(&buf, b"abc-----");
        assert_eq!(posix.readlink("l").unwrap(), PathBuf::from("abc"));
    }

    /// Strategy whose readlink ignores the capacity it is given
    struct Oversized;

    impl Strategy for Oversized {
        fn name(&self) -> &'static str {
            "oversized"
        }
        fn supports(&self, op: Op) -> bool {
            op == Op::Readlink
        }
        fn stat(&self, _: &Path) -> crate::error::Result<FileStat> {
            Err(BackendError::Unsupported("stat"))
        }
        fn lstat(&self, _: &Path) -> crate::error::Result<FileStat> {
            Err(BackendError::Unsupported("lstat"))
        }
        fn chmod(&self, _: &Path, _: u32) -> crate::error::Result<()> {
            Err(BackendError::Unsupported("chmod"))
        }
        fn chown(&self, _: &Path, _: Option<u32>, _: Option<u32>) -> crate::error::Result<()> {
            Err(BackendError::Unsupported("chown"))
        }
        fn link(&self, _: &Path, _: &Path) -> crate::error::Result<()> {
            Err(BackendError::Unsupported("link"))
        }
        fn symlink(&self, _: &Path, _: &Path) -> crate::error::Result<()> {
            Err(BackendError::Unsupported("symlink"))
        }
        fn readlink(&self, _: &Path, _: usize) -> crate::error::Result<Vec<u8>> {
            Ok(b"/far/too/long/for/the/buffer".to_vec())
        }
        fn mkdir(&self, _: &Path, _: u32) -> crate::error::Result<()> {
            Err(BackendError::Unsupported("mkdir"))
        }
        fn utime(&self, _: &Path, _: i64, _: i64) -> crate::error::Result<()> {
            Err(BackendError::Unsupported("utime"))
        }
        fn getpwnam(&self, _: &str) -> crate::error::Result<Option<Passwd>> {
            Ok(None)
        }
        fn getpwuid(&self, _: u32) -> crate::error::Result<Option<Passwd>> {
            Ok(None)
        }
        fn passwd_entries(&self) -> crate::error::Result<Vec<Passwd>> {
            Ok(Vec::new())
        }
        fn id(&self, _: IdKind) -> crate::error::Result<u32> {
            Ok(0)
        }
        fn getlogin(&self) -> crate::error::Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn test_readlink_into_rejects_overlong_strategy_result() {
        let sink = Arc::new(RecordingSink::new());
        let posix = Posix::builder()
            .config(Config::default())
            .sink(sink.clone())
            .env(Arc::new(EnvMap::new()))
            .native_strategy(None)
            .fallback_strategy(Arc::new(Oversized))
            .build();

        let mut buf = [b'-'; 4];
        assert_eq!(posix.readlink_into("l", &mut buf), Err(ErrorKind::InvalidArgument));
        assert_eq!(&buf, b"----");
        assert!(sink.reports()[0].context.contains("exceeds capacity of 4"));
    }

    #[test]
    fn test_getfd_absent_descriptor() {
        let posix = fallback_posix(Arc::new(ScriptedRunner::new()), Arc::new(RecordingSink::new()));
        let none: Option<&std::fs::File> = None;
        assert_eq!(posix.getfd(none), None);
        assert_eq!(posix.gethandle(none), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_getfd_open_file() {
        let posix = fallback_posix(Arc::new(ScriptedRunner::new()), Arc::new(RecordingSink::new()));
        let file = tempfile::tempfile().unwrap();
        let fd = posix.getfd(Some(&file)).unwrap();
        assert!(fd >= 0);
        assert_eq!(posix.getfd(Some(&std::io::stderr())), Some(2));
    }

    #[test]
    fn test_getpid_matches_process() {
        let posix = fallback_posix(Arc::new(ScriptedRunner::new()), Arc::new(RecordingSink::new()));
        assert_eq!(posix.getpid(), std::process::id());
    }
}
