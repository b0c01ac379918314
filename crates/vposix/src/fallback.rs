//! Managed-only strategy.
//!
//! Metadata, directory creation and timestamps go through the standard
//! library. Ownership, links and link resolution run the external
//! utilities named in [`FallbackConfig`] and interpret their exit status
//! and output. The user database holds a single entry for the current
//! login, assembled from the environment and `id`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use filetime::FileTime;
use vposix_config::{log_fallback_debug, log_fallback_warn, DirCreation, FallbackConfig};
use vposix_exec::{Completed, Invocation, Runner};

use crate::env::EnvMap;
use crate::error::{BackendError, Result};
use crate::filestat::FileStat;
use crate::passwd::Passwd;
use crate::strategy::{IdKind, Op, Strategy};

/// Variables consulted, in order, for the login name
pub const LOGIN_VARS: &[&str] = &["USER", "LOGNAME", "USERNAME"];

pub struct Fallback {
    runner: Arc<dyn Runner>,
    programs: FallbackConfig,
    env: Arc<EnvMap>,
}

impl Fallback {
    pub fn new(runner: Arc<dyn Runner>, programs: FallbackConfig, env: Arc<EnvMap>) -> Self {
        Self {
            runner,
            programs,
            env,
        }
    }

    fn run(&self, invocation: Invocation) -> Result<Completed> {
        let done = self.runner.run(&invocation)?;
        log_fallback_debug!(
            "invocation finished",
            runner = self.runner.name(),
            invocation = display(&invocation),
            code = done.code,
        );
        Ok(done)
    }

    /// Run and require a zero exit status.
    fn run_checked(&self, invocation: Invocation) -> Result<Completed> {
        let program = invocation.program().to_string();
        let done = self.run(invocation)?;
        if done.success() {
            Ok(done)
        } else {
            Err(BackendError::Exit {
                program,
                code: done.code,
            })
        }
    }

    fn query_id(&self, flags: &str) -> Result<u32> {
        let done = self.run_checked(Invocation::new(self.programs.id.as_str()).arg(flags))?;
        let text = String::from_utf8_lossy(done.stdout_line());
        text.trim().parse().map_err(|_| BackendError::Parse {
            program: self.programs.id.clone(),
            output: text.into_owned(),
        })
    }

    fn login_name(&self) -> Option<String> {
        self.env.first_of(LOGIN_VARS)
    }

    /// The one entry this database knows about.
    fn current_entry(&self) -> Result<Option<Passwd>> {
        let Some(name) = self.login_name() else {
            return Ok(None);
        };
        Ok(Some(Passwd {
            name,
            uid: self.query_id("-ru")?,
            gid: self.query_id("-rg")?,
            gecos: None,
            dir: self
                .env
                .first_of(&["HOME", "USERPROFILE"])
                .unwrap_or_default()
                .into(),
            shell: self.env.get("SHELL").unwrap_or_default().into(),
        }))
    }
}

impl Strategy for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn supports(&self, op: Op) -> bool {
        match op {
            Op::Chmod => cfg!(unix),
            _ => true,
        }
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        fs::metadata(path)
            .map(|m| FileStat::from_metadata(&m))
            .map_err(|e| BackendError::io("stat", path, e))
    }

    fn lstat(&self, path: &Path) -> Result<FileStat> {
        fs::symlink_metadata(path)
            .map(|m| FileStat::from_metadata(&m))
            .map_err(|e| BackendError::io("lstat", path, e))
    }

    #[cfg(unix)]
    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| BackendError::io("chmod", path, e))
    }

    #[cfg(not(unix))]
    fn chmod(&self, _path: &Path, _mode: u32) -> Result<()> {
        Err(BackendError::Unsupported("chmod"))
    }

    /// Owner and group are changed by separate invocations. Both are
    /// attempted; a failure after the other succeeded is reported as
    /// partial and the successful change stays in place.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        let steps = [
            ("owner", self.programs.chown.as_str(), uid),
            ("group", self.programs.chgrp.as_str(), gid),
        ];

        let mut completed: Option<&'static str> = None;
        let mut failure: Option<BackendError> = None;
        for (what, program, id) in steps {
            let Some(id) = id else { continue };
            match self.run_checked(Invocation::new(program).arg(id.to_string()).arg(path)) {
                Ok(_) => completed = completed.or(Some(what)),
                Err(e) => {
                    log_fallback_warn!(
                        "ownership step failed",
                        step = what,
                        path = display(path.display()),
                        error = display(&e),
                    );
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        match (failure, completed) {
            (None, _) => Ok(()),
            (Some(source), Some(completed)) => Err(BackendError::Partial {
                op: "chown",
                path: path.to_path_buf(),
                completed,
                source: Box::new(source),
            }),
            (Some(e), None) => Err(e),
        }
    }

    fn link(&self, original: &Path, link: &Path) -> Result<()> {
        self.run_checked(Invocation::new(self.programs.ln.as_str()).arg(original).arg(link))
            .map(drop)
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.run_checked(
            Invocation::new(self.programs.ln.as_str())
                .arg("-s")
                .arg(target)
                .arg(link),
        )
        .map(drop)
    }

    fn readlink(&self, path: &Path, capacity: usize) -> Result<Vec<u8>> {
        let done = self.run(Invocation::new(self.programs.readlink.as_str()).arg(path))?;
        let target = done.stdout_line();

        if !done.success() || target.is_empty() {
            // Distinguish a missing path from an existing non-link
            if let Err(e) = fs::symlink_metadata(path) {
                return Err(BackendError::io("readlink", path, e));
            }
            return Err(BackendError::NotALink {
                path: path.to_path_buf(),
            });
        }
        if target.len() > capacity {
            return Err(BackendError::Capacity {
                len: target.len(),
                capacity,
            });
        }
        Ok(target.to_vec())
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        match self.programs.mkdir {
            DirCreation::Direct => {
                fs::create_dir(path).map_err(|e| BackendError::io("mkdir", path, e))?
            }
            DirCreation::Exec => {
                self.run_checked(Invocation::new(self.programs.mkdir_program.as_str()).arg(path))?;
            }
        }

        if !self.supports(Op::Chmod) {
            return Ok(());
        }
        if let Err(e) = self.chmod(path, mode) {
            log_fallback_warn!(
                "permission change after mkdir failed",
                path = display(path.display()),
                error = display(&e),
            );
        }
        Ok(())
    }

    fn utime(&self, path: &Path, atime: i64, mtime: i64) -> Result<()> {
        filetime::set_file_times(
            path,
            FileTime::from_unix_time(atime, 0),
            FileTime::from_unix_time(mtime, 0),
        )
        .map_err(|e| BackendError::io("utime", path, e))
    }

    fn getpwnam(&self, name: &str) -> Result<Option<Passwd>> {
        if self.login_name().as_deref() != Some(name) {
            return Ok(None);
        }
        self.current_entry()
    }

    fn getpwuid(&self, uid: u32) -> Result<Option<Passwd>> {
        Ok(self.current_entry()?.filter(|entry| entry.uid == uid))
    }

    fn passwd_entries(&self) -> Result<Vec<Passwd>> {
        Ok(self.current_entry()?.into_iter().collect())
    }

    fn id(&self, which: IdKind) -> Result<u32> {
        let flags = match which {
            IdKind::RealUid => "-ru",
            IdKind::EffectiveUid => "-u",
            IdKind::RealGid => "-rg",
            IdKind::EffectiveGid => "-g",
        };
        self.query_id(flags)
    }

    fn getlogin(&self) -> Result<Option<String>> {
        Ok(self.login_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use vposix_exec::testing::{Scripted, ScriptedRunner};

    fn fallback(runner: Arc<ScriptedRunner>, env: EnvMap) -> Fallback {
        Fallback::new(runner, FallbackConfig::default(), Arc::new(env))
    }

    fn alice() -> EnvMap {
        EnvMap::from_pairs([("USER", "alice"), ("HOME", "/home/alice"), ("SHELL", "/bin/zsh")])
    }

    #[test]
    fn test_chown_skips_unchanged_ids() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("chgrp", Scripted::exit(0));
        let fb = fallback(runner.clone(), EnvMap::new());

        fb.chown(Path::new("/tmp/f"), None, Some(20)).unwrap();
        assert_eq!(runner.calls_to("chown"), 0);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "chgrp 20 /tmp/f");
    }

    #[test]
    fn test_chown_group_gets_gid() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("chown", Scripted::exit(0)).on("chgrp", Scripted::exit(0));
        let fb = fallback(runner.clone(), EnvMap::new());

        fb.chown(Path::new("f"), Some(1000), Some(50)).unwrap();
        let rendered: Vec<String> = runner.calls().iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, ["chown 1000 f", "chgrp 50 f"]);
    }

    #[test]
    fn test_chown_owner_failure_then_group_success_is_partial() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("chown", Scripted::exit(1)).on("chgrp", Scripted::exit(0));
        let fb = fallback(runner.clone(), EnvMap::new());

        let err = fb.chown(Path::new("f"), Some(0), Some(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert!(err.to_string().contains("group applied"));
    }

    #[test]
    fn test_chown_total_failure_keeps_first_cause() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("chown", Scripted::exit(1)).on("chgrp", Scripted::exit(1));
        let fb = fallback(runner.clone(), EnvMap::new());

        let err = fb.chown(Path::new("f"), Some(0), Some(0)).unwrap_err();
        assert!(matches!(err, BackendError::Exit { ref program, code: 1 } if program == "chown"));
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_symlink_and_link_invocations() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("ln", Scripted::exit(0)).on("ln", Scripted::exit(1));
        let fb = fallback(runner.clone(), EnvMap::new());

        fb.symlink(Path::new("target"), Path::new("name")).unwrap();
        let err = fb.link(Path::new("a"), Path::new("b")).unwrap_err();
        assert!(matches!(err, BackendError::Exit { code: 1, .. }));

        let rendered: Vec<String> = runner.calls().iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, ["ln -s target name", "ln a b"]);
    }

    #[test]
    fn test_readlink_strips_terminator() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("readlink", Scripted::output(0, "/etc/hosts\n"));
        let fb = fallback(runner, EnvMap::new());

        let target = fb.readlink(Path::new("link"), 64).unwrap();
        assert_eq!(target, b"/etc/hosts");
    }

    #[test]
    fn test_readlink_capacity_exceeded() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("readlink", Scripted::output(0, "/a/long/target\n"));
        let fb = fallback(runner, EnvMap::new());

        let err = fb.readlink(Path::new("link"), 4).unwrap_err();
        assert!(matches!(err, BackendError::Capacity { len: 14, capacity: 4 }));
        // Exactly at capacity is fine
        assert!(fb.readlink(Path::new("link"), 14).is_ok());
    }

    #[test]
    fn test_readlink_empty_output_on_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        runner.on("readlink", Scripted::output(1, ""));
        let fb = fallback(runner, EnvMap::new());

        let err = fb.readlink(&file, 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = fb.readlink(&dir.path().join("missing"), 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_mkdir_exec_failure_skips_chmod() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("mkdir", Scripted::exit(1));
        let programs = FallbackConfig {
            mkdir: DirCreation::Exec,
            ..FallbackConfig::default()
        };
        let fb = Fallback::new(runner.clone(), programs, Arc::new(EnvMap::new()));

        let err = fb.mkdir(&dir.path().join("d"), 0o700).unwrap_err();
        assert!(matches!(err, BackendError::Exit { .. }));
        assert_eq!(runner.calls_to("mkdir"), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_mkdir_direct_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fb = fallback(Arc::new(ScriptedRunner::new()), EnvMap::new());
        let target = dir.path().join("d");
        fb.mkdir(&target, 0o751).unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o751);

        let err = fb.mkdir(&target, 0o751).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_single_entry_database() {
        let runner = Arc::new(ScriptedRunner::new());
        runner
            .on("id", Scripted::output(0, "1000\n"))
            .on("id", Scripted::output(0, "100\n"));
        let fb = fallback(runner.clone(), alice());

        let entries = fb.passwd_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "alice");
        assert_eq!(entries[0].uid, 1000);
        assert_eq!(entries[0].gid, 100);
        assert_eq!(entries[0].dir, Path::new("/home/alice"));
        assert_eq!(entries[0].shell, Path::new("/bin/zsh"));

        assert!(fb.getpwnam("bob").unwrap().is_none());
        // Unknown names never run `id`
        assert_eq!(runner.calls_to("id"), 2);
    }

    #[test]
    fn test_getpwuid_matches_only_current() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("id", Scripted::output(0, "1000\n"));
        let fb = fallback(runner, alice());

        assert_eq!(fb.getpwuid(1000).unwrap().unwrap().name, "alice");
        assert!(fb.getpwuid(0).unwrap().is_none());
    }

    #[test]
    fn test_no_login_name_means_empty_database() {
        let runner = Arc::new(ScriptedRunner::new());
        let fb = fallback(runner.clone(), EnvMap::new());
        assert!(fb.passwd_entries().unwrap().is_empty());
        assert_eq!(fb.getlogin().unwrap(), None);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_id_parse_failure() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("id", Scripted::output(0, "uid=1000(alice)\n"));
        let fb = fallback(runner.clone(), EnvMap::new());

        let err = fb.id(IdKind::EffectiveUid).unwrap_err();
        assert!(matches!(err, BackendError::Parse { .. }));
        assert_eq!(runner.calls()[0].to_string(), "id -u");
    }

    #[test]
    fn test_utime_sets_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"").unwrap();
        let fb = fallback(Arc::new(ScriptedRunner::new()), EnvMap::new());

        fb.utime(&path, 1_000_000, 2_000_000).unwrap();
        let st = fb.stat(&path).unwrap();
        assert_eq!(st.mtime.sec, 2_000_000);
        assert_eq!(st.atime.sec, 1_000_000);
    }
}
