//! Facade behaviour on the host, through whichever strategy `auto` picks.

use std::sync::Arc;

use vposix::{ErrorKind, EnvMap, Op, Posix, RecordingSink};
use vposix_config::testing::TestEnvironment;
use vposix_config::{Config, StrategyMode};

fn posix(mode: StrategyMode, sink: Arc<RecordingSink>) -> Posix {
    let mut config = Config::default();
    config.strategy.mode = mode;
    Posix::builder()
        .config(config)
        .sink(sink)
        .env(Arc::new(EnvMap::capture()))
        .build()
}

#[test]
fn test_stat_and_lstat_fresh_file() {
    let env = TestEnvironment::new().unwrap();
    let file = env.create_file("fresh.txt", b"hello world").unwrap();
    let sink = Arc::new(RecordingSink::new());

    for mode in [StrategyMode::Auto, StrategyMode::Fallback] {
        let posix = posix(mode, sink.clone());
        let st = posix.stat(&file).unwrap();
        assert!(st.is_file());
        assert_eq!(st.size, 11);
        let lst = posix.lstat(&file).unwrap();
        assert_eq!(lst.ino, st.ino);
    }
    assert!(sink.is_empty());
}

#[test]
fn test_stat_deleted_path_is_not_found() {
    let env = TestEnvironment::new().unwrap();
    let gone = env.missing_path("deleted.txt").unwrap();
    let sink = Arc::new(RecordingSink::new());
    let posix = posix(StrategyMode::Auto, sink.clone());

    assert_eq!(posix.stat(&gone), Err(ErrorKind::NotFound));
    assert_eq!(posix.lstat(&gone), Err(ErrorKind::NotFound));
    assert_eq!(sink.kinds(), vec![ErrorKind::NotFound, ErrorKind::NotFound]);
    assert!(sink.reports()[0].context.contains("deleted.txt"));
}

#[cfg(unix)]
#[test]
fn test_stat_follows_lstat_does_not() {
    let env = TestEnvironment::new().unwrap();
    let dir = env.create_dir("real").unwrap();
    let link = env.create_symlink(&dir, "alias").unwrap();
    let dangling = env.create_symlink(&env.path("nowhere"), "dangling").unwrap();
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));

    assert!(posix.stat(&link).unwrap().is_directory());
    assert!(posix.lstat(&link).unwrap().is_symlink());
    assert!(posix.lstat(&dangling).unwrap().is_symlink());
    assert_eq!(posix.stat(&dangling), Err(ErrorKind::NotFound));
}

#[cfg(unix)]
#[test]
fn test_getpwnam_root() {
    let has_root = std::fs::read_to_string("/etc/passwd")
        .map(|t| t.lines().any(|l| l.starts_with("root:")))
        .unwrap_or(false);
    if !has_root {
        return;
    }
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));
    let root = posix.getpwnam("root").unwrap().unwrap();
    assert_eq!(root.name, "root");
    assert_eq!(root.uid, 0);
    assert_eq!(posix.getpwuid(0).unwrap().unwrap().name, "root");
}

#[test]
fn test_getpwnam_unknown_is_absent_not_error() {
    let sink = Arc::new(RecordingSink::new());
    let posix = posix(StrategyMode::Auto, sink.clone());
    assert_eq!(posix.getpwnam("vposix-no-such-user-4f1c"), Ok(None));
    assert!(sink.is_empty());
}

#[cfg(unix)]
#[test]
fn test_enumeration_restarts_at_first_entry() {
    let env = TestEnvironment::new().unwrap();
    let db = env
        .create_file(
            "passwd",
            b"root:x:0:0:root:/root:/bin/sh\n# comment\nbin:x:1:1::/bin:/sbin/nologin\nalice:x:1000:1000::/home/alice:/bin/zsh\n",
        )
        .unwrap();
    let posix = Posix::builder()
        .config(Config::default())
        .sink(Arc::new(RecordingSink::new()))
        .passwd_file(&db)
        .build();
    if posix.table().strategy_name(Op::Getpwent) != Some("native") {
        return;
    }

    let mut cursor = posix.setpwent().unwrap();
    let mut names = Vec::new();
    while let Some(entry) = posix.getpwent(&mut cursor) {
        names.push(entry.name);
    }
    assert_eq!(names, ["root", "bin", "alice"]);
    assert!(posix.getpwent(&mut cursor).is_none());

    posix.endpwent(&mut cursor);
    assert_eq!(posix.getpwent(&mut cursor).unwrap().name, "root");

    let mut again = posix.setpwent().unwrap();
    assert_eq!(posix.getpwent(&mut again).unwrap().name, "root");

    // Lookups read the same database that was enumerated
    assert_eq!(posix.getpwnam("alice").unwrap().unwrap().uid, 1000);
    assert_eq!(posix.getpwuid(1).unwrap().unwrap().name, "bin");
}

#[cfg(unix)]
#[test]
fn test_enumerated_users_resolve_by_name() {
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));
    if posix.table().strategy_name(Op::Getpwent) != Some("native")
        || posix.table().strategy_name(Op::Getpwnam) != Some("native")
    {
        return;
    }

    let mut cursor = posix.setpwent().unwrap();
    while let Some(entry) = posix.getpwent(&mut cursor) {
        let found = posix.getpwnam(&entry.name).unwrap();
        assert!(found.is_some(), "{} enumerated but not found", entry.name);
    }
    posix.endpwent(&mut cursor);
}

#[test]
fn test_host_enumeration_is_repeatable() {
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));
    let Ok(mut first) = posix.setpwent() else {
        return;
    };
    let head = posix.getpwent(&mut first);
    let mut second = posix.setpwent().unwrap();
    assert_eq!(posix.getpwent(&mut second), head);
}

#[test]
fn test_isatty_static_heuristic() {
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));
    assert!(posix.isatty(0));
    assert!(posix.isatty(1));
    assert!(posix.isatty(2));
    for fd in [-1, 3, 7, 1024] {
        assert!(!posix.isatty(fd));
    }
}

#[cfg(unix)]
#[test]
fn test_isatty_os_probe_on_file() {
    let mut config = Config::default();
    config.tty.probe = vposix_config::TtyProbe::Os;
    let posix = Posix::builder().config(config).build();

    use std::os::unix::io::AsRawFd;
    let file = tempfile::tempfile().unwrap();
    assert!(!posix.isatty(file.as_raw_fd()));
    assert!(!posix.isatty(-1));
}

#[cfg(unix)]
#[test]
fn test_links_chmod_mkdir_utime() {
    use std::os::unix::fs::PermissionsExt;

    let env = TestEnvironment::new().unwrap();
    let file = env.create_file("orig", b"data").unwrap();
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));

    let hard = env.path("hard");
    posix.link(&file, &hard).unwrap();
    assert_eq!(posix.stat(&file).unwrap().nlink, 2);

    let soft = env.path("soft");
    posix.symlink("orig", &soft).unwrap();
    assert_eq!(posix.readlink(&soft).unwrap(), std::path::PathBuf::from("orig"));

    posix.chmod(&file, 0o600).unwrap();
    assert_eq!(posix.stat(&file).unwrap().permissions(), 0o600);

    let dir = env.path("d");
    posix.mkdir(&dir, 0o755).unwrap();
    let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
    assert!(mode & 0o700 == 0o700);

    posix.utime(&file, 3_600, 7_200).unwrap();
    let st = posix.lstat(&file).unwrap();
    assert_eq!(st.atime.sec, 3_600);
    assert_eq!(st.mtime.sec, 7_200);
}

#[cfg(unix)]
#[test]
fn test_identity_matches_nix() {
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));
    assert_eq!(posix.getuid().unwrap(), nix::unistd::getuid().as_raw());
    assert_eq!(posix.geteuid().unwrap(), nix::unistd::geteuid().as_raw());
    assert_eq!(posix.getgid().unwrap(), nix::unistd::getgid().as_raw());
    assert_eq!(posix.getegid().unwrap(), nix::unistd::getegid().as_raw());
}

#[cfg(unix)]
#[test]
fn test_chown_to_self_is_noop_success() {
    let env = TestEnvironment::new().unwrap();
    let file = env.create_file("mine", b"").unwrap();
    let posix = posix(StrategyMode::Auto, Arc::new(RecordingSink::new()));
    let st = posix.stat(&file).unwrap();
    posix.chown(&file, Some(st.uid), Some(st.gid)).unwrap();
}
