//! User-database entries and enumeration cursors.

use std::path::PathBuf;

use serde::Serialize;

/// One user-database entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Passwd {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: Option<String>,
    pub dir: PathBuf,
    pub shell: PathBuf,
}

/// Explicit enumeration session over a snapshot of the user database
///
/// Each cursor owns its snapshot, so concurrent enumerations never see
/// each other's position.
#[derive(Debug, Clone, Default)]
pub struct PasswdCursor {
    entries: Vec<Passwd>,
    pos: usize,
}

impl PasswdCursor {
    pub fn new(entries: Vec<Passwd>) -> Self {
        Self { entries, pos: 0 }
    }

    /// Next entry, or `None` once the snapshot is exhausted.
    pub fn next_entry(&mut self) -> Option<Passwd> {
        let entry = self.entries.get(self.pos).cloned()?;
        self.pos += 1;
        Some(entry)
    }

    /// Back to the first entry.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for PasswdCursor {
    type Item = Passwd;

    fn next(&mut self) -> Option<Passwd> {
        self.next_entry()
    }
}

/// Parse one `name:passwd:uid:gid:gecos:dir:shell` line.
///
/// Comments, blank lines, NIS `+`/`-` markers and malformed lines yield
/// `None`.
pub fn parse_line(line: &str) -> Option<Passwd> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() || line.starts_with('#') || line.starts_with('+') || line.starts_with('-') {
        return None;
    }

    let fields: Vec<&str> = line.split(':').collect();
    let [name, _passwd, uid, gid, gecos, dir, shell] = fields.as_slice() else {
        return None;
    };
    if name.is_empty() {
        return None;
    }

    Some(Passwd {
        name: name.to_string(),
        uid: uid.parse().ok()?,
        gid: gid.parse().ok()?,
        gecos: (!gecos.is_empty()).then(|| gecos.to_string()),
        dir: PathBuf::from(dir),
        shell: PathBuf::from(shell),
    })
}

/// Parse a whole `passwd(5)` file, skipping lines [`parse_line`] rejects.
pub fn parse_file(text: &str) -> Vec<Passwd> {
    text.lines().filter_map(parse_line).collect()
}
