//! Process scanning utilities for discovering and reading process entries from procfs.
//!
//! This module provides functions to enumerate numeric PID directories and
//! read the command line of a process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Process entry representing a directory in the procfs mount.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans `root` for process entries with numeric PIDs.
///
/// Failing to list `root` itself is an error; unreadable entries are skipped.
pub fn collect_proc_entries(root: &Path) -> Result<Vec<ProcEntry>, io::Error> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let p = entry.path();
        let name = match p.file_name().and_then(|s| s.to_str()) {
            Some(v) => v,
            None => continue,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let pid: u32 = match name.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        out.push(ProcEntry { pid, proc_path: p });
    }
    out.sort_unstable_by_key(|e| e.pid);
    Ok(out)
}

/// Splits NUL-separated `cmdline` content into arguments.
pub fn parse_cmdline(content: &[u8]) -> Vec<String> {
    let content = content.strip_suffix(&[0u8]).unwrap_or(content);
    if content.is_empty() {
        return Vec::new();
    }
    content
        .split(|&b| b == 0u8)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Reads `<proc_path>/cmdline`. Kernel threads yield an empty list.
pub fn read_cmdline(proc_path: &Path) -> Result<Vec<String>, io::Error> {
    let content = fs::read(proc_path.join("cmdline"))?;
    Ok(parse_cmdline(&content))
}
