//! CPU and identity fields parsed from `/proc/<pid>/stat`.
//!
//! This module provides functions to parse the stat line of a process and the
//! system boot time needed to turn start ticks into a Unix timestamp.

use once_cell::sync::Lazy;
use std::fs;
use std::io;
use std::path::Path;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    // Fallback to common default for error cases or non-Unix platforms
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Fields of `/proc/<pid>/stat` used by the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcStat {
    pub comm: String,
    pub ppid: u32,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub num_threads: u64,
    pub starttime_ticks: u64,
}

impl ProcStat {
    pub fn user_seconds(&self) -> f64 {
        self.utime_ticks as f64 / *CLK_TCK
    }

    pub fn system_seconds(&self) -> f64 {
        self.stime_ticks as f64 / *CLK_TCK
    }

    /// Start time as seconds since the Unix epoch.
    pub fn start_time_seconds(&self, boot_time: u64) -> f64 {
        boot_time as f64 + self.starttime_ticks as f64 / *CLK_TCK
    }
}

/// Parses a stat line. The comm field may itself contain spaces and
/// parentheses, so fields are counted from the last `)`.
pub fn parse_stat_line(content: &str) -> Result<ProcStat, io::Error> {
    let open = content
        .find('(')
        .ok_or_else(|| io::Error::other("Invalid stat format: no comm"))?;
    let close = content
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| io::Error::other("Invalid stat format: no comm"))?;

    let comm = content[open + 1..close].to_string();
    // parts[0] is field 3 (state)
    let parts: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if parts.len() <= 19 {
        return Err(io::Error::other("Invalid stat format"));
    }

    let field = |idx: usize, what: &str| -> Result<u64, io::Error> {
        parts[idx]
            .parse()
            .map_err(|_| io::Error::other(format!("Failed to parse {} field", what)))
    };

    Ok(ProcStat {
        comm,
        ppid: field(1, "ppid")? as u32,
        utime_ticks: field(11, "utime")?,
        stime_ticks: field(12, "stime")?,
        num_threads: field(17, "num_threads")?,
        starttime_ticks: field(19, "starttime")?,
    })
}

/// Reads and parses `<proc_path>/stat`.
///
/// comm is raw bytes chosen by the process; invalid UTF-8 is replaced rather
/// than failing the read.
pub fn read_stat(proc_path: &Path) -> Result<ProcStat, io::Error> {
    let content = fs::read(proc_path.join("stat"))?;
    parse_stat_line(&String::from_utf8_lossy(&content))
}

/// Reads the `btime` line of `<procfs>/stat`.
pub fn read_boot_time(procfs: &Path) -> Result<u64, io::Error> {
    let content = fs::read_to_string(procfs.join("stat"))?;
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime"))
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| io::Error::other("btime not found"))
}
