//! Memory and I/O readers for a single process.
//!
//! This module provides functions to parse `/proc/<pid>/status`,
//! `/proc/<pid>/smaps_rollup`, `/proc/<pid>/io` and to count open descriptors.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Memory sizes from `/proc/<pid>/status`, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusMemory {
    pub resident: u64,
    pub virtual_size: u64,
    pub swapped: u64,
}

/// Parses kilobyte values from smaps and status file lines.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Parses VmRSS, VmSize and VmSwap out of a status file.
///
/// Kernel threads have none of these lines and report zero.
pub fn parse_status(content: &str) -> StatusMemory {
    let mut mem = StatusMemory::default();
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("VmRSS:") {
            mem.resident = parse_kb_value(v).unwrap_or(0) * 1024;
        } else if let Some(v) = line.strip_prefix("VmSize:") {
            mem.virtual_size = parse_kb_value(v).unwrap_or(0) * 1024;
        } else if let Some(v) = line.strip_prefix("VmSwap:") {
            mem.swapped = parse_kb_value(v).unwrap_or(0) * 1024;
        }
    }
    mem
}

/// The `Name:` line repeats comm and may hold invalid UTF-8.
pub fn read_status_memory(proc_path: &Path) -> Result<StatusMemory, io::Error> {
    let content = fs::read(proc_path.join("status"))?;
    Ok(parse_status(&String::from_utf8_lossy(&content)))
}

/// Proportional set size in bytes from `smaps_rollup` (Linux >= 4.14).
pub fn read_pss(proc_path: &Path) -> Result<u64, io::Error> {
    let file = fs::File::open(proc_path.join("smaps_rollup"))?;
    let reader = BufReader::new(file);

    let mut pss_kb = 0;
    for line in reader.lines() {
        let l = line?;
        if let Some(v) = l.strip_prefix("Pss:") {
            pss_kb += parse_kb_value(v).unwrap_or(0);
        }
    }
    Ok(pss_kb * 1024)
}

/// Reads Block I/O statistics from /proc/[pid]/io.
/// Returns (read_bytes, write_bytes) from storage devices.
/// Note: Requires appropriate permissions (usually root or CAP_SYS_PTRACE).
pub fn read_block_io(proc_path: &Path) -> Result<(u64, u64), io::Error> {
    let content = fs::read_to_string(proc_path.join("io"))?;

    let mut read_bytes = 0u64;
    let mut write_bytes = 0u64;
    let mut found_read = false;
    let mut found_write = false;

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("read_bytes:") {
            read_bytes = v.trim().parse().unwrap_or(0);
            found_read = true;
        } else if let Some(v) = line.strip_prefix("write_bytes:") {
            write_bytes = v.trim().parse().unwrap_or(0);
            found_write = true;
        }

        if found_read && found_write {
            break;
        }
    }

    Ok((read_bytes, write_bytes))
}

/// Number of entries in `/proc/<pid>/fd`.
pub fn count_open_fds(proc_path: &Path) -> Result<u64, io::Error> {
    Ok(fs::read_dir(proc_path.join("fd"))?.count() as u64)
}
