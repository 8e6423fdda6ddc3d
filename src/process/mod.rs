//! Process-related modules for reading one process sample from procfs.
//!
//! This module provides:
//! - `scanner`: PID enumeration and cmdline reading
//! - `stat`: `/proc/<pid>/stat` parsing and boot time
//! - `memory`: status, smaps_rollup, io and fd readers
//! - `threads`: per-thread names and CPU counters

pub mod memory;
pub mod scanner;
pub mod stat;
pub mod threads;

use std::io;
use std::path::Path;

use crate::resolver::ProcAttributes;

pub use memory::{count_open_fds, read_block_io, read_pss, read_status_memory, StatusMemory};
pub use scanner::{collect_proc_entries, read_cmdline, ProcEntry};
pub use stat::{read_boot_time, read_stat, ProcStat, CLK_TCK};
pub use threads::{read_threads, ThreadSample};

/// Identity of a process across samples; a recycled PID gets a new start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcKey {
    pub pid: u32,
    pub start_ticks: u64,
}

/// Everything the collector needs from one process at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcSample {
    pub pid: u32,
    pub ppid: u32,
    pub start_ticks: u64,
    pub attrs: ProcAttributes,
    pub cpu_user_seconds: f64,
    pub cpu_system_seconds: f64,
    pub num_threads: u64,
    pub memory: StatusMemory,
    /// Only read when smaps gathering is enabled.
    pub proportional: Option<u64>,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub open_fds: u64,
    pub start_time_seconds: f64,
    /// Empty unless thread gathering is enabled.
    pub threads: Vec<ThreadSample>,
}

impl ProcSample {
    pub fn key(&self) -> ProcKey {
        ProcKey {
            pid: self.pid,
            start_ticks: self.start_ticks,
        }
    }
}

/// A sample plus whether some optional files could not be read.
#[derive(Debug, Clone)]
pub struct SampleRead {
    pub sample: ProcSample,
    pub partial: bool,
}

/// Which optional files [`read_sample`] reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub gather_smaps: bool,
    pub threads: bool,
}

/// Reads one process.
///
/// `stat`, `cmdline` and `status` are required. `io`, `fd/` and `smaps_rollup` usually
/// need privileges for foreign processes; failures there, or in `task/`, mark
/// the read as partial and leave the field at zero.
pub fn read_sample(
    entry: &ProcEntry,
    boot_time: u64,
    opts: ReadOptions,
) -> Result<SampleRead, io::Error> {
    let path: &Path = &entry.proc_path;
    let stat = read_stat(path)?;
    let cmdline = read_cmdline(path)?;
    let memory = read_status_memory(path)?;

    let mut partial = false;
    let (read_bytes, write_bytes) = read_block_io(path).unwrap_or_else(|_| {
        partial = true;
        (0, 0)
    });
    let open_fds = count_open_fds(path).unwrap_or_else(|_| {
        partial = true;
        0
    });
    let proportional = if opts.gather_smaps {
        match read_pss(path) {
            Ok(pss) => Some(pss),
            Err(_) => {
                partial = true;
                None
            }
        }
    } else {
        None
    };
    let threads = if opts.threads {
        read_threads(path).unwrap_or_else(|_| {
            partial = true;
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let sample = ProcSample {
        pid: entry.pid,
        ppid: stat.ppid,
        start_ticks: stat.starttime_ticks,
        cpu_user_seconds: stat.user_seconds(),
        cpu_system_seconds: stat.system_seconds(),
        num_threads: stat.num_threads,
        start_time_seconds: stat.start_time_seconds(boot_time),
        attrs: ProcAttributes::new(stat.comm, cmdline),
        memory,
        proportional,
        read_bytes,
        write_bytes,
        open_fds,
        threads,
    };
    Ok(SampleRead { sample, partial })
}
