//! Per-thread CPU counters from `/proc/<pid>/task/<tid>/stat`.

use std::io;
use std::path::Path;

use super::scanner::collect_proc_entries;
use super::stat::read_stat;

/// One thread of a process. `name` is the thread's own comm, which
/// applications often set per worker pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadSample {
    pub tid: u32,
    pub name: String,
    pub cpu_user_seconds: f64,
    pub cpu_system_seconds: f64,
}

/// Reads every thread listed under `<proc_path>/task`.
///
/// Failing to list `task/` is an error. A thread that exits between listing
/// and reading is skipped.
pub fn read_threads(proc_path: &Path) -> Result<Vec<ThreadSample>, io::Error> {
    let tasks = collect_proc_entries(&proc_path.join("task"))?;
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        let Ok(stat) = read_stat(&task.proc_path) else {
            continue;
        };
        out.push(ThreadSample {
            tid: task.pid,
            cpu_user_seconds: stat.user_seconds(),
            cpu_system_seconds: stat.system_seconds(),
            name: stat.comm,
        });
    }
    Ok(out)
}
