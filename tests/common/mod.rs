//! Fake procfs trees for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One process to lay out under the fake procfs root.
pub struct FakeProc<'a> {
    pub pid: u32,
    pub ppid: u32,
    pub comm: &'a str,
    pub cmdline: &'a [&'a str],
    pub utime: u64,
    pub stime: u64,
    pub threads: u64,
    pub start: u64,
    pub rss_kb: u64,
    pub read_bytes: u64,
    pub open_fds: usize,
    /// `(tid, name, utime)` per thread; empty lays out only the main thread.
    pub tasks: Vec<(u32, &'a str, u64)>,
}

impl<'a> FakeProc<'a> {
    pub fn new(pid: u32, ppid: u32, comm: &'a str, cmdline: &'a [&'a str]) -> Self {
        Self {
            pid,
            ppid,
            comm,
            cmdline,
            utime: 0,
            stime: 0,
            threads: 1,
            start: 1000 + pid as u64,
            rss_kb: 1024,
            read_bytes: 0,
            open_fds: 3,
            tasks: Vec::new(),
        }
    }
}

pub struct FakeProcfs {
    dir: TempDir,
}

impl FakeProcfs {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("stat"),
            "cpu  1 2 3 4 5 6 7 0 0 0\nbtime 1700000000\nprocesses 42\n",
        )
        .unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn proc_dir(&self, pid: u32) -> PathBuf {
        self.dir.path().join(pid.to_string())
    }

    /// Writes (or overwrites) every file the collector reads for `p`.
    pub fn write(&self, p: &FakeProc) {
        let dir = self.proc_dir(p.pid);
        fs::create_dir_all(dir.join("fd")).unwrap();

        let stat = stat_line(p.pid, p.comm, p.ppid, p.utime, p.stime, p.threads, p.start);
        fs::write(dir.join("stat"), stat).unwrap();

        let task = dir.join("task");
        if task.exists() {
            fs::remove_dir_all(&task).unwrap();
        }
        let main_thread = [(p.pid, p.comm, p.utime)];
        let tasks = if p.tasks.is_empty() {
            &main_thread[..]
        } else {
            &p.tasks[..]
        };
        for &(tid, name, utime) in tasks {
            let tdir = task.join(tid.to_string());
            fs::create_dir_all(&tdir).unwrap();
            let line = stat_line(tid, name, p.pid, utime, 0, p.threads, p.start);
            fs::write(tdir.join("stat"), line).unwrap();
        }

        let mut cmdline = Vec::new();
        for arg in p.cmdline {
            cmdline.extend_from_slice(arg.as_bytes());
            cmdline.push(0);
        }
        fs::write(dir.join("cmdline"), cmdline).unwrap();

        let status = format!(
            "Name:\t{}\nVmSize:\t{} kB\nVmRSS:\t{} kB\nVmSwap:\t0 kB\nThreads:\t{}\n",
            p.comm,
            p.rss_kb * 4,
            p.rss_kb,
            p.threads
        );
        fs::write(dir.join("status"), status).unwrap();

        let io = format!(
            "rchar: 0\nwchar: 0\nread_bytes: {}\nwrite_bytes: 0\n",
            p.read_bytes
        );
        fs::write(dir.join("io"), io).unwrap();

        for fd in 0..p.open_fds {
            fs::write(dir.join("fd").join(fd.to_string()), "").unwrap();
        }
    }

    /// Overwrites `<pid>/<file>` with arbitrary bytes.
    pub fn write_raw(&self, pid: u32, file: &str, content: &[u8]) {
        fs::write(self.proc_dir(pid).join(file), content).unwrap();
    }

    pub fn remove(&self, pid: u32) {
        fs::remove_dir_all(self.proc_dir(pid)).unwrap();
    }
}

fn stat_line(pid: u32, comm: &str, ppid: u32, utime: u64, stime: u64, threads: u64, start: u64) -> String {
    format!(
        "{} ({}) S {} {} {} 0 -1 4194304 0 0 0 0 {} {} 0 0 20 0 {} 0 {} 0 0",
        pid, comm, ppid, pid, pid, utime, stime, threads, start
    )
}
