//! Per-process group assignment and counter accumulation across passes.
//!
//! The tracker remembers every process it has seen, keyed by PID and start
//! time, together with the group it was assigned and the counter values of
//! the previous pass. Group counters only grow by the delta between two
//! observations of the same process, so a process seen for the first time
//! contributes nothing to them yet. Counts of processes that exit stay in the
//! group totals. Threads follow the same rules per thread name within a group.

use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;

use crate::process::{ProcKey, ProcSample, ThreadSample};
use crate::resolver::NameResolver;

/// Upper bound on parent links followed when looking for a tracked ancestor.
const MAX_ANCESTOR_DEPTH: usize = 64;

/// Options that shape group assignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackOptions {
    /// Untracked processes join the group of their nearest tracked ancestor.
    pub children: bool,
    /// Re-resolve known processes on every pass instead of caching the result.
    pub recheck: bool,
}

/// Monotonic counter values of one process or one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Counters {
    pub cpu_user_seconds: f64,
    pub cpu_system_seconds: f64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl Counters {
    fn of(sample: &ProcSample) -> Self {
        Self {
            cpu_user_seconds: sample.cpu_user_seconds,
            cpu_system_seconds: sample.cpu_system_seconds,
            read_bytes: sample.read_bytes,
            write_bytes: sample.write_bytes,
        }
    }

    /// Growth from `prev` to `self`; a counter that went backwards adds nothing.
    fn since(&self, prev: &Counters) -> Counters {
        Counters {
            cpu_user_seconds: (self.cpu_user_seconds - prev.cpu_user_seconds).max(0.0),
            cpu_system_seconds: (self.cpu_system_seconds - prev.cpu_system_seconds).max(0.0),
            read_bytes: self.read_bytes.saturating_sub(prev.read_bytes),
            write_bytes: self.write_bytes.saturating_sub(prev.write_bytes),
        }
    }

    fn of_thread(thread: &ThreadSample) -> Self {
        Self {
            cpu_user_seconds: thread.cpu_user_seconds,
            cpu_system_seconds: thread.cpu_system_seconds,
            ..Default::default()
        }
    }

    fn add(&mut self, other: &Counters) {
        self.cpu_user_seconds += other.cpu_user_seconds;
        self.cpu_system_seconds += other.cpu_system_seconds;
        self.read_bytes += other.read_bytes;
        self.write_bytes += other.write_bytes;
    }
}

/// Aggregated view of one group after a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSnapshot {
    pub num_procs: u64,
    pub num_threads: u64,
    pub counters: Counters,
    pub resident: u64,
    pub virtual_size: u64,
    pub swapped: u64,
    pub proportional: Option<u64>,
    pub open_fds: u64,
    /// `None` while the group has no live process.
    pub oldest_start_time_seconds: Option<f64>,
    /// Keyed by thread name.
    pub threads: BTreeMap<String, ThreadSnapshot>,
}

/// Threads of one name within a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadSnapshot {
    /// Live threads with this name.
    pub count: u64,
    /// Only CPU fields are used.
    pub counters: Counters,
}

#[derive(Debug, Clone)]
struct TrackedProc {
    group: Option<String>,
    last: Counters,
    /// Keyed by TID.
    threads: HashMap<u32, Counters>,
}

/// Mutable state carried from one collection pass to the next.
#[derive(Debug, Default)]
pub struct Tracker {
    procs: HashMap<ProcKey, TrackedProc>,
    totals: HashMap<String, Counters>,
    /// Group name, then thread name.
    thread_totals: HashMap<String, BTreeMap<String, Counters>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processes currently remembered, tracked or ignored.
    pub fn known(&self) -> usize {
        self.procs.len()
    }

    /// Assigns groups to `samples`, accumulates counters and aggregates.
    ///
    /// Processes missing from `samples` are forgotten.
    pub fn update(
        &mut self,
        samples: &[ProcSample],
        resolver: &dyn NameResolver,
        opts: TrackOptions,
    ) -> BTreeMap<String, GroupSnapshot> {
        let groups = self.assign_groups(samples, resolver, opts);

        let mut next: HashMap<ProcKey, TrackedProc> = HashMap::with_capacity(samples.len());
        let mut snapshots: BTreeMap<String, GroupSnapshot> = BTreeMap::new();

        for (sample, group) in samples.iter().zip(groups) {
            let key = sample.key();
            let current = Counters::of(sample);
            let prev = self.procs.get(&key);

            if let Some(group) = &group {
                if let Some(prev) = prev {
                    let delta = current.since(&prev.last);
                    self.totals.entry(group.clone()).or_default().add(&delta);
                } else {
                    self.totals.entry(group.clone()).or_default();
                }

                let snap = snapshots.entry(group.clone()).or_default();
                snap.num_procs += 1;
                snap.num_threads += sample.num_threads;
                snap.resident += sample.memory.resident;
                snap.virtual_size += sample.memory.virtual_size;
                snap.swapped += sample.memory.swapped;
                if let Some(pss) = sample.proportional {
                    *snap.proportional.get_or_insert(0) += pss;
                }
                snap.open_fds += sample.open_fds;
                snap.oldest_start_time_seconds = Some(match snap.oldest_start_time_seconds {
                    Some(t) => t.min(sample.start_time_seconds),
                    None => sample.start_time_seconds,
                });

                let group_threads = self.thread_totals.entry(group.clone()).or_default();
                for thread in &sample.threads {
                    let totals = group_threads.entry(thread.name.clone()).or_default();
                    if let Some(last) = prev.and_then(|p| p.threads.get(&thread.tid)) {
                        totals.add(&Counters::of_thread(thread).since(last));
                    }
                    snap.threads.entry(thread.name.clone()).or_default().count += 1;
                }
            }

            let threads = sample
                .threads
                .iter()
                .map(|t| (t.tid, Counters::of_thread(t)))
                .collect();
            next.insert(
                key,
                TrackedProc {
                    group,
                    last: current,
                    threads,
                },
            );
        }

        self.procs = next;

        for (group, totals) in &self.totals {
            snapshots.entry(group.clone()).or_default().counters = *totals;
        }
        for (group, names) in &self.thread_totals {
            let snap = snapshots.entry(group.clone()).or_default();
            for (name, totals) in names {
                snap.threads.entry(name.clone()).or_default().counters = *totals;
            }
        }
        snapshots
    }

    /// Group for each sample, in the same order.
    fn assign_groups(
        &self,
        samples: &[ProcSample],
        resolver: &dyn NameResolver,
        opts: TrackOptions,
    ) -> Vec<Option<String>> {
        let mut fresh = vec![false; samples.len()];
        let mut groups: Vec<Option<String>> = samples
            .iter()
            .enumerate()
            .map(|(i, sample)| match self.procs.get(&sample.key()) {
                Some(known) if !opts.recheck => known.group.clone(),
                _ => {
                    fresh[i] = true;
                    let (matched, name) = resolver.match_and_name(&sample.attrs);
                    matched.then_some(name)
                }
            })
            .collect();

        if !opts.children {
            return groups;
        }

        let by_pid: HashMap<u32, usize> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.pid, i))
            .collect();

        for i in 0..samples.len() {
            if groups[i].is_some() || !fresh[i] {
                continue;
            }
            let mut ppid = samples[i].ppid;
            for _ in 0..MAX_ANCESTOR_DEPTH {
                let Some(&parent) = by_pid.get(&ppid) else {
                    break;
                };
                if parent == i {
                    break;
                }
                if let Some(group) = &groups[parent] {
                    groups[i] = Some(group.clone());
                    break;
                }
                ppid = samples[parent].ppid;
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{CommandLineResolver, ProcAttributes};

    fn sample(pid: u32, ppid: u32, name: &str, cmdline: &[&str]) -> ProcSample {
        ProcSample {
            pid,
            ppid,
            start_ticks: 100 + pid as u64,
            attrs: ProcAttributes::new(name, cmdline.iter().map(|s| s.to_string()).collect()),
            num_threads: 1,
            start_time_seconds: 1000.0 + pid as f64,
            ..Default::default()
        }
    }

    fn resolver(names: &str, mapping: &str) -> CommandLineResolver {
        CommandLineResolver::from_flags(names, mapping).unwrap()
    }

    const PLAIN: TrackOptions = TrackOptions {
        children: false,
        recheck: false,
    };

    // -------------------------------------------------------------------------
    // Tests for grouping
    // -------------------------------------------------------------------------

    #[test]
    fn test_unmatched_processes_are_dropped() {
        let r = resolver("nginx", "");
        let mut t = Tracker::new();
        let groups = t.update(
            &[sample(1, 0, "nginx", &["nginx"]), sample(2, 0, "bash", &["bash"])],
            &r,
            PLAIN,
        );
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["nginx"]);
        assert_eq!(groups["nginx"].num_procs, 1);
        assert_eq!(t.known(), 2);
    }

    #[test]
    fn test_same_group_is_aggregated() {
        let r = resolver("", r"python2,([^/]+)\.py");
        let mut a = sample(10, 1, "python2", &["python2", "job.py"]);
        a.memory.resident = 100;
        a.num_threads = 2;
        let mut b = sample(11, 1, "python2", &["python2", "job.py"]);
        b.memory.resident = 50;
        b.num_threads = 3;
        let c = sample(12, 1, "python2", &["python2", "other.py"]);

        let groups = Tracker::new().update(&[a, b, c], &r, PLAIN);
        let job = &groups["python2:job"];
        assert_eq!(job.num_procs, 2);
        assert_eq!(job.num_threads, 5);
        assert_eq!(job.resident, 150);
        assert_eq!(job.oldest_start_time_seconds, Some(1010.0));
        assert_eq!(groups["python2:other"].num_procs, 1);
    }

    #[test]
    fn test_children_join_tracked_ancestor() {
        let r = resolver("sshd", "");
        let samples = [
            sample(1, 0, "systemd", &["/sbin/init"]),
            sample(100, 1, "sshd", &["sshd"]),
            sample(200, 100, "bash", &["-bash"]),
            sample(300, 200, "vim", &["vim"]),
            sample(400, 1, "cron", &["cron"]),
        ];

        let with_children = Tracker::new().update(
            &samples,
            &r,
            TrackOptions {
                children: true,
                recheck: false,
            },
        );
        assert_eq!(with_children["sshd"].num_procs, 3);

        let without = Tracker::new().update(&samples, &r, PLAIN);
        assert_eq!(without["sshd"].num_procs, 1);
    }

    // -------------------------------------------------------------------------
    // Tests for counter accumulation
    // -------------------------------------------------------------------------

    #[test]
    fn test_first_observation_contributes_no_counts() {
        let r = resolver("app", "");
        let mut t = Tracker::new();

        let mut s = sample(5, 1, "app", &["app"]);
        s.cpu_user_seconds = 40.0;
        s.read_bytes = 1000;
        let first = t.update(&[s.clone()], &r, PLAIN);
        assert_eq!(first["app"].counters, Counters::default());

        s.cpu_user_seconds = 42.5;
        s.read_bytes = 1500;
        let second = t.update(&[s], &r, PLAIN);
        assert_eq!(second["app"].counters.cpu_user_seconds, 2.5);
        assert_eq!(second["app"].counters.read_bytes, 500);
    }

    #[test]
    fn test_counts_survive_process_exit() {
        let r = resolver("app", "");
        let mut t = Tracker::new();

        let mut s = sample(5, 1, "app", &["app"]);
        t.update(&[s.clone()], &r, PLAIN);
        s.write_bytes = 64;
        t.update(&[s], &r, PLAIN);

        let after_exit = t.update(&[], &r, PLAIN);
        let app = &after_exit["app"];
        assert_eq!(app.num_procs, 0);
        assert_eq!(app.counters.write_bytes, 64);
        assert_eq!(app.oldest_start_time_seconds, None);
        assert_eq!(t.known(), 0);
    }

    #[test]
    fn test_recycled_pid_starts_new_baseline() {
        let r = resolver("app", "");
        let mut t = Tracker::new();

        let mut s = sample(5, 1, "app", &["app"]);
        s.cpu_system_seconds = 10.0;
        t.update(&[s.clone()], &r, PLAIN);

        s.start_ticks += 1;
        s.cpu_system_seconds = 3.0;
        let groups = t.update(&[s], &r, PLAIN);
        assert_eq!(groups["app"].counters.cpu_system_seconds, 0.0);
    }

    // -------------------------------------------------------------------------
    // Tests for thread accumulation
    // -------------------------------------------------------------------------

    fn thread(tid: u32, name: &str, user: f64) -> ThreadSample {
        ThreadSample {
            tid,
            name: name.to_string(),
            cpu_user_seconds: user,
            cpu_system_seconds: 0.0,
        }
    }

    #[test]
    fn test_threads_accumulate_by_name() {
        let r = resolver("java", "");
        let mut t = Tracker::new();

        let mut s = sample(60, 1, "java", &["java"]);
        s.threads = vec![thread(60, "java", 1.0), thread(61, "GC", 5.0), thread(62, "GC", 5.0)];
        let first = t.update(&[s.clone()], &r, PLAIN);
        assert_eq!(first["java"].threads["GC"].count, 2);
        assert_eq!(first["java"].threads["GC"].counters, Counters::default());

        // 62 exits, 63 is new and contributes nothing until its next pass
        s.threads = vec![thread(60, "java", 1.5), thread(61, "GC", 7.0), thread(63, "GC", 9.0)];
        let second = t.update(&[s.clone()], &r, PLAIN);
        assert_eq!(second["java"].threads["GC"].count, 2);
        assert_eq!(second["java"].threads["GC"].counters.cpu_user_seconds, 2.0);
        assert_eq!(second["java"].threads["java"].counters.cpu_user_seconds, 0.5);

        s.threads.clear();
        let idle = t.update(&[s], &r, PLAIN);
        assert_eq!(idle["java"].threads["GC"].count, 0);
        assert_eq!(idle["java"].threads["GC"].counters.cpu_user_seconds, 2.0);
    }

    #[test]
    fn test_threads_of_untracked_processes_are_ignored() {
        let r = resolver("java", "");
        let mut s = sample(70, 1, "bash", &["bash"]);
        s.threads = vec![thread(70, "bash", 1.0)];
        let groups = Tracker::new().update(&[s], &r, PLAIN);
        assert!(groups.is_empty());
    }

    // -------------------------------------------------------------------------
    // Tests for recheck
    // -------------------------------------------------------------------------

    #[derive(Debug)]
    struct FlipResolver(std::sync::atomic::AtomicBool);

    impl NameResolver for FlipResolver {
        fn match_and_name(&self, attrs: &ProcAttributes) -> (bool, String) {
            let on = self.0.load(std::sync::atomic::Ordering::SeqCst);
            (on, if on { attrs.name.clone() } else { String::new() })
        }
    }

    #[test]
    fn test_group_is_cached_without_recheck() {
        let r = FlipResolver(std::sync::atomic::AtomicBool::new(true));
        let s = sample(7, 1, "worker", &["worker"]);
        let mut t = Tracker::new();
        t.update(&[s.clone()], &r, PLAIN);

        r.0.store(false, std::sync::atomic::Ordering::SeqCst);
        let cached = t.update(&[s.clone()], &r, PLAIN);
        assert_eq!(cached["worker"].num_procs, 1);

        let rechecked = t.update(
            &[s],
            &r,
            TrackOptions {
                children: false,
                recheck: true,
            },
        );
        assert_eq!(rechecked["worker"].num_procs, 0);
    }
}
