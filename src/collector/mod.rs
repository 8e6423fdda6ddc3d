//! Process collector: procfs sampling, name resolution and group export.
//!
//! One call to [`ProcessCollector::collect`] is one resolution pass. It reads
//! every process under the procfs root, asks the name resolver for each one,
//! folds the result into the tracker and rewrites the group series of the
//! registry.

pub mod tracker;

use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::error::CollectError;
use crate::metrics::GroupMetrics;
use crate::process::{collect_proc_entries, read_boot_time, read_sample, ProcSample, ReadOptions};
use crate::resolver::NameResolver;

pub use tracker::{Counters, GroupSnapshot, ThreadSnapshot, TrackOptions, Tracker};

/// Collector settings taken from the command line.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub procfs: PathBuf,
    pub children: bool,
    pub gather_smaps: bool,
    /// Export per-thread-name series.
    pub threads: bool,
    pub recheck: bool,
    pub debug: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            procfs: PathBuf::from("/proc"),
            children: true,
            gather_smaps: true,
            threads: true,
            recheck: false,
            debug: false,
        }
    }
}

/// Outcome counts of one pass, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub processes: usize,
    pub groups: usize,
    pub read_errors: u64,
    pub partial_errors: u64,
}

pub struct ProcessCollector {
    options: CollectorOptions,
    resolver: Arc<dyn NameResolver>,
    metrics: GroupMetrics,
    tracker: Mutex<Tracker>,
}

impl ProcessCollector {
    pub fn new(
        options: CollectorOptions,
        resolver: Arc<dyn NameResolver>,
        metrics: GroupMetrics,
    ) -> Self {
        Self {
            options,
            resolver,
            metrics,
            tracker: Mutex::new(Tracker::new()),
        }
    }

    pub fn options(&self) -> &CollectorOptions {
        &self.options
    }

    /// Runs one resolution pass and updates the registered metrics.
    ///
    /// Passes are serialised on the tracker lock; the resolver itself is
    /// shared without locking.
    #[instrument(skip(self), fields(procfs = %self.options.procfs.display()))]
    pub fn collect(&self) -> Result<PassSummary, CollectError> {
        let start = Instant::now();

        let entries = collect_proc_entries(&self.options.procfs).map_err(|source| {
            self.metrics.scrape_errors.inc();
            CollectError::Enumerate {
                path: self.options.procfs.clone(),
                source,
            }
        })?;
        debug!("Collected {} process entries", entries.len());

        let boot_time = read_boot_time(&self.options.procfs).unwrap_or_else(|e| {
            warn!("Cannot read boot time: {} - start times are relative to boot", e);
            0
        });

        let read_errors = AtomicU64::new(0);
        let partial_errors = AtomicU64::new(0);
        let read_opts = ReadOptions {
            gather_smaps: self.options.gather_smaps,
            threads: self.options.threads,
        };

        let samples: Vec<ProcSample> = entries
            .par_iter()
            .filter_map(|entry| match read_sample(entry, boot_time, read_opts) {
                Ok(read) => {
                    if read.partial {
                        partial_errors.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(read.sample)
                }
                Err(e) => {
                    // Processes routinely exit between listing and reading.
                    debug!("Skipping process {}: {}", entry.pid, e);
                    read_errors.fetch_add(1, Ordering::Relaxed);
                    None
                }
            })
            .collect();

        let opts = TrackOptions {
            children: self.options.children,
            recheck: self.options.recheck,
        };

        let mut tracker = match self.tracker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Tracker lock poisoned by an earlier pass, continuing");
                poisoned.into_inner()
            }
        };
        let groups = tracker.update(&samples, self.resolver.as_ref(), opts);
        self.export(&groups);
        drop(tracker);

        let summary = PassSummary {
            processes: samples.len(),
            groups: groups.len(),
            read_errors: read_errors.load(Ordering::Relaxed),
            partial_errors: partial_errors.load(Ordering::Relaxed),
        };
        self.metrics
            .scrape_procread_errors
            .inc_by(summary.read_errors);
        self.metrics
            .scrape_partial_errors
            .inc_by(summary.partial_errors);

        if self.options.debug {
            for (name, g) in &groups {
                debug!(
                    "group {}: {} procs, {} threads, RSS {} bytes",
                    name, g.num_procs, g.num_threads, g.resident
                );
            }
        }
        debug!(
            "Pass finished in {:.3}s: {} processes, {} groups, {} read errors",
            start.elapsed().as_secs_f64(),
            summary.processes,
            summary.groups,
            summary.read_errors
        );
        Ok(summary)
    }

    /// Replaces the group series with `groups`.
    fn export(&self, groups: &std::collections::BTreeMap<String, GroupSnapshot>) {
        let m = &self.metrics;
        m.reset_group_metrics();

        for (group, g) in groups {
            let group = group.as_str();
            m.num_procs
                .with_label_values(&[group])
                .set(g.num_procs as i64);
            m.num_threads
                .with_label_values(&[group])
                .set(g.num_threads as i64);
            m.open_filedesc
                .with_label_values(&[group])
                .set(g.open_fds as i64);

            m.cpu_seconds_total
                .with_label_values(&[group, "user"])
                .inc_by(g.counters.cpu_user_seconds);
            m.cpu_seconds_total
                .with_label_values(&[group, "system"])
                .inc_by(g.counters.cpu_system_seconds);
            m.read_bytes_total
                .with_label_values(&[group])
                .inc_by(g.counters.read_bytes as f64);
            m.write_bytes_total
                .with_label_values(&[group])
                .inc_by(g.counters.write_bytes as f64);

            m.memory_bytes
                .with_label_values(&[group, "resident"])
                .set(g.resident as f64);
            m.memory_bytes
                .with_label_values(&[group, "virtual"])
                .set(g.virtual_size as f64);
            m.memory_bytes
                .with_label_values(&[group, "swapped"])
                .set(g.swapped as f64);
            if self.options.gather_smaps {
                m.memory_bytes
                    .with_label_values(&[group, "proportionalResident"])
                    .set(g.proportional.unwrap_or(0) as f64);
            }

            if let Some(t) = g.oldest_start_time_seconds {
                m.oldest_start_time_seconds
                    .with_label_values(&[group])
                    .set(t);
            }

            for (thread, t) in &g.threads {
                let thread = thread.as_str();
                m.thread_count
                    .with_label_values(&[group, thread])
                    .set(t.count as i64);
                m.thread_cpu_seconds_total
                    .with_label_values(&[group, thread, "user"])
                    .inc_by(t.counters.cpu_user_seconds);
                m.thread_cpu_seconds_total
                    .with_label_values(&[group, thread, "system"])
                    .inc_by(t.counters.cpu_system_seconds);
            }
        }
    }
}
