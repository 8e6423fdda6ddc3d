//! Prometheus metrics definitions for named-process-exporter.
//!
//! Every per-process value is exported only in aggregate, under the group name
//! assigned by the name resolver. No per-PID series exist.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, IntCounter, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::error::CollectError;

/// Label carrying the resolved group name on every group series.
pub const GROUP_LABEL: &str = "groupname";

/// Label carrying the thread's comm from `/proc/<pid>/task/<tid>/stat`.
pub const THREAD_LABEL: &str = "threadname";

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Collection of group-level and exporter-level metrics.
#[derive(Clone)]
pub struct GroupMetrics {
    // ========== Group Metrics ==========
    pub num_procs: IntGaugeVec,   // labels: groupname
    pub num_threads: IntGaugeVec, // labels: groupname
    pub cpu_seconds_total: CounterVec, // labels: groupname, mode
    pub read_bytes_total: CounterVec,  // labels: groupname
    pub write_bytes_total: CounterVec, // labels: groupname
    pub memory_bytes: GaugeVec,        // labels: groupname, memtype
    pub open_filedesc: IntGaugeVec,    // labels: groupname
    pub oldest_start_time_seconds: GaugeVec, // labels: groupname
    pub thread_count: IntGaugeVec,           // labels: groupname, threadname
    pub thread_cpu_seconds_total: CounterVec, // labels: groupname, threadname, mode

    // ========== Exporter Metrics ==========
    pub scrape_errors: IntCounter,
    pub scrape_procread_errors: IntCounter,
    pub scrape_partial_errors: IntCounter,
    pub build_info: Gauge,
}

impl GroupMetrics {
    /// Creates and registers all metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let num_procs = IntGaugeVec::new(
            Opts::new(
                "namedprocess_namegroup_num_procs",
                "number of processes in this group",
            ),
            &[GROUP_LABEL],
        )?;
        let num_threads = IntGaugeVec::new(
            Opts::new(
                "namedprocess_namegroup_num_threads",
                "Number of threads",
            ),
            &[GROUP_LABEL],
        )?;
        let cpu_seconds_total = CounterVec::new(
            Opts::new(
                "namedprocess_namegroup_cpu_seconds_total",
                "Cpu user usage in seconds",
            ),
            &[GROUP_LABEL, "mode"],
        )?;
        let read_bytes_total = CounterVec::new(
            Opts::new(
                "namedprocess_namegroup_read_bytes_total",
                "number of bytes read by this group",
            ),
            &[GROUP_LABEL],
        )?;
        let write_bytes_total = CounterVec::new(
            Opts::new(
                "namedprocess_namegroup_write_bytes_total",
                "number of bytes written by this group",
            ),
            &[GROUP_LABEL],
        )?;
        let memory_bytes = GaugeVec::new(
            Opts::new(
                "namedprocess_namegroup_memory_bytes",
                "number of bytes of memory in use",
            ),
            &[GROUP_LABEL, "memtype"],
        )?;
        let open_filedesc = IntGaugeVec::new(
            Opts::new(
                "namedprocess_namegroup_open_filedesc",
                "number of open file descriptors for this group",
            ),
            &[GROUP_LABEL],
        )?;
        let oldest_start_time_seconds = GaugeVec::new(
            Opts::new(
                "namedprocess_namegroup_oldest_start_time_seconds",
                "start time in seconds since 1970/01/01 of oldest process in group",
            ),
            &[GROUP_LABEL],
        )?;
        let thread_count = IntGaugeVec::new(
            Opts::new(
                "namedprocess_namegroup_thread_count",
                "Number of threads in this group with same threadname",
            ),
            &[GROUP_LABEL, THREAD_LABEL],
        )?;
        let thread_cpu_seconds_total = CounterVec::new(
            Opts::new(
                "namedprocess_namegroup_thread_cpu_seconds_total",
                "Cpu user/system usage in seconds",
            ),
            &[GROUP_LABEL, THREAD_LABEL, "mode"],
        )?;

        let scrape_errors = IntCounter::new(
            "namedprocess_scrape_errors",
            "general scrape errors: no proc metrics collected during a cycle",
        )?;
        let scrape_procread_errors = IntCounter::new(
            "namedprocess_scrape_procread_errors",
            "incremented each time a proc's metrics collection fails",
        )?;
        let scrape_partial_errors = IntCounter::new(
            "namedprocess_scrape_partial_errors",
            "incremented each time a tracked proc's metrics collection fails partially, e.g. unreadable I/O stats",
        )?;
        let build_info = Gauge::with_opts(
            Opts::new(
                "namedprocess_exporter_build_info",
                "A metric with a constant '1' value labeled by version from which the exporter was built.",
            )
            .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        build_info.set(1.0);

        registry.register(Box::new(num_procs.clone()))?;
        registry.register(Box::new(num_threads.clone()))?;
        registry.register(Box::new(cpu_seconds_total.clone()))?;
        registry.register(Box::new(read_bytes_total.clone()))?;
        registry.register(Box::new(write_bytes_total.clone()))?;
        registry.register(Box::new(memory_bytes.clone()))?;
        registry.register(Box::new(open_filedesc.clone()))?;
        registry.register(Box::new(oldest_start_time_seconds.clone()))?;
        registry.register(Box::new(thread_count.clone()))?;
        registry.register(Box::new(thread_cpu_seconds_total.clone()))?;
        registry.register(Box::new(scrape_errors.clone()))?;
        registry.register(Box::new(scrape_procread_errors.clone()))?;
        registry.register(Box::new(scrape_partial_errors.clone()))?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            num_procs,
            num_threads,
            cpu_seconds_total,
            read_bytes_total,
            write_bytes_total,
            memory_bytes,
            open_filedesc,
            oldest_start_time_seconds,
            thread_count,
            thread_cpu_seconds_total,
            scrape_errors,
            scrape_procread_errors,
            scrape_partial_errors,
            build_info,
        })
    }

    /// Drops all group series so that groups that vanished are not exported.
    pub fn reset_group_metrics(&self) {
        self.num_procs.reset();
        self.num_threads.reset();
        self.cpu_seconds_total.reset();
        self.read_bytes_total.reset();
        self.write_bytes_total.reset();
        self.memory_bytes.reset();
        self.open_filedesc.reset();
        self.oldest_start_time_seconds.reset();
        self.thread_count.reset();
        self.thread_cpu_seconds_total.reset();
    }
}

/// Encodes everything in `registry` in the Prometheus text format.
pub fn encode_registry(registry: &Registry) -> Result<String, CollectError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
