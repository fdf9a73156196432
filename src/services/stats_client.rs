use dashmap::DashMap;
use log::debug;

/// Fire-and-forget metrics sink. Implementations must never block or fail.
pub trait StatsClient: Send + Sync {
    fn incr(&self, metric: &str, tags: &[String]);
}

/// Writes counters to the log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatsClient;

impl StatsClient for LogStatsClient {
    fn incr(&self, metric: &str, tags: &[String]) {
        debug!("metric {} +1 [{}]", metric, tags.join(","));
    }
}

/// Keeps counters in process, keyed by metric name and tag set.
#[derive(Debug, Default)]
pub struct InMemoryStatsClient {
    counters: DashMap<String, u64>,
}

impl InMemoryStatsClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter_key(metric: &str, tags: &[String]) -> String {
        let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        format!("{}|{}", metric, sorted.join(","))
    }

    /// Count for an exact metric + tag combination (tag order is irrelevant).
    pub fn count(&self, metric: &str, tags: &[&str]) -> u64 {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.counters
            .get(&Self::counter_key(metric, &tags))
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    /// Sum over every tag combination of a metric.
    pub fn total(&self, metric: &str) -> u64 {
        let prefix = format!("{}|", metric);
        self.counters
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| *entry.value())
            .sum()
    }
}

impl StatsClient for InMemoryStatsClient {
    fn incr(&self, metric: &str, tags: &[String]) {
        *self
            .counters
            .entry(Self::counter_key(metric, tags))
            .or_insert(0) += 1;
    }
}
