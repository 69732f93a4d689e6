/// Background producers
///
/// A feed runs a [`FeedSource`] on its own thread, polling it at a fixed
/// interval. Each poll writes into a [`Table`] through the ordinary batched
/// mutation API, so consumers on other threads see whole updates only.
///
/// Stopping is explicit: [`FeedHandle::stop`] signals a cancellation channel
/// the worker waits on between polls, so the worker wakes immediately rather
/// than at the end of its interval. The returned [`FeedOutcome`] tells an
/// intentional stop apart from an exhausted source and from a failure.
///
/// # Examples
///
/// ```
/// use liveseries::feed::{spawn_feed, FeedConfig, FeedOutcome, RowFeed};
/// use liveseries::{Series, Table, ValueKind};
///
/// let table = Table::new("ticks");
/// table.add_series("symbol", Series::new(ValueKind::Generic)).unwrap();
/// table.add_series("price", Series::new(ValueKind::Float64)).unwrap();
///
/// let rows = vec![vec!["ACME", "12.5"], vec!["INIT", "n/a"]];
/// let config = FeedConfig { interval_ms: 1, ..FeedConfig::default() };
/// let handle = spawn_feed(config, table.clone(), RowFeed::new(rows)).unwrap();
///
/// assert!(matches!(handle.join(), FeedOutcome::Completed));
/// assert_eq!(table.len(), 2);
/// assert!(table.get_series("price").unwrap().is_empty_at(1).unwrap());
/// ```

use crate::error::Error as DataError;
use crate::table::Table;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid feed config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("source failed: {0}")]
    Source(String),

    #[error("feed worker panicked")]
    Panicked,
}

/// Feed options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Worker thread name, also used in log records
    pub name: String,
    /// Pause between polls
    pub interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            name: "feed".to_string(),
            interval_ms: 100,
        }
    }
}

impl FeedConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// More data may follow
    Continue,
    /// The source is exhausted
    Done,
}

/// How a feed worker ended
#[derive(Debug)]
pub enum FeedOutcome {
    /// Stopped on request
    Stopped,
    /// The source reported it was exhausted
    Completed,
    Failed(FeedError),
}

/// A producer polled by a feed worker
pub trait FeedSource: Send + 'static {
    fn poll(&mut self, table: &Table) -> Result<FeedStatus, FeedError>;
}

impl<F> FeedSource for F
where
    F: FnMut(&Table) -> Result<FeedStatus, FeedError> + Send + 'static,
{
    fn poll(&mut self, table: &Table) -> Result<FeedStatus, FeedError> {
        self(table)
    }
}

/// Appends text rows, one row per poll, parsing each cell leniently by the
/// kind of its series. Cells that do not parse become the empty value.
pub struct RowFeed<I> {
    rows: I,
    unparsed: usize,
}

impl<I, R, S> RowFeed<I>
where
    I: Iterator<Item = R>,
    R: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pub fn new<T>(rows: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        RowFeed {
            rows: rows.into_iter(),
            unparsed: 0,
        }
    }

    /// Cells replaced by the empty value so far
    pub fn unparsed(&self) -> usize {
        self.unparsed
    }

    fn append(&mut self, table: &Table, row: R) -> Result<(), FeedError> {
        let batch = table.begin_changes("feed_row");
        let cells: Vec<S> = row.into_iter().collect();
        let members: Vec<_> = table.iter().map(|(_, series)| series).collect();
        if cells.len() != members.len() {
            return Err(DataError::ArityMismatch {
                expected: members.len(),
                found: cells.len(),
            }
            .into());
        }
        for (series, cell) in members.iter().zip(&cells) {
            if !series.append_text(cell.as_ref())? {
                self.unparsed += 1;
            }
        }
        batch.finish();
        Ok(())
    }
}

impl<I, R, S> FeedSource for RowFeed<I>
where
    I: Iterator<Item = R> + Send + 'static,
    R: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fn poll(&mut self, table: &Table) -> Result<FeedStatus, FeedError> {
        match self.rows.next() {
            Some(row) => {
                self.append(table, row)?;
                Ok(FeedStatus::Continue)
            }
            None => Ok(FeedStatus::Done),
        }
    }
}

/// Handle to a running feed worker. Dropping the handle stops the worker.
pub struct FeedHandle {
    name: String,
    stop: mpsc::Sender<()>,
    worker: Option<JoinHandle<FeedOutcome>>,
}

impl FeedHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the worker has returned
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the worker and wait for it to exit.
    pub fn stop(mut self) -> FeedOutcome {
        // The worker may already have exited; a closed channel is fine
        let _ = self.stop.send(());
        self.wait()
    }

    /// Wait for the worker to end on its own.
    pub fn join(mut self) -> FeedOutcome {
        self.wait()
    }

    fn wait(&mut self) -> FeedOutcome {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or(FeedOutcome::Failed(FeedError::Panicked)),
            None => FeedOutcome::Stopped,
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop.send(());
            let _ = self.wait();
        }
    }
}

/// Start polling `source` into `table` on a new thread.
pub fn spawn_feed<S: FeedSource>(
    config: FeedConfig,
    table: Table,
    mut source: S,
) -> Result<FeedHandle, FeedError> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let name = config.name.clone();
    let interval = config.interval();

    let worker = thread::Builder::new().name(name.clone()).spawn(move || {
        info!("feed {} started on table {}", config.name, table.name());
        let mut polls = 0u64;
        loop {
            match source.poll(&table) {
                Ok(FeedStatus::Continue) => polls += 1,
                Ok(FeedStatus::Done) => {
                    info!("feed {} completed after {} polls", config.name, polls);
                    return FeedOutcome::Completed;
                }
                Err(e) => {
                    error!("feed {} failed: {}", config.name, e);
                    return FeedOutcome::Failed(e);
                }
            }
            match stop_rx.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("feed {} stopped after {} polls", config.name, polls);
                    return FeedOutcome::Stopped;
                }
                Err(RecvTimeoutError::Timeout) => debug!("feed {} poll {}", config.name, polls),
            }
        }
    })?;

    Ok(FeedHandle {
        name,
        stop: stop_tx,
        worker: Some(worker),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use crate::value::{Value, ValueKind};
    use std::time::Instant;

    fn quote_table() -> Table {
        let table = Table::new("quotes");
        table.add_series("symbol", Series::new(ValueKind::Generic)).unwrap();
        table.add_series("price", Series::new(ValueKind::Float64)).unwrap();
        table
    }

    fn fast() -> FeedConfig {
        FeedConfig {
            name: "test-feed".to_string(),
            interval_ms: 1,
        }
    }

    #[test]
    fn test_feed_completes() {
        let table = quote_table();
        let rows = vec![vec!["A", "1.5"], vec!["B", "2.5"], vec!["C", "bad"]];
        let handle = spawn_feed(fast(), table.clone(), RowFeed::new(rows)).unwrap();

        assert!(matches!(handle.join(), FeedOutcome::Completed));
        assert_eq!(table.len(), 3);
        assert_eq!(table.get_value(1, "price").unwrap(), Value::Float64(2.5));
        assert!(table.get_value(2, "price").unwrap().is_empty_value());
    }

    #[test]
    fn test_feed_stop_is_prompt() {
        let table = quote_table();
        let config = FeedConfig {
            interval_ms: 60_000,
            ..fast()
        };
        let handle = spawn_feed(config, table, |_: &Table| -> Result<FeedStatus, FeedError> {
            Ok(FeedStatus::Continue)
        })
        .unwrap();

        let started = Instant::now();
        assert!(matches!(handle.stop(), FeedOutcome::Stopped));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_feed_failure_is_distinct() {
        let table = quote_table();
        let handle = spawn_feed(fast(), table, |_: &Table| -> Result<FeedStatus, FeedError> {
            Err(FeedError::Source("connection reset".to_string()))
        })
        .unwrap();

        match handle.join() {
            FeedOutcome::Failed(FeedError::Source(msg)) => assert_eq!(msg, "connection reset"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_feed_row_width_mismatch_fails() {
        let table = quote_table();
        let rows = vec![vec!["only-one"]];
        let handle = spawn_feed(fast(), table.clone(), RowFeed::new(rows)).unwrap();
        assert!(matches!(
            handle.join(),
            FeedOutcome::Failed(FeedError::Data(DataError::ArityMismatch { expected: 2, found: 1 }))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_feed_rows_arrive_as_single_events() {
        let table = quote_table();
        let events = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = events.clone();
        let watched = table.downgrade();
        let _sub = table.subscribe(move |_| {
            if let Some(t) = watched.upgrade() {
                let lens: Vec<usize> = t.iter().map(|(_, s)| s.len()).collect();
                sink.lock().push(lens);
            }
        });

        let rows = vec![vec!["A", "1"], vec!["B", "2"]];
        let handle = spawn_feed(fast(), table.clone(), RowFeed::new(rows)).unwrap();
        assert!(matches!(handle.join(), FeedOutcome::Completed));

        assert_eq!(*events.lock(), vec![vec![1, 1], vec![2, 2]]);
    }

    #[test]
    fn test_row_feed_counts_unparsed_cells() {
        let table = quote_table();
        let mut feed = RowFeed::new(vec![vec!["A", "x"], vec!["B", "3"]]);
        assert_eq!(feed.poll(&table).unwrap(), FeedStatus::Continue);
        assert_eq!(feed.poll(&table).unwrap(), FeedStatus::Continue);
        assert_eq!(feed.poll(&table).unwrap(), FeedStatus::Done);
        assert_eq!(feed.unparsed(), 1);
    }

    #[test]
    fn test_feed_config() {
        let config = FeedConfig::from_json(r#"{"interval_ms": 250}"#).unwrap();
        assert_eq!(config.name, "feed");
        assert_eq!(config.interval(), Duration::from_millis(250));

        assert!(matches!(
            FeedConfig::from_json("{\"interval_ms\": \"soon\"}"),
            Err(FeedError::Config(_))
        ));
    }
}
