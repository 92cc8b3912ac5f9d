use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{error, info};

use crate::checkpoint::CheckpointStore;
use crate::util::percentage;

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Completed,
    RetriesExhausted { attempts: u32 },
}

pub fn retry<F>(mut operation: F, times: Option<u32>, backoff: Duration) -> Result<RetryOutcome>
where
    F: FnMut() -> Result<()>,
{
    let Some(times) = times else {
        operation()?;
        return Ok(RetryOutcome::Completed);
    };
    if times == 0 {
        bail!("retry budget must be at least 1");
    }

    for attempt in 1..=times {
        match operation() {
            Ok(()) => return Ok(RetryOutcome::Completed),
            Err(err) => {
                error!(error = %err, attempt, "batch attempt failed");
                let remaining = times - attempt;
                if remaining > 0 {
                    info!(
                        attempts_left = remaining,
                        backoff_secs = backoff.as_secs(),
                        "retrying"
                    );
                    thread::sleep(backoff);
                }
            }
        }
    }

    info!(attempts = times, "done retrying");
    Ok(RetryOutcome::RetriesExhausted { attempts: times })
}

pub trait BatchSink {
    fn write(&mut self, key: &str, values: &[String]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

impl BatchSink for CheckpointStore {
    fn write(&mut self, key: &str, values: &[String]) -> Result<()> {
        CheckpointStore::write(self, key, values)
    }

    fn close(&mut self) -> Result<()> {
        CheckpointStore::close(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSummary {
    pub total: usize,
    pub skipped: usize,
    pub processed: usize,
}

pub fn run_batch<S, F>(
    items: &[String],
    already_done: &HashSet<String>,
    mut perform_one: F,
    sink: &mut S,
    flush_interval: usize,
) -> Result<BatchSummary>
where
    S: BatchSink,
    F: FnMut(&str) -> Result<Vec<String>>,
{
    if flush_interval == 0 {
        bail!("flush interval must be at least 1");
    }

    let mut todo: Vec<&str> = items
        .iter()
        .map(String::as_str)
        .filter(|item| !already_done.contains(*item))
        .collect();
    todo.sort_unstable();
    todo.dedup();

    let unique_items = {
        let mut unique: Vec<&str> = items.iter().map(String::as_str).collect();
        unique.sort_unstable();
        unique.dedup();
        unique.len()
    };
    let skipped = unique_items - todo.len();
    if skipped > 0 {
        info!(count = skipped, "recovered previously completed items");
    }

    let start = skipped + 1;
    let mut processed = 0_usize;
    let mut run_error: Option<anyhow::Error> = None;

    for (offset, item) in todo.iter().enumerate() {
        let index = start + offset;
        let result = perform_one(item).and_then(|values| sink.write(item, &values));
        if let Err(err) = result {
            run_error = Some(err);
            break;
        }
        processed += 1;
        if index == start || index == unique_items || index % flush_interval == 0 {
            info!(
                completed = index,
                total = unique_items,
                percent = format!("{:.3}", percentage(index, unique_items)),
                "batch progress"
            );
        }
    }

    let close_result = sink.close();
    if let Some(err) = run_error {
        return Err(err);
    }
    close_result?;

    Ok(BatchSummary {
        total: unique_items,
        skipped,
        processed,
    })
}
