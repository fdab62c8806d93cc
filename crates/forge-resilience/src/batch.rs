//! Bounded concurrent fan-out over independent units of work.
//!
//! Units run on the calling task through `buffer_unordered`; nothing is spawned.
//! Once dispatched a unit always runs to completion.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use futures::future::{self, Either};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// What a batch does after a unit fails.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Dispatch every unit regardless of failures.
    #[default]
    Continue,
    /// Stop dispatching after the first failure. Units already in flight finish;
    /// the rest are reported as skipped.
    Abort,
}

/// Per-unit outcomes of a batch, each list sorted by unit index.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(usize, T)>,
    pub failed: Vec<(usize, anyhow::Error)>,
    pub skipped: Vec<usize>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// True when every unit succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Append `other`, whose indices are relative to `offset`.
    pub fn merge(&mut self, other: BatchReport<T>, offset: usize) {
        self.succeeded
            .extend(other.succeeded.into_iter().map(|(i, v)| (i + offset, v)));
        self.failed
            .extend(other.failed.into_iter().map(|(i, e)| (i + offset, e)));
        self.skipped
            .extend(other.skipped.into_iter().map(|i| i + offset));
        self.succeeded.sort_by_key(|(i, _)| *i);
        self.failed.sort_by_key(|(i, _)| *i);
        self.skipped.sort_unstable();
    }
}

enum Outcome<T> {
    Done(Result<T>),
    Skipped,
}

/// Run `f` over `units` with at most `parallelism` invocations in flight.
///
/// `f` receives the unit's index in `units` and the unit itself. A failing unit never
/// cancels its siblings. Every index appears exactly once in the returned report.
pub async fn run_batch<I, T, F, Fut>(
    units: I,
    parallelism: usize,
    mode: FailureMode,
    mut f: F,
) -> BatchReport<T>
where
    I: IntoIterator,
    F: FnMut(usize, I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let parallelism = parallelism.max(1);
    let aborted = Arc::new(AtomicBool::new(false));

    let outcomes: Vec<(usize, Outcome<T>)> = stream::iter(units.into_iter().enumerate())
        .map(|(index, unit)| {
            if mode == FailureMode::Abort && aborted.load(Ordering::SeqCst) {
                return Either::Left(future::ready((index, Outcome::Skipped)));
            }
            debug!(index, "dispatching unit");
            let fut = f(index, unit);
            let aborted = Arc::clone(&aborted);
            Either::Right(async move {
                let result = fut.await;
                if result.is_err() {
                    aborted.store(true, Ordering::SeqCst);
                }
                (index, Outcome::Done(result))
            })
        })
        .buffer_unordered(parallelism)
        .collect()
        .await;

    let mut report = BatchReport::default();
    for (index, outcome) in outcomes {
        match outcome {
            Outcome::Done(Ok(value)) => report.succeeded.push((index, value)),
            Outcome::Done(Err(e)) => {
                warn!(index, error = %format!("{:#}", e), "unit failed");
                report.failed.push((index, e));
            }
            Outcome::Skipped => report.skipped.push(index),
        }
    }
    report.succeeded.sort_by_key(|(i, _)| *i);
    report.failed.sort_by_key(|(i, _)| *i);
    report.skipped.sort_unstable();
    report
}

/// Split `units` into consecutive chunks of at most `size` items.
pub fn chunked<T>(units: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(units.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for unit in units {
        current.push(unit);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
