//! # Result Aggregation Module / 结果聚合模块
//!
//! `ResultAccumulator` is the single value pair tasks write to concurrently.
//! Once every task has joined, it is turned into a `Report`: results sorted by
//! source node, ties kept in the order they were recorded.
//!
//! `ResultAccumulator` 是节点对任务并发写入的唯一值。所有任务汇合后，
//! 它被转换为 `Report`：结果按源节点排序，相同源节点保持记录顺序。

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::PoisonError;

#[cfg(loom)]
use loom::sync::{Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::{Mutex, MutexGuard};

use crate::core::models::TestResult;

/// Concurrency-safe, append-only collection of test results.
/// 并发安全、仅追加的测试结果集合。
///
/// Built with `--cfg loom`, the lock is loom's so the model checker can
/// explore interleavings of concurrent pushes.
pub struct ResultAccumulator {
    entries: Mutex<Vec<(usize, TestResult)>>,
}

impl Default for ResultAccumulator {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl fmt::Debug for ResultAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultAccumulator")
            .field("len", &self.len())
            .finish()
    }
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result and returns the sequence number it was assigned.
    /// 追加一个结果并返回分配给它的序列号。
    pub fn push(&self, result: TestResult) -> usize {
        let mut entries = self.lock();
        let seq = entries.len();
        entries.push((seq, result));
        seq
    }

    /// Whether a result for this (source, destination, port) was recorded.
    pub fn contains(&self, source: &str, destination: &str, port: u16) -> bool {
        self.lock().iter().any(|(_, r)| {
            r.source == source && r.destination == destination && r.port == port
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the recorded results into a sorted report.
    pub fn report(&self) -> Report {
        let mut entries = self.lock().clone();
        entries.sort_by(|(a_seq, a), (b_seq, b)| a.source.cmp(&b.source).then(a_seq.cmp(b_seq)));
        Report::new(entries.into_iter().map(|(_, result)| result).collect())
    }

    // A panicking writer cannot leave a half-pushed entry, so a poisoned lock
    // still guards a consistent vector.
    fn lock(&self) -> MutexGuard<'_, Vec<(usize, TestResult)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome counts over a whole report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The final, ordered view of a run.
/// 运行的最终有序视图。
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    pub summary: Summary,
    pub results: Vec<TestResult>,
}

impl Report {
    /// Wraps results that are already in report order.
    pub fn new(results: Vec<TestResult>) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Summary::default()
        };
        for result in &results {
            if result.outcome.is_success() {
                summary.succeeded += 1;
            } else if result.outcome.is_failure() {
                summary.failed += 1;
            } else {
                summary.skipped += 1;
            }
        }

        Self {
            generated_at: Local::now(),
            summary,
            results,
        }
    }

    /// True when every scheduled test succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.summary.succeeded == self.summary.total
    }
}
