//! # Run Statistics Module / 运行统计模块
//!
//! Per-priority and global outcome counters. Only variations are counted, so
//! the global total always equals the number of variations that received a
//! result, whether they ran or were bulk-marked.
//!
//! 按优先级和全局统计的结果计数器。只统计变体，因此全局总数始终等于获得结果的变体数量，
//! 无论它们是实际运行还是被批量标记。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::models::TestResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub passed: usize,
    pub warned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub aborted: usize,
}

impl Counters {
    pub fn record(&mut self, result: TestResult) {
        match result {
            TestResult::Passed => self.passed += 1,
            TestResult::Warning => self.warned += 1,
            TestResult::Skipped => self.skipped += 1,
            TestResult::Failed => self.failed += 1,
            TestResult::Timeout => self.timed_out += 1,
            TestResult::Aborted => self.aborted += 1,
            TestResult::InProgress => {}
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.warned + self.skipped + self.failed + self.timed_out + self.aborted
    }

    /// Failed, timed out and aborted variations.
    pub fn failures(&self) -> usize {
        self.failed + self.timed_out + self.aborted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub global: Counters,
    pub by_priority: BTreeMap<i32, Counters>,
}

impl RunStatistics {
    pub fn record(&mut self, priority: i32, result: TestResult) {
        self.global.record(result);
        self.by_priority.entry(priority).or_default().record(result);
    }

    pub fn has_failures(&self) -> bool {
        self.global.failures() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_updates_global_and_priority_buckets() {
        let mut stats = RunStatistics::default();
        stats.record(1, TestResult::Passed);
        stats.record(2, TestResult::Failed);
        stats.record(2, TestResult::Timeout);
        stats.record(2, TestResult::InProgress);

        assert_eq!(stats.global.total(), 3);
        assert_eq!(stats.by_priority[&1].passed, 1);
        assert_eq!(stats.by_priority[&2].failures(), 2);
        assert!(stats.has_failures());
    }
}
