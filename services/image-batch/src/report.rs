//! Final run report

use std::fmt::Write as _;
use std::path::PathBuf;

/// How one job ended, after persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Saved(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: usize,
    pub target: String,
    pub attempts: u32,
    pub rotations: u32,
    pub result: JobResult,
}

impl JobSummary {
    pub fn is_saved(&self) -> bool {
        matches!(self.result, JobResult::Saved(_))
    }
}

/// Every job of a run, ordered by job id.
#[derive(Debug, Default)]
pub struct BatchSummary {
    jobs: Vec<JobSummary>,
}

impl BatchSummary {
    pub fn new(mut jobs: Vec<JobSummary>) -> Self {
        jobs.sort_by_key(|j| j.id);
        Self { jobs }
    }

    pub fn jobs(&self) -> &[JobSummary] {
        &self.jobs
    }

    pub fn saved(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_saved()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.len() - self.saved()
    }

    /// True only when there were jobs and none of them produced a file.
    pub fn all_failed(&self) -> bool {
        !self.jobs.is_empty() && self.saved() == 0
    }

    /// Human-readable report: successes, then failures with reasons, then totals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let saved: Vec<_> = self.jobs.iter().filter(|j| j.is_saved()).collect();
        let failed: Vec<_> = self.jobs.iter().filter(|j| !j.is_saved()).collect();

        if !saved.is_empty() {
            let _ = writeln!(out, "Succeeded:");
            for job in saved {
                if let JobResult::Saved(path) = &job.result {
                    let _ = writeln!(
                        out,
                        "  {} -> {} (attempts: {})",
                        job.target,
                        path.display(),
                        job.attempts
                    );
                }
            }
        }
        if !failed.is_empty() {
            let _ = writeln!(out, "Failed:");
            for job in failed {
                if let JobResult::Failed(reason) = &job.result {
                    let _ = writeln!(out, "  {}: {reason}", job.target);
                }
            }
        }
        let _ = write!(
            out,
            "Total: {} jobs, {} succeeded, {} failed",
            self.jobs.len(),
            self.saved(),
            self.failed()
        );
        out
    }
}
