/*!
 * Run-wide state shared by every file of a batch.
 */

use std::path::{Path, PathBuf};

use super::rate_budget::RateBudget;

/// State that outlives a single file: where audit dumps go and the token budget
#[derive(Debug, Clone)]
pub struct RunContext {
    audit_dir: PathBuf,
    pub budget: RateBudget,
}

impl RunContext {
    pub fn new(audit_dir: impl Into<PathBuf>, budget: RateBudget) -> Self {
        Self {
            audit_dir: audit_dir.into(),
            budget,
        }
    }

    /// Context whose audit dumps land in `<log_dir>/log/model`
    pub fn for_log_dir<P: AsRef<Path>>(log_dir: P, budget: RateBudget) -> Self {
        Self::new(log_dir.as_ref().join("log").join("model"), budget)
    }

    pub fn audit_dir(&self) -> &Path {
        &self.audit_dir
    }
}
