//! Query parameters and results

use ferry_protocol::Job;

/// Filter on a job parameter field (e.g. destination id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterFilter {
    pub name: String,
    pub value: String,
}

impl ParameterFilter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parameters shared by all job store reads
///
/// `custom_val_filters` selects destination types; keeping it a single
/// element lets the store use its per-type table cache.
#[derive(Debug, Clone, Default)]
pub struct GetQueryParams {
    pub custom_val_filters: Vec<String>,
    pub parameter_filters: Vec<ParameterFilter>,

    /// Upper bound on rows returned
    pub jobs_limit: usize,

    /// Cumulative payload byte budget; `<= 0` means unlimited
    pub payload_size_limit: i64,
}

impl GetQueryParams {
    /// Query scoped to one destination type
    pub fn for_custom_val(custom_val: impl Into<String>, jobs_limit: usize) -> Self {
        Self {
            custom_val_filters: vec![custom_val.into()],
            parameter_filters: Vec::new(),
            jobs_limit,
            payload_size_limit: 0,
        }
    }
}

/// Result of a job store read
#[derive(Debug, Clone, Default)]
pub struct JobsResult {
    pub jobs: Vec<Job>,

    /// True when the row or payload budget cut the read short; callers
    /// must not issue a second read in the same tick
    pub limits_reached: bool,

    /// Cumulative payload bytes of the returned jobs
    pub payload_size: i64,
}

impl JobsResult {
    /// Shrink follow-up query budgets by what this result consumed
    pub fn consume_budget(&self, params: &mut GetQueryParams) {
        params.jobs_limit = params.jobs_limit.saturating_sub(self.jobs.len());
        if params.payload_size_limit > 0 {
            params.payload_size_limit -= self.payload_size;
        }
    }
}
