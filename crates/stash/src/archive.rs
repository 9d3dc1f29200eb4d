//! Archive building
//!
//! Jobs serialize to newline-delimited JSON, gzipped, under the stable
//! name `ts.instance.firstId-lastId.uuid.json.gz`. The name alone tells
//! an operator when the batch was stashed, by which instance, and which
//! job-id range it covers.

use std::io::Write;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use ferry_protocol::Job;
use uuid::Uuid;

use crate::Result;

/// A gzip archive of stashed jobs, ready for upload
#[derive(Debug, Clone)]
pub struct Archive {
    /// `ts.instance.firstId-lastId.uuid.json.gz`
    pub filename: String,

    /// Gzipped newline-delimited JSON
    pub content: Vec<u8>,
}

/// Build the upload archive for one batch of jobs
///
/// The batch must be non-empty; the id range in the filename comes from
/// the first and last job.
pub fn build_archive(jobs: &[Job], instance_id: &str) -> Result<Archive> {
    debug_assert!(!jobs.is_empty());

    let lines: Vec<Vec<u8>> = jobs
        .iter()
        .map(|job| serde_json::to_vec(job).map_err(std::io::Error::other))
        .collect::<std::io::Result<_>>()?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            encoder.write_all(b"\n")?;
        }
        encoder.write_all(line)?;
    }
    let content = encoder.finish()?;

    let first = jobs.first().map(|j| j.id.as_i64()).unwrap_or_default();
    let last = jobs.last().map(|j| j.id.as_i64()).unwrap_or_default();
    let filename = format!(
        "{}.{}.{}-{}.{}.json.gz",
        Utc::now().timestamp(),
        instance_id,
        first,
        last,
        Uuid::new_v4()
    );

    Ok(Archive { filename, content })
}

/// Date-prefixed object key for an archive
pub(crate) fn object_key(bucket: &str, filename: &str) -> String {
    let date = Utc::now().format("%m-%d-%Y");
    format!("{bucket}/proc-err-logs/{date}/{filename}")
}

#[cfg(test)]
#[path = "archive_test.rs"]
mod archive_test;
