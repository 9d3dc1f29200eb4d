//! Archive tests

use std::io::Read;

use bytes::Bytes;
use chrono::Utc;
use ferry_protocol::{Job, JobId, JobParameters, JobStatus};
use flate2::read::GzDecoder;
use uuid::Uuid;

use crate::archive::{build_archive, object_key};

fn make_job(id: i64) -> Job {
    let created = Utc::now();
    Job {
        id: JobId(id),
        uuid: Uuid::new_v4(),
        user_id: "u1".to_string(),
        workspace_id: "ws-1".to_string(),
        custom_val: "WEBHOOK".to_string(),
        created_at: created,
        expire_at: created,
        payload: Bytes::from(format!("{{\"job\":{id}}}")),
        parameters: JobParameters::default(),
        last_status: JobStatus::initial(JobId(id), "ws-1"),
    }
}

#[test]
fn test_filename_schema() {
    let jobs = vec![make_job(17), make_job(18), make_job(42)];
    let archive = build_archive(&jobs, "instance-3").unwrap();

    let parts: Vec<&str> = archive.filename.split('.').collect();
    // ts.instance.firstId-lastId.uuid.json.gz
    assert_eq!(parts.len(), 6);
    assert!(parts[0].parse::<i64>().is_ok());
    assert_eq!(parts[1], "instance-3");
    assert_eq!(parts[2], "17-42");
    assert!(Uuid::parse_str(parts[3]).is_ok());
    assert_eq!(parts[4], "json");
    assert_eq!(parts[5], "gz");
}

#[test]
fn test_content_is_gzipped_json_lines() {
    let jobs = vec![make_job(1), make_job(2)];
    let archive = build_archive(&jobs, "1").unwrap();

    // gzip magic bytes
    assert_eq!(&archive.content[..2], &[0x1f, 0x8b]);

    let mut decoder = GzDecoder::new(archive.content.as_slice());
    let mut text = String::new();
    decoder.read_to_string(&mut text).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    for (line, expected_id) in lines.iter().zip([1i64, 2]) {
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["id"], expected_id);
    }
}

#[test]
fn test_object_key_is_date_prefixed() {
    let key = object_key("proc-err", "123.1.1-2.abc.json.gz");
    assert!(key.starts_with("proc-err/proc-err-logs/"));
    assert!(key.ends_with("123.1.1-2.abc.json.gz"));

    let date = Utc::now().format("%m-%d-%Y").to_string();
    assert!(key.contains(&date));
}
