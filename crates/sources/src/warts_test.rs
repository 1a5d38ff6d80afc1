//! Warts reader tests
//!
//! A small `sh` script stands in for the converter: the test inputs are
//! already converter output, so `cat` is a faithful converter.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression as Level;
use flate2::write::GzEncoder;
use mpat_protocol::{Classify, ErrorKind};
use tempfile::TempDir;

use super::*;

const FLOW_A: &str = r#"{"probe_protocol":1,"probe_src_addr":"192.0.2.1","probe_dst_addr":"8.8.8.8","probe_src_port":24000,"probe_dst_port":0,"round":1,"replies":[{"capture_timestamp":1,"probe_ttl":1,"quoted_ttl":1,"reply_src_addr":"10.0.0.1","reply_protocol":1,"reply_icmp_type":11,"reply_icmp_code":0,"reply_ttl":254,"reply_size":56,"rtt":10},{"capture_timestamp":2,"probe_ttl":2,"quoted_ttl":1,"reply_src_addr":"10.0.0.2","reply_protocol":1,"reply_icmp_type":11,"reply_icmp_code":0,"reply_ttl":253,"reply_size":56,"rtt":20}]}"#;

const FLOW_B: &str = r#"{"probe_protocol":1,"probe_src_addr":"192.0.2.1","probe_dst_addr":"8.8.4.4","probe_src_port":24001,"probe_dst_port":0,"round":1,"replies":[{"capture_timestamp":3,"probe_ttl":1,"quoted_ttl":1,"reply_src_addr":"10.0.0.1","reply_protocol":1,"reply_icmp_type":11,"reply_icmp_code":0,"reply_ttl":254,"reply_size":56,"rtt":11}]}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Converter running `body` under `sh`; `$1..$4` are the standard arguments
    fn converter(&self, body: &str) -> ConverterConfig {
        let script = self.dir.path().join("converter.sh");
        std::fs::write(&script, body).unwrap();
        ConverterConfig::new("sh").with_leading_args([script.to_string_lossy().into_owned()])
    }

    fn plain(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn gzipped(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Level::default());
        encoder.write_all((lines.join("\n") + "\n").as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }
}

fn reader(converter: ConverterConfig) -> WartsReader {
    WartsReader::new(reqwest::Client::new(), None, converter)
}

async fn read_all(reader: &WartsReader, path: &Path) -> Result<(Vec<ProbeRecord>, WartsSummary)> {
    let mut stream = reader.open(&WartsSource::File(path.to_path_buf())).await?;
    let mut records = Vec::new();
    while let Some(batch) = stream.next_records().await? {
        records.extend(batch);
    }
    let summary = stream.finish().await?;
    Ok((records, summary))
}

#[tokio::test]
async fn test_gzipped_file_is_converted() {
    let fixture = Fixture::new();
    let path = fixture.gzipped("a.warts.gz", &[FLOW_A, FLOW_B]);
    let reader = reader(fixture.converter("cat"));

    let (records, summary) = read_all(&reader, &path).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].probe_ttl, 1);
    assert_eq!(records[1].probe_ttl, 2);
    assert_eq!(records[2].probe_src_port, 24001);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.parse_errors, 0);
    assert!(summary.bytes > 0);
}

#[tokio::test]
async fn test_plain_file_is_passed_through() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_B]);
    let reader = reader(fixture.converter("cat"));

    let (records, _) = read_all(&reader, &path).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_converter_receives_standard_arguments() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_B]);
    let converter = fixture.converter(
        r#"[ "$1 $2 $3 $4" = "--from scamper-trace-warts --to iris" ] || { echo "bad args: $*" >&2; exit 2; }
cat"#,
    );

    let (records, _) = read_all(&reader(converter), &path).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_malformed_line_is_skipped() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_A, "{not json", "", FLOW_B]);
    let reader = reader(fixture.converter("cat"));

    let (records, summary) = read_all(&reader, &path).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(summary.parse_errors, 1);
}

#[tokio::test]
async fn test_strict_mode_fails_on_first_malformed_line() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_A, "{not json", FLOW_B]);
    let reader = reader(fixture.converter("cat").with_strict(true));

    let err = read_all(&reader, &path).await.unwrap_err();
    assert!(matches!(err, IngestError::Parse { line: 2, .. }));
}

#[tokio::test]
async fn test_parse_error_limit() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &["bad", FLOW_A, "bad", FLOW_B]);
    let reader = reader(fixture.converter("cat").with_max_parse_errors(Some(1)));

    let err = read_all(&reader, &path).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::TooManyParseErrors { count: 2, limit: 1 }
    ));
}

#[tokio::test]
async fn test_stderr_output_is_fatal() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_A]);
    let reader = reader(fixture.converter("cat\necho 'warning: truncated record' >&2"));

    let err = read_all(&reader, &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConverterFailure);
    assert!(err.to_string().contains("warning: truncated record"));
}

#[tokio::test]
async fn test_non_zero_exit_is_fatal() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_A]);
    let reader = reader(fixture.converter("cat > /dev/null\nexit 3"));

    let err = read_all(&reader, &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConverterFailure);
    assert!(err.to_string().contains("exited"));
}

#[tokio::test]
async fn test_corrupt_gzip_is_fatal() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("broken.warts.gz");
    std::fs::write(&path, [0x1f, 0x8b, 0x00, 0x42, 0x42, 0x42, 0x42]).unwrap();
    let reader = reader(fixture.converter("cat"));

    let err = read_all(&reader, &path).await.unwrap_err();
    assert!(matches!(err, IngestError::Decompress { .. }), "{err}");
}

#[tokio::test]
async fn test_missing_converter() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_A]);
    let reader = reader(ConverterConfig::new("/nonexistent/mpat-converter"));

    let err = reader.open(&WartsSource::File(path)).await.unwrap_err();
    assert!(matches!(err, IngestError::Spawn { .. }));
    assert_eq!(err.kind(), ErrorKind::ConverterFailure);
}

#[tokio::test]
async fn test_missing_file() {
    let fixture = Fixture::new();
    let reader = reader(fixture.converter("cat"));
    let err = reader
        .open(&WartsSource::File(fixture.dir.path().join("nope.warts")))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Open { .. }));
}

#[tokio::test]
async fn test_dropping_stream_does_not_hang() {
    let fixture = Fixture::new();
    let path = fixture.plain("a.warts", &[FLOW_A]);
    let reader = reader(fixture.converter("sleep 30"));

    let stream = reader.open(&WartsSource::File(path)).await.unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(2), async move {
        drop(stream);
    })
    .await
    .unwrap();
}
