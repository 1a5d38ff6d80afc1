//! Warts ingestion
//!
//! Bytes flow through three stages:
//!
//! ```text
//! HTTP body / file ──► gzip decoder ──► converter stdin
//!                                       converter stdout ──► line parser ──► ProbeRecord
//!                                       converter stderr ──► collected, fatal if non-empty
//! ```
//!
//! Decompression runs on a blocking thread bridged to the async input and to
//! the converter's stdin. Dropping a [`WartsStream`] stops the input stream,
//! kills the converter and releases the HTTP response.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use futures_util::{Stream, StreamExt, TryStreamExt};
use mpat_protocol::ProbeRecord;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{IngestError, Result};
use crate::format::OutputFormat;
use crate::http::{Credentials, get};

/// Default converter program
pub const DEFAULT_CONVERTER: &str = "pantrace";

/// Input format argument passed to the converter
pub const CONVERTER_INPUT_FORMAT: &str = "scamper-trace-warts";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const COPY_BUFFER_SIZE: usize = 64 * 1024;

type ByteSource = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

// =============================================================================
// Configuration
// =============================================================================

/// Converter invocation and parse policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Program to run
    pub program: String,
    /// Arguments placed before `--from ... --to ...`
    pub leading_args: Vec<String>,
    /// Output format requested with `--to`
    pub format: OutputFormat,
    /// Fail on the first malformed line
    pub strict: bool,
    /// Fail once more than this many lines are malformed
    pub max_parse_errors: Option<u64>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_CONVERTER.to_string(),
            leading_args: Vec::new(),
            format: OutputFormat::default(),
            strict: false,
            max_parse_errors: None,
        }
    }
}

impl ConverterConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_max_parse_errors(mut self, limit: Option<u64>) -> Self {
        self.max_parse_errors = limit;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(["--from", CONVERTER_INPUT_FORMAT, "--to", self.format.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Where warts bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WartsSource {
    /// Remote file, fetched with GET
    Url(Url),
    /// Local file; gzip is detected from the magic bytes
    File(PathBuf),
}

impl WartsSource {
    fn compression(&self) -> Compression {
        match self {
            Self::Url(url) if url.path().ends_with(".gz") => Compression::Gzip,
            _ => Compression::Detect,
        }
    }
}

impl fmt::Display for WartsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Gzip,
    Detect,
}

// =============================================================================
// Reader
// =============================================================================

/// Opens warts sources and runs them through the converter
#[derive(Debug, Clone)]
pub struct WartsReader {
    http: reqwest::Client,
    credentials: Option<Credentials>,
    converter: ConverterConfig,
}

impl WartsReader {
    pub fn new(http: reqwest::Client, credentials: Option<Credentials>, converter: ConverterConfig) -> Self {
        Self {
            http,
            credentials,
            converter,
        }
    }

    pub fn converter(&self) -> &ConverterConfig {
        &self.converter
    }

    /// Start streaming one source
    ///
    /// HTTP status errors surface here, before any record is produced, so
    /// callers may retry this call.
    pub async fn open(&self, source: &WartsSource) -> Result<WartsStream> {
        let name = source.to_string();
        let input: ByteSource = match source {
            WartsSource::Url(url) => {
                let response = get(&self.http, url.as_str(), self.credentials.as_ref()).await?;
                response.bytes_stream().map_err(io::Error::other).boxed()
            }
            WartsSource::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|source| IngestError::Open {
                        path: name.clone(),
                        source,
                    })?;
                ReaderStream::with_capacity(file, COPY_BUFFER_SIZE).boxed()
            }
        };

        let mut child = self
            .converter
            .command()
            .spawn()
            .map_err(|source| IngestError::Spawn {
                program: self.converter.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| pipe_missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| pipe_missing("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| pipe_missing("stderr"))?;

        let cancel = CancellationToken::new();
        let input = Box::pin(StreamReader::new(
            input.take_until(cancel.clone().cancelled_owned()),
        ));
        let reader = SyncIoBridge::new(input);
        let writer = SyncIoBridge::new(stdin);
        let compression = source.compression();
        let feeder = tokio::task::spawn_blocking(move || feed(reader, compression, writer));

        let stderr_task = tokio::spawn(async move {
            let mut collected = Vec::new();
            stderr.read_to_end(&mut collected).await.map(|_| collected)
        });

        debug!(source = %name, program = %self.converter.program, format = %self.converter.format, "converter started");

        Ok(WartsStream {
            name,
            format: self.converter.format,
            strict: self.converter.strict,
            max_parse_errors: self.converter.max_parse_errors,
            child,
            lines: tokio::io::BufReader::new(stdout).lines(),
            feeder: Some(feeder),
            stderr: Some(stderr_task),
            cancel,
            line_no: 0,
            records: 0,
            parse_errors: 0,
        })
    }
}

fn pipe_missing(pipe: &str) -> IngestError {
    IngestError::Io(io::Error::other(format!("converter {pipe} was not captured")))
}

// =============================================================================
// Stream
// =============================================================================

/// Counters of one finished source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WartsSummary {
    /// Decompressed bytes fed to the converter
    pub bytes: u64,
    /// Output lines read
    pub lines: u64,
    /// Records produced
    pub records: u64,
    /// Malformed lines skipped
    pub parse_errors: u64,
}

/// Records of one source as the converter produces them
pub struct WartsStream {
    name: String,
    format: OutputFormat,
    strict: bool,
    max_parse_errors: Option<u64>,
    child: Child,
    lines: Lines<tokio::io::BufReader<ChildStdout>>,
    feeder: Option<JoinHandle<std::result::Result<u64, FeedError>>>,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
    cancel: CancellationToken,
    line_no: u64,
    records: u64,
    parse_errors: u64,
}

impl WartsStream {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Malformed lines skipped so far
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    /// Records of the next output line; `None` once the converter closes
    /// its output
    pub async fn next_records(&mut self) -> Result<Option<Vec<ProbeRecord>>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            match self.format.parse_line(&line) {
                Ok(records) => {
                    self.records += records.len() as u64;
                    return Ok(Some(records));
                }
                Err(e) => {
                    self.parse_errors += 1;
                    if self.strict {
                        return Err(IngestError::Parse {
                            line: self.line_no,
                            message: e.to_string(),
                        });
                    }
                    warn!(source = %self.name, line = self.line_no, error = %e, "skipping malformed record");
                    if let Some(limit) = self.max_parse_errors
                        && self.parse_errors > limit
                    {
                        return Err(IngestError::TooManyParseErrors {
                            count: self.parse_errors,
                            limit,
                        });
                    }
                }
            }
        }
    }

    /// Wait for the converter to exit and check how it ended
    ///
    /// Output not yet read is discarded. Fails on a decompression error,
    /// non-empty stderr, or a non-zero exit status.
    pub async fn finish(mut self) -> Result<WartsSummary> {
        while self.lines.next_line().await?.is_some() {}

        let fed = match self.feeder.take() {
            Some(feeder) => feeder.await.map_err(io::Error::other)?,
            None => Ok(0),
        };
        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(task) => task.await.map_err(io::Error::other)??,
            None => Vec::new(),
        };

        let bytes = self.check(fed, status, &stderr)?;
        let summary = WartsSummary {
            bytes,
            lines: self.line_no,
            records: self.records,
            parse_errors: self.parse_errors,
        };
        info!(
            source = %self.name,
            bytes = summary.bytes,
            records = summary.records,
            parse_errors = summary.parse_errors,
            "converted warts file"
        );
        Ok(summary)
    }

    fn check(
        &self,
        fed: std::result::Result<u64, FeedError>,
        status: ExitStatus,
        stderr: &[u8],
    ) -> Result<u64> {
        if let Err(FeedError::Read(source)) = fed {
            return Err(match source.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
                    IngestError::Decompress {
                        source_name: self.name.clone(),
                        source,
                    }
                }
                _ => IngestError::Io(source),
            });
        }

        let stderr = String::from_utf8_lossy(stderr);
        if let Some(line) = stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Err(self.converter_error(format!("stderr: {line}")));
        }
        if !status.success() {
            return Err(self.converter_error(format!("exited with {status}")));
        }

        match fed {
            Ok(bytes) => Ok(bytes),
            Err(FeedError::Write(e)) => Err(self.converter_error(format!("stopped reading input: {e}"))),
            Err(FeedError::Read(e)) => Err(IngestError::Io(e)),
        }
    }

    fn converter_error(&self, message: String) -> IngestError {
        IngestError::Converter {
            source_name: self.name.clone(),
            message,
        }
    }
}

impl Drop for WartsStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for WartsStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WartsStream")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("line_no", &self.line_no)
            .field("records", &self.records)
            .field("parse_errors", &self.parse_errors)
            .finish()
    }
}

// =============================================================================
// Feeder
// =============================================================================

#[derive(Debug)]
enum FeedError {
    /// Input or decompression failed
    Read(io::Error),
    /// Converter stdin closed early
    Write(io::Error),
}

/// Copy (decompressed) input to the converter; closes stdin when done
fn feed<R: Read, W: Write>(reader: R, compression: Compression, mut writer: W) -> std::result::Result<u64, FeedError> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, reader);
    let gzip = match compression {
        Compression::Gzip => true,
        Compression::Detect => reader.fill_buf().map_err(FeedError::Read)?.starts_with(&GZIP_MAGIC),
    };

    let copied = if gzip {
        pump(&mut MultiGzDecoder::new(reader), &mut writer)?
    } else {
        pump(&mut reader, &mut writer)?
    };
    writer.flush().map_err(FeedError::Write)?;
    Ok(copied)
}

fn pump(reader: &mut dyn Read, writer: &mut dyn Write) -> std::result::Result<u64, FeedError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FeedError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(FeedError::Write)?;
        total += n as u64;
    }
}

#[cfg(all(test, unix))]
#[path = "warts_test.rs"]
mod warts_test;
