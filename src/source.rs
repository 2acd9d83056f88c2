use crate::error::SourceError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

/// Producer of raw records. Blocks until the next record is available.
pub trait EventSource {
    /// Next record, or `None` once the source is exhausted
    fn read_record(&mut self) -> Result<Option<String>, SourceError>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn read_record(&mut self) -> Result<Option<String>, SourceError> {
        (**self).read_record()
    }
}

/// How a byte stream is split into records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One record per non-blank line
    #[default]
    Line,
    /// One record per complete JSON document, possibly spanning several lines
    Object,
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub framing: Framing,
    pub read_timeout: Option<Duration>,
    /// Longer records are cut at this size and the rest of them is skipped
    pub max_record_length: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            framing: Framing::Line,
            read_timeout: None,
            max_record_length: 1048576, // 1MB
        }
    }
}

/// Tracks bracket depth across lines, ignoring brackets inside strings.
///
/// Works on bytes: every significant character is ASCII, and ASCII bytes never
/// occur inside a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
struct BalanceScanner {
    depth: i64,
    opened: bool,
    in_string: bool,
    escaped: bool,
}

impl BalanceScanner {
    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => {
                    self.depth += 1;
                    self.opened = true;
                }
                b'}' | b']' => self.depth -= 1,
                _ => {}
            }
        }
    }

    fn is_complete(&self) -> bool {
        !self.in_string && (!self.opened || self.depth <= 0)
    }
}

/// Reads records from any buffered reader
pub struct ReaderSource<R: BufRead> {
    reader: R,
    options: SourceOptions,
    buf: Vec<u8>,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R, options: SourceOptions) -> Self {
        ReaderSource {
            reader,
            options,
            buf: Vec::new(),
        }
    }

    /// Next line without its `\n` or `\r\n` terminator. Invalid UTF-8 is
    /// replaced, not rejected.
    ///
    /// At most `max_record_length + 1` bytes are kept. The rest of a longer
    /// line is skipped, so the returned line is over the limit and the driver
    /// reports it as too long. Every byte read, kept or skipped, goes through
    /// `scanner` when one is given.
    fn next_line(
        &mut self,
        mut scanner: Option<&mut BalanceScanner>,
    ) -> Result<Option<String>, SourceError> {
        self.buf.clear();
        let limit = self.options.max_record_length.saturating_add(1) as u64;
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(scanner) = scanner.as_deref_mut() {
            scanner.feed(&self.buf);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        } else if n as u64 == limit {
            self.skip_rest_of_line(scanner)?;
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Consume input up to and including the next newline without buffering it
    fn skip_rest_of_line(&mut self, mut scanner: Option<&mut BalanceScanner>) -> io::Result<()> {
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(());
            }
            let (used, found) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            if let Some(scanner) = scanner.as_deref_mut() {
                scanner.feed(&available[..used]);
            }
            self.reader.consume(used);
            if found {
                return Ok(());
            }
        }
    }

    fn read_line_record(&mut self) -> Result<Option<String>, SourceError> {
        while let Some(line) = self.next_line(None)? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn read_object_record(&mut self) -> Result<Option<String>, SourceError> {
        let mut chunk = String::new();
        let mut scanner = BalanceScanner::default();

        while let Some(line) = self.next_line(Some(&mut scanner))? {
            if chunk.is_empty() && line.trim().is_empty() {
                continue;
            }
            if !chunk.is_empty() {
                chunk.push('\n');
            }
            chunk.push_str(&line);

            if scanner.is_complete() {
                return Ok(Some(chunk));
            }
            if chunk.len() > self.options.max_record_length {
                // The rest of an oversize document must not surface as records of its own
                self.skip_document(&mut scanner)?;
                return Ok(Some(chunk));
            }
        }

        // A truncated trailing document is still handed out so the parser can report it
        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }

    /// Discard lines until the document `scanner` is tracking balances, or EOF
    fn skip_document(&mut self, scanner: &mut BalanceScanner) -> Result<(), SourceError> {
        while !scanner.is_complete() {
            if self.next_line(Some(&mut *scanner))?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

impl<R: BufRead> EventSource for ReaderSource<R> {
    fn read_record(&mut self) -> Result<Option<String>, SourceError> {
        match self.options.framing {
            Framing::Line => self.read_line_record(),
            Framing::Object => self.read_object_record(),
        }
    }
}

/// Adapts an iterator of records into a source
pub struct IterSource<I> {
    records: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Result<String, SourceError>>,
{
    pub fn new(records: I) -> Self {
        IterSource { records }
    }
}

impl<I> EventSource for IterSource<I>
where
    I: Iterator<Item = Result<String, SourceError>>,
{
    fn read_record(&mut self) -> Result<Option<String>, SourceError> {
        self.records.next().transpose()
    }
}

/// Where records come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Stdin,
    File(PathBuf),
    Tcp(String),
}

impl SourceLocation {
    /// `-` means stdin, `tcp://host:port` a socket, anything else a file path
    pub fn parse(location: &str) -> Result<Self, SourceError> {
        if location == "-" {
            return Ok(SourceLocation::Stdin);
        }
        if let Some(address) = location.strip_prefix("tcp://") {
            if address.is_empty() || !address.contains(':') {
                return Err(SourceError::InvalidAddress(location.to_string()));
            }
            return Ok(SourceLocation::Tcp(address.to_string()));
        }
        Ok(SourceLocation::File(PathBuf::from(location)))
    }
}

/// Establish the event source once, before the loop starts
pub fn open_source(
    location: &SourceLocation,
    options: SourceOptions,
) -> Result<Box<dyn EventSource>, SourceError> {
    match location {
        SourceLocation::Stdin => Ok(Box::new(ReaderSource::new(
            BufReader::new(io::stdin()),
            options,
        ))),
        SourceLocation::File(path) => {
            let file = File::open(path).map_err(|e| SourceError::Open {
                path: path.clone(),
                source: e,
            })?;
            Ok(Box::new(ReaderSource::new(BufReader::new(file), options)))
        }
        SourceLocation::Tcp(address) => {
            let stream = TcpStream::connect(address).map_err(|e| SourceError::Connect {
                address: address.clone(),
                source: e,
            })?;
            stream.set_read_timeout(options.read_timeout)?;
            tracing::info!(address = %address, "Connected to profiler stream");
            Ok(Box::new(ReaderSource::new(BufReader::new(stream), options)))
        }
    }
}
