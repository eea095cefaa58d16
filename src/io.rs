//! Sources and sinks that connect a pipeline to byte streams.

use crate::error::Result;
use crate::stage::{Sink, Source};
use parking_lot::Mutex;
use std::io::{self, BufRead, ErrorKind, Write};
use std::marker::PhantomData;
use std::sync::Arc;

/// A source that decodes UTF-8 code points from a reader, one at a time.
///
/// Each byte that does not start a well-formed sequence decodes to one
/// U+FFFD, and decoding resumes at the byte after it. End of input ends the
/// stream; any other read error is returned and aborts the pipeline.
pub struct CodePointSource<R> {
    name: String,
    reader: R,
    // Bytes taken from the reader but not yet decoded, at most 4
    lookahead: Vec<u8>,
    chars_read: u64,
}

impl<R: BufRead + Send + 'static> CodePointSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            name: "codepoints".to_string(),
            reader,
            lookahead: Vec::with_capacity(4),
            chars_read: 0,
        }
    }

    /// Override the stage name used in metrics and logs
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Code points produced so far, replacement characters included
    pub fn chars_read(&self) -> u64 {
        self.chars_read
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn fill_lookahead(&mut self, want: usize) -> io::Result<()> {
        while self.lookahead.len() < want {
            let Some(byte) = self.peek_byte()? else {
                break;
            };
            self.reader.consume(1);
            self.lookahead.push(byte);
        }
        Ok(())
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        self.fill_lookahead(1)?;
        let Some(&lead) = self.lookahead.first() else {
            return Ok(None);
        };

        let width = utf8_width(lead).max(1);
        self.fill_lookahead(width)?;

        let decoded = self
            .lookahead
            .get(..width)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .and_then(|s| s.chars().next());
        match decoded {
            Some(c) => {
                self.lookahead.drain(..width);
                Ok(Some(c))
            }
            None => {
                // Only the lead byte is invalid; what follows is decoded afresh
                self.lookahead.remove(0);
                Ok(Some(char::REPLACEMENT_CHARACTER))
            }
        }
    }
}

/// Length of the UTF-8 sequence introduced by `lead`, or 0 if it cannot start one
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

impl<R: BufRead + Send + 'static> Source for CodePointSource<R> {
    type Output = char;

    fn produce(&mut self) -> Result<Option<char>> {
        let next = self.read_char()?;
        if next.is_some() {
            self.chars_read += 1;
        } else {
            tracing::debug!(chars = self.chars_read, "end of input");
        }
        Ok(next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A sink that writes every text payload to a writer, verbatim and in order
pub struct WriterSink<W, T = &'static str> {
    name: String,
    writer: W,
    bytes_written: u64,
    _payload: PhantomData<fn(T)>,
}

impl<W, T> WriterSink<W, T>
where
    W: Write + Send + 'static,
    T: AsRef<str> + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            name: "writer".to_string(),
            writer,
            bytes_written: 0,
            _payload: PhantomData,
        }
    }

    /// Override the stage name used in metrics and logs
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl<W, T> Sink for WriterSink<W, T>
where
    W: Write + Send + 'static,
    T: AsRef<str> + Send + 'static,
{
    type Input = T;

    fn consume(&mut self, text: T) -> Result<()> {
        let bytes = text.as_ref().as_bytes();
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        tracing::debug!(bytes = self.bytes_written, "output flushed");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An in-memory writer that can be read back after the sink thread is gone
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    /// Everything written so far, decoded as UTF-8 with replacement
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
