// src/reader.rs

//! Buffered line reader over plain or gzip-compressed files.
//!
//! The reader keeps one contiguous buffer, moves the unconsumed remainder to
//! the front on refill, and hands out `&[u8]` line views without trailing
//! newline. A view stays valid until the next `read_line` call. Lines longer
//! than the buffer are assembled into an internal fallback vector, so
//! correctness does not depend on line length.
//!
//! Gzip inputs are detected via the two magic bytes and inflated
//! transparently; concatenated gzip members decompress into a single logical
//! line stream.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Default chunk size for reads from the underlying file.
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Tuning knobs for [`LineReader`].
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Bytes requested from the underlying source per refill.
    pub read_size: usize,
    /// Strip a trailing `\r` from every line (Windows CRLF input).
    pub strip_cr: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            read_size: DEFAULT_READ_SIZE,
            strip_cr: false,
        }
    }
}

enum Source {
    Plain(File),
    Gzip(Box<MultiGzDecoder<File>>),
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(file) => file.read(buf),
            Source::Gzip(decoder) => decoder.read(buf),
        }
    }
}

/// Streaming line reader with transparent gzip support.
pub struct LineReader {
    opts: ReaderOptions,
    src: Option<Source>,
    buf: Vec<u8>,
    cur: usize,
    end: usize,
    eof: bool,
    // Fallback storage for lines longer than the buffer.
    long_line: Vec<u8>,
    long_ready: bool,
    line_no: u64,
    byte_off: u64,
}

impl LineReader {
    /// Open `path` for line reading, probing the first two bytes for the
    /// gzip magic. The read cursor is reset to zero after the probe.
    ///
    /// # Errors
    ///
    /// Returns the underlying OS error when the file cannot be opened or the
    /// probe read fails.
    pub fn open<P: AsRef<Path>>(path: P, opts: ReaderOptions) -> io::Result<Self> {
        let mut opts = opts;
        if opts.read_size == 0 {
            opts.read_size = DEFAULT_READ_SIZE;
        }

        let mut file = File::open(path)?;
        let mut magic = [0u8; 2];
        let got = read_up_to(&mut file, &mut magic)?;
        file.seek(SeekFrom::Start(0))?;

        let src = if got == 2 && magic == GZIP_MAGIC {
            Source::Gzip(Box::new(MultiGzDecoder::new(file)))
        } else {
            Source::Plain(file)
        };

        let cap = opts.read_size * 2 + 1;
        Ok(LineReader {
            opts,
            src: Some(src),
            buf: vec![0u8; cap],
            cur: 0,
            end: 0,
            eof: false,
            long_line: Vec::new(),
            long_ready: false,
            line_no: 0,
            byte_off: 0,
        })
    }

    /// Release the underlying file and any inflater state. Safe to call more
    /// than once; subsequent `read_line` calls fail.
    pub fn close(&mut self) {
        self.src = None;
    }

    /// Number of lines produced so far.
    pub fn line_number(&self) -> u64 {
        self.line_no
    }

    /// Offset of the next unread byte in the logical (decompressed) stream.
    pub fn byte_offset(&self) -> u64 {
        self.byte_off
    }

    /// Read the next line, without the trailing newline (and without a
    /// trailing `\r` when `strip_cr` is set). Returns `Ok(None)` at end of
    /// input. The returned view is invalidated by the next call.
    pub fn read_line(&mut self) -> io::Result<Option<&[u8]>> {
        // The previous call may have handed out a view into long_line; it is
        // safe to drop that storage now.
        if self.long_ready {
            self.long_line.clear();
            self.long_ready = false;
        }

        if self.src.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "read_line on a closed reader",
            ));
        }

        if self.cur >= self.end {
            self.refill()?;
            if self.cur >= self.end && self.eof {
                return Ok(None);
            }
        }

        // Fast path: the whole line is already buffered.
        let available = self.end - self.cur;
        if let Some(pos) = find_newline(&self.buf[self.cur..self.end]) {
            let start = self.cur;
            let mut len = pos;
            self.cur += pos + 1;
            self.byte_off += (pos + 1) as u64;
            if self.opts.strip_cr && len > 0 && self.buf[start + len - 1] == b'\r' {
                len -= 1;
            }
            self.line_no += 1;
            return Ok(Some(&self.buf[start..start + len]));
        }

        if self.eof {
            // Unterminated final line.
            let start = self.cur;
            let mut len = available;
            self.cur = self.end;
            self.byte_off += available as u64;
            if self.opts.strip_cr && len > 0 && self.buf[start + len - 1] == b'\r' {
                len -= 1;
            }
            self.line_no += 1;
            return Ok(Some(&self.buf[start..start + len]));
        }

        // No newline in a partially filled buffer: assemble across refills.
        self.read_long_line().map(Some)
    }

    /// Assemble a line spanning one or more refills into `long_line`.
    fn read_long_line(&mut self) -> io::Result<&[u8]> {
        debug_assert!(self.long_line.is_empty());

        loop {
            // Consume the current remainder into the fallback buffer.
            self.long_line.extend_from_slice(&self.buf[self.cur..self.end]);
            self.byte_off += (self.end - self.cur) as u64;
            self.cur = self.end;

            self.refill()?;
            if self.cur >= self.end && self.eof {
                break;
            }

            if let Some(pos) = find_newline(&self.buf[self.cur..self.end]) {
                self.long_line.extend_from_slice(&self.buf[self.cur..self.cur + pos]);
                self.cur += pos + 1;
                self.byte_off += (pos + 1) as u64;
                break;
            }
        }

        if self.opts.strip_cr && self.long_line.last() == Some(&b'\r') {
            self.long_line.pop();
        }
        self.line_no += 1;
        self.long_ready = true;
        Ok(&self.long_line)
    }

    /// Move the unconsumed tail to the front of the buffer and read more
    /// bytes after it, from the file or through the inflater.
    fn refill(&mut self) -> io::Result<()> {
        if self.eof {
            return Ok(());
        }

        let remainder = self.end - self.cur;
        if remainder > 0 && self.cur > 0 {
            self.buf.copy_within(self.cur..self.end, 0);
        }
        self.cur = 0;
        self.end = remainder;

        let cap = self.buf.len() - self.end;
        let want = self.opts.read_size.min(cap);
        let Some(src) = self.src.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refill on a closed reader",
            ));
        };
        let n = src.read(&mut self.buf[self.end..self.end + want])?;
        if n == 0 {
            self.eof = true;
        } else {
            self.end += n;
        }
        Ok(())
    }
}

fn find_newline(haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == b'\n')
}

/// Read into `buf` until it is full or the reader hits EOF.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
