//! Line acquisition primitives (spec §4.3 and §6's line-source contract).
//!
//! The historical contract is `read_line(buf, cap) -> (c, n_written)`: fill
//! up to `cap` bytes, return the last byte read and how many were written.
//! Because this engine's line buffers grow monotonically (§9, "arena-free
//! buffer ownership") rather than being handed a fixed `cap`, the Rust
//! shape of the contract drops the capacity parameter: a `LineSource`
//! simply appends one logical line's bytes (excluding the terminator) onto
//! a caller-owned `Vec<u8>` and reports how the line ended.

use crate::error::NdiffResult;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// How a `read_line`/`skip_line` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// A newline terminated the line; more lines may follow.
    Newline,
    /// The source hit EOF. If bytes were written, they form the final,
    /// unterminated line.
    Eof,
}

/// A source of raw lines, independent of line structure for `skip_space`
/// (which must see past line boundaries to consume trailing blanks).
pub trait LineSource {
    /// Append the next logical line's bytes (excluding `\n`) to `buf`, which
    /// is NOT cleared first (the caller controls that, matching
    /// `fill_line`'s ability to inject content ahead of a read).
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<LineEnd>;

    /// Discard one logical line without materializing it.
    fn skip_line(&mut self) -> io::Result<LineEnd>;

    /// Consume a run of ASCII blanks (`' '`, `'\t'`, `'\n'`) from the
    /// current position, stopping at the first non-blank byte or EOF.
    fn skip_space(&mut self) -> io::Result<()>;

    /// True once the source has nothing left to read.
    fn at_eof(&mut self) -> io::Result<bool>;
}

/// A `LineSource` over any `BufRead` — the default for stdin and for plain
/// files where memory-mapping is undesirable (pipes, small inputs).
pub struct ReaderLineSource<R: BufRead> {
    reader: R,
    eof: bool,
}

impl<R: BufRead> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, eof: false }
    }
}

impl ReaderLineSource<BufReader<File>> {
    pub fn open(path: &Path) -> NdiffResult<Self> {
        use crate::error::NdiffContext;
        let file = File::open(path).with_file_context(&path.to_string_lossy())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<LineEnd> {
        let mut tmp = Vec::new();
        let n = self.reader.read_until(b'\n', &mut tmp)?;
        if n == 0 {
            self.eof = true;
            return Ok(LineEnd::Eof);
        }
        if tmp.last() == Some(&b'\n') {
            tmp.pop();
            buf.extend_from_slice(&tmp);
            Ok(LineEnd::Newline)
        } else {
            buf.extend_from_slice(&tmp);
            self.eof = true;
            Ok(LineEnd::Eof)
        }
    }

    fn skip_line(&mut self) -> io::Result<LineEnd> {
        let mut tmp = Vec::new();
        let n = self.reader.read_until(b'\n', &mut tmp)?;
        if n == 0 {
            self.eof = true;
            return Ok(LineEnd::Eof);
        }
        if tmp.last() == Some(&b'\n') {
            Ok(LineEnd::Newline)
        } else {
            self.eof = true;
            Ok(LineEnd::Eof)
        }
    }

    fn skip_space(&mut self) -> io::Result<()> {
        loop {
            let consumed = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    self.eof = true;
                    return Ok(());
                }
                let n = available
                    .iter()
                    .take_while(|&&b| b == b' ' || b == b'\t' || b == b'\n')
                    .count();
                n
            };
            if consumed == 0 {
                return Ok(());
            }
            self.reader.consume(consumed);
        }
    }

    fn at_eof(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(true);
        }
        Ok(self.reader.fill_buf()?.is_empty())
    }
}

/// A `LineSource` over a memory-mapped file, scanning directly in the
/// mapped bytes rather than copying through a `BufReader`'s internal
/// buffer — the same "point into the mapping" strategy the teacher's
/// `zero_copy::MappedFile` uses for whole-file sorting, adapted here to
/// sequential single-line reads.
pub struct MmapLineSource {
    mmap: Mmap,
    pos: usize,
}

impl MmapLineSource {
    pub fn open(path: &Path) -> NdiffResult<Self> {
        use crate::error::NdiffContext;
        let file = File::open(path).with_file_context(&path.to_string_lossy())?;
        // SAFETY: the mapping is read-only for the engine's lifetime and
        // the file is not mutated concurrently by this process.
        let mmap = unsafe { Mmap::map(&file) }.with_file_context(&path.to_string_lossy())?;
        Ok(Self { mmap, pos: 0 })
    }

    fn remaining(&self) -> &[u8] {
        &self.mmap[self.pos..]
    }
}

impl LineSource for MmapLineSource {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<LineEnd> {
        if self.pos >= self.mmap.len() {
            return Ok(LineEnd::Eof);
        }
        let rest = self.remaining();
        match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => {
                buf.extend_from_slice(&rest[..nl]);
                self.pos += nl + 1;
                Ok(LineEnd::Newline)
            }
            None => {
                buf.extend_from_slice(rest);
                self.pos = self.mmap.len();
                Ok(LineEnd::Eof)
            }
        }
    }

    fn skip_line(&mut self) -> io::Result<LineEnd> {
        if self.pos >= self.mmap.len() {
            return Ok(LineEnd::Eof);
        }
        let rest = self.remaining();
        match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => {
                self.pos += nl + 1;
                Ok(LineEnd::Newline)
            }
            None => {
                self.pos = self.mmap.len();
                Ok(LineEnd::Eof)
            }
        }
    }

    fn skip_space(&mut self) -> io::Result<()> {
        while self.pos < self.mmap.len() {
            let b = self.mmap[self.pos];
            if b == b' ' || b == b'\t' || b == b'\n' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.pos >= self.mmap.len())
    }
}

/// An in-memory `LineSource` used by tests and by `Engine::fill_line`'s
/// callers to drive the engine over pre-made content without a real file.
pub struct StringLineSource {
    lines: Vec<Vec<u8>>,
    idx: usize,
}

impl StringLineSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            idx: 0,
        }
    }
}

impl LineSource for StringLineSource {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<LineEnd> {
        if self.idx >= self.lines.len() {
            return Ok(LineEnd::Eof);
        }
        buf.extend_from_slice(&self.lines[self.idx]);
        self.idx += 1;
        if self.idx >= self.lines.len() {
            Ok(LineEnd::Eof)
        } else {
            Ok(LineEnd::Newline)
        }
    }

    fn skip_line(&mut self) -> io::Result<LineEnd> {
        let mut discard = Vec::new();
        self.read_line(&mut discard)
    }

    fn skip_space(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.idx >= self.lines.len())
    }
}

/// Read an entire readable stream into memory up front — a small helper
/// used when a `LineSource` over stdin needs to be seekable for tests.
pub fn slurp(mut r: impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_source_reports_newline_then_eof() {
        let mut src = StringLineSource::new(["a", "b"]);
        let mut buf = Vec::new();
        assert_eq!(src.read_line(&mut buf).unwrap(), LineEnd::Newline);
        assert_eq!(buf, b"a");
        buf.clear();
        assert_eq!(src.read_line(&mut buf).unwrap(), LineEnd::Eof);
        assert_eq!(buf, b"b");
    }

    #[test]
    fn reader_source_splits_on_newline_and_detects_eof() {
        let data: &[u8] = b"first\nsecond";
        let mut src = ReaderLineSource::new(data);
        let mut buf = Vec::new();
        assert_eq!(src.read_line(&mut buf).unwrap(), LineEnd::Newline);
        assert_eq!(buf, b"first");
        buf.clear();
        assert_eq!(src.read_line(&mut buf).unwrap(), LineEnd::Eof);
        assert_eq!(buf, b"second");
    }

    #[test]
    fn skip_space_consumes_blanks_across_calls() {
        let data: &[u8] = b"   \n\tx";
        let mut src = ReaderLineSource::new(data);
        src.skip_space().unwrap();
        let mut buf = Vec::new();
        src.read_line(&mut buf).unwrap();
        assert_eq!(buf, b"x");
    }
}
