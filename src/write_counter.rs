//! A `Write` wrapper that counts bytes written. READDIR and READDIRPLUS
//! use it to stop emitting entries before the client's byte budget is
//! exceeded.

use std::io::Write;

pub struct WriteCounter<W> {
    inner: W,
    count: usize,
}

impl<W: Write> WriteCounter<W> {
    pub fn new(inner: W) -> Self {
        WriteCounter { inner, count: 0 }
    }

    /// Bytes successfully written so far.
    pub fn bytes_written(&self) -> usize {
        self.count
    }
}

impl<W: Write> Write for WriteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_across_writes() {
        let mut sink = Vec::new();
        let mut counter = WriteCounter::new(&mut sink);
        counter.write_all(b"hello").unwrap();
        counter.write_all(b" world").unwrap();
        assert_eq!(counter.bytes_written(), 11);
        assert_eq!(sink, b"hello world");
    }
}
