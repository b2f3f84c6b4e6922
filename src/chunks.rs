use std::io::{self, Read};

use crate::errors::{read_error, Error, Result};

/// A wrapper around a reader, handing out its contents one bounded chunk at
/// a time.
///
/// Keeps a running count of bytes consumed, which the pipelines turn into
/// progress fractions.
pub(crate) struct Chunks<R: Read> {
    input: R,
    buf: Vec<u8>,
    consumed: u64,
}

impl<R: Read> Chunks<R> {
    /// Fails if `chunk_size` is zero, since every read would then look like
    /// EOF.
    pub fn new(input: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidOptions("chunk size must be non-zero".into()));
        }

        Ok(Self {
            input,
            buf: vec![0; chunk_size],
            consumed: 0,
        })
    }

    /// Bytes handed out so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Get the next chunk.
    ///
    /// Return `Ok(None)` on EOF. The chunk borrows an internal buffer, so it
    /// must be dropped before asking for the next one.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        let n = loop {
            match self.input.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(e)),
            }
        };

        if n == 0 {
            Ok(None)
        } else {
            self.consumed += n as u64;
            Ok(Some(&self.buf[..n]))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{CancelHandle, Cancellable, Error};

    #[test]
    fn bounded_chunks() -> anyhow::Result<()> {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let mut chunks = Chunks::new(Cursor::new(&data), 4096)?;

        let mut sizes = vec![];
        let mut joined = vec![];
        while let Some(chunk) = chunks.next_chunk()? {
            sizes.push(chunk.len());
            joined.extend_from_slice(chunk);
        }

        assert_eq!(sizes, [4096, 4096, 1808]);
        assert_eq!(joined, data);
        assert_eq!(chunks.consumed(), 10_000);
        Ok(())
    }

    #[test]
    fn cancelled_source() {
        let handle = CancelHandle::new();
        handle.cancel();
        let input = Cancellable::new(Cursor::new(vec![1, 2, 3]), handle);

        let mut chunks = Chunks::new(input, 16).unwrap();
        assert!(matches!(chunks.next_chunk(), Err(Error::Cancelled)));
    }

    #[test]
    fn zero_chunk_size() {
        let result = Chunks::new(Cursor::new(b"abc"), 0);
        assert!(matches!(result, Err(Error::InvalidOptions(_))));
    }
}
