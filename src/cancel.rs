use std::{
    io::{self, prelude::*, SeekFrom},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// A switch the host flips to abandon a running pipeline.
///
/// Cloning shares the switch. The pipeline itself never polls this; it only
/// notices through a [`Cancellable`] reader refusing to produce more input.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Payload of the `io::Error` a cancelled reader returns.
#[derive(Debug, thiserror::Error)]
#[error("input closed by host")]
pub(crate) struct InputClosed;

/// Wrapper around a reader that behaves like a closed source once its handle
/// has been cancelled.
///
/// Implements `Read`, `BufRead` and `Seek` when the inner reader does.
pub struct Cancellable<R> {
    inner: R,
    handle: CancelHandle,
}

impl<R> Cancellable<R> {
    pub fn new(inner: R, handle: CancelHandle) -> Self {
        Self { inner, handle }
    }

    fn check(&self) -> io::Result<()> {
        if self.handle.is_cancelled() {
            Err(io::Error::new(io::ErrorKind::Other, InputClosed))
        } else {
            Ok(())
        }
    }
}

impl<R: Read> Read for Cancellable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.read(buf)
    }
}

impl<R: BufRead> BufRead for Cancellable<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.check()?;
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
    }
}

impl<R: Seek> Seek for Cancellable<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check()?;
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_until_cancelled() {
        let handle = CancelHandle::new();
        let mut reader = Cancellable::new(Cursor::new(b"abcdef".to_vec()), handle.clone());

        let mut buf = [0; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        handle.cancel();
        let err = reader.read(&mut buf).unwrap_err();
        assert!(err.get_ref().unwrap().is::<InputClosed>());
    }
}
