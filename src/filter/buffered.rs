use std::os::fd::BorrowedFd;
use std::time::Duration;

use super::{ByteStream, Progress, WriteQueue};
use crate::error::IoError;
use crate::wait::{Direction, Readiness};

/// Write side that never pushes back on the caller.
///
/// Every write is copied into a queue and the queue is drained as far as the
/// inner stream allows. Would-block is absorbed and only shows up through
/// [`is_write_blocked`](Self::is_write_blocked); a fatal inner error discards
/// whatever was still queued.
#[derive(Debug)]
pub struct BufferedWriteStream<S> {
    inner: S,
    queue: WriteQueue,
    write_blocked: bool,
    read_blocked: bool,
}

impl<S: ByteStream> BufferedWriteStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            queue: WriteQueue::new(),
            write_blocked: false,
            read_blocked: false,
        }
    }

    /// Queues `buf` and drains. Success means every byte of `buf` is owned by
    /// the stream, sent or queued.
    pub fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
        self.write_blocked = false;
        self.queue.push(buf);
        self.drain()?;
        Ok(Progress::Bytes(buf.len()))
    }

    /// One drain attempt; does not wait for the queue to empty.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.write_blocked = false;
        self.drain()
    }

    /// Reads straight from the inner stream.
    pub fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress> {
        self.read_blocked = false;
        let progress = self.inner.read(buf)?;
        if progress.is_would_block() {
            self.read_blocked = true;
        }
        Ok(progress)
    }

    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_write_blocked(&self) -> bool {
        self.write_blocked
    }

    #[inline]
    pub fn is_read_blocked(&self) -> bool {
        self.read_blocked
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the inner stream. Queued bytes are lost.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn drain(&mut self) -> std::io::Result<()> {
        loop {
            let (head, _) = self.queue.chunks();
            if head.is_empty() {
                return Ok(());
            }

            match self.inner.write(head) {
                Ok(Progress::Bytes(0)) | Ok(Progress::WouldBlock) => {
                    self.write_blocked = true;
                    return Ok(());
                }
                Ok(Progress::Bytes(n)) => self.queue.commit(n),
                Ok(Progress::Eof) => {
                    tracing::debug!("peer closed with {} bytes queued", self.queue.len());
                    self.queue.clear();
                    return Err(IoError::ConnectionClosed.into());
                }
                Err(err) => {
                    tracing::debug!("write failed with {} bytes queued: {}", self.queue.len(), err);
                    self.queue.clear();
                    return Err(err);
                }
            }
        }
    }
}

impl<S: ByteStream> ByteStream for BufferedWriteStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress> {
        BufferedWriteStream::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
        BufferedWriteStream::write(self, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        BufferedWriteStream::flush(self)
    }

    fn pending_write(&self) -> usize {
        self.queue.len() + self.inner.pending_write()
    }

    fn is_read_blocked(&self) -> bool {
        self.read_blocked
    }

    fn is_write_blocked(&self) -> bool {
        self.write_blocked
    }

    fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
        self.inner.wait(direction, timeout)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
        self.inner.set_nonblocking(nonblocking)
    }

    fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        self.inner.readiness_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Accept(usize),
        Block,
        Fail,
    }

    /// Replays `script` one step per write call; accepts everything once empty.
    #[derive(Default)]
    struct Scripted {
        script: VecDeque<Step>,
        sent: Vec<u8>,
        reads: VecDeque<Progress>,
    }

    impl Scripted {
        fn with(script: &[Step]) -> Self {
            Self { script: script.iter().copied().collect(), ..Default::default() }
        }
    }

    impl ByteStream for Scripted {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<Progress> {
            Ok(self.reads.pop_front().unwrap_or(Progress::WouldBlock))
        }

        fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
            match self.script.pop_front() {
                None => {
                    self.sent.extend_from_slice(buf);
                    Ok(Progress::Bytes(buf.len()))
                }
                Some(Step::Accept(n)) => {
                    let n = n.min(buf.len());
                    self.sent.extend_from_slice(&buf[..n]);
                    Ok(Progress::Bytes(n))
                }
                Some(Step::Block) => Ok(Progress::WouldBlock),
                Some(Step::Fail) => Err(std::io::ErrorKind::BrokenPipe.into()),
            }
        }

        fn wait(&self, _direction: Direction, _timeout: Duration) -> std::io::Result<Readiness> {
            Ok(Readiness::Ready)
        }
    }

    #[test]
    fn would_block_is_absorbed() {
        let mut stream = BufferedWriteStream::new(Scripted::with(&[Step::Block]));
        assert_eq!(stream.write(b"hello").unwrap(), Progress::Bytes(5));
        assert_eq!(stream.pending_bytes(), 5);
        assert!(stream.is_write_blocked());

        stream.flush().unwrap();
        assert_eq!(stream.pending_bytes(), 0);
        assert!(!stream.is_write_blocked());
        assert_eq!(stream.get_ref().sent, b"hello");
    }

    #[test]
    fn partial_accept_resumes_at_offset() {
        let mut stream = BufferedWriteStream::new(Scripted::with(&[Step::Accept(3), Step::Block]));
        stream.write(b"abcdef").unwrap();
        assert_eq!(stream.pending_bytes(), 3);
        assert_eq!(stream.get_ref().sent, b"abc");

        stream.write(b"gh").unwrap();
        assert_eq!(stream.pending_bytes(), 0);
        assert_eq!(stream.get_ref().sent, b"abcdefgh");
    }

    #[test]
    fn fatal_error_discards_queue() {
        let mut stream = BufferedWriteStream::new(Scripted::with(&[Step::Block, Step::Fail]));
        stream.write(b"abc").unwrap();
        assert_eq!(stream.pending_bytes(), 3);

        let err = stream.write(b"d").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(stream.pending_bytes(), 0);
    }

    #[test]
    fn zero_byte_accept_counts_as_blocked() {
        let mut stream = BufferedWriteStream::new(Scripted::with(&[Step::Accept(0)]));
        stream.write(b"xy").unwrap();
        assert!(stream.is_write_blocked());
        assert_eq!(stream.pending_bytes(), 2);
    }

    #[test]
    fn read_blocked_flag_latches_until_next_read() {
        let mut inner = Scripted::default();
        inner.reads.push_back(Progress::WouldBlock);
        inner.reads.push_back(Progress::Bytes(4));
        let mut stream = BufferedWriteStream::new(inner);

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), Progress::WouldBlock);
        assert!(stream.is_read_blocked());
        assert_eq!(stream.read(&mut buf).unwrap(), Progress::Bytes(4));
        assert!(!stream.is_read_blocked());
    }

    #[test]
    fn into_inner_hands_back_the_drained_stream() {
        let mut stream = BufferedWriteStream::new(Scripted::with(&[Step::Block]));
        stream.write(b"tail").unwrap();
        stream.flush().unwrap();
        assert_eq!(stream.pending_bytes(), 0);

        let inner = stream.into_inner();
        assert_eq!(inner.sent, b"tail");
        assert!(inner.script.is_empty());
    }

    #[test]
    fn layers_through_trait_object() {
        let mut stream: Box<dyn ByteStream> =
            Box::new(BufferedWriteStream::new(Scripted::with(&[Step::Block])));
        stream.write(b"queued").unwrap();
        assert_eq!(stream.pending_write(), 6);
        assert!(stream.is_write_blocked());
    }
}
