//! Newline-delimited framing.
//!
//! Frames are arbitrary byte strings terminated by [`FRAME_DELIMITER`]. The
//! decoder is a pure accumulator so the same input yields the same frames no
//! matter how the transport chunks it.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};

use thiserror::Error;

/// Byte terminating every frame.
pub const FRAME_DELIMITER: u8 = b'\n';

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Errors raised while accumulating frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A frame grew beyond the configured limit.
    #[error("frame of at least {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Bytes buffered for the offending frame.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Splits a byte stream into frames.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    scanned: usize,
    max_frame_bytes: Option<usize>,
    overflow: Option<FrameError>,
}

impl FrameDecoder {
    /// Creates an unbounded decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_frame_bytes: None,
            overflow: None,
        }
    }

    /// Creates a decoder that rejects frames longer than `max_frame_bytes`.
    #[must_use]
    pub const fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_frame_bytes: Some(max_frame_bytes),
            overflow: None,
        }
    }

    /// Appends `chunk` and returns every frame it completes, delimiters
    /// stripped.
    ///
    /// Frames that precede an oversized one in the same chunk are still
    /// returned; the overflow is then reported by the next call, or by
    /// [`take_overflow`](Self::take_overflow). Bytes after the oversized frame
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] when a completed or pending frame
    /// exceeds the limit and no earlier frame of the chunk is left to return.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
        if let Some(error) = self.overflow.take() {
            return Err(error);
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self
            .buffer
            .get(cursor..)
            .and_then(|rest| rest.iter().position(|byte| *byte == FRAME_DELIMITER))
        {
            let end = cursor + offset;
            if let Err(error) = self.check(end - start) {
                return self.overflowed(frames, error);
            }
            frames.push(
                self.buffer
                    .get(start..end)
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default(),
            );
            start = end + 1;
            cursor = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        if let Err(error) = self.check(self.buffer.len()) {
            return self.overflowed(frames, error);
        }
        Ok(frames)
    }

    /// Takes an overflow deferred by an earlier [`push`](Self::push).
    pub fn take_overflow(&mut self) -> Option<FrameError> {
        self.overflow.take()
    }

    /// Bytes retained for the next, not yet terminated, frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any retained bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    fn check(&self, size: usize) -> Result<(), FrameError> {
        match self.max_frame_bytes {
            Some(limit) if size > limit => Err(FrameError::TooLarge { size, limit }),
            _ => Ok(()),
        }
    }

    fn overflowed(
        &mut self,
        frames: Vec<Vec<u8>>,
        error: FrameError,
    ) -> Result<Vec<Vec<u8>>, FrameError> {
        self.reset();
        if frames.is_empty() {
            Err(error)
        } else {
            self.overflow = Some(error);
            Ok(frames)
        }
    }
}

/// Errors raised by [`FrameReader`].
#[derive(Debug, Error)]
pub enum FrameReadError {
    /// The underlying reader failed.
    #[error("failed to read frame: {0}")]
    Io(#[from] io::Error),
    /// The peer sent an oversized frame.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Lazily yields frames read from `R`.
///
/// Iteration ends at end of stream; an unterminated tail is discarded. The
/// first error ends iteration after being yielded.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
    ready: VecDeque<Vec<u8>>,
    chunk: Vec<u8>,
    finished: bool,
    discarded: usize,
}

impl<R: Read> FrameReader<R> {
    /// Wraps `reader` with an unbounded decoder.
    pub fn new(reader: R) -> Self {
        Self::with_decoder(reader, FrameDecoder::new())
    }

    /// Wraps `reader` using the supplied decoder.
    pub fn with_decoder(reader: R, decoder: FrameDecoder) -> Self {
        Self {
            reader,
            decoder,
            ready: VecDeque::new(),
            chunk: vec![0; READ_CHUNK_BYTES],
            finished: false,
            discarded: 0,
        }
    }

    /// Size of the unterminated tail dropped at end of stream.
    #[must_use]
    pub const fn discarded_tail(&self) -> usize {
        self.discarded
    }

    /// Returns the wrapped reader, dropping any buffered frames.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fill(&mut self) -> Result<bool, FrameReadError> {
        let read = loop {
            match self.reader.read(&mut self.chunk) {
                Ok(read) => break read,
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(error.into()),
            }
        };
        if read == 0 {
            self.discarded = self.decoder.pending();
            self.decoder.reset();
            return Ok(false);
        }
        let bytes = self.chunk.get(..read).unwrap_or_default();
        let frames = self.decoder.push(bytes)?;
        self.ready.extend(frames);
        Ok(true)
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Vec<u8>, FrameReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }
            if self.finished {
                return None;
            }
            if let Some(error) = self.decoder.take_overflow() {
                self.finished = true;
                return Some(Err(error.into()));
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

/// Terminates `payload` with the frame delimiter, ready for one write.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(FRAME_DELIMITER);
    frame
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    const STREAM: &[u8] = b"{\"type\":\"listPages\"}\n\n{\"type\":\"listApps\"}\npartial";

    fn decode_in_chunks(input: &[u8], chunk: usize) -> (Vec<Vec<u8>>, usize) {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for piece in input.chunks(chunk) {
            frames.extend(decoder.push(piece).expect("unbounded decoder"));
        }
        (frames, decoder.pending())
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(7)]
    #[case(19)]
    #[case(STREAM.len())]
    fn chunking_does_not_change_frames(#[case] chunk: usize) {
        let (frames, pending) = decode_in_chunks(STREAM, chunk);
        let expected: Vec<Vec<u8>> = vec![
            b"{\"type\":\"listPages\"}".to_vec(),
            Vec::new(),
            b"{\"type\":\"listApps\"}".to_vec(),
        ];
        assert_eq!(frames, expected);
        assert_eq!(pending, b"partial".len());
    }

    #[test]
    fn pending_frame_completes_on_later_push() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"abc").expect("push").is_empty());
        assert_eq!(decoder.push(b"def\n").expect("push"), vec![b"abcdef".to_vec()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[rstest]
    #[case::pending(b"123456".as_slice())]
    #[case::completed(b"123456\n".as_slice())]
    fn oversized_frames_are_rejected(#[case] input: &[u8]) {
        let mut decoder = FrameDecoder::with_limit(5);
        let error = decoder.push(input).expect_err("frame exceeds limit");
        assert!(matches!(error, FrameError::TooLarge { limit: 5, .. }));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn frames_before_an_oversized_one_are_returned_first() {
        let mut decoder = FrameDecoder::with_limit(5);
        assert_eq!(
            decoder.push(b"ok\n1234567\nlost\n").expect("earlier frame kept"),
            vec![b"ok".to_vec()]
        );
        assert_eq!(decoder.pending(), 0);
        let error = decoder.push(b"next\n").expect_err("overflow reported next");
        assert!(matches!(error, FrameError::TooLarge { size: 7, limit: 5 }));
        assert_eq!(decoder.push(b"next\n").expect("decoder recovers"), vec![b"next".to_vec()]);
    }

    #[test]
    fn reader_reports_deferred_overflow_without_reading_again() {
        let input = Cursor::new(b"ok\n1234567".to_vec());
        let mut reader = FrameReader::with_decoder(input, FrameDecoder::with_limit(5));
        assert_eq!(reader.next().map(|item| item.ok()), Some(Some(b"ok".to_vec())));
        assert!(matches!(
            reader.next(),
            Some(Err(FrameReadError::Frame(FrameError::TooLarge { limit: 5, .. })))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn frames_at_the_limit_are_accepted() {
        let mut decoder = FrameDecoder::with_limit(5);
        assert_eq!(decoder.push(b"12345\n").expect("push"), vec![b"12345".to_vec()]);
    }

    #[test]
    fn reader_discards_unterminated_tail() {
        let mut reader = FrameReader::new(Cursor::new(STREAM.to_vec()));
        let frames: Vec<Vec<u8>> = reader
            .by_ref()
            .collect::<Result<_, _>>()
            .expect("cursor never fails");
        assert_eq!(frames.len(), 3);
        assert_eq!(reader.discarded_tail(), b"partial".len());
        assert!(reader.next().is_none());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn reader_yields_io_error_once() {
        let mut reader = FrameReader::new(FailingReader);
        assert!(matches!(reader.next(), Some(Err(FrameReadError::Io(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn encode_frame_appends_single_delimiter() {
        assert_eq!(encode_frame(b"abc"), b"abc\n".to_vec());
    }
}
