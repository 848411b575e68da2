use std::io::{self, Read};

/// Read buffer with an explicit cursor that supports looking ahead of the cursor.
///
/// Unread bytes are moved to the front of the buffer before every refill, so a peek
/// never loses bytes that were buffered but not consumed yet.
pub(crate) struct LookaheadBuffer {
    data: Vec<u8>,
    pos: usize,
    len: usize,
    eof: bool,
}

impl LookaheadBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity.max(1)],
            pos: 0,
            len: 0,
            eof: false,
        }
    }

    /// Number of buffered bytes that have not been consumed yet.
    #[inline]
    pub fn residual(&self) -> usize {
        self.len - self.pos
    }

    /// Consumes the next byte.
    pub fn next<R: Read>(&mut self, src: &mut R) -> io::Result<Option<u8>> {
        if !self.ensure(src, 1)? {
            return Ok(None);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    /// Returns the byte `offset` positions after the cursor without consuming anything.
    pub fn peek<R: Read>(&mut self, src: &mut R, offset: usize) -> io::Result<Option<u8>> {
        if !self.ensure(src, offset + 1)? {
            return Ok(None);
        }
        Ok(Some(self.data[self.pos + offset]))
    }

    /// Makes sure at least `count` unread bytes are buffered.
    ///
    /// Returns false if the source ran dry before that.
    fn ensure<R: Read>(&mut self, src: &mut R, count: usize) -> io::Result<bool> {
        while self.residual() < count {
            if self.eof {
                return Ok(false);
            }

            let residual = self.residual();
            if self.pos > 0 {
                self.data.copy_within(self.pos..self.len, 0);
                self.pos = 0;
                self.len = residual;
            }

            if self.len == self.data.len() {
                let grown = (self.data.len() * 2).max(count);
                self.data.resize(grown, 0);
            }

            let read = loop {
                match src.read(&mut self.data[self.len..]) {
                    Ok(read) => break read,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            };

            if read == 0 {
                self.eof = true;
            } else {
                self.len += read;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out a single byte per `read` call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.is_empty()) {
                (Some((b, rest)), false) => {
                    buf[0] = *b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let mut src = Trickle(b"abcdef");
        let mut buf = LookaheadBuffer::with_capacity(2);

        assert_eq!(buf.next(&mut src).unwrap(), Some(b'a'));
        assert_eq!(buf.peek(&mut src, 3).unwrap(), Some(b'e'));
        assert_eq!(buf.residual(), 4);
        assert_eq!(buf.next(&mut src).unwrap(), Some(b'b'));
        assert_eq!(buf.next(&mut src).unwrap(), Some(b'c'));
        assert_eq!(buf.peek(&mut src, 2).unwrap(), Some(b'f'));
        assert_eq!(buf.peek(&mut src, 3).unwrap(), None);
        assert_eq!(buf.next(&mut src).unwrap(), Some(b'd'));
        assert_eq!(buf.next(&mut src).unwrap(), Some(b'e'));
        assert_eq!(buf.next(&mut src).unwrap(), Some(b'f'));
        assert_eq!(buf.next(&mut src).unwrap(), None);
    }

    #[test]
    fn refill_preserves_unread_bytes() {
        let mut src = &b"0123456789"[..];
        let mut buf = LookaheadBuffer::with_capacity(4);

        for expected in b"012".iter() {
            assert_eq!(buf.next(&mut src).unwrap(), Some(*expected));
        }
        // only "3" is buffered, peeking further forces a compacting refill
        assert_eq!(buf.peek(&mut src, 4).unwrap(), Some(b'7'));
        let rest = std::iter::from_fn(|| buf.next(&mut src).unwrap()).collect::<Vec<_>>();
        assert_eq!(rest, b"3456789");
    }
}
