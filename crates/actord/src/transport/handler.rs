//! Connection handling abstractions for the listener.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// Largest inbound line accepted before the connection is dropped.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

const READ_CHUNK_BYTES: usize = 1024;

/// Stream accepted by the listener.
#[derive(Debug)]
pub(crate) struct ConnectionStream {
    stream: TcpStream,
}

impl ConnectionStream {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub(crate) fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Returns a second handle to the same socket, used as the write half.
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        self.stream.try_clone().map(Self::new)
    }

    /// Shuts down both directions; a reader blocked on the other half wakes
    /// with end-of-stream.
    pub(crate) fn shutdown(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(error) if error.kind() != io::ErrorKind::NotConnected => Err(error),
            _ => Ok(()),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection until it closes. Implementations should
    /// avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Splits a byte stream into `\n`-delimited lines.
///
/// Bytes after the last delimiter are kept for the next call. A line that
/// grows past the configured limit without a delimiter is an error.
pub(crate) struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
    limit: usize,
}

impl<R: Read> LineReader<R> {
    pub(crate) fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            limit,
        }
    }

    /// Returns the next line without its delimiter, or `None` once the peer
    /// has closed and nothing is left.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                return Ok(Some(line));
            }
            enforce_line_limit(self.buffer.len(), self.limit)?;

            let bytes_read = read_chunk_with_retry(&mut self.inner, &mut chunk)?;
            if bytes_read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }
            self.buffer
                .extend_from_slice(chunk.get(..bytes_read).unwrap_or_default());
        }
    }
}

fn read_chunk_with_retry<R: Read>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn enforce_line_limit(size: usize, limit: usize) -> io::Result<()> {
    if size > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds maximum size of {limit} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn lines(input: &[u8], limit: usize) -> io::Result<Vec<Vec<u8>>> {
        let mut reader = LineReader::new(Cursor::new(input.to_vec()), limit);
        let mut out = Vec::new();
        while let Some(line) = reader.next_line()? {
            out.push(line);
        }
        Ok(out)
    }

    #[rstest]
    fn splits_on_newlines_and_keeps_trailing_partial_line() {
        let out = lines(b"ping\n7 status\r\npartial", MAX_LINE_BYTES).expect("lines");
        assert_eq!(
            out,
            vec![b"ping".to_vec(), b"7 status\r".to_vec(), b"partial".to_vec()]
        );
    }

    #[rstest]
    fn empty_lines_are_preserved() {
        let out = lines(b"\n\n", MAX_LINE_BYTES).expect("lines");
        assert_eq!(out, vec![Vec::<u8>::new(), Vec::new()]);
    }

    #[rstest]
    fn lines_spanning_several_reads_are_joined() {
        let long = vec![b'a'; READ_CHUNK_BYTES * 3];
        let mut input = long.clone();
        input.push(b'\n');
        let out = lines(&input, MAX_LINE_BYTES).expect("lines");
        assert_eq!(out, vec![long]);
    }

    #[rstest]
    fn oversized_lines_are_rejected() {
        let input = vec![b'x'; 4096];
        let error = lines(&input, 1024).expect_err("line should be too long");
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }
}
