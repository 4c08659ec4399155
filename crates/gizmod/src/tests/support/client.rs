//! Line-oriented controller client used by the session scenarios.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use gizmo_protocol::{Request, Response};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Controller connected over the daemon's Unix socket.
pub struct TestClient {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl TestClient {
    pub fn connect(path: &Path) -> io::Result<Self> {
        let stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    pub fn send(&mut self, request: &Request) -> io::Result<()> {
        let frame = request
            .to_envelope()
            .and_then(|envelope| envelope.to_frame())
            .map_err(io::Error::other)?;
        self.send_raw(&frame)
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    pub fn receive(&mut self) -> Result<Response, String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|error| error.to_string())?;
        if read == 0 {
            return Err(String::from("connection closed by daemon"));
        }
        Response::decode(line.as_bytes()).map_err(|error| error.to_string())
    }

    pub fn request(&mut self, request: &Request) -> Result<Response, String> {
        self.send(request).map_err(|error| error.to_string())?;
        self.receive()
    }

    /// Whether the daemon has closed its end of the session.
    pub fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(self.reader.read_line(&mut line), Ok(0))
    }
}
