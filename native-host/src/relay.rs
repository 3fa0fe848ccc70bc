//! Native messaging framing and the socket relay

use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// What a page sees when the match service is not running
pub const NOT_READY_MESSAGE: &str = "Could not establish connection. Receiving end does not exist.";

/// Largest message a browser sends to a native host
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Read one length-prefixed frame. `None` on EOF or a zero-length frame.
pub fn read_frame<R: Read>(input: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];

    match input.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes is too large", length),
        ));
    }

    let mut message = vec![0u8; length];
    input.read_exact(&mut message)?;

    Ok(Some(message))
}

/// Write one length-prefixed frame
pub fn write_frame<W: Write>(output: &mut W, message: &[u8]) -> io::Result<()> {
    let length = u32::try_from(message.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

    output.write_all(&length.to_ne_bytes())?;
    output.write_all(message)?;
    output.flush()?;

    Ok(())
}

/// Error envelope in the match service's response shape
pub fn error_response(message: &str) -> Vec<u8> {
    serde_json::json!({ "success": false, "error": message })
        .to_string()
        .into_bytes()
}

/// Forwards frames to the match service socket
pub struct Relay<'a> {
    socket_path: &'a Path,
    timeout: Duration,
}

impl<'a> Relay<'a> {
    pub fn new(socket_path: &'a Path, timeout: Duration) -> Self {
        Self {
            socket_path,
            timeout,
        }
    }

    /// Forward one message and return the service's reply.
    ///
    /// Never fails: every problem is turned into an error envelope.
    pub fn forward(&self, message: &[u8]) -> Vec<u8> {
        // Re-encode so the message is guaranteed to be a single line
        let line = match serde_json::from_slice::<serde_json::Value>(message) {
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!("Invalid message from browser: {}", e);
                return error_response(&format!("Invalid message: {}", e));
            }
        };

        let stream = match UnixStream::connect(self.socket_path) {
            Ok(stream) => stream,
            Err(e) => {
                debug!("Match service unreachable: {}", e);
                return error_response(NOT_READY_MESSAGE);
            }
        };

        match self.exchange(stream, &line) {
            Ok(response) if !response.is_empty() => response,
            Ok(_) => {
                warn!("Match service closed the connection without replying");
                error_response(NOT_READY_MESSAGE)
            }
            Err(e) => {
                warn!("Service error: {}", e);
                error_response(&format!("Service unavailable: {}", e))
            }
        }
    }

    fn exchange(&self, mut stream: UnixStream, line: &str) -> io::Result<Vec<u8>> {
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut response = Vec::new();
        BufReader::new(stream).read_until(b'\n', &mut response)?;
        if response.last() == Some(&b'\n') {
            response.pop();
        }

        Ok(response)
    }
}

/// Relay frames from `input` to `output` until the browser hangs up
pub fn run<R: Read, W: Write>(relay: &Relay<'_>, input: &mut R, output: &mut W) -> io::Result<u64> {
    let mut handled = 0;

    while let Some(message) = read_frame(input)? {
        debug!("Received {} bytes from browser", message.len());

        let response = relay.forward(&message);
        write_frame(output, &response)?;
        handled += 1;
    }

    Ok(handled)
}
