//! Supervisor handshake channel
//!
//! The supervisor talks to an event listener over the listener's stdin and
//! stdout. The listener announces `READY\n`, the supervisor sends one header
//! line ending in `len:N` followed by exactly N payload bytes, and the
//! listener answers `RESULT 2\nOK` once it is done with the frame. Only then
//! does the supervisor send the next frame.

use std::fmt;
use std::io::{self, BufRead, Read, Write};

use crate::error::ChannelError;

/// Token announcing that the listener can take a frame
pub const READY_TOKEN: &[u8] = b"READY\n";

/// Acknowledgement body for a consumed frame
pub const ACK_TOKEN: &[u8; 2] = b"OK";

/// Result envelope wrapped around the acknowledgement body
const RESULT_HEADER: &[u8] = b"RESULT 2\n";

/// One raw unit of the event protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header line without its trailing newline
    pub header: Vec<u8>,
    /// Exactly the declared number of payload bytes
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    AwaitingFrame,
    ReadingHeader,
    ReadingPayload { remaining: usize },
    DispatchReady,
    Closed,
}

impl ChannelState {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::AwaitingFrame => "AwaitingFrame",
            ChannelState::ReadingHeader => "ReadingHeader",
            ChannelState::ReadingPayload { .. } => "ReadingPayload",
            ChannelState::DispatchReady => "DispatchReady",
            ChannelState::Closed => "Closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handshake state machine over a reader (supervisor to listener) and a
/// writer (listener to supervisor)
pub struct SupervisorChannel<R, W> {
    reader: R,
    writer: W,
    state: ChannelState,
}

impl<R: BufRead, W: Write> SupervisorChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            state: ChannelState::AwaitingFrame,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    /// Announce readiness and read the next frame.
    ///
    /// Returns `Ok(None)` once the supervisor has gone away: end of stream
    /// before a frame, or a frame cut short mid-header or mid-payload. No
    /// acknowledgement is owed in that case.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ChannelError> {
        match self.state {
            ChannelState::AwaitingFrame => {}
            ChannelState::Closed => return Ok(None),
            other => {
                return Err(ChannelError::OutOfOrder {
                    operation: "next_frame",
                    state: other.name(),
                });
            }
        }

        if let Err(e) = self.write_flushed(&[READY_TOKEN]) {
            return self.close_on_io(e);
        }

        let mut header = Vec::with_capacity(128);
        let read = match self.reader.read_until(b'\n', &mut header) {
            Ok(n) => n,
            Err(e) => return self.close_on_io(e),
        };
        if read == 0 {
            log::debug!("Supervisor closed the event stream");
            self.state = ChannelState::Closed;
            return Ok(None);
        }
        self.state = ChannelState::ReadingHeader;

        if header.pop() != Some(b'\n') {
            log::debug!("Event stream ended inside a header line ({} bytes)", header.len());
            self.state = ChannelState::Closed;
            return Ok(None);
        }
        if header.last() == Some(&b'\r') {
            header.pop();
        }

        // The buffer grows with the bytes that actually arrive, never with
        // the announced length
        let len = declared_len(&header);
        let mut payload = Vec::new();
        if len > 0 {
            self.state = ChannelState::ReadingPayload { remaining: len };
            match (&mut self.reader).take(len as u64).read_to_end(&mut payload) {
                Ok(read) if read == len => {}
                Ok(read) => {
                    log::debug!("Event stream ended after {} of {} payload bytes", read, len);
                    self.state = ChannelState::Closed;
                    return Ok(None);
                }
                Err(e) => return self.close_on_io(e),
            }
        }

        self.state = ChannelState::DispatchReady;
        Ok(Some(Frame { header, payload }))
    }

    /// Tell the supervisor the current frame has been consumed
    pub fn acknowledge(&mut self) -> Result<(), ChannelError> {
        match self.state {
            ChannelState::DispatchReady => {}
            ChannelState::Closed => return Err(ChannelError::Closed),
            other => {
                return Err(ChannelError::OutOfOrder {
                    operation: "acknowledge",
                    state: other.name(),
                });
            }
        }

        match self.write_flushed(&[RESULT_HEADER, ACK_TOKEN]) {
            Ok(()) => {
                self.state = ChannelState::AwaitingFrame;
                Ok(())
            }
            Err(e) => {
                log::debug!("Failed to acknowledge frame: {}", e);
                self.state = ChannelState::Closed;
                Err(ChannelError::Closed)
            }
        }
    }

    /// Stop taking frames, e.g. on a shutdown directive
    pub fn close(&mut self) {
        self.state = ChannelState::Closed;
    }

    /// Give back the underlying reader and writer
    #[cfg(test)]
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn write_flushed(&mut self, parts: &[&[u8]]) -> io::Result<()> {
        for part in parts {
            self.writer.write_all(part)?;
        }
        self.writer.flush()
    }

    fn close_on_io(&mut self, e: io::Error) -> Result<Option<Frame>, ChannelError> {
        self.state = ChannelState::Closed;
        match e.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
                log::debug!("Supervisor channel went away: {}", e);
                Ok(None)
            }
            _ => Err(ChannelError::Io(e)),
        }
    }
}

/// Payload length announced by the `len` token of a header line.
///
/// An absent or unparseable length counts as zero so framing stays in step
/// with the supervisor; the decoder rejects such frames later.
pub fn declared_len(header: &[u8]) -> usize {
    header
        .split(|b| *b == b' ')
        .find_map(|token| token.strip_prefix(b"len:"))
        .and_then(|value| std::str::from_utf8(value).ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::testing::{BrokenPipe, RejectsAck};
    use super::*;
    use std::io::Cursor;

    fn channel(input: &[u8]) -> SupervisorChannel<Cursor<Vec<u8>>, Vec<u8>> {
        SupervisorChannel::new(Cursor::new(input.to_vec()), Vec::new())
    }

    fn output(channel: SupervisorChannel<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        let (_, writer) = channel.into_parts();
        String::from_utf8(writer).unwrap()
    }

    #[test]
    fn test_reads_header_and_payload() {
        let mut ch = channel(b"ver:3.0 eventname:PROCESS_STATE_RUNNING len:5\nabcde");

        let frame = ch.next_frame().unwrap().unwrap();
        assert_eq!(frame.header, b"ver:3.0 eventname:PROCESS_STATE_RUNNING len:5".to_vec());
        assert_eq!(frame.payload, b"abcde".to_vec());
        assert_eq!(ch.state(), ChannelState::DispatchReady);

        ch.acknowledge().unwrap();
        assert_eq!(ch.state(), ChannelState::AwaitingFrame);
        assert_eq!(output(ch), "READY\nRESULT 2\nOK");
    }

    #[test]
    fn test_zero_length_frame_skips_payload() {
        let mut ch = channel(b"eventname:TICK_5 len:0\neventname:TICK_5 len:0\n");

        let first = ch.next_frame().unwrap().unwrap();
        assert!(first.payload.is_empty());
        ch.acknowledge().unwrap();

        let second = ch.next_frame().unwrap().unwrap();
        assert!(second.payload.is_empty());
        ch.acknowledge().unwrap();

        assert!(ch.next_frame().unwrap().is_none());
        assert!(ch.is_closed());
        assert_eq!(output(ch), "READY\nRESULT 2\nOKREADY\nRESULT 2\nOKREADY\n");
    }

    #[test]
    fn test_eof_before_frame_closes() {
        let mut ch = channel(b"");
        assert!(ch.next_frame().unwrap().is_none());
        assert_eq!(ch.state(), ChannelState::Closed);
    }

    #[test]
    fn test_truncated_header_closes_without_ack() {
        let mut ch = channel(b"ver:3.0 eventname:PROC");
        assert!(ch.next_frame().unwrap().is_none());
        assert!(ch.is_closed());
        assert!(matches!(ch.acknowledge(), Err(ChannelError::Closed)));
        assert_eq!(output(ch), "READY\n");
    }

    #[test]
    fn test_truncated_payload_closes_without_ack() {
        let mut ch = channel(b"eventname:PROCESS_STATE_RUNNING len:50\nprocessname:cat");
        assert!(ch.next_frame().unwrap().is_none());
        assert!(ch.is_closed());
        assert_eq!(output(ch), "READY\n");
    }

    #[test]
    fn test_acknowledge_requires_frame() {
        let mut ch = channel(b"");
        let err = ch.acknowledge().unwrap_err();
        assert!(matches!(err, ChannelError::OutOfOrder { state: "AwaitingFrame", .. }));
    }

    #[test]
    fn test_next_frame_requires_ack_first() {
        let mut ch = channel(b"eventname:TICK_5 len:0\neventname:TICK_5 len:0\n");
        ch.next_frame().unwrap().unwrap();
        let err = ch.next_frame().unwrap_err();
        assert!(matches!(err, ChannelError::OutOfOrder { state: "DispatchReady", .. }));
    }

    #[test]
    fn test_close_directive() {
        let mut ch = channel(b"eventname:TICK_5 len:0\n");
        ch.close();
        assert!(ch.next_frame().unwrap().is_none());
        assert_eq!(output(ch), "");
    }

    #[test]
    fn test_crlf_header_is_trimmed() {
        let mut ch = channel(b"eventname:TICK_5 len:0\r\n");
        let frame = ch.next_frame().unwrap().unwrap();
        assert_eq!(frame.header, b"eventname:TICK_5 len:0".to_vec());
    }

    #[test]
    fn test_declared_len() {
        assert_eq!(declared_len(b"ver:3.0 len:54"), 54);
        assert_eq!(declared_len(b"len:7 eventname:X"), 7);
        assert_eq!(declared_len(b"eventname:X"), 0);
        assert_eq!(declared_len(b"eventname:X len:abc"), 0);
        assert_eq!(declared_len(b"eventname:X len:-3"), 0);
    }

    #[test]
    fn test_broken_stdout_closes_channel() {
        let mut ch = SupervisorChannel::new(Cursor::new(b"eventname:TICK_5 len:0\n".to_vec()), BrokenPipe);
        assert!(ch.next_frame().unwrap().is_none());
        assert!(ch.is_closed());
    }

    #[test]
    fn test_failed_ack_write_closes_channel() {
        let mut ch = SupervisorChannel::new(
            Cursor::new(b"eventname:TICK_5 len:0\neventname:TICK_5 len:0\n".to_vec()),
            RejectsAck::default(),
        );

        assert!(ch.next_frame().unwrap().is_some());
        assert!(matches!(ch.acknowledge(), Err(ChannelError::Closed)));
        assert!(ch.is_closed());
        assert!(ch.next_frame().unwrap().is_none());

        let (_, writer) = ch.into_parts();
        assert_eq!(writer.written, b"READY\n".to_vec());
    }

    #[test]
    fn test_overflowing_len_closes_without_panic() {
        let mut ch = channel(b"ver:3.0 eventname:PROCESS_STATE_RUNNING len:18446744073709551615\nabc");
        assert!(ch.next_frame().unwrap().is_none());
        assert!(ch.is_closed());
        assert_eq!(output(ch), "READY\n");
    }

    #[test]
    fn test_huge_len_reads_only_what_arrives() {
        let mut ch = channel(b"eventname:PROCESS_STATE_RUNNING len:4000000000\nprocessname:cat");
        assert!(ch.next_frame().unwrap().is_none());
        assert_eq!(ch.state(), ChannelState::Closed);
        assert_eq!(output(ch), "READY\n");
    }
}
