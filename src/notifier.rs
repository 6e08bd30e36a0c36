//! Listener main loop
//!
//! Frames are handled strictly one at a time: decode, filter, build, send,
//! acknowledge. Whatever happens downstream, every frame that was read in
//! full gets exactly one acknowledgement, so the supervisor never waits on
//! us.

use std::io::{BufRead, Write};

use crate::channel::{Frame, SupervisorChannel};
use crate::error::ChannelError;
use crate::event;
use crate::record::RecordBuilder;
use crate::session::Session;
use crate::transport::Transport;

/// Counters for one listener run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames read in full and acknowledged
    pub frames: u64,
    /// Records handed to the transport
    pub sent: u64,
    /// Events skipped by the filter
    pub filtered: u64,
    /// Frames that failed to decode
    pub malformed: u64,
    /// Records the transport could not send
    pub transport_failures: u64,
}

/// What happened to a single frame before it was acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Filtered,
    Malformed,
    TransportFailed,
}

pub struct NotifierLoop<'s, R, W, T> {
    session: &'s Session,
    channel: SupervisorChannel<R, W>,
    transport: T,
    stats: LoopStats,
}

impl<'s, R, W, T> NotifierLoop<'s, R, W, T>
where
    R: BufRead,
    W: Write,
    T: Transport,
{
    pub fn new(session: &'s Session, channel: SupervisorChannel<R, W>, transport: T) -> Self {
        Self {
            session,
            channel,
            transport,
            stats: LoopStats::default(),
        }
    }

    /// Serve frames until the supervisor closes the channel
    pub fn run(&mut self) -> LoopStats {
        log::info!("Listening for supervisor events, forwarding to {}", self.transport.describe());

        loop {
            let frame = match self.channel.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Stopping listener: {}", e);
                    self.channel.close();
                    break;
                }
            };

            let outcome = self.dispatch(&frame);
            log::trace!("Frame handled: {:?}", outcome);

            match self.channel.acknowledge() {
                Ok(()) => self.stats.frames += 1,
                Err(ChannelError::Closed) => {
                    log::debug!("Supervisor went away before acknowledgement");
                    break;
                }
                Err(e) => {
                    log::warn!("Stopping listener: {}", e);
                    self.channel.close();
                    break;
                }
            }
        }

        let stats = self.stats;
        log::info!(
            "Supervisor channel closed after {} frames ({} sent, {} filtered, {} malformed, {} send failures)",
            stats.frames,
            stats.sent,
            stats.filtered,
            stats.malformed,
            stats.transport_failures
        );
        stats
    }

    /// Push one frame through the pipeline. Never fails: every error is
    /// logged and turned into an outcome.
    pub fn dispatch(&mut self, frame: &Frame) -> Outcome {
        let event = match event::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                self.stats.malformed += 1;
                return Outcome::Malformed;
            }
        };

        if !self.session.filter.accepts(&event) {
            log::debug!("Filtered out {}", event.name);
            self.stats.filtered += 1;
            return Outcome::Filtered;
        }

        let record = RecordBuilder::new(&self.session.context).build(&event);
        match self.transport.send(&record) {
            Ok(bytes) => {
                log::debug!("Sent {} ({} bytes)", record.eventname, bytes);
                self.stats.sent += 1;
                Outcome::Sent
            }
            Err(e) => {
                log::warn!("Dropped {} record: {}", record.eventname, e);
                self.stats.transport_failures += 1;
                Outcome::TransportFailed
            }
        }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (SupervisorChannel<R, W>, T) {
        (self.channel, self.transport)
    }
}
