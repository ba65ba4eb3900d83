//! Incoming-byte buffer with open-acknowledge bookkeeping.
//!
//! Owns the transport, accumulates raw bytes, splits valid frames out of
//! the noise and keeps the ledger of acknowledgements the host still
//! expects. One entry per in-flight request, keyed by the acknowledgement
//! command and packet number. Push packets bypass the ledger entirely.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::commands::is_push;
use crate::frame;
use crate::protocol::Ack;
use crate::session::LinkError;
use crate::transport::Transport;

/// A decoded device packet with its wire identity and raw payload.
#[derive(Clone)]
pub struct Envelope {
    pub command: u16,
    pub number: u8,
    /// Unstuffed payload bytes (before decode).
    pub raw: Vec<u8>,
    pub ack: Ack,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "GetDeviceIdAck(..) [cmd 53 #12 11B | 00 53 4E ...]"
        write!(f, "{:?}", self.ack)?;
        write!(f, " [cmd {} #{} {}B", self.command, self.number, self.raw.len())?;
        if !self.raw.is_empty() {
            write!(f, " | ")?;
            for b in self.raw.iter() {
                write!(f, "{b:02X}")?;
            }
        }
        write!(f, "]")
    }
}

/// Byte buffer plus open-acknowledge ledger on top of a transport.
pub struct PacketBuffer<T: Transport> {
    transport: T,
    buffer: Vec<u8>,
    /// (ack command, packet number) -> outstanding count.
    open_acknowledges: HashMap<(u16, u8), u32>,
}

impl<T: Transport> PacketBuffer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, buffer: Vec::new(), open_acknowledges: HashMap::new() }
    }

    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Record that an acknowledgement with `command` and `number` is expected.
    pub fn register_acknowledge(&mut self, command: u16, number: u8) {
        *self.open_acknowledges.entry((command, number)).or_insert(0) += 1;
    }

    /// Forget one expected acknowledgement, e.g. after a timeout.
    ///
    /// Removing an entry that was never registered is a bookkeeping bug,
    /// never a device condition, and fails hard.
    pub fn unregister_acknowledge(&mut self, command: u16, number: u8) -> Result<(), LinkError> {
        match self.open_acknowledges.get_mut(&(command, number)) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.open_acknowledges.remove(&(command, number));
                }
                Ok(())
            }
            _ => Err(LinkError::AckUnderflow { command, number }),
        }
    }

    /// Number of acknowledgements still outstanding.
    pub fn open_acknowledge_count(&self) -> u32 {
        self.open_acknowledges.values().sum()
    }

    /// Pull whatever bytes the transport has ready into the buffer.
    pub fn feed(&mut self) -> Result<(), LinkError> {
        let data = self.transport.read()?;
        if !data.is_empty() {
            self.buffer.extend_from_slice(&data);
        }
        Ok(())
    }

    /// Extract and decode the next valid frame from the buffer.
    ///
    /// Reads from the transport first when `pull` is set. Returns `None`
    /// when no complete valid frame is buffered. Framing noise before a
    /// valid frame is dropped silently; a solicited acknowledgement
    /// settles its ledger entry, and a non-push packet nobody waits for
    /// is logged and still returned.
    pub fn next_packet(&mut self, pull: bool) -> Result<Option<Envelope>, LinkError> {
        if pull {
            self.feed()?;
        }

        let Some((start, stop)) = frame::find_frame(&self.buffer) else {
            // Nothing decodable; drop bytes that can no longer start a frame.
            self.discard_leading_noise();
            return Ok(None);
        };

        let wire: Vec<u8> = self.buffer[start..=stop].to_vec();
        self.buffer.drain(..=stop);

        let (command, number, raw) = frame::extract(&wire)?;
        if is_push(command) {
            debug!(command, number, len = raw.len(), "push packet");
        } else {
            match self.open_acknowledges.get_mut(&(command, number)) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    if *count == 0 {
                        self.open_acknowledges.remove(&(command, number));
                    }
                }
                _ => warn!(command, number, "unexpected acknowledge"),
            }
        }

        let ack = Ack::decode(command, &raw).map_err(|e| e.with_raw(&raw))?;
        Ok(Some(Envelope { command, number, raw, ack }))
    }

    /// Drop buffered bytes and anything pending inside the transport.
    /// The acknowledge ledger is left untouched.
    pub fn clear(&mut self) -> Result<(), LinkError> {
        self.buffer.clear();
        self.transport.clear_input()?;
        Ok(())
    }

    fn discard_leading_noise(&mut self) {
        // A frame can only start at a START,ESCAPE pair; keep from the last
        // possible candidate onward so a split frame can still complete.
        if let Some(pos) = self
            .buffer
            .windows(2)
            .rposition(|w| w == [frame::START, frame::ESCAPE])
        {
            if pos > 0 {
                self.buffer.drain(..pos);
            }
        } else {
            // No candidate start; keep a trailing START in case its ESCAPE
            // is still in flight.
            let keep = usize::from(self.buffer.last() == Some(&frame::START));
            let len = self.buffer.len();
            self.buffer.drain(..len - keep);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
