//! Request/acknowledge session on top of the packet buffer.
//!
//! A session owns the packet buffer, hands out wrapping 6-bit packet
//! numbers and implements the send-and-wait cycle: send one request,
//! poll for the acknowledgement that carries the request's command plus
//! one and the same packet number, bail out early on a device error
//! report, give up after the timeout.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::buffer::{Envelope, PacketBuffer};
use crate::commands::{ack_of, DL_SEND_FILE_ACK, GENERAL_ERROR, UNKNOWN_COMMAND};
use crate::error::ProtocolError;
use crate::frame;
use crate::protocol::{Ack, Request, ResultAndError};
use crate::transport::Transport;

/// Poll interval while waiting for an acknowledgement.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default acknowledgement timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No matching acknowledgement arrived in time.
    #[error("no acknowledgement for command {command} number {number} within {timeout:?}")]
    Timeout { command: u16, number: u8, timeout: Duration },

    /// The device answered with a general error report.
    #[error("device reported error {code:?} while waiting for command {command}")]
    DeviceError { command: u16, code: ResultAndError },

    /// The device did not recognize the sent command.
    #[error("device did not recognize command {command}")]
    UnknownCommandReported { command: u16 },

    /// An acknowledgement carried a failure result code.
    #[error("{operation} failed with {code:?}")]
    CommandFailed { operation: &'static str, code: ResultAndError },

    /// Open-acknowledge ledger went below zero. Host-side bug.
    #[error("acknowledge ledger underflow for command {command} number {number}")]
    AckUnderflow { command: u16, number: u8 },

    /// The decoded acknowledgement had an unexpected shape for the
    /// operation that waited on it.
    #[error("unexpected acknowledge for command {command}")]
    UnexpectedAck { command: u16 },
}

/// One logical connection to a device.
pub struct Session<T: Transport> {
    buffer: PacketBuffer<T>,
    number: u8,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self { buffer: PacketBuffer::new(transport), number: 0 }
    }

    /// Open the transport.
    pub fn open(&mut self) -> Result<(), LinkError> {
        self.buffer.transport().open()?;
        Ok(())
    }

    /// Close the transport.
    pub fn close(&mut self) {
        self.buffer.transport().close();
    }

    pub fn buffer(&mut self) -> &mut PacketBuffer<T> {
        &mut self.buffer
    }

    /// Next packet number. Session-wide, 6 bits, wraps 63 to 0.
    fn next_number(&mut self) -> u8 {
        self.number = (self.number + 1) & 0x3F;
        self.number
    }

    /// Send a request without waiting. Returns the packet number used.
    ///
    /// The expected acknowledgement is registered in the ledger, except
    /// for the file-block confirmation the device never acknowledges.
    pub fn send(&mut self, request: &Request) -> Result<u8, LinkError> {
        let number = self.next_number();
        let command = request.command();
        let payload = request.payload()?;
        if command != DL_SEND_FILE_ACK {
            self.buffer.register_acknowledge(ack_of(command), number);
        }
        let wire = frame::encode(command, number, &payload);
        trace!(command, number, len = wire.len(), "send");
        self.buffer.transport().write(&wire)?;
        Ok(number)
    }

    /// Send a request and wait for its acknowledgement.
    ///
    /// Anything already buffered is discarded first; stale
    /// acknowledgements predate the request and can only be matched by
    /// accident. Acknowledgements for other requests are dropped, push
    /// packets are dropped, and a general-error or unknown-command report
    /// aborts the wait immediately.
    pub async fn send_and_wait(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Ack, LinkError> {
        self.buffer.clear()?;
        let number = self.send(request)?;
        let command = request.command();
        let expected = ack_of(command);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            while let Some(env) = self.buffer.next_packet(true)? {
                if env.command == expected && env.number == number {
                    debug!(command, number, "acknowledged");
                    return Ok(env.ack);
                }
                match env.command {
                    GENERAL_ERROR => {
                        let code = env.ack.result().unwrap_or(ResultAndError::NoError);
                        return Err(LinkError::DeviceError { command, code });
                    }
                    UNKNOWN_COMMAND => {
                        return Err(LinkError::UnknownCommandReported { command });
                    }
                    other => {
                        warn!(command = other, number = env.number, "discarding stray packet");
                    }
                }
            }

            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        self.buffer.unregister_acknowledge(expected, number)?;
        Err(LinkError::Timeout { command, number, timeout })
    }

    /// Pull the next decoded packet, if one is available right now.
    ///
    /// This is how push packets (live data, file blocks, meta info)
    /// surface between requests.
    pub fn receive(&mut self) -> Result<Option<Envelope>, LinkError> {
        self.buffer.next_packet(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
