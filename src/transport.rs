//! Byte transport abstraction under the packet buffer.
//!
//! A transport moves raw bytes and nothing else; framing and packet
//! bookkeeping live above it. Reads are non-blocking so the session's
//! poll loop stays in control of timing.

use std::io;

/// A non-blocking byte pipe to the device.
pub trait Transport {
    /// Open the underlying connection. Idempotent.
    fn open(&mut self) -> io::Result<()>;

    /// Close the underlying connection. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read whatever is available right now; empty when nothing is pending.
    fn read(&mut self) -> io::Result<Vec<u8>>;

    /// Drop any bytes the device already sent but the host has not read.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Transport that goes nowhere. Writes are discarded, reads return nothing.
#[derive(Debug, Default)]
pub struct NullTransport {
    open: bool,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NullTransport {
    fn open(&mut self) -> io::Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self) -> io::Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_transport_open_close() {
        let mut t = NullTransport::new();
        assert!(!t.is_open());
        t.open().unwrap();
        assert!(t.is_open());
        t.write(&[1, 2, 3]).unwrap();
        assert!(t.read().unwrap().is_empty());
        t.close();
        assert!(!t.is_open());
    }
}
