//! Scripted transport for exercising the session and device layers.

use std::collections::VecDeque;
use std::io;

use crate::transport::Transport;

/// In-memory transport. Reads drain a byte queue; writes are recorded and
/// optionally answered by a responder closure, which models a device that
/// replies to each frame it receives.
pub struct MockTransport {
    open: bool,
    reads: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    responder: Option<Box<dyn FnMut(&[u8]) -> Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self { open: true, reads: VecDeque::new(), writes: Vec::new(), responder: None }
    }

    /// Queue bytes to be returned by the next `read`.
    pub fn queue_read(&mut self, data: &[u8]) {
        self.reads.extend(data);
    }

    /// Answer every write with the closure's output, queued for reading.
    pub fn respond_with(&mut self, f: impl FnMut(&[u8]) -> Vec<u8> + 'static) {
        self.responder = Some(Box::new(f));
    }

    /// The most recent write.
    pub fn written(&self) -> Vec<u8> {
        self.writes.last().cloned().unwrap_or_default()
    }

    /// All writes, oldest first.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }
}

impl Transport for MockTransport {
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

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writes.push(data.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(data);
            self.reads.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.reads.drain(..).collect())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.reads.clear();
        Ok(())
    }
}
