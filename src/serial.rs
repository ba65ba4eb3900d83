//! Serial port transport.
//!
//! The device enumerates as a USB CDC serial port (STM32 virtual COM,
//! VID 0x0483 / PID 0x5740). Reads use a zero timeout so the session's
//! poll loop never blocks inside the port.

use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::debug;

use crate::transport::Transport;

/// USB vendor id of the device's CDC interface.
pub const USB_VID: u16 = 0x0483;
/// USB product id of the device's CDC interface.
pub const USB_PID: u16 = 0x5740;

const BAUD_RATE: u32 = 3_000_000;
const READ_CHUNK: usize = 4096;

/// Serial transport over a named port.
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
    read_buf: [u8; READ_CHUNK],
}

impl SerialTransport {
    /// Create a transport for `port_name` (e.g. `/dev/ttyACM0`, `COM3`).
    /// The port is opened by [`Transport::open`].
    pub fn new(port_name: impl Into<String>) -> Self {
        Self { port_name: port_name.into(), port: None, read_buf: [0u8; READ_CHUNK] }
    }

    /// The configured port name.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Names of all serial ports present on this machine.
    pub fn list_ports() -> io::Result<Vec<String>> {
        let ports = serialport::available_ports().map_err(io::Error::other)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    /// Names of serial ports whose USB ids match the device.
    pub fn list_device_ports() -> io::Result<Vec<String>> {
        let ports = serialport::available_ports().map_err(io::Error::other)?;
        Ok(ports
            .into_iter()
            .filter(|p| match &p.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    usb.vid == USB_VID && usb.pid == USB_PID
                }
                _ => false,
            })
            .map(|p| p.port_name)
            .collect())
    }

    /// Transport for the first attached device, if any.
    pub fn first_device() -> io::Result<Option<Self>> {
        Ok(Self::list_device_ports()?.into_iter().next().map(Self::new))
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> io::Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.port_name, BAUD_RATE)
            // Zero timeout: read returns immediately with whatever arrived.
            .timeout(Duration::ZERO)
            .open()
            .map_err(io::Error::other)?;
        debug!(port = %self.port_name, "serial port opened");
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.port_name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port not open"))?;
        port.write_all(data)?;
        Ok(())
    }

    fn read(&mut self) -> io::Result<Vec<u8>> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port not open"))?;
        match port.read(&mut self.read_buf) {
            Ok(n) => Ok(self.read_buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port not open"))?;
        port.clear(serialport::ClearBuffer::Input).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopened_port_reports_not_connected() {
        let mut t = SerialTransport::new("/dev/null-port");
        assert!(!t.is_open());
        assert_eq!(t.write(&[0]).unwrap_err().kind(), io::ErrorKind::NotConnected);
        assert_eq!(t.read().unwrap_err().kind(), io::ErrorKind::NotConnected);
    }
}
