//! Host-side client for ScienceMode 4 stimulation and biosignal devices.
//!
//! Frames requests over a byte-stuffed serial protocol, matches device
//! acknowledgements back to them by command and packet number, and exposes
//! one typed operation surface per protocol layer.
//!
//! ```no_run
//! use stimlink::{Device, SerialTransport};
//!
//! # async fn run() -> Result<(), stimlink::LinkError> {
//! let transport = SerialTransport::new("/dev/ttyACM0");
//! let mut device = Device::p24(transport);
//! device.open()?;
//! device.initialize().await?;
//! println!("connected to {:?}", device.info().device_id);
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod buffer;
pub mod commands;
pub mod crc;
pub mod device;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod serial;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use buffer::{Envelope, PacketBuffer};
pub use device::{Device, DeviceCapability};
pub use error::ProtocolError;
pub use protocol::{Ack, Request, ResultAndError};
pub use serial::SerialTransport;
pub use session::{LinkError, Session};
pub use transport::{NullTransport, Transport};
