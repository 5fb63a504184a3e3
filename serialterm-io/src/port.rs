//! The port handle and the driver seam beneath it.

use crate::config::{BaudRate, PortConfig};
use crate::error::PortError;
use crate::scanner::DeviceInfo;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interval between input-count checks in [`PortHandle::read_available`].
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One open serial device as seen by the port handle.
pub trait SerialDevice: Send {
    /// Bytes waiting in the driver's input buffer. Must not block.
    fn bytes_to_read(&self) -> io::Result<u32>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    fn set_baud_rate(&mut self, rate: u32) -> io::Result<()>;
    /// Discard anything received but not yet read.
    fn clear_input(&self) -> io::Result<()>;
}

/// Opens devices and enumerates the ones present.
pub trait SerialBackend: Send + Sync {
    fn open(&self, config: &PortConfig) -> io::Result<Box<dyn SerialDevice>>;
    fn available_ports(&self) -> io::Result<Vec<DeviceInfo>>;
}

/// Backend for the operating system's serial devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBackend;

impl SerialBackend for SystemBackend {
    fn open(&self, config: &PortConfig) -> io::Result<Box<dyn SerialDevice>> {
        let parity = config.parity.to_serialport().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{:?} parity is not supported on this platform", config.parity),
            )
        })?;
        let stop_bits = config.stop_bits.to_serialport().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} stop bits are not supported on this platform", config.stop_bits),
            )
        })?;

        let port = serialport::new(&config.port, config.baud_rate.get())
            .data_bits(config.data_bits.to_serialport())
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(config.timeout)
            .open()?;

        Ok(Box::new(SystemDevice(port)))
    }

    fn available_ports(&self) -> io::Result<Vec<DeviceInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(DeviceInfo::from).collect())
    }
}

struct SystemDevice(Box<dyn serialport::SerialPort>);

impl SerialDevice for SystemDevice {
    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.0.bytes_to_read()?)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }

    fn set_baud_rate(&mut self, rate: u32) -> io::Result<()> {
        Ok(self.0.set_baud_rate(rate)?)
    }

    fn clear_input(&self) -> io::Result<()> {
        Ok(self.0.clear(serialport::ClearBuffer::Input)?)
    }
}

/// Owns the open/closed state of one serial device.
pub struct PortHandle {
    backend: Arc<dyn SerialBackend>,
    device: Option<Box<dyn SerialDevice>>,
    /// Settings the current device was opened with.
    active: Option<PortConfig>,
}

impl std::fmt::Debug for PortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortHandle")
            .field("device", &self.device.as_ref().map(|_| "Box<dyn SerialDevice>"))
            .field("active", &self.active)
            .finish()
    }
}

impl PortHandle {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        Self {
            backend,
            device: None,
            active: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn active_config(&self) -> Option<&PortConfig> {
        self.active.as_ref()
    }

    /// Open the device described by `config`.
    ///
    /// Already open with identical device settings is a no-op; any other
    /// open device is closed first.
    pub fn open(&mut self, config: &PortConfig) -> Result<(), PortError> {
        if let (Some(_), Some(active)) = (&self.device, &mut self.active) {
            if active.same_device_settings(config) {
                active.eol = config.eol;
                return Ok(());
            }
        }

        if let Err(e) = self.close() {
            warn!(error = %e, "close before reopen failed");
        }

        let device = self
            .backend
            .open(config)
            .map_err(|source| PortError::PortUnavailable {
                port: config.port.clone(),
                source,
            })?;

        info!(port = %config.port, settings = %config.line_settings(), "port opened");
        self.device = Some(device);
        self.active = Some(config.clone());
        Ok(())
    }

    /// Release the device. Closing a closed handle does nothing.
    ///
    /// The device is released even when the final flush fails.
    pub fn close(&mut self) -> Result<(), PortError> {
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };
        let port = self.active.take().map(|c| c.port).unwrap_or_default();

        let flushed = device.flush();
        drop(device);
        info!(port = %port, "port closed");

        flushed.map_err(|source| PortError::PortClose { port, source })
    }

    /// Validate `rate` and apply it to the open device, discarding any
    /// input received at the old rate. On a closed handle only the
    /// validation happens.
    pub fn reconfigure_baud(&mut self, rate: u32) -> Result<BaudRate, PortError> {
        let baud = BaudRate::new(rate)?;

        if let (Some(device), Some(active)) = (self.device.as_mut(), self.active.as_mut()) {
            let port = active.port.clone();
            let unavailable = |source| PortError::PortUnavailable {
                port: port.clone(),
                source,
            };
            device.clear_input().map_err(unavailable)?;
            device.set_baud_rate(baud.get()).map_err(unavailable)?;
            active.baud_rate = baud;
            info!(port = %active.port, baud = rate, "baud rate changed");
        }

        Ok(baud)
    }

    /// Read whatever the driver has buffered right now, without waiting.
    /// A closed handle has nothing to read.
    pub fn try_drain(&mut self) -> Result<Vec<u8>, PortError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(Vec::new());
        };
        let port = self.active.as_ref().map(|c| c.port.as_str()).unwrap_or_default();
        let read_error = |source| PortError::Read {
            port: port.to_string(),
            source,
        };

        let pending = device.bytes_to_read().map_err(read_error)? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; pending];
        let n = match device.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(read_error(e)),
        };
        buf.truncate(n);
        debug!(port = %port, bytes = n, "drained input");
        Ok(buf)
    }

    /// Wait up to `timeout` for input, then drain it once.
    /// Returns an empty buffer on timeout.
    pub fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, PortError> {
        let deadline = Instant::now() + timeout;
        loop {
            let data = self.try_drain()?;
            if !data.is_empty() || !self.is_open() {
                return Ok(data);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(data);
            }
            std::thread::sleep(READ_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Write all of `bytes` and flush before returning.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), PortError> {
        let (Some(device), Some(active)) = (self.device.as_mut(), self.active.as_ref()) else {
            return Err(PortError::NotOpen);
        };
        let write_error = |e: io::Error| PortError::Write {
            port: active.port.clone(),
            reason: e.to_string(),
        };

        device.write_all(bytes).map_err(write_error)?;
        device.flush().map_err(write_error)?;
        debug!(port = %active.port, bytes = bytes.len(), "wrote output");
        Ok(())
    }
}
