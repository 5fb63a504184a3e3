//! Thread-safe commands into a running session.
//!
//! Every call takes the engine lock before touching the port handle or
//! the config, so it never interleaves with the worker's open or drain.
//! Faults are returned to the caller and mirrored on the event stream.

use crate::decoder;
use crate::engine::Shared;
use crate::events::{SessionEvent, SessionState};
use serialterm_io::{BaudRate, DeviceList, LineSettings, PortConfig, PortError};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SessionControl {
    shared: Arc<Shared>,
}

impl SessionControl {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Close the port and stop reading. Idempotent.
    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        if !inner.running {
            return;
        }
        if let Err(e) = inner.handle.close() {
            warn!(error = %e, "close on pause failed");
            self.shared.events.error(&e);
        }
        if !inner.paused {
            inner.paused = true;
            info!("session paused");
            self.shared.events.emit(SessionEvent::StateChanged(SessionState::Paused));
        }
        drop(inner);
        self.shared.notify();
    }

    /// Open the port with the current config and start reading.
    /// On failure the session stays paused.
    pub fn resume(&self) -> Result<(), PortError> {
        let mut inner = self.shared.lock();
        if !inner.running {
            warn!("resume on a stopped session ignored");
            return Ok(());
        }

        let config = inner.config.clone();
        if let Err(e) = inner.handle.open(&config) {
            warn!(error = %e, "resume failed");
            self.shared.events.error(&e);
            inner.last_open_error = Some(e.to_string());
            return Err(e);
        }
        inner.last_open_error = None;

        if inner.paused {
            inner.paused = false;
            info!(port = %config.port, "session resumed");
            self.shared.events.emit(SessionEvent::StateChanged(SessionState::Open));
        }
        drop(inner);
        self.shared.notify();
        Ok(())
    }

    /// End the session for good. The worker exits within one wait.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        if !inner.running {
            return;
        }
        inner.running = false;
        if let Err(e) = inner.handle.close() {
            warn!(error = %e, "close on stop failed");
            self.shared.events.error(&e);
        }
        info!("session stopped");
        self.shared.events.emit(SessionEvent::StateChanged(SessionState::Stopped));
        drop(inner);
        self.shared.notify();
    }

    /// Switch to another device, reopening immediately if the session is
    /// open. Selecting the current device is a no-op.
    pub fn set_port(&self, port: &str) -> Result<(), PortError> {
        let mut inner = self.shared.lock();
        if inner.config.port == port {
            return Ok(());
        }
        info!(port, "set new port");
        inner.config.port = port.to_string();

        let mut result = Ok(());
        if inner.running && !inner.paused {
            if let Err(e) = inner.handle.close() {
                warn!(error = %e, "close before port switch failed");
                self.shared.events.error(&e);
            }
            let config = inner.config.clone();
            result = inner.handle.open(&config);
        }

        let settings = inner.config.line_settings();
        self.shared.events.emit(SessionEvent::PortConfigChanged(settings));
        match &result {
            Ok(()) => inner.last_open_error = None,
            Err(e) => {
                self.shared.events.error(e);
                inner.last_open_error = Some(e.to_string());
            }
        }
        drop(inner);
        self.shared.notify();
        result
    }

    /// Change the baud rate. Every supported rate is reported as a config
    /// change, the current one included. An unsupported rate leaves
    /// everything as it was and emits no config change.
    pub fn set_baud_rate(&self, rate: u32) -> Result<(), PortError> {
        let baud = match BaudRate::new(rate) {
            Ok(baud) => baud,
            Err(e) => {
                warn!(rate, "rejected baud rate");
                self.shared.events.error(&e);
                return Err(e);
            }
        };

        let mut inner = self.shared.lock();
        let unchanged = inner.config.baud_rate == baud;
        inner.config.baud_rate = baud;

        let mut result = Ok(());
        if !unchanged && inner.handle.is_open() {
            if let Err(e) = inner.handle.reconfigure_baud(rate) {
                warn!(error = %e, "in-place baud change failed, reopening");
                let config = inner.config.clone();
                if let Err(close) = inner.handle.close() {
                    self.shared.events.error(&close);
                }
                result = inner.handle.open(&config);
            }
        }

        let settings = inner.config.line_settings();
        info!(%settings, "port configuration changed");
        self.shared.events.emit(SessionEvent::PortConfigChanged(settings));
        if let Err(e) = &result {
            self.shared.events.error(e);
            inner.last_open_error = Some(e.to_string());
        }
        drop(inner);
        self.shared.notify();
        result
    }

    /// Select the terminator appended to writes by its table index.
    pub fn set_eol(&self, index: usize) -> Result<(), PortError> {
        let len = self.shared.eol_table.len();
        if index >= len {
            warn!(index, "can't set up this type of end of line");
            return Err(PortError::InvalidEol { index, len });
        }
        self.shared.lock().config.eol = index;
        Ok(())
    }

    /// Append the end of line, encode per the decode mode and send.
    pub fn write(&self, text: &str) -> Result<(), PortError> {
        let mut inner = self.shared.lock();
        let port = inner.config.port.clone();

        let result = decoder::encode(text, self.shared.mode)
            .map_err(|e| PortError::Write {
                port,
                reason: e.to_string(),
            })
            .and_then(|mut bytes| {
                let eol = &self.shared.eol_table[inner.config.eol];
                bytes.extend_from_slice(eol.as_bytes());
                inner.handle.write(&bytes)
            });

        if let Err(e) = &result {
            warn!(error = %e, "write failed");
            self.shared.events.error(e);
        }
        result
    }

    pub fn state(&self) -> SessionState {
        let inner = self.shared.lock();
        if !inner.running {
            SessionState::Stopped
        } else if inner.paused {
            SessionState::Paused
        } else {
            SessionState::Open
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn is_port_open(&self) -> bool {
        self.shared.lock().handle.is_open()
    }

    pub fn config(&self) -> PortConfig {
        self.shared.lock().config.clone()
    }

    pub fn line_settings(&self) -> LineSettings {
        self.shared.lock().config.line_settings()
    }

    /// The terminator currently appended to writes.
    pub fn eol(&self) -> String {
        let index = self.shared.lock().config.eol;
        self.shared.eol_table[index].clone()
    }

    /// Most recent device snapshot.
    pub fn devices(&self) -> DeviceList {
        self.shared.lock().devices.clone()
    }
}
