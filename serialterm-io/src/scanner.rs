//! Serial device discovery.

use crate::port::SerialBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;

/// A serial device the operating system currently reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub description: Option<String>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<serialport::SerialPortInfo> for DeviceInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let description = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => usb.product.or(usb.manufacturer),
            serialport::SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
            serialport::SerialPortType::PciPort => Some("PCI".to_string()),
            serialport::SerialPortType::Unknown => None,
        };
        Self {
            name: info.port_name,
            description,
        }
    }
}

/// Snapshot of the devices present at one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList(Vec<DeviceInfo>);

impl DeviceList {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self(devices)
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.0
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Order-independent comparison by device identifier.
    pub fn same_devices(&self, other: &DeviceList) -> bool {
        let ours: BTreeSet<&str> = self.0.iter().map(|d| d.name.as_str()).collect();
        let theirs: BTreeSet<&str> = other.0.iter().map(|d| d.name.as_str()).collect();
        ours == theirs
    }
}

impl From<Vec<DeviceInfo>> for DeviceList {
    fn from(devices: Vec<DeviceInfo>) -> Self {
        Self(devices)
    }
}

/// Enumerates devices through a backend. Stateless: callers keep the
/// previous snapshot and compare with [`DeviceList::same_devices`].
#[derive(Clone)]
pub struct DeviceScanner {
    backend: Arc<dyn SerialBackend>,
}

impl std::fmt::Debug for DeviceScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceScanner").finish()
    }
}

impl DeviceScanner {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        Self { backend }
    }

    pub fn scan(&self) -> io::Result<DeviceList> {
        self.backend.available_ports().map(DeviceList::from)
    }
}
