//! Serial link to the sensor board: port discovery and opening at the
//! firmware's line settings (9600 8N1, no flow control).

use std::path::Path;

use tokio_serial::{SerialPortBuilderExt, SerialPortInfo, SerialPortType, SerialStream};
use tracing::{debug, warn};

/// The sensor firmware writes at 9600 baud.
pub const BAUD_RATE: u32 = 9600;

// Device-name fragments tried when no port describes itself as an Arduino.
const DEVICE_HINTS: &[&str] = &["ACM", "USB", "usbmodem", "COM"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub name: String,
    pub description: String,
}

impl From<&SerialPortInfo> for PortEntry {
    fn from(info: &SerialPortInfo) -> Self {
        Self {
            name: info.port_name.clone(),
            description: describe(&info.port_type),
        }
    }
}

fn describe(kind: &SerialPortType) -> String {
    match kind {
        SerialPortType::UsbPort(usb) => {
            let parts: Vec<&str> = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if parts.is_empty() {
                format!("USB {:04x}:{:04x}", usb.vid, usb.pid)
            } else {
                parts.join(" ")
            }
        }
        SerialPortType::PciPort => "PCI".into(),
        SerialPortType::BluetoothPort => "Bluetooth".into(),
        SerialPortType::Unknown => "unknown".into(),
    }
}

pub fn list_ports() -> Vec<PortEntry> {
    match tokio_serial::available_ports() {
        Ok(ports) => ports.iter().map(PortEntry::from).collect(),
        Err(e) => {
            warn!(error = %e, "cannot enumerate serial ports");
            Vec::new()
        }
    }
}

/// Prefers a port whose description names an Arduino, then any port whose
/// device name looks like a USB/CDC serial adapter.
pub fn pick_port(ports: &[PortEntry]) -> Option<&PortEntry> {
    ports
        .iter()
        .find(|p| p.description.contains("Arduino"))
        .or_else(|| {
            ports
                .iter()
                .find(|p| DEVICE_HINTS.iter().any(|hint| p.name.contains(hint)))
        })
}

pub fn format_ports(ports: &[PortEntry]) -> String {
    if ports.is_empty() {
        return "No serial ports found. Make sure you have permission to access serial ports."
            .into();
    }
    let mut out = String::from("Available ports:");
    for p in ports {
        out.push_str(&format!("\n- {} ({})", p.name, p.description));
    }
    out
}

pub fn open(path: &Path) -> Result<SerialStream, tokio_serial::Error> {
    debug!(path = %path.display(), baud = BAUD_RATE, "opening serial port");
    tokio_serial::new(path.to_string_lossy(), BAUD_RATE)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
}
