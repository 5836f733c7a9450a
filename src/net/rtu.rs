// Crate
use crate::error::{ConfigError, TransportError};
use crate::memory::RegisterTable;
use crate::net::{Service, Transport};

// External
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_modbus::server::rtu::Server as RtuServer;
use tokio_serial::{DataBits, Parity, SerialPortBuilder, SerialStream, StopBits};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The device path to use for communication.
    pub path: String,

    /// The baud rate to use for the serial connection.
    pub baud_rate: u32,

    /// The data bits [values: 5, 6, 7, 8]
    pub data_bits: u8,

    /// The stop bits [values: 1, 2]
    pub stop_bits: u8,

    /// The parity [values: N, E, O or none, even, odd]
    pub parity: String,

    /// Read/write timeout in seconds
    pub timeout_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: String::from("/dev/ttyUSB0"),
            baud_rate: 2400,
            data_bits: 8,
            stop_bits: 1,
            parity: String::from("N"),
            timeout_s: 10,
        }
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}{}{} timeout {}s",
            self.path,
            self.baud_rate,
            self.data_bits,
            self.parity.to_uppercase().chars().next().unwrap_or('N'),
            self.stop_bits,
            self.timeout_s
        )
    }
}

impl Config {
    pub fn data_bits(&self) -> Result<DataBits, ConfigError> {
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            v => Err(ConfigError::InvalidSerial(format!("data bits {}", v))),
        }
    }

    pub fn stop_bits(&self) -> Result<StopBits, ConfigError> {
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            v => Err(ConfigError::InvalidSerial(format!("stop bits {}", v))),
        }
    }

    pub fn parity(&self) -> Result<Parity, ConfigError> {
        match self.parity.to_lowercase().as_str() {
            "n" | "none" => Ok(Parity::None),
            "e" | "even" => Ok(Parity::Even),
            "o" | "odd" => Ok(Parity::Odd),
            _ => Err(ConfigError::InvalidSerial(format!(
                "parity '{}'",
                self.parity
            ))),
        }
    }

    /// Validate all settings and produce the port builder.
    pub fn builder(&self) -> Result<SerialPortBuilder, ConfigError> {
        Ok(tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(self.data_bits()?)
            .stop_bits(self.stop_bits()?)
            .parity(self.parity()?)
            .timeout(Duration::from_secs(self.timeout_s)))
    }
}

pub(crate) fn open(config: &Config) -> Result<SerialStream, TransportError> {
    let builder = config.builder()?;
    SerialStream::open(&builder).map_err(|source| TransportError::DeviceOpen {
        path: config.path.clone(),
        source,
    })
}

/// Serve the table on an opened serial stream until the task is aborted or
/// the stream fails.
pub(crate) fn spawn(
    stream: SerialStream,
    table: Arc<RegisterTable>,
) -> JoinHandle<Result<(), anyhow::Error>> {
    let rtu_server = RtuServer::new(stream);
    let service = Service::new(Transport::Rtu, table);
    tokio::task::spawn(async move {
        rtu_server
            .serve_forever(service)
            .await
            .map_err(|e| {
                tracing::error!("RTU: Serving stopped. [{}]", e);
                anyhow!("{}", e)
            })
    })
}
