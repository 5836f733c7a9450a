use crate::error::ConfigError;
use crate::memory::{Bank, RegisterTable};
use crate::net::{rtu, tcp};
use crate::sim::Simulator;

use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Settings written when no configuration file exists yet.
pub const DEFAULT_SETTINGS: &str = r#"title = "Default Settings for ModbusTCP and ModbusRTU Server Simulator"

# Milliseconds between two simulation ticks
interval_ms = 1000

[enable]
tcp = true
rtu = false

[tcp]
ip = "0.0.0.0"
port = 502

[rtu]
path = "/dev/ttyUSB0"
baud_rate = 2400
data_bits = 8        # 5, 6, 7 or 8
stop_bits = 1        # 1 or 2
parity = "N"         # "N" - None, "E" - Even, "O" - Odd
timeout_s = 10

# Static startup values as [address, value] pairs
[registers]
discrete_inputs = [[0, 1], [1, 1]]
coils = [[0, 1], [1, 1]]
input_registers = [[0, 30000], [1, 40000]]
holding_registers = [[0, 100], [1, 200]]

# Cyclic sequences, one value per tick
[[simulated]]
bank = "holding_register"
address = 10
values = [0, 1, 1, 0]

[[simulated]]
bank = "input_register"
address = 2
values = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]
"#;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Enable {
    pub tcp: bool,
    pub rtu: bool,
}

impl Default for Enable {
    fn default() -> Self {
        Self {
            tcp: true,
            rtu: false,
        }
    }
}

/// Static values per bank as `[address, value]` pairs.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Registers {
    pub discrete_inputs: Vec<[u32; 2]>,
    pub coils: Vec<[u32; 2]>,
    pub input_registers: Vec<[u32; 2]>,
    pub holding_registers: Vec<[u32; 2]>,
}

impl Registers {
    fn entries(&self) -> impl Iterator<Item = (Bank, &[u32; 2])> {
        self.discrete_inputs
            .iter()
            .map(|e| (Bank::DiscreteInput, e))
            .chain(self.coils.iter().map(|e| (Bank::Coil, e)))
            .chain(self.input_registers.iter().map(|e| (Bank::InputRegister, e)))
            .chain(self.holding_registers.iter().map(|e| (Bank::HoldingRegister, e)))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Simulated {
    pub bank: Bank,
    pub address: u32,
    pub values: Vec<u16>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub interval_ms: u64,
    pub enable: Enable,
    pub tcp: tcp::Config,
    pub rtu: rtu::Config,
    pub registers: Registers,
    pub simulated: Vec<Simulated>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: String::new(),
            interval_ms: 1000,
            enable: Enable::default(),
            tcp: tcp::Config::default(),
            rtu: rtu::Config::default(),
            registers: Registers::default(),
            simulated: Vec::new(),
        }
    }
}

impl Config {
    /// Read configuration from file, JSON first and TOML as fallback.
    pub fn read<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        if let Ok(c) = serde_json::from_reader(reader) {
            Ok(c)
        } else {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| e.into())
        }
    }

    /// Read the configuration, writing the default settings first if the
    /// file does not exist.
    pub fn read_or_init<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::write(path, DEFAULT_SETTINGS)?;
            tracing::info!("Default settings written to {}", path.display());
        }
        Self::read(path)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Apply static values and then load the simulated sequences.
    ///
    /// Rejected entries are returned and skipped, everything else is applied.
    pub fn apply(&self, table: &RegisterTable, simulator: &mut Simulator) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for (bank, [address, value]) in self.registers.entries() {
            let res = u16::try_from(*value)
                .map_err(|_| {
                    ConfigError::InvalidValue(format!("{} {} = {}", bank, address, value))
                })
                .and_then(|value| {
                    table
                        .init(bank, *address as usize, value)
                        .map_err(ConfigError::from)
                });
            if let Err(e) = res {
                errors.push(e);
            }
        }
        for s in self.simulated.iter() {
            if let Err(e) = simulator.load(s.bank, s.address as usize, s.values.clone()) {
                errors.push(e);
            }
        }
        errors
    }
}
