pub mod rtu;
pub mod tcp;

mod service;

pub use service::Service;

use std::fmt::Display;

/// The transports a register table can be exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Rtu,
}

impl Display for Transport {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp => fmt.write_str("TCP"),
            Transport::Rtu => fmt.write_str("RTU"),
        }
    }
}
