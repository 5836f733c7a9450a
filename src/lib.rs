//! Modbus server simulator.
//!
//! A [`memory::RegisterTable`] holds the four Modbus banks and is shared by
//! the TCP and RTU listeners of an [`instance::TransportManager`]. A
//! [`sim::Simulator`], driven by a [`sim::Ticker`], cycles configured cells
//! through their value sequences so clients observe changing data.

pub mod config;
pub mod error;
pub mod instance;
pub mod memory;
pub mod net;
pub mod sim;
