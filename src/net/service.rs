// Crate
use crate::memory::{Bank, Range, RegisterTable};
use crate::net::Transport;

// External
use itertools::Itertools;
use std::future;
use std::sync::Arc;
use tokio_modbus::Request;
use tokio_modbus::prelude::{ExceptionCode, Response, SlaveRequest};

fn to_str(values: &[u16]) -> String {
    format!("[ {} ]", values.iter().map(|v| format!("{:#06X}", v)).join(", "))
}

/// Answers Modbus requests from one connection against the shared table.
///
/// Every unit id addresses the same table.
#[derive(Clone)]
pub struct Service {
    transport: Transport,
    table: Arc<RegisterTable>,
}

impl Service {
    pub fn new(transport: Transport, table: Arc<RegisterTable>) -> Self {
        Self { transport, table }
    }

    fn read(&self, bank: Bank, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let range = Range::from((addr, cnt));
        self.table.read_range(bank, &range).map_err(|e| {
            tracing::warn!("{}: read {} failed. [{}]", self.transport, bank, e);
            ExceptionCode::IllegalDataAddress
        })
    }

    fn write(&self, bank: Bank, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        self.table
            .write_range(bank, addr as usize, values)
            .map_err(|e| {
                tracing::warn!("{}: write {} failed. [{}]", self.transport, bank, e);
                ExceptionCode::IllegalDataAddress
            })
    }

    fn handle(&self, slave: u8, request: Request<'static>) -> Result<Response, ExceptionCode> {
        match request {
            Request::ReadCoils(addr, cnt) => {
                tracing::debug!(
                    "{}: ReadCoils for slave ID {} and range {}",
                    self.transport,
                    slave,
                    Range::from((addr, cnt))
                );
                self.read(Bank::Coil, addr, cnt)
                    .map(|v| Response::ReadCoils(v.into_iter().map(|b| b != 0).collect()))
            }
            Request::ReadDiscreteInputs(addr, cnt) => {
                tracing::debug!(
                    "{}: ReadDiscreteInputs for slave ID {} and range {}",
                    self.transport,
                    slave,
                    Range::from((addr, cnt))
                );
                self.read(Bank::DiscreteInput, addr, cnt)
                    .map(|v| Response::ReadDiscreteInputs(v.into_iter().map(|b| b != 0).collect()))
            }
            Request::ReadInputRegisters(addr, cnt) => {
                tracing::debug!(
                    "{}: ReadInputRegisters for slave ID {} and range {}",
                    self.transport,
                    slave,
                    Range::from((addr, cnt))
                );
                self.read(Bank::InputRegister, addr, cnt)
                    .map(Response::ReadInputRegisters)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                tracing::debug!(
                    "{}: ReadHoldingRegisters for slave ID {} and range {}",
                    self.transport,
                    slave,
                    Range::from((addr, cnt))
                );
                self.read(Bank::HoldingRegister, addr, cnt)
                    .map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleCoil(addr, value) => {
                tracing::debug!(
                    "{}: WriteSingleCoil for slave ID {} and address {} = {}",
                    self.transport,
                    slave,
                    addr,
                    value
                );
                self.write(Bank::Coil, addr, &[value as u16])
                    .map(|_| Response::WriteSingleCoil(addr, value))
            }
            Request::WriteMultipleCoils(addr, values) => {
                tracing::debug!(
                    "{}: WriteMultipleCoils for slave ID {} and range {}",
                    self.transport,
                    slave,
                    Range::new(addr as usize, values.len())
                );
                let bits: Vec<u16> = values.iter().map(|v| *v as u16).collect();
                self.write(Bank::Coil, addr, &bits)
                    .map(|_| Response::WriteMultipleCoils(addr, bits.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => {
                tracing::debug!(
                    "{}: WriteSingleRegister for slave ID {} and address {} = {:#06X}",
                    self.transport,
                    slave,
                    addr,
                    value
                );
                self.write(Bank::HoldingRegister, addr, &[value])
                    .map(|_| Response::WriteSingleRegister(addr, value))
            }
            Request::WriteMultipleRegisters(addr, values) => {
                tracing::debug!(
                    "{}: WriteMultipleRegisters for slave ID {} and range {} = {}",
                    self.transport,
                    slave,
                    Range::new(addr as usize, values.len()),
                    to_str(&values)
                );
                self.write(Bank::HoldingRegister, addr, &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::MaskWriteRegister(addr, and_mask, or_mask) => {
                tracing::debug!(
                    "{}: MaskWriteRegister for slave ID {} and address {}",
                    self.transport,
                    slave,
                    addr
                );
                self.table
                    .mask_write(addr as usize, and_mask, or_mask)
                    .map(|_| Response::MaskWriteRegister(addr, and_mask, or_mask))
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            }
            Request::ReadWriteMultipleRegisters(read_addr, cnt, write_addr, values) => {
                tracing::debug!(
                    "{}: ReadWriteMultipleRegisters for slave ID {}, read {} and write {}",
                    self.transport,
                    slave,
                    Range::from((read_addr, cnt)),
                    Range::new(write_addr as usize, values.len())
                );
                let read = Range::from((read_addr, cnt));
                let write = Range::new(write_addr as usize, values.len());
                if self.table.check(Bank::HoldingRegister, &read).is_err()
                    || self.table.check(Bank::HoldingRegister, &write).is_err()
                {
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                // The write is performed before the read
                self.write(Bank::HoldingRegister, write_addr, &values)?;
                self.read(Bank::HoldingRegister, read_addr, cnt)
                    .map(Response::ReadWriteMultipleRegisters)
            }
            other => {
                tracing::debug!(
                    "{}: Unsupported request {:?} for slave ID {}",
                    self.transport,
                    other,
                    slave
                );
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl tokio_modbus::server::Service for Service {
    type Request = SlaveRequest<'static>;
    type Exception = ExceptionCode;
    type Response = Response;
    type Future = future::Ready<Result<Response, ExceptionCode>>;

    fn call(&self, request: Self::Request) -> Self::Future {
        let SlaveRequest { slave, request } = request;
        future::ready(self.handle(slave, request))
    }
}
