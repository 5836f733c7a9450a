use crate::error::OutOfRange;
use crate::memory::{Bank, Range};

use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

/// Number of addressable cells per bank (the full 16 bit Modbus address space).
pub const CAPACITY: usize = 0x1_0000;

/// Borrowed view of one bank.
enum Cells<'a> {
    Bits(&'a [AtomicU8]),
    Words(&'a [AtomicU16]),
}

impl Cells<'_> {
    fn load(&self, idx: usize) -> u16 {
        match self {
            Cells::Bits(c) => c[idx].load(Ordering::Relaxed) as u16,
            Cells::Words(c) => c[idx].load(Ordering::Relaxed),
        }
    }

    fn store(&self, idx: usize, value: u16) {
        match self {
            Cells::Bits(c) => c[idx].store((value != 0) as u8, Ordering::Relaxed),
            Cells::Words(c) => c[idx].store(value, Ordering::Relaxed),
        }
    }
}

fn bits(capacity: usize) -> Box<[AtomicU8]> {
    (0..capacity).map(|_| AtomicU8::new(0)).collect()
}

fn words(capacity: usize) -> Box<[AtomicU16]> {
    (0..capacity).map(|_| AtomicU16::new(0)).collect()
}

/// Register storage shared by the simulator and all listeners.
///
/// Every cell is an atomic of its own. Single cell reads and writes never
/// tear, but nothing orders a client write against a simulator tick landing
/// on the same cell: whichever store happens last wins. Multi-cell reads may
/// observe a mix of values from before and after a tick.
#[derive(Debug)]
pub struct RegisterTable {
    capacity: usize,
    discrete_inputs: Box<[AtomicU8]>,
    coils: Box<[AtomicU8]>,
    input_registers: Box<[AtomicU16]>,
    holding_registers: Box<[AtomicU16]>,
}

impl Default for RegisterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterTable {
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            discrete_inputs: bits(capacity),
            coils: bits(capacity),
            input_registers: words(capacity),
            holding_registers: words(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn cells(&self, bank: Bank) -> Cells<'_> {
        match bank {
            Bank::DiscreteInput => Cells::Bits(&self.discrete_inputs),
            Bank::Coil => Cells::Bits(&self.coils),
            Bank::InputRegister => Cells::Words(&self.input_registers),
            Bank::HoldingRegister => Cells::Words(&self.holding_registers),
        }
    }

    pub fn check(&self, bank: Bank, range: &Range) -> Result<(), OutOfRange> {
        if range.within(self.capacity) {
            Ok(())
        } else {
            Err(OutOfRange {
                bank,
                range: *range,
                capacity: self.capacity,
            })
        }
    }

    /// Set the startup value of a cell. Meant to be called before any
    /// listener serves the table.
    pub fn init(&self, bank: Bank, address: usize, value: u16) -> Result<(), OutOfRange> {
        self.write(bank, address, value)
    }

    pub fn read(&self, bank: Bank, address: usize) -> Result<u16, OutOfRange> {
        self.check(bank, &Range::new(address, 1))?;
        Ok(self.cells(bank).load(address))
    }

    pub fn write(&self, bank: Bank, address: usize, value: u16) -> Result<(), OutOfRange> {
        self.check(bank, &Range::new(address, 1))?;
        self.cells(bank).store(address, value);
        Ok(())
    }

    /// Read a contiguous range. Fails without reading anything if any part of
    /// the range lies outside the bank.
    pub fn read_range(&self, bank: Bank, range: &Range) -> Result<Vec<u16>, OutOfRange> {
        self.check(bank, range)?;
        let cells = self.cells(bank);
        Ok((range.start..range.end).map(|idx| cells.load(idx)).collect())
    }

    /// Write a contiguous range starting at `start`. Fails without writing
    /// anything if any part of the range lies outside the bank.
    pub fn write_range(&self, bank: Bank, start: usize, values: &[u16]) -> Result<(), OutOfRange> {
        self.check(bank, &Range::new(start, values.len()))?;
        let cells = self.cells(bank);
        for (idx, value) in (start..).zip(values.iter()) {
            cells.store(idx, *value);
        }
        Ok(())
    }

    /// Atomic `(current AND and_mask) OR (or_mask AND NOT and_mask)` on a
    /// holding register. Returns the new value.
    pub fn mask_write(&self, address: usize, and_mask: u16, or_mask: u16) -> Result<u16, OutOfRange> {
        self.check(Bank::HoldingRegister, &Range::new(address, 1))?;
        let apply = |v: u16| (v & and_mask) | (or_mask & !and_mask);
        let prev = self.holding_registers[address]
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(apply(v)))
            .unwrap_or_else(|v| v);
        Ok(apply(prev))
    }
}
