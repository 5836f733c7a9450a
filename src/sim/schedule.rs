use crate::error::ConfigError;
use crate::memory::{Bank, Range, RegisterTable};

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

/// A cyclic value sequence for one cell.
///
/// The cursor always indexes the value the simulator last wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    values: Vec<u16>,
    cursor: usize,
}

impl Schedule {
    pub fn new(values: Vec<u16>) -> Option<Self> {
        if values.is_empty() {
            None
        } else {
            Some(Self { values, cursor: 0 })
        }
    }

    pub fn current(&self) -> u16 {
        self.values[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn values(&self) -> &[u16] {
        &self.values
    }

    /// Move to the next value, wrapping at the end of the sequence.
    pub fn step(&mut self) -> u16 {
        self.cursor = (self.cursor + 1) % self.values.len();
        self.current()
    }
}

/// Drives every loaded schedule against the shared table.
#[derive(Debug)]
pub struct Simulator {
    table: Arc<RegisterTable>,
    schedules: BTreeMap<(Bank, usize), Schedule>,
}

impl Simulator {
    pub fn new(table: Arc<RegisterTable>) -> Self {
        Self {
            table,
            schedules: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &Arc<RegisterTable> {
        &self.table
    }

    /// Register a cyclic sequence for `(bank, address)` and seed the cell
    /// with its first value. The table is left untouched on error.
    pub fn load(&mut self, bank: Bank, address: usize, values: Vec<u16>) -> Result<(), ConfigError> {
        self.table.check(bank, &Range::new(address, 1))?;
        let schedule = Schedule::new(values).ok_or(ConfigError::EmptySequence { bank, address })?;
        match self.schedules.entry((bank, address)) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateSchedule { bank, address }),
            Entry::Vacant(e) => {
                self.table.write(bank, address, schedule.current())?;
                e.insert(schedule);
                Ok(())
            }
        }
    }

    /// One simulation tick: every schedule steps once and its new value is
    /// written to the table. Schedules never wait on each other.
    pub fn advance(&mut self) {
        for ((bank, address), schedule) in self.schedules.iter_mut() {
            let value = schedule.step();
            // Addresses were checked on load
            if let Err(e) = self.table.write(*bank, *address, value) {
                tracing::error!("Simulation write failed. [{}]", e);
            }
        }
    }

    pub fn cursor(&self, bank: Bank, address: usize) -> Option<usize> {
        self.schedules.get(&(bank, address)).map(Schedule::cursor)
    }

    pub fn schedule(&self, bank: Bank, address: usize) -> Option<&Schedule> {
        self.schedules.get(&(bank, address))
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}
