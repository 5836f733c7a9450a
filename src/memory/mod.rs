mod bank;
mod range;
mod table;

pub use bank::Bank;
pub use range::Range;
pub use table::{CAPACITY, RegisterTable};
