mod schedule;
mod ticker;

pub use schedule::{Schedule, Simulator};
pub use ticker::Ticker;
