//! Goal calculation and daily intake accounting.

pub mod clock;
pub mod goals;
pub mod ledger;

pub use clock::{Clock, FixedClock, LocalClock};
pub use goals::calculate_goals;
pub use ledger::{IntakeLedger, IntakeRecord, Macros, remaining};
