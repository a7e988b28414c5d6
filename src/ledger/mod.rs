//! Double-entry journal model and the balance rule applied before forwarding.

pub mod amount;
pub mod journal;

pub use journal::{
    check_balance, one_sided_violations, BalanceCheck, JournalEntry, JournalLine, JournalStatus,
    BALANCE_TOLERANCE,
};
