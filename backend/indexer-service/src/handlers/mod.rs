//! Message handlers registered on the consumer runtime

pub mod deposit;

pub use deposit::{DepositEvent, DepositHandler, DepositOutcome, SubaccountUpdate};
