pub mod address;
pub mod record;

pub use address::Address;
pub use record::{RawTransaction, TransactionRecord};
