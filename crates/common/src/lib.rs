//! Chain-neutral building blocks shared by the faucet crates: address and
//! hash types, exact unit conversion, configuration loading and logging.

pub mod types;
pub mod utils;

pub use types::{Address, AddressError, TxHash};
pub use utils::converter::{Decimal, UnitError};
