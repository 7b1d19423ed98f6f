//! Fixtures shared by unit and integration tests

mod utxo;
mod wallet;

pub use wallet::{TEST_MNEMONIC, TEST_PASSWORD};
