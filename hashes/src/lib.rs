// SPDX-License-Identifier: CC0-1.0

//! Hash functions used by wallet-core that are not part of `bitcoin_hashes`.
//!
//! Currently this is the BLAKE-256 family used by Decred for transaction ids,
//! signature hashes, address checksums and public key hashing.
//!
//! ```
//! use wallet_core_hashes::{blake256, blake256d};
//!
//! let single = blake256::Hash::hash(b"");
//! let double = blake256d::Hash::hash(b"");
//! assert_eq!(double.to_byte_array(), blake256::Hash::hash(single.as_byte_array()).to_byte_array());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod blake256;
pub mod blake256d;

pub use blake256::HashEngine;
