//! Crypto primitives, keyset derivation and wire data model for a
//! Chaumian ecash mint: no I/O, no async — everything here is a pure
//! function over secp256k1 points and scalars.

pub mod amount;
pub mod blind;
pub mod dhke;
pub mod error;
pub mod keyset;
pub mod primitives;
pub mod proof;
