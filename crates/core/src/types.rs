//! Common types and wire widths

pub use accrollup_smt::Hash;
pub use alloy_primitives::Address;

/// Raw recoverable ECDSA signature, `r ‖ s ‖ v`
pub type SignatureBytes = alloy_primitives::FixedBytes<65>;

/// Token amount
pub type Amount = u64;

/// Account nonce
pub type Nonce = u32;

/// Position of an account leaf in the state tree
pub type AccountIndex = u32;

/// Block number type
pub type BlockNumber = u32;

/// Width of a hard transaction index on the wire
pub const HARD_TX_INDEX_BYTES: usize = 5;
/// Width of an account index on the wire
pub const ACCOUNT_INDEX_BYTES: usize = 4;
/// Width of a nonce on the wire
pub const NONCE_BYTES: usize = 3;
/// Width of a value or balance on the wire
pub const VALUE_BYTES: usize = 7;
/// Width of an address on the wire
pub const ADDRESS_BYTES: usize = 20;
/// Width of a signature on the wire
pub const SIGNATURE_BYTES: usize = 65;
/// Width of a state root on the wire
pub const ROOT_BYTES: usize = 32;

/// Largest representable value or balance
pub const MAX_VALUE: Amount = (1 << (VALUE_BYTES * 8)) - 1;

/// Largest representable nonce
pub const MAX_NONCE: Nonce = (1 << (NONCE_BYTES * 8)) - 1;

/// Largest representable hard transaction index
pub const MAX_HARD_TX_INDEX: u64 = (1 << (HARD_TX_INDEX_BYTES * 8)) - 1;

/// Format the first bytes of a hash for logs
pub fn short_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(&hash[..4]))
}
