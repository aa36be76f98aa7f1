//! Hard transactions, ordered and authorised by the base chain.
//!
//! They carry no signature; the engine applies them in index order.

use serde::{Deserialize, Serialize};

use crate::codec::{Reader, Writer};
use crate::types::{
    AccountIndex, Address, Amount, Hash, ACCOUNT_INDEX_BYTES, ADDRESS_BYTES,
    HARD_TX_INDEX_BYTES, ROOT_BYTES, VALUE_BYTES,
};

/// Deposit to an address with no account yet; allocates a new account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardCreate {
    /// Position in the base chain hard transaction stream
    pub hard_transaction_index: u64,
    /// Assigned at execution: the state size when the account is appended
    pub account_index: AccountIndex,
    /// Amount moved
    pub value: Amount,
    /// Address of the new account
    pub account_address: Address,
    /// First signer of the new account
    pub initial_signing_key: Address,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl HardCreate {
    /// Encoded length without the prefix
    pub const BYTES: usize = HARD_TX_INDEX_BYTES
        + ACCOUNT_INDEX_BYTES
        + VALUE_BYTES
        + ADDRESS_BYTES
        + ADDRESS_BYTES
        + ROOT_BYTES;

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(self.hard_transaction_index, HARD_TX_INDEX_BYTES);
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.uint(self.value, VALUE_BYTES);
        w.address(&self.account_address);
        w.address(&self.initial_signing_key);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            hard_transaction_index: r.uint(HARD_TX_INDEX_BYTES),
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            value: r.uint(VALUE_BYTES),
            account_address: r.address(),
            initial_signing_key: r.address(),
            intermediate_state_root: r.hash(),
        }
    }
}

/// Deposit to an existing account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardDeposit {
    /// Position in the base chain hard transaction stream
    pub hard_transaction_index: u64,
    /// Target account
    pub account_index: AccountIndex,
    /// Amount moved
    pub value: Amount,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl HardDeposit {
    /// Encoded length without the prefix
    pub const BYTES: usize = HARD_TX_INDEX_BYTES + ACCOUNT_INDEX_BYTES + VALUE_BYTES + ROOT_BYTES;

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(self.hard_transaction_index, HARD_TX_INDEX_BYTES);
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.uint(self.value, VALUE_BYTES);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            hard_transaction_index: r.uint(HARD_TX_INDEX_BYTES),
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            value: r.uint(VALUE_BYTES),
            intermediate_state_root: r.hash(),
        }
    }
}

/// Forced withdrawal, paid out on the base chain once the block is confirmed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardWithdraw {
    /// Position in the base chain hard transaction stream
    pub hard_transaction_index: u64,
    /// Target account
    pub account_index: AccountIndex,
    /// Base chain sender of the request
    pub caller_address: Address,
    /// Amount moved
    pub value: Amount,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl HardWithdraw {
    /// Encoded length without the prefix
    pub const BYTES: usize =
        HARD_TX_INDEX_BYTES + ACCOUNT_INDEX_BYTES + ADDRESS_BYTES + VALUE_BYTES + ROOT_BYTES;

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(self.hard_transaction_index, HARD_TX_INDEX_BYTES);
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.address(&self.caller_address);
        w.uint(self.value, VALUE_BYTES);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            hard_transaction_index: r.uint(HARD_TX_INDEX_BYTES),
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            caller_address: r.address(),
            value: r.uint(VALUE_BYTES),
            intermediate_state_root: r.hash(),
        }
    }
}

/// Forced signer addition
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardAddSigner {
    /// Position in the base chain hard transaction stream
    pub hard_transaction_index: u64,
    /// Target account
    pub account_index: AccountIndex,
    /// Base chain sender of the request
    pub caller_address: Address,
    /// Signer to add
    pub signing_address: Address,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl HardAddSigner {
    /// Encoded length without the prefix
    pub const BYTES: usize =
        HARD_TX_INDEX_BYTES + ACCOUNT_INDEX_BYTES + ADDRESS_BYTES + ADDRESS_BYTES + ROOT_BYTES;

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(self.hard_transaction_index, HARD_TX_INDEX_BYTES);
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.address(&self.caller_address);
        w.address(&self.signing_address);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            hard_transaction_index: r.uint(HARD_TX_INDEX_BYTES),
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            caller_address: r.address(),
            signing_address: r.address(),
            intermediate_state_root: r.hash(),
        }
    }
}
