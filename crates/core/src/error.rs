//! Error taxonomy of the execution layer

use accrollup_smt::TreeError;

use crate::types::{AccountIndex, Address, Amount, Nonce};

/// Why a soft transaction was rejected.
///
/// Local to one transaction: the transaction is dropped from the block and
/// its submitter is told the reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    /// No account at the index
    #[error("account {0} does not exist")]
    AccountNotFound(AccountIndex),
    /// Nonce differs from the account nonce
    #[error("invalid nonce, expected {expected}")]
    InvalidNonce {
        /// Account nonce
        expected: Nonce,
        /// Nonce carried by the transaction
        actual: Nonce,
    },
    /// Balance below the transferred value
    #[error("insufficient balance, account has {available}")]
    InsufficientBalance {
        /// Account balance
        available: Amount,
        /// Value to move
        required: Amount,
    },
    /// Signature does not recover to an account signer
    #[error("invalid signature")]
    InvalidSignature,
    /// Signature is all zero
    #[error("missing signature")]
    MissingSignature,
    /// Signer change category is neither add nor remove
    #[error("modification category must be 0 or 1, got {0}")]
    InvalidModificationCategory(u8),
    /// Added signer is already present
    #[error("{0} is already a signer")]
    SignerAlreadyExists(Address),
    /// Removed signer is not present
    #[error("{0} is not a signer")]
    SignerNotFound(Address),
    /// Removal would leave no signer
    #[error("cannot remove the last signer")]
    LastSigner,
    /// Nonce does not fit its wire width
    #[error("account nonce is exhausted")]
    NonceOverflow,
    /// Value does not fit its wire width
    #[error("value {0} does not fit in 56 bits")]
    ValueTooLarge(Amount),
    /// Receiver balance would exceed the maximum value
    #[error("receiving balance would overflow")]
    BalanceOverflow,
    /// Created address already has an account
    #[error("an account already exists for {0}")]
    AccountAlreadyExists(Address),
    /// Created account index is not the next free index
    #[error("invalid account index {actual}, expected {expected}")]
    InvalidAccountIndex {
        /// Next free index
        expected: u64,
        /// Index carried by the transaction
        actual: AccountIndex,
    },
    /// No free leaf left in the account tree
    #[error("account tree is full")]
    StateFull,
}

/// Malformed transaction or account bytes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No bytes at all
    #[error("empty input")]
    Empty,
    /// Prefix is not a known transaction tag
    #[error("unknown transaction tag {0}")]
    UnknownTag(u8),
    /// Length does not match the transaction type
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Length of the type
        expected: usize,
        /// Bytes given
        actual: usize,
    },
    /// Account encoding has a bad length
    #[error("invalid account encoding of {0} bytes")]
    InvalidAccountLength(usize),
    /// Transactions data ends before its counts say
    #[error("truncated transactions data")]
    TruncatedData,
}

/// Errors from state tree writes and reconstruction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Tree write failed
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// Address already has an account
    #[error("an account already exists for {0}")]
    DuplicateAddress(Address),
    /// Update would change the address of an account
    #[error("account {index} belongs to {expected}, not {actual}")]
    AddressMismatch {
        /// Account index
        index: AccountIndex,
        /// Stored address
        expected: Address,
        /// Address of the update
        actual: Address,
    },
    /// Rebuilt state does not commit to the expected root
    #[error("state root mismatch: expected 0x{}, computed 0x{}", hex::encode(.expected), hex::encode(.actual))]
    RootMismatch {
        /// Root to match
        expected: [u8; 32],
        /// Root of the rebuilt tree
        actual: [u8; 32],
    },
}

/// Consistency errors, fatal to the current block production attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Hard transaction indices are not consecutive
    #[error("hard transaction index gap: expected {expected}, found {found}")]
    HardTransactionGap {
        /// Next index to apply
        expected: u64,
        /// Index found
        found: u64,
    },
    /// Hard transaction targets a nonexistent account
    #[error("hard transaction {hard_transaction_index} references unknown account {account_index}")]
    UnknownAccount {
        /// Index of the offending hard transaction
        hard_transaction_index: u64,
        /// Missing account
        account_index: AccountIndex,
    },
    /// Soft transaction in the hard transaction stream
    #[error("expected a hard transaction, found tag {0}")]
    ExpectedHardTransaction(u8),
    /// State write failed
    #[error(transparent)]
    State(#[from] StateError),
    /// Malformed hard transaction bytes
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
