//! Soft transactions, submitted to the queue and signed by an account signer

use accrollup_smt::Keccak256Hasher;
use alloy_primitives::{Signature, B256};
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};

use super::SoftTransaction;
use crate::account::Account;
use crate::codec::{Reader, Writer};
use crate::error::TxError;
use crate::types::{
    AccountIndex, Address, Amount, Hash, Nonce, SignatureBytes, ACCOUNT_INDEX_BYTES,
    ADDRESS_BYTES, MAX_NONCE, MAX_VALUE, NONCE_BYTES, ROOT_BYTES, SIGNATURE_BYTES, VALUE_BYTES,
};

/// Withdrawal to a base-chain address
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftWithdrawal {
    /// Signing account
    pub account_index: AccountIndex,
    /// Base chain recipient
    pub withdrawal_address: Address,
    /// Expected nonce of the signing account
    pub nonce: Nonce,
    /// Amount debited from the signing account
    pub value: Amount,
    /// Signature over the message hash
    pub signature: SignatureBytes,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl SoftWithdrawal {
    /// Encoded length without the prefix
    pub const BYTES: usize = ACCOUNT_INDEX_BYTES
        + ADDRESS_BYTES
        + NONCE_BYTES
        + VALUE_BYTES
        + SIGNATURE_BYTES
        + ROOT_BYTES;

    /// Unsigned withdrawal
    pub fn new(
        account_index: AccountIndex,
        withdrawal_address: Address,
        nonce: Nonce,
        value: Amount,
    ) -> Self {
        Self { account_index, withdrawal_address, nonce, value, ..Default::default() }
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.address(&self.withdrawal_address);
        w.uint(u64::from(self.nonce), NONCE_BYTES);
        w.uint(self.value, VALUE_BYTES);
        w.signature(&self.signature);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            withdrawal_address: r.address(),
            nonce: r.uint(NONCE_BYTES) as Nonce,
            value: r.uint(VALUE_BYTES),
            signature: r.signature(),
            intermediate_state_root: r.hash(),
        }
    }
}

/// Creates a new account funded from an existing one
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftCreate {
    /// Signing account
    pub account_index: AccountIndex,
    /// Must equal the state size when executed
    pub to_account_index: AccountIndex,
    /// Expected nonce of the signing account
    pub nonce: Nonce,
    /// Amount debited from the signing account
    pub value: Amount,
    /// Address of the new account
    pub account_address: Address,
    /// First signer of the new account
    pub initial_signing_key: Address,
    /// Signature over the message hash
    pub signature: SignatureBytes,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl SoftCreate {
    /// Encoded length without the prefix
    pub const BYTES: usize = ACCOUNT_INDEX_BYTES
        + ACCOUNT_INDEX_BYTES
        + NONCE_BYTES
        + VALUE_BYTES
        + ADDRESS_BYTES
        + ADDRESS_BYTES
        + SIGNATURE_BYTES
        + ROOT_BYTES;

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.uint(u64::from(self.to_account_index), ACCOUNT_INDEX_BYTES);
        w.uint(u64::from(self.nonce), NONCE_BYTES);
        w.uint(self.value, VALUE_BYTES);
        w.address(&self.account_address);
        w.address(&self.initial_signing_key);
        w.signature(&self.signature);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            to_account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            nonce: r.uint(NONCE_BYTES) as Nonce,
            value: r.uint(VALUE_BYTES),
            account_address: r.address(),
            initial_signing_key: r.address(),
            signature: r.signature(),
            intermediate_state_root: r.hash(),
        }
    }
}

/// Transfer between two existing accounts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftTransfer {
    /// Signing account
    pub account_index: AccountIndex,
    /// Receiving account
    pub to_account_index: AccountIndex,
    /// Expected nonce of the signing account
    pub nonce: Nonce,
    /// Amount debited from the signing account
    pub value: Amount,
    /// Signature over the message hash
    pub signature: SignatureBytes,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl SoftTransfer {
    /// Encoded length without the prefix
    pub const BYTES: usize = ACCOUNT_INDEX_BYTES
        + ACCOUNT_INDEX_BYTES
        + NONCE_BYTES
        + VALUE_BYTES
        + SIGNATURE_BYTES
        + ROOT_BYTES;

    /// Unsigned transfer
    pub fn new(
        account_index: AccountIndex,
        to_account_index: AccountIndex,
        nonce: Nonce,
        value: Amount,
    ) -> Self {
        Self { account_index, to_account_index, nonce, value, ..Default::default() }
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.uint(u64::from(self.to_account_index), ACCOUNT_INDEX_BYTES);
        w.uint(u64::from(self.nonce), NONCE_BYTES);
        w.uint(self.value, VALUE_BYTES);
        w.signature(&self.signature);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            to_account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            nonce: r.uint(NONCE_BYTES) as Nonce,
            value: r.uint(VALUE_BYTES),
            signature: r.signature(),
            intermediate_state_root: r.hash(),
        }
    }
}

/// How a [`SoftChangeSigner`] modifies the signer set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModificationCategory {
    /// Add a signer
    Add = 0,
    /// Remove a signer
    Remove = 1,
}

impl TryFrom<u8> for ModificationCategory {
    type Error = TxError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Add),
            1 => Ok(Self::Remove),
            other => Err(TxError::InvalidModificationCategory(other)),
        }
    }
}

/// Adds or removes a signer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftChangeSigner {
    /// Signing account
    pub account_index: AccountIndex,
    /// Expected nonce of the signing account
    pub nonce: Nonce,
    /// Signer to add or remove
    pub signing_address: Address,
    /// Raw [`ModificationCategory`]; kept as a byte so bad values survive decoding
    pub modification_category: u8,
    /// Signature over the message hash
    pub signature: SignatureBytes,
    /// State root right after this transaction
    pub intermediate_state_root: Hash,
}

impl SoftChangeSigner {
    /// Encoded length without the prefix
    pub const BYTES: usize =
        ACCOUNT_INDEX_BYTES + NONCE_BYTES + ADDRESS_BYTES + 1 + SIGNATURE_BYTES + ROOT_BYTES;

    /// Unsigned signer change
    pub fn new(
        account_index: AccountIndex,
        nonce: Nonce,
        signing_address: Address,
        category: ModificationCategory,
    ) -> Self {
        Self {
            account_index,
            nonce,
            signing_address,
            modification_category: category as u8,
            ..Default::default()
        }
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        w.uint(u64::from(self.account_index), ACCOUNT_INDEX_BYTES);
        w.uint(u64::from(self.nonce), NONCE_BYTES);
        w.address(&self.signing_address);
        w.bytes(&[self.modification_category]);
        w.signature(&self.signature);
        w.hash(&self.intermediate_state_root);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Self {
        Self {
            account_index: r.uint(ACCOUNT_INDEX_BYTES) as AccountIndex,
            nonce: r.uint(NONCE_BYTES) as Nonce,
            signing_address: r.address(),
            modification_category: r.u8(),
            signature: r.signature(),
            intermediate_state_root: r.hash(),
        }
    }
}

impl SoftTransaction {
    /// Index of the signing account
    pub const fn account_index(&self) -> AccountIndex {
        match self {
            Self::Withdrawal(tx) => tx.account_index,
            Self::Create(tx) => tx.account_index,
            Self::Transfer(tx) => tx.account_index,
            Self::ChangeSigner(tx) => tx.account_index,
        }
    }

    /// Expected nonce of the signing account
    pub const fn nonce(&self) -> Nonce {
        match self {
            Self::Withdrawal(tx) => tx.nonce,
            Self::Create(tx) => tx.nonce,
            Self::Transfer(tx) => tx.nonce,
            Self::ChangeSigner(tx) => tx.nonce,
        }
    }

    /// Value debited from the signing account, if the variant moves funds
    pub const fn value(&self) -> Option<Amount> {
        match self {
            Self::Withdrawal(tx) => Some(tx.value),
            Self::Create(tx) => Some(tx.value),
            Self::Transfer(tx) => Some(tx.value),
            Self::ChangeSigner(_) => None,
        }
    }

    /// Raw signature
    pub const fn signature(&self) -> &SignatureBytes {
        match self {
            Self::Withdrawal(tx) => &tx.signature,
            Self::Create(tx) => &tx.signature,
            Self::Transfer(tx) => &tx.signature,
            Self::ChangeSigner(tx) => &tx.signature,
        }
    }

    /// Replace the signature
    pub fn set_signature(&mut self, signature: SignatureBytes) {
        match self {
            Self::Withdrawal(tx) => tx.signature = signature,
            Self::Create(tx) => tx.signature = signature,
            Self::Transfer(tx) => tx.signature = signature,
            Self::ChangeSigner(tx) => tx.signature = signature,
        }
    }

    /// State root right after this transaction
    pub const fn intermediate_state_root(&self) -> Hash {
        match self {
            Self::Withdrawal(tx) => tx.intermediate_state_root,
            Self::Create(tx) => tx.intermediate_state_root,
            Self::Transfer(tx) => tx.intermediate_state_root,
            Self::ChangeSigner(tx) => tx.intermediate_state_root,
        }
    }

    /// Record the state root right after this transaction
    pub fn set_intermediate_state_root(&mut self, root: Hash) {
        match self {
            Self::Withdrawal(tx) => tx.intermediate_state_root = root,
            Self::Create(tx) => tx.intermediate_state_root = root,
            Self::Transfer(tx) => tx.intermediate_state_root = root,
            Self::ChangeSigner(tx) => tx.intermediate_state_root = root,
        }
    }

    /// Canonical pre-signature hash: keccak256 of the prefixed encoding
    /// without the trailing signature and intermediate state root.
    pub fn message_hash(&self) -> Hash {
        let encoded = self.encode(true);
        Keccak256Hasher::hash(&encoded[..encoded.len() - SIGNATURE_BYTES - ROOT_BYTES])
    }

    /// Sign [`Self::message_hash`] with `key`, replacing any existing signature
    pub fn sign(&mut self, key: &SigningKey) -> Result<(), k256::ecdsa::Error> {
        let (signature, recovery_id) = key.sign_prehash_recoverable(&self.message_hash())?;

        let mut bytes = [0u8; SIGNATURE_BYTES];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        self.set_signature(SignatureBytes::from(bytes));
        Ok(())
    }

    /// Address that produced the signature, if it is well formed
    pub fn recover_signer(&self) -> Option<Address> {
        let signature = Signature::from_raw(self.signature().as_slice()).ok()?;
        signature.recover_address_from_prehash(&B256::from(self.message_hash())).ok()
    }

    /// Validate against the current state of the signing account.
    ///
    /// Checks run in order and the first failure wins: existence, nonce,
    /// balance, signature (unless `verify_signature` is false), then the
    /// variant's own rules. Never mutates.
    pub fn check_valid(&self, account: Option<&Account>, verify_signature: bool) -> Result<(), TxError> {
        let account = account.ok_or(TxError::AccountNotFound(self.account_index()))?;

        if self.nonce() != account.nonce {
            return Err(TxError::InvalidNonce { expected: account.nonce, actual: self.nonce() });
        }

        if let Some(value) = self.value() {
            if account.balance < value {
                return Err(TxError::InsufficientBalance {
                    available: account.balance,
                    required: value,
                });
            }
        }

        if verify_signature {
            match self.recover_signer() {
                Some(signer) if account.has_signer(&signer) => {}
                _ => return Err(TxError::InvalidSignature),
            }
        }

        if let Self::ChangeSigner(tx) = self {
            match ModificationCategory::try_from(tx.modification_category)? {
                ModificationCategory::Add if account.has_signer(&tx.signing_address) => {
                    return Err(TxError::SignerAlreadyExists(tx.signing_address));
                }
                ModificationCategory::Remove if !account.has_signer(&tx.signing_address) => {
                    return Err(TxError::SignerNotFound(tx.signing_address));
                }
                ModificationCategory::Remove if account.signers.len() == 1 => {
                    return Err(TxError::LastSigner);
                }
                _ => {}
            }
        }

        if account.nonce >= MAX_NONCE {
            return Err(TxError::NonceOverflow);
        }

        Ok(())
    }

    /// Stateless checks done when the transaction is queued
    pub fn validate_shape(&self) -> Result<(), TxError> {
        if let Some(value) = self.value() {
            if value > MAX_VALUE {
                return Err(TxError::ValueTooLarge(value));
            }
        }
        if self.nonce() > MAX_NONCE {
            return Err(TxError::NonceOverflow);
        }
        if let Self::ChangeSigner(tx) = self {
            ModificationCategory::try_from(tx.modification_category)?;
        }
        if self.signature().is_zero() {
            return Err(TxError::MissingSignature);
        }
        Ok(())
    }
}
