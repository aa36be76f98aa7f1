//! Transaction family
//!
//! Every transaction has a fixed-width, tag-prefixed binary encoding. Tags
//! follow the canonical block order: hard creates, deposits, withdrawals and
//! signer additions, then soft withdrawals, creates, transfers and signer
//! changes.

mod hard;
mod soft;

pub use hard::{HardAddSigner, HardCreate, HardDeposit, HardWithdraw};
pub use soft::{ModificationCategory, SoftChangeSigner, SoftCreate, SoftTransfer, SoftWithdrawal};

use serde::{Deserialize, Serialize};

use crate::codec::{Reader, Writer};
use crate::error::DecodeError;
use crate::types::{AccountIndex, Hash};

/// Transaction type, the one-byte wire prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    /// Base chain deposit creating an account
    HardCreate = 0,
    /// Base chain deposit to an account
    HardDeposit = 1,
    /// Forced withdrawal
    HardWithdraw = 2,
    /// Forced signer addition
    HardAddSigner = 3,
    /// Signed withdrawal
    SoftWithdrawal = 4,
    /// Signed account creation
    SoftCreate = 5,
    /// Signed transfer
    SoftTransfer = 6,
    /// Signed signer change
    SoftChangeSigner = 7,
}

impl TxType {
    /// All types in canonical block order
    pub const ALL: [Self; 8] = [
        Self::HardCreate,
        Self::HardDeposit,
        Self::HardWithdraw,
        Self::HardAddSigner,
        Self::SoftWithdrawal,
        Self::SoftCreate,
        Self::SoftTransfer,
        Self::SoftChangeSigner,
    ];

    /// Wire prefix
    pub const fn prefix(self) -> u8 {
        self as u8
    }

    /// Parse a wire prefix
    pub fn from_prefix(prefix: u8) -> Result<Self, DecodeError> {
        Self::ALL.get(usize::from(prefix)).copied().ok_or(DecodeError::UnknownTag(prefix))
    }

    /// Encoded width without the prefix
    pub const fn byte_length(self) -> usize {
        match self {
            Self::HardCreate => HardCreate::BYTES,
            Self::HardDeposit => HardDeposit::BYTES,
            Self::HardWithdraw => HardWithdraw::BYTES,
            Self::HardAddSigner => HardAddSigner::BYTES,
            Self::SoftWithdrawal => SoftWithdrawal::BYTES,
            Self::SoftCreate => SoftCreate::BYTES,
            Self::SoftTransfer => SoftTransfer::BYTES,
            Self::SoftChangeSigner => SoftChangeSigner::BYTES,
        }
    }

    /// Whether transactions of this type originate on the base chain
    pub const fn is_hard(self) -> bool {
        (self as u8) < 4
    }
}

/// Transaction ordered by the base chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardTransaction {
    /// See [`HardCreate`]
    Create(HardCreate),
    /// See [`HardDeposit`]
    Deposit(HardDeposit),
    /// See [`HardWithdraw`]
    Withdraw(HardWithdraw),
    /// See [`HardAddSigner`]
    AddSigner(HardAddSigner),
}

impl HardTransaction {
    /// Wire tag
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::Create(_) => TxType::HardCreate,
            Self::Deposit(_) => TxType::HardDeposit,
            Self::Withdraw(_) => TxType::HardWithdraw,
            Self::AddSigner(_) => TxType::HardAddSigner,
        }
    }

    /// Position in the base chain's hard transaction stream
    pub const fn hard_transaction_index(&self) -> u64 {
        match self {
            Self::Create(tx) => tx.hard_transaction_index,
            Self::Deposit(tx) => tx.hard_transaction_index,
            Self::Withdraw(tx) => tx.hard_transaction_index,
            Self::AddSigner(tx) => tx.hard_transaction_index,
        }
    }

    /// Target account
    pub const fn account_index(&self) -> AccountIndex {
        match self {
            Self::Create(tx) => tx.account_index,
            Self::Deposit(tx) => tx.account_index,
            Self::Withdraw(tx) => tx.account_index,
            Self::AddSigner(tx) => tx.account_index,
        }
    }

    /// State root right after this transaction
    pub const fn intermediate_state_root(&self) -> Hash {
        match self {
            Self::Create(tx) => tx.intermediate_state_root,
            Self::Deposit(tx) => tx.intermediate_state_root,
            Self::Withdraw(tx) => tx.intermediate_state_root,
            Self::AddSigner(tx) => tx.intermediate_state_root,
        }
    }

    /// Record the state root right after this transaction
    pub fn set_intermediate_state_root(&mut self, root: Hash) {
        match self {
            Self::Create(tx) => tx.intermediate_state_root = root,
            Self::Deposit(tx) => tx.intermediate_state_root = root,
            Self::Withdraw(tx) => tx.intermediate_state_root = root,
            Self::AddSigner(tx) => tx.intermediate_state_root = root,
        }
    }

    fn write(&self, writer: &mut Writer) {
        match self {
            Self::Create(tx) => tx.write(writer),
            Self::Deposit(tx) => tx.write(writer),
            Self::Withdraw(tx) => tx.write(writer),
            Self::AddSigner(tx) => tx.write(writer),
        }
    }

    /// Encode, optionally with the type prefix
    pub fn encode(&self, include_prefix: bool) -> Vec<u8> {
        encode_with(self.tx_type(), include_prefix, |w| self.write(w))
    }
}

/// Transaction authorised by an account signer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftTransaction {
    /// See [`SoftWithdrawal`]
    Withdrawal(SoftWithdrawal),
    /// See [`SoftCreate`]
    Create(SoftCreate),
    /// See [`SoftTransfer`]
    Transfer(SoftTransfer),
    /// See [`SoftChangeSigner`]
    ChangeSigner(SoftChangeSigner),
}

impl SoftTransaction {
    /// Wire tag
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::Withdrawal(_) => TxType::SoftWithdrawal,
            Self::Create(_) => TxType::SoftCreate,
            Self::Transfer(_) => TxType::SoftTransfer,
            Self::ChangeSigner(_) => TxType::SoftChangeSigner,
        }
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        match self {
            Self::Withdrawal(tx) => tx.write(writer),
            Self::Create(tx) => tx.write(writer),
            Self::Transfer(tx) => tx.write(writer),
            Self::ChangeSigner(tx) => tx.write(writer),
        }
    }

    /// Encode, optionally with the type prefix
    pub fn encode(&self, include_prefix: bool) -> Vec<u8> {
        encode_with(self.tx_type(), include_prefix, |w| self.write(w))
    }
}

/// Any transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Ordered by the base chain
    Hard(HardTransaction),
    /// Signed by an account signer
    Soft(SoftTransaction),
}

impl Transaction {
    /// Wire tag
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::Hard(tx) => tx.tx_type(),
            Self::Soft(tx) => tx.tx_type(),
        }
    }

    /// Encoded width without the prefix
    pub const fn byte_length(&self) -> usize {
        self.tx_type().byte_length()
    }

    /// Encode, optionally with the type prefix
    pub fn encode(&self, include_prefix: bool) -> Vec<u8> {
        match self {
            Self::Hard(tx) => tx.encode(include_prefix),
            Self::Soft(tx) => tx.encode(include_prefix),
        }
    }

    /// Decode a prefixed encoding
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&prefix, rest) = bytes.split_first().ok_or(DecodeError::Empty)?;
        Self::decode_unprefixed(TxType::from_prefix(prefix)?, rest)
    }

    /// Decode an encoding whose type is known from context
    pub fn decode_unprefixed(tx_type: TxType, bytes: &[u8]) -> Result<Self, DecodeError> {
        let expected = tx_type.byte_length();
        if bytes.len() != expected {
            return Err(DecodeError::InvalidLength { expected, actual: bytes.len() });
        }

        let mut reader = Reader::new(bytes);
        let r = &mut reader;
        Ok(match tx_type {
            TxType::HardCreate => Self::Hard(HardTransaction::Create(HardCreate::read(r))),
            TxType::HardDeposit => Self::Hard(HardTransaction::Deposit(HardDeposit::read(r))),
            TxType::HardWithdraw => Self::Hard(HardTransaction::Withdraw(HardWithdraw::read(r))),
            TxType::HardAddSigner => {
                Self::Hard(HardTransaction::AddSigner(HardAddSigner::read(r)))
            }
            TxType::SoftWithdrawal => {
                Self::Soft(SoftTransaction::Withdrawal(SoftWithdrawal::read(r)))
            }
            TxType::SoftCreate => Self::Soft(SoftTransaction::Create(SoftCreate::read(r))),
            TxType::SoftTransfer => Self::Soft(SoftTransaction::Transfer(SoftTransfer::read(r))),
            TxType::SoftChangeSigner => {
                Self::Soft(SoftTransaction::ChangeSigner(SoftChangeSigner::read(r)))
            }
        })
    }
}

impl From<HardTransaction> for Transaction {
    fn from(tx: HardTransaction) -> Self {
        Self::Hard(tx)
    }
}

impl From<SoftTransaction> for Transaction {
    fn from(tx: SoftTransaction) -> Self {
        Self::Soft(tx)
    }
}

macro_rules! impl_from_variant {
    ($($ty:ident => $outer:ident :: $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for $outer {
                fn from(tx: $ty) -> Self {
                    Self::$variant(tx)
                }
            }

            impl From<$ty> for Transaction {
                fn from(tx: $ty) -> Self {
                    $outer::$variant(tx).into()
                }
            }
        )*
    };
}

impl_from_variant! {
    HardCreate => HardTransaction::Create,
    HardDeposit => HardTransaction::Deposit,
    HardWithdraw => HardTransaction::Withdraw,
    HardAddSigner => HardTransaction::AddSigner,
    SoftWithdrawal => SoftTransaction::Withdrawal,
    SoftCreate => SoftTransaction::Create,
    SoftTransfer => SoftTransaction::Transfer,
    SoftChangeSigner => SoftTransaction::ChangeSigner,
}

pub(crate) fn encode_with(tx_type: TxType, include_prefix: bool, write: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut writer = Writer::with_capacity(tx_type.byte_length() + 1);
    if include_prefix {
        writer.uint(u64::from(tx_type.prefix()), 1);
    }
    write(&mut writer);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, SignatureBytes};

    fn samples() -> Vec<Transaction> {
        let root = [9u8; 32];
        let signature = SignatureBytes::repeat_byte(0x5a);
        vec![
            HardCreate {
                hard_transaction_index: 1,
                account_index: 2,
                value: 300,
                account_address: Address::repeat_byte(1),
                initial_signing_key: Address::repeat_byte(2),
                intermediate_state_root: root,
            }
            .into(),
            HardDeposit {
                hard_transaction_index: 2,
                account_index: 0,
                value: 50,
                intermediate_state_root: root,
            }
            .into(),
            HardWithdraw {
                hard_transaction_index: (1 << 40) - 1,
                account_index: u32::MAX,
                caller_address: Address::repeat_byte(3),
                value: crate::types::MAX_VALUE,
                intermediate_state_root: root,
            }
            .into(),
            HardAddSigner {
                hard_transaction_index: 4,
                account_index: 5,
                caller_address: Address::repeat_byte(4),
                signing_address: Address::repeat_byte(5),
                intermediate_state_root: root,
            }
            .into(),
            SoftWithdrawal {
                account_index: 6,
                withdrawal_address: Address::repeat_byte(6),
                nonce: 7,
                value: 8,
                signature,
                intermediate_state_root: root,
            }
            .into(),
            SoftCreate {
                account_index: 1,
                to_account_index: 2,
                nonce: 3,
                value: 4,
                account_address: Address::repeat_byte(7),
                initial_signing_key: Address::repeat_byte(8),
                signature,
                intermediate_state_root: root,
            }
            .into(),
            SoftTransfer {
                account_index: 1,
                to_account_index: 3,
                nonce: crate::types::MAX_NONCE,
                value: 11,
                signature,
                intermediate_state_root: root,
            }
            .into(),
            SoftChangeSigner {
                account_index: 1,
                nonce: 2,
                signing_address: Address::repeat_byte(9),
                modification_category: 1,
                signature,
                intermediate_state_root: root,
            }
            .into(),
        ]
    }

    #[test]
    fn test_round_trip_every_variant() {
        for tx in samples() {
            let bytes = tx.encode(false);
            assert_eq!(bytes.len(), tx.byte_length(), "{:?}", tx.tx_type());
            assert_eq!(Transaction::decode_unprefixed(tx.tx_type(), &bytes).unwrap(), tx);

            let prefixed = tx.encode(true);
            assert_eq!(prefixed.len(), tx.byte_length() + 1);
            assert_eq!(prefixed[0], tx.tx_type().prefix());
            assert_eq!(Transaction::decode(&prefixed).unwrap(), tx);
        }
    }

    #[test]
    fn test_variant_widths() {
        let widths: Vec<_> = TxType::ALL.iter().map(|t| t.byte_length()).collect();
        assert_eq!(widths, vec![88, 48, 68, 81, 131, 155, 115, 125]);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Transaction::decode(&[]), Err(DecodeError::Empty));
        assert_eq!(Transaction::decode(&[8, 0, 0]), Err(DecodeError::UnknownTag(8)));
        assert_eq!(
            Transaction::decode(&[1, 0, 0]),
            Err(DecodeError::InvalidLength { expected: 48, actual: 2 })
        );
    }

    #[test]
    fn test_hard_soft_split() {
        assert!(TxType::HardAddSigner.is_hard());
        assert!(!TxType::SoftWithdrawal.is_hard());
    }
}
