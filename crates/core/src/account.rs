//! Account leaves of the state tree

use accrollup_smt::Keccak256Hasher;
use serde::{Deserialize, Serialize};

use crate::codec::{Reader, Writer};
use crate::error::{DecodeError, TxError};
use crate::types::{Address, Amount, Hash, Nonce, ADDRESS_BYTES, NONCE_BYTES, VALUE_BYTES};

/// Length of an encoded account without its signers
const ACCOUNT_HEADER_BYTES: usize = ADDRESS_BYTES + NONCE_BYTES + VALUE_BYTES;

/// Account state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Address the account is registered under
    pub address: Address,
    /// Number of soft transactions applied so far
    pub nonce: Nonce,
    /// Current balance
    pub balance: Amount,
    /// Addresses allowed to sign soft transactions, in insertion order
    pub signers: Vec<Address>,
}

impl Account {
    /// Create a fresh account with a single signer
    pub fn new(address: Address, signer: Address, balance: Amount) -> Self {
        Self {
            address,
            nonce: 0,
            balance,
            signers: vec![signer],
        }
    }

    /// Whether `address` may sign for this account
    pub fn has_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Append a signer
    pub fn add_signer(&mut self, signer: Address) -> Result<(), TxError> {
        if self.has_signer(&signer) {
            return Err(TxError::SignerAlreadyExists(signer));
        }
        self.signers.push(signer);
        Ok(())
    }

    /// Remove a signer, keeping the order of the others
    pub fn remove_signer(&mut self, signer: &Address) -> Result<(), TxError> {
        let position = self
            .signers
            .iter()
            .position(|s| s == signer)
            .ok_or(TxError::SignerNotFound(*signer))?;
        if self.signers.len() == 1 {
            return Err(TxError::LastSigner);
        }
        self.signers.remove(position);
        Ok(())
    }

    /// Leaf encoding: `address ‖ nonce ‖ balance ‖ signers`
    pub fn encode(&self) -> Vec<u8> {
        let mut writer =
            Writer::with_capacity(ACCOUNT_HEADER_BYTES + ADDRESS_BYTES * self.signers.len());
        writer.address(&self.address);
        writer.uint(u64::from(self.nonce), NONCE_BYTES);
        writer.uint(self.balance, VALUE_BYTES);
        for signer in &self.signers {
            writer.address(signer);
        }
        writer.finish()
    }

    /// Decode a leaf encoding
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let signer_bytes = bytes
            .len()
            .checked_sub(ACCOUNT_HEADER_BYTES)
            .ok_or(DecodeError::InvalidAccountLength(bytes.len()))?;
        if signer_bytes == 0 || signer_bytes % ADDRESS_BYTES != 0 {
            return Err(DecodeError::InvalidAccountLength(bytes.len()));
        }

        let mut reader = Reader::new(bytes);
        let address = reader.address();
        let nonce = reader.uint(NONCE_BYTES) as Nonce;
        let balance = reader.uint(VALUE_BYTES);
        let signers = (0..signer_bytes / ADDRESS_BYTES).map(|_| reader.address()).collect();

        Ok(Self {
            address,
            nonce,
            balance,
            signers,
        })
    }

    /// Leaf hash committed in the state tree
    pub fn hash(&self) -> Hash {
        Keccak256Hasher::hash(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        let mut account = Account::new(Address::repeat_byte(1), Address::repeat_byte(2), 100);
        account.nonce = 7;
        account
    }

    #[test]
    fn test_encode_layout() {
        let account = account();
        let bytes = account.encode();
        assert_eq!(bytes.len(), 50);
        assert_eq!(&bytes[..20], Address::repeat_byte(1).as_slice());
        assert_eq!(&bytes[20..23], &[0, 0, 7]);
        assert_eq!(&bytes[23..30], &[0, 0, 0, 0, 0, 0, 100]);
        assert_eq!(Account::decode(&bytes).unwrap(), account);
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        assert_eq!(Account::decode(&[0u8; 30]), Err(DecodeError::InvalidAccountLength(30)));
        assert_eq!(Account::decode(&[0u8; 12]), Err(DecodeError::InvalidAccountLength(12)));
        assert_eq!(Account::decode(&[0u8; 51]), Err(DecodeError::InvalidAccountLength(51)));
    }

    #[test]
    fn test_signer_set() {
        let mut account = account();
        let third = Address::repeat_byte(3);

        assert_eq!(
            account.add_signer(Address::repeat_byte(2)),
            Err(TxError::SignerAlreadyExists(Address::repeat_byte(2)))
        );
        account.add_signer(third).unwrap();
        assert_eq!(account.signers, vec![Address::repeat_byte(2), third]);

        account.remove_signer(&Address::repeat_byte(2)).unwrap();
        assert_eq!(account.signers, vec![third]);
        assert_eq!(account.remove_signer(&third), Err(TxError::LastSigner));
        assert_eq!(
            account.remove_signer(&Address::repeat_byte(9)),
            Err(TxError::SignerNotFound(Address::repeat_byte(9)))
        );
    }
}
