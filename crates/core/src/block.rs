//! Blocks, their transactions and base-chain commitments

use accrollup_smt::{list_proof, list_root, Keccak256Hasher, MerkleProof};
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

use crate::codec::{Reader, Writer};
use crate::error::DecodeError;
use crate::state::State;
use crate::tx::{
    encode_with, HardAddSigner, HardCreate, HardDeposit, HardTransaction, HardWithdraw,
    SoftChangeSigner, SoftCreate, SoftTransaction, SoftTransfer, SoftWithdrawal, Transaction,
    TxType,
};
use crate::types::{BlockNumber, Hash, HARD_TX_INDEX_BYTES};

/// Current block format version
pub const BLOCK_VERSION: u16 = 0;

/// Width of the per-type count prefix of the transactions data
pub const TRANSACTIONS_METADATA_BYTES: usize = 2 * TxType::ALL.len();

const STATE_SIZE_BYTES: usize = 5;

/// Reference to a stored block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockId {
    /// By block hash
    Hash(Hash),
    /// By block number
    Number(BlockNumber),
}

/// Block header
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block format version
    pub version: u16,
    /// Height, genesis is 0
    pub block_number: BlockNumber,
    /// Number of accounts after the block
    pub state_size: u64,
    /// Account tree root after the block
    pub state_root: Hash,
    /// Hard transactions applied up to and including this block
    pub hard_transactions_count: u64,
}

impl BlockHeader {
    /// Encoded length
    pub const BYTES: usize = 2 + 4 + STATE_SIZE_BYTES + 32 + HARD_TX_INDEX_BYTES;

    /// `version ‖ blockNumber ‖ stateSize ‖ stateRoot ‖ hardTransactionsCount`
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(Self::BYTES);
        writer.uint(u64::from(self.version), 2);
        writer.uint(u64::from(self.block_number), 4);
        writer.uint(self.state_size, STATE_SIZE_BYTES);
        writer.hash(&self.state_root);
        writer.uint(self.hard_transactions_count, HARD_TX_INDEX_BYTES);
        writer.finish()
    }
}

/// What the base chain stores for a submitted block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCommitment {
    /// List root over the prefixed transaction encodings
    pub transactions_root: Hash,
    /// keccak256 of the transactions data
    pub transactions_hash: Hash,
    /// Length of the transactions data
    pub transactions_size: u32,
    /// Base-chain block number at submission
    pub submitted_at: u64,
}

impl BlockCommitment {
    /// Encoded length
    pub const BYTES: usize = 32 + 32 + 4 + 8;

    /// `transactionsRoot ‖ transactionsHash ‖ transactionsSize ‖ submittedAt`
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(Self::BYTES);
        writer.hash(&self.transactions_root);
        writer.hash(&self.transactions_hash);
        writer.uint(u64::from(self.transactions_size), 4);
        writer.uint(self.submitted_at, 8);
        writer.finish()
    }
}

/// Transactions of a block grouped by type, in canonical tag order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransactions {
    /// Tag 0
    pub hard_creates: Vec<HardCreate>,
    /// Tag 1
    pub hard_deposits: Vec<HardDeposit>,
    /// Tag 2
    pub hard_withdrawals: Vec<HardWithdraw>,
    /// Tag 3
    pub hard_add_signers: Vec<HardAddSigner>,
    /// Tag 4
    pub soft_withdrawals: Vec<SoftWithdrawal>,
    /// Tag 5
    pub soft_creates: Vec<SoftCreate>,
    /// Tag 6
    pub soft_transfers: Vec<SoftTransfer>,
    /// Tag 7
    pub soft_change_signers: Vec<SoftChangeSigner>,
}

impl BlockTransactions {
    /// Append to the list matching the transaction's type
    pub fn push(&mut self, tx: Transaction) {
        match tx {
            Transaction::Hard(HardTransaction::Create(tx)) => self.hard_creates.push(tx),
            Transaction::Hard(HardTransaction::Deposit(tx)) => self.hard_deposits.push(tx),
            Transaction::Hard(HardTransaction::Withdraw(tx)) => self.hard_withdrawals.push(tx),
            Transaction::Hard(HardTransaction::AddSigner(tx)) => self.hard_add_signers.push(tx),
            Transaction::Soft(SoftTransaction::Withdrawal(tx)) => self.soft_withdrawals.push(tx),
            Transaction::Soft(SoftTransaction::Create(tx)) => self.soft_creates.push(tx),
            Transaction::Soft(SoftTransaction::Transfer(tx)) => self.soft_transfers.push(tx),
            Transaction::Soft(SoftTransaction::ChangeSigner(tx)) => {
                self.soft_change_signers.push(tx)
            }
        }
    }

    /// Per-type counts in tag order
    pub fn counts(&self) -> [usize; 8] {
        [
            self.hard_creates.len(),
            self.hard_deposits.len(),
            self.hard_withdrawals.len(),
            self.hard_add_signers.len(),
            self.soft_withdrawals.len(),
            self.soft_creates.len(),
            self.soft_transfers.len(),
            self.soft_change_signers.len(),
        ]
    }

    /// Total number of transactions
    pub fn len(&self) -> usize {
        self.counts().iter().sum()
    }

    /// Whether the block carries no transactions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of hard transactions
    pub fn hard_len(&self) -> usize {
        self.counts()[..4].iter().sum()
    }

    /// Every transaction in canonical order, the order they are applied in
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.hard_creates.iter().cloned().map(Transaction::from));
        out.extend(self.hard_deposits.iter().cloned().map(Transaction::from));
        out.extend(self.hard_withdrawals.iter().cloned().map(Transaction::from));
        out.extend(self.hard_add_signers.iter().cloned().map(Transaction::from));
        out.extend(self.soft_withdrawals.iter().cloned().map(Transaction::from));
        out.extend(self.soft_creates.iter().cloned().map(Transaction::from));
        out.extend(self.soft_transfers.iter().cloned().map(Transaction::from));
        out.extend(self.soft_change_signers.iter().cloned().map(Transaction::from));
        out
    }

    /// Encodings of every transaction in canonical order
    fn encode_each(&self, include_prefix: bool) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len());
        macro_rules! encode_list {
            ($($list:ident => $tx_type:ident),*) => {
                $(
                    for tx in &self.$list {
                        out.push(encode_with(TxType::$tx_type, include_prefix, |w| tx.write(w)));
                    }
                )*
            };
        }
        encode_list!(
            hard_creates => HardCreate,
            hard_deposits => HardDeposit,
            hard_withdrawals => HardWithdraw,
            hard_add_signers => HardAddSigner,
            soft_withdrawals => SoftWithdrawal,
            soft_creates => SoftCreate,
            soft_transfers => SoftTransfer,
            soft_change_signers => SoftChangeSigner
        );
        out
    }

    /// Eight big-endian `u16` counts, then every unprefixed encoding.
    ///
    /// Lists longer than `u16::MAX` cannot be represented; block production
    /// caps its batches below that.
    pub fn transactions_data(&self) -> Vec<u8> {
        let encoded = self.encode_each(false);
        let size = TRANSACTIONS_METADATA_BYTES + encoded.iter().map(Vec::len).sum::<usize>();

        let mut writer = Writer::with_capacity(size);
        for count in self.counts() {
            writer.uint(count as u64, 2);
        }
        for tx in &encoded {
            writer.bytes(tx);
        }
        writer.finish()
    }

    /// Parse the output of [`Self::transactions_data`]
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < TRANSACTIONS_METADATA_BYTES {
            return Err(DecodeError::TruncatedData);
        }

        let mut reader = Reader::new(data);
        let counts: Vec<u64> = TxType::ALL.iter().map(|_| reader.uint(2)).collect();

        let mut transactions = Self::default();
        for (tx_type, count) in TxType::ALL.into_iter().zip(counts) {
            let width = tx_type.byte_length();
            for _ in 0..count {
                if reader.remaining() < width {
                    return Err(DecodeError::TruncatedData);
                }
                transactions.push(Transaction::decode_unprefixed(tx_type, reader.rest(width))?);
            }
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::InvalidLength {
                expected: data.len() - reader.remaining(),
                actual: data.len(),
            });
        }
        Ok(transactions)
    }

    /// List root over the prefixed encodings
    pub fn transactions_root(&self) -> Hash {
        list_root(&self.encode_each(true))
    }

    /// Inclusion proof of the `position`-th transaction in canonical order
    pub fn transaction_proof(&self, position: usize) -> Option<MerkleProof> {
        list_proof(&self.encode_each(true), position)
    }
}

/// Block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Header
    pub header: BlockHeader,
    /// Transactions in canonical order
    pub transactions: BlockTransactions,
    /// Set once the block has been submitted
    pub commitment: Option<BlockCommitment>,
}

impl Block {
    /// Unsubmitted block
    pub fn new(header: BlockHeader, transactions: BlockTransactions) -> Self {
        Self { header, transactions, commitment: None }
    }

    /// Block 0 over `state`, with no transactions
    pub fn genesis(state: &State) -> Self {
        let header = BlockHeader {
            version: BLOCK_VERSION,
            block_number: 0,
            state_size: state.size(),
            state_root: state.root_hash(),
            hard_transactions_count: 0,
        };
        Self::new(header, BlockTransactions::default())
    }

    /// Block number
    pub const fn number(&self) -> BlockNumber {
        self.header.block_number
    }

    /// See [`BlockTransactions::transactions_data`]
    pub fn transactions_data(&self) -> Vec<u8> {
        self.transactions.transactions_data()
    }

    /// See [`BlockTransactions::transactions_root`]
    pub fn transactions_root(&self) -> Hash {
        self.transactions.transactions_root()
    }

    /// Commitment this block would have if submitted at `submitted_at`
    pub fn commitment_at(&self, submitted_at: u64) -> BlockCommitment {
        let data = self.transactions_data();
        BlockCommitment {
            transactions_root: self.transactions_root(),
            transactions_hash: Keccak256Hasher::hash(&data),
            transactions_size: data.len() as u32,
            submitted_at,
        }
    }

    /// Record submission at base-chain block `submitted_at`
    pub fn commit(&mut self, submitted_at: u64) {
        self.commitment = Some(self.commitment_at(submitted_at));
    }

    /// Base-chain block number at submission, if submitted
    pub const fn submitted_at(&self) -> Option<u64> {
        match &self.commitment {
            Some(commitment) => Some(commitment.submitted_at),
            None => None,
        }
    }

    /// `keccak256(header ‖ commitment)`; unsubmitted blocks hash with `submitted_at = 0`
    pub fn hash(&self) -> Hash {
        let commitment = self.commitment.unwrap_or_else(|| self.commitment_at(0));

        let mut hasher = Keccak::v256();
        hasher.update(&self.header.encode());
        hasher.update(&commitment.encode());

        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Whether confirming the block releases funds on the base chain
    pub fn has_withdrawals(&self) -> bool {
        !self.transactions.hard_withdrawals.is_empty()
            || !self.transactions.soft_withdrawals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, SignatureBytes};

    fn transactions() -> BlockTransactions {
        let mut txs = BlockTransactions::default();
        txs.push(
            SoftWithdrawal {
                account_index: 0,
                withdrawal_address: Address::repeat_byte(1),
                nonce: 0,
                value: 5,
                signature: SignatureBytes::repeat_byte(2),
                intermediate_state_root: [3u8; 32],
            }
            .into(),
        );
        txs.push(
            HardDeposit {
                hard_transaction_index: 1,
                account_index: 0,
                value: 10,
                intermediate_state_root: [4u8; 32],
            }
            .into(),
        );
        txs.push(
            HardCreate {
                hard_transaction_index: 0,
                account_index: 0,
                value: 10,
                account_address: Address::repeat_byte(5),
                initial_signing_key: Address::repeat_byte(6),
                intermediate_state_root: [7u8; 32],
            }
            .into(),
        );
        txs
    }

    #[test]
    fn test_header_encoding() {
        let header = BlockHeader {
            version: 1,
            block_number: 2,
            state_size: 1 << 32,
            state_root: [9u8; 32],
            hard_transactions_count: 3,
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[..6], &[0, 1, 0, 0, 0, 2]);
        assert_eq!(&bytes[6..11], &[1, 0, 0, 0, 0]);
        assert_eq!(&bytes[11..43], &[9u8; 32]);
        assert_eq!(&bytes[43..], &[0, 0, 0, 0, 3]);
    }

    #[test]
    fn test_transactions_data_layout() {
        let txs = transactions();
        assert_eq!(txs.counts(), [1, 1, 0, 0, 1, 0, 0, 0]);
        assert_eq!(txs.hard_len(), 2);
        let tags: Vec<_> = txs.transactions().iter().map(|tx| tx.tx_type().prefix()).collect();
        assert_eq!(tags, vec![0, 1, 4]);

        let data = txs.transactions_data();
        assert_eq!(data.len(), 16 + 88 + 48 + 131);
        assert_eq!(&data[..16], &[0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
        // Creates come first whatever the push order
        assert_eq!(&data[16..21], &[0, 0, 0, 0, 0]);

        assert_eq!(BlockTransactions::decode(&data).unwrap(), txs);
        assert_eq!(BlockTransactions::decode(&data[..20]), Err(DecodeError::TruncatedData));
        assert_eq!(BlockTransactions::decode(&[0u8; 4]), Err(DecodeError::TruncatedData));

        let mut padded = data.clone();
        padded.push(0);
        assert!(matches!(
            BlockTransactions::decode(&padded),
            Err(DecodeError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_transactions_root_and_proofs() {
        let txs = transactions();
        assert_eq!(BlockTransactions::default().transactions_root(), [0u8; 32]);

        let root = txs.transactions_root();
        for position in 0..txs.len() {
            assert!(txs.transaction_proof(position).unwrap().verify(&root));
        }
        assert!(txs.transaction_proof(txs.len()).is_none());
    }

    #[test]
    fn test_commit_changes_hash() {
        let mut block = Block::new(BlockHeader { block_number: 1, ..Default::default() }, transactions());
        let unsubmitted = block.hash();
        assert_eq!(block.submitted_at(), None);

        block.commit(0);
        assert_eq!(block.hash(), unsubmitted);

        block.commit(12);
        let commitment = block.commitment.unwrap();
        assert_eq!(block.submitted_at(), Some(12));
        assert_eq!(commitment.transactions_size as usize, block.transactions_data().len());
        assert_eq!(commitment.transactions_hash, Keccak256Hasher::hash(&block.transactions_data()));
        assert_ne!(block.hash(), unsubmitted);
    }

    #[test]
    fn test_genesis() {
        let state = State::new(4);
        let genesis = Block::genesis(&state);
        assert_eq!(genesis.number(), 0);
        assert_eq!(genesis.header.state_root, state.root_hash());
        assert!(genesis.transactions.is_empty());
        assert!(!genesis.has_withdrawals());
        assert!(Block::new(BlockHeader::default(), transactions()).has_withdrawals());
    }
}
