//! State machine: applies hard and soft transactions to a [`State`]

use tracing::{debug, warn};

use crate::account::Account;
use crate::block::{Block, BlockHeader, BlockTransactions, BLOCK_VERSION};
use crate::error::{ExecutionError, StateError, TxError};
use crate::state::State;
use crate::tx::{HardTransaction, ModificationCategory, SoftTransaction, Transaction};
use crate::types::{AccountIndex, Hash, MAX_VALUE};

/// What happened to one soft transaction handed to the state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoftOutcome {
    /// Applied; carries the state root right after it
    Included { intermediate_state_root: Hash },
    /// Dropped from the block
    Rejected(TxError),
}

impl SoftOutcome {
    /// Whether the transaction made it into the block
    pub const fn is_included(&self) -> bool {
        matches!(self, Self::Included { .. })
    }
}

/// Result of [`StateMachine::execute`]
#[derive(Clone, Debug, Default)]
pub struct Execution {
    /// Applied hard transactions with their intermediate roots
    pub hard: Vec<HardTransaction>,
    /// Applied soft transactions with their intermediate roots
    pub soft: Vec<SoftTransaction>,
    /// One entry per soft input, in input order
    pub outcomes: Vec<SoftOutcome>,
}

/// Input of [`StateMachine::execute_block`]
#[derive(Clone, Debug)]
pub struct BlockParams {
    /// Header of the block being extended
    pub parent: BlockHeader,
    /// Prefixed encodings of hard transactions, as read from the base chain
    pub hard_transactions: Vec<Vec<u8>>,
    /// Soft transactions in queue order
    pub soft_transactions: Vec<SoftTransaction>,
}

/// Result of [`StateMachine::execute_block`]
#[derive(Clone, Debug)]
pub struct BlockExecution {
    /// New, not yet submitted, block
    pub block: Block,
    /// One entry per soft input, in input order
    pub outcomes: Vec<SoftOutcome>,
}

/// Account writes produced by a valid soft transaction
enum Effect {
    Update(AccountIndex, Account),
    Create(Account),
}

/// State machine
#[derive(Debug, Default)]
pub struct StateMachine {
    state: State,
}

impl StateMachine {
    /// Create a state machine owning `state`
    pub fn new(state: State) -> Self {
        Self { state }
    }

    /// Current state
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Consume the machine, returning its state
    pub fn into_state(self) -> State {
        self.state
    }

    /// Build the block following `params.parent`.
    ///
    /// The owned state must be the parent's state. On error it is left
    /// untouched.
    pub fn execute_block(&mut self, params: BlockParams) -> Result<BlockExecution, ExecutionError> {
        let BlockParams { parent, hard_transactions, soft_transactions } = params;

        let root = self.state.root_hash();
        if root != parent.state_root {
            return Err(StateError::RootMismatch { expected: parent.state_root, actual: root }.into());
        }

        let hard = hard_transactions
            .iter()
            .map(|bytes| -> Result<HardTransaction, ExecutionError> {
                match Transaction::decode(bytes)? {
                    Transaction::Hard(tx) => Ok(tx),
                    Transaction::Soft(tx) => {
                        Err(ExecutionError::ExpectedHardTransaction(tx.tx_type().prefix()))
                    }
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let execution = self.execute(parent.hard_transactions_count, hard, soft_transactions)?;

        let mut transactions = BlockTransactions::default();
        let hard_count = execution.hard.len() as u64;
        for tx in execution.hard {
            transactions.push(tx.into());
        }
        for tx in execution.soft {
            transactions.push(tx.into());
        }

        let header = BlockHeader {
            version: BLOCK_VERSION,
            block_number: parent.block_number + 1,
            state_size: self.state.size(),
            state_root: self.state.root_hash(),
            hard_transactions_count: parent.hard_transactions_count + hard_count,
        };
        debug!(
            number = header.block_number,
            transactions = transactions.len(),
            "Block executed"
        );

        Ok(BlockExecution { block: Block::new(header, transactions), outcomes: execution.outcomes })
    }

    /// Apply hard transactions, which must be numbered consecutively from
    /// `next_hard_index`, then soft transactions.
    ///
    /// Soft transactions are applied in the order a block encodes them:
    /// grouped by type in tag order, keeping the input order within a type.
    /// Outcomes are reported in input order. Invalid soft transactions are
    /// skipped. Any other failure aborts and leaves the owned state untouched.
    pub fn execute(
        &mut self,
        next_hard_index: u64,
        hard: Vec<HardTransaction>,
        soft: Vec<SoftTransaction>,
    ) -> Result<Execution, ExecutionError> {
        let mut working = self.state.clone();
        let mut execution = Execution {
            hard: Vec::with_capacity(hard.len()),
            soft: Vec::with_capacity(soft.len()),
            outcomes: Vec::with_capacity(soft.len()),
        };

        for (offset, mut tx) in hard.into_iter().enumerate() {
            let expected = next_hard_index + offset as u64;
            if tx.hard_transaction_index() != expected {
                return Err(ExecutionError::HardTransactionGap {
                    expected,
                    found: tx.hard_transaction_index(),
                });
            }
            apply_hard(&mut working, &mut tx)?;
            tx.set_intermediate_state_root(working.root_hash());
            execution.hard.push(tx);
        }

        let mut ordered: Vec<_> = soft.into_iter().enumerate().collect();
        ordered.sort_by_key(|(_, tx)| tx.tx_type().prefix());
        let mut outcomes = vec![None; ordered.len()];

        for (position, mut tx) in ordered {
            match validate_soft(&working, &tx) {
                Ok(effects) => {
                    for effect in effects {
                        match effect {
                            Effect::Update(index, account) => working.update_account(index, account)?,
                            Effect::Create(account) => {
                                working.put_account(account)?;
                            }
                        }
                    }
                    let root = working.root_hash();
                    tx.set_intermediate_state_root(root);
                    execution.soft.push(tx);
                    outcomes[position] = Some(SoftOutcome::Included { intermediate_state_root: root });
                }
                Err(err) => {
                    warn!(account = tx.account_index(), nonce = tx.nonce(), %err, "Dropping soft transaction");
                    outcomes[position] = Some(SoftOutcome::Rejected(err));
                }
            }
        }
        execution.outcomes = outcomes.into_iter().flatten().collect();

        self.state = working;
        Ok(execution)
    }
}

fn apply_hard(state: &mut State, tx: &mut HardTransaction) -> Result<(), ExecutionError> {
    let position = tx.hard_transaction_index();
    let index = tx.account_index();
    let existing = |state: &State| {
        state.get_account(index).cloned().ok_or(ExecutionError::UnknownAccount {
            hard_transaction_index: position,
            account_index: index,
        })
    };

    match tx {
        HardTransaction::Create(create) => {
            let account =
                Account::new(create.account_address, create.initial_signing_key, create.value);
            create.account_index = state.put_account(account)?;
        }
        HardTransaction::Deposit(deposit) => {
            let mut account = existing(&*state)?;
            match account.balance.checked_add(deposit.value) {
                Some(balance) if balance <= MAX_VALUE => account.balance = balance,
                _ => {
                    warn!(position, account = index, "Deposit would overflow balance, skipping");
                    return Ok(());
                }
            }
            state.update_account(index, account)?;
        }
        HardTransaction::Withdraw(withdraw) => {
            let mut account = existing(&*state)?;
            if withdraw.value > account.balance {
                warn!(position, account = index, "Withdrawal exceeds balance, skipping");
                return Ok(());
            }
            account.balance -= withdraw.value;
            state.update_account(index, account)?;
        }
        HardTransaction::AddSigner(add) => {
            let mut account = existing(&*state)?;
            if account.add_signer(add.signing_address).is_err() {
                warn!(position, account = index, "Signer already present, skipping");
                return Ok(());
            }
            state.update_account(index, account)?;
        }
    }
    Ok(())
}

/// Check a soft transaction against `state` and compute its writes
fn validate_soft(state: &State, tx: &SoftTransaction) -> Result<Vec<Effect>, TxError> {
    let index = tx.account_index();
    let current = state.get_account(index);
    tx.check_valid(current, true)?;
    let Some(current) = current else {
        return Err(TxError::AccountNotFound(index));
    };

    let mut sender = current.clone();
    sender.nonce += 1;
    if let Some(value) = tx.value() {
        sender.balance -= value;
    }

    let effects = match tx {
        SoftTransaction::Withdrawal(_) => vec![Effect::Update(index, sender)],
        SoftTransaction::Transfer(transfer) if transfer.to_account_index == index => {
            sender.balance += transfer.value;
            vec![Effect::Update(index, sender)]
        }
        SoftTransaction::Transfer(transfer) => {
            let mut receiver = state
                .get_account(transfer.to_account_index)
                .cloned()
                .ok_or(TxError::AccountNotFound(transfer.to_account_index))?;
            receiver.balance = receiver
                .balance
                .checked_add(transfer.value)
                .filter(|balance| *balance <= MAX_VALUE)
                .ok_or(TxError::BalanceOverflow)?;
            vec![Effect::Update(index, sender), Effect::Update(transfer.to_account_index, receiver)]
        }
        SoftTransaction::Create(create) => {
            if u64::from(create.to_account_index) != state.size() {
                return Err(TxError::InvalidAccountIndex {
                    expected: state.size(),
                    actual: create.to_account_index,
                });
            }
            if state.get_account_index_by_address(&create.account_address).is_some() {
                return Err(TxError::AccountAlreadyExists(create.account_address));
            }
            if state.size() >= state.capacity() {
                return Err(TxError::StateFull);
            }
            let account = Account::new(create.account_address, create.initial_signing_key, create.value);
            vec![Effect::Update(index, sender), Effect::Create(account)]
        }
        SoftTransaction::ChangeSigner(change) => {
            match ModificationCategory::try_from(change.modification_category)? {
                ModificationCategory::Add => sender.add_signer(change.signing_address)?,
                ModificationCategory::Remove => sender.remove_signer(&change.signing_address)?,
            }
            vec![Effect::Update(index, sender)]
        }
    };
    Ok(effects)
}
