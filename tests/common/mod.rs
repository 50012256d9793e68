// Copyright (c) 2024 Botho Foundation

//! Shared fixtures for consumer integration tests: an in-memory transaction
//! type with sender-side output derivation, a scriptable node and a
//! subscription that records every call the consumer makes.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use rand::{rngs::StdRng, Rng};

use botho_transfers::{
    onetime_keys::{derive_public_key, generate_key_derivation},
    transaction::{KeyOutput, OutputTarget},
    AccountKeys, CompleteBlock, ConsumerError, GlobalIndicesCallback, Node, NodeError,
    PublicKey, SecretKey, SynchronizationStart, TransactionBlockInfo, TransactionHash,
    TransactionInformation, TransactionOutput, TransactionReader, TransferInfo,
    TransfersSubscription, UNCONFIRMED_TRANSACTION_HEIGHT,
};
use botho_transfers::transaction::BlockDetails;

/// An owned, in-memory transaction.
pub struct TestTransaction {
    pub hash: TransactionHash,
    pub public_key: Option<PublicKey>,
    pub outputs: Vec<TransactionOutput>,
}

impl TransactionReader for TestTransaction {
    fn transaction_public_key(&self) -> Option<PublicKey> {
        self.public_key
    }

    fn transaction_hash(&self) -> TransactionHash {
        self.hash
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn output(&self, index: usize) -> Option<&TransactionOutput> {
        self.outputs.get(index)
    }
}

/// Builds transactions the way a paying wallet would, tracking the running
/// key index across addressable output slots.
pub struct TransactionFixture {
    tx_secret: SecretKey,
    hash: TransactionHash,
    outputs: Vec<TransactionOutput>,
    key_index: u64,
}

impl TransactionFixture {
    pub fn new(rng: &mut StdRng) -> Self {
        Self {
            tx_secret: SecretKey::from_random(rng),
            hash: rng.gen(),
            outputs: Vec::new(),
            key_index: 0,
        }
    }

    pub fn with_hash(mut self, hash: TransactionHash) -> Self {
        self.hash = hash;
        self
    }

    /// Re-use another transaction's key material. Two fixtures sharing a
    /// secret derive identical output keys for identical recipients and
    /// slots, which is how duplicate-output-key ledgers are staged.
    pub fn with_tx_secret(mut self, tx_secret: &SecretKey) -> Self {
        self.tx_secret = tx_secret.clone();
        self
    }

    pub fn tx_secret(&self) -> &SecretKey {
        &self.tx_secret
    }

    /// Add a key output paying `account`. Returns the output index.
    pub fn pay(&mut self, account: &AccountKeys, amount: u64) -> u32 {
        let derivation =
            generate_key_derivation(account.address().view_public_key(), &self.tx_secret)
                .expect("non-degenerate view key");
        let key = derive_public_key(
            &derivation,
            self.key_index,
            account.address().spend_public_key(),
        );
        self.key_index += 1;
        self.outputs.push(TransactionOutput {
            amount,
            target: OutputTarget::Key(KeyOutput { key }),
        });
        (self.outputs.len() - 1) as u32
    }

    /// Add a key output paying a fresh random account.
    pub fn pay_stranger(&mut self, rng: &mut StdRng, amount: u64) -> u32 {
        let stranger = AccountKeys::random(rng);
        self.pay(&stranger, amount)
    }

    pub fn build(self) -> Arc<TestTransaction> {
        Arc::new(TestTransaction {
            hash: self.hash,
            public_key: Some(self.tx_secret.public_key()),
            outputs: self.outputs,
        })
    }
}

/// Assemble a fetched block from its parts.
pub fn block(
    hash_byte: u8,
    timestamp: u64,
    transactions: Vec<Arc<dyn TransactionReader>>,
) -> CompleteBlock {
    CompleteBlock {
        hash: [hash_byte; 32],
        details: Some(BlockDetails { timestamp }),
        transactions,
    }
}

/// Erase a concrete transaction to the trait object blocks carry.
pub fn tx_obj(tx: Arc<TestTransaction>) -> Arc<dyn TransactionReader> {
    tx
}

/// A node answering global-index lookups from a script.
#[derive(Clone, Default)]
pub struct MockNode {
    inner: Arc<MockNodeState>,
}

#[derive(Default)]
struct MockNodeState {
    responses: Mutex<HashMap<TransactionHash, Result<Vec<u32>, NodeError>>>,
    calls: AtomicUsize,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_indices(&self, tx_hash: TransactionHash, indices: Vec<u32>) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .insert(tx_hash, Ok(indices));
    }

    pub fn script_failure(&self, tx_hash: TransactionHash, error: NodeError) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .insert(tx_hash, Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl Node for MockNode {
    fn transaction_output_global_indices(
        &self,
        tx_hash: &TransactionHash,
        callback: GlobalIndicesCallback,
    ) {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .inner
            .responses
            .lock()
            .unwrap()
            .get(tx_hash)
            .cloned()
            .unwrap_or_else(|| Err(NodeError::RequestFailed("unscripted transaction".into())));
        callback(response);
    }
}

/// Everything a [`RecordingSubscription`] was told, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum SubscriptionEvent {
    TransactionAdded {
        height: u64,
        tx_hash: TransactionHash,
        transfers: Vec<TransferInfo>,
    },
    TransactionConfirmed {
        height: u64,
        tx_hash: TransactionHash,
        global_indices: Vec<u32>,
    },
    TransactionDeleted(TransactionHash),
    MarkedSafe(TransactionHash),
    Error {
        height: u64,
        message: String,
    },
    Detached(u64),
    HeightAdvanced(u64),
}

#[derive(Default)]
pub struct SubscriptionState {
    pub events: Vec<SubscriptionEvent>,
    pub container: HashMap<TransactionHash, TransactionInformation>,
}

impl SubscriptionState {
    /// The `TransactionAdded` events, in order.
    pub fn added(&self) -> Vec<SubscriptionEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, SubscriptionEvent::TransactionAdded { .. }))
            .cloned()
            .collect()
    }

    /// Hashes of `TransactionAdded` events, in order.
    pub fn added_hashes(&self) -> Vec<TransactionHash> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SubscriptionEvent::TransactionAdded { tx_hash, .. } => Some(*tx_hash),
                _ => None,
            })
            .collect()
    }
}

/// A subscription that records every call and keeps a minimal container.
pub struct RecordingSubscription {
    keys: AccountKeys,
    sync_start: SynchronizationStart,
    state: Arc<Mutex<SubscriptionState>>,
}

impl RecordingSubscription {
    /// Returns the subscription and a handle onto its state that stays
    /// usable after the subscription moves into a consumer.
    pub fn new(
        keys: AccountKeys,
        sync_start: SynchronizationStart,
    ) -> (Self, Arc<Mutex<SubscriptionState>>) {
        let state = Arc::new(Mutex::new(SubscriptionState::default()));
        (
            Self {
                keys,
                sync_start,
                state: state.clone(),
            },
            state,
        )
    }
}

impl TransfersSubscription for RecordingSubscription {
    fn sync_start(&self) -> SynchronizationStart {
        self.sync_start
    }

    fn keys(&self) -> &AccountKeys {
        &self.keys
    }

    fn transaction_information(&self, tx_hash: &TransactionHash) -> Option<TransactionInformation> {
        self.state.lock().unwrap().container.get(tx_hash).copied()
    }

    fn unconfirmed_transactions(&self) -> Vec<TransactionHash> {
        self.state
            .lock()
            .unwrap()
            .container
            .iter()
            .filter(|(_, info)| info.block_height == UNCONFIRMED_TRANSACTION_HEIGHT)
            .map(|(hash, _)| *hash)
            .collect()
    }

    fn on_blockchain_detach(&mut self, height: u64) {
        let mut state = self.state.lock().unwrap();
        state.container.retain(|_, info| {
            info.block_height <= height
                || info.block_height == UNCONFIRMED_TRANSACTION_HEIGHT
        });
        state.events.push(SubscriptionEvent::Detached(height));
    }

    fn on_error(&mut self, error: &ConsumerError, height: u64) {
        self.state.lock().unwrap().events.push(SubscriptionEvent::Error {
            height,
            message: error.to_string(),
        });
    }

    fn add_transaction(
        &mut self,
        block_info: &TransactionBlockInfo,
        tx: &dyn TransactionReader,
        transfers: &[TransferInfo],
    ) -> bool {
        if transfers.is_empty() {
            return false;
        }

        let mut state = self.state.lock().unwrap();
        state.container.insert(
            tx.transaction_hash(),
            TransactionInformation {
                block_height: block_info.height,
                timestamp: block_info.timestamp,
            },
        );
        state.events.push(SubscriptionEvent::TransactionAdded {
            height: block_info.height,
            tx_hash: tx.transaction_hash(),
            transfers: transfers.to_vec(),
        });
        true
    }

    fn mark_transaction_confirmed(
        &mut self,
        block_info: &TransactionBlockInfo,
        tx_hash: &TransactionHash,
        global_indices: &[u32],
    ) {
        let mut state = self.state.lock().unwrap();
        state.container.insert(
            *tx_hash,
            TransactionInformation {
                block_height: block_info.height,
                timestamp: block_info.timestamp,
            },
        );
        state.events.push(SubscriptionEvent::TransactionConfirmed {
            height: block_info.height,
            tx_hash: *tx_hash,
            global_indices: global_indices.to_vec(),
        });
    }

    fn mark_transaction_safe(&mut self, tx_hash: &TransactionHash) {
        self.state
            .lock()
            .unwrap()
            .events
            .push(SubscriptionEvent::MarkedSafe(*tx_hash));
    }

    fn delete_unconfirmed_transaction(&mut self, tx_hash: &TransactionHash) {
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.container.get(tx_hash) {
            if info.block_height == UNCONFIRMED_TRANSACTION_HEIGHT {
                state.container.remove(tx_hash);
            }
        }
        state
            .events
            .push(SubscriptionEvent::TransactionDeleted(*tx_hash));
    }

    fn advance_height(&mut self, height: u64) {
        self.state
            .lock()
            .unwrap()
            .events
            .push(SubscriptionEvent::HeightAdvanced(height));
    }
}

/// Everything an observer saw, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum ObserverEvent {
    BlocksAdded(Vec<TransactionHash>),
    BlockchainDetach(u64),
    TransactionUpdated {
        tx_hash: TransactionHash,
        holders: Vec<botho_transfers::PublicAddress>,
    },
    DeleteBegin(TransactionHash),
    DeleteEnd(TransactionHash),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl botho_transfers::ConsumerObserver for RecordingObserver {
    fn on_blocks_added(&self, block_hashes: &[TransactionHash]) {
        self.events
            .lock()
            .unwrap()
            .push(ObserverEvent::BlocksAdded(block_hashes.to_vec()));
    }

    fn on_blockchain_detach(&self, height: u64) {
        self.events
            .lock()
            .unwrap()
            .push(ObserverEvent::BlockchainDetach(height));
    }

    fn on_transaction_updated(
        &self,
        tx_hash: &TransactionHash,
        holders: &[botho_transfers::PublicAddress],
    ) {
        self.events.lock().unwrap().push(ObserverEvent::TransactionUpdated {
            tx_hash: *tx_hash,
            holders: holders.to_vec(),
        });
    }

    fn on_transaction_delete_begin(&self, tx_hash: &TransactionHash) {
        self.events
            .lock()
            .unwrap()
            .push(ObserverEvent::DeleteBegin(*tx_hash));
    }

    fn on_transaction_delete_end(&self, tx_hash: &TransactionHash) {
        self.events
            .lock()
            .unwrap()
            .push(ObserverEvent::DeleteEnd(*tx_hash));
    }
}
