// Copyright (c) 2024 Botho Foundation

//! The transfers consumer: one view-key family of accounts fed by one node.
//!
//! The consumer fans batch preprocessing out across worker threads, then
//! re-serializes the results into a single deterministic apply order, so the
//! per-account containers always observe transactions sorted by
//! `(height, position in block)` no matter how the workers were scheduled.
//!
//! Apart from [`on_new_blocks`](TransfersConsumer::on_new_blocks), whose
//! internal parallelism is self-contained, the consumer expects to be driven
//! from a single thread.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

use tracing::{debug, error, info};

use crate::{
    account::{PublicAddress, SynchronizationStart},
    error::ConsumerError,
    keys::{PublicKey, SecretKey},
    node::{request_global_indices, Node},
    observer::{ConsumerObserver, ObserverRegistry},
    scanner::find_owned_outputs,
    seen_keys::SeenKeysRegistry,
    subscription::TransfersSubscription,
    transaction::{
        CompleteBlock, TransactionBlockInfo, TransactionHash, TransactionReader,
        UNCONFIRMED_TRANSACTION_HEIGHT,
    },
    transfers::{build_transfers, TransferInfo},
};

/// Per-transaction result of preprocessing, before it is applied to any
/// subscription.
#[derive(Clone, Debug, Default)]
pub struct PreprocessInfo {
    /// Ledger-wide index of every output of the transaction; empty for
    /// unconfirmed transactions.
    pub global_indices: Vec<u32>,

    /// Built transfers per owning spend key.
    pub outputs: HashMap<[u8; 32], Vec<TransferInfo>>,
}

/// A queue item travelling from the enumeration stage to a worker.
struct WorkItem {
    block_info: TransactionBlockInfo,
    transaction: Arc<dyn TransactionReader>,
}

/// A preprocessed transaction waiting for serial application.
struct PreprocessedTransaction {
    block_info: TransactionBlockInfo,
    transaction: Arc<dyn TransactionReader>,
    info: PreprocessInfo,
}

/// The read-only slice of consumer state a preprocessing worker needs.
struct Preprocessor<'a, S, N> {
    node: &'a N,
    view_secret: &'a SecretKey,
    spend_keys: &'a HashSet<[u8; 32]>,
    subscriptions: &'a BTreeMap<[u8; 32], S>,
    seen_keys: &'a SeenKeysRegistry,
}

impl<S: TransfersSubscription, N: Node> Preprocessor<'_, S, N> {
    /// Scan one transaction and build transfers for every matched account.
    ///
    /// Pure with respect to subscription state; only the seen-keys registry
    /// and the returned value are written.
    fn preprocess(
        &self,
        block_info: &TransactionBlockInfo,
        tx: &dyn TransactionReader,
    ) -> Result<PreprocessInfo, ConsumerError> {
        let owned = find_owned_outputs(tx, self.view_secret, self.spend_keys);
        if owned.is_empty() {
            return Ok(PreprocessInfo::default());
        }

        let mut info = PreprocessInfo::default();

        if !block_info.is_unconfirmed() {
            let tx_hash = tx.transaction_hash();
            info.global_indices = request_global_indices(self.node, &tx_hash)?;
            if info.global_indices.len() < tx.output_count() {
                return Err(ConsumerError::GlobalIndexCountMismatch {
                    expected: tx.output_count(),
                    got: info.global_indices.len(),
                    transaction: hex::encode(tx_hash),
                });
            }
        }

        for (spend_key, output_indices) in &owned {
            if let Some(subscription) = self.subscriptions.get(spend_key) {
                let transfers = build_transfers(
                    subscription.keys(),
                    block_info,
                    tx,
                    output_indices,
                    &info.global_indices,
                    self.seen_keys,
                )?;
                info.outputs.insert(*spend_key, transfers);
            }
        }

        Ok(info)
    }
}

/// Scans announced blocks and pool updates for outputs owned by the
/// subscribed accounts of one view-key family.
pub struct TransfersConsumer<S, N> {
    node: N,
    view_secret: SecretKey,

    /// Subscriptions keyed by compressed spend public key. Ordered so the
    /// apply stage and enumeration walk accounts the same way on every run.
    subscriptions: BTreeMap<[u8; 32], S>,

    /// The spend keys of `subscriptions`, in the form the scanner consumes.
    spend_keys: HashSet<[u8; 32]>,

    sync_start: SynchronizationStart,
    pool_txs: HashSet<TransactionHash>,
    seen_keys: SeenKeysRegistry,
    observers: ObserverRegistry,
}

impl<S, N> TransfersConsumer<S, N>
where
    S: TransfersSubscription,
    N: Node,
{
    /// Create a consumer bound to `view_secret`, with no subscriptions.
    pub fn new(node: N, view_secret: SecretKey) -> Self {
        Self {
            node,
            view_secret,
            subscriptions: BTreeMap::new(),
            spend_keys: HashSet::new(),
            sync_start: SynchronizationStart::default(),
            pool_txs: HashSet::new(),
            seen_keys: SeenKeysRegistry::new(),
            observers: ObserverRegistry::new(),
        }
    }

    /// Register an observer for consumer events.
    pub fn add_observer(&mut self, observer: Arc<dyn ConsumerObserver>) {
        self.observers.add(observer);
    }

    /// Add a subscription, keyed by its spend public key.
    ///
    /// Idempotent: re-adding an already subscribed account returns the
    /// existing subscription untouched. Fails when the account's view secret
    /// is not the one this consumer is bound to.
    pub fn add_subscription(&mut self, subscription: S) -> Result<&mut S, ConsumerError> {
        if subscription.keys().view_secret_key() != &self.view_secret {
            return Err(ConsumerError::ViewSecretMismatch);
        }

        let spend_key = subscription.address().spend_public_key().to_bytes();

        if !self.subscriptions.contains_key(&spend_key) {
            debug!(
                "Adding subscription for {}",
                subscription.address().spend_public_key()
            );
            self.spend_keys.insert(spend_key);
            self.sync_start = self.sync_start.component_min(&subscription.sync_start());
            self.subscriptions.insert(spend_key, subscription);
        }

        Ok(self
            .subscriptions
            .get_mut(&spend_key)
            .expect("subscription just inserted"))
    }

    /// Remove a subscription. Returns whether the consumer is now empty.
    pub fn remove_subscription(&mut self, address: &PublicAddress) -> bool {
        let spend_key = address.spend_public_key().to_bytes();
        self.subscriptions.remove(&spend_key);
        self.spend_keys.remove(&spend_key);

        self.update_sync_start();

        self.subscriptions.is_empty()
    }

    /// Look up a subscription by address.
    pub fn subscription(&self, address: &PublicAddress) -> Option<&S> {
        self.subscriptions
            .get(&address.spend_public_key().to_bytes())
    }

    /// Look up a subscription by address, mutably.
    pub fn subscription_mut(&mut self, address: &PublicAddress) -> Option<&mut S> {
        self.subscriptions
            .get_mut(&address.spend_public_key().to_bytes())
    }

    /// Addresses of every current subscription.
    pub fn subscription_addresses(&self) -> Vec<PublicAddress> {
        self.subscriptions.values().map(|s| s.address()).collect()
    }

    /// The aggregate sync start: the component-wise minimum over all
    /// subscriptions, `(u64::MAX, u64::MAX)` when there are none.
    pub fn sync_start(&self) -> SynchronizationStart {
        self.sync_start
    }

    fn update_sync_start(&mut self) {
        let mut start = SynchronizationStart::default();
        for subscription in self.subscriptions.values() {
            start = start.component_min(&subscription.sync_start());
        }
        self.sync_start = start;
    }

    /// Re-seed the known pool set from every subscription's unconfirmed
    /// transactions, skipping `uncommitted` ones the wallet has not released.
    pub fn init_transaction_pool(&mut self, uncommitted: &HashSet<TransactionHash>) {
        for subscription in self.subscriptions.values() {
            for tx_hash in subscription.unconfirmed_transactions() {
                if !uncommitted.contains(&tx_hash) {
                    self.pool_txs.insert(tx_hash);
                }
            }
        }
    }

    /// Hashes of the pool transactions the consumer currently knows.
    pub fn known_pool_tx_ids(&self) -> &HashSet<TransactionHash> {
        &self.pool_txs
    }

    /// A chain reorganization removed all blocks above `height`.
    pub fn on_blockchain_detach(&mut self, height: u64) {
        info!("Blockchain detach at height {height}");
        self.observers.notify(|o| o.on_blockchain_detach(height));

        for subscription in self.subscriptions.values_mut() {
            subscription.on_blockchain_detach(height);
        }
    }

    /// Digest a contiguous run of blocks starting at `start_height`.
    ///
    /// Transactions are preprocessed in parallel, then applied to the
    /// subscriptions sorted by `(height, position in block)`. On any
    /// preprocessing error nothing is applied: every subscription is told
    /// via `on_error` and `false` is returned.
    pub fn on_new_blocks(&mut self, blocks: &[CompleteBlock], start_height: u64) -> bool
    where
        S: Sync,
        N: Sync,
    {
        assert!(!blocks.is_empty(), "on_new_blocks requires a non-empty batch");

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .max(2);

        let stop = AtomicBool::new(false);
        let accumulator: Mutex<Vec<PreprocessedTransaction>> = Mutex::new(Vec::new());
        let first_error: Mutex<Option<ConsumerError>> = Mutex::new(None);
        let sync_start = self.sync_start;
        let preprocessor = Preprocessor {
            node: &self.node,
            view_secret: &self.view_secret,
            spend_keys: &self.spend_keys,
            subscriptions: &self.subscriptions,
            seen_keys: &self.seen_keys,
        };

        let (work_sender, work_receiver) =
            crossbeam_channel::bounded::<WorkItem>(workers * 2);

        thread::scope(|scope| {
            let stop = &stop;
            let accumulator = &accumulator;
            let first_error = &first_error;
            let preprocessor = &preprocessor;

            for _ in 0..workers {
                let work_receiver = work_receiver.clone();
                scope.spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        let Ok(item) = work_receiver.recv() else {
                            break;
                        };
                        match preprocessor.preprocess(&item.block_info, item.transaction.as_ref())
                        {
                            Ok(info) => {
                                let preprocessed = PreprocessedTransaction {
                                    block_info: item.block_info,
                                    transaction: item.transaction,
                                    info,
                                };
                                accumulator
                                    .lock()
                                    .expect("accumulator mutex poisoned")
                                    .push(preprocessed);
                            }
                            Err(processing_error) => {
                                stop.store(true, Ordering::SeqCst);
                                first_error
                                    .lock()
                                    .expect("error mutex poisoned")
                                    .get_or_insert(processing_error);
                                break;
                            }
                        }
                    }
                });
            }
            drop(work_receiver);

            // Enumeration: walk blocks in order on this thread, feeding the
            // bounded queue. Once every worker has exited (stop flag), the
            // send fails and enumeration winds down.
            'enumeration: for (i, block) in blocks.iter().enumerate() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let Some(details) = &block.details else {
                    continue;
                };
                if sync_start.timestamp > 0 && details.timestamp < sync_start.timestamp {
                    continue;
                }

                let mut block_info = TransactionBlockInfo {
                    height: start_height + i as u64,
                    timestamp: details.timestamp,
                    transaction_index: 0,
                };

                for transaction in &block.transactions {
                    // Keyless transactions cannot pay us but still occupy a
                    // position in the block.
                    if transaction.transaction_public_key().is_some() {
                        let item = WorkItem {
                            block_info,
                            transaction: Arc::clone(transaction),
                        };
                        if work_sender.send(item).is_err() {
                            break 'enumeration;
                        }
                    }
                    block_info.transaction_index += 1;
                }
            }
            drop(work_sender);
        });

        if let Some(batch_error) = first_error.into_inner().expect("error mutex poisoned") {
            error!("Failed to process block batch starting at height {start_height}: {batch_error}");
            for subscription in self.subscriptions.values_mut() {
                subscription.on_error(&batch_error, start_height);
            }
            return false;
        }

        let block_hashes: Vec<TransactionHash> = blocks.iter().map(|b| b.hash).collect();
        self.observers.notify(|o| o.on_blocks_added(&block_hashes));

        let mut preprocessed = accumulator
            .into_inner()
            .expect("accumulator mutex poisoned");
        preprocessed
            .sort_by_key(|item| (item.block_info.height, item.block_info.transaction_index));

        for item in &preprocessed {
            self.apply_transaction(&item.block_info, item.transaction.as_ref(), &item.info);
        }

        let new_height = start_height + blocks.len() as u64 - 1;
        for subscription in self.subscriptions.values_mut() {
            subscription.advance_height(new_height);
        }

        debug!(
            "Processed {} blocks at height {start_height}, {} transactions matched",
            blocks.len(),
            preprocessed.iter().filter(|t| !t.info.outputs.is_empty()).count()
        );

        true
    }

    /// Digest a pool delta: `added` transactions entered the pool, `deleted`
    /// hashes left it.
    ///
    /// Additions are applied in caller order; the first failure aborts with
    /// `on_error` fanned out to every subscription. The failing transaction's
    /// hash remains in the known pool set, which downstream wallet recovery
    /// relies on.
    pub fn on_pool_updated(
        &mut self,
        added: &[Arc<dyn TransactionReader>],
        deleted: &[TransactionHash],
    ) -> Result<(), ConsumerError> {
        let unconfirmed = TransactionBlockInfo::unconfirmed();

        for transaction in added {
            self.pool_txs.insert(transaction.transaction_hash());
            if let Err(pool_error) = self.process_transaction(&unconfirmed, transaction.as_ref())
            {
                error!(
                    "Failed to process pool transaction {}: {pool_error}",
                    hex::encode(transaction.transaction_hash())
                );
                for subscription in self.subscriptions.values_mut() {
                    subscription.on_error(&pool_error, UNCONFIRMED_TRANSACTION_HEIGHT);
                }
                return Err(pool_error);
            }
        }

        for tx_hash in deleted {
            self.pool_txs.remove(tx_hash);
            self.observers.notify(|o| o.on_transaction_delete_begin(tx_hash));
            for subscription in self.subscriptions.values_mut() {
                subscription.delete_unconfirmed_transaction(tx_hash);
            }
            self.observers.notify(|o| o.on_transaction_delete_end(tx_hash));
        }

        Ok(())
    }

    /// Digest a single transaction entering the pool.
    pub fn add_unconfirmed_transaction(
        &mut self,
        transaction: &dyn TransactionReader,
    ) -> Result<(), ConsumerError> {
        self.process_transaction(&TransactionBlockInfo::unconfirmed(), transaction)
    }

    /// Drop a single unconfirmed transaction from every subscription.
    pub fn remove_unconfirmed_transaction(&mut self, tx_hash: &TransactionHash) {
        self.observers.notify(|o| o.on_transaction_delete_begin(tx_hash));
        for subscription in self.subscriptions.values_mut() {
            subscription.delete_unconfirmed_transaction(tx_hash);
        }
        self.observers.notify(|o| o.on_transaction_delete_end(tx_hash));
    }

    /// Tell every subscription that spending `tx_hash`'s outputs is safe.
    pub fn mark_transaction_safe(&mut self, tx_hash: &TransactionHash) {
        for subscription in self.subscriptions.values_mut() {
            subscription.mark_transaction_safe(tx_hash);
        }
    }

    /// Seed the duplicate-output-key registry from persisted wallet state.
    pub fn add_public_keys_seen(&self, tx_hash: &TransactionHash, output_key: &PublicKey) {
        self.seen_keys.insert(*tx_hash, output_key.to_bytes());
    }

    fn preprocessor(&self) -> Preprocessor<'_, S, N> {
        Preprocessor {
            node: &self.node,
            view_secret: &self.view_secret,
            spend_keys: &self.spend_keys,
            subscriptions: &self.subscriptions,
            seen_keys: &self.seen_keys,
        }
    }

    /// Preprocess and apply one transaction on the calling thread.
    fn process_transaction(
        &mut self,
        block_info: &TransactionBlockInfo,
        tx: &dyn TransactionReader,
    ) -> Result<(), ConsumerError> {
        let info = self.preprocessor().preprocess(block_info, tx)?;
        self.apply_transaction(block_info, tx, &info);
        Ok(())
    }

    /// Apply one preprocessed transaction to every subscription.
    ///
    /// A subscription that already holds the transaction as unconfirmed and
    /// now sees it confirmed takes the one-way pool-to-chain transition; one
    /// that already holds it at the same height is left alone.
    fn apply_transaction(
        &mut self,
        block_info: &TransactionBlockInfo,
        tx: &dyn TransactionReader,
        info: &PreprocessInfo,
    ) {
        let tx_hash = tx.transaction_hash();
        let no_transfers: Vec<TransferInfo> = Vec::new();
        let mut holders: Vec<PublicAddress> = Vec::new();
        let mut updated = false;

        for (spend_key, subscription) in self.subscriptions.iter_mut() {
            let transfers = info.outputs.get(spend_key).unwrap_or(&no_transfers);

            let contains = match subscription.transaction_information(&tx_hash) {
                Some(known) => {
                    if known.block_height == UNCONFIRMED_TRANSACTION_HEIGHT
                        && !block_info.is_unconfirmed()
                    {
                        subscription.mark_transaction_confirmed(
                            block_info,
                            &tx_hash,
                            &info.global_indices,
                        );
                        updated = true;
                    } else {
                        debug_assert_eq!(known.block_height, block_info.height);
                    }
                    true
                }
                None => {
                    let added = subscription.add_transaction(block_info, tx, transfers);
                    updated |= added;
                    added
                }
            };

            if contains {
                holders.push(subscription.address());
            }
        }

        if updated {
            self.observers
                .notify(|o| o.on_transaction_updated(&tx_hash, &holders));
        }
    }
}
