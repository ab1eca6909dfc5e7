//! An in-memory [`ChainSource`] for tests.

use crate::{
    Block, BlockEvent, BlockHeader, ChainSource, DigestItem, HeadStream, SourceError, SourceResult,
};
use alloy_primitives::{B256, Bytes};
use async_trait::async_trait;
use futures::{StreamExt, channel::mpsc};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

/// A block held by the [`MockChainSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockBlock {
    /// The block header.
    pub header: BlockHeader,
    /// The block timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Events emitted by the block.
    pub events: Vec<BlockEvent>,
    /// Opaque extrinsics.
    pub extrinsics: Vec<Bytes>,
    /// The timestamp reported as decoded from the block's extrinsics.
    pub inherent_timestamp_ms: Option<u64>,
}

impl MockBlock {
    /// A block with no events and no extrinsics.
    pub const fn new(header: BlockHeader, timestamp_ms: u64) -> Self {
        Self {
            header,
            timestamp_ms,
            events: Vec::new(),
            extrinsics: Vec::new(),
            inherent_timestamp_ms: None,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    by_number: BTreeMap<u64, B256>,
    blocks: HashMap<B256, MockBlock>,
    tip: Option<u64>,
    events_unsupported: bool,
    failures: VecDeque<SourceError>,
    failing_methods: HashMap<&'static str, SourceError>,
    calls: HashMap<&'static str, usize>,
    queued_heads: VecDeque<SourceResult<BlockHeader>>,
    subscribers: Vec<mpsc::UnboundedSender<SourceResult<BlockHeader>>>,
}

/// A scripted chain held entirely in memory.
///
/// Blocks are addressable by number and hash, failures can be injected ahead of any call, and
/// new heads are pushed to subscribers with [`MockChainSource::announce`].
#[derive(Debug, Default)]
pub struct MockChainSource {
    state: Mutex<MockState>,
}

impl MockChainSource {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The deterministic hash used for block `number` by [`MockChainSource::linear`].
    pub fn hash_for(number: u64) -> B256 {
        B256::left_padding_from(&number.to_be_bytes())
    }

    /// Builds the header of block `number` in a linear chain.
    pub fn linear_header(number: u64) -> BlockHeader {
        BlockHeader::new(number, Self::hash_for(number), Self::hash_for(number.saturating_sub(1)))
    }

    /// A contiguous chain starting at `start`, one block per timestamp. The tip is the last
    /// block.
    pub fn linear(start: u64, timestamps: &[u64]) -> Self {
        let source = Self::new();
        for (offset, timestamp_ms) in timestamps.iter().enumerate() {
            let number = start + offset as u64;
            source.insert(MockBlock::new(Self::linear_header(number), *timestamp_ms));
        }
        source
    }

    /// Inserts (or replaces) a block and makes it canonical at its number.
    pub fn insert(&self, block: MockBlock) {
        let mut state = self.lock();
        let number = block.header.number;
        state.by_number.insert(number, block.header.hash);
        state.blocks.insert(block.header.hash, block);
        state.tip = state.tip.max(Some(number));
    }

    /// Returns the canonical block at `number`.
    pub fn block_at(&self, number: u64) -> Option<MockBlock> {
        let state = self.lock();
        state.by_number.get(&number).and_then(|hash| state.blocks.get(hash)).cloned()
    }

    /// Rewrites the parent hash of the canonical block at `number`.
    pub fn set_parent(&self, number: u64, parent_hash: B256) {
        self.modify(number, |block| block.header.parent_hash = parent_hash);
    }

    /// Sets the events of the canonical block at `number`.
    pub fn set_events(&self, number: u64, events: Vec<BlockEvent>) {
        self.modify(number, |block| block.events = events);
    }

    /// Sets the digest of the canonical block at `number`.
    pub fn set_digest(&self, number: u64, digest: Vec<DigestItem>) {
        self.modify(number, |block| block.header.digest = digest);
    }

    /// Sets the timestamp [`ChainSource::block`] reports as decoded from the extrinsics of the
    /// canonical block at `number`.
    pub fn set_inherent_timestamp(&self, number: u64, timestamp_ms: u64) {
        self.modify(number, |block| block.inherent_timestamp_ms = Some(timestamp_ms));
    }

    /// Overrides the tip reported by [`ChainSource::tip_header`].
    pub fn set_tip(&self, number: u64) {
        self.lock().tip = Some(number);
    }

    /// Makes [`ChainSource::events`] report that events cannot be decoded.
    pub fn disable_events(&self) {
        self.lock().events_unsupported = true;
    }

    /// Fails the next `count` calls, of any method, with `err`.
    pub fn fail_next(&self, count: usize, err: SourceError) {
        let mut state = self.lock();
        state.failures.extend(std::iter::repeat_n(err, count));
    }

    /// Fails every later call to `method` with `err`, after any failures queued by
    /// [`MockChainSource::fail_next`].
    pub fn fail_method(&self, method: &'static str, err: SourceError) {
        self.lock().failing_methods.insert(method, err);
    }

    /// Number of times `method` was called, including failed calls.
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or_default()
    }

    /// Number of live head subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Announces a new head to every subscriber, or queues it for the next subscription.
    pub fn announce(&self, head: SourceResult<BlockHeader>) {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        if state.subscribers.is_empty() {
            state.queued_heads.push_back(head);
            return;
        }
        for tx in &state.subscribers {
            let _ = tx.unbounded_send(head.clone());
        }
    }

    /// Ends every live head subscription.
    pub fn close_subscriptions(&self) {
        self.lock().subscribers.clear();
    }

    fn modify(&self, number: u64, f: impl FnOnce(&mut MockBlock)) {
        let mut state = self.lock();
        let hash = *state.by_number.get(&number).expect("no block at number");
        let mut block = state.blocks.remove(&hash).expect("no block with hash");
        f(&mut block);
        state.by_number.insert(number, block.header.hash);
        state.blocks.insert(block.header.hash, block);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Records a call to `method` and pops an injected failure, if any.
    fn enter(&self, method: &'static str) -> SourceResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        *state.calls.entry(method).or_default() += 1;
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        if let Some(err) = state.failing_methods.get(method).cloned() {
            return Err(err);
        }
        Ok(state)
    }

    fn lookup(state: &MockState, hash: B256) -> SourceResult<&MockBlock> {
        state.blocks.get(&hash).ok_or(SourceError::BlockHashNotFound(hash))
    }
}

#[async_trait]
impl ChainSource for MockChainSource {
    async fn tip_header(&self) -> SourceResult<BlockHeader> {
        let state = self.enter("tip_header")?;
        let tip = state.tip.ok_or(SourceError::BlockNumberNotFound(0))?;
        let hash = state.by_number.get(&tip).ok_or(SourceError::BlockNumberNotFound(tip))?;
        Ok(Self::lookup(&state, *hash)?.header.clone())
    }

    async fn block_hash(&self, number: u64) -> SourceResult<B256> {
        let state = self.enter("block_hash")?;
        state.by_number.get(&number).copied().ok_or(SourceError::BlockNumberNotFound(number))
    }

    async fn header(&self, hash: B256) -> SourceResult<BlockHeader> {
        let state = self.enter("header")?;
        Ok(Self::lookup(&state, hash)?.header.clone())
    }

    async fn block(&self, hash: B256) -> SourceResult<Block> {
        let state = self.enter("block")?;
        let block = Self::lookup(&state, hash)?;
        Ok(Block {
            header: block.header.clone(),
            extrinsics: block.extrinsics.clone(),
            inherent_timestamp_ms: block.inherent_timestamp_ms,
        })
    }

    async fn timestamp_ms(&self, hash: B256) -> SourceResult<u64> {
        let state = self.enter("timestamp_ms")?;
        Ok(Self::lookup(&state, hash)?.timestamp_ms)
    }

    async fn events(&self, hash: B256) -> SourceResult<Option<Vec<BlockEvent>>> {
        let state = self.enter("events")?;
        if state.events_unsupported {
            return Ok(None);
        }
        Ok(Some(Self::lookup(&state, hash)?.events.clone()))
    }

    async fn subscribe_new_heads(&self) -> SourceResult<HeadStream> {
        let mut state = self.enter("subscribe_new_heads")?;
        let (tx, rx) = mpsc::unbounded();
        while let Some(head) = state.queued_heads.pop_front() {
            let _ = tx.unbounded_send(head);
        }
        state.subscribers.push(tx);
        Ok(rx.boxed())
    }
}
