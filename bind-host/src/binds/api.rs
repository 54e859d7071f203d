use super::{
    engine::{Bind, BindReport},
    receipts::Receipt,
};
use log::*;
use pdu_sequence::{
    split, InvalidSequenceNumber, RangeTag, SequenceNumber, TagAllocator, ValidationPolicy,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// All open binds of this process, keyed by the range tag of their sequence numbers.
pub struct BindPool {
    policy: ValidationPolicy,
    tags: TagAllocator,
    binds: RwLock<FxHashMap<RangeTag, Arc<Bind>>>,
    receipts: broadcast::Sender<Receipt>,
}

impl BindPool {
    /// Create an empty pool, checking initial sequence numbers with `policy`.
    pub fn new(policy: ValidationPolicy) -> Self {
        let mut binds = FxHashMap::default();
        binds.reserve(pdu_sequence::RANGE_TAGS as usize);

        Self {
            policy,
            tags: TagAllocator::new(),
            binds: RwLock::new(binds),
            receipts: broadcast::channel(1000).0,
        }
    }

    /// Open a new bind, its sequence starting at `initial_value` or `DEFAULT_VALUE`.
    ///
    /// Once more than 16 binds were opened tags are reused, the new bind then takes over the
    /// responses of the older one with the same tag.
    pub async fn open(&self, initial_value: Option<u32>) -> Result<Arc<Bind>, BindError> {
        let sequence = match initial_value {
            Some(value) => SequenceNumber::with_initial_value(&self.tags, value, self.policy)?,
            None => SequenceNumber::new(&self.tags),
        };

        let tag = sequence.range_tag();
        let bind = Arc::new(Bind::new(sequence));

        // Hold the write lock to the binds as short as possible.
        let replaced = self.binds.write().await.insert(tag, bind.clone());

        if replaced.is_some() {
            warn!("{tag}: Range tag reused by a new bind, responses can no longer be told apart");
        }

        debug!("{tag}: Bind open, next sequence number {:#010x}", bind.peek());

        Ok(bind)
    }

    /// Get access to an open bind.
    pub async fn get(&self, tag: RangeTag) -> Result<Arc<Bind>, BindError> {
        self.binds
            .read()
            .await
            .get(&tag)
            .cloned()
            .ok_or(BindError::NotFound(tag))
    }

    /// Take the next sequence number of a bind for an outbound request.
    pub async fn request(&self, tag: RangeTag) -> Result<u32, BindError> {
        Ok(self.get(tag).await?.issue().await)
    }

    /// Close a bind, reporting what happened to its requests.
    pub async fn close(&self, tag: RangeTag) -> Result<BindReport, BindError> {
        let bind = self
            .binds
            .write()
            .await
            .remove(&tag)
            .ok_or(BindError::NotFound(tag))?;

        let report = bind.report().await;
        debug!("{report}");

        Ok(report)
    }

    /// Route a response to the bind which issued its sequence number.
    ///
    /// The bind is found from the top nibble of the sequence number alone.
    pub async fn dispatch(&self, sequence_number: u32) -> Result<RangeTag, DispatchError> {
        let (tag, counter) = split(sequence_number);

        let bind = self
            .binds
            .read()
            .await
            .get(&tag)
            .cloned()
            .ok_or(DispatchError::UnknownRange(tag, sequence_number))?;

        if !bind.complete(sequence_number).await {
            return Err(DispatchError::UnexpectedResponse(tag, sequence_number));
        }

        trace!("{tag}: Response {counter} matched");

        // Nobody listening for receipts is fine.
        let _ = self.receipts.send(Receipt {
            tag,
            sequence_number,
        });

        Ok(tag)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Receipt> {
        self.receipts.subscribe()
    }
}

/// Errors when opening or using binds.
#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    InvalidSequenceNumber(#[from] InvalidSequenceNumber),
    #[error("no open bind with range tag {0}")]
    NotFound(RangeTag),
    #[error("bind task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors when routing a response back to its bind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0}: No bind for response with sequence number {1:#010x}")]
    UnknownRange(RangeTag, u32),
    #[error("{0}: Unexpected response with sequence number {1:#010x}")]
    UnexpectedResponse(RangeTag, u32),
}
