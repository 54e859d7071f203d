use super::api::BindPool;
use log::*;
use pdu_sequence::RangeTag;
use rustc_hash::FxHashMap;
use tokio::{sync::broadcast, task::JoinHandle};

/// A response which was routed back to the bind that issued its request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tag: RangeTag,
    pub sequence_number: u32,
}

/// Subscription handle.
pub struct Subscription<T>(broadcast::Receiver<T>);

impl<T> Subscription<T>
where
    T: Clone,
{
    /// Receive a value from a subscription.
    pub async fn recv(&mut self) -> Result<T, SubscriptionError> {
        self.0.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => SubscriptionError::Closed,
            broadcast::error::RecvError::Lagged(n) => SubscriptionError::MessagesDropped(n),
        })
    }
}

/// Get every receipt of the pool's binds.
pub fn receipts(pool: &BindPool) -> Subscription<Receipt> {
    Subscription(pool.subscribe())
}

/// Errors on subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The pool is gone.
    Closed,
    MessagesDropped(u64),
}

/// Count receipts per bind until the pool is dropped.
pub(crate) fn tally(pool: &BindPool) -> JoinHandle<FxHashMap<RangeTag, u64>> {
    let mut subscription = receipts(pool);

    tokio::spawn(async move {
        let mut counts = FxHashMap::default();

        loop {
            match subscription.recv().await {
                Ok(receipt) => *counts.entry(receipt.tag).or_insert(0) += 1,
                Err(SubscriptionError::MessagesDropped(n)) => {
                    warn!("Receipt tally lagging, {n} receipts not counted");
                }
                Err(SubscriptionError::Closed) => break,
            }
        }

        counts
    })
}
