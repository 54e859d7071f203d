//! The engine drives all request and response traffic of the binds.

use super::api::BindPool;
use log::*;
use pdu_sequence::{RangeTag, SequenceNumber};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rustc_hash::FxHashSet;
use std::{fmt, sync::Arc};
use tokio::sync::{
    mpsc::{Receiver, Sender},
    Mutex,
};

/// Largest number of responses the loopback peer shuffles at once.
const PEER_BATCH: usize = 64;

/// One bind: its sequence number generator and the requests still awaiting a response.
#[derive(Debug)]
pub struct Bind {
    sequence: SequenceNumber,
    state: Mutex<BindState>,
}

#[derive(Debug, Default)]
struct BindState {
    pending: FxHashSet<u32>,
    issued: u64,
    matched: u64,
    duplicates: u64,
}

impl Bind {
    pub(crate) fn new(sequence: SequenceNumber) -> Self {
        Self {
            sequence,
            state: Mutex::new(BindState::default()),
        }
    }

    pub fn range_tag(&self) -> RangeTag {
        self.sequence.range_tag()
    }

    /// The sequence number the next request will get.
    pub fn peek(&self) -> u32 {
        self.sequence.peek()
    }

    /// Take the next sequence number for an outbound request and mark it pending.
    pub async fn issue(&self) -> u32 {
        // The generator is shared by all workers of this bind without further locking.
        let sequence_number = self.sequence.next();

        let mut state = self.state.lock().await;
        state.issued += 1;

        if !state.pending.insert(sequence_number) {
            state.duplicates += 1;
            error!(
                "{}: Sequence number {sequence_number:#010x} issued while still pending",
                self.range_tag()
            );
        }

        sequence_number
    }

    /// Mark the request with `sequence_number` as answered, false if it was not pending.
    pub(crate) async fn complete(&self, sequence_number: u32) -> bool {
        let mut state = self.state.lock().await;

        if state.pending.remove(&sequence_number) {
            state.matched += 1;
            true
        } else {
            false
        }
    }

    pub async fn report(&self) -> BindReport {
        let state = self.state.lock().await;

        BindReport {
            tag: self.range_tag(),
            issued: state.issued,
            matched: state.matched,
            outstanding: state.pending.len(),
            duplicates: state.duplicates,
        }
    }
}

/// What happened to the requests of one bind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BindReport {
    pub tag: RangeTag,
    pub issued: u64,
    pub matched: u64,
    pub outstanding: usize,
    pub duplicates: u64,
}

impl BindReport {
    /// Every request got exactly one response.
    pub fn is_clean(&self) -> bool {
        self.outstanding == 0 && self.duplicates == 0 && self.issued == self.matched
    }
}

impl fmt::Display for BindReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} requests issued, {} matched, {} outstanding, {} duplicates",
            self.tag, self.issued, self.matched, self.outstanding, self.duplicates
        )
    }
}

/// Issues `count` requests on a bind, handing their sequence numbers to the peer.
pub(crate) async fn request_worker(bind: Arc<Bind>, count: u32, requests: Sender<u32>) {
    for _ in 0..count {
        let sequence_number = bind.issue().await;

        if requests.send(sequence_number).await.is_err() {
            error!("{}: Peer gone, dropping remaining requests", bind.range_tag());
            break;
        }
    }
}

/// Stand-in for the remote end, echoes every request back.
///
/// Requests are answered in shuffled batches, so responses arrive out of order like they do
/// from a real SMSC.
pub(crate) async fn loopback_peer(mut requests: Receiver<u32>, responses: Sender<u32>) {
    let mut rng = StdRng::from_entropy();
    let mut batch = Vec::with_capacity(PEER_BATCH);

    while let Some(first) = requests.recv().await {
        batch.push(first);

        while batch.len() < PEER_BATCH {
            let Ok(sequence_number) = requests.try_recv() else {
                break;
            };
            batch.push(sequence_number);
        }

        batch.shuffle(&mut rng);

        for sequence_number in batch.drain(..) {
            if responses.send(sequence_number).await.is_err() {
                debug!("Dispatcher gone, peer stopping");
                return;
            }
        }
    }

    debug!("All requests answered");
}

/// Routes every response to its bind, returning how many could not be routed.
pub(crate) async fn dispatcher(pool: Arc<BindPool>, mut responses: Receiver<u32>) -> u64 {
    let mut misrouted = 0;

    while let Some(sequence_number) = responses.recv().await {
        if let Err(e) = pool.dispatch(sequence_number).await {
            error!("{e}");
            misrouted += 1;
        }
    }

    misrouted
}
