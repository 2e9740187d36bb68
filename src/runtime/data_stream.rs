use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use log::debug;
use parking_lot::{Condvar, Mutex};

use super::MemReservation;
use crate::common::{FragmentInstanceId, QueryId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no stream registered for {0}")]
    NotFound(FragmentInstanceId),
    #[error("stream for {0} is already registered")]
    AlreadyRegistered(FragmentInstanceId),
    #[error("stream to {0} is closed")]
    Closed(FragmentInstanceId),
    #[error("stream to {0} was cancelled")]
    Cancelled(FragmentInstanceId),
    #[error("a sender of stream to {dest} failed: {message}")]
    SenderFailed {
        dest: FragmentInstanceId,
        message: String,
    },
}

/// Why a queue stopped accepting batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Torn down, or the receiver needs no more input; receivers see end-of-stream.
    Closed,
    /// The owning query was cancelled.
    Cancelled,
    /// A sender hit a fatal error.
    SenderFailed(String),
}

impl CloseReason {
    fn to_error(&self, dest: FragmentInstanceId) -> ChannelError {
        match self {
            CloseReason::Closed => ChannelError::Closed(dest),
            CloseReason::Cancelled => ChannelError::Cancelled(dest),
            CloseReason::SenderFailed(message) => ChannelError::SenderFailed {
                dest,
                message: message.clone(),
            },
        }
    }
}

struct QueuedBatch {
    batch: RecordBatch,
    _reservation: MemReservation,
}

struct QueueState {
    batches: VecDeque<QueuedBatch>,
    remaining_senders: usize,
    closed: Option<CloseReason>,
}

/// Bounded blocking FIFO of row batches feeding one destination instance.
///
/// Senders block while `capacity` batches are queued and resume as soon as the
/// receiver takes one. The receiver sees end-of-stream once every registered
/// sender is done and the queue is drained.
pub struct RowBatchQueue {
    dest: FragmentInstanceId,
    capacity: usize,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl RowBatchQueue {
    pub fn new(dest: FragmentInstanceId, capacity: usize, num_senders: usize) -> Arc<Self> {
        Arc::new(RowBatchQueue {
            dest,
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                batches: VecDeque::new(),
                remaining_senders: num_senders,
                closed: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn dest(&self) -> FragmentInstanceId {
        self.dest
    }

    pub fn send(&self, batch: RecordBatch) -> Result<(), ChannelError> {
        self.send_reserved(batch, MemReservation::untracked())
    }

    /// Enqueues `batch`, holding `reservation` until the receiver takes it.
    pub fn send_reserved(
        &self,
        batch: RecordBatch,
        reservation: MemReservation,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        loop {
            if let Some(reason) = &state.closed {
                return Err(reason.to_error(self.dest));
            }
            if state.batches.len() < self.capacity {
                break;
            }
            self.not_full.wait(&mut state);
        }
        state.batches.push_back(QueuedBatch {
            batch,
            _reservation: reservation,
        });
        self.not_empty.notify_one();
        Ok(())
    }

    /// Next batch in FIFO order, or `None` at end-of-stream.
    pub fn receive(&self) -> Result<Option<RecordBatch>, ChannelError> {
        let mut state = self.state.lock();
        loop {
            match &state.closed {
                Some(CloseReason::Closed) => return Ok(None),
                Some(reason) => return Err(reason.to_error(self.dest)),
                None => {}
            }
            if let Some(queued) = state.batches.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(queued.batch));
            }
            if state.remaining_senders == 0 {
                return Ok(None);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// One sender finished producing.
    pub fn sender_done(&self) {
        let mut state = self.state.lock();
        state.remaining_senders = state.remaining_senders.saturating_sub(1);
        if state.remaining_senders == 0 {
            self.not_empty.notify_all();
        }
    }

    /// Closes the queue, dropping anything still queued. Only the first close counts.
    pub fn close(&self, reason: CloseReason) {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return;
        }
        debug!("closing stream to {}: {:?}", self.dest, reason);
        state.closed = Some(reason);
        state.batches.clear();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }

    pub fn len(&self) -> usize {
        self.state.lock().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The streams of every running query, keyed by destination instance.
///
/// A [`FragmentInstanceId`] embeds its query id, so a key addresses one
/// (query, destination) pair.
#[derive(Default)]
pub struct DataStreamMgr {
    streams: Mutex<HashMap<FragmentInstanceId, Arc<RowBatchQueue>>>,
}

impl DataStreamMgr {
    pub fn new() -> Arc<Self> {
        Arc::new(DataStreamMgr::default())
    }

    pub fn register(
        &self,
        dest: FragmentInstanceId,
        num_senders: usize,
        capacity: usize,
    ) -> Result<Arc<RowBatchQueue>, ChannelError> {
        let mut streams = self.streams.lock();
        if streams.contains_key(&dest) {
            return Err(ChannelError::AlreadyRegistered(dest));
        }
        let queue = RowBatchQueue::new(dest, capacity, num_senders);
        streams.insert(dest, queue.clone());
        Ok(queue)
    }

    pub fn get(&self, dest: FragmentInstanceId) -> Result<Arc<RowBatchQueue>, ChannelError> {
        self.streams
            .lock()
            .get(&dest)
            .cloned()
            .ok_or(ChannelError::NotFound(dest))
    }

    pub fn send(&self, dest: FragmentInstanceId, batch: RecordBatch) -> Result<(), ChannelError> {
        // The map lock is not held while blocking on the queue.
        let queue = self.get(dest)?;
        queue.send(batch)
    }

    pub fn receive(&self, dest: FragmentInstanceId) -> Result<Option<RecordBatch>, ChannelError> {
        let queue = self.get(dest)?;
        queue.receive()
    }

    /// Closes one stream; closing an unknown or closed stream is a no-op.
    pub fn close(&self, dest: FragmentInstanceId) {
        if let Ok(queue) = self.get(dest) {
            queue.close(CloseReason::Closed);
        }
    }

    fn query_streams(&self, query: QueryId) -> Vec<Arc<RowBatchQueue>> {
        self.streams
            .lock()
            .iter()
            .filter(|(dest, _)| dest.query == query)
            .map(|(_, queue)| queue.clone())
            .collect()
    }

    /// Wakes every blocked sender and receiver of `query` with a cancelled signal.
    pub fn cancel_query(&self, query: QueryId) {
        for queue in self.query_streams(query) {
            queue.close(CloseReason::Cancelled);
        }
    }

    /// Closes and forgets every stream of `query`.
    pub fn remove_query(&self, query: QueryId) {
        let removed = {
            let mut streams = self.streams.lock();
            let keys = streams
                .keys()
                .filter(|dest| dest.query == query)
                .copied()
                .collect::<Vec<_>>();
            keys.into_iter()
                .filter_map(|dest| streams.remove(&dest))
                .collect::<Vec<_>>()
        };
        for queue in removed {
            queue.close(CloseReason::Closed);
        }
    }

    pub fn num_streams(&self, query: QueryId) -> usize {
        self.query_streams(query).len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::common::FragmentId;

    fn batch(values: Vec<i32>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    fn first_value(batch: &RecordBatch) -> i32 {
        batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap()
            .value(0)
    }

    fn dest(query: u64, seq: u32) -> FragmentInstanceId {
        FragmentInstanceId::new(QueryId(query), FragmentId(0), seq)
    }

    #[test]
    fn single_producer_fifo_then_eos() {
        let queue = RowBatchQueue::new(dest(1, 0), 4, 1);
        for v in 0..3 {
            queue.send(batch(vec![v])).unwrap();
        }
        queue.sender_done();
        for v in 0..3 {
            assert_eq!(first_value(&queue.receive().unwrap().unwrap()), v);
        }
        assert!(queue.receive().unwrap().is_none());
        assert!(queue.receive().unwrap().is_none());
    }

    #[test]
    fn backpressure_is_exact() {
        let capacity = 2;
        let queue = RowBatchQueue::new(dest(1, 0), capacity, 1);
        let sent = Arc::new(AtomicUsize::new(0));
        let producer = {
            let queue = queue.clone();
            let sent = sent.clone();
            thread::spawn(move || {
                for v in 0..4 {
                    queue.send(batch(vec![v])).unwrap();
                    sent.fetch_add(1, Ordering::SeqCst);
                }
                queue.sender_done();
            })
        };

        while sent.load(Ordering::SeqCst) < capacity {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sent.load(Ordering::SeqCst), capacity);
        assert_eq!(queue.len(), capacity);

        assert_eq!(first_value(&queue.receive().unwrap().unwrap()), 0);
        while sent.load(Ordering::SeqCst) < capacity + 1 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sent.load(Ordering::SeqCst), capacity + 1);

        let mut rest = vec![];
        while let Some(b) = queue.receive().unwrap() {
            rest.push(first_value(&b));
        }
        assert_eq!(rest, vec![1, 2, 3]);
        producer.join().unwrap();
    }

    #[test]
    fn closed_queue_never_blocks() {
        let queue = RowBatchQueue::new(dest(1, 0), 1, 1);
        queue.send(batch(vec![1])).unwrap();
        queue.close(CloseReason::Closed);
        assert_eq!(
            queue.send(batch(vec![2])),
            Err(ChannelError::Closed(dest(1, 0)))
        );
        assert!(queue.receive().unwrap().is_none());
        // idempotent
        queue.close(CloseReason::Cancelled);
        assert!(queue.receive().unwrap().is_none());
    }

    #[test]
    fn cancel_wakes_blocked_receiver_and_sender() {
        let mgr = DataStreamMgr::new();
        let full = mgr.register(dest(7, 0), 1, 1).unwrap();
        let empty = mgr.register(dest(7, 1), 1, 1).unwrap();
        full.send(batch(vec![1])).unwrap();

        let sender = {
            let full = full.clone();
            thread::spawn(move || full.send(batch(vec![2])))
        };
        let receiver = {
            let empty = empty.clone();
            thread::spawn(move || empty.receive())
        };
        thread::sleep(Duration::from_millis(50));
        mgr.cancel_query(QueryId(7));

        assert_eq!(
            sender.join().unwrap(),
            Err(ChannelError::Cancelled(dest(7, 0)))
        );
        assert_eq!(
            receiver.join().unwrap(),
            Err(ChannelError::Cancelled(dest(7, 1)))
        );
    }

    #[test]
    fn fan_in_preserves_each_producer_order() {
        let queue = RowBatchQueue::new(dest(1, 0), 2, 3);
        let producers = (0..3)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..20 {
                        queue.send(batch(vec![p * 100 + i])).unwrap();
                    }
                    queue.sender_done();
                })
            })
            .collect::<Vec<_>>();

        let mut seen: HashMap<i32, Vec<i32>> = HashMap::new();
        while let Some(b) = queue.receive().unwrap() {
            let v = first_value(&b);
            seen.entry(v / 100).or_default().push(v % 100);
        }
        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(seen.len(), 3);
        for values in seen.values() {
            assert_eq!(values, &(0..20).collect::<Vec<_>>());
        }
    }

    #[test]
    fn sender_failure_reaches_receiver() {
        let queue = RowBatchQueue::new(dest(1, 0), 2, 2);
        queue.send(batch(vec![1])).unwrap();
        queue.close(CloseReason::SenderFailed("boom".to_string()));
        assert_eq!(
            queue.receive(),
            Err(ChannelError::SenderFailed {
                dest: dest(1, 0),
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn manager_lookup_and_removal() {
        let mgr = DataStreamMgr::new();
        assert_eq!(
            mgr.send(dest(3, 0), batch(vec![1])),
            Err(ChannelError::NotFound(dest(3, 0)))
        );
        mgr.register(dest(3, 0), 1, 4).unwrap();
        mgr.register(dest(3, 1), 1, 4).unwrap();
        mgr.register(dest(4, 0), 1, 4).unwrap();
        assert!(matches!(
            mgr.register(dest(3, 0), 1, 4),
            Err(ChannelError::AlreadyRegistered(_))
        ));

        mgr.send(dest(3, 0), batch(vec![5])).unwrap();
        assert_eq!(
            first_value(&mgr.receive(dest(3, 0)).unwrap().unwrap()),
            5
        );
        let queue = mgr.get(dest(3, 1)).unwrap();
        mgr.remove_query(QueryId(3));
        assert!(queue.is_closed());
        assert_eq!(mgr.num_streams(QueryId(3)), 0);
        assert_eq!(mgr.num_streams(QueryId(4)), 1);
        assert!(queue.is_empty());
    }
}
