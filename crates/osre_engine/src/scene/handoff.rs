//! Transform handoff between threads
//!
//! Animation or simulation code running on another thread computes complete
//! batches of local transforms and publishes them through a
//! [`TransformWriter`]. The render thread takes the latest batch from the
//! [`TransformReader`] at frame start and applies it to the stage before
//! `on_update`, so no node is mutated while the scene is traversed.
//!
//! The slot holds at most one batch: publishing again before the reader
//! took the previous batch replaces it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::math::Transform;

use super::NodeHandle;

/// Complete set of local transforms for one frame
#[derive(Debug, Clone, Default)]
pub struct TransformBatch {
    /// Producer frame counter
    pub frame: u64,
    /// New local transforms
    pub updates: Vec<(NodeHandle, Transform)>,
}

impl TransformBatch {
    /// Empty batch for `frame`
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            updates: Vec::new(),
        }
    }

    /// Add one update
    pub fn push(&mut self, node: NodeHandle, transform: Transform) {
        self.updates.push((node, transform));
    }
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<TransformBatch>,
    replaced: u64,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // The slot is only ever replaced whole, a poisoned lock still holds a consistent value
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer side of the handoff
#[derive(Debug)]
pub struct TransformWriter {
    slot: Arc<Mutex<Slot>>,
}

impl TransformWriter {
    /// Publish a batch; returns `true` if an unconsumed batch was replaced
    pub fn publish(&self, batch: TransformBatch) -> bool {
        let mut slot = lock(&self.slot);
        let replaced = slot.pending.replace(batch).is_some();
        if replaced {
            slot.replaced += 1;
            log::trace!("Transform batch replaced before the render thread consumed it");
        }
        replaced
    }
}

/// Consumer side of the handoff
#[derive(Debug)]
pub struct TransformReader {
    slot: Arc<Mutex<Slot>>,
}

impl TransformReader {
    /// Take the latest batch, if one was published since the last take
    pub fn take(&self) -> Option<TransformBatch> {
        lock(&self.slot).pending.take()
    }

    /// Number of batches replaced before they were taken
    pub fn replaced_count(&self) -> u64 {
        lock(&self.slot).replaced
    }
}

/// Create a connected writer/reader pair
pub fn transform_handoff() -> (TransformWriter, TransformReader) {
    let slot = Arc::new(Mutex::new(Slot::default()));
    (
        TransformWriter {
            slot: Arc::clone(&slot),
        },
        TransformReader { slot },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use slotmap::SlotMap;
    use std::thread;

    fn handles(count: usize) -> Vec<NodeHandle> {
        let mut map: SlotMap<NodeHandle, ()> = SlotMap::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_empty_handoff() {
        let (_writer, reader) = transform_handoff();
        assert!(reader.take().is_none());
    }

    #[test]
    fn test_latest_batch_wins() {
        let (writer, reader) = transform_handoff();
        assert!(!writer.publish(TransformBatch::new(1)));
        assert!(writer.publish(TransformBatch::new(2)));

        assert_eq!(reader.take().map(|b| b.frame), Some(2));
        assert!(reader.take().is_none());
        assert_eq!(reader.replaced_count(), 1);
    }

    #[test]
    fn test_writer_on_another_thread() {
        let (writer, reader) = transform_handoff();
        let node = handles(1)[0];

        let producer = thread::spawn(move || {
            let mut batch = TransformBatch::new(7);
            batch.push(node, Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
            writer.publish(batch);
        });
        producer.join().unwrap();

        let batch = reader.take().unwrap();
        assert_eq!(batch.frame, 7);
        assert_eq!(batch.updates[0].0, node);
        assert_eq!(batch.updates[0].1.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
