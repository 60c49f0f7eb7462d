/// Double-buffered sample handoff between the ingestion task and collectors.
///
/// Ingestion appends into the accumulating vector; `drain` swaps in a fresh
/// vector under the same lock and hands the old one to the caller. The lock
/// is only ever held for a push or a swap.
use crate::sample::Sample;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Extra capacity reserved on top of the previous drain's length.
const CAPACITY_HEADROOM: usize = 5;

#[derive(Debug, Default)]
pub struct SampleBuffer {
    current: Mutex<Vec<Sample>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        // A panic while holding the lock cannot leave a half-pushed Vec behind
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a sample to the accumulating sequence.
    pub fn append(&self, sample: Sample) {
        self.lock().push(sample);
    }

    /// Detach everything appended since the previous drain, in append order.
    pub fn drain(&self) -> Vec<Sample> {
        let mut current = self.lock();
        let fresh = Vec::with_capacity(current.len() + CAPACITY_HEADROOM);
        std::mem::replace(&mut *current, fresh)
    }

    /// Number of samples waiting to be drained.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::FIELD_COUNT;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn sample(id: u64) -> Sample {
        let mut values = [0u64; FIELD_COUNT];
        values[0] = id;
        Sample::new(id as i64, values)
    }

    #[test]
    fn test_drain_returns_samples_in_append_order() {
        let buffer = SampleBuffer::new();
        for id in 0..10 {
            buffer.append(sample(id));
        }
        assert_eq!(buffer.len(), 10);

        let drained = buffer.drain();
        let ids: Vec<u64> = drained.iter().map(|s| s.values[0]).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_second_drain_is_empty() {
        let buffer = SampleBuffer::new();
        buffer.append(sample(1));
        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.drain().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_on_new_buffer_is_empty() {
        assert!(SampleBuffer::new().drain().is_empty());
    }

    #[test]
    fn test_appends_after_drain_go_to_next_drain() {
        let buffer = SampleBuffer::new();
        buffer.append(sample(1));
        buffer.append(sample(2));
        let first = buffer.drain();
        buffer.append(sample(3));
        let second = buffer.drain();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].values[0], 3);
    }

    #[test]
    fn test_drain_reserves_capacity_from_previous_batch() {
        let buffer = SampleBuffer::new();
        for id in 0..20 {
            buffer.append(sample(id));
        }
        buffer.drain();
        assert!(buffer.lock().capacity() >= 20 + CAPACITY_HEADROOM);
    }

    #[test]
    fn test_concurrent_appends_and_drains_lose_nothing() {
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 5_000;

        let buffer = Arc::new(SampleBuffer::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        buffer.append(sample(p * PER_PRODUCER + i));
                    }
                })
            })
            .collect();

        let mut collected = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            collected.extend(buffer.drain());
            std::thread::yield_now();
        }
        for handle in producers {
            handle.join().unwrap();
        }
        collected.extend(buffer.drain());

        assert_eq!(collected.len() as u64, PRODUCERS * PER_PRODUCER);
        let unique: HashSet<u64> = collected.iter().map(|s| s.values[0]).collect();
        assert_eq!(unique.len(), collected.len());

        // Each producer's samples keep their relative order across drains
        for p in 0..PRODUCERS {
            let range = p * PER_PRODUCER..(p + 1) * PER_PRODUCER;
            let ids: Vec<u64> = collected
                .iter()
                .map(|s| s.values[0])
                .filter(|id| range.contains(id))
                .collect();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_concurrent_drainers_never_duplicate() {
        let buffer = Arc::new(SampleBuffer::new());
        for id in 0..10_000 {
            buffer.append(sample(id));
        }

        let drainers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    let mut got = Vec::new();
                    for _ in 0..100 {
                        got.extend(buffer.drain());
                    }
                    got
                })
            })
            .collect();

        let total: Vec<Sample> = drainers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(total.len(), 10_000);
        let unique: HashSet<u64> = total.iter().map(|s| s.values[0]).collect();
        assert_eq!(unique.len(), 10_000);
    }
}
