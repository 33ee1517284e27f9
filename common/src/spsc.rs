// Lock-free SPSC ring
//
// Single-producer single-consumer queue carrying decoded order commands
// from the ingress thread to the matcher thread. Atomic indices with
// acquire/release pairing; no locks, no allocation after construction.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// A lock-free single-producer single-consumer (SPSC) ring buffer.
///
/// `N` must be a power of 2. Indices are free-running counters masked on
/// use, so the full capacity of `N` slots is usable.
///
/// # Memory Ordering
/// - Producer publishes a slot with a Release store of `tail`
/// - Consumer observes it with an Acquire load of `tail`
/// - Consumer releases a slot with a Release store of `head`
/// - Producer observes free space with an Acquire load of `head`
///
/// # Safety
/// - Only one thread may call `push` (the producer)
/// - Only one thread may call `pop` (the consumer)
/// - `len`, `is_empty`, `is_full`, `capacity` are safe from any thread
pub struct SpscQueue<T, const N: usize> {
    /// Slot storage; slots between head and tail are initialized.
    buffer: UnsafeCell<[MaybeUninit<T>; N]>,

    /// Producer index, padded to its own cache line to avoid false
    /// sharing with the consumer index.
    tail: CachePadded<AtomicUsize>,

    /// Consumer index, padded likewise.
    head: CachePadded<AtomicUsize>,
}

// SAFETY: values of T are moved between threads through the queue, and
// the acquire/release protocol on head/tail hands off slot ownership.
unsafe impl<T: Send, const N: usize> Send for SpscQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscQueue<T, N> {}

impl<T, const N: usize> SpscQueue<T, N> {
    const MASK: usize = N - 1;

    /// Creates a new empty queue.
    ///
    /// # Panics
    /// Panics if N is 0 or not a power of 2.
    pub fn new() -> Self {
        assert!(N > 0 && N.is_power_of_two(), "capacity must be a power of 2");

        Self {
            // SAFETY: MaybeUninit doesn't require initialization
            buffer: UnsafeCell::new(unsafe {
                MaybeUninit::<[MaybeUninit<T>; N]>::uninit().assume_init()
            }),
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Attempts to push an item.
    ///
    /// Returns `Err(item)` if the queue is full, handing the item back.
    /// Producer thread only.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= N {
            return Err(item);
        }

        // SAFETY: the producer alone writes slots in [head, tail), and
        // space was verified above.
        unsafe {
            let buffer = &mut *self.buffer.get();
            buffer[tail & Self::MASK].write(item);
        }

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Attempts to pop an item. Consumer thread only.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        // SAFETY: the producer's Release store of tail made this slot's
        // contents visible, and it will not touch it again until head
        // advances past it.
        let item = unsafe {
            let buffer = &*self.buffer.get();
            buffer[head & Self::MASK].assume_init_read()
        };

        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Approximate number of queued items.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for SpscQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscQueue<T, N> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let queue: SpscQueue<u64, 8> = SpscQueue::new();
        assert!(queue.is_empty());
        assert!(!queue.is_full());
        assert_eq!(queue.capacity(), 8);
    }

    #[test]
    fn test_push_pop_fifo() {
        let queue: SpscQueue<u64, 8> = SpscQueue::new();
        for i in 0..5 {
            assert!(queue.push(i).is_ok());
        }
        assert_eq!(queue.len(), 5);
        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let queue: SpscQueue<u64, 8> = SpscQueue::new();
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_full_queue_hands_item_back() {
        let queue: SpscQueue<u32, 4> = SpscQueue::new();
        for i in 0..4 {
            assert!(queue.push(i).is_ok());
        }
        assert!(queue.is_full());

        let rejected = queue.push(99);
        assert_eq!(rejected.unwrap_err(), 99);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_wraparound() {
        let queue: SpscQueue<u32, 4> = SpscQueue::new();
        for round in 0..10 {
            let base = round * 4;
            for i in 0..4 {
                assert!(queue.push(base + i).is_ok());
            }
            for i in 0..4 {
                assert_eq!(queue.pop(), Some(base + i));
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_interleaved_push_pop() {
        let queue: SpscQueue<u32, 4> = SpscQueue::new();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.pop(), Some(1));
        queue.push(3).unwrap();
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cross_thread_transfer() {
        use std::sync::Arc;

        let queue: Arc<SpscQueue<u64, 1024>> = Arc::new(SpscQueue::new());
        let producer_q = Arc::clone(&queue);

        let producer = std::thread::spawn(move || {
            for i in 0..10_000u64 {
                loop {
                    if producer_q.push(i).is_ok() {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }
        });

        let mut expected = 0u64;
        while expected < 10_000 {
            if let Some(v) = queue.pop() {
                assert_eq!(v, expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }
        producer.join().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_cleans_up() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug)]
        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);
        {
            let queue: SpscQueue<DropCounter, 4> = SpscQueue::new();
            queue.push(DropCounter).unwrap();
            queue.push(DropCounter).unwrap();
        }
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[should_panic(expected = "capacity must be a power of 2")]
    fn test_non_power_of_two_panics() {
        let _queue: SpscQueue<u32, 5> = SpscQueue::new();
    }
}
