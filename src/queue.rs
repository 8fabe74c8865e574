use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;

use crate::arena::Arena;
use crate::node::Node;

/// A successor proposal routed from one worker to the worker that owns
/// the target cell.
pub struct Message {
    pub parent: *mut Node,
    pub x: u32,
    pub y: u32,
    pub g: u32,
    next: AtomicPtr<Message>,
}

unsafe impl Send for Message {}
unsafe impl Sync for Message {}

/// Message storage: a bump arena for fresh allocations plus a free-list
/// of recycled messages. Producers and the consumer both go through
/// this, so it is mutex-guarded; the lock-free part of the design is
/// the inbox's push/drain path below, not message memory management.
struct Pool {
    arena: Arena<Message>,
    free: Vec<*mut Message>,
}

/// Single-consumer, many-producer inbox. Producers push with a CAS
/// loop; the consumer drains by atomically exchanging the head with
/// null, which hands it the whole chain in one operation with no risk
/// of losing a concurrent push.
pub struct Inbox {
    head: AtomicPtr<Message>,
    pool: Mutex<Pool>,
}

impl Inbox {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Inbox {
            head: AtomicPtr::new(ptr::null_mut()),
            pool: Mutex::new(Pool {
                arena: Arena::new()?,
                free: Vec::new(),
            }),
        })
    }

    /// Allocates (or recycles) a message with the given payload. Safe
    /// to call from any producer thread.
    pub fn alloc(&self, parent: *mut Node, x: u32, y: u32, g: u32) -> *mut Message {
        let mut pool = self.pool.lock().unwrap();
        if let Some(recycled) = pool.free.pop() {
            unsafe {
                (*recycled).parent = parent;
                (*recycled).x = x;
                (*recycled).y = y;
                (*recycled).g = g;
                (*recycled).next = AtomicPtr::new(ptr::null_mut());
            }
            recycled
        } else {
            pool.arena.alloc(Message {
                parent,
                x,
                y,
                g,
                next: AtomicPtr::new(ptr::null_mut()),
            })
        }
    }

    /// Pushes a message onto the stack. Lock-free: a CAS retry loop
    /// against the shared head.
    pub fn push(&self, msg: *mut Message) {
        loop {
            let old_head = self.head.load(Ordering::Relaxed);
            unsafe {
                (*msg).next.store(old_head, Ordering::Relaxed);
            }
            if self
                .head
                .compare_exchange_weak(old_head, msg, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }

    /// Atomically takes the whole chain, newest-first (already in
    /// arrival-reversed order, so no further reversal is needed).
    pub fn drain(&self) -> Vec<*mut Message> {
        let mut head = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        let mut out = Vec::new();
        while !head.is_null() {
            let next = unsafe { (*head).next.load(Ordering::Relaxed) };
            out.push(head);
            head = next;
        }
        out
    }

    /// Returns a consumed message to the free-list. Only the consumer
    /// thread calls this.
    pub fn recycle(&self, msg: *mut Message) {
        self.pool.lock().unwrap().free.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_then_drain_returns_all_messages() {
        let inbox = Inbox::new().unwrap();
        for i in 0..5u32 {
            let msg = inbox.alloc(ptr::null_mut(), i, 0, i);
            inbox.push(msg);
        }
        let drained = inbox.drain();
        assert_eq!(drained.len(), 5);
        assert!(inbox.is_empty());
    }

    #[test]
    fn recycled_messages_are_reused() {
        let inbox = Inbox::new().unwrap();
        let msg = inbox.alloc(ptr::null_mut(), 1, 1, 1);
        inbox.recycle(msg);
        let again = inbox.alloc(ptr::null_mut(), 2, 2, 2);
        assert_eq!(msg, again);
    }

    #[test]
    fn concurrent_producers_do_not_lose_messages() {
        let inbox = Arc::new(Inbox::new().unwrap());
        let producers: Vec<_> = (0..8)
            .map(|t| {
                let inbox = Arc::clone(&inbox);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        let msg = inbox.alloc(ptr::null_mut(), t, i, i);
                        inbox.push(msg);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        let drained = inbox.drain();
        assert_eq!(drained.len(), 800);
    }
}
