//! Arena-backed FIFO queue with O(1) removal by handle.
//!
//! A price level needs three things cheaply: append at the tail (new resting
//! order), detach an arbitrary node (cancellation), and peek at the head
//! (matching). A plain `VecDeque` gives up O(1) cancellation, and a raw
//! pointer-linked list fights the borrow checker, so nodes live in an arena of
//! slots addressed by stable indices. Removed slots are recycled through a
//! free list with a bumped generation, which makes a stale [`Handle`]
//! detectable instead of silently reaching a recycled node.

/// Stable reference to a queued value. Consumed by [`FifoQueue::remove`], so a
/// handle cannot be used after the value it pointed at is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    slot: usize,
    generation: u64,
}

struct Node<T> {
    value: T,
    generation: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

enum Slot<T> {
    Occupied(Node<T>),
    /// Free slot: remembers the next free slot and the generation the *next*
    /// occupant will carry.
    Vacant { next_free: Option<usize>, generation: u64 },
}

pub struct FifoQueue<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append at the tail. O(1).
    pub fn push_back(&mut self, value: T) -> Handle {
        let (slot, generation) = match self.free_head {
            Some(slot) => {
                let (next_free, generation) = match self.slots[slot] {
                    Slot::Vacant { next_free, generation } => (next_free, generation),
                    Slot::Occupied(_) => unreachable!("free list points at occupied slot"),
                };
                self.free_head = next_free;
                (slot, generation)
            }
            None => {
                self.slots.push(Slot::Vacant {
                    next_free: None,
                    generation: 0,
                });
                (self.slots.len() - 1, 0)
            }
        };

        self.slots[slot] = Slot::Occupied(Node {
            value,
            generation,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => {
                if let Slot::Occupied(node) = &mut self.slots[tail] {
                    node.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
        Handle { slot, generation }
    }

    /// Detach the value behind `handle`. O(1).
    ///
    /// The handle is consumed; a handle whose value was already removed (slot
    /// recycled, generation bumped) yields `None`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        match self.slots.get(handle.slot) {
            Some(Slot::Occupied(node)) if node.generation == handle.generation => {}
            _ => return None,
        }

        let node = match std::mem::replace(
            &mut self.slots[handle.slot],
            Slot::Vacant {
                next_free: self.free_head,
                generation: handle.generation + 1,
            },
        ) {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!(),
        };
        self.free_head = Some(handle.slot);

        // Re-link neighbours; a missing neighbour means we were the boundary.
        match node.prev {
            Some(prev) => {
                if let Slot::Occupied(p) = &mut self.slots[prev] {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Slot::Occupied(n) = &mut self.slots[next] {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        self.len -= 1;
        Some(node.value)
    }

    /// Peek at the head without removal. O(1).
    pub fn front(&self) -> Option<&T> {
        self.head.map(|slot| match &self.slots[slot] {
            Slot::Occupied(node) => &node.value,
            Slot::Vacant { .. } => unreachable!("head points at vacant slot"),
        })
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.slot) {
            Some(Slot::Occupied(node)) if node.generation == handle.generation => Some(&node.value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.slot) {
            Some(Slot::Occupied(node)) if node.generation == handle.generation => Some(&mut node.value),
            _ => None,
        }
    }

    /// Iterate head → tail in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            match &self.slots[slot] {
                Slot::Occupied(node) => {
                    cursor = node.next;
                    Some(&node.value)
                }
                Slot::Vacant { .. } => unreachable!("link points at vacant slot"),
            }
        })
    }
}
