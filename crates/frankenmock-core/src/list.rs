//! Doubly linked ordered list backed by a slot arena.
//!
//! Nodes live in a `Vec` of slots; links are slot indices and vacated slots go
//! onto a free list for reuse. Every slot carries a generation counter so a
//! [`NodeHandle`] that outlives its node is rejected instead of aliasing
//! whatever reused the slot.
//!
//! The primitive is small: append at the tail, remove by handle,
//! find by predicate, walk forwards or backwards. Every queue and map in the
//! engine is built from it.

/// Stable reference to a node in an [`OrderedList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
    generation: u32,
}

/// Insertion-ordered list with O(1) append and O(1) removal by handle.
#[derive(Debug)]
pub struct OrderedList<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedList<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `value` at the tail.
    pub fn push_back(&mut self, value: T) -> NodeHandle {
        let index = self.link_back(Some(value));
        NodeHandle {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn link_back(&mut self, value: Option<T>) -> usize {
        let index = if let Some(free) = self.free_list.pop() {
            let slot = &mut self.slots[free];
            slot.value = value;
            slot.prev = self.tail;
            slot.next = None;
            free
        } else {
            self.slots.push(Slot {
                value,
                prev: self.tail,
                next: None,
                generation: 0,
            });
            self.slots.len() - 1
        };

        match self.tail {
            Some(tail) => self.slots[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        index
    }

    /// Unlink and return the node behind `handle`, or `None` if it is stale.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        let index = self.live_index(handle)?;
        let (prev, next) = {
            let slot = &self.slots[index];
            (slot.prev, slot.next)
        };

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }

        let slot = &mut self.slots[index];
        slot.prev = None;
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        let value = slot.value.take();
        self.free_list.push(index);
        self.len -= 1;
        value
    }

    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        let index = self.live_index(handle)?;
        self.slots[index].value.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        let index = self.live_index(handle)?;
        self.slots[index].value.as_mut()
    }

    #[must_use]
    pub fn front(&self) -> Option<NodeHandle> {
        self.head.map(|i| self.handle_at(i))
    }

    #[must_use]
    pub fn back(&self) -> Option<NodeHandle> {
        self.tail.map(|i| self.handle_at(i))
    }

    #[must_use]
    pub fn next(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let index = self.live_index(handle)?;
        self.slots[index].next.map(|i| self.handle_at(i))
    }

    #[must_use]
    pub fn prev(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let index = self.live_index(handle)?;
        self.slots[index].prev.map(|i| self.handle_at(i))
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let handle = self.front()?;
        self.remove(handle)
    }

    /// First node (head to tail) whose value satisfies `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NodeHandle> {
        self.iter().find(|(_, v)| pred(v)).map(|(h, _)| h)
    }

    /// Mutable access to the first matching node, appending `make()` when
    /// nothing matches.
    pub fn find_or_insert_with(
        &mut self,
        pred: impl FnMut(&T) -> bool,
        make: impl FnOnce() -> T,
    ) -> &mut T {
        let index = match self.find(pred) {
            Some(handle) => handle.index,
            None => self.link_back(None),
        };
        self.slots[index].value.get_or_insert_with(make)
    }

    /// Keep only the nodes for which `keep` returns true, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool) {
        let mut cursor = self.front();
        while let Some(handle) = cursor {
            cursor = self.next(handle);
            let drop_it = self.get_mut(handle).is_some_and(|v| !keep(v));
            if drop_it {
                self.remove(handle);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Head-to-tail iteration yielding handles alongside values.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Tail-to-head iteration yielding handles alongside values.
    #[must_use]
    pub fn iter_rev(&self) -> IterRev<'_, T> {
        IterRev {
            list: self,
            cursor: self.tail,
        }
    }

    fn handle_at(&self, index: usize) -> NodeHandle {
        NodeHandle {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn live_index(&self, handle: NodeHandle) -> Option<usize> {
        let slot = self.slots.get(handle.index)?;
        (slot.generation == handle.generation && slot.value.is_some()).then_some(handle.index)
    }
}

pub struct Iter<'a, T> {
    list: &'a OrderedList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.list.slots[index];
        self.cursor = slot.next;
        slot.value
            .as_ref()
            .map(|v| (self.list.handle_at(index), v))
    }
}

pub struct IterRev<'a, T> {
    list: &'a OrderedList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for IterRev<'a, T> {
    type Item = (NodeHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.list.slots[index];
        self.cursor = slot.prev;
        slot.value
            .as_ref()
            .map(|v| (self.list.handle_at(index), v))
    }
}
