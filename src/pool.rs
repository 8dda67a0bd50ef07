// Fixed-capacity pool of interactive circles

use glam::{Vec3, Vec4};

/// Stable handle to a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CircleId(u32);

impl CircleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Circle {
    pub color: Vec4,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    circle: Circle,
    next: Option<CircleId>,
    prev: Option<CircleId>,
    active: bool,
}

/// Circles live in a fixed array of slots. Each slot is either on the doubly
/// linked active list or the singly linked free list, never both.
///
/// At most one active circle is hot.
#[derive(Debug)]
pub struct CirclePool {
    slots: Box<[Slot]>,
    first_active: Option<CircleId>,
    first_free: Option<CircleId>,
    hot: Option<CircleId>,
    count: usize,
}

impl CirclePool {
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity <= u32::MAX as usize,
            "pool capacity {capacity} does not fit a circle id"
        );

        let slots: Box<[Slot]> = (0..capacity)
            .map(|i| Slot {
                next: (i + 1 < capacity).then(|| CircleId(i as u32 + 1)),
                ..Slot::default()
            })
            .collect();

        Self {
            slots,
            first_active: None,
            first_free: (capacity > 0).then_some(CircleId(0)),
            hot: None,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of active circles.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Takes a slot off the free list and puts a zeroed circle at the front of
    /// the active list. `None` when the pool is exhausted.
    pub fn create(&mut self) -> Option<CircleId> {
        let id = self.first_free?;
        self.first_free = self.slots[id.index()].next;

        self.slots[id.index()] = Slot {
            circle: Circle::default(),
            next: self.first_active,
            prev: None,
            active: true,
        };
        if let Some(head) = self.first_active {
            self.slots[head.index()].prev = Some(id);
        }
        self.first_active = Some(id);
        self.count += 1;
        Some(id)
    }

    /// Unlinks an active circle and returns its slot to the free list.
    ///
    /// # Panics
    ///
    /// When `id` is not active or the links around it are inconsistent.
    pub fn destroy(&mut self, id: CircleId) {
        let Slot {
            next, prev, active, ..
        } = self.slots[id.index()];
        assert!(active, "destroying free circle {id:?}");

        match prev {
            Some(prev) => {
                assert_eq!(self.slots[prev.index()].next, Some(id));
                self.slots[prev.index()].next = next;
            }
            None => {
                assert_eq!(self.first_active, Some(id), "{id:?} has no prev but is not the head");
                self.first_active = next;
            }
        }
        if let Some(next) = next {
            self.slots[next.index()].prev = prev;
        }

        if self.hot == Some(id) {
            self.hot = None;
        }

        let slot = &mut self.slots[id.index()];
        slot.next = self.first_free;
        slot.prev = None;
        slot.active = false;
        self.first_free = Some(id);
        self.count -= 1;
    }

    pub fn is_active(&self, id: CircleId) -> bool {
        self.slots.get(id.index()).is_some_and(|slot| slot.active)
    }

    pub fn get(&self, id: CircleId) -> Option<&Circle> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.active)
            .map(|slot| &slot.circle)
    }

    pub fn get_mut(&mut self, id: CircleId) -> Option<&mut Circle> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.active)
            .map(|slot| &mut slot.circle)
    }

    pub fn first_active(&self) -> Option<CircleId> {
        self.first_active
    }

    /// The circle after `id` in the active list.
    pub fn next_active(&self, id: CircleId) -> Option<CircleId> {
        let slot = &self.slots[id.index()];
        debug_assert!(slot.active);
        slot.next
    }

    pub fn active_ids(&self) -> impl Iterator<Item = CircleId> + '_ {
        std::iter::successors(self.first_active, |&id| self.slots[id.index()].next)
    }

    pub fn free_ids(&self) -> impl Iterator<Item = CircleId> + '_ {
        std::iter::successors(self.first_free, |&id| self.slots[id.index()].next)
    }

    pub fn hot(&self) -> Option<CircleId> {
        self.hot
    }

    /// # Panics
    ///
    /// When `id` is not active.
    pub fn set_hot(&mut self, id: CircleId) {
        assert!(self.is_active(id), "hot circle {id:?} must be active");
        self.hot = Some(id);
    }

    pub fn clear_hot(&mut self) {
        self.hot = None;
    }
}
