// Arena allocator for long-lived geometry

use std::fmt;
use std::marker::PhantomData;
use std::mem;

use bytemuck::Pod;

use crate::error::ArenaError;

/// A byte range handed out by an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaRange {
    pub offset: usize,
    pub len: usize,
}

/// A typed array living inside an [`Arena`].
pub struct ArenaArray<T> {
    range: ArenaRange,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T> ArenaArray<T> {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn range(&self) -> ArenaRange {
        self.range
    }
}

impl<T> Clone for ArenaArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaArray<T> {}

impl<T> fmt::Debug for ArenaArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaArray")
            .field("range", &self.range)
            .field("count", &self.count)
            .finish()
    }
}

/// Linear allocator over a single block reserved up front.
///
/// Allocations are never freed one by one. The only way to reclaim memory is
/// [`Arena::reset`], which hands the whole block out again.
///
/// Handles returned by one arena must only be used with that arena.
pub struct Arena {
    // u64 words keep the base 8-byte aligned for typed views.
    storage: Box<[u64]>,
    capacity: usize,
    used: usize,
}

impl Arena {
    /// Creates a new arena with the specified capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        let words = capacity.div_ceil(mem::size_of::<u64>());
        Self {
            storage: vec![0u64; words].into_boxed_slice(),
            capacity,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still available.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.used
    }

    /// Reserves exactly `size` zeroed bytes, or fails without touching the arena.
    pub fn allocate(&mut self, size: usize) -> Result<ArenaRange, ArenaError> {
        let remaining = self.remaining_capacity();
        if size > remaining {
            return Err(ArenaError::NoSpace {
                requested: size,
                remaining,
            });
        }

        let range = ArenaRange {
            offset: self.used,
            len: size,
        };
        self.used += size;
        // A reset arena hands out previously written bytes again.
        self.bytes_mut(range).fill(0);
        Ok(range)
    }

    /// Reserves `count * element_size` bytes as one allocation.
    pub fn allocate_array(
        &mut self,
        count: usize,
        element_size: usize,
    ) -> Result<ArenaRange, ArenaError> {
        let size = count
            .checked_mul(element_size)
            .ok_or(ArenaError::Overflow {
                count,
                element_size,
            })?;
        self.allocate(size)
    }

    /// Reserves a typed array, padding the offset to `T`'s alignment first.
    ///
    /// Padding and payload are checked together, so a failure reserves nothing.
    pub fn push_array<T: Pod>(&mut self, count: usize) -> Result<ArenaArray<T>, ArenaError> {
        let element_size = mem::size_of::<T>();
        let align = mem::align_of::<T>();
        let padding = (align - self.used % align) % align;

        let size = count
            .checked_mul(element_size)
            .ok_or(ArenaError::Overflow {
                count,
                element_size,
            })?;
        let remaining = self.remaining_capacity();
        if size.saturating_add(padding) > remaining {
            return Err(ArenaError::NoSpace {
                requested: size.saturating_add(padding),
                remaining,
            });
        }

        self.used += padding;
        let range = self.allocate_array(count, element_size)?;
        Ok(ArenaArray {
            range,
            count,
            _marker: PhantomData,
        })
    }

    /// Hands the whole block out again. Every outstanding handle becomes stale.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn bytes(&self, range: ArenaRange) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.storage[..]);
        &bytes[range.offset..range.offset + range.len]
    }

    pub fn bytes_mut(&mut self, range: ArenaRange) -> &mut [u8] {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.storage[..]);
        &mut bytes[range.offset..range.offset + range.len]
    }

    pub fn slice<T: Pod>(&self, array: &ArenaArray<T>) -> &[T] {
        bytemuck::cast_slice(self.bytes(array.range))
    }

    pub fn slice_mut<T: Pod>(&mut self, array: &ArenaArray<T>) -> &mut [T] {
        bytemuck::cast_slice_mut(self.bytes_mut(array.range))
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .finish()
    }
}
