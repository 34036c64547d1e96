//! Write payload ownership.
//!
//! A CCCD write hands its payload to the stack, which may still be reading
//! it after the request call returns. The payload therefore travels as a
//! move-only [`WriteBuffer`]: the controller leases one from its
//! [`BufferPool`], moves it into the transport, and gets it back through
//! the "buffer transmitted" event, at which point it is released.
//! Because the handle cannot be cloned and `release` consumes it, a slot is
//! freed exactly once and never while the stack still holds it.

/// CCCD values are two bytes.
pub const CCCD_VALUE_LEN: usize = 2;

/// Payload of one outstanding CCCD write.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteBuffer {
    slot: u8,
    data: [u8; CCCD_VALUE_LEN],
}

impl WriteBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pool slot this buffer was leased from.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

/// Fixed set of write buffers, no heap involved.
#[derive(Debug)]
pub struct BufferPool<const N: usize> {
    in_use: [bool; N],
}

impl<const N: usize> BufferPool<N> {
    pub const fn new() -> Self {
        Self { in_use: [false; N] }
    }

    /// Take a free slot and fill it, or `None` if all slots are out.
    pub fn lease(&mut self, data: [u8; CCCD_VALUE_LEN]) -> Option<WriteBuffer> {
        let slot = self.in_use.iter().position(|used| !used)?;
        self.in_use[slot] = true;
        Some(WriteBuffer {
            slot: slot as u8,
            data,
        })
    }

    /// Return a buffer to the pool.
    pub fn release(&mut self, buffer: WriteBuffer) {
        if let Some(used) = self.in_use.get_mut(buffer.slot()) {
            *used = false;
        }
    }

    /// Number of buffers currently held outside the pool.
    pub fn outstanding(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }
}

impl<const N: usize> Default for BufferPool<N> {
    fn default() -> Self {
        Self::new()
    }
}
