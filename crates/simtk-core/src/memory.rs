//! Global device memory.
//!
//! A [`DeviceBuffer`] is the host-side stand-in for a device allocation: a
//! fixed-length array of 32-bit words that every thread of a launch can read
//! and write through a shared reference. Words are stored in `AtomicU32`
//! cells with relaxed ordering, so concurrent blocks never tear a value;
//! ordering between threads comes only from barriers and launch boundaries.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{Result, SimtError};

/// A 32-bit element type that can live in global device memory.
pub trait Element: Copy + Send + Sync + 'static {
    fn to_bits(self) -> u32;
    fn from_bits(bits: u32) -> Self;
}

impl Element for f32 {
    #[inline]
    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        f32::from_bits(bits)
    }
}

impl Element for u32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits
    }
}

impl Element for i32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as i32
    }
}

/// A fixed-length buffer in global device memory.
pub struct DeviceBuffer<T: Element> {
    cells: Box<[AtomicU32]>,
    _elem: PhantomData<T>,
}

impl<T: Element> DeviceBuffer<T> {
    /// Allocate a zero-filled buffer of `len` elements.
    pub fn zeros(len: usize) -> Self {
        let cells = (0..len).map(|_| AtomicU32::new(0)).collect();
        Self { cells, _elem: PhantomData }
    }

    /// Copy host data into a new buffer.
    pub fn from_host(data: &[T]) -> Self {
        let cells = data.iter().map(|v| AtomicU32::new(v.to_bits())).collect();
        Self { cells, _elem: PhantomData }
    }

    /// One-element buffer holding `value` at index 0.
    pub fn scalar(value: T) -> Self {
        Self::from_host(&[value])
    }

    /// Copy the buffer back to the host.
    pub fn to_host(&self) -> Vec<T> {
        self.cells
            .iter()
            .map(|c| T::from_bits(c.load(Ordering::Relaxed)))
            .collect()
    }

    /// Overwrite the whole buffer with host data of exactly the same length.
    pub fn copy_from_host(&self, data: &[T]) -> Result<()> {
        if data.len() != self.len() {
            return Err(SimtError::LengthMismatch {
                left: "device buffer",
                left_len: self.len(),
                right: "host data",
                right_len: data.len(),
            });
        }
        for (cell, v) in self.cells.iter().zip(data) {
            cell.store(v.to_bits(), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether this buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read element `i`. Panics past the end, which a launch reports as a device fault.
    #[inline]
    pub fn load(&self, i: usize) -> T {
        T::from_bits(self.cells[i].load(Ordering::Relaxed))
    }

    /// Write element `i`. Panics past the end, which a launch reports as a device fault.
    #[inline]
    pub fn store(&self, i: usize, value: T) {
        self.cells[i].store(value.to_bits(), Ordering::Relaxed);
    }
}

impl<T: Element> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("elem", &std::any::type_name::<T>())
            .field("len", &self.len())
            .finish()
    }
}
