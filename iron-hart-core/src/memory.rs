//! Sparse, paged guest memory and the address router placed in front of it.
//!
//! Storage is a map from page-aligned address to a lazily allocated 4 KiB buffer. Every wider
//! access is a little-endian composition of single byte accesses at increasing addresses, so no
//! alignment is required and accesses may straddle page boundaries (or wrap around the top of the
//! address space).

use crate::timer::TimerDevice;
use std::collections::HashMap;

/// Size in bytes of a single memory page.
pub const PAGE_SIZE: u32 = 4096;

/// Mask selecting the byte offset within a page.
const OFFSET_MASK: u32 = PAGE_SIZE - 1;

const_assert!(PAGE_SIZE.is_power_of_two());

type Page = Box<[u8; PAGE_SIZE as usize]>;

macro_rules! access_fns {
    ( $( $read_fn:ident, $write_fn:ident => $u:ident ),* $(,)? ) => {
        $(
            /// Invoke a little-endian read for the specified address.
            ///
            /// The address doesn't need to be naturally aligned.
            pub fn $read_fn(&self, address: u32) -> $u {
                let mut buf = [0u8; std::mem::size_of::<$u>()];
                for (offset, byte) in (0u32..).zip(buf.iter_mut()) {
                    *byte = self.read8(address.wrapping_add(offset));
                }
                $u::from_le_bytes(buf)
            }

            /// Invoke a little-endian write for the specified address.
            ///
            /// The address doesn't need to be naturally aligned.
            pub fn $write_fn(&mut self, address: u32, value: $u) {
                for (offset, byte) in (0u32..).zip(value.to_le_bytes()) {
                    self.write8(address.wrapping_add(offset), byte);
                }
            }
        )*
    };
}

/// Byte-addressable sparse memory covering the full 32-bit address space.
///
/// Reading a byte of a page that was never written yields `0` and does not allocate the page.
#[derive(Debug, Default, Clone)]
pub struct SparseMemory {
    pages: HashMap<u32, Page>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages allocated so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn read8(&self, address: u32) -> u8 {
        self.pages
            .get(&(address & !OFFSET_MASK))
            .map_or(0, |page| page[(address & OFFSET_MASK) as usize])
    }

    pub fn write8(&mut self, address: u32, value: u8) {
        self.page_mut(address)[(address & OFFSET_MASK) as usize] = value;
    }

    access_fns! {
        read16, write16 => u16,
        read32, write32 => u32,
        read64, write64 => u64,
    }

    /// Copy `bytes` into memory starting at `address`, wrapping around at the end of the address
    /// space.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        let mut address = address;
        let mut rest = bytes;
        while !rest.is_empty() {
            let offset = (address & OFFSET_MASK) as usize;
            let chunk = rest.len().min(PAGE_SIZE as usize - offset);
            self.page_mut(address)[offset..offset + chunk].copy_from_slice(&rest[..chunk]);
            rest = &rest[chunk..];
            address = address.wrapping_add(chunk as u32);
        }
    }

    fn page_mut(&mut self, address: u32) -> &mut Page {
        self.pages
            .entry(address & !OFFSET_MASK)
            .or_insert_with(|| Box::new([0; PAGE_SIZE as usize]))
    }
}

/// The hart's view of the address space.
///
/// Accesses that fall inside the timer's `mtime`/`mtimecmp` windows are served by the timer
/// device; everything else goes to [`SparseMemory`].
#[derive(Debug)]
pub struct AddressRouter<'a> {
    memory: &'a mut SparseMemory,
    timer: Option<&'a TimerDevice>,
}

impl<'a> AddressRouter<'a> {
    pub fn new(memory: &'a mut SparseMemory, timer: Option<&'a TimerDevice>) -> Self {
        Self { memory, timer }
    }

    pub fn read8(&self, address: u32) -> u8 {
        match self.timer.and_then(|timer| timer.read_byte(address)) {
            Some(value) => value,
            None => self.memory.read8(address),
        }
    }

    pub fn write8(&mut self, address: u32, value: u8) {
        let handled = self
            .timer
            .map_or(false, |timer| timer.write_byte(address, value));
        if !handled {
            self.memory.write8(address, value);
        }
    }

    access_fns! {
        read16, write16 => u16,
        read32, write32 => u32,
        read64, write64 => u64,
    }
}
