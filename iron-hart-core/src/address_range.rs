use std::fmt;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A non-empty range in a 32-bit address space bounded inclusively below and above.
///
/// Enforces the invariant that `self.start() <= self.end()`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl Display for AddressRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x}]", self.start, self.end)
    }
}

impl AddressRange {
    pub fn new(start: u32, end: u32) -> Result<Self, InvalidBoundsError> {
        (start <= end)
            .then_some(Self { start, end })
            .ok_or(InvalidBoundsError { start, end })
    }

    /// Create the range of `len` addresses starting at `start`.
    ///
    /// Fails if `len` is zero or the range would run past the end of the address space.
    pub fn with_len(start: u32, len: u32) -> Result<Self, InvalidBoundsError> {
        match len.checked_sub(1).and_then(|delta| start.checked_add(delta)) {
            Some(end) => Self::new(start, end),
            None => Err(InvalidBoundsError {
                start,
                end: start.wrapping_add(len),
            }),
        }
    }

    pub fn start(self) -> u32 {
        self.start
    }

    pub fn end(self) -> u32 {
        self.end
    }

    /// Check if an address is contained within this address range.
    pub fn contains(self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }
}

#[derive(Error, Debug, Clone)]
#[error("bounds [{start:#x}, {end:#x}] do not form a valid 32-bit address range")]
pub struct InvalidBoundsError {
    start: u32,
    end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(AddressRange::new(4, 3).is_err());
        let range = AddressRange::new(0x1000, 0x100F).unwrap();
        assert_eq!(0x1000, range.start());
        assert_eq!(0x100F, range.end());
        assert_eq!("[0x1000, 0x100f]", range.to_string());
    }

    #[test]
    fn test_with_len() {
        let range = AddressRange::with_len(0x8000_0000, 0x100).unwrap();
        assert_eq!(0x8000_0000, range.start());
        assert_eq!(0x8000_00FF, range.end());
        assert!(AddressRange::with_len(0x10, 0).is_err());
        assert!(AddressRange::with_len(u32::MAX, 2).is_err());
        assert_eq!(
            u32::MAX,
            AddressRange::with_len(u32::MAX, 1).unwrap().end()
        );
    }

    #[test]
    fn test_contains() {
        let range = AddressRange::new(0x100, 0x1FF).unwrap();
        assert!(!range.contains(0xFF));
        assert!(range.contains(0x100));
        assert!(range.contains(0x1FF));
        assert!(!range.contains(0x200));
    }
}
