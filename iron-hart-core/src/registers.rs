//! General purpose registers.

use std::fmt;
use std::fmt::Formatter;

/// The type of a single `x` register.
pub type X = u32;

/// The bit width of the `x` registers.
pub const XLEN: u32 = X::BITS;

/// The number of `x` registers available (indices start at `0` for `x0`)
pub const LEN: u8 = 32;

/// A RISC-V hart's general purpose registers.
///
/// There are 32 `x` word-size (32 bit) registers, named `x0` up to `x31`.
/// The register `x0` (aka `zero`) is always zero. Writes to it are ignored.
///
/// > For RV32I, the 32 x registers are each 32 bits wide, i.e., XLEN=32. Register x0 is hardwired
/// > with all bits equal to 0. General purpose registers x1–x31 hold values that various
/// > instructions interpret as a collection of Boolean values, or as two’s complement signed binary
/// > integers or unsigned binary integers.
///
/// It is not possible to get a mutable reference to an `x` register, since that would allow
/// unchecked writes to register `x0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    x_registers: [X; LEN as usize],
}

impl Registers {
    /// Returns a fresh set of all-zero registers.
    pub fn new() -> Self {
        Self {
            x_registers: [0; LEN as usize],
        }
    }

    /// Returns the value of an `x` register.
    pub fn read(&self, specifier: Specifier) -> X {
        self.x_registers[usize::from(specifier)]
    }

    /// Sets the value of an `x` register.
    ///
    /// Writes to register `x0` are ignored.
    pub fn write(&mut self, specifier: Specifier, value: X) {
        self.replace(specifier, value);
    }

    /// Replaces the value of an `x` register, returning its old value.
    ///
    /// Writes to register `x0` are ignored.
    pub fn replace(&mut self, specifier: Specifier, value: X) -> X {
        if specifier == Specifier::X0 {
            0 // Ignore writes to register `x0`
        } else {
            std::mem::replace(&mut self.x_registers[usize::from(specifier)], value)
        }
    }
}

/// An `x` register specifier. Can take values in the range `0..LEN`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Specifier(u8);

impl Specifier {
    /// Register `x0`, a.k.a. register `zero`, always returns `0` on read, and ignores any writes.
    pub const X0: Self = Specifier(0);
    /// Return address register `ra`.
    pub const RA: Self = Specifier(1);
    /// First argument/return value register `a0`.
    pub const A0: Self = Specifier(10);
    /// Syscall number register `a7`.
    pub const A7: Self = Specifier(17);

    /// Convert a 5-bit value into a register specifier.
    /// Panics if the value doesn't fit in 5 bits (`0..=31`).
    pub const fn from_u5(value_u5: u8) -> Self {
        const_assert_eq!(LEN, 32);
        if value_u5 > 31 {
            panic!("out of range u5 used");
        }
        Self(value_u5)
    }
}

impl From<Specifier> for u8 {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl From<Specifier> for usize {
    fn from(value: Specifier) -> Self {
        value.0 as usize
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(32, XLEN);
        const_assert!(LEN > 1);
        assert_eq!(17, u8::from(Specifier::A7));
    }

    #[test]
    fn test_write_to_zero() {
        let mut registers = Registers::default();
        assert_eq!(0, registers.read(Specifier::X0));
        for value in [1, 0xDEAD_BEEF, u32::MAX] {
            registers.write(Specifier::X0, value);
            assert_eq!(0, registers.read(Specifier::X0));
        }
    }

    #[test]
    fn test_read() {
        let registers = Registers::default();
        for i in 0..LEN {
            assert_eq!(0, registers.read(Specifier::from_u5(i)));
        }
    }

    #[test]
    fn test_write() {
        let mut registers = Registers::default();
        registers.write(Specifier::X0, 1);
        for i in 1..LEN {
            registers.write(Specifier::from_u5(i), i as u32 + 1);
        }
        assert_eq!(0, registers.read(Specifier::X0));
        for i in 1..LEN {
            assert_eq!(i as u32 + 1, registers.read(Specifier::from_u5(i)));
        }
    }

    #[test]
    fn test_replace() {
        let mut registers = Registers::default();
        assert_eq!(0, registers.replace(Specifier::X0, 0));
        for i in 1..LEN {
            assert_eq!(0, registers.replace(Specifier::from_u5(i), i as u32));
        }
        assert_eq!(0, registers.replace(Specifier::X0, 1));
        for i in 1..LEN {
            assert_eq!(
                i as u32,
                registers.replace(Specifier::from_u5(i), i as u32 + 1)
            );
        }
        assert_eq!(0, registers.read(Specifier::X0));
    }

    #[test]
    #[should_panic]
    fn test_from_u5_out_of_range() {
        let _ = Specifier::from_u5(32);
    }
}
