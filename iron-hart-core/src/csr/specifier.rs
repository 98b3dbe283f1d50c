//! Specifiers for the CSRs with architectural meaning in this model.
//!
//! Any other 12-bit specifier is plain backing storage.

use crate::RawPrivilegeLevel;

/// General 12-bit value representing a CSR specifier. Note that this can hold any 12-bit value,
/// even if the value represents an unsupported or non-existent CSR.
pub type CsrSpecifier = u16;

/// Number of addressable CSRs.
pub const COUNT: usize = 1 << 12;

//
// User trap setup and handling (`0x000..=0x005`, `0x040..=0x044`).
//
// These double as the mode-agnostic bases from which [`privileged`](super::CsrFile::privileged)
// derives the `s*` and `m*` counterparts.
//
/// User status register.
pub const USTATUS: CsrSpecifier = 0x000;
/// User interrupt-enable register.
pub const UIE: CsrSpecifier = 0x004;
/// User trap handler base address.
pub const UTVEC: CsrSpecifier = 0x005;
/// Scratch register for user trap handlers.
pub const USCRATCH: CsrSpecifier = 0x040;
/// User exception program counter.
pub const UEPC: CsrSpecifier = 0x041;
/// User trap cause.
pub const UCAUSE: CsrSpecifier = 0x042;
/// User bad address or instruction.
pub const UTVAL: CsrSpecifier = 0x043;
/// User interrupt pending.
pub const UIP: CsrSpecifier = 0x044;

//
// Unprivileged counters/timers (`0xC00..=0xC02`, `0xC80..=0xC82`).
//
/// Cycle counter for RDCYCLE instruction.
pub const CYCLE: CsrSpecifier = 0xC00;
/// Timer for RDTIME instruction.
pub const TIME: CsrSpecifier = 0xC01;
/// Instructions-retired counter for RDINSTRET instruction.
pub const INSTRET: CsrSpecifier = 0xC02;
/// Upper 32 bits of [`CYCLE`], RV32 only.
pub const CYCLEH: CsrSpecifier = 0xC80;
/// Upper 32 bits of [`TIME`], RV32 only.
pub const TIMEH: CsrSpecifier = 0xC81;
/// Upper 32 bits of [`INSTRET`], RV32 only.
pub const INSTRETH: CsrSpecifier = 0xC82;

//
// Supervisor trap setup and handling (`0x100..=0x106`, `0x140..=0x144`).
//
/// Supervisor status register.
pub const SSTATUS: CsrSpecifier = 0x100;
/// Supervisor interrupt-enable register.
pub const SIE: CsrSpecifier = 0x104;
/// Supervisor trap handler base address.
pub const STVEC: CsrSpecifier = 0x105;
/// Supervisor counter enable.
pub const SCOUNTEREN: CsrSpecifier = 0x106;
/// Scratch register for supervisor trap handlers.
pub const SSCRATCH: CsrSpecifier = 0x140;
/// Supervisor exception program counter.
pub const SEPC: CsrSpecifier = 0x141;
/// Supervisor trap cause.
pub const SCAUSE: CsrSpecifier = 0x142;
/// Supervisor bad address or instruction.
pub const STVAL: CsrSpecifier = 0x143;
/// Supervisor interrupt pending.
pub const SIP: CsrSpecifier = 0x144;

//
// Machine information registers (`0xF11..=0xF14`).
//
/// Vendor ID.
pub const MVENDORID: CsrSpecifier = 0xF11;
/// Architecture ID.
pub const MARCHID: CsrSpecifier = 0xF12;
/// Implementation ID.
pub const MIMPID: CsrSpecifier = 0xF13;
/// Hardware thread ID.
pub const MHARTID: CsrSpecifier = 0xF14;

//
// Machine trap setup (`0x300..=0x306`, `0x310`).
//
/// Machine status register.
pub const MSTATUS: CsrSpecifier = 0x300;
/// ISA and extensions.
pub const MISA: CsrSpecifier = 0x301;
/// Machine exception delegation register.
pub const MEDELEG: CsrSpecifier = 0x302;
/// Machine interrupt delegation register.
pub const MIDELEG: CsrSpecifier = 0x303;
/// Machine interrupt-enable register.
pub const MIE: CsrSpecifier = 0x304;
/// Machine trap-handler base address.
pub const MTVEC: CsrSpecifier = 0x305;
/// Machine counter enable.
pub const MCOUNTEREN: CsrSpecifier = 0x306;
/// Additional machine status register, RV32 only.
pub const MSTATUSH: CsrSpecifier = 0x310;

//
// Machine trap handling (`0x340..=0x344`).
//
/// Scratch register for machine trap handlers.
pub const MSCRATCH: CsrSpecifier = 0x340;
/// Machine exception program counter.
pub const MEPC: CsrSpecifier = 0x341;
/// Machine trap cause.
pub const MCAUSE: CsrSpecifier = 0x342;
/// Machine bad address or instruction.
pub const MTVAL: CsrSpecifier = 0x343;
/// Machine interrupt pending.
pub const MIP: CsrSpecifier = 0x344;

//
// Machine counters (`0xB00`, `0xB02`, `0xB80`, `0xB82`).
//
/// Machine cycle counter.
pub const MCYCLE: CsrSpecifier = 0xB00;
/// Machine instructions-retired counter.
pub const MINSTRET: CsrSpecifier = 0xB02;
/// Upper 32 bits of [`MCYCLE`], RV32 only.
pub const MCYCLEH: CsrSpecifier = 0xB80;
/// Upper 32 bits of [`MINSTRET`], RV32 only.
pub const MINSTRETH: CsrSpecifier = 0xB82;

/// Returns `true` if `specifier` is valid, which is the case if it fits in 12 bits.
pub fn is_valid(specifier: CsrSpecifier) -> bool {
    (specifier as usize) < COUNT
}

/// Returns `true` if this CSR only supports read access.
///
/// Requires [`is_valid(specifier)`](is_valid), otherwise the return value is undefined.
pub fn is_read_only(specifier: CsrSpecifier) -> bool {
    // The top two bits of a CSR specifier indicate whether the CSR is read-only (0b11) or
    // read/write (0b00, 0b01, 0b10)
    (specifier >> 10) & 0b11 == 0b11
}

/// Returns the minimum required privilege level to access this CSR.
///
/// Note that this returns a [`RawPrivilegeLevel`], meaning the minimum required privilege level
/// may be a reserved level. This still has a defined meaning: only higher privilege levels are
/// allowed to access the CSR.
pub fn required_privilege_level(specifier: CsrSpecifier) -> RawPrivilegeLevel {
    // Bits `9:8` indicate the minimum required privilege level
    RawPrivilegeLevel::from_u2(((specifier >> 8) & 0b11) as u8)
}
