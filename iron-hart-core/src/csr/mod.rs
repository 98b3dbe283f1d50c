//! Control and Status Registers.
//!
//! Part of the "Zicsr" extension.

pub mod misa;
pub mod specifier;
pub mod status;

pub use misa::{Misa, MisaParseError};
pub use specifier::CsrSpecifier;
pub use status::Status;

use crate::{PrivilegeLevel, RawPrivilegeLevel};
use thiserror::Error;

/// The 4096 Control and Status Registers of a single RV32 hart.
///
/// > The standard RISC-V ISA sets aside a 12-bit encoding space (csr\[11:0]) for up to 4,096 CSRs.
/// > By convention, the upper 4 bits of the CSR address (csr\[11:8]) are used to encode the read
/// > and write accessibility of the CSRs according to privilege level as shown in Table 2.1. The
/// > top two bits (csr\[11:10]) indicate whether the register is read/write (00, 01, or 10) or
/// > read-only (11). The next two bits (csr\[9:8]) encode the lowest privilege level that can
/// > access the CSR.
///
/// Access control is a function of the specifier alone. [`CsrFile::read`] and [`CsrFile::write`]
/// apply it, while [`CsrFile::get`] and [`CsrFile::set`] bypass it for use by the hart itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrFile {
    registers: Box<[u32; specifier::COUNT]>,
}

impl CsrFile {
    /// Creates a register file in its reset state.
    pub fn new(misa: Misa, hart_id: u32) -> Self {
        let mut csrs = Self {
            registers: Box::new([0; specifier::COUNT]),
        };
        csrs.registers[specifier::MISA as usize] = misa.bits();
        csrs.registers[specifier::MHARTID as usize] = hart_id;
        let mut status = Status::default();
        status.set_mpp(RawPrivilegeLevel::Machine);
        csrs.set_status(status);
        csrs
    }

    /// Compose the specifier of the privilege-scoped variant of a user-level `base` CSR.
    ///
    /// For example `privileged(UCAUSE, Machine)` is `MCAUSE`.
    pub fn privileged(base: CsrSpecifier, level: PrivilegeLevel) -> CsrSpecifier {
        ((level as CsrSpecifier) << 8) | base
    }

    /// Read the value of a CSR by its specifier.
    ///
    /// `privilege_level` indicates at what privilege level the read is performed. If the CSR that
    /// is being read requires a higher privilege level (see
    /// [`specifier::required_privilege_level`]), then an [`AccessError::Privileged`] will be given.
    pub fn read(
        &self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
    ) -> Result<u32, AccessError> {
        Self::check_access(specifier, privilege_level)?;
        Ok(self.get(specifier))
    }

    /// Write a CSR on behalf of code running at `privilege_level`.
    ///
    /// Nothing is modified when an error is returned.
    pub fn write(
        &mut self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
        value: u32,
    ) -> Result<(), AccessError> {
        Self::check_access(specifier, privilege_level)?;
        if specifier::is_read_only(specifier) {
            return Err(AccessError::WriteToReadOnly(specifier));
        }
        self.set(specifier, value);
        Ok(())
    }

    /// Read a CSR without access checks.
    ///
    /// # Panics
    ///
    /// Panics if `specifier` does not fit in 12 bits.
    pub fn get(&self, specifier: CsrSpecifier) -> u32 {
        match specifier {
            specifier::SSTATUS => self.status().sstatus(),
            _ => self.registers[specifier as usize],
        }
    }

    /// Write a CSR without access checks, applying the legalisation of WARL fields.
    ///
    /// # Panics
    ///
    /// Panics if `specifier` does not fit in 12 bits.
    pub fn set(&mut self, specifier: CsrSpecifier, value: u32) {
        match specifier {
            specifier::MSTATUS => {
                let mut status = self.status();
                let old_mpp = status.raw_mpp();
                status = Status::new(value);
                if status.raw_mpp().is_reserved() {
                    status = Status::new(value & !(0b11 << 11));
                    status.set_mpp(old_mpp);
                }
                self.set_status(status);
            }
            specifier::SSTATUS => {
                let mut status = self.status();
                status.set_sstatus(value);
                self.set_status(status);
            }
            // Extensions are fixed at construction
            specifier::MISA => {}
            _ => self.registers[specifier as usize] = value,
        }
    }

    pub fn status(&self) -> Status {
        Status::new(self.registers[specifier::MSTATUS as usize])
    }

    pub fn set_status(&mut self, status: Status) {
        self.registers[specifier::MSTATUS as usize] = status.bits();
    }

    pub fn misa(&self) -> Misa {
        Misa::from_bits(self.registers[specifier::MISA as usize])
    }

    /// Returns `true` if bit `index` of `mip` is set.
    pub fn is_pending(&self, index: u32) -> bool {
        self.get(specifier::MIP) & (1 << index) != 0
    }

    pub fn set_pending(&mut self, index: u32, value: bool) {
        let mip = self.get(specifier::MIP);
        let mask = 1 << index;
        self.set(specifier::MIP, if value { mip | mask } else { mip & !mask });
    }

    /// Returns `true` if bit `index` of `mie` is set.
    pub fn is_enabled(&self, index: u32) -> bool {
        self.get(specifier::MIE) & (1 << index) != 0
    }

    /// Advance `mcycle` and `minstret` by one retired instruction, and refresh the read-only
    /// user-level shadows. `mtime`, when a timer is present, is mirrored into `time`.
    pub fn tick_counters(&mut self, mtime: Option<u64>) {
        let cycle = self.counter(specifier::MCYCLE, specifier::MCYCLEH).wrapping_add(1);
        let instret = self
            .counter(specifier::MINSTRET, specifier::MINSTRETH)
            .wrapping_add(1);
        self.set_counter(specifier::MCYCLE, specifier::MCYCLEH, cycle);
        self.set_counter(specifier::MINSTRET, specifier::MINSTRETH, instret);
        self.set_counter(specifier::CYCLE, specifier::CYCLEH, cycle);
        self.set_counter(specifier::INSTRET, specifier::INSTRETH, instret);
        if let Some(mtime) = mtime {
            self.set_counter(specifier::TIME, specifier::TIMEH, mtime);
        }
    }

    fn counter(&self, low: CsrSpecifier, high: CsrSpecifier) -> u64 {
        ((self.get(high) as u64) << 32) | self.get(low) as u64
    }

    fn set_counter(&mut self, low: CsrSpecifier, high: CsrSpecifier, value: u64) {
        self.registers[low as usize] = value as u32;
        self.registers[high as usize] = (value >> 32) as u32;
    }

    fn check_access(
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
    ) -> Result<(), AccessError> {
        if !specifier::is_valid(specifier) {
            return Err(AccessError::CsrUnsupported(specifier));
        }
        let required_level = specifier::required_privilege_level(specifier);
        if privilege_level < required_level {
            return Err(AccessError::Privileged {
                specifier,
                required_level,
                actual_level: privilege_level,
            });
        }
        Ok(())
    }
}

/// Errors that can occur when attempting to access a CSR.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AccessError {
    #[error("unsupported CSR: {0:#05X}")]
    CsrUnsupported(CsrSpecifier),
    /// Attempt to access a CSR that requires a higher privilege level.
    #[error(
        "cannot access specifier {specifier:#05X} from privilege level {actual_level}, \
             since it requires privilege level {required_level}"
    )]
    Privileged {
        /// The CSR for which access was requested.
        specifier: CsrSpecifier,
        /// The minimum required privilege level to access that CSR.
        required_level: RawPrivilegeLevel,
        /// The actual privilege level from which the access was performed.
        actual_level: PrivilegeLevel,
    },
    /// Attempt to write to a read-only register.
    #[error("writing to read-only CSR {0:#05X} is invalid")]
    WriteToReadOnly(CsrSpecifier),
}

#[cfg(test)]
mod tests {
    use super::specifier::*;
    use super::*;

    fn csrs() -> CsrFile {
        CsrFile::new(Misa::default(), 0)
    }

    #[test]
    fn test_reset_state() {
        let csrs = csrs();
        assert_eq!(Misa::default().bits(), csrs.get(MISA));
        assert_eq!(PrivilegeLevel::Machine, csrs.status().mpp());
        assert_eq!(0, csrs.get(MCAUSE));
        assert_eq!(7, CsrFile::new(Misa::default(), 7).get(MHARTID));
    }

    #[test]
    fn test_privileged_specifier() {
        assert_eq!(UCAUSE, CsrFile::privileged(UCAUSE, PrivilegeLevel::User));
        assert_eq!(SEPC, CsrFile::privileged(UEPC, PrivilegeLevel::Supervisor));
        assert_eq!(MTVEC, CsrFile::privileged(UTVEC, PrivilegeLevel::Machine));
        assert_eq!(MTVAL, CsrFile::privileged(UTVAL, PrivilegeLevel::Machine));
    }

    #[test]
    fn test_privilege_gating() {
        let mut csrs = csrs();
        assert_eq!(
            Err(AccessError::Privileged {
                specifier: MSCRATCH,
                required_level: RawPrivilegeLevel::Machine,
                actual_level: PrivilegeLevel::User,
            }),
            csrs.read(MSCRATCH, PrivilegeLevel::User)
        );
        assert!(csrs.write(MSCRATCH, PrivilegeLevel::User, 1).is_err());
        assert!(csrs.write(MSCRATCH, PrivilegeLevel::Supervisor, 1).is_err());
        assert_eq!(0, csrs.get(MSCRATCH));

        csrs.write(MSCRATCH, PrivilegeLevel::Machine, 0x1234).unwrap();
        assert_eq!(Ok(0x1234), csrs.read(MSCRATCH, PrivilegeLevel::Machine));

        csrs.write(SSCRATCH, PrivilegeLevel::Supervisor, 5).unwrap();
        assert_eq!(Ok(5), csrs.read(SSCRATCH, PrivilegeLevel::Machine));
        assert!(csrs.read(SSCRATCH, PrivilegeLevel::User).is_err());

        // The reserved level is only accessible from machine mode
        assert!(csrs.read(0x200, PrivilegeLevel::Supervisor).is_err());
        assert!(csrs.read(0x200, PrivilegeLevel::Machine).is_ok());
    }

    #[test]
    fn test_read_only() {
        let mut csrs = csrs();
        assert_eq!(
            Err(AccessError::WriteToReadOnly(MHARTID)),
            csrs.write(MHARTID, PrivilegeLevel::Machine, 1)
        );
        assert_eq!(
            Err(AccessError::WriteToReadOnly(CYCLE)),
            csrs.write(CYCLE, PrivilegeLevel::Machine, 1)
        );
        assert!(csrs.read(CYCLE, PrivilegeLevel::User).is_ok());
    }

    #[test]
    fn test_unsupported() {
        let mut csrs = csrs();
        assert_eq!(
            Err(AccessError::CsrUnsupported(0x1000)),
            csrs.read(0x1000, PrivilegeLevel::Machine)
        );
        assert!(csrs.write(0xFFFF, PrivilegeLevel::Machine, 0).is_err());
    }

    #[test]
    fn test_mstatus_mpp_warl() {
        let mut csrs = csrs();
        csrs.set(MSTATUS, 0x0000_1008);
        assert_eq!(PrivilegeLevel::Machine, csrs.status().mpp());
        assert!(csrs.status().mie());
        assert_eq!(0x0000_1808, csrs.get(MSTATUS));
        csrs.set(MSTATUS, 0);
        assert_eq!(PrivilegeLevel::User, csrs.status().mpp());
    }

    #[test]
    fn test_sstatus_alias() {
        let mut csrs = csrs();
        csrs.write(SSTATUS, PrivilegeLevel::Supervisor, 0x0000_0122)
            .unwrap();
        let status = csrs.status();
        assert!(status.sie());
        assert!(status.spie());
        assert_eq!(PrivilegeLevel::Supervisor, status.spp());
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        assert_eq!(0x0000_0122, csrs.get(SSTATUS));
        assert_eq!(0x0000_1922, csrs.get(MSTATUS));
    }

    #[test]
    fn test_misa_is_fixed() {
        let mut csrs = csrs();
        csrs.write(MISA, PrivilegeLevel::Machine, 0).unwrap();
        assert_eq!(Misa::default(), csrs.misa());
    }

    #[test]
    fn test_counters() {
        let mut csrs = csrs();
        csrs.set(MCYCLE, u32::MAX);
        csrs.tick_counters(None);
        assert_eq!(0, csrs.get(MCYCLE));
        assert_eq!(1, csrs.get(MCYCLEH));
        assert_eq!(0, csrs.get(CYCLE));
        assert_eq!(1, csrs.get(CYCLEH));
        assert_eq!(1, csrs.get(MINSTRET));
        assert_eq!(1, csrs.get(INSTRET));
        assert_eq!(0, csrs.get(TIME));
        csrs.tick_counters(Some(0x1_0000_0002));
        assert_eq!(2, csrs.get(TIME));
        assert_eq!(1, csrs.get(TIMEH));
        assert_eq!(2, csrs.get(INSTRET));
    }

    #[test]
    fn test_pending_and_enabled() {
        let mut csrs = csrs();
        assert!(!csrs.is_pending(7));
        csrs.set_pending(7, true);
        assert_eq!(0x80, csrs.get(MIP));
        assert!(csrs.is_pending(7));
        csrs.set_pending(7, false);
        assert_eq!(0, csrs.get(MIP));
        csrs.set(MIE, 0x80);
        assert!(csrs.is_enabled(7));
        assert!(!csrs.is_enabled(3));
    }
}
