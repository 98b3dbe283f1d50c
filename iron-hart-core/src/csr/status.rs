use crate::{PrivilegeLevel, RawPrivilegeLevel};
use bitvec::{field::BitField, order::Lsb0, view::BitView};

/// Bits of `mstatus` visible through `sstatus`.
pub const SSTATUS_MASK: u32 = 0x800D_E762;

/// Typed view of the `mstatus` register.
///
/// > The mstatus register keeps track of and controls the hart’s current operating state. A
/// > restricted view of mstatus appears as the sstatus register in the S-level ISA.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Status(u32);

impl Status {
    pub fn new(mstatus: u32) -> Self {
        Self(mstatus)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if the MIE (M-mode Interrupt Enable) bit is set.
    pub fn mie(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::MIE]
    }

    /// Sets the MIE (M-mode Interrupt Enable) bit to `value`.
    pub fn set_mie(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::MIE, value);
    }

    /// Returns `true` if the SIE (S-mode Interrupt Enable) bit is set.
    pub fn sie(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::SIE]
    }

    /// Sets the SIE (S-mode Interrupt Enable) bit to `value`.
    pub fn set_sie(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::SIE, value);
    }

    /// Returns `true` if the MPIE (M-mode Previous Interrupt Enable) bit is set.
    pub fn mpie(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::MPIE]
    }

    /// Sets the MPIE (M-mode Previous Interrupt Enable) bit to `value`.
    pub fn set_mpie(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::MPIE, value);
    }

    /// Returns `true` if the SPIE (S-mode Previous Interrupt Enable) bit is set.
    pub fn spie(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::SPIE]
    }

    /// Sets the SPIE (S-mode Previous Interrupt Enable) bit to `value`.
    pub fn set_spie(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::SPIE, value);
    }

    /// Returns the raw 2-bit MPP (M-mode Previous Privilege level) field.
    pub fn raw_mpp(self) -> RawPrivilegeLevel {
        RawPrivilegeLevel::from_u2(self.0.view_bits::<Lsb0>()[idx::MPP..(idx::MPP + 2)].load_le())
    }

    /// Returns the privilege level encoded by the MPP field.
    ///
    /// The MPP field is **WARL**, and [`Self::set_mpp`] never stores the reserved level, so a
    /// reserved value can only appear through a raw construction; it reads as user mode.
    pub fn mpp(self) -> PrivilegeLevel {
        PrivilegeLevel::try_from(self.raw_mpp()).unwrap_or(PrivilegeLevel::User)
    }

    /// Sets the privilege level encoded by the MPP field to `value`.
    ///
    /// The MPP field is **WARL**, so the reserved level is ignored.
    pub fn set_mpp(&mut self, value: RawPrivilegeLevel) {
        let Ok(value) = PrivilegeLevel::try_from(value) else {
            return;
        };
        self.0.view_bits_mut::<Lsb0>()[idx::MPP..(idx::MPP + 2)].store_le(value as u8);
    }

    /// Returns the privilege level encoded by the SPP (S-mode Previous Privilege level) bit.
    pub fn spp(self) -> PrivilegeLevel {
        match self.0.view_bits::<Lsb0>()[idx::SPP] {
            true => PrivilegeLevel::Supervisor,
            false => PrivilegeLevel::User,
        }
    }

    /// Sets the SPP bit to `value`.
    ///
    /// The SPP field is **WARL**; only user and supervisor are representable.
    pub fn set_spp(&mut self, value: RawPrivilegeLevel) {
        match PrivilegeLevel::try_from(value) {
            Ok(value) if value <= PrivilegeLevel::Supervisor => {
                let bit = value as u8 != 0;
                self.0.view_bits_mut::<Lsb0>().set(idx::SPP, bit);
            }
            _ => {}
        }
    }

    /// Replace the bits of this register visible through `sstatus` by those of `sstatus`.
    pub fn set_sstatus(&mut self, sstatus: u32) {
        self.0 = (self.0 & !SSTATUS_MASK) | (sstatus & SSTATUS_MASK);
    }

    pub fn sstatus(self) -> u32 {
        self.0 & SSTATUS_MASK
    }
}

mod idx {
    pub const SIE: usize = 1;
    pub const MIE: usize = 3;
    pub const SPIE: usize = 5;
    pub const MPIE: usize = 7;
    pub const SPP: usize = 8;
    pub const MPP: usize = 11;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_enable_bits() {
        let mut status = Status::default();
        status.set_mie(true);
        assert_eq!(0x8, status.bits());
        status.set_mpie(true);
        assert_eq!(0x88, status.bits());
        status.set_sie(true);
        status.set_spie(true);
        assert_eq!(0xAA, status.bits());
        status.set_mie(false);
        assert!(!status.mie());
        assert!(status.mpie());
    }

    #[test]
    fn test_mpp_warl() {
        let mut status = Status::default();
        assert_eq!(PrivilegeLevel::User, status.mpp());
        status.set_mpp(RawPrivilegeLevel::Machine);
        assert_eq!(0x1800, status.bits());
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        status.set_mpp(RawPrivilegeLevel::Reserved);
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        status.set_mpp(RawPrivilegeLevel::Supervisor);
        assert_eq!(0x0800, status.bits());
    }

    #[test]
    fn test_spp() {
        let mut status = Status::default();
        status.set_spp(RawPrivilegeLevel::Supervisor);
        assert_eq!(PrivilegeLevel::Supervisor, status.spp());
        status.set_spp(RawPrivilegeLevel::Machine);
        assert_eq!(PrivilegeLevel::Supervisor, status.spp());
        status.set_spp(RawPrivilegeLevel::User);
        assert_eq!(0, status.bits());
    }

    #[test]
    fn test_sstatus_view() {
        let mut status = Status::new(0x0000_1888);
        assert_eq!(0, status.sstatus());
        status.set_sstatus(0xFFFF_FFFF);
        assert_eq!(SSTATUS_MASK, status.sstatus());
        assert!(status.mie());
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        assert!(status.sie());
    }
}
