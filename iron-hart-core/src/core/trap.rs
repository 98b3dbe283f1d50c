use crate::csr::AccessError;
use crate::PrivilegeLevel;
use thiserror::Error;

/// Bit set in `xcause` when the trap was caused by an interrupt.
pub const INTERRUPT_BIT: u32 = 1 << 31;

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Exception {
    /// Instruction address is not on a two-byte aligned boundary in memory.
    #[error("instruction address misaligned")]
    InstructionAddressMisaligned,
    /// Instruction fetch outside of the loaded program ranges.
    #[error("instruction access fault")]
    InstructionAccessFault,
    /// Generic exception used to communicate one of many possible scenarios:
    ///
    /// - Attempt to decode a reserved or unsupported instruction.
    /// - Attempt to access a non-existent CSR.
    /// - Attempt to access a CSR without the appropriate privilege level.
    /// - Attempt to write to a read-only CSR.
    /// - Attempt to execute `mret`/`sret` from a lower privilege level.
    #[error("illegal instruction")]
    IllegalInstruction,
    #[error("breakpoint")]
    Breakpoint,
    #[error("environment call from U-mode")]
    EnvironmentCallFromUMode,
    #[error("environment call from S-mode")]
    EnvironmentCallFromSMode,
    #[error("environment call from M-mode")]
    EnvironmentCallFromMMode,
}

impl Exception {
    /// Returns the exception code (cause) for this exception.
    pub fn code(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned => 0,
            Self::InstructionAccessFault => 1,
            Self::IllegalInstruction => 2,
            Self::Breakpoint => 3,
            Self::EnvironmentCallFromUMode => 8,
            Self::EnvironmentCallFromSMode => 9,
            Self::EnvironmentCallFromMMode => 11,
        }
    }

    /// The environment call exception raised by an `ecall` executed at `level`.
    pub fn environment_call(level: PrivilegeLevel) -> Self {
        match level {
            PrivilegeLevel::User => Self::EnvironmentCallFromUMode,
            PrivilegeLevel::Supervisor => Self::EnvironmentCallFromSMode,
            PrivilegeLevel::Machine => Self::EnvironmentCallFromMMode,
        }
    }
}

impl From<AccessError> for Exception {
    fn from(_: AccessError) -> Self {
        Self::IllegalInstruction
    }
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interrupt {
    #[error("supervisor software interrupt")]
    SupervisorSoftwareInterrupt,
    #[error("machine software interrupt")]
    MachineSoftwareInterrupt,
    #[error("supervisor timer interrupt")]
    SupervisorTimerInterrupt,
    #[error("machine timer interrupt")]
    MachineTimerInterrupt,
    #[error("supervisor external interrupt")]
    SupervisorExternalInterrupt,
    #[error("machine external interrupt")]
    MachineExternalInterrupt,
}

impl Interrupt {
    /// Interrupts in decreasing order of priority.
    pub const PRIORITY: [Self; 6] = [
        Self::MachineExternalInterrupt,
        Self::MachineSoftwareInterrupt,
        Self::MachineTimerInterrupt,
        Self::SupervisorExternalInterrupt,
        Self::SupervisorSoftwareInterrupt,
        Self::SupervisorTimerInterrupt,
    ];

    /// Returns the exception code (cause) for this interrupt.
    ///
    /// This is also the index of the interrupt's bit in `mip` and `mie`.
    pub fn code(self) -> u32 {
        match self {
            Self::SupervisorSoftwareInterrupt => 1,
            Self::MachineSoftwareInterrupt => 3,
            Self::SupervisorTimerInterrupt => 5,
            Self::MachineTimerInterrupt => 7,
            Self::SupervisorExternalInterrupt => 9,
            Self::MachineExternalInterrupt => 11,
        }
    }
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrapCause {
    #[error(transparent)]
    Exception(Exception),
    #[error(transparent)]
    Interrupt(Interrupt),
}

impl TrapCause {
    pub fn is_interrupt(self) -> bool {
        matches!(self, Self::Interrupt(_))
    }

    /// The value written to `xcause`: the cause code, with the top bit set for interrupts.
    pub fn code(self) -> u32 {
        match self {
            Self::Exception(exception) => exception.code(),
            Self::Interrupt(interrupt) => INTERRUPT_BIT | interrupt.code(),
        }
    }
}

impl From<Exception> for TrapCause {
    fn from(value: Exception) -> Self {
        Self::Exception(value)
    }
}

impl From<Interrupt> for TrapCause {
    fn from(value: Interrupt) -> Self {
        Self::Interrupt(value)
    }
}
