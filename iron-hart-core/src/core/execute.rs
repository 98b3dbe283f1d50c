use super::trap::Exception;
use super::Hart;
use crate::csr::specifier::{MEPC, MSTATUS, SEPC};
use crate::instruction::{
    AluOp, BranchCondition, CsrOp, DecodedOp, LoadWidth, Operation, StoreWidth, TrapReturn,
};
use crate::registers::Specifier;
use crate::{PrivilegeLevel, RawPrivilegeLevel};
use log::debug;

/// Syscall number of `exit` in the RISC-V Linux ABI.
const SYS_EXIT: u32 = 93;

/// Performs the architectural effects of a single decoded instruction on a [`Hart`].
///
/// The hart's staged next pc already points past the instruction when the executor runs; control
/// transfers overwrite it.
#[derive(Debug)]
pub(super) struct Executor<'h> {
    pub hart: &'h mut Hart,
}

impl<'h> Executor<'h> {
    pub fn execute(&mut self, op: DecodedOp) -> Result<(), Exception> {
        match op.operation {
            Operation::Alu(alu_op) => self.alu(alu_op, op),
            Operation::Load(width) => self.load(width, op),
            Operation::Store(width) => self.store(width, op),
            Operation::Branch(condition) => self.branch(condition, op),
            Operation::Csr(csr_op) => self.csr(csr_op, op),
            Operation::TrapReturn(TrapReturn::Mret) => self.mret(),
            Operation::TrapReturn(TrapReturn::Sret) => self.sret(),
            Operation::ECall => self.ecall(),
            Operation::EBreak => self.ebreak(),
            Operation::Illegal => Err(Exception::IllegalInstruction),
        }
    }

    /// Executes any instruction dispatched to the ALU: the register-register and
    /// register-immediate operations, `lui`, `auipc`, `jal` and `jalr`.
    ///
    /// The first operand is the pc for `auipc`/`jal` and `rs1` otherwise; the second is the
    /// immediate if there is one and `rs2` otherwise.
    ///
    /// > The target address \[of JAL\] is obtained by adding the sign-extended offset to the
    /// > address of the jump instruction. \[...\] JAL stores the address of the instruction
    /// > following the jump ('pc'+4) into register rd.
    ///
    /// > The target address \[of JALR\] is obtained by adding the sign-extended 12-bit I-immediate
    /// > to the register rs1, then setting the least-significant bit of the result to zero.
    fn alu(&mut self, alu_op: AluOp, op: DecodedOp) -> Result<(), Exception> {
        let pc = self.hart.state.pc;
        let a = if op.use_pc {
            pc
        } else {
            self.hart.registers.read(op.rs1)
        };
        let b = if op.has_imm {
            op.immediate as u32
        } else {
            self.hart.registers.read(op.rs2)
        };
        let result = alu(alu_op, a, b);
        match alu_op {
            AluOp::Jal | AluOp::Jalr => {
                self.hart.write_register(op.rd, pc.wrapping_add(op.len()));
                self.hart.state.set(result);
            }
            _ => self.hart.write_register(op.rd, result),
        }
        Ok(())
    }

    /// Executes a load.
    ///
    /// > The effective address is obtained by adding register rs1 to the sign-extended 12-bit
    /// > offset. Loads copy a value from memory to register rd.
    ///
    /// > LW loads a 32-bit value from memory into rd. LH loads a 16-bit value from memory, then
    /// > sign-extends to 32-bits before storing in rd. LHU loads a 16-bit value from memory but
    /// > then zero extends to 32-bits before storing in rd. LB and LBU are defined analogously for
    /// > 8-bit values.
    fn load(&mut self, width: LoadWidth, op: DecodedOp) -> Result<(), Exception> {
        let address = self
            .hart
            .registers
            .read(op.rs1)
            .wrapping_add_signed(op.immediate);
        let router = self.hart.router();
        let value = match width {
            LoadWidth::Lb => router.read8(address) as i8 as u32,
            LoadWidth::Lh => router.read16(address) as i16 as u32,
            LoadWidth::Lw => router.read32(address),
            LoadWidth::Lbu => router.read8(address) as u32,
            LoadWidth::Lhu => router.read16(address) as u32,
        };
        self.hart.write_register(op.rd, value);
        Ok(())
    }

    /// Executes a store.
    ///
    /// > Stores copy the value in register rs2 to memory.
    ///
    /// > The SW, SH, and SB instructions store 32-bit, 16-bit, and 8-bit values from the low bits
    /// > of register rs2 to memory.
    ///
    /// A store to the `tohost` address ends the program.
    fn store(&mut self, width: StoreWidth, op: DecodedOp) -> Result<(), Exception> {
        let address = self
            .hart
            .registers
            .read(op.rs1)
            .wrapping_add_signed(op.immediate);
        let value = self.hart.registers.read(op.rs2);
        let mut router = self.hart.router();
        match width {
            StoreWidth::Sb => router.write8(address, value as u8),
            StoreWidth::Sh => router.write16(address, value as u16),
            StoreWidth::Sw => router.write32(address, value),
        }
        if self.hart.config.tohost == Some(address) {
            debug!("Write of {value:#x} to tohost at {address:#010x}");
            self.hart.done = true;
        }
        Ok(())
    }

    /// Executes a conditional branch.
    ///
    /// > The 12-bit B-immediate encodes signed offsets in multiples of 2 bytes. The offset is
    /// > sign-extended and added to the address of the branch instruction to give the target
    /// > address.
    ///
    /// > BLT and BLTU take the branch if rs1 is less than rs2, using signed and unsigned
    /// > comparison respectively. BGE and BGEU take the branch if rs1 is greater than or equal to
    /// > rs2, using signed and unsigned comparison respectively.
    fn branch(&mut self, condition: BranchCondition, op: DecodedOp) -> Result<(), Exception> {
        let a = self.hart.registers.read(op.rs1);
        let b = self.hart.registers.read(op.rs2);
        let taken = match condition {
            BranchCondition::Beq => a == b,
            BranchCondition::Bne => a != b,
            BranchCondition::Blt => (a as i32) < (b as i32),
            BranchCondition::Bge => (a as i32) >= (b as i32),
            BranchCondition::Bltu => a < b,
            BranchCondition::Bgeu => a >= b,
        };
        if taken {
            let target = self.hart.state.pc.wrapping_add_signed(op.immediate);
            self.hart.state.set(target);
        }
        Ok(())
    }

    /// Executes one of the six Zicsr read-modify-write instructions.
    ///
    /// > The CSRRW (Atomic Read/Write CSR) instruction atomically swaps values in the CSRs and
    /// > integer registers. \[...\] If rd=x0, then the instruction shall not read the CSR and
    /// > shall not cause any of the side effects that might occur on a CSR read.
    ///
    /// > For both CSRRS and CSRRC, if rs1=x0, then the instruction will not write to the CSR at
    /// > all, and so shall not cause any of the side effects that might otherwise occur on a CSR
    /// > write, nor raise illegal instruction exceptions on accesses to read-only CSRs.
    ///
    /// The old value is only skipped for `csrrwi` with `rd = x0`. If either access is refused,
    /// neither the CSR nor `rd` is modified.
    fn csr(&mut self, csr_op: CsrOp, op: DecodedOp) -> Result<(), Exception> {
        let level = self.hart.privilege;
        let specifier = op.csr;
        let old = if csr_op == CsrOp::Csrrwi && op.rd == Specifier::X0 {
            0
        } else {
            self.hart.csrs.read(specifier, level)?
        };
        let (mask, writes) = match csr_op {
            CsrOp::Csrrw | CsrOp::Csrrs | CsrOp::Csrrc => (
                self.hart.registers.read(op.rs1),
                csr_op == CsrOp::Csrrw || op.rs1 != Specifier::X0,
            ),
            CsrOp::Csrrwi | CsrOp::Csrrsi | CsrOp::Csrrci => (
                op.immediate as u32,
                csr_op == CsrOp::Csrrwi || op.immediate != 0,
            ),
        };
        if writes {
            let value = match csr_op {
                CsrOp::Csrrw | CsrOp::Csrrwi => mask,
                CsrOp::Csrrs | CsrOp::Csrrsi => old | mask,
                CsrOp::Csrrc | CsrOp::Csrrci => old & !mask,
            };
            let previous = self.hart.csrs.get(specifier);
            self.hart.csrs.write(specifier, level, value)?;
            self.hart.log_csr_change(specifier, previous);
        }
        self.hart.write_register(op.rd, old);
        Ok(())
    }

    /// Executes an `mret` instruction.
    ///
    /// > An MRET or SRET instruction is used to return from a trap in M-mode or S-mode
    /// > respectively. When executing an xRET instruction, supposing xPP holds the value y, xIE
    /// > is set to xPIE; the privilege mode is changed to y; xPIE is set to 1; and xPP is set to
    /// > the least-privileged supported mode (U if U-mode is implemented, else M).
    ///
    /// `mpp` is reset to machine mode instead, so a nested trap taken without passing through a
    /// trap handler returns to machine mode.
    fn mret(&mut self) -> Result<(), Exception> {
        if self.hart.privilege < PrivilegeLevel::Machine {
            return Err(Exception::IllegalInstruction);
        }
        let mut status = self.hart.csrs.status();
        let level = status.mpp();
        status.set_mie(status.mpie());
        status.set_mpie(true);
        status.set_mpp(RawPrivilegeLevel::Machine);
        self.hart.write_csr(MSTATUS, status.bits());
        let epc = self.hart.csrs.get(MEPC);
        self.hart.privilege = level;
        self.hart.state.set(epc);
        debug!("mret to {epc:#010x} in {level} mode");
        Ok(())
    }

    /// Executes an `sret` instruction, the supervisor counterpart of [`Self::mret`].
    ///
    /// > Attempts to execute SRET at a privilege level lower than S raise an illegal instruction
    /// > exception.
    fn sret(&mut self) -> Result<(), Exception> {
        if self.hart.privilege < PrivilegeLevel::Supervisor {
            return Err(Exception::IllegalInstruction);
        }
        let mut status = self.hart.csrs.status();
        let level = status.spp();
        status.set_sie(status.spie());
        status.set_spie(true);
        status.set_spp(RawPrivilegeLevel::User);
        self.hart.write_csr(MSTATUS, status.bits());
        let epc = self.hart.csrs.get(SEPC);
        self.hart.privilege = level;
        self.hart.state.set(epc);
        debug!("sret to {epc:#010x} in {level} mode");
        Ok(())
    }

    /// Executes an `ecall` instruction.
    ///
    /// > The ECALL instruction is used to make a service request to the execution environment.
    ///
    /// The `exit` syscall (`a7 = 93`) is serviced by the simulator itself: `a0` is written to the
    /// `tohost` address and the hart halts. Any other request raises an environment call
    /// exception.
    fn ecall(&mut self) -> Result<(), Exception> {
        if self.hart.registers.read(Specifier::A7) != SYS_EXIT {
            return Err(Exception::environment_call(self.hart.privilege));
        }
        let code = self.hart.registers.read(Specifier::A0);
        if let Some(tohost) = self.hart.config.tohost {
            self.hart.router().write32(tohost, code);
        }
        debug!("exit syscall with code {code}");
        self.hart.exit_code = code;
        self.hart.done = true;
        Ok(())
    }

    /// Executes an `ebreak` instruction.
    ///
    /// > The EBREAK instruction is used to return control to a debugging environment.
    fn ebreak(&mut self) -> Result<(), Exception> {
        Err(Exception::Breakpoint)
    }
}

/// Applies an ALU operation to its two operands.
///
/// Shift amounts use the low 5 bits of `b`. Division never traps:
///
/// > The quotient of division by zero has all bits set, and the remainder of division by zero
/// > equals the dividend. Signed division overflow occurs only when the most-negative integer is
/// > divided by -1. The quotient of a signed division with overflow is equal to the dividend, and
/// > the remainder is zero.
fn alu(op: AluOp, a: u32, b: u32) -> u32 {
    let shamt = b & 0x1F;
    match op {
        AluOp::Add | AluOp::Auipc | AluOp::Jal => a.wrapping_add(b),
        AluOp::Jalr => a.wrapping_add(b) & !1,
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Sll => a << shamt,
        AluOp::Srl => a >> shamt,
        AluOp::Sra => ((a as i32) >> shamt) as u32,
        AluOp::Slt => ((a as i32) < (b as i32)) as u32,
        AluOp::Sltu => (a < b) as u32,
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Mulh => ((a as i32 as i64 * b as i32 as i64) >> 32) as u32,
        AluOp::Mulhsu => ((a as i32 as i64).wrapping_mul(b as i64) >> 32) as u32,
        AluOp::Mulhu => ((a as u64 * b as u64) >> 32) as u32,
        AluOp::Div => match b {
            0 => u32::MAX,
            _ => (a as i32).wrapping_div(b as i32) as u32,
        },
        AluOp::Divu => a.checked_div(b).unwrap_or(u32::MAX),
        AluOp::Rem => match b {
            0 => a,
            _ => (a as i32).wrapping_rem(b as i32) as u32,
        },
        AluOp::Remu => a.checked_rem(b).unwrap_or(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT_MIN: u32 = i32::MIN as u32;
    const MINUS_ONE: u32 = -1i32 as u32;

    #[test]
    fn test_add_sub() {
        assert_eq!(0, alu(AluOp::Add, u32::MAX, 1));
        assert_eq!(u32::MAX, alu(AluOp::Sub, 0, 1));
        assert_eq!(30, alu(AluOp::Sub, 31, 1));
        assert_eq!(0x1000, alu(AluOp::Auipc, 0x1000, 0));
    }

    #[test]
    fn test_jalr_clears_bit_zero() {
        assert_eq!(0x100, alu(AluOp::Jalr, 0xFF, 2));
        assert_eq!(0x100, alu(AluOp::Jalr, 0x100, 1));
        assert_eq!(0x100, alu(AluOp::Jal, 0x104, -4i32 as u32));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(3, alu(AluOp::Sra, 30, 3));
        assert_eq!(0xF000_0000, alu(AluOp::Sra, 0x8000_0000, 3));
        assert_eq!(0x1000_0000, alu(AluOp::Srl, 0x8000_0000, 3));
        assert_eq!(2, alu(AluOp::Sll, 1, 33));
        assert_eq!(0x8000_0000, alu(AluOp::Sll, 1, 31));
    }

    #[test]
    fn test_compare() {
        assert_eq!(1, alu(AluOp::Slt, MINUS_ONE, 0));
        assert_eq!(0, alu(AluOp::Sltu, MINUS_ONE, 0));
        assert_eq!(1, alu(AluOp::Sltu, 0, MINUS_ONE));
        assert_eq!(0, alu(AluOp::Slt, 5, 5));
    }

    #[test]
    fn test_multiply() {
        assert_eq!(6, alu(AluOp::Mul, 2, 3));
        assert_eq!(MINUS_ONE, alu(AluOp::Mulh, MINUS_ONE, 1));
        assert_eq!(0, alu(AluOp::Mulhu, MINUS_ONE, 1));
        assert_eq!(0xFFFF_FFFE, alu(AluOp::Mulhu, u32::MAX, u32::MAX));
        assert_eq!(0, alu(AluOp::Mulh, MINUS_ONE, MINUS_ONE));
        assert_eq!(0x4000_0000, alu(AluOp::Mulh, INT_MIN, INT_MIN));
        // -1 * (2^32 - 1) = -(2^32 - 1)
        assert_eq!(MINUS_ONE, alu(AluOp::Mulhsu, MINUS_ONE, u32::MAX));
        assert_eq!(0, alu(AluOp::Mulhsu, 1, u32::MAX));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(u32::MAX, alu(AluOp::Divu, 1234, 0));
        assert_eq!(1234, alu(AluOp::Remu, 1234, 0));
        assert_eq!(MINUS_ONE, alu(AluOp::Div, 1234, 0));
        assert_eq!(1234, alu(AluOp::Rem, 1234, 0));
        assert_eq!(INT_MIN, alu(AluOp::Rem, INT_MIN, 0));
    }

    #[test]
    fn test_signed_overflow() {
        assert_eq!(INT_MIN, alu(AluOp::Div, INT_MIN, MINUS_ONE));
        assert_eq!(0, alu(AluOp::Rem, INT_MIN, MINUS_ONE));
    }

    #[test]
    fn test_divide() {
        assert_eq!(-3i32 as u32, alu(AluOp::Div, -7i32 as u32, 2));
        assert_eq!(-1i32 as u32, alu(AluOp::Rem, -7i32 as u32, 2));
        assert_eq!(0x7FFF_FFFC, alu(AluOp::Divu, -7i32 as u32, 2));
        assert_eq!(1, alu(AluOp::Remu, -7i32 as u32, 2));
    }
}
