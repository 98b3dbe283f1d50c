//! Provides a simulatable RV32IMC hart.

mod execute;
pub mod trap;

use crate::address_range::AddressRange;
use crate::csr::specifier::{self, CsrSpecifier};
use crate::csr::{CsrFile, Misa};
use crate::instruction::{self, DecodedOp, Operation};
use crate::memory::{AddressRouter, SparseMemory};
use crate::registers::{Registers, Specifier};
use crate::timer::{TimerConfig, TimerDevice};
use crate::{PrivilegeLevel, RawPrivilegeLevel};
use execute::Executor;
use log::{debug, trace, warn};
use std::io;
use trap::{Exception, Interrupt, TrapCause, INTERRUPT_BIT};

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Extensions reported by `misa`. Compressed and multiply/divide instructions are illegal
    /// unless their extension is present.
    pub misa: Misa,
    /// Value of `mhartid`.
    pub hart_id: u32,
    /// Address to which the pc is reset.
    pub reset_vector: u32,
    /// Address of the `tohost` word. A store to it ends the program.
    pub tohost: Option<u32>,
    /// Ranges holding the loaded program. Execution leaving them raises an instruction access
    /// fault. Empty means unrestricted.
    pub program_ranges: Vec<AddressRange>,
    /// Memory-mapped machine timer, if any.
    pub timer: Option<TimerConfig>,
}

/// Write of an `x` register by the current instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegisterChange {
    pub index: Specifier,
    pub previous: u32,
    pub value: u32,
}

/// Write of a CSR by the current instruction or trap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CsrChange {
    pub specifier: CsrSpecifier,
    pub previous: u32,
    pub value: u32,
}

/// The observable state of the instruction in flight.
///
/// The pc is updated in two phases: execution stages the address of the next instruction with
/// [`set`](Self::set), and [`update`](Self::update) makes it current on commit.
#[derive(Debug, Clone, Default)]
pub struct HartState {
    pub pc: u32,
    pub next_pc: u32,
    /// Raw instruction word fetched at `pc`.
    pub instr: u32,
    pub dec: DecodedOp,
    pub register_changes: Vec<RegisterChange>,
    pub csr_changes: Vec<CsrChange>,
}

impl HartState {
    pub fn set(&mut self, next_pc: u32) {
        self.next_pc = next_pc;
    }

    pub fn update(&mut self) {
        self.pc = self.next_pc;
    }

    fn clear_logs(&mut self) {
        self.register_changes.clear();
        self.csr_changes.clear();
    }
}

/// What happened during a single [`Hart::step`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StepOutcome {
    /// The instruction completed normally.
    Retired,
    /// The instruction raised an exception, and control was transferred to the trap handler.
    Trapped(TrapCause),
    /// The program requested to exit, either now or in an earlier step.
    Halted,
}

/// RISC-V hart implementing RV32IM, optionally C, with machine, supervisor and user modes.
///
/// > From the perspective of software running in a given execution environment, a hart is a
/// > resource that autonomously fetches and executes RISC-V instructions within that execution
/// > environment.
///
/// Execution is split in two calls: [`step`](Self::step) fetches, decodes and executes one
/// instruction, taking a trap if it raises an exception, and [`commit`](Self::commit) makes the
/// new pc current, advances the counters and takes pending interrupts.
///
/// All traps are taken in machine mode.
#[derive(Debug)]
pub struct Hart {
    config: Config,
    state: HartState,
    registers: Registers,
    csrs: CsrFile,
    privilege: PrivilegeLevel,
    memory: SparseMemory,
    timer: Option<TimerDevice>,
    done: bool,
    exit_code: u32,
}

impl Hart {
    /// Creates a hart in its reset state, in machine mode, starting the timer thread if a timer
    /// is configured.
    pub fn new(config: Config) -> io::Result<Self> {
        let timer = config.timer.clone().map(TimerDevice::start).transpose()?;
        let state = HartState {
            pc: config.reset_vector,
            next_pc: config.reset_vector,
            ..HartState::default()
        };
        Ok(Self {
            csrs: CsrFile::new(config.misa, config.hart_id),
            config,
            state,
            registers: Registers::new(),
            privilege: PrivilegeLevel::Machine,
            memory: SparseMemory::new(),
            timer,
            done: false,
            exit_code: 0,
        })
    }

    /// Provide a read-only view of this hart's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Copy `bytes` into memory at `address`.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        self.memory.load(address, bytes);
    }

    pub fn memory(&self) -> &SparseMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.memory
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn csrs(&self) -> &CsrFile {
        &self.csrs
    }

    pub fn csrs_mut(&mut self) -> &mut CsrFile {
        &mut self.csrs
    }

    pub fn privilege(&self) -> PrivilegeLevel {
        self.privilege
    }

    pub fn timer(&self) -> Option<&TimerDevice> {
        self.timer.as_ref()
    }

    /// The instruction in flight and the changes it made.
    pub fn state(&self) -> &HartState {
        &self.state
    }

    /// Move execution to `pc`, discarding the staged next pc.
    pub fn set_pc(&mut self, pc: u32) {
        self.state.pc = pc;
        self.state.next_pc = pc;
    }

    /// Returns `true` once the program has requested to exit.
    pub fn done(&self) -> bool {
        self.done
    }

    /// The exit status of the program: the `tohost` word if a `tohost` address is configured,
    /// otherwise the code passed to the `exit` syscall.
    pub fn tohost(&self) -> u32 {
        match self.config.tohost {
            Some(address) => self.memory.read32(address),
            None => self.exit_code,
        }
    }

    /// Mark `interrupt` as pending in `mip`. It is taken by a later [`commit`](Self::commit) once
    /// enabled.
    pub fn set_pending(&mut self, interrupt: Interrupt) {
        self.csrs.set_pending(interrupt.code(), true);
    }

    /// Fetch, decode and execute the instruction at the pc.
    ///
    /// If the instruction raises an exception, the trap is taken immediately and the staged next
    /// pc points to the trap handler.
    pub fn step(&mut self) -> StepOutcome {
        if self.done {
            return StepOutcome::Halted;
        }
        match self.fetch_and_execute() {
            Ok(()) if self.done => StepOutcome::Halted,
            Ok(()) => StepOutcome::Retired,
            Err(exception) => {
                let cause = TrapCause::from(exception);
                self.trap(cause);
                StepOutcome::Trapped(cause)
            }
        }
    }

    /// Make the staged pc current, advance the counters and take the highest priority pending
    /// interrupt that is enabled. Clears the change logs of the step.
    pub fn commit(&mut self) {
        self.state.update();
        let mtime = self.timer.as_ref().map(|timer| timer.registers().mtime());
        self.csrs.tick_counters(mtime);
        if let Some(timer) = &self.timer {
            let timer_interrupt = Interrupt::MachineTimerInterrupt.code();
            let registers = timer.registers();
            if self.csrs.is_enabled(timer_interrupt) && registers.mtime() > registers.mtimecmp() {
                self.csrs.set_pending(timer_interrupt, true);
            }
        }
        if !self.done {
            let pending = Interrupt::PRIORITY.into_iter().find(|interrupt| {
                self.csrs.is_pending(interrupt.code()) && self.csrs.is_enabled(interrupt.code())
            });
            if let Some(interrupt) = pending {
                if self.trap(interrupt.into()) {
                    self.state.update();
                }
            }
        }
        self.state.clear_logs();
    }

    fn fetch_and_execute(&mut self) -> Result<(), Exception> {
        let pc = self.state.pc;
        let misa = self.csrs.misa();
        let alignment = if misa.has('c') { 0b01 } else { 0b11 };
        if pc & alignment != 0 {
            return Err(Exception::InstructionAddressMisaligned);
        }
        let instr = self.router().read32(pc);
        let dec = instruction::decode(instr);
        self.state.instr = instr;
        self.state.dec = dec;
        trace!("{pc:#010x}: {instr:#010x} {dec}");

        let multiply_divide =
            matches!(dec.operation, Operation::Alu(op) if op.is_multiply_divide());
        if (dec.is_compressed && !misa.has('c')) || (multiply_divide && !misa.has('m')) {
            return Err(Exception::IllegalInstruction);
        }

        let next_pc = pc.wrapping_add(dec.len());
        self.state.set(next_pc);
        if !self.in_program(next_pc) {
            warn!("Execution left the loaded program: {next_pc:#010x} after {pc:#010x}");
            return Err(Exception::InstructionAccessFault);
        }
        Executor { hart: self }.execute(dec)
    }

    fn in_program(&self, address: u32) -> bool {
        self.config.program_ranges.is_empty()
            || self
                .config
                .program_ranges
                .iter()
                .any(|range| range.contains(address))
    }

    /// Transfer control to the machine-mode trap handler for `cause`.
    ///
    /// Interrupts are only taken if they are pending, enabled in `mie`, and globally enabled.
    /// Returns whether the trap was taken.
    ///
    /// Taking an interrupt moves `mstatus.MIE` into `MPIE`, clears `MIE` and sets `MPP` to
    /// machine. Exceptions leave `mstatus` alone. Either way the hart continues in machine mode.
    ///
    /// The saved pc is that of the trapping instruction for `ecall` and `ebreak`, and the current
    /// pc plus four for every other cause. For interrupts the current pc has already been
    /// advanced by [`commit`](Self::commit).
    fn trap(&mut self, cause: TrapCause) -> bool {
        if let TrapCause::Interrupt(interrupt) = cause {
            let index = interrupt.code();
            // Interrupts for M-mode are always enabled when running in a less privileged mode
            let globally_enabled =
                self.privilege < PrivilegeLevel::Machine || self.csrs.status().mie();
            if !(self.csrs.is_pending(index) && self.csrs.is_enabled(index) && globally_enabled) {
                return false;
            }
            self.csrs.set_pending(index, false);
            let mut status = self.csrs.status();
            status.set_mpie(status.mie());
            status.set_mie(false);
            status.set_mpp(RawPrivilegeLevel::Machine);
            self.write_csr(specifier::MSTATUS, status.bits());
        }

        let epc = match cause {
            TrapCause::Exception(
                Exception::Breakpoint
                | Exception::EnvironmentCallFromUMode
                | Exception::EnvironmentCallFromSMode
                | Exception::EnvironmentCallFromMMode,
            ) => self.state.pc,
            _ => self.state.pc.wrapping_add(4),
        };

        let from = self.privilege;
        self.privilege = PrivilegeLevel::Machine;

        let level = self.privilege;
        self.write_csr(CsrFile::privileged(specifier::UCAUSE, level), cause.code());
        self.write_csr(CsrFile::privileged(specifier::UTVAL, level), 0);
        self.write_csr(CsrFile::privileged(specifier::UEPC, level), epc & !1);

        let tvec = self.csrs.get(CsrFile::privileged(specifier::UTVEC, level));
        let mut handler = tvec & !0b11;
        if cause.is_interrupt() && tvec & 0b11 == 1 {
            handler = handler.wrapping_add(4 * (cause.code() & !INTERRUPT_BIT));
        }
        self.state.set(handler);
        debug!(
            cause = cause.code(),
            epc = epc,
            handler = handler;
            "Trap {cause} from {from} mode"
        );
        true
    }

    fn router(&mut self) -> AddressRouter<'_> {
        AddressRouter::new(&mut self.memory, self.timer.as_ref())
    }

    fn write_register(&mut self, index: Specifier, value: u32) {
        if index == Specifier::X0 {
            return;
        }
        let previous = self.registers.replace(index, value);
        trace!("{index} <- {value:#010x}");
        self.state.register_changes.push(RegisterChange {
            index,
            previous,
            value,
        });
    }

    /// Write a CSR without access checks, recording the change.
    fn write_csr(&mut self, specifier: CsrSpecifier, value: u32) {
        let previous = self.csrs.get(specifier);
        self.csrs.set(specifier, value);
        self.log_csr_change(specifier, previous);
    }

    fn log_csr_change(&mut self, specifier: CsrSpecifier, previous: u32) {
        let value = self.csrs.get(specifier);
        trace!("csr {specifier:#05x} <- {value:#010x}");
        self.state.csr_changes.push(CsrChange {
            specifier,
            previous,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{encode_i, encode_s};
    use crate::instruction::{opcodes, words};

    fn hart() -> Hart {
        Hart::new(Config::default()).unwrap()
    }

    fn hart_with(program: &[u32]) -> Hart {
        let mut hart = hart();
        for (address, word) in (0u32..).step_by(4).zip(program) {
            hart.memory_mut().write32(address, *word);
        }
        hart
    }

    fn run(hart: &mut Hart) -> StepOutcome {
        let outcome = hart.step();
        hart.commit();
        outcome
    }

    #[test]
    fn test_reset_state() {
        let hart = Hart::new(Config {
            reset_vector: 0x8000_0000,
            hart_id: 3,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(0x8000_0000, hart.state().pc);
        assert_eq!(PrivilegeLevel::Machine, hart.privilege());
        assert_eq!(3, hart.csrs().get(specifier::MHARTID));
        assert!(!hart.done());
        assert!(hart.timer().is_none());
    }

    #[test]
    fn test_change_logs() {
        // addi x5, x0, 9
        let mut hart = hart_with(&[encode_i(9, 0, 0b000, 5, opcodes::OP_IMM)]);
        assert_eq!(StepOutcome::Retired, hart.step());
        assert_eq!(
            vec![RegisterChange {
                index: Specifier::from_u5(5),
                previous: 0,
                value: 9
            }],
            hart.state().register_changes
        );
        assert_eq!(4, hart.state().next_pc);
        assert_eq!(0, hart.state().pc);
        hart.commit();
        assert_eq!(4, hart.state().pc);
        assert!(hart.state().register_changes.is_empty());
    }

    #[test]
    fn test_writes_to_x0_are_not_logged() {
        let mut hart = hart_with(&[encode_i(9, 0, 0b000, 0, opcodes::OP_IMM)]);
        assert_eq!(StepOutcome::Retired, hart.step());
        assert!(hart.state().register_changes.is_empty());
        assert_eq!(0, hart.registers().read(Specifier::X0));
    }

    #[test]
    fn test_illegal_instruction_traps() {
        let mut hart = hart_with(&[0xFFFF_FFFF]);
        hart.csrs_mut().set(specifier::MTVEC, 0x100);
        assert_eq!(
            StepOutcome::Trapped(Exception::IllegalInstruction.into()),
            run(&mut hart)
        );
        assert_eq!(0x100, hart.state().pc);
        assert_eq!(2, hart.csrs().get(specifier::MCAUSE));
        assert_eq!(4, hart.csrs().get(specifier::MEPC));
        assert_eq!(0, hart.csrs().get(specifier::MTVAL));
    }

    #[test]
    fn test_ebreak_saves_its_own_pc() {
        let mut hart = hart_with(&[
            encode_i(0, 0, 0b000, 0, opcodes::OP_IMM),
            words::EBREAK,
        ]);
        hart.csrs_mut().set(specifier::MTVEC, 0x200);
        run(&mut hart);
        assert_eq!(
            StepOutcome::Trapped(Exception::Breakpoint.into()),
            run(&mut hart)
        );
        assert_eq!(4, hart.csrs().get(specifier::MEPC));
        assert_eq!(0x200, hart.state().pc);
    }

    #[test]
    fn test_multiply_requires_m_extension() {
        // mul x1, x2, x3
        let mut hart = Hart::new(Config {
            misa: "rv32i".parse().unwrap(),
            ..Config::default()
        })
        .unwrap();
        hart.memory_mut().write32(0, 0x0231_00B3);
        assert_eq!(
            StepOutcome::Trapped(Exception::IllegalInstruction.into()),
            hart.step()
        );
    }

    #[test]
    fn test_compressed_requires_c_extension() {
        let mut without_c = Hart::new(Config {
            misa: "rv32im".parse().unwrap(),
            ..Config::default()
        })
        .unwrap();
        // c.li x10, 7
        without_c.memory_mut().write16(0, 0x451D);
        assert_eq!(
            StepOutcome::Trapped(Exception::IllegalInstruction.into()),
            without_c.step()
        );

        let mut hart = hart();
        hart.memory_mut().write16(0, 0x451D);
        assert_eq!(StepOutcome::Retired, run(&mut hart));
        assert_eq!(7, hart.registers().read(Specifier::A0));
        assert_eq!(2, hart.state().pc);
    }

    #[test]
    fn test_program_ranges() {
        let mut hart = Hart::new(Config {
            program_ranges: vec![AddressRange::new(0, 4).unwrap()],
            ..Config::default()
        })
        .unwrap();
        let nop = encode_i(0, 0, 0b000, 0, opcodes::OP_IMM);
        hart.memory_mut().write32(0, nop);
        hart.memory_mut().write32(4, nop);
        assert_eq!(StepOutcome::Retired, run(&mut hart));
        assert_eq!(
            StepOutcome::Trapped(Exception::InstructionAccessFault.into()),
            run(&mut hart)
        );
        assert_eq!(1, hart.csrs().get(specifier::MCAUSE));
    }

    #[test]
    fn test_store_to_tohost_halts() {
        // sw x0, 0x40(x0)
        let mut hart = Hart::new(Config {
            tohost: Some(0x40),
            ..Config::default()
        })
        .unwrap();
        hart.memory_mut()
            .write32(0, encode_s(0x40, 0, 0, 0b010, opcodes::STORE));
        assert_eq!(StepOutcome::Halted, run(&mut hart));
        assert!(hart.done());
        assert_eq!(StepOutcome::Halted, hart.step());
        assert_eq!(0, hart.tohost());
    }

    #[test]
    fn test_counters_advance_on_commit() {
        let nop = encode_i(0, 0, 0b000, 0, opcodes::OP_IMM);
        let mut hart = hart_with(&[nop, nop, nop]);
        for _ in 0..3 {
            run(&mut hart);
        }
        assert_eq!(3, hart.csrs().get(specifier::MCYCLE));
        assert_eq!(3, hart.csrs().get(specifier::MINSTRET));
        assert_eq!(3, hart.csrs().get(specifier::INSTRET));
    }

    #[test]
    fn test_injected_interrupt() {
        let nop = encode_i(0, 0, 0b000, 0, opcodes::OP_IMM);
        let mut hart = hart_with(&[nop, nop]);
        hart.csrs_mut().set(specifier::MTVEC, 0x101);
        hart.csrs_mut().set(specifier::MIE, 1 << 3);
        hart.set_pending(Interrupt::MachineSoftwareInterrupt);

        // Globally disabled in machine mode
        run(&mut hart);
        assert_eq!(4, hart.state().pc);

        hart.csrs_mut().set(specifier::MSTATUS, 1 << 3);
        run(&mut hart);
        assert_eq!(0x100 + 4 * 3, hart.state().pc);
        assert_eq!(0x8000_0003, hart.csrs().get(specifier::MCAUSE));
        // pc of the committed instruction is 8
        assert_eq!(12, hart.csrs().get(specifier::MEPC));
        assert!(!hart.csrs().is_pending(3));
        let status = hart.csrs().status();
        assert!(!status.mie());
        assert!(status.mpie());
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
    }
}
