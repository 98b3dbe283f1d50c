//! Instruction decoding.
//!
//! [`decode`] is a total, pure function from a raw instruction word to a [`DecodedOp`]. Every
//! encoding that is reserved or not implemented decodes to [`Operation::Illegal`].

use crate::bits;
use crate::compressed;
use crate::csr::CsrSpecifier;
use crate::registers::Specifier;
use std::fmt;

/// Major opcodes (bits `[6:0]`) of the 32-bit encodings understood by the decoder.
pub mod opcodes {
    pub const LOAD: u32 = 0b000_0011;
    pub const MISC_MEM: u32 = 0b000_1111;
    pub const OP_IMM: u32 = 0b001_0011;
    pub const AUIPC: u32 = 0b001_0111;
    pub const STORE: u32 = 0b010_0011;
    pub const OP: u32 = 0b011_0011;
    pub const LUI: u32 = 0b011_0111;
    pub const BRANCH: u32 = 0b110_0011;
    pub const JALR: u32 = 0b110_0111;
    pub const JAL: u32 = 0b110_1111;
    pub const SYSTEM: u32 = 0b111_0011;
}

/// Full encodings of the argument-less system instructions.
pub mod words {
    pub const ECALL: u32 = 0x0000_0073;
    pub const EBREAK: u32 = 0x0010_0073;
    pub const SRET: u32 = 0x1020_0073;
    pub const MRET: u32 = 0x3020_0073;
    pub const WFI: u32 = 0x1050_0073;
    /// `c.ebreak`
    pub const C_EBREAK: u16 = 0x9002;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AluOp {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Sll,
    Srl,
    Sra,
    Slt,
    Sltu,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    Auipc,
    Jal,
    Jalr,
}

impl AluOp {
    /// Returns `true` for the operations added by the M extension.
    pub fn is_multiply_divide(self) -> bool {
        matches!(
            self,
            Self::Mul
                | Self::Mulh
                | Self::Mulhsu
                | Self::Mulhu
                | Self::Div
                | Self::Divu
                | Self::Rem
                | Self::Remu
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadWidth {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreWidth {
    Sb,
    Sh,
    Sw,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BranchCondition {
    Beq,
    Bne,
    Blt,
    Bltu,
    Bge,
    Bgeu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrOp {
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrapReturn {
    Mret,
    Sret,
}

/// What a decoded instruction does. Exactly one variant describes any instruction word.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    Alu(AluOp),
    Load(LoadWidth),
    Store(StoreWidth),
    Branch(BranchCondition),
    Csr(CsrOp),
    TrapReturn(TrapReturn),
    Illegal,
    ECall,
    EBreak,
}

impl Operation {
    pub fn target(self) -> PipelineTarget {
        match self {
            Self::Alu(_) => PipelineTarget::Alu,
            Self::Load(_) | Self::Store(_) => PipelineTarget::Mem,
            Self::Branch(_) => PipelineTarget::Branch,
            Self::Csr(_) => PipelineTarget::Csr,
            Self::TrapReturn(_) => PipelineTarget::TrapReturn,
            Self::Illegal => PipelineTarget::Illegal,
            Self::ECall => PipelineTarget::ECall,
            Self::EBreak => PipelineTarget::EBreak,
        }
    }
}

/// The execution unit an instruction is dispatched to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PipelineTarget {
    Mem,
    Alu,
    Branch,
    Csr,
    TrapReturn,
    Illegal,
    EBreak,
    ECall,
}

/// A decoded instruction.
///
/// Register fields the encoding doesn't use are `x0`, and `immediate` is `0` when there is none.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecodedOp {
    /// Sign-extended immediate. For the immediate CSR forms this is the zero-extended `zimm`.
    pub immediate: i32,
    pub operation: Operation,
    /// Always `operation.target()`.
    pub target: PipelineTarget,
    pub rd: Specifier,
    pub rs1: Specifier,
    pub rs2: Specifier,
    pub csr: CsrSpecifier,
    /// The second ALU operand is `immediate` rather than `rs2`.
    pub has_imm: bool,
    /// The first ALU operand is the pc rather than `rs1`.
    pub use_pc: bool,
    /// Decoded from a 16-bit encoding.
    pub is_compressed: bool,
}

impl Default for DecodedOp {
    fn default() -> Self {
        Self::new(Operation::Illegal)
    }
}

impl DecodedOp {
    fn new(operation: Operation) -> Self {
        Self {
            immediate: 0,
            operation,
            target: operation.target(),
            rd: Specifier::X0,
            rs1: Specifier::X0,
            rs2: Specifier::X0,
            csr: 0,
            has_imm: false,
            use_pc: false,
            is_compressed: false,
        }
    }

    /// `addi x0, x0, 0`
    fn nop() -> Self {
        Self {
            has_imm: true,
            ..Self::new(Operation::Alu(AluOp::Add))
        }
    }

    /// Size in bytes of the encoding this was decoded from.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u32 {
        if self.is_compressed {
            2
        } else {
            4
        }
    }

    fn rd(self, word: u32) -> Self {
        Self {
            rd: Specifier::from_u5(bits::rd(word)),
            ..self
        }
    }

    fn rs1(self, word: u32) -> Self {
        Self {
            rs1: Specifier::from_u5(bits::rs1(word)),
            ..self
        }
    }

    fn rs2(self, word: u32) -> Self {
        Self {
            rs2: Specifier::from_u5(bits::rs2(word)),
            ..self
        }
    }

    fn imm(self, immediate: i32) -> Self {
        Self {
            immediate,
            has_imm: true,
            ..self
        }
    }

    /// Branch and store offsets are immediates, but not ALU operands.
    fn offset(self, immediate: i32) -> Self {
        Self { immediate, ..self }
    }
}

impl fmt::Display for DecodedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::Alu(op) => write!(f, "{op:?}")?,
            Operation::Load(width) => write!(f, "{width:?}")?,
            Operation::Store(width) => write!(f, "{width:?}")?,
            Operation::Branch(condition) => write!(f, "{condition:?}")?,
            Operation::Csr(op) => write!(f, "{op:?} {:#05x}", self.csr)?,
            Operation::TrapReturn(kind) => return write!(f, "{kind:?}"),
            Operation::Illegal | Operation::ECall | Operation::EBreak => {
                return write!(f, "{:?}", self.operation)
            }
        }
        write!(f, " rd={} rs1={} rs2={} imm={}", self.rd, self.rs1, self.rs2, self.immediate)
    }
}

/// Decode a raw instruction word.
///
/// If the two least significant bits are not `0b11`, only the low halfword is considered and it
/// is decoded as a compressed instruction.
pub fn decode(word: u32) -> DecodedOp {
    if word & 0b11 != 0b11 {
        return decode_compressed(word as u16);
    }
    match word {
        words::ECALL => return DecodedOp::new(Operation::ECall),
        words::EBREAK => return DecodedOp::new(Operation::EBreak),
        words::MRET => return DecodedOp::new(Operation::TrapReturn(TrapReturn::Mret)),
        words::SRET => return DecodedOp::new(Operation::TrapReturn(TrapReturn::Sret)),
        // Single hart without a low-power state
        words::WFI => return DecodedOp::nop(),
        _ => {}
    }
    let Some(opcode) = opcode(word) else {
        return DecodedOp::default();
    };
    match opcode {
        Opcode::Lui => DecodedOp::new(Operation::Alu(AluOp::Add))
            .rd(word)
            .imm(bits::u_imm(word)),
        Opcode::Auipc => DecodedOp {
            use_pc: true,
            ..DecodedOp::new(Operation::Alu(AluOp::Auipc))
        }
        .rd(word)
        .imm(bits::u_imm(word)),
        Opcode::Jal => DecodedOp {
            use_pc: true,
            ..DecodedOp::new(Operation::Alu(AluOp::Jal))
        }
        .rd(word)
        .imm(bits::j_imm(word)),
        Opcode::Jalr => match bits::funct3(word) {
            0b000 => DecodedOp::new(Operation::Alu(AluOp::Jalr))
                .rd(word)
                .rs1(word)
                .imm(bits::i_imm(word)),
            _ => DecodedOp::default(),
        },
        Opcode::Branch => match b_funct(word) {
            Some(condition) => DecodedOp::new(Operation::Branch(condition))
                .rs1(word)
                .rs2(word)
                .offset(bits::b_imm(word)),
            None => DecodedOp::default(),
        },
        Opcode::Load => match i_width(word) {
            Some(width) => DecodedOp::new(Operation::Load(width))
                .rd(word)
                .rs1(word)
                .offset(bits::i_imm(word)),
            None => DecodedOp::default(),
        },
        Opcode::Store => match s_width(word) {
            Some(width) => DecodedOp::new(Operation::Store(width))
                .rs1(word)
                .rs2(word)
                .offset(bits::s_imm(word)),
            None => DecodedOp::default(),
        },
        Opcode::OpImm => match i_funct(word) {
            Some((op, immediate)) => DecodedOp::new(Operation::Alu(op))
                .rd(word)
                .rs1(word)
                .imm(immediate),
            None => DecodedOp::default(),
        },
        Opcode::Op => match r_funct(word) {
            Some(op) => DecodedOp::new(Operation::Alu(op))
                .rd(word)
                .rs1(word)
                .rs2(word),
            None => DecodedOp::default(),
        },
        Opcode::MiscMem => match bits::funct3(word) {
            // fence, fence.i: a single in-order hart without caches has nothing to order
            0b000 | 0b001 => DecodedOp::nop(),
            _ => DecodedOp::default(),
        },
        Opcode::System => match csr_funct(word) {
            Some(op @ (CsrOp::Csrrw | CsrOp::Csrrs | CsrOp::Csrrc)) => DecodedOp {
                csr: bits::csr(word),
                ..DecodedOp::new(Operation::Csr(op))
            }
            .rd(word)
            .rs1(word),
            Some(op) => DecodedOp {
                csr: bits::csr(word),
                ..DecodedOp::new(Operation::Csr(op))
            }
            .rd(word)
            .imm(bits::rs1(word) as i32),
            None => DecodedOp::default(),
        },
    }
}

fn decode_compressed(halfword: u16) -> DecodedOp {
    let op = if halfword == words::C_EBREAK {
        DecodedOp::new(Operation::EBreak)
    } else {
        match compressed::expand(halfword) {
            Some(word) => decode(word),
            None => DecodedOp::default(),
        }
    };
    DecodedOp {
        is_compressed: true,
        ..op
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Opcode {
    OpImm,
    Auipc,
    Lui,
    Op,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    MiscMem,
    System,
}

/// Returns the major opcode of the instruction, or `None` if it isn't supported.
fn opcode(word: u32) -> Option<Opcode> {
    match bits::opcode(word) {
        opcodes::LOAD => Some(Opcode::Load),
        opcodes::MISC_MEM => Some(Opcode::MiscMem),
        opcodes::OP_IMM => Some(Opcode::OpImm),
        opcodes::AUIPC => Some(Opcode::Auipc),
        opcodes::STORE => Some(Opcode::Store),
        opcodes::OP => Some(Opcode::Op),
        opcodes::LUI => Some(Opcode::Lui),
        opcodes::BRANCH => Some(Opcode::Branch),
        opcodes::JALR => Some(Opcode::Jalr),
        opcodes::JAL => Some(Opcode::Jal),
        opcodes::SYSTEM => Some(Opcode::System),
        _ => None,
    }
}

/// Register-immediate operation plus its second operand (the immediate or shift amount).
fn i_funct(word: u32) -> Option<(AluOp, i32)> {
    let immediate = bits::i_imm(word);
    let shamt = bits::shamt(word) as i32;
    match (bits::funct3(word), bits::funct7(word)) {
        (0b000, _) => Some((AluOp::Add, immediate)),
        (0b010, _) => Some((AluOp::Slt, immediate)),
        (0b011, _) => Some((AluOp::Sltu, immediate)),
        (0b100, _) => Some((AluOp::Xor, immediate)),
        (0b110, _) => Some((AluOp::Or, immediate)),
        (0b111, _) => Some((AluOp::And, immediate)),
        (0b001, 0b000_0000) => Some((AluOp::Sll, shamt)),
        (0b101, 0b000_0000) => Some((AluOp::Srl, shamt)),
        (0b101, 0b010_0000) => Some((AluOp::Sra, shamt)),
        _ => None,
    }
}

fn r_funct(word: u32) -> Option<AluOp> {
    match (bits::funct7(word), bits::funct3(word)) {
        (0b000_0000, 0b000) => Some(AluOp::Add),
        (0b000_0000, 0b001) => Some(AluOp::Sll),
        (0b000_0000, 0b010) => Some(AluOp::Slt),
        (0b000_0000, 0b011) => Some(AluOp::Sltu),
        (0b000_0000, 0b100) => Some(AluOp::Xor),
        (0b000_0000, 0b101) => Some(AluOp::Srl),
        (0b000_0000, 0b110) => Some(AluOp::Or),
        (0b000_0000, 0b111) => Some(AluOp::And),
        (0b010_0000, 0b000) => Some(AluOp::Sub),
        (0b010_0000, 0b101) => Some(AluOp::Sra),
        (0b000_0001, 0b000) => Some(AluOp::Mul),
        (0b000_0001, 0b001) => Some(AluOp::Mulh),
        (0b000_0001, 0b010) => Some(AluOp::Mulhsu),
        (0b000_0001, 0b011) => Some(AluOp::Mulhu),
        (0b000_0001, 0b100) => Some(AluOp::Div),
        (0b000_0001, 0b101) => Some(AluOp::Divu),
        (0b000_0001, 0b110) => Some(AluOp::Rem),
        (0b000_0001, 0b111) => Some(AluOp::Remu),
        _ => None,
    }
}

fn b_funct(word: u32) -> Option<BranchCondition> {
    match bits::funct3(word) {
        0b000 => Some(BranchCondition::Beq),
        0b001 => Some(BranchCondition::Bne),
        0b100 => Some(BranchCondition::Blt),
        0b101 => Some(BranchCondition::Bge),
        0b110 => Some(BranchCondition::Bltu),
        0b111 => Some(BranchCondition::Bgeu),
        _ => None,
    }
}

fn i_width(word: u32) -> Option<LoadWidth> {
    match bits::funct3(word) {
        0b000 => Some(LoadWidth::Lb),
        0b001 => Some(LoadWidth::Lh),
        0b010 => Some(LoadWidth::Lw),
        0b100 => Some(LoadWidth::Lbu),
        0b101 => Some(LoadWidth::Lhu),
        _ => None,
    }
}

fn s_width(word: u32) -> Option<StoreWidth> {
    match bits::funct3(word) {
        0b000 => Some(StoreWidth::Sb),
        0b001 => Some(StoreWidth::Sh),
        0b010 => Some(StoreWidth::Sw),
        _ => None,
    }
}

/// Zicsr operation of a SYSTEM-opcode word. `funct3 == 0` words other than the exact encodings
/// handled in [`decode`] are not supported.
fn csr_funct(word: u32) -> Option<CsrOp> {
    match bits::funct3(word) {
        0b001 => Some(CsrOp::Csrrw),
        0b010 => Some(CsrOp::Csrrs),
        0b011 => Some(CsrOp::Csrrc),
        0b101 => Some(CsrOp::Csrrwi),
        0b110 => Some(CsrOp::Csrrsi),
        0b111 => Some(CsrOp::Csrrci),
        _ => None,
    }
}
