//! A minimal assembler and helpers to drive a [`Hart`] over hand-written programs.

#![allow(dead_code)]

use iron_hart_core::bits::{encode_b, encode_i, encode_j, encode_r, encode_s, encode_u};
use iron_hart_core::core::{Config, Hart, StepOutcome};
use iron_hart_core::instruction::{opcodes, words};

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    encode_i(imm, rs1, 0b000, rd, opcodes::OP_IMM)
}

pub fn li(rd: u32, imm: i32) -> u32 {
    addi(rd, 0, imm)
}

pub fn srai(rd: u32, rs1: u32, shamt: i32) -> u32 {
    encode_i(0x400 | shamt, rs1, 0b101, rd, opcodes::OP_IMM)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    encode_r(0, rs2, rs1, 0b000, rd, opcodes::OP)
}

pub fn sub(rd: u32, rs1: u32, rs2: u32) -> u32 {
    encode_r(0b010_0000, rs2, rs1, 0b000, rd, opcodes::OP)
}

pub fn lui(rd: u32, imm: i32) -> u32 {
    encode_u(imm, rd, opcodes::LUI)
}

pub fn jal(rd: u32, offset: i32) -> u32 {
    encode_j(offset, rd, opcodes::JAL)
}

pub fn jalr(rd: u32, rs1: u32, offset: i32) -> u32 {
    encode_i(offset, rs1, 0b000, rd, opcodes::JALR)
}

pub fn beq(rs1: u32, rs2: u32, offset: i32) -> u32 {
    encode_b(offset, rs2, rs1, 0b000, opcodes::BRANCH)
}

pub fn blt(rs1: u32, rs2: u32, offset: i32) -> u32 {
    encode_b(offset, rs2, rs1, 0b100, opcodes::BRANCH)
}

pub fn bgeu(rs1: u32, rs2: u32, offset: i32) -> u32 {
    encode_b(offset, rs2, rs1, 0b111, opcodes::BRANCH)
}

pub fn lb(rd: u32, rs1: u32, offset: i32) -> u32 {
    encode_i(offset, rs1, 0b000, rd, opcodes::LOAD)
}

pub fn lh(rd: u32, rs1: u32, offset: i32) -> u32 {
    encode_i(offset, rs1, 0b001, rd, opcodes::LOAD)
}

pub fn lw(rd: u32, rs1: u32, offset: i32) -> u32 {
    encode_i(offset, rs1, 0b010, rd, opcodes::LOAD)
}

pub fn lbu(rd: u32, rs1: u32, offset: i32) -> u32 {
    encode_i(offset, rs1, 0b100, rd, opcodes::LOAD)
}

pub fn lhu(rd: u32, rs1: u32, offset: i32) -> u32 {
    encode_i(offset, rs1, 0b101, rd, opcodes::LOAD)
}

pub fn sb(rs2: u32, rs1: u32, offset: i32) -> u32 {
    encode_s(offset, rs2, rs1, 0b000, opcodes::STORE)
}

pub fn sh(rs2: u32, rs1: u32, offset: i32) -> u32 {
    encode_s(offset, rs2, rs1, 0b001, opcodes::STORE)
}

pub fn sw(rs2: u32, rs1: u32, offset: i32) -> u32 {
    encode_s(offset, rs2, rs1, 0b010, opcodes::STORE)
}

pub fn csrrw(rd: u32, csr: u16, rs1: u32) -> u32 {
    encode_i(csr as i32, rs1, 0b001, rd, opcodes::SYSTEM)
}

pub fn csrrs(rd: u32, csr: u16, rs1: u32) -> u32 {
    encode_i(csr as i32, rs1, 0b010, rd, opcodes::SYSTEM)
}

pub fn csrrc(rd: u32, csr: u16, rs1: u32) -> u32 {
    encode_i(csr as i32, rs1, 0b011, rd, opcodes::SYSTEM)
}

pub fn csrrwi(rd: u32, csr: u16, zimm: u32) -> u32 {
    encode_i(csr as i32, zimm, 0b101, rd, opcodes::SYSTEM)
}

pub fn csrrsi(rd: u32, csr: u16, zimm: u32) -> u32 {
    encode_i(csr as i32, zimm, 0b110, rd, opcodes::SYSTEM)
}

pub fn csrrci(rd: u32, csr: u16, zimm: u32) -> u32 {
    encode_i(csr as i32, zimm, 0b111, rd, opcodes::SYSTEM)
}

pub const ECALL: u32 = words::ECALL;
pub const EBREAK: u32 = words::EBREAK;
pub const MRET: u32 = words::MRET;
pub const SRET: u32 = words::SRET;

/// Create a hart with `program` placed at its reset vector.
pub fn hart_with(config: Config, program: &[u32]) -> Hart {
    let base = config.reset_vector;
    let mut hart = Hart::new(config).expect("failed to create hart");
    place(&mut hart, base, program);
    hart
}

/// Write `program` to memory at `address`.
pub fn place(hart: &mut Hart, address: u32, program: &[u32]) {
    let bytes: Vec<u8> = program.iter().flat_map(|word| word.to_le_bytes()).collect();
    hart.load(address, &bytes);
}

/// Step and commit a single instruction.
pub fn run_one(hart: &mut Hart) -> StepOutcome {
    let outcome = hart.step();
    hart.commit();
    outcome
}

/// Step and commit `count` instructions, returning the outcome of each.
pub fn run(hart: &mut Hart, count: usize) -> Vec<StepOutcome> {
    (0..count).map(|_| run_one(hart)).collect()
}
