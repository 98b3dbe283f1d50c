//! Expansion of RV32C compressed instructions into their 32-bit equivalents.
//!
//! Floating-point loads and stores are not supported, since the hart has no F or D extension.

use crate::bits::{self, encode_b, encode_i, encode_j, encode_r, encode_s, encode_u};
use crate::instruction::opcodes;

const QUADRANT_0: u32 = 0b00;
const QUADRANT_1: u32 = 0b01;
const QUADRANT_2: u32 = 0b10;

/// `x0`, `ra` and `sp` as raw 5-bit register numbers.
const ZERO: u32 = 0;
const RA: u32 = 1;
const SP: u32 = 2;

/// Returns bits `low..=high` of a compressed instruction.
fn field(halfword: u32, low: u32, high: u32) -> u32 {
    bits::extract(halfword, low, high)
}

/// Maps a 3-bit `rd'`/`rs1'`/`rs2'` field onto `x8..=x15`.
fn creg(halfword: u32, low: u32) -> u32 {
    8 + field(halfword, low, low + 2)
}

/// The 6-bit signed immediate `imm[5] = inst[12]`, `imm[4:0] = inst[6:2]` shared by most of
/// quadrant 1.
fn ci_imm(halfword: u32) -> i32 {
    bits::sign_extend((field(halfword, 12, 12) << 5) | field(halfword, 2, 6), 6)
}

/// The 6-bit shift amount of `c.slli`/`c.srli`/`c.srai`, or `None` if `shamt[5]` is set, which is
/// reserved on RV32.
fn ci_shamt(halfword: u32) -> Option<i32> {
    (field(halfword, 12, 12) == 0).then(|| field(halfword, 2, 6) as i32)
}

/// Expands a 16-bit compressed instruction into its 32-bit equivalent.
///
/// Returns `None` for reserved or unsupported encodings, including the all-zero halfword.
pub fn expand(halfword: u16) -> Option<u32> {
    let inst = u32::from(halfword);
    let funct3 = field(inst, 13, 15);
    match field(inst, 0, 1) {
        QUADRANT_0 => quadrant_0(inst, funct3),
        QUADRANT_1 => quadrant_1(inst, funct3),
        QUADRANT_2 => quadrant_2(inst, funct3),
        _ => None,
    }
}

fn quadrant_0(inst: u32, funct3: u32) -> Option<u32> {
    // nzuimm[5:4|9:6|2|3] / uimm[5:3] + uimm[2|6]
    let lw_imm = || (field(inst, 10, 12) << 3) | (field(inst, 6, 6) << 2) | (field(inst, 5, 5) << 6);
    match funct3 {
        // c.addi4spn
        0b000 => {
            let imm = (field(inst, 11, 12) << 4)
                | (field(inst, 7, 10) << 6)
                | (field(inst, 6, 6) << 2)
                | (field(inst, 5, 5) << 3);
            (imm != 0).then(|| encode_i(imm as i32, SP, 0b000, creg(inst, 2), opcodes::OP_IMM))
        }
        // c.lw
        0b010 => Some(encode_i(
            lw_imm() as i32,
            creg(inst, 7),
            0b010,
            creg(inst, 2),
            opcodes::LOAD,
        )),
        // c.sw
        0b110 => Some(encode_s(
            lw_imm() as i32,
            creg(inst, 2),
            creg(inst, 7),
            0b010,
            opcodes::STORE,
        )),
        _ => None,
    }
}

fn quadrant_1(inst: u32, funct3: u32) -> Option<u32> {
    let rd = field(inst, 7, 11);
    match funct3 {
        // c.addi (c.nop when rd = 0)
        0b000 => Some(encode_i(ci_imm(inst), rd, 0b000, rd, opcodes::OP_IMM)),
        // c.jal
        0b001 => Some(encode_j(cj_offset(inst), RA, opcodes::JAL)),
        // c.li
        0b010 => Some(encode_i(ci_imm(inst), ZERO, 0b000, rd, opcodes::OP_IMM)),
        // c.addi16sp
        0b011 if rd == SP => {
            let imm = (field(inst, 12, 12) << 9)
                | (field(inst, 6, 6) << 4)
                | (field(inst, 5, 5) << 6)
                | (field(inst, 3, 4) << 7)
                | (field(inst, 2, 2) << 5);
            let imm = bits::sign_extend(imm, 10);
            (imm != 0).then(|| encode_i(imm, SP, 0b000, SP, opcodes::OP_IMM))
        }
        // c.lui
        0b011 => {
            let imm = ci_imm(inst);
            (imm != 0).then(|| encode_u(imm << 12, rd, opcodes::LUI))
        }
        0b100 => misc_alu(inst),
        // c.j
        0b101 => Some(encode_j(cj_offset(inst), ZERO, opcodes::JAL)),
        // c.beqz
        0b110 => Some(encode_b(
            cb_offset(inst),
            ZERO,
            creg(inst, 7),
            0b000,
            opcodes::BRANCH,
        )),
        // c.bnez
        0b111 => Some(encode_b(
            cb_offset(inst),
            ZERO,
            creg(inst, 7),
            0b001,
            opcodes::BRANCH,
        )),
        _ => None,
    }
}

/// `c.srli`, `c.srai`, `c.andi`, `c.sub`, `c.xor`, `c.or`, `c.and`.
fn misc_alu(inst: u32) -> Option<u32> {
    let rd = creg(inst, 7);
    match field(inst, 10, 11) {
        0b00 => ci_shamt(inst).map(|shamt| encode_i(shamt, rd, 0b101, rd, opcodes::OP_IMM)),
        0b01 => ci_shamt(inst)
            .map(|shamt| encode_i(shamt | 0x400, rd, 0b101, rd, opcodes::OP_IMM)),
        0b10 => Some(encode_i(ci_imm(inst), rd, 0b111, rd, opcodes::OP_IMM)),
        _ => {
            // The RV64 `c.subw`/`c.addw` space is reserved on RV32
            if field(inst, 12, 12) != 0 {
                return None;
            }
            let (funct7, funct3) = match field(inst, 5, 6) {
                0b00 => (0b010_0000, 0b000),
                0b01 => (0, 0b100),
                0b10 => (0, 0b110),
                _ => (0, 0b111),
            };
            Some(encode_r(funct7, creg(inst, 2), rd, funct3, rd, opcodes::OP))
        }
    }
}

fn quadrant_2(inst: u32, funct3: u32) -> Option<u32> {
    let rd = field(inst, 7, 11);
    let rs2 = field(inst, 2, 6);
    match funct3 {
        // c.slli
        0b000 => ci_shamt(inst).map(|shamt| encode_i(shamt, rd, 0b001, rd, opcodes::OP_IMM)),
        // c.lwsp
        0b010 => {
            let imm =
                (field(inst, 12, 12) << 5) | (field(inst, 4, 6) << 2) | (field(inst, 2, 3) << 6);
            (rd != ZERO).then(|| encode_i(imm as i32, SP, 0b010, rd, opcodes::LOAD))
        }
        0b100 => match (field(inst, 12, 12), rd, rs2) {
            // c.jr with rs1 = x0 is reserved
            (0, ZERO, ZERO) => None,
            // c.jr
            (0, rs1, ZERO) => Some(encode_i(0, rs1, 0b000, ZERO, opcodes::JALR)),
            // c.mv
            (0, rd, rs2) => Some(encode_r(0, rs2, ZERO, 0b000, rd, opcodes::OP)),
            // c.ebreak
            (_, ZERO, ZERO) => Some(crate::instruction::words::EBREAK),
            // c.jalr
            (_, rs1, ZERO) => Some(encode_i(0, rs1, 0b000, RA, opcodes::JALR)),
            // c.add
            (_, rd, rs2) => Some(encode_r(0, rs2, rd, 0b000, rd, opcodes::OP)),
        },
        // c.swsp
        0b110 => {
            let imm = (field(inst, 9, 12) << 2) | (field(inst, 7, 8) << 6);
            Some(encode_s(imm as i32, rs2, SP, 0b010, opcodes::STORE))
        }
        _ => None,
    }
}

/// Jump offset of `c.j`/`c.jal`: `offset[11|4|9:8|10|6|7|3:1|5] = inst[12:2]`.
fn cj_offset(inst: u32) -> i32 {
    let offset = (field(inst, 12, 12) << 11)
        | (field(inst, 11, 11) << 4)
        | (field(inst, 9, 10) << 8)
        | (field(inst, 8, 8) << 10)
        | (field(inst, 7, 7) << 6)
        | (field(inst, 6, 6) << 7)
        | (field(inst, 3, 5) << 1)
        | (field(inst, 2, 2) << 5);
    bits::sign_extend(offset, 12)
}

/// Branch offset of `c.beqz`/`c.bnez`: `offset[8|4:3] = inst[12:10]`,
/// `offset[7:6|2:1|5] = inst[6:2]`.
fn cb_offset(inst: u32) -> i32 {
    let offset = (field(inst, 12, 12) << 8)
        | (field(inst, 10, 11) << 3)
        | (field(inst, 5, 6) << 6)
        | (field(inst, 3, 4) << 1)
        | (field(inst, 2, 2) << 5);
    bits::sign_extend(offset, 9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal() {
        assert_eq!(None, expand(0x0000));
        // c.addi4spn with a zero immediate
        assert_eq!(None, expand(0x0004));
        // c.flw / c.fsw
        assert_eq!(None, expand(0x6000));
        assert_eq!(None, expand(0xE000));
        // c.lwsp x0
        assert_eq!(None, expand(0x4002));
        // c.jr x0
        assert_eq!(None, expand(0x8002));
        // c.slli with shamt[5] set
        assert_eq!(None, expand(0x1006));
    }

    #[test]
    fn test_quadrant_0() {
        // c.addi4spn x8, sp, 4 => addi x8, x2, 4
        assert_eq!(Some(0x0041_0413), expand(0x0040));
        // c.lw x9, 4(x10) => lw x9, 4(x10)
        assert_eq!(Some(0x0045_2483), expand(0x4144));
        // c.sw x9, 4(x10) => sw x9, 4(x10)
        assert_eq!(Some(0x0095_2223), expand(0xC144));
    }

    #[test]
    fn test_quadrant_1() {
        // c.nop
        assert_eq!(Some(0x0000_0013), expand(0x0001));
        // c.addi x10, -1
        assert_eq!(Some(0xFFF5_0513), expand(0x157D));
        // c.li x10, 7
        assert_eq!(Some(0x0070_0513), expand(0x451D));
        // c.lui x10, 1
        assert_eq!(Some(0x0000_1537), expand(0x6505));
        // c.addi16sp sp, -64
        assert_eq!(Some(0xFC01_0113), expand(0x7139));
        // c.j -2
        assert_eq!(Some(0xFFFF_F06F), expand(0xBFFD));
        // c.jal 0 => jal ra, 0
        assert_eq!(Some(0x0000_00EF), expand(0x2001));
        // c.beqz x8, 0
        assert_eq!(Some(0x0004_0063), expand(0xC001));
        // c.bnez x8, -2
        assert_eq!(Some(0xFE04_1FE3), expand(0xFC7D));
        // c.sub x8, x9
        assert_eq!(Some(0x4094_0433), expand(0x8C05));
        // c.and x8, x9
        assert_eq!(Some(0x0094_7433), expand(0x8C65));
        // c.srai x8, 2
        assert_eq!(Some(0x4024_5413), expand(0x8409));
    }

    #[test]
    fn test_quadrant_2() {
        // c.slli x10, 3
        assert_eq!(Some(0x0035_1513), expand(0x050E));
        // c.lwsp x10, 8(sp)
        assert_eq!(Some(0x0081_2503), expand(0x4522));
        // c.swsp x10, 8(sp)
        assert_eq!(Some(0x00A1_2423), expand(0xC42A));
        // c.jr ra
        assert_eq!(Some(0x0000_8067), expand(0x8082));
        // c.jalr x5
        assert_eq!(Some(0x0002_80E7), expand(0x9282));
        // c.mv x10, x11
        assert_eq!(Some(0x00B0_0533), expand(0x852E));
        // c.add x10, x11
        assert_eq!(Some(0x00B5_0533), expand(0x952E));
        // c.ebreak
        assert_eq!(Some(0x0010_0073), expand(0x9002));
    }
}
