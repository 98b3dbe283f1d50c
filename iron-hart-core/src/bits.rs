//! Fixed-width bit-field extraction on raw instruction words.
//!
//! Every instruction format is a set of `(field, bit range)` pairs, so one parametrized
//! [`extract`] plus a handful of per-format immediate builders covers the whole base encoding.

/// Returns bits `low..=high` of `word`, shifted down so that bit `low` becomes bit 0.
///
/// # Panics
///
/// Panics (in debug builds) if `low > high` or `high > 31`.
#[inline]
pub const fn extract(word: u32, low: u32, high: u32) -> u32 {
    debug_assert!(low <= high && high < 32);
    let width = high - low + 1;
    if width == 32 {
        word
    } else {
        (word >> low) & ((1 << width) - 1)
    }
}

/// Sign-extends the `bits` least significant bits of `value` to a full `i32`.
#[inline]
pub const fn sign_extend(value: u32, bits: u32) -> i32 {
    debug_assert!(bits > 0 && bits <= 32);
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Returns the 7-bit *opcode* field (`[6:0]`).
#[inline]
pub const fn opcode(word: u32) -> u32 {
    extract(word, 0, 6)
}

/// Returns the 5-bit *rd* field (`[11:7]`) of R/I/U/J-type instructions.
#[inline]
pub const fn rd(word: u32) -> u8 {
    extract(word, 7, 11) as u8
}

/// Returns the 3-bit *funct3* field (`[14:12]`).
#[inline]
pub const fn funct3(word: u32) -> u32 {
    extract(word, 12, 14)
}

/// Returns the 5-bit *rs1* field (`[19:15]`) of R/I/S/B-type instructions.
#[inline]
pub const fn rs1(word: u32) -> u8 {
    extract(word, 15, 19) as u8
}

/// Returns the 5-bit *rs2* field (`[24:20]`) of R/S/B-type instructions.
#[inline]
pub const fn rs2(word: u32) -> u8 {
    extract(word, 20, 24) as u8
}

/// Returns the 7-bit *funct7* field (`[31:25]`) of R-type instructions.
#[inline]
pub const fn funct7(word: u32) -> u32 {
    extract(word, 25, 31)
}

/// Returns the 12-bit CSR specifier (`[31:20]`) of Zicsr instructions, zero-extended.
#[inline]
pub const fn csr(word: u32) -> u16 {
    extract(word, 20, 31) as u16
}

/// Returns the 5-bit *shamt* field (`[24:20]`) of shift-immediate instructions.
#[inline]
pub const fn shamt(word: u32) -> u32 {
    extract(word, 20, 24)
}

/// I-type: `imm[11:0] = word[31:20]`, sign-extended.
#[inline]
pub const fn i_imm(word: u32) -> i32 {
    sign_extend(extract(word, 20, 31), 12)
}

/// S-type: `imm[11:5] = word[31:25]`, `imm[4:0] = word[11:7]`, sign-extended.
#[inline]
pub const fn s_imm(word: u32) -> i32 {
    let imm = (extract(word, 25, 31) << 5) | extract(word, 7, 11);
    sign_extend(imm, 12)
}

/// B-type: `imm[12|10:5] = word[31:25]`, `imm[4:1|11] = word[11:7]`, sign-extended.
///
/// Bit 0 of the immediate is always zero, so every branch target is even.
#[inline]
pub const fn b_imm(word: u32) -> i32 {
    let imm = (extract(word, 31, 31) << 12)
        | (extract(word, 7, 7) << 11)
        | (extract(word, 25, 30) << 5)
        | (extract(word, 8, 11) << 1);
    sign_extend(imm, 13)
}

/// U-type: `imm[31:12] = word[31:12]`, low 12 bits zero.
#[inline]
pub const fn u_imm(word: u32) -> i32 {
    (extract(word, 12, 31) << 12) as i32
}

/// J-type: `imm[20|10:1|11|19:12] = word[31:12]`, sign-extended.
#[inline]
pub const fn j_imm(word: u32) -> i32 {
    let imm = (extract(word, 31, 31) << 20)
        | (extract(word, 12, 19) << 12)
        | (extract(word, 20, 20) << 11)
        | (extract(word, 21, 30) << 1);
    sign_extend(imm, 21)
}

/// Encodes an R-type instruction.
#[inline]
pub const fn encode_r(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

/// Encodes an I-type instruction. Only the low 12 bits of `imm` are used.
#[inline]
pub const fn encode_i(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (extract(imm as u32, 0, 11) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

/// Encodes an S-type instruction. Only the low 12 bits of `imm` are used.
#[inline]
pub const fn encode_s(imm: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    (extract(imm, 5, 11) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (extract(imm, 0, 4) << 7)
        | opcode
}

/// Encodes a B-type instruction. Bit 0 and bits above 12 of `imm` are dropped.
#[inline]
pub const fn encode_b(imm: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    (extract(imm, 12, 12) << 31)
        | (extract(imm, 5, 10) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (extract(imm, 1, 4) << 8)
        | (extract(imm, 11, 11) << 7)
        | opcode
}

/// Encodes a U-type instruction. The low 12 bits of `imm` are dropped.
#[inline]
pub const fn encode_u(imm: i32, rd: u32, opcode: u32) -> u32 {
    (imm as u32 & 0xFFFF_F000) | (rd << 7) | opcode
}

/// Encodes a J-type instruction. Bit 0 and bits above 20 of `imm` are dropped.
#[inline]
pub const fn encode_j(imm: i32, rd: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    (extract(imm, 20, 20) << 31)
        | (extract(imm, 1, 10) << 21)
        | (extract(imm, 11, 11) << 20)
        | (extract(imm, 12, 19) << 12)
        | (rd << 7)
        | opcode
}
