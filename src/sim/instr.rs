//! Decoding memory words into executable instructions.
//!
//! An instruction word is a two-letter mnemonic followed by a decimal
//! virtual address, except for `H` which stands alone. Decoding works on
//! the word's trimmed text, as produced by [`Word::text`].
//!
//! [`Word::text`]: super::mem::Word::text

use super::interrupt::ProgramErr;

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// `GD a`: read the next data card into memory starting at `a`.
    GD(i64),
    /// `PD a`: write the word at `a` as one output line.
    PD(i64),
    /// `LR a`: load the word at `a` into the general register.
    LR(i64),
    /// `SR a`: store the general register into the word at `a`.
    SR(i64),
    /// `CR a`: set the condition flag iff the register equals the word at `a`.
    CR(i64),
    /// `BT a`: branch to `a` when the condition flag is set.
    BT(i64),
    /// `H`: halt the job.
    H,
}

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::GD(a) => write!(f, "GD {a}"),
            Instr::PD(a) => write!(f, "PD {a}"),
            Instr::LR(a) => write!(f, "LR {a}"),
            Instr::SR(a) => write!(f, "SR {a}"),
            Instr::CR(a) => write!(f, "CR {a}"),
            Instr::BT(a) => write!(f, "BT {a}"),
            Instr::H => f.write_str("H"),
        }
    }
}

/// Errors that can occur when decoding an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErr {
    /// The word is shorter than an opcode plus operand.
    Short,
    /// The opcode is not recognized.
    UnknownOpcode,
    /// The operand is not a decimal number.
    BadOperand,
}

impl std::fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErr::Short => f.write_str("instruction is too short"),
            DecodeErr::UnknownOpcode => f.write_str("unknown operation code"),
            DecodeErr::BadOperand => f.write_str("operand is not a decimal number"),
        }
    }
}
impl std::error::Error for DecodeErr {}

impl From<DecodeErr> for ProgramErr {
    /// The program-error cause a decode failure raises.
    fn from(err: DecodeErr) -> Self {
        match err {
            DecodeErr::Short | DecodeErr::UnknownOpcode => ProgramErr::OpCode,
            DecodeErr::BadOperand => ProgramErr::Operand,
        }
    }
}

impl Instr {
    /// Decodes the trimmed text of an instruction word.
    pub fn decode(text: &str) -> Result<Self, DecodeErr> {
        if text == "H" {
            return Ok(Instr::H);
        }
        if !text.is_ascii() {
            return Err(DecodeErr::UnknownOpcode);
        }
        if text.len() < 3 {
            return Err(DecodeErr::Short);
        }

        let (op, operand) = text.split_at(2);
        let addr = operand.parse::<i64>().map_err(|_| DecodeErr::BadOperand)?;
        match op {
            "GD" => Ok(Instr::GD(addr)),
            "PD" => Ok(Instr::PD(addr)),
            "LR" => Ok(Instr::LR(addr)),
            "SR" => Ok(Instr::SR(addr)),
            "CR" => Ok(Instr::CR(addr)),
            "BT" => Ok(Instr::BT(addr)),
            _ => Err(DecodeErr::UnknownOpcode),
        }
    }
}
