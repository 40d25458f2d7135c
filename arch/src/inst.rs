use crate::{
    op::Mnemonic,
    reg::{Register, RegisterCatalog, RegisterClass},
};

use color_print::cformat;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmKind {
    Integer,
    Float,
}

/// Integer bits are the two's-complement pattern of an `i64`; float bits are a binary32 pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Immediate {
    pub kind: ImmKind,
    pub bits: u64,
}

impl Immediate {
    pub fn int(value: i64) -> Self {
        Immediate {
            kind: ImmKind::Integer,
            bits: value as u64,
        }
    }

    pub fn float(value: f32) -> Self {
        Immediate {
            kind: ImmKind::Float,
            bits: value.to_bits() as u64,
        }
    }

    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.bits as u32)
    }

    /// Whether the value survives a `width`-bit field without truncation.
    pub fn fits(&self, width: u32) -> bool {
        match self.kind {
            ImmKind::Integer => {
                let value = self.bits as i64 as i128;
                width > 0 && value >= -(1i128 << (width - 1)) && value < (1i128 << width)
            }
            ImmKind::Float => width >= 32,
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ImmKind::Integer => write!(f, "#{}", self.bits as i64),
            ImmKind::Float => write!(f, "#{:?}", self.as_f32()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Register(Register),
    Immediate(Immediate),
    LabelRef(String),
}

impl Operand {
    pub fn reg(class: RegisterClass, index: u8) -> Self {
        Operand::Register(Register::new(class, index))
    }

    pub fn int(value: i64) -> Self {
        Operand::Immediate(Immediate::int(value))
    }

    pub fn float(value: f32) -> Self {
        Operand::Immediate(Immediate::float(value))
    }

    /// Shape of the operand as shown in mismatch diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Operand::Register(reg) => format!("{}-reg", reg.class.short()),
            Operand::Immediate(imm) => imm.to_string(),
            Operand::LabelRef(name) => format!("label `{name}`"),
        }
    }
}

pub fn describe(operands: &[Operand]) -> String {
    if operands.is_empty() {
        return "nothing".to_string();
    }
    operands
        .iter()
        .map(Operand::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic, operands: Vec<Operand>) -> Self {
        Instruction { mnemonic, operands }
    }

    /// Rewrites every label reference through `lookup`; the first unknown name is returned.
    pub fn resolve<F>(self, lookup: F) -> Result<Instruction, String>
    where
        F: Fn(&str) -> Option<u32>,
    {
        let operands = self
            .operands
            .into_iter()
            .map(|operand| match operand {
                Operand::LabelRef(name) => match lookup(&name) {
                    Some(addr) => Ok(Operand::int(addr as i64)),
                    None => Err(name),
                },
                other => Ok(other),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Instruction {
            mnemonic: self.mnemonic,
            operands,
        })
    }

    pub fn cformat(&self, catalog: &RegisterCatalog) -> String {
        let operands = self
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Register(reg) => match catalog.name_of(reg.index) {
                    Some(name) => cformat!("<b>{}</>", name),
                    None => cformat!("<r,u>?{}</>", reg.index),
                },
                Operand::Immediate(imm) => match imm.kind {
                    ImmKind::Integer => cformat!("<y>#0x{:X}</>", imm.bits as i64),
                    ImmKind::Float => cformat!("<y>{}</>", imm),
                },
                Operand::LabelRef(name) => cformat!("<g>{}</>", name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        cformat!("<r>{:<7}</>{}", self.mnemonic, operands)
    }
}

/// Both flag axes: addressing mode and value domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub immediate: bool,
    pub domain: RegisterClass,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            immediate: false,
            domain: RegisterClass::IntegerScalar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub opcode: u8,
    pub flags: Flags,
    pub word: u64,
}
