use bimap::BiMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    error::Error,
    inst::{describe, Flags, ImmKind, Operand},
    layout::Template,
    reg::RegisterClass,
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Mnemonic {
    // Control
    HALT,
    BAR,
    BZ,
    BNZ,
    JMP,
    // Graph access
    LDN,
    ITER,
    NEXT,
    LDV,
    HASN,
    HASE,
    DEG,
    // Arithmetic
    ADD,
    ADDI,
    SUB,
    SUBI,
    MUL,
    CMP,
    MOV,
    MOVI,
    CLR,
    // Memory
    LD,
    ST,
    LDR,
    STR,
    // Frontier
    PUSH,
    POP,
    FEMPTY,
    FSWAP,
}

impl Mnemonic {
    pub fn parse(s: &str) -> Result<Self, Error> {
        s.parse::<Self>()
            .map_err(|_| Error::UnknownOpcode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Reg,
    Imm,
    RegOrImm,
}

/// Operand shape group of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Shape {
    None,
    Imm,
    Reg,
    RegReg,
    RegImm,
    RegRegOrImm,
    RegRegReg,
    RegRegImm,
    RegRegRegOrImm,
}

impl Shape {
    pub fn slots(self) -> &'static [Slot] {
        use Slot::*;
        match self {
            Shape::None => &[],
            Shape::Imm => &[Imm],
            Shape::Reg => &[Reg],
            Shape::RegReg => &[Reg, Reg],
            Shape::RegImm => &[Reg, Imm],
            Shape::RegRegOrImm => &[Reg, RegOrImm],
            Shape::RegRegReg => &[Reg, Reg, Reg],
            Shape::RegRegImm => &[Reg, Reg, Imm],
            Shape::RegRegRegOrImm => &[Reg, Reg, RegOrImm],
        }
    }

    pub fn template(self) -> Template {
        match self {
            Shape::None => Template::Zero,
            Shape::Imm => Template::SingleImm,
            Shape::Reg => Template::SingleReg,
            Shape::RegReg | Shape::RegRegReg => Template::RegTriple,
            Shape::RegImm | Shape::RegRegOrImm => Template::RegLit,
            Shape::RegRegImm | Shape::RegRegRegOrImm => Template::RegRegLit,
        }
    }

    /// The last slot, when it can hold an immediate.
    pub fn literal_slot(self) -> Option<Slot> {
        self.slots()
            .last()
            .copied()
            .filter(|slot| *slot != Slot::Reg)
    }

    pub fn describe(self) -> String {
        if self == Shape::None {
            return "nothing".to_string();
        }
        self.slots()
            .iter()
            .map(|slot| match slot {
                Slot::Reg => "reg",
                Slot::Imm => "#imm",
                Slot::RegOrImm => "reg|#imm",
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What an immediate operand means: a value in the register domain, or an address/count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LiteralKind {
    #[default]
    Value,
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSpec {
    pub mnemonic: Mnemonic,
    pub opcode: u8,
    pub shape: Shape,
    /// Admitted register classes; empty admits every class of the revision.
    #[serde(default)]
    pub classes: Vec<RegisterClass>,
    #[serde(default)]
    pub literal: LiteralKind,
}

impl OpSpec {
    pub fn new(mnemonic: Mnemonic, opcode: u8, shape: Shape) -> Self {
        OpSpec {
            mnemonic,
            opcode,
            shape,
            classes: vec![],
            literal: LiteralKind::Value,
        }
    }

    pub fn classes(mut self, classes: &[RegisterClass]) -> Self {
        self.classes = classes.to_vec();
        self
    }

    pub fn address(mut self) -> Self {
        self.literal = LiteralKind::Address;
        self
    }

    pub fn admits(&self, class: RegisterClass) -> bool {
        self.classes.is_empty() || self.classes.contains(&class)
    }

    /// Validates operand count, slot kinds and domains; returns the flags to encode.
    pub fn check(&self, operands: &[Operand]) -> Result<Flags, Error> {
        let mismatch = || Error::ShapeMismatch {
            mnemonic: self.mnemonic.to_string(),
            expected: self.shape.describe(),
            got: describe(operands),
        };

        let slots = self.shape.slots();
        if slots.len() != operands.len() {
            return Err(mismatch());
        }

        let mut class: Option<RegisterClass> = None;
        let mut immediate = None;
        for (slot, operand) in slots.iter().zip(operands) {
            match (slot, operand) {
                (Slot::Reg | Slot::RegOrImm, Operand::Register(reg)) => match class {
                    Some(c) if c != reg.class => return Err(mismatch()),
                    _ => class = Some(reg.class),
                },
                (Slot::Imm | Slot::RegOrImm, Operand::Immediate(imm)) => immediate = Some(*imm),
                (_, Operand::LabelRef(name)) => return Err(Error::UnresolvedLabel(name.clone())),
                _ => return Err(mismatch()),
            }
        }

        if let Some(c) = class {
            if !self.admits(c) {
                return Err(mismatch());
            }
        }

        if let Some(imm) = immediate {
            let wants_float = match (self.literal, class) {
                (LiteralKind::Value, Some(c)) => c.is_float(),
                _ => false,
            };
            if wants_float != (imm.kind == ImmKind::Float) {
                return Err(mismatch());
            }
        }

        Ok(Flags {
            immediate: immediate.is_some(),
            domain: class.unwrap_or(RegisterClass::IntegerScalar),
        })
    }
}

/// Mnemonic <-> opcode id of one revision.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    ids: BiMap<Mnemonic, u8>,
    specs: IndexMap<Mnemonic, OpSpec>,
}

impl OpcodeTable {
    pub fn build(specs: &[OpSpec]) -> Result<Self, String> {
        let mut ids = BiMap::new();
        let mut table = IndexMap::new();
        for spec in specs {
            if ids.insert_no_overwrite(spec.mnemonic, spec.opcode).is_err() {
                return Err(format!(
                    "{} / opcode 0x{:02X} defined twice",
                    spec.mnemonic, spec.opcode
                ));
            }
            table.insert(spec.mnemonic, spec.clone());
        }
        Ok(OpcodeTable { ids, specs: table })
    }

    pub fn spec(&self, mnemonic: Mnemonic) -> Option<&OpSpec> {
        self.specs.get(&mnemonic)
    }

    pub fn by_opcode(&self, opcode: u8) -> Option<&OpSpec> {
        self.ids
            .get_by_right(&opcode)
            .and_then(|mnemonic| self.specs.get(mnemonic))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpSpec> {
        self.specs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::RegisterClass::*;

    fn add() -> OpSpec {
        OpSpec::new(Mnemonic::ADD, 0x20, Shape::RegRegRegOrImm)
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Mnemonic::parse("movi"), Ok(Mnemonic::MOVI));
        assert_eq!(Mnemonic::parse("FSwap"), Ok(Mnemonic::FSWAP));
        assert_eq!(
            Mnemonic::parse("hoge"),
            Err(Error::UnknownOpcode("hoge".to_string()))
        );
    }

    #[test]
    fn check_register_form() {
        let ops = [
            Operand::reg(IntegerScalar, 1),
            Operand::reg(IntegerScalar, 2),
            Operand::reg(IntegerScalar, 3),
        ];
        let flags = add().check(&ops).unwrap();
        assert!(!flags.immediate);
        assert_eq!(flags.domain, IntegerScalar);
    }

    #[test]
    fn check_float_immediate_form() {
        let ops = [
            Operand::reg(FloatScalar, 9),
            Operand::reg(FloatScalar, 10),
            Operand::float(0.5),
        ];
        let flags = add().check(&ops).unwrap();
        assert!(flags.immediate);
        assert_eq!(flags.domain, FloatScalar);
    }

    #[test]
    fn mixed_classes_fail() {
        let ops = [
            Operand::reg(IntegerScalar, 1),
            Operand::reg(FloatScalar, 9),
            Operand::reg(IntegerScalar, 3),
        ];
        assert!(matches!(
            add().check(&ops),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn immediate_domain_must_match() {
        let int_into_float = [
            Operand::reg(FloatScalar, 9),
            Operand::reg(FloatScalar, 9),
            Operand::int(1),
        ];
        assert!(add().check(&int_into_float).is_err());

        let float_into_int = [
            Operand::reg(IntegerScalar, 1),
            Operand::reg(IntegerScalar, 1),
            Operand::float(1.0),
        ];
        assert!(add().check(&float_into_int).is_err());

        // Addresses stay integers whatever the register domain.
        let ld = OpSpec::new(Mnemonic::LD, 0x30, Shape::RegImm).address();
        assert!(ld
            .check(&[Operand::reg(FloatScalar, 8), Operand::int(100)])
            .is_ok());
        assert!(ld
            .check(&[Operand::reg(FloatScalar, 8), Operand::float(1.0)])
            .is_err());
    }

    #[test]
    fn arity_and_slot_errors_name_the_shape() {
        let err = add().check(&[Operand::reg(IntegerScalar, 1)]).unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                mnemonic: "ADD".to_string(),
                expected: "reg, reg, reg|#imm".to_string(),
                got: "int-reg".to_string(),
            }
        );

        let jmp = OpSpec::new(Mnemonic::JMP, 0x02, Shape::Imm).address();
        assert!(jmp.check(&[Operand::reg(IntegerScalar, 1)]).is_err());
        assert!(jmp.check(&[Operand::float(1.0)]).is_err());
    }

    #[test]
    fn class_restrictions() {
        let push = OpSpec::new(Mnemonic::PUSH, 0x40, Shape::Reg).classes(&[IntegerScalar]);
        assert!(push.check(&[Operand::reg(IntegerScalar, 0)]).is_ok());
        assert!(push.check(&[Operand::reg(FloatScalar, 8)]).is_err());
    }

    #[test]
    fn unresolved_labels_are_reported() {
        let jmp = OpSpec::new(Mnemonic::JMP, 0x02, Shape::Imm).address();
        assert_eq!(
            jmp.check(&[Operand::LabelRef("end".to_string())]),
            Err(Error::UnresolvedLabel("end".to_string()))
        );
    }

    #[test]
    fn table_rejects_duplicates() {
        let specs = [
            OpSpec::new(Mnemonic::HALT, 0, Shape::None),
            OpSpec::new(Mnemonic::BAR, 0, Shape::None),
        ];
        assert!(OpcodeTable::build(&specs).is_err());

        let table = OpcodeTable::build(&specs[..1]).unwrap();
        assert_eq!(table.by_opcode(0).map(|s| s.mnemonic), Some(Mnemonic::HALT));
        assert!(table.spec(Mnemonic::BAR).is_none());
    }
}
