//! ISA revisions.
//!
//! A [`Revision`] bundles everything that differs between generations of the
//! GraphX VM: the register catalog, the opcode table, the bit layout and the
//! overflow policy. Revisions are built from a serializable [`RevisionSpec`],
//! so an assembler can load one from a file as easily as use a built-in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    error::Error,
    layout::{Field, FlagLayout, Layout, OverflowPolicy},
    op::{Mnemonic, OpSpec, OpcodeTable, Shape, Slot},
    reg::{ClassSpec, RegisterCatalog, RegisterClass},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSpec {
    pub name: String,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    pub layout: Layout,
    pub registers: Vec<ClassSpec>,
    pub opcodes: Vec<OpSpec>,
}

#[derive(Debug, Clone)]
pub struct Revision {
    name: String,
    overflow: OverflowPolicy,
    layout: Layout,
    catalog: RegisterCatalog,
    opcodes: OpcodeTable,
}

impl RevisionSpec {
    pub fn build(&self) -> Result<Revision, Error> {
        let fail = |reason: String| Error::Revision(self.name.clone(), reason);

        self.layout.validate().map_err(fail)?;
        let catalog = RegisterCatalog::build(&self.registers).map_err(fail)?;
        let opcodes = OpcodeTable::build(&self.opcodes).map_err(fail)?;

        let reg_limit = 1u32 << self.layout.reg_width().min(8);
        if catalog.end() as u32 > reg_limit {
            return Err(fail(format!(
                "{} registers do not fit a {}-bit register field",
                catalog.end(),
                self.layout.reg_width()
            )));
        }

        match &self.layout.flags {
            Some(flags) => {
                if let Some(class) = catalog
                    .classes()
                    .find(|class| u8::from(*class) as u64 > flags.domain.mask())
                {
                    return Err(fail(format!("domain flag cannot hold class {class}")));
                }
            }
            None => {
                if catalog.classes().count() > 1 {
                    return Err(fail(
                        "several register classes need a domain flag".to_string(),
                    ));
                }
            }
        }

        for spec in opcodes.iter() {
            if spec.opcode as u64 > self.layout.opcode.mask() {
                return Err(fail(format!(
                    "opcode 0x{:02X} of {} does not fit the opcode field",
                    spec.opcode, spec.mnemonic
                )));
            }
            if self.layout.flags.is_none() && spec.shape.slots().contains(&Slot::RegOrImm) {
                return Err(fail(format!(
                    "{} takes reg|#imm but the layout has no immediate flag",
                    spec.mnemonic
                )));
            }
            if let Some(class) = spec.classes.iter().find(|c| !catalog.has_class(**c)) {
                return Err(fail(format!(
                    "{} admits missing class {class}",
                    spec.mnemonic
                )));
            }
        }

        Ok(Revision {
            name: self.name.clone(),
            overflow: self.overflow,
            layout: self.layout,
            catalog,
            opcodes,
        })
    }
}

impl Revision {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn catalog(&self) -> &RegisterCatalog {
        &self.catalog
    }

    pub fn opcodes(&self) -> &OpcodeTable {
        &self.opcodes
    }
}

// ----------------------------------------------------------------------------
// Built-in revisions

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Isa {
    /// 32-bit words, bit-compatible with the prototype assembler.
    Proto,
    /// 64-bit words with mode/domain flags, integer and float registers.
    Base,
    /// `base` plus vector register classes.
    Ext,
}

impl Isa {
    pub fn spec(self) -> RevisionSpec {
        match self {
            Isa::Proto => proto(),
            Isa::Base => base(),
            Isa::Ext => ext(),
        }
    }

    pub fn revision(self) -> Result<Revision, Error> {
        self.spec().build()
    }
}

fn names(prefix: &str, count: u8) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

fn aliases(pairs: &[(&str, u8)]) -> IndexMap<String, u8> {
    pairs
        .iter()
        .map(|(name, offset)| (name.to_string(), *offset))
        .collect()
}

fn class(class: RegisterClass, base: u8, prefix: &str) -> ClassSpec {
    ClassSpec {
        class,
        base,
        names: names(prefix, 8),
        aliases: IndexMap::new(),
    }
}

fn proto() -> RevisionSpec {
    let layout = Layout {
        word_bits: 32,
        opcode: Field::new(27, 5),
        flags: None,
        rd: Field::new(24, 3),
        rs1: Field::new(21, 3),
        rs2: Field::new(18, 3),
        imm: Field::new(0, 27),
        reg_lit: Field::new(0, 24),
        reg_reg_lit: Field::new(0, 21),
    };

    let mut int = class(RegisterClass::IntegerScalar, 0, "r");
    int.aliases = aliases(&[
        ("Rnode", 0),
        ("Rnbr", 1),
        ("Rval", 2),
        ("Racc", 3),
        ("Rtmp", 4),
        ("Rzero", 5),
    ]);

    RevisionSpec {
        name: "proto".to_string(),
        overflow: OverflowPolicy::Truncate,
        layout,
        registers: vec![int],
        opcodes: proto_opcodes(),
    }
}

fn proto_opcodes() -> Vec<OpSpec> {
    use Mnemonic::*;
    use Shape::*;

    vec![
        OpSpec::new(HALT, 0, None),
        OpSpec::new(BZ, 1, Imm).address(),
        OpSpec::new(BNZ, 2, Imm).address(),
        OpSpec::new(JMP, 3, Imm).address(),
        OpSpec::new(LDN, 4, Imm).address(),
        OpSpec::new(ITER, 5, None),
        OpSpec::new(NEXT, 6, None),
        OpSpec::new(LDV, 7, None),
        OpSpec::new(HASN, 8, None),
        OpSpec::new(HASE, 9, Imm).address(),
        OpSpec::new(ADD, 10, RegRegReg),
        OpSpec::new(ADDI, 11, RegRegImm),
        OpSpec::new(SUB, 12, RegRegReg),
        OpSpec::new(SUBI, 13, RegRegImm),
        OpSpec::new(CMP, 14, RegReg),
        OpSpec::new(MOV, 15, RegReg),
        OpSpec::new(MOVI, 16, RegImm),
        OpSpec::new(CLR, 17, Reg),
        OpSpec::new(LD, 18, RegImm).address(),
        OpSpec::new(ST, 19, RegImm).address(),
        OpSpec::new(LDR, 20, RegReg),
        OpSpec::new(STR, 21, RegReg),
        OpSpec::new(PUSH, 22, Reg),
        OpSpec::new(POP, 23, Reg),
        OpSpec::new(FEMPTY, 24, None),
        OpSpec::new(FSWAP, 25, None),
    ]
}

fn wide_layout() -> Layout {
    Layout {
        word_bits: 64,
        opcode: Field::new(56, 8),
        flags: Some(FlagLayout {
            immediate: Field::new(55, 1),
            domain: Field::new(53, 2),
        }),
        rd: Field::new(40, 8),
        rs1: Field::new(32, 8),
        rs2: Field::new(0, 8),
        imm: Field::new(0, 48),
        reg_lit: Field::new(0, 40),
        reg_reg_lit: Field::new(0, 32),
    }
}

fn wide_opcodes() -> Vec<OpSpec> {
    use Mnemonic::*;
    use Shape::*;
    let int = [RegisterClass::IntegerScalar];

    vec![
        // Control
        OpSpec::new(HALT, 0x00, None),
        OpSpec::new(BAR, 0x01, None),
        OpSpec::new(JMP, 0x02, Imm).address(),
        OpSpec::new(BZ, 0x03, Imm).address(),
        OpSpec::new(BNZ, 0x04, Imm).address(),
        // Graph access
        OpSpec::new(LDN, 0x10, Imm).address(),
        OpSpec::new(ITER, 0x11, None),
        OpSpec::new(NEXT, 0x12, None),
        OpSpec::new(LDV, 0x13, None),
        OpSpec::new(HASN, 0x14, None),
        OpSpec::new(HASE, 0x15, Imm).address(),
        OpSpec::new(DEG, 0x16, Reg).classes(&int),
        // Arithmetic
        OpSpec::new(ADD, 0x20, RegRegRegOrImm),
        OpSpec::new(ADDI, 0x21, RegRegImm),
        OpSpec::new(SUB, 0x22, RegRegRegOrImm),
        OpSpec::new(SUBI, 0x23, RegRegImm),
        OpSpec::new(MUL, 0x24, RegRegRegOrImm),
        OpSpec::new(CMP, 0x25, RegRegOrImm),
        OpSpec::new(MOV, 0x26, RegRegOrImm),
        OpSpec::new(MOVI, 0x27, RegImm),
        OpSpec::new(CLR, 0x28, Reg),
        // Memory
        OpSpec::new(LD, 0x30, RegImm).address(),
        OpSpec::new(ST, 0x31, RegImm).address(),
        OpSpec::new(LDR, 0x32, RegReg),
        OpSpec::new(STR, 0x33, RegReg),
        // Frontier
        OpSpec::new(PUSH, 0x40, Reg).classes(&int),
        OpSpec::new(POP, 0x41, Reg).classes(&int),
        OpSpec::new(FEMPTY, 0x42, None),
        OpSpec::new(FSWAP, 0x43, None),
    ]
}

fn base() -> RevisionSpec {
    let mut int = class(RegisterClass::IntegerScalar, 0, "r");
    int.aliases = aliases(&[
        ("Rnode", 0),
        ("Rnbr", 1),
        ("Rval", 2),
        ("Racc", 3),
        ("Rtmp", 4),
        ("Rptr", 5),
        ("Rzero", 6),
    ]);

    RevisionSpec {
        name: "base".to_string(),
        overflow: OverflowPolicy::Reject,
        layout: wide_layout(),
        registers: vec![int, class(RegisterClass::FloatScalar, 8, "f")],
        opcodes: wide_opcodes(),
    }
}

fn ext() -> RevisionSpec {
    let mut spec = base();
    spec.name = "ext".to_string();
    spec.registers
        .push(class(RegisterClass::IntegerVector, 16, "v"));
    spec.registers
        .push(class(RegisterClass::FloatVector, 24, "vf"));
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn builtins_build() {
        for isa in Isa::iter() {
            let rev = isa.revision().unwrap();
            assert_eq!(rev.name(), isa.to_string());
        }
    }

    #[test]
    fn isa_names() {
        assert_eq!("ext".parse::<Isa>(), Ok(Isa::Ext));
        assert!("v3".parse::<Isa>().is_err());
    }

    #[test]
    fn proto_matches_prototype_masks() {
        let rev = Isa::Proto.revision().unwrap();
        let layout = rev.layout();
        assert_eq!(layout.flags, Option::None);
        assert_eq!(rev.opcodes().spec(Mnemonic::HALT).map(|s| s.shape), Some(Shape::None));
        assert_eq!(layout.opcode.mask(), 0x1F);
        assert_eq!(layout.rd.mask(), 0x07);
        assert_eq!(layout.imm.mask(), 0x07FF_FFFF);
        assert_eq!(layout.reg_lit.mask(), 0x00FF_FFFF);
        assert_eq!(layout.reg_reg_lit.mask(), 0x001F_FFFF);
        assert_eq!(rev.overflow(), OverflowPolicy::Truncate);
    }

    #[test]
    fn reg_or_imm_needs_flags() {
        let mut spec = Isa::Proto.spec();
        spec.opcodes
            .push(OpSpec::new(Mnemonic::MUL, 26, Shape::RegRegRegOrImm));
        assert!(matches!(spec.build(), Err(Error::Revision(..))));
    }

    #[test]
    fn opcode_must_fit() {
        let mut spec = Isa::Proto.spec();
        spec.opcodes.push(OpSpec::new(Mnemonic::BAR, 32, Shape::None));
        assert!(spec.build().is_err());
    }

    #[test]
    fn registers_must_fit() {
        let mut spec = Isa::Proto.spec();
        spec.registers[0].names = names("r", 9);
        assert!(spec.build().is_err());
    }

    #[test]
    fn classes_need_domain_flag() {
        let mut spec = Isa::Proto.spec();
        spec.registers
            .push(class(RegisterClass::FloatScalar, 8, "f"));
        assert!(spec.build().is_err());
    }

    #[test]
    fn overlapping_layout_is_rejected() {
        let mut spec = Isa::Base.spec();
        spec.layout.rs1 = Field::new(36, 8);
        assert!(spec.build().is_err());
    }

    #[test]
    fn spec_survives_yaml() {
        for isa in Isa::iter() {
            let yaml = serde_yaml::to_string(&isa.spec()).unwrap();
            let spec: RevisionSpec = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(spec, isa.spec());
        }
    }
}
