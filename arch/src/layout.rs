use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A bit range inside an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub shift: u32,
    pub width: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Field { shift, width }
    }

    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    pub fn put(&self, value: u64) -> u64 {
        (value & self.mask()) << self.shift
    }

    pub fn get(&self, word: u64) -> u64 {
        (word >> self.shift) & self.mask()
    }

    /// Bits of the word this field occupies.
    pub fn bits(&self) -> u64 {
        self.mask() << self.shift
    }

    /// One past the highest bit. Wide enough that no user-supplied field overflows it.
    pub fn end(&self) -> u64 {
        self.shift as u64 + self.width as u64
    }

    pub fn contains(&self, other: &Field) -> bool {
        self.shift <= other.shift && other.end() <= self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagLayout {
    pub immediate: Field,
    pub domain: Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub word_bits: u32,
    pub opcode: Field,
    #[serde(default)]
    pub flags: Option<FlagLayout>,
    pub rd: Field,
    pub rs1: Field,
    pub rs2: Field,
    /// Literal of the single-immediate template.
    pub imm: Field,
    /// Literal of the register-plus-literal template; a register source sits in `rs1`.
    pub reg_lit: Field,
    /// Literal of the register-pair-plus-literal template; a register source sits in `rs2`.
    pub reg_reg_lit: Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum Template {
    Zero,
    SingleImm,
    SingleReg,
    RegTriple,
    RegLit,
    RegRegLit,
}

impl Layout {
    pub fn word_bytes(&self) -> usize {
        (self.word_bits / 8) as usize
    }

    pub fn reg_width(&self) -> u32 {
        self.rd.width.min(self.rs1.width).min(self.rs2.width)
    }

    /// Fields a template writes side by side; they must not overlap.
    pub fn template_fields(&self, template: Template) -> Vec<(&'static str, Field)> {
        let mut fields = vec![("opcode", self.opcode)];
        if template != Template::Zero {
            if let Some(flags) = &self.flags {
                fields.push(("immediate flag", flags.immediate));
                fields.push(("domain flag", flags.domain));
            }
        }
        match template {
            Template::Zero => {}
            Template::SingleImm => fields.push(("imm", self.imm)),
            Template::SingleReg => fields.push(("rd", self.rd)),
            Template::RegTriple => {
                fields.push(("rd", self.rd));
                fields.push(("rs1", self.rs1));
                fields.push(("rs2", self.rs2));
            }
            Template::RegLit => {
                fields.push(("rd", self.rd));
                fields.push(("reg_lit", self.reg_lit));
            }
            Template::RegRegLit => {
                fields.push(("rd", self.rd));
                fields.push(("rs1", self.rs1));
                fields.push(("reg_reg_lit", self.reg_reg_lit));
            }
        }
        fields
    }

    pub fn validate(&self) -> Result<(), String> {
        use strum::IntoEnumIterator;

        if self.word_bits != 32 && self.word_bits != 64 {
            return Err(format!("word width must be 32 or 64, not {}", self.word_bits));
        }

        let mut all = vec![
            ("opcode", self.opcode),
            ("rd", self.rd),
            ("rs1", self.rs1),
            ("rs2", self.rs2),
            ("imm", self.imm),
            ("reg_lit", self.reg_lit),
            ("reg_reg_lit", self.reg_reg_lit),
        ];
        if let Some(flags) = &self.flags {
            if flags.immediate.width != 1 {
                return Err("immediate flag must be a single bit".to_string());
            }
            all.push(("immediate flag", flags.immediate));
            all.push(("domain flag", flags.domain));
        }
        for (name, field) in &all {
            if field.width == 0
                || field.shift >= self.word_bits
                || field.end() > self.word_bits as u64
            {
                return Err(format!("field {name} does not fit the word"));
            }
        }

        for template in Template::iter() {
            let fields = self.template_fields(template);
            for (i, (a, fa)) in fields.iter().enumerate() {
                for (b, fb) in &fields[i + 1..] {
                    if fa.bits() & fb.bits() != 0 {
                        return Err(format!("{template}: {a} overlaps {b}"));
                    }
                }
            }
        }

        if self.flags.is_some() {
            if !self.reg_lit.contains(&self.rs1) {
                return Err("rs1 must lie inside reg_lit".to_string());
            }
            if !self.reg_reg_lit.contains(&self.rs2) {
                return Err("rs2 must lie inside reg_reg_lit".to_string());
            }
        }
        Ok(())
    }
}

/// What happens to a value wider than its field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverflowPolicy {
    #[default]
    Reject,
    Truncate,
}
