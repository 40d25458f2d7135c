use bimap::BiMap;
use indexmap::IndexMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use strum::{Display, EnumIter, EnumString};

/// Value domain of a register. The discriminant is the value of the domain flag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[repr(u8)]
pub enum RegisterClass {
    IntegerScalar = 0,
    FloatScalar = 1,
    IntegerVector = 2,
    FloatVector = 3,
}

impl RegisterClass {
    pub fn is_float(self) -> bool {
        matches!(self, RegisterClass::FloatScalar | RegisterClass::FloatVector)
    }

    pub fn short(self) -> &'static str {
        match self {
            RegisterClass::IntegerScalar => "int",
            RegisterClass::FloatScalar => "float",
            RegisterClass::IntegerVector => "vint",
            RegisterClass::FloatVector => "vfloat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub class: RegisterClass,
    pub index: u8,
}

impl Register {
    pub fn new(class: RegisterClass, index: u8) -> Self {
        Register { class, index }
    }
}

/// One contiguous class range: `names[i]` is the canonical name of `base + i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub class: RegisterClass,
    pub base: u8,
    pub names: Vec<String>,
    #[serde(default)]
    pub aliases: IndexMap<String, u8>,
}

#[derive(Debug, Clone)]
pub struct RegisterCatalog {
    ranges: Vec<(RegisterClass, Range<u8>)>,
    canonical: BiMap<String, u8>,
    names: IndexMap<String, Register>,
    prefixes: Vec<String>,
}

impl RegisterCatalog {
    pub fn build(specs: &[ClassSpec]) -> Result<Self, String> {
        let mut ranges: Vec<(RegisterClass, Range<u8>)> = Vec::new();
        let mut canonical = BiMap::new();
        let mut names = IndexMap::new();
        let mut prefixes: Vec<String> = Vec::new();

        for spec in specs {
            let end = spec.base as usize + spec.names.len();
            if spec.names.is_empty() || end > 256 {
                return Err(format!("class {} has an invalid range", spec.class));
            }
            let range = spec.base..end as u8;
            if let Some((class, _)) = ranges
                .iter()
                .find(|(class, r)| *class == spec.class || overlaps(r, &range))
            {
                return Err(format!("class {} overlaps class {}", spec.class, class));
            }

            for (offset, name) in spec.names.iter().enumerate() {
                let reg = Register::new(spec.class, spec.base + offset as u8);
                if names.insert(name.clone(), reg).is_some() {
                    return Err(format!("register name `{name}` defined twice"));
                }
                canonical.insert(name.clone(), reg.index);

                let head = name.trim_end_matches(|c: char| c.is_ascii_digit());
                if !head.is_empty() && head.len() < name.len() && !prefixes.iter().any(|p| p == head)
                {
                    prefixes.push(head.to_string());
                }
            }

            for (alias, offset) in &spec.aliases {
                if *offset as usize >= spec.names.len() {
                    return Err(format!("alias `{alias}` is outside class {}", spec.class));
                }
                let reg = Register::new(spec.class, spec.base + offset);
                if names.insert(alias.clone(), reg).is_some() {
                    return Err(format!("register name `{alias}` defined twice"));
                }
            }

            ranges.push((spec.class, range));
        }

        Ok(RegisterCatalog {
            ranges,
            canonical,
            names,
            prefixes,
        })
    }

    pub fn resolve(&self, name: &str) -> Option<Register> {
        self.names.get(name).copied()
    }

    pub fn class_of(&self, index: u8) -> Option<RegisterClass> {
        self.ranges
            .iter()
            .find(|(_, range)| range.contains(&index))
            .map(|(class, _)| *class)
    }

    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.canonical.get_by_right(&index).map(String::as_str)
    }

    /// `r12` on an eight register file: shaped like a register, but not one.
    pub fn is_register_like(&self, token: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            token.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
            })
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = RegisterClass> + '_ {
        self.ranges.iter().map(|(class, _)| *class)
    }

    pub fn has_class(&self, class: RegisterClass) -> bool {
        self.classes().any(|c| c == class)
    }

    /// One past the highest index in use.
    pub fn end(&self) -> u16 {
        self.ranges
            .iter()
            .map(|(_, range)| range.end as u16)
            .max()
            .unwrap_or(0)
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, Register)> {
        self.names.iter().map(|(name, reg)| (name.as_str(), *reg))
    }
}

fn overlaps(a: &Range<u8>, b: &Range<u8>) -> bool {
    a.start < b.end && b.start < a.end
}
