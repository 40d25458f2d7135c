use crate::{
    error::Error,
    inst::{Encoded, Flags, ImmKind, Immediate, Instruction, Operand},
    isa::Revision,
    layout::{Field, OverflowPolicy, Template},
    op::{LiteralKind, OpSpec, Slot},
    reg::{Register, RegisterClass},
};

impl Revision {
    pub fn encode(&self, inst: &Instruction) -> Result<Encoded, Error> {
        let spec = self
            .opcodes()
            .spec(inst.mnemonic)
            .ok_or_else(|| Error::UnknownOpcode(inst.mnemonic.to_string()))?;
        let flags = spec.check(&inst.operands)?;
        let layout = self.layout();
        let template = spec.shape.template();

        let mut packer = Packer {
            spec,
            policy: self.overflow(),
            word: layout.opcode.put(spec.opcode as u64),
        };
        if template != Template::Zero {
            if let Some(bits) = &layout.flags {
                packer.word |= bits.immediate.put(flags.immediate as u64);
                packer.word |= bits.domain.put(u8::from(flags.domain) as u64);
            }
        }

        let ops = &inst.operands;
        match template {
            Template::Zero => {}
            Template::SingleImm => packer.operand(&ops[0], layout.rd, layout.imm)?,
            Template::SingleReg => packer.operand(&ops[0], layout.rd, layout.imm)?,
            Template::RegTriple => {
                packer.operand(&ops[0], layout.rd, layout.imm)?;
                packer.operand(&ops[1], layout.rs1, layout.imm)?;
                if let Some(op) = ops.get(2) {
                    packer.operand(op, layout.rs2, layout.imm)?;
                }
            }
            Template::RegLit => {
                packer.operand(&ops[0], layout.rd, layout.reg_lit)?;
                packer.operand(&ops[1], layout.rs1, layout.reg_lit)?;
            }
            Template::RegRegLit => {
                packer.operand(&ops[0], layout.rd, layout.reg_reg_lit)?;
                packer.operand(&ops[1], layout.rs1, layout.reg_reg_lit)?;
                packer.operand(&ops[2], layout.rs2, layout.reg_reg_lit)?;
            }
        }

        Ok(Encoded {
            opcode: spec.opcode,
            flags: if template == Template::Zero {
                Flags::default()
            } else {
                flags
            },
            word: packer.word,
        })
    }

    /// Reads both flag axes of a word. Revisions without flags report the defaults.
    pub fn flags(&self, word: u64) -> Result<Flags, Error> {
        let Some(bits) = &self.layout().flags else {
            return Ok(Flags::default());
        };
        let domain = bits.domain.get(word) as u8;
        let domain = RegisterClass::try_from(domain).map_err(|_| Error::MalformedWord {
            word,
            reason: format!("domain flag {domain} names no register class"),
        })?;
        Ok(Flags {
            immediate: bits.immediate.get(word) == 1,
            domain,
        })
    }

    pub fn decode(&self, word: u64) -> Result<Instruction, Error> {
        let layout = self.layout();
        let malformed = |reason: String| Error::MalformedWord { word, reason };

        if layout.word_bits < 64 && word >> layout.word_bits != 0 {
            return Err(malformed(format!(
                "bits set beyond the {}-bit word",
                layout.word_bits
            )));
        }

        let opcode = layout.opcode.get(word) as u8;
        let spec = self
            .opcodes()
            .by_opcode(opcode)
            .ok_or(Error::UnknownOpcodeId(opcode))?;
        let template = spec.shape.template();
        let flags = self.flags(word)?;
        let has_flags = layout.flags.is_some();

        if flags.immediate && spec.shape.literal_slot().is_none() {
            return Err(malformed(format!(
                "immediate flag set on {}, which takes no literal",
                spec.mnemonic
            )));
        }
        if has_flags && template != Template::Zero {
            if !self.catalog().has_class(flags.domain) {
                return Err(malformed(format!(
                    "domain flag names {}, which this revision lacks",
                    flags.domain
                )));
            }
            if spec.shape.literal_slot() == Some(Slot::Imm) && !flags.immediate {
                return Err(malformed(format!(
                    "immediate flag clear on {}, which always takes a literal",
                    spec.mnemonic
                )));
            }
            if template == Template::SingleImm && flags.domain != Flags::default().domain {
                return Err(malformed(format!(
                    "domain flag names {} on {}, which takes no register",
                    flags.domain, spec.mnemonic
                )));
            }
        }

        let register = |field: Field| -> Result<Register, Error> {
            let index = field.get(word) as u8;
            let class = self.catalog().class_of(index).ok_or_else(|| {
                malformed(format!("register {index} is outside every class"))
            })?;
            if has_flags && class != flags.domain {
                return Err(malformed(format!(
                    "register {index} is {class}, domain flag says {}",
                    flags.domain
                )));
            }
            Ok(Register::new(class, index))
        };
        let literal = |field: Field, class: Option<RegisterClass>| -> Operand {
            let bits = field.get(word);
            let float = spec.literal == LiteralKind::Value && class.is_some_and(|c| c.is_float());
            let kind = if float {
                ImmKind::Float
            } else {
                ImmKind::Integer
            };
            Operand::Immediate(Immediate { kind, bits })
        };
        // Without flags a reg|imm slot cannot exist, so the slot alone decides.
        let takes_literal = |slot: Slot| match slot {
            Slot::Reg => false,
            Slot::Imm => true,
            Slot::RegOrImm => flags.immediate,
        };

        let slots = spec.shape.slots();
        let mut operands = Vec::with_capacity(slots.len());
        // Every bit the encoder may have written; the rest must be clear.
        let mut used = layout.opcode.bits();
        if template != Template::Zero {
            if let Some(bits) = &layout.flags {
                used |= bits.immediate.bits() | bits.domain.bits();
            }
        }
        match template {
            Template::Zero => {}
            Template::SingleImm => {
                used |= layout.imm.bits();
                operands.push(literal(layout.imm, None));
            }
            Template::SingleReg => {
                used |= layout.rd.bits();
                operands.push(Operand::Register(register(layout.rd)?));
            }
            Template::RegTriple => {
                for field in [layout.rd, layout.rs1, layout.rs2].into_iter().take(slots.len()) {
                    used |= field.bits();
                    operands.push(Operand::Register(register(field)?));
                }
            }
            Template::RegLit => {
                let rd = register(layout.rd)?;
                operands.push(Operand::Register(rd));
                operands.push(if takes_literal(slots[1]) {
                    used |= layout.reg_lit.bits();
                    literal(layout.reg_lit, Some(rd.class))
                } else {
                    used |= layout.rs1.bits();
                    Operand::Register(register(layout.rs1)?)
                });
                used |= layout.rd.bits();
            }
            Template::RegRegLit => {
                let rd = register(layout.rd)?;
                operands.push(Operand::Register(rd));
                operands.push(Operand::Register(register(layout.rs1)?));
                operands.push(if takes_literal(slots[2]) {
                    used |= layout.reg_reg_lit.bits();
                    literal(layout.reg_reg_lit, Some(rd.class))
                } else {
                    used |= layout.rs2.bits();
                    Operand::Register(register(layout.rs2)?)
                });
                used |= layout.rd.bits() | layout.rs1.bits();
            }
        }

        let stray = word & !used;
        if stray != 0 {
            return Err(malformed(format!(
                "bits 0x{stray:X} lie outside every field of {}",
                spec.mnemonic
            )));
        }

        Ok(Instruction::new(spec.mnemonic, operands))
    }
}

/// Accumulates one word, applying the overflow policy to every placed value.
struct Packer<'a> {
    spec: &'a OpSpec,
    policy: OverflowPolicy,
    word: u64,
}

impl Packer<'_> {
    fn operand(&mut self, operand: &Operand, reg: Field, lit: Field) -> Result<(), Error> {
        match operand {
            Operand::Register(r) => {
                let value = Immediate::int(r.index as i64);
                self.place(reg, value, || format!("register {}", r.index))
            }
            Operand::Immediate(imm) => self.place(lit, *imm, || imm.to_string()),
            Operand::LabelRef(name) => Err(Error::UnresolvedLabel(name.clone())),
        }
    }

    fn place<F>(&mut self, field: Field, value: Immediate, got: F) -> Result<(), Error>
    where
        F: Fn() -> String,
    {
        if self.policy == OverflowPolicy::Reject && !value.fits(field.width) {
            return Err(Error::ShapeMismatch {
                mnemonic: self.spec.mnemonic.to_string(),
                expected: format!("operand within {} bits", field.width),
                got: got(),
            });
        }
        self.word |= field.put(value.bits);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Isa;
    use crate::op::Mnemonic::{self, *};
    use crate::reg::RegisterClass::*;

    fn r(index: u8) -> Operand {
        Operand::reg(IntegerScalar, index)
    }

    fn f(index: u8) -> Operand {
        Operand::reg(FloatScalar, 8 + index)
    }

    fn v(index: u8) -> Operand {
        Operand::reg(IntegerVector, 16 + index)
    }

    fn vf(index: u8) -> Operand {
        Operand::reg(FloatVector, 24 + index)
    }

    fn imm(value: i64) -> Operand {
        Operand::int(value)
    }

    fn inst(mnemonic: Mnemonic, operands: Vec<Operand>) -> Instruction {
        Instruction::new(mnemonic, operands)
    }

    macro_rules! test_op {
        ($($name:ident: $isa:expr, $inst:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let rev = $isa.revision().unwrap();
                    let inst = $inst;
                    let encoded = rev.encode(&inst).unwrap();
                    let decoded = rev.decode(encoded.word).unwrap();
                    println!("{:?} -> {:0>16X} -> {:?}", inst, encoded.word, decoded);
                    assert_eq!(inst, decoded, "word: {:b}", encoded.word);
                }
            )*
        };
    }

    test_op! {
        proto_halt: Isa::Proto, inst(HALT, vec![]),
        proto_jmp: Isa::Proto, inst(JMP, vec![imm(0x07FF_FFFF)]),
        proto_clr: Isa::Proto, inst(CLR, vec![r(7)]),
        proto_add: Isa::Proto, inst(ADD, vec![r(1), r(2), r(3)]),
        proto_mov: Isa::Proto, inst(MOV, vec![r(4), r(5)]),
        proto_movi: Isa::Proto, inst(MOVI, vec![r(1), imm(0x00FF_FFFF)]),
        proto_subi: Isa::Proto, inst(SUBI, vec![r(1), r(2), imm(0x001F_FFFF)]),
        base_bar: Isa::Base, inst(BAR, vec![]),
        base_hase: Isa::Base, inst(HASE, vec![imm(0xFFFF_FFFF_FFFF)]),
        base_deg: Isa::Base, inst(DEG, vec![r(2)]),
        base_clr_float: Isa::Base, inst(CLR, vec![f(3)]),
        base_ldr: Isa::Base, inst(LDR, vec![r(0), r(5)]),
        base_add_reg: Isa::Base, inst(ADD, vec![r(1), r(2), r(3)]),
        base_add_imm: Isa::Base, inst(ADD, vec![r(1), r(2), imm(0xFFFF_FFFF)]),
        base_add_float: Isa::Base, inst(ADD, vec![f(1), f(2), Operand::float(0.25)]),
        base_mul_float_reg: Isa::Base, inst(MUL, vec![f(0), f(1), f(7)]),
        base_cmp_reg: Isa::Base, inst(CMP, vec![r(3), r(4)]),
        base_cmp_imm: Isa::Base, inst(CMP, vec![r(3), imm(0xFF_FFFF_FFFF)]),
        base_mov_float: Isa::Base, inst(MOV, vec![f(2), Operand::float(-3.5)]),
        base_movi: Isa::Base, inst(MOVI, vec![r(6), imm(42)]),
        base_addi: Isa::Base, inst(ADDI, vec![r(1), r(1), imm(1)]),
        base_ld_float: Isa::Base, inst(LD, vec![f(0), imm(100)]),
        base_st: Isa::Base, inst(ST, vec![r(3), imm(65535)]),
        base_pop: Isa::Base, inst(POP, vec![r(0)]),
        ext_add_vector: Isa::Ext, inst(ADD, vec![v(0), v(1), v(2)]),
        ext_mul_vfloat: Isa::Ext, inst(MUL, vec![vf(0), vf(1), Operand::float(2.0)]),
        ext_mov_vector: Isa::Ext, inst(MOV, vec![v(7), v(6)]),
    }

    #[test]
    fn proto_is_bit_exact() {
        let rev = Isa::Proto.revision().unwrap();
        let word = |i: Instruction| rev.encode(&i).unwrap().word;

        assert_eq!(word(inst(HALT, vec![])), 0);
        assert_eq!(word(inst(FSWAP, vec![])), 25 << 27);
        assert_eq!(
            word(inst(ADD, vec![r(1), r(2), r(3)])),
            (10 << 27) | (1 << 24) | (2 << 21) | (3 << 18)
        );
        assert_eq!(word(inst(JMP, vec![imm(4)])), (3 << 27) | 4);
        assert_eq!(word(inst(LD, vec![r(3), imm(100)])), (18 << 27) | (3 << 24) | 100);
        assert_eq!(word(inst(CMP, vec![r(0), r(5)])), (14 << 27) | (5 << 21));
        assert_eq!(word(inst(PUSH, vec![r(1)])), (22 << 27) | (1 << 24));

        // Negative literals are masked to the field, as the prototype did.
        assert_eq!(
            word(inst(MOVI, vec![r(1), imm(-1)])),
            (16 << 27) | (1 << 24) | 0x00FF_FFFF
        );
        assert_eq!(
            word(inst(ADDI, vec![r(1), r(2), imm(-2)])),
            (11 << 27) | (1 << 24) | (2 << 21) | 0x001F_FFFE
        );
        assert_eq!(word(inst(BZ, vec![imm(-1)])), (1 << 27) | 0x07FF_FFFF);
    }

    #[test]
    fn movi_then_halt() {
        let rev = Isa::Base.revision().unwrap();
        let movi = rev.encode(&inst(MOVI, vec![r(1), imm(5)])).unwrap();
        let halt = rev.encode(&inst(HALT, vec![])).unwrap();

        assert_eq!(movi.opcode, 0x27);
        assert!(movi.flags.immediate);
        assert_eq!(movi.flags.domain, IntegerScalar);
        assert_eq!(movi.word, (0x27 << 56) | (1 << 55) | (1 << 40) | 5);
        assert_eq!(
            rev.decode(movi.word).unwrap(),
            inst(MOVI, vec![r(1), imm(5)])
        );

        assert_eq!(halt.word, 0);
        assert_eq!(halt.flags, Flags::default());
        assert_eq!(rev.flags(halt.word).unwrap(), Flags::default());
        assert_eq!(rev.decode(halt.word).unwrap(), inst(HALT, vec![]));
    }

    #[test]
    fn flags_follow_operands() {
        let rev = Isa::Ext.revision().unwrap();
        let add = rev.encode(&inst(ADD, vec![vf(0), vf(1), vf(2)])).unwrap();
        assert!(!add.flags.immediate);
        assert_eq!(add.flags.domain, FloatVector);
        assert_eq!(rev.flags(add.word).unwrap(), add.flags);

        let clr = rev.encode(&inst(CLR, vec![f(0)])).unwrap();
        assert_eq!((clr.word >> 53) & 0b11, 1);
    }

    #[test]
    fn register_source_sits_in_sub_range() {
        let rev = Isa::Base.revision().unwrap();
        let mov = rev.encode(&inst(MOV, vec![r(1), r(2)])).unwrap();
        assert_eq!(mov.word, (0x26 << 56) | (1 << 40) | (2 << 32));

        let add = rev.encode(&inst(ADD, vec![r(1), r(2), r(3)])).unwrap();
        assert_eq!(add.word, (0x20 << 56) | (1 << 40) | (2 << 32) | 3);
    }

    #[test]
    fn float_literal_keeps_binary32_bits() {
        let rev = Isa::Base.revision().unwrap();
        let mov = rev.encode(&inst(MOV, vec![f(0), Operand::float(1.5)])).unwrap();
        assert_eq!(mov.word & 0xFFFF_FFFF, 0x3FC0_0000);
        assert_eq!(mov.flags.domain, FloatScalar);
    }

    #[test]
    fn boundary_under_reject() {
        let rev = Isa::Base.revision().unwrap();
        let max = (1i64 << 40) - 1;
        let ok = rev.encode(&inst(MOVI, vec![r(1), imm(max)])).unwrap();
        assert_eq!(ok.word & ((1 << 40) - 1), max as u64);

        let err = rev
            .encode(&inst(MOVI, vec![r(1), imm(max + 1)]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                mnemonic: "MOVI".to_string(),
                expected: "operand within 40 bits".to_string(),
                got: format!("#{}", max + 1),
            }
        );

        assert!(rev.encode(&inst(MOVI, vec![r(1), imm(-(1 << 39))])).is_ok());
        assert!(rev
            .encode(&inst(MOVI, vec![r(1), imm(-(1 << 39) - 1)]))
            .is_err());
    }

    #[test]
    fn boundary_under_truncate() {
        let rev = Isa::Base
            .revision()
            .unwrap()
            .with_overflow(OverflowPolicy::Truncate);
        let max = (1i64 << 32) - 1;
        let word = rev
            .encode(&inst(ADDI, vec![r(1), r(2), imm(max + 1)]))
            .unwrap()
            .word;
        assert_eq!(word & 0xFFFF_FFFF, 0);

        let proto = Isa::Proto.revision().unwrap();
        let word = proto.encode(&inst(JMP, vec![imm(1 << 27)])).unwrap().word;
        assert_eq!(word, 3 << 27);
    }

    #[test]
    fn labels_never_reach_the_word() {
        let rev = Isa::Base.revision().unwrap();
        let err = rev
            .encode(&inst(JMP, vec![Operand::LabelRef("end".to_string())]))
            .unwrap_err();
        assert_eq!(err, Error::UnresolvedLabel("end".to_string()));
    }

    #[test]
    fn missing_mnemonic() {
        let rev = Isa::Proto.revision().unwrap();
        assert_eq!(
            rev.encode(&inst(MUL, vec![r(0), r(1), r(2)])),
            Err(Error::UnknownOpcode("MUL".to_string()))
        );
    }

    #[test]
    fn decode_failures() {
        let rev = Isa::Base.revision().unwrap();
        assert_eq!(rev.decode(0x7F << 56), Err(Error::UnknownOpcodeId(0x7F)));

        // HALT with the immediate flag
        assert!(matches!(
            rev.decode(1 << 55),
            Err(Error::MalformedWord { .. })
        ));
        // CLR naming a vector class on a scalar-only revision
        assert!(rev.decode((0x28 << 56) | (2 << 53) | (16 << 40)).is_err());
        // CLR of a float register under the integer domain
        assert!(rev.decode((0x28 << 56) | (9 << 40)).is_err());
        // register past every class
        assert!(rev.decode((0x28 << 56) | (200 << 40)).is_err());

        let proto = Isa::Proto.revision().unwrap();
        assert!(proto.decode(1 << 32).is_err());
        assert_eq!(proto.decode(31 << 27), Err(Error::UnknownOpcodeId(31)));
    }

    #[test]
    fn decode_rejects_stray_bits() {
        let stray = |rev: &Revision, word: u64| {
            matches!(
                rev.decode(word),
                Err(Error::MalformedWord { reason, .. }) if reason.contains("outside")
            )
        };

        let rev = Isa::Base.revision().unwrap();
        // LDR r1, r2 with a third register
        let ldr = rev.encode(&inst(LDR, vec![r(1), r(2)])).unwrap().word;
        assert!(rev.decode(ldr).is_ok());
        assert!(stray(&rev, ldr | 3));
        // operand bits on HALT
        assert!(stray(&rev, 1 << 40));
        // MOV r1, r2 with literal bits beside rs1
        let mov = rev.encode(&inst(MOV, vec![r(1), r(2)])).unwrap().word;
        assert!(rev.decode(mov).is_ok());
        assert!(stray(&rev, mov | 0xFF));

        // JMP under the float domain, or without the immediate flag
        let jmp = rev.encode(&inst(JMP, vec![imm(4)])).unwrap().word;
        assert!(rev.decode(jmp).is_ok());
        assert!(rev.decode(jmp | (1 << 53)).is_err());
        assert!(rev.decode(jmp & !(1 << 55)).is_err());

        let proto = Isa::Proto.revision().unwrap();
        let add = proto.encode(&inst(ADD, vec![r(1), r(2), r(3)])).unwrap().word;
        assert!(stray(&proto, add | 1));
        let cmp = proto.encode(&inst(CMP, vec![r(1), r(2)])).unwrap().word;
        assert!(stray(&proto, cmp | (1 << 18)));
    }

    #[test]
    fn decode_zero_extends() {
        let rev = Isa::Proto.revision().unwrap();
        let word = rev.encode(&inst(MOVI, vec![r(1), imm(-1)])).unwrap().word;
        assert_eq!(
            rev.decode(word).unwrap(),
            inst(MOVI, vec![r(1), imm(0x00FF_FFFF)])
        );
    }
}
