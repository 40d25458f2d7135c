use gxarch::{
    inst::{Encoded, Instruction},
    Image, Mnemonic, Revision, SectionKind,
};

use std::path::Path;

use crate::{
    error::{Diag, Error},
    label::Labels,
    operand::{check_label, classify_slot},
    output::write_image,
    parser::{parse_data, Line, Stmt},
};

/// Instruction slots the VM loader reserves.
pub const PROGRAM_SIZE: usize = 8192;
/// Words of VM memory.
pub const MEMORY_SIZE: usize = 65536;

/// Parser state threaded through both passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    section: SectionKind,
    pc: u32,
}

impl Cursor {
    fn new() -> Self {
        Cursor {
            section: SectionKind::Code,
            pc: 0,
        }
    }
}

/// One encoded instruction and where it came from.
#[derive(Debug, Clone)]
pub struct Placed {
    pub line: usize,
    pub pc: u32,
    pub inst: Instruction,
    pub encoded: Encoded,
}

#[derive(Debug, Clone)]
pub struct Assembly {
    pub image: Image,
    pub labels: Labels,
    pub placed: Vec<Placed>,
}

impl Assembly {
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = vec![];
        if self.image.code.len() > PROGRAM_SIZE {
            warnings.push(format!(
                "{} instructions exceed the {PROGRAM_SIZE} the VM loads",
                self.image.code.len()
            ));
        }
        let dangling: Vec<_> = self.image.graph.dangling().collect();
        if let Some((edge, dest)) = dangling.first() {
            warnings.push(format!(
                "{} edge(s) point past the last node, first is edge {edge} to node {dest}",
                dangling.len()
            ));
        }
        if self.image.mem.len() > MEMORY_SIZE {
            warnings.push(format!(
                "{} memory words exceed the VM's {MEMORY_SIZE}",
                self.image.mem.len()
            ));
        }
        warnings
    }
}

pub struct Assembler {
    revision: Revision,
}

impl Assembler {
    pub fn new(revision: Revision) -> Self {
        Assembler { revision }
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn assemble(&self, source: &str) -> Result<Assembly, Vec<Diag>> {
        let lines: Vec<&str> = source.lines().collect();
        let labels = self.collect_labels(&lines)?;
        let (image, placed) = self.emit(&lines, &labels)?;

        let assembly = Assembly {
            image,
            labels,
            placed,
        };
        self.check(&assembly).map_err(|err| vec![Diag::global(err)])?;
        Ok(assembly)
    }

    /// Assembles, then writes the image atomically. Nothing is written on failure.
    pub fn assemble_to_file(&self, source: &str, output: &Path) -> Result<Assembly, Vec<Diag>> {
        let assembly = self.assemble(source)?;
        let bytes = assembly
            .image
            .to_bytes(self.revision.layout().word_bytes())
            .map_err(|err| vec![Diag::global(err.into())])?;
        write_image(output, &bytes).map_err(|err| vec![Diag::global(err)])?;
        Ok(assembly)
    }

    /// Pass 1: label addresses, plus every error that must stop pass 2.
    pub fn collect_labels(&self, lines: &[&str]) -> Result<Labels, Vec<Diag>> {
        let catalog = self.revision.catalog();
        let mut cursor = Cursor::new();
        let mut labels = Labels::new();
        let mut diags = vec![];

        for (idx, raw) in lines.iter().enumerate() {
            let stmt = match Stmt::parse(Line::parse(raw).code, cursor.section) {
                Ok(Some(stmt)) => stmt,
                Ok(None) => continue,
                Err(err) => {
                    diags.push(Diag::at(idx, err));
                    continue;
                }
            };
            match stmt {
                Stmt::Directive(kind, _) => cursor.section = kind,
                Stmt::Label(name) => {
                    if let Err(err) = check_label(name, catalog) {
                        diags.push(Diag::at(idx, err));
                    } else if let Some((prev, _)) = labels.insert(name, idx, cursor.pc) {
                        diags.push(
                            Diag::at(idx, Error::DuplicateLabel(name.to_string())).with_note(prev),
                        );
                    }
                }
                Stmt::Code { .. } => cursor.pc += 1,
                Stmt::Data(_) => {}
            }
        }

        if diags.is_empty() {
            Ok(labels)
        } else {
            Err(diags)
        }
    }

    /// Pass 2: encode code lines and collect data words.
    fn emit(&self, lines: &[&str], labels: &Labels) -> Result<(Image, Vec<Placed>), Vec<Diag>> {
        let mut cursor = Cursor::new();
        let mut image = Image::default();
        let mut placed = vec![];
        let mut diags = vec![];

        for (idx, raw) in lines.iter().enumerate() {
            let stmt = match Stmt::parse(Line::parse(raw).code, cursor.section) {
                Ok(Some(stmt)) => stmt,
                Ok(None) => continue,
                Err(err) => {
                    diags.push(Diag::at(idx, err));
                    continue;
                }
            };
            match stmt {
                Stmt::Directive(kind, words) => {
                    cursor.section = kind;
                    self.data(&mut image, kind, &words, idx, &mut diags);
                }
                Stmt::Label(_) => {}
                Stmt::Code { mnemonic, operands } => {
                    match self.instruction(mnemonic, &operands, labels, idx) {
                        Ok((inst, encoded)) => {
                            image.code.push(encoded.word);
                            placed.push(Placed {
                                line: idx,
                                pc: cursor.pc,
                                inst,
                                encoded,
                            });
                        }
                        Err(err) => diags.push(Diag::at(idx, err)),
                    }
                    cursor.pc += 1;
                }
                Stmt::Data(words) => self.data(&mut image, cursor.section, &words, idx, &mut diags),
            }
        }

        if diags.is_empty() {
            Ok((image, placed))
        } else {
            Err(diags)
        }
    }

    fn instruction(
        &self,
        mnemonic: &str,
        operands: &[&str],
        labels: &Labels,
        line: usize,
    ) -> Result<(Instruction, Encoded), Error> {
        let mnemonic = Mnemonic::parse(mnemonic)?;
        let slots = self
            .revision
            .opcodes()
            .spec(mnemonic)
            .map(|spec| spec.shape.slots())
            .unwrap_or_default();
        let operands = operands
            .iter()
            .enumerate()
            .map(|(i, token)| classify_slot(token, slots.get(i).copied(), &self.revision))
            .collect::<Result<Vec<_>, _>>()?;
        let inst = Instruction::new(mnemonic, operands)
            .resolve(|name| labels.get_pc(name))
            .map_err(|name| Error::UnresolvedLabel(name, line))?;
        let encoded = self.revision.encode(&inst)?;
        Ok((inst, encoded))
    }

    fn data(
        &self,
        image: &mut Image,
        section: SectionKind,
        words: &[&str],
        line: usize,
        diags: &mut Vec<Diag>,
    ) {
        let Some(target) = image.data_mut(section) else {
            return;
        };
        for word in words {
            match parse_data(word, section == SectionKind::Mem) {
                Ok(value) => target.push(value),
                Err(err) => diags.push(Diag::at(line, err)),
            }
        }
    }

    /// Whole-image checks once every line assembled.
    fn check(&self, assembly: &Assembly) -> Result<(), Error> {
        let graph = &assembly.image.graph;
        if !graph.is_empty() {
            graph.validate().map_err(Error::InvalidGraph)?;
        }
        assembly.image.header()?;
        Ok(())
    }
}
