use color_print::cformat;
use gxarch::{Revision, SectionKind};
use strum::IntoEnumIterator;

use crate::{assembler::Assembly, parser::Line};

/// Hex of one code word, most significant byte first.
fn word_hex(word: u64, bytes: usize) -> String {
    (0..bytes)
        .rev()
        .map(|i| format!("{:02X}", (word >> (i * 8)) & 0xFF))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Listing: pc and encoded word beside each source line.
pub fn print_dump(path: &str, lines: &[&str], assembly: &Assembly, revision: &Revision) {
    let bytes = revision.layout().word_bytes();
    let gutter = 7 + bytes * 3;

    println!(
        "{}+------[{}]{}",
        "-".repeat(gutter),
        path,
        "-".repeat(45usize.saturating_sub(path.len()))
    );

    let mut placed = assembly.placed.iter().peekable();
    for (idx, raw) in lines.iter().enumerate() {
        let line = Line::parse(raw);
        let comment = line
            .comment
            .map(|c| cformat!("<dim>;{}</>", c))
            .unwrap_or_default();

        let body = match placed.next_if(|p| p.line == idx) {
            Some(p) => format!(
                "[{:04X}] {} | {:>4}:   {} {}",
                p.pc,
                word_hex(p.encoded.word, bytes),
                idx + 1,
                p.inst.cformat(revision.catalog()),
                comment
            ),
            None => {
                let code = if line.code.ends_with(':') {
                    cformat!("<g>{}</>", line.code)
                } else if line.code.starts_with('.') {
                    cformat!("<c>{}</>", line.code)
                } else {
                    line.code.to_string()
                };
                format!("{:w$}| {:>4}: {} {}", "", idx + 1, code, comment, w = gutter)
            }
        };
        println!("{}", body);
    }
    println!("{}+{}", "-".repeat(gutter), "-".repeat(53));
}

/// `Code: 3 instrs | Row Index: 4 words | ...`
pub fn summary(assembly: &Assembly) -> String {
    SectionKind::iter()
        .map(|kind| {
            let unit = if kind == SectionKind::Code {
                "instrs"
            } else {
                "words"
            };
            format!("{}: {} {}", kind.label(), assembly.image.len(kind), unit)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
