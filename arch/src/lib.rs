pub mod encode;
pub mod error;
pub mod graph;
pub mod image;
pub mod inst;
pub mod isa;
pub mod layout;
pub mod op;
pub mod reg;

pub use error::Error;
pub use graph::Csr;
pub use image::{Image, SectionKind};
pub use inst::{Encoded, Flags, Immediate, Instruction, Operand};
pub use isa::{Isa, Revision, RevisionSpec};
pub use layout::OverflowPolicy;
pub use op::Mnemonic;
pub use reg::{Register, RegisterClass};
