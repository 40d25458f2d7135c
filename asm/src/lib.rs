pub mod assembler;
pub mod config;
pub mod error;
pub mod label;
pub mod operand;
pub mod output;
pub mod parser;
pub mod util;

pub use assembler::{Assembler, Assembly};
pub use error::{Diag, Error};
