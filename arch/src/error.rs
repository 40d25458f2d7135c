use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown opcode: `{0}`")]
    UnknownOpcode(String),

    #[error("`{mnemonic}` expects `{expected}`, got `{got}`")]
    ShapeMismatch {
        mnemonic: String,
        expected: String,
        got: String,
    },

    #[error("Unresolved label: `{0}`")]
    UnresolvedLabel(String),

    #[error("Unknown opcode id: 0x{0:02X}")]
    UnknownOpcodeId(u8),

    #[error("Malformed word 0x{word:016X}: {reason}")]
    MalformedWord { word: u64, reason: String },

    #[error("Malformed image: {0}")]
    Image(String),

    #[error("Invalid ISA revision `{0}`: {1}")]
    Revision(String, String),
}
