use gxarch::{inst::Operand, op::Slot, reg::RegisterCatalog, Revision};

use crate::{
    error::Error,
    parser::{is_identifier, is_numeric, parse_immediate, parse_int},
};

/// Like [`classify`], but a revision without flags also takes a bare register
/// index in a register slot, as in `ADD 1, 2, 3`.
pub fn classify_slot(
    token: &str,
    slot: Option<Slot>,
    revision: &Revision,
) -> Result<Operand, Error> {
    let catalog = revision.catalog();
    let bare_index = token.starts_with(|c: char| c.is_ascii_digit());
    if slot != Some(Slot::Reg) || revision.layout().flags.is_some() || !bare_index {
        return classify(token, catalog);
    }

    let index = parse_int(token).ok_or_else(|| Error::MalformedLiteral(token.to_string()))?;
    u8::try_from(index)
        .ok()
        .and_then(|index| catalog.class_of(index).map(|class| Operand::reg(class, index)))
        .ok_or_else(|| Error::InvalidRegisterName(token.to_string()))
}

/// Turns one operand token into a register, an immediate or a label reference.
pub fn classify(token: &str, catalog: &RegisterCatalog) -> Result<Operand, Error> {
    let malformed = || Error::MalformedLiteral(token.to_string());

    if let Some(literal) = token.strip_prefix('#') {
        return parse_immediate(literal)
            .map(Operand::Immediate)
            .ok_or_else(malformed);
    }
    if let Some(reg) = catalog.resolve(token) {
        return Ok(Operand::Register(reg));
    }
    if catalog.is_register_like(token) {
        return Err(Error::InvalidRegisterName(token.to_string()));
    }
    // bare numbers, as in `JMP 4`
    if is_numeric(token) {
        return parse_immediate(token)
            .map(Operand::Immediate)
            .ok_or_else(malformed);
    }
    if is_identifier(token) {
        return Ok(Operand::LabelRef(token.to_string()));
    }
    Err(malformed())
}

/// A label name must not be mistakable for a register.
pub fn check_label(name: &str, catalog: &RegisterCatalog) -> Result<(), Error> {
    if !is_identifier(name) || catalog.resolve(name).is_some() || catalog.is_register_like(name)
    {
        return Err(Error::InvalidLabel(name.to_string()));
    }
    Ok(())
}
