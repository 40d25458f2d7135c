use gxarch::{isa::RevisionSpec, Isa, OverflowPolicy, Revision};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Error;

pub fn read_spec(path: &Path) -> Result<RevisionSpec, Error> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|err| Error::IoFailure(name.clone(), err))?;
    serde_yaml::from_reader(BufReader::new(file)).map_err(|err| Error::Config(name, err))
}

/// A built-in revision, or the one described by `config`; `overflow` overrides its policy.
pub fn load_revision(
    isa: Isa,
    config: Option<&Path>,
    overflow: Option<OverflowPolicy>,
) -> Result<Revision, Error> {
    let spec = match config {
        Some(path) => read_spec(path)?,
        None => isa.spec(),
    };
    let revision = spec.build().map_err(Error::Isa)?;
    Ok(match overflow {
        Some(policy) => revision.with_overflow(policy),
        None => revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gxarch::layout::Field;
    use std::io::Write;

    #[test]
    fn builtin_with_override() {
        let rev = load_revision(Isa::Proto, None, Some(OverflowPolicy::Reject)).unwrap();
        assert_eq!(rev.name(), "proto");
        assert_eq!(rev.overflow(), OverflowPolicy::Reject);

        let rev = load_revision(Isa::Base, None, None).unwrap();
        assert_eq!(rev.overflow(), OverflowPolicy::Reject);
    }

    #[test]
    fn yaml_revision() {
        let mut spec = Isa::Base.spec();
        spec.name = "custom".to_string();
        spec.opcodes.retain(|op| op.opcode < 0x10);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_yaml::to_string(&spec).unwrap().as_bytes())
            .unwrap();

        let rev = load_revision(Isa::Proto, Some(file.path()), None).unwrap();
        assert_eq!(rev.name(), "custom");
        assert_eq!(rev.opcodes().iter().count(), 5);
    }

    #[test]
    fn config_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name: [broken").unwrap();
        assert!(matches!(
            load_revision(Isa::Base, Some(file.path()), None),
            Err(Error::Config(..))
        ));

        assert!(matches!(
            load_revision(Isa::Base, Some(Path::new("/no/such/isa.yaml")), None),
            Err(Error::IoFailure(..))
        ));

        let mut spec = Isa::Base.spec();
        spec.layout.word_bits = 48;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_yaml::to_string(&spec).unwrap().as_bytes())
            .unwrap();
        assert!(matches!(
            load_revision(Isa::Base, Some(file.path()), None),
            Err(Error::Isa(_))
        ));

        let mut spec = Isa::Proto.spec();
        spec.layout.rs2 = Field::new(u32::MAX, 1);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_yaml::to_string(&spec).unwrap().as_bytes())
            .unwrap();
        assert!(matches!(
            load_revision(Isa::Proto, Some(file.path()), None),
            Err(Error::Isa(_))
        ));
    }
}
