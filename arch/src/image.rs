use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{error::Error, graph::Csr};

pub const HEADER_BYTES: usize = 5 * 4;
pub const DATA_WORD_BYTES: usize = 4;

/// Sections of an image, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SectionKind {
    Code,
    RowIndex,
    ColIndex,
    Values,
    Mem,
}

impl SectionKind {
    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Code => "Code",
            SectionKind::RowIndex => "Row Index",
            SectionKind::ColIndex => "Column Index",
            SectionKind::Values => "Values",
            SectionKind::Mem => "Mem",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub code: Vec<u64>,
    pub graph: Csr,
    pub mem: Vec<u32>,
}

impl Image {
    /// The 32-bit words of a data section; `None` for code.
    pub fn data(&self, kind: SectionKind) -> Option<&Vec<u32>> {
        match kind {
            SectionKind::Code => None,
            SectionKind::RowIndex => Some(&self.graph.row_index),
            SectionKind::ColIndex => Some(&self.graph.col_index),
            SectionKind::Values => Some(&self.graph.values),
            SectionKind::Mem => Some(&self.mem),
        }
    }

    pub fn data_mut(&mut self, kind: SectionKind) -> Option<&mut Vec<u32>> {
        match kind {
            SectionKind::Code => None,
            SectionKind::RowIndex => Some(&mut self.graph.row_index),
            SectionKind::ColIndex => Some(&mut self.graph.col_index),
            SectionKind::Values => Some(&mut self.graph.values),
            SectionKind::Mem => Some(&mut self.mem),
        }
    }

    pub fn len(&self, kind: SectionKind) -> usize {
        match self.data(kind) {
            Some(words) => words.len(),
            None => self.code.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        SectionKind::iter().all(|kind| self.len(kind) == 0)
    }

    pub fn header(&self) -> Result<[u32; 5], Error> {
        let mut header = [0u32; 5];
        for (slot, kind) in header.iter_mut().zip(SectionKind::iter()) {
            *slot = u32::try_from(self.len(kind)).map_err(|_| {
                Error::Image(format!("{kind} has {} words, more than a u32 holds", self.len(kind)))
            })?;
        }
        Ok(header)
    }

    /// Header, then every section little-endian; code words keep their low `code_word_bytes`.
    pub fn to_bytes(&self, code_word_bytes: usize) -> Result<Vec<u8>, Error> {
        check_word_bytes(code_word_bytes)?;
        let header = self.header()?;

        let mut bytes = Vec::with_capacity(
            HEADER_BYTES
                + self.code.len() * code_word_bytes
                + header[1..].iter().map(|n| *n as usize).sum::<usize>() * DATA_WORD_BYTES,
        );
        for count in header {
            bytes.extend_from_slice(&count.to_le_bytes());
        }
        for (pc, word) in self.code.iter().enumerate() {
            if code_word_bytes < 8 && word >> (code_word_bytes * 8) != 0 {
                return Err(Error::Image(format!(
                    "code word {pc} (0x{word:X}) is wider than {code_word_bytes} bytes"
                )));
            }
            bytes.extend_from_slice(&word.to_le_bytes()[..code_word_bytes]);
        }
        for kind in SectionKind::iter().skip(1) {
            for word in self.data(kind).into_iter().flatten() {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
        }
        Ok(bytes)
    }

    /// Slices an image using nothing but its header and the code word width.
    pub fn from_bytes(bytes: &[u8], code_word_bytes: usize) -> Result<Self, Error> {
        check_word_bytes(code_word_bytes)?;
        let mut reader = Reader { bytes, pos: 0 };

        let mut header = [0usize; 5];
        for count in header.iter_mut() {
            *count = reader.u32()? as usize;
        }

        let mut image = Image::default();
        for _ in 0..header[0] {
            let chunk = reader.take(code_word_bytes)?;
            let mut word = [0u8; 8];
            word[..code_word_bytes].copy_from_slice(chunk);
            image.code.push(u64::from_le_bytes(word));
        }
        for (kind, count) in SectionKind::iter().zip(header).skip(1) {
            let mut words = Vec::with_capacity(count);
            for _ in 0..count {
                words.push(reader.u32()?);
            }
            if let Some(section) = image.data_mut(kind) {
                *section = words;
            }
        }

        if reader.pos != bytes.len() {
            return Err(Error::Image(format!(
                "{} trailing bytes after the last section",
                bytes.len() - reader.pos
            )));
        }
        Ok(image)
    }
}

fn check_word_bytes(code_word_bytes: usize) -> Result<(), Error> {
    match code_word_bytes {
        4 | 8 => Ok(()),
        n => Err(Error::Image(format!("unsupported code word width of {n} bytes"))),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let chunk = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or_else(|| Error::Image(format!("truncated at byte {}", self.pos)))?;
        self.pos += n;
        Ok(chunk)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let chunk = self.take(4)?;
        Ok(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Image {
        Image {
            code: vec![0x8100_0005, 0],
            graph: Csr {
                row_index: vec![0, 1, 3],
                col_index: vec![1, 0, 2],
                values: vec![5, 5, 7],
            },
            mem: vec![0xDEAD_BEEF],
        }
    }

    #[test]
    fn header_counts_sections() {
        assert_eq!(sample().header().unwrap(), [2, 3, 3, 3, 1]);
        assert_eq!(Image::default().header().unwrap(), [0; 5]);
        assert!(Image::default().is_empty());
    }

    #[test]
    fn layout_is_little_endian() {
        let bytes = sample().to_bytes(4).unwrap();
        assert_eq!(bytes.len(), HEADER_BYTES + 2 * 4 + 10 * 4);
        assert_eq!(&bytes[..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[0x05, 0x00, 0x00, 0x81]);
        assert_eq!(&bytes[bytes.len() - 4..], &[0xEF, 0xBE, 0xAD, 0xDE]);

        let wide = sample().to_bytes(8).unwrap();
        assert_eq!(wide.len(), bytes.len() + 2 * 4);
    }

    #[test]
    fn reads_back_from_header() {
        for width in [4, 8] {
            let bytes = sample().to_bytes(width).unwrap();
            assert_eq!(Image::from_bytes(&bytes, width).unwrap(), sample());
        }
    }

    #[test]
    fn rejects_bad_input() {
        let bytes = sample().to_bytes(4).unwrap();
        assert!(Image::from_bytes(&bytes[..bytes.len() - 1], 4).is_err());

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(Image::from_bytes(&trailing, 4).is_err());

        assert!(Image::from_bytes(&bytes, 3).is_err());
        assert!(Image::from_bytes(&[1, 0], 4).is_err());

        let mut wide = sample();
        wide.code.push(1 << 40);
        assert!(wide.to_bytes(4).is_err());
    }

    #[test]
    fn section_names() {
        assert_eq!("row_index".parse::<SectionKind>(), Ok(SectionKind::RowIndex));
        assert_eq!(SectionKind::ColIndex.to_string(), "col_index");
        assert!("data".parse::<SectionKind>().is_err());
    }
}
