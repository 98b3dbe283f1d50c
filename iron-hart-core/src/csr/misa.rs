use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Value of the `misa` CSR: the machine XLEN plus one bit per supported extension letter.
///
/// Parsed from an ISA string such as `"rv32imc"`. Supervisor and user mode are always
/// implemented by this hart, so their bits are always set.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Misa(u32);

/// MXL encoding for a 32-bit machine.
const MXL_32: u32 = 1 << 30;

/// Extension letters accepted in an ISA string: the ones this hart implements.
const KNOWN_EXTENSIONS: &str = "cimsu";

impl Misa {
    pub(crate) fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if the extension named by `letter` is present.
    pub fn has(self, letter: char) -> bool {
        extension_bit(letter).map_or(false, |bit| self.0 & bit != 0)
    }
}

impl Default for Misa {
    fn default() -> Self {
        // rv32imc + S + U
        Self(
            MXL_32
                | ['i', 'm', 'c', 's', 'u']
                    .into_iter()
                    .filter_map(extension_bit)
                    .fold(0, |acc, bit| acc | bit),
        )
    }
}

fn extension_bit(letter: char) -> Option<u32> {
    let letter = letter.to_ascii_lowercase();
    letter
        .is_ascii_lowercase()
        .then(|| 1 << (letter as u32 - 'a' as u32))
}

impl FromStr for Misa {
    type Err = MisaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let Some(extensions) = lower.strip_prefix("rv32") else {
            return Err(MisaParseError::UnsupportedBase(s.to_owned()));
        };
        let mut bits = MXL_32;
        for letter in extensions.chars().chain(['s', 'u']) {
            if !KNOWN_EXTENSIONS.contains(letter) {
                return Err(MisaParseError::UnknownExtension(letter));
            }
            bits |= extension_bit(letter).ok_or(MisaParseError::UnknownExtension(letter))?;
        }
        let misa = Self(bits);
        if !misa.has('i') {
            return Err(MisaParseError::MissingBaseIsa);
        }
        Ok(misa)
    }
}

impl fmt::Display for Misa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rv32")?;
        for letter in ('a'..='z').filter(|&letter| self.has(letter)) {
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MisaParseError {
    #[error("ISA string {0:?} does not start with \"rv32\"")]
    UnsupportedBase(String),
    #[error("unknown ISA extension '{0}'")]
    UnknownExtension(char),
    #[error("ISA string does not name the I base")]
    MissingBaseIsa,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let misa = Misa::default();
        assert_eq!(0x4014_1104, misa.bits());
        assert!(misa.has('m'));
        assert!(misa.has('C'));
        assert!(!misa.has('a'));
        assert_eq!(misa, "rv32imc".parse().unwrap());
    }

    #[test]
    fn test_parse() {
        let misa: Misa = "RV32IM".parse().unwrap();
        assert!(misa.has('i'));
        assert!(misa.has('m'));
        assert!(!misa.has('c'));
        assert!(misa.has('s'));
        assert!(misa.has('u'));
        assert_eq!("rv32imsu", misa.to_string());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Err(MisaParseError::UnsupportedBase("rv64i".to_owned())),
            "rv64i".parse::<Misa>()
        );
        assert_eq!(
            Err(MisaParseError::UnknownExtension('x')),
            "rv32ix".parse::<Misa>()
        );
        assert_eq!(
            Err(MisaParseError::UnknownExtension('_')),
            "rv32i_m".parse::<Misa>()
        );
        assert_eq!(Err(MisaParseError::MissingBaseIsa), "rv32m".parse::<Misa>());
    }

    #[test]
    fn test_unimplemented_extensions_are_rejected() {
        for (isa, letter) in [("rv32imafd", 'a'), ("rv32imfd", 'f'), ("rv32e", 'e')] {
            assert_eq!(
                Err(MisaParseError::UnknownExtension(letter)),
                isa.parse::<Misa>()
            );
        }
    }
}
