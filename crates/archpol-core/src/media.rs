//! Media device types and `{pool, media type}` references.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Field, FieldIssue, PolicyResult, invalid};

/// Integer device-type constant for archive media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaType(i32);

const MNEMONICS: [(MediaType, &str); 8] = [
    (MediaType::DISK, "dk"),
    (MediaType::TAPE, "tp"),
    (MediaType::DLT, "lt"),
    (MediaType::LTO, "li"),
    (MediaType::STK_9840, "sg"),
    (MediaType::STK_T10000, "ti"),
    (MediaType::AIT, "at"),
    (MediaType::OPTICAL, "mo"),
];

impl MediaType {
    /// Disk archiving.
    pub const DISK: Self = Self(100);
    /// Generic tape.
    pub const TAPE: Self = Self(200);
    /// DLT tape.
    pub const DLT: Self = Self(201);
    /// LTO tape.
    pub const LTO: Self = Self(202);
    /// StorageTek 9840 tape.
    pub const STK_9840: Self = Self(203);
    /// StorageTek T10000 tape.
    pub const STK_T10000: Self = Self(204);
    /// Sony AIT tape.
    pub const AIT: Self = Self(205);
    /// Magneto-optical media.
    pub const OPTICAL: Self = Self(300);

    /// Wrap a raw device-type code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// Raw device-type code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Disk media gets disk-based copies; everything else is removable.
    #[must_use]
    pub const fn is_disk(self) -> bool {
        self.0 == Self::DISK.0
    }

    /// Two-letter mnemonic for known device types.
    #[must_use]
    pub fn mnemonic(self) -> Option<&'static str> {
        MNEMONICS
            .iter()
            .find(|(media, _)| *media == self)
            .map(|(_, name)| *name)
    }

    /// Parse a mnemonic (`li`) or a numeric code (`202`).
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Some((media, _)) = MNEMONICS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(token))
        {
            return Some(*media);
        }
        token.parse::<i32>().ok().map(Self)
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => f.write_str(name),
            None => write!(f, "mt{}", self.0),
        }
    }
}

/// A pool named together with the media type it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolReference {
    name: String,
    media_type: MediaType,
}

impl PoolReference {
    /// Construct a reference.
    #[must_use]
    pub fn new(name: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            name: name.into(),
            media_type,
        }
    }

    /// Parse the `"poolName,mediaType"` boundary form.
    ///
    /// # Errors
    ///
    /// `MalformedReference` on `field` when either half is missing or the
    /// media type is not recognised.
    pub fn parse(field: Field, raw: &str) -> PolicyResult<Self> {
        let malformed = || invalid(field, FieldIssue::MalformedReference, Some(raw));
        let (name, media) = raw.split_once(',').ok_or_else(malformed)?;
        let name = name.trim();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(malformed());
        }
        let media_type = MediaType::parse(media).ok_or_else(malformed)?;
        Ok(Self::new(name, media_type))
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media type of the pool.
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }
}

impl Display for PoolReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.name, self.media_type.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;

    #[test]
    fn only_disk_is_disk() {
        assert!(MediaType::DISK.is_disk());
        assert!(!MediaType::LTO.is_disk());
        assert!(!MediaType::from_code(9999).is_disk());
    }

    #[test]
    fn mnemonics_and_codes_parse() {
        assert_eq!(MediaType::parse("LI"), Some(MediaType::LTO));
        assert_eq!(MediaType::parse("100"), Some(MediaType::DISK));
        assert_eq!(MediaType::parse("zz"), None);
        assert_eq!(MediaType::from_code(42).to_string(), "mt42");
        assert_eq!(MediaType::DISK.to_string(), "dk");
    }

    #[test]
    fn references_parse_and_format() -> Result<(), Box<dyn std::error::Error>> {
        let reference = PoolReference::parse(Field::MediaPool, " tapes , li ")?;
        assert_eq!(reference.name(), "tapes");
        assert_eq!(reference.media_type(), MediaType::LTO);
        assert_eq!(reference.to_string(), "tapes,202");
        assert_eq!(PoolReference::parse(Field::MediaPool, &reference.to_string())?, reference);
        Ok(())
    }

    #[test]
    fn malformed_references_are_rejected() {
        for raw in ["tapes", ",li", "tapes,", "tapes,xx", "my pool,li"] {
            assert!(matches!(
                PoolReference::parse(Field::ScratchPool, raw),
                Err(PolicyError::InvalidField {
                    field: Field::ScratchPool,
                    issue: FieldIssue::MalformedReference,
                    ..
                })
            ));
        }
    }
}
