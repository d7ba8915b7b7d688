use std::fmt::{Display, Formatter};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTriple {
    pub architecture: Architecture,
    pub format: Format,
    pub version: Version,
}

impl TargetTriple {
    pub fn new(architecture: Architecture, format: Format, version: Version) -> Self {
        Self {
            architecture,
            format,
            version,
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidTriple> {
        let mut triple = s.split('-');

        let arch = Architecture::parse(triple.next().ok_or(InvalidTriple::InvalidFormat(s))?)?;
        let format = Format::parse(triple.next().ok_or(InvalidTriple::InvalidFormat(s))?)?;
        let version = Version::parse(
            arch,
            format,
            triple.next().ok_or(InvalidTriple::InvalidFormat(s))?,
        )?;

        if triple.next().is_none() {
            Ok(Self::new(arch, format, version))
        } else {
            Err(InvalidTriple::InvalidFormat(s))
        }
    }

    /// Returns `true` if the legacy format of this target can't represent
    /// opaque pointers at all.
    pub fn requires_typed_pointers(&self) -> bool {
        match self.format {
            Format::Bitcode => true,
        }
    }
}

impl Display for TargetTriple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.architecture, self.format, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Air32,
    Air64,
}

impl Architecture {
    fn parse(s: &str) -> Result<Self, InvalidTriple> {
        match s {
            "air32" => Ok(Self::Air32),
            "air64" => Ok(Self::Air64),
            _ => Err(InvalidTriple::ArchitectureNotSupported),
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Air32 => write!(f, "air32"),
            Self::Air64 => write!(f, "air64"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bitcode,
}

impl Format {
    fn parse(s: &str) -> Result<Self, InvalidTriple> {
        match s {
            "bitcode" => Ok(Format::Bitcode),
            _ => Err(InvalidTriple::FormatNotSupported),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Bitcode => write!(f, "bitcode"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Bitcode(BitcodeVersion),
}

impl Version {
    fn parse(_arch: Architecture, format: Format, s: &str) -> Result<Self, InvalidTriple> {
        match format {
            Format::Bitcode => {
                let version = match s {
                    "5.0" => BitcodeVersion::V5_0,
                    "7.0" => BitcodeVersion::V7_0,
                    _ => return Err(InvalidTriple::VersionNotSupported),
                };
                Ok(Self::Bitcode(version))
            }
        }
    }

    pub fn bitcode(self) -> BitcodeVersion {
        match self {
            Self::Bitcode(version) => version,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bitcode(version) => write!(f, "{}", version),
        }
    }
}

/// Legacy bitcode writer generations.
///
/// `V5_0` infers pointee types up front and only patches the sites that
/// disagree with the inference. `V7_0` wraps every typed pointer use and
/// definition with a marker and reads the types back off the markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BitcodeVersion {
    V5_0,
    V7_0,
}

#[derive(Debug, Clone, Copy, Error)]
pub enum InvalidTriple<'a> {
    #[error("the format of triple must be `architecture-format-version: but got `{0}`")]
    InvalidFormat(&'a str),

    #[error("given architecture is not supported")]
    ArchitectureNotSupported,

    #[error("given output format is not supported")]
    FormatNotSupported,

    #[error("given version is not supported")]
    VersionNotSupported,
}

impl Display for BitcodeVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V5_0 => write!(f, "5.0"),
            Self::V7_0 => write!(f, "7.0"),
        }
    }
}
