//! Factor extraction from concrete environment identifiers.
//!
//! An identifier is split into hyphen-separated atoms and each atom is
//! classified against a declared vocabulary: interpreter bases (`py37`,
//! `pypy3`), exact tool names (`mypy`, `docs`) and dependency-pin bases
//! (`xmlschema1100`). Classification checks interpreters first, then
//! pins, then tools; unrecognized atoms are valid and carry no factor.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// An interpreter version: major plus optional minor (`3.7`, `3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PyVersion {
    pub major: u8,
    pub minor: Option<u8>,
}

impl PyVersion {
    /// Parse a dotted version string (`"3.7"`, `"3.10"`, `"3"`).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(m) => Some(m.parse().ok()?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor })
    }

    /// Parse a digit run as used in atoms: first digit is the major
    /// version, the rest the minor (`"37"` is 3.7, `"310"` is 3.10,
    /// `"3"` is major-only).
    pub fn from_digits(digits: &str) -> Option<Self> {
        let mut chars = digits.chars();
        let major = chars.next()?.to_digit(10)? as u8;
        let rest = chars.as_str();
        if rest.is_empty() {
            return Some(Self { major, minor: None });
        }
        let minor = rest.parse().ok()?;
        Some(Self {
            major,
            minor: Some(minor),
        })
    }

    /// The digit-run spelling used inside identifiers (`3.7` is `"37"`).
    pub fn digits(&self) -> String {
        match self.minor {
            Some(minor) => format!("{}{}", self.major, minor),
            None => self.major.to_string(),
        }
    }

    fn as_tuple(&self) -> (u8, u8) {
        (self.major, self.minor.unwrap_or(0))
    }
}

impl PartialOrd for PyVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PyVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_tuple().cmp(&other.as_tuple())
    }
}

impl fmt::Display for PyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}.{}", self.major, minor),
            None => write!(f, "{}", self.major),
        }
    }
}

/// The interpreter factor of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
    /// Vocabulary base the atom matched (`py`, `pypy`).
    pub base: String,
    pub version: PyVersion,
}

impl Interpreter {
    /// Executable name to probe and run. The `py` base maps to CPython
    /// naming (`python3.7`); any other base keeps its own prefix
    /// (`pypy3`).
    pub fn executable(&self) -> String {
        if self.base == "py" {
            format!("python{}", self.version)
        } else {
            format!("{}{}", self.base, self.version)
        }
    }

    /// The atom this factor was extracted from (`py37`).
    pub fn atom(&self) -> String {
        format!("{}{}", self.base, self.version.digits())
    }
}

/// A dependency-pin factor: base plus opaque digit tag.
///
/// The tag is not interpreted here; dep rules map the full atom
/// (`xmlschema1100`) to a concrete requirement string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinFactor {
    pub base: String,
    pub tag: String,
}

impl PinFactor {
    pub fn atom(&self) -> String {
        format!("{}{}", self.base, self.tag)
    }
}

/// The factor decomposition of one concrete environment identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorMap {
    /// The identifier this map was extracted from.
    pub env: String,
    /// All atoms in identifier order, recognized or not.
    pub atoms: Vec<String>,
    pub interpreter: Option<Interpreter>,
    pub tool: Option<String>,
    pub pin: Option<PinFactor>,
}

impl FactorMap {
    pub fn has_atom(&self, atom: &str) -> bool {
        self.atoms.iter().any(|a| a == atom)
    }
}

/// Declared factor vocabulary (the `[factors]` config section).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorVocabulary {
    /// Interpreter bases; an atom is `<base><digit-run>`.
    #[serde(default)]
    pub interpreters: Vec<String>,

    /// Exact-match tool atoms.
    #[serde(default)]
    pub tools: Vec<String>,

    /// Dependency-pin bases; an atom is `<base><digit-run>`.
    #[serde(default)]
    pub pins: Vec<String>,
}

enum AtomKind {
    Interpreter(Interpreter),
    Tool(String),
    Pin(PinFactor),
    Opaque,
}

impl FactorVocabulary {
    /// Match `atom` against a list of bases, longest base first, so
    /// `pypy3` binds to `pypy` rather than `py`.
    fn split_on_base<'a>(&self, bases: &'a [String], atom: &str) -> Option<(&'a str, String)> {
        let mut candidates: Vec<&String> = bases.iter().collect();
        candidates.sort_by_key(|b| std::cmp::Reverse(b.len()));

        for base in candidates {
            if let Some(rest) = atom.strip_prefix(base.as_str()) {
                if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                    return Some((base, rest.to_string()));
                }
            }
        }
        None
    }

    fn classify(&self, atom: &str) -> AtomKind {
        if let Some((base, digits)) = self.split_on_base(&self.interpreters, atom) {
            if let Some(version) = PyVersion::from_digits(&digits) {
                return AtomKind::Interpreter(Interpreter {
                    base: base.to_string(),
                    version,
                });
            }
        }
        if let Some((base, tag)) = self.split_on_base(&self.pins, atom) {
            return AtomKind::Pin(PinFactor {
                base: base.to_string(),
                tag,
            });
        }
        if self.tools.iter().any(|t| t == atom) {
            return AtomKind::Tool(atom.to_string());
        }
        AtomKind::Opaque
    }

    /// The primary interpreter base: the first declared one. CI axis
    /// values (`"3.9"`) are mapped through it.
    pub fn primary_interpreter_base(&self) -> Option<&str> {
        self.interpreters.first().map(String::as_str)
    }

    /// Identifier for a CI python axis value: `"3.10"` becomes `py310`
    /// under the primary base. `None` when no base is declared.
    pub fn env_for_python(&self, python: &str) -> Option<String> {
        let base = self.primary_interpreter_base()?;
        let version = PyVersion::parse(python)?;
        Some(format!("{}{}", base, version.digits()))
    }
}

/// Decompose an identifier into its [`FactorMap`].
///
/// At most one atom per dimension: a second interpreter, tool or pin
/// atom is a [`ConfigError::ConflictingFactors`].
pub fn extract_factors(env: &str, vocab: &FactorVocabulary) -> Result<FactorMap> {
    let atoms: Vec<String> = env.split('-').map(str::to_string).collect();

    let mut interpreter: Option<Interpreter> = None;
    let mut tool: Option<String> = None;
    let mut pin: Option<PinFactor> = None;

    for atom in &atoms {
        match vocab.classify(atom) {
            AtomKind::Interpreter(found) => {
                if let Some(existing) = &interpreter {
                    return Err(ConfigError::ConflictingFactors {
                        env: env.to_string(),
                        kind: "interpreter".to_string(),
                        first: existing.atom(),
                        second: found.atom(),
                    });
                }
                interpreter = Some(found);
            }
            AtomKind::Tool(found) => {
                if let Some(existing) = &tool {
                    return Err(ConfigError::ConflictingFactors {
                        env: env.to_string(),
                        kind: "tool".to_string(),
                        first: existing.clone(),
                        second: found,
                    });
                }
                tool = Some(found);
            }
            AtomKind::Pin(found) => {
                if let Some(existing) = &pin {
                    return Err(ConfigError::ConflictingFactors {
                        env: env.to_string(),
                        kind: "pin".to_string(),
                        first: existing.atom(),
                        second: found.atom(),
                    });
                }
                pin = Some(found);
            }
            AtomKind::Opaque => {}
        }
    }

    Ok(FactorMap {
        env: env.to_string(),
        atoms,
        interpreter,
        tool,
        pin,
    })
}
