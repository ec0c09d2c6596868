//! Parsing and ordering of model format versions.
//!
//! Formats declare versions in a looser grammar than strict semver: a leading
//! `v` is tolerated, one to three numeric segments are accepted (`v1`, `1.12`,
//! `4.51.3`), and pre-release, build and dev tails may follow
//! (`4.51.3-pre+build.dev0`). Runtime selection compares these against model
//! versions, so the type carries a total order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// A parsed version.
///
/// `precision` records how many numeric segments were written (`v1` keeps
/// precision 1, `1.12` precision 2) and `majorPrefix` whether a leading `v`
/// was present; both are display-only and do not participate in ordering or
/// equality.
#[derive(Clone, Debug, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<String>,
    pub build: Vec<String>,
    pub dev: Vec<String>,
    pub precision: u8,
    pub majorPrefix: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum VersionError {
    #[fail(display = "version '{}' has an invalid prefix", _0)]
    InvalidPrefix(String),

    #[fail(display = "version '{}' is empty", _0)]
    Empty(String),

    #[fail(display = "numeric segment '{}' in version '{}' has a leading zero", _0, _1)]
    LeadingZero(String, String),

    #[fail(display = "version '{}' has an empty part between separators", _0)]
    EmptyPart(String),

    #[fail(display = "unexpected character '{}' in version '{}'", _0, _1)]
    UnexpectedCharacter(char, String),

    #[fail(display = "numeric segment in version '{}' is out of range", _0)]
    OutOfRange(String),
}

impl Version {
    fn key(&self) -> (u64, u64, u64, &[String], &[String], &[String]) {
        (self.major, self.minor, self.patch, &self.pre, &self.build, &self.dev)
    }
}

// Equality and order deliberately ignore precision and prefix: `v1` and
// `1.0.0` name the same version.
impl PartialEq for Version {
    fn eq(&self, other: &Version) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Version) -> Ordering {
        self.key().cmp(&other.key())
    }
}
impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Version) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.majorPrefix, self.major)?;
        if self.precision >= 2 {
            write!(f, ".{}", self.minor)?;
        }
        if self.precision >= 3 {
            write!(f, ".{}", self.patch)?;
        }
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        if !self.dev.is_empty() {
            write!(f, ".{}", self.dev.join("."))?;
        }
        Ok(())
    }
}

/// Splits a suffix tail on dots, diverting a trailing `dev` run.
///
/// `build.dev0` becomes `(["build"], ["dev0"])`; every part must be non-empty.
fn split_tail(raw: &str, original: &str) -> Result<(Vec<String>, Vec<String>), VersionError> {
    let mut main = Vec::new();
    let mut dev = Vec::new();
    let mut in_dev = false;
    for part in raw.split('.') {
        if part.is_empty() {
            return Err(VersionError::EmptyPart(original.to_string()));
        }
        if !in_dev && is_dev_part(part) {
            in_dev = true;
        }
        if in_dev {
            dev.push(part.to_string());
        } else {
            main.push(part.to_string());
        }
    }
    Ok((main, dev))
}

fn is_dev_part(part: &str) -> bool {
    part.starts_with("dev") && part[3..].chars().all(|c| c.is_ascii_digit())
}

fn parse_numeric(seg: &str, original: &str) -> Result<u64, VersionError> {
    if seg.is_empty() {
        return Err(VersionError::EmptyPart(original.to_string()));
    }
    if seg.len() > 1 && seg.starts_with('0') {
        return Err(VersionError::LeadingZero(seg.to_string(), original.to_string()));
    }
    seg.parse::<u64>().map_err(|_| VersionError::OutOfRange(original.to_string()))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Version, VersionError> {
        if input.is_empty() {
            return Err(VersionError::Empty(input.to_string()));
        }
        let (prefix, rest) = if let Some(stripped) = input.strip_prefix('v') {
            ("v", stripped)
        } else {
            ("", input)
        };
        match rest.chars().next() {
            Some(c) if c.is_ascii_digit() => (),
            // only a bare `v` prefix is tolerated
            _ => return Err(VersionError::InvalidPrefix(input.to_string())),
        }

        let mut nums: Vec<u64> = Vec::new();
        let mut pre = Vec::new();
        let mut build = Vec::new();
        let mut dev = Vec::new();

        let bytes = rest.as_bytes();
        let mut i = 0;
        loop {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            nums.push(parse_numeric(&rest[start..i], input)?);
            if i == bytes.len() {
                break;
            }
            match bytes[i] as char {
                '.' => {
                    let tail = &rest[i + 1..];
                    // a dot may introduce the next numeric segment or a dev tail
                    if tail.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                        && nums.len() < 3
                    {
                        i += 1;
                        continue;
                    }
                    let (main, d) = split_tail(tail, input)?;
                    if !main.is_empty() {
                        return Err(VersionError::UnexpectedCharacter('.', input.to_string()));
                    }
                    dev = d;
                    break;
                }
                '-' => {
                    let tail = &rest[i + 1..];
                    let (pre_raw, build_raw) = match tail.find('+') {
                        Some(pos) => (&tail[..pos], Some(&tail[pos + 1..])),
                        None => (tail, None),
                    };
                    let (p, d) = split_tail(pre_raw, input)?;
                    pre = p;
                    dev = d;
                    if let Some(braw) = build_raw {
                        if !dev.is_empty() {
                            return Err(VersionError::UnexpectedCharacter('+', input.to_string()));
                        }
                        let (b, d2) = split_tail(braw, input)?;
                        build = b;
                        dev = d2;
                    }
                    break;
                }
                '+' => {
                    let (b, d) = split_tail(&rest[i + 1..], input)?;
                    build = b;
                    dev = d;
                    break;
                }
                c => return Err(VersionError::UnexpectedCharacter(c, input.to_string())),
            }
        }

        let precision = nums.len() as u8;
        Ok(Version {
            major: nums[0],
            minor: nums.get(1).cloned().unwrap_or(0),
            patch: nums.get(2).cloned().unwrap_or(0),
            pre,
            build,
            dev,
            precision,
            majorPrefix: prefix.to_string(),
        })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Version, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
