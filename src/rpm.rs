//! RPM version and dependency primitives.
//!
//! ## Overview
//!
//! `EVR` and `vercmp` are a faithful reimplementation of RPM's segment-wise
//! `labelCompare`: tilde sorts lowest, caret sorts highest, digit segments
//! outrank alpha segments, and an absent epoch is treated as zero. Everything
//! downstream (latest-N selection, requirement resolution) depends on this
//! comparator agreeing with RPM bit-for-bit.

// Copyright (C) 2017 Red Hat, Inc.
//
// This file is part of bdcs-api-server.
//
// bdcs-api-server is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// bdcs-api-server is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with bdcs-api-server.  If not, see <http://www.gnu.org/licenses/>.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Epoch/version/release tuple, compared with RPM's segment comparator.
#[derive(Clone, Debug, Eq)]
pub struct EVR {
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
}

impl EVR {
    pub fn new(epoch: Option<u32>, version: impl Into<String>, release: impl Into<String>) -> EVR {
        EVR {
            epoch,
            version: version.into(),
            release: release.into(),
        }
    }
}

impl Ord for EVR {
    fn cmp(&self, other: &EVR) -> Ordering {
        // absent epoch is equivalent to epoch 0
        let epoch_1 = self.epoch.unwrap_or(0);
        let epoch_2 = other.epoch.unwrap_or(0);

        epoch_1
            .cmp(&epoch_2)
            .then_with(|| vercmp(self.version.as_str(), other.version.as_str()))
            .then_with(|| vercmp(self.release.as_str(), other.release.as_str()))
    }
}

impl PartialOrd for EVR {
    fn partial_cmp(&self, other: &EVR) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EVR {
    fn eq(&self, other: &EVR) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for EVR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.epoch, self.release.as_str()) {
            (Some(e), "") => write!(f, "{}:{}", e, self.version),
            (Some(e), _) => write!(f, "{}:{}-{}", e, self.version, self.release),
            (None, "") => write!(f, "{}", self.version),
            (None, _) => write!(f, "{}-{}", self.version, self.release),
        }
    }
}

impl FromStr for EVR {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn illegal_char(c: char) -> bool {
            !(c.is_ascii() && (c.is_ascii_digit() || c.is_ascii_alphabetic() || "._+%{}~^".contains(c)))
        }

        let (epoch, s_rest) = match s.find(':') {
            Some(i) => {
                let (epoch_str, colon_version) = s.split_at(i);
                let epoch = epoch_str
                    .parse::<u32>()
                    .map_err(|_| String::from("Epoch must be an unsigned int"))?;
                let (_, s_rest) = colon_version.split_at(1);
                (Some(epoch), s_rest)
            }
            None => (None, s),
        };

        let (s_version, s_release) = match s_rest.find('-') {
            Some(0) => return Err(String::from("Missing version component")),
            Some(x) => {
                let (s_version, hyphen_release) = s_rest.split_at(x);
                let (_, s_release) = hyphen_release.split_at(1);
                if s_release.is_empty() {
                    return Err(String::from("Missing release component"));
                }
                (s_version, s_release)
            }
            None => (s_rest, ""),
        };

        if s_version.contains(illegal_char) {
            return Err(format!("{}: Illegal character in version {}", s, s_version));
        }
        if s_release.contains(illegal_char) {
            return Err(format!("{}: Illegal character in release {}", s, s_release));
        }

        Ok(EVR {
            epoch,
            version: String::from(s_version),
            release: String::from(s_release),
        })
    }
}

/// Comparison flags carried by an `RpmDependency` (spec's `ReqFlags`).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ReqFlag {
    GreaterThanEqual,
    GreaterThan,
    EqualTo,
    LessThanEqual,
    LessThan,
}

impl ReqFlag {
    /// Applies this flag to an `Ordering` of (candidate, required) EVRs, the
    /// way `RELATION_CMP_MAP` does in the original depsolver.
    pub fn matches(&self, cmp: Ordering) -> bool {
        match self {
            ReqFlag::GreaterThanEqual => cmp == Ordering::Greater || cmp == Ordering::Equal,
            ReqFlag::GreaterThan => cmp == Ordering::Greater,
            ReqFlag::EqualTo => cmp == Ordering::Equal,
            ReqFlag::LessThanEqual => cmp == Ordering::Less || cmp == Ordering::Equal,
            ReqFlag::LessThan => cmp == Ordering::Less,
        }
    }
}

impl fmt::Display for ReqFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ReqFlag::GreaterThanEqual => ">=",
                ReqFlag::GreaterThan => ">",
                ReqFlag::EqualTo => "=",
                ReqFlag::LessThanEqual => "<=",
                ReqFlag::LessThan => "<",
            }
        )
    }
}

impl FromStr for ReqFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">=" => Ok(ReqFlag::GreaterThanEqual),
            ">" => Ok(ReqFlag::GreaterThan),
            "=" => Ok(ReqFlag::EqualTo),
            "<=" => Ok(ReqFlag::LessThanEqual),
            "<" => Ok(ReqFlag::LessThan),
            _ => Err(String::from("Invalid operator")),
        }
    }
}

/// A `Provides`/`Requires` entry: a name plus an optional version constraint.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct RpmDependency {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub flags: Option<ReqFlag>,
}

impl RpmDependency {
    pub fn name_only(name: impl Into<String>) -> RpmDependency {
        RpmDependency {
            name: name.into(),
            epoch: None,
            version: None,
            release: None,
            flags: None,
        }
    }

    fn evr(&self) -> EVR {
        EVR {
            epoch: self.epoch,
            version: self.version.clone().unwrap_or_default(),
            release: self.release.clone().unwrap_or_default(),
        }
    }

    /// Whether `self` (acting as a `Provides`) resolves `req` (a `Requires`).
    ///
    /// Per spec 3: names must match, and either `req` carries no flags, or
    /// `CMP(req.flags)(self.EVR, req.EVR)` holds.
    pub fn resolves(&self, req: &RpmDependency) -> bool {
        if self.name != req.name {
            return false;
        }
        match req.flags {
            None => true,
            Some(flag) => flag.matches(self.evr().cmp(&req.evr())),
        }
    }
}

impl fmt::Display for RpmDependency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.flags {
            Some(flag) => write!(f, "{} {} {}", self.name, flag, self.evr()),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for RpmDependency {
    type Err = String;

    /// Parses `"name"` or `"name OP epoch:version-release"`. Anything that
    /// doesn't fit that shape is kept as a bare name, so a rich-clause atom
    /// with unparseable version data still matches by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn try_parse(s: &str) -> Result<RpmDependency, String> {
            let mut parts = s.split_whitespace();
            let name = parts.next().ok_or("Missing requirement name")?;
            let rest = match parts.next() {
                Some(op) => {
                    let flag = op.parse::<ReqFlag>()?;
                    let evr: EVR = parts
                        .next()
                        .ok_or("Missing version in requirement expression")?
                        .parse()?;
                    Some((flag, evr))
                }
                None => None,
            };

            if parts.next().is_some() {
                return Err(String::from("Extra data after version"));
            }

            Ok(match rest {
                Some((flag, evr)) => RpmDependency {
                    name: name.to_string(),
                    epoch: evr.epoch,
                    version: Some(evr.version),
                    release: Some(evr.release),
                    flags: Some(flag),
                },
                None => RpmDependency::name_only(name),
            })
        }

        Ok(try_parse(s).unwrap_or_else(|_| RpmDependency::name_only(s)))
    }
}

/// Splits an RPM version/release string into RPM's version-segment tokens:
/// digit runs, alpha runs, and tilde/caret markers, skipping anything else.
struct RpmSplit<'a> {
    state: Peekable<Chars<'a>>,
}

impl<'a> RpmSplit<'a> {
    fn new(s: &str) -> RpmSplit {
        RpmSplit {
            state: s.chars().peekable(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Tilde,
    Caret,
    Text(String),
}

impl<'a> Iterator for RpmSplit<'a> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        fn is_version_char(c: char) -> bool {
            c.is_ascii() && (c.is_ascii_digit() || c.is_ascii_alphabetic())
        }

        let mut next_char = self.state.peek().cloned();
        while let Some(c) = next_char {
            if is_version_char(c) || c == '~' || c == '^' {
                break;
            }
            self.state.next();
            next_char = self.state.peek().cloned();
        }

        match next_char {
            Some('~') => {
                self.state.next();
                Some(Segment::Tilde)
            }
            Some('^') => {
                self.state.next();
                Some(Segment::Caret)
            }
            Some(c) if c.is_ascii_digit() => {
                // skip leading zeroes
                while let Some(c) = next_char {
                    if c != '0' {
                        break;
                    }
                    self.state.next();
                    next_char = self.state.peek().cloned();
                }

                let mut ret = String::new();
                while let Some(c) = next_char {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    ret.push(c);
                    self.state.next();
                    next_char = self.state.peek().cloned();
                }

                if ret.is_empty() {
                    ret.push('0');
                }
                Some(Segment::Text(ret))
            }
            Some(_) => {
                let mut ret = String::new();
                while let Some(c) = next_char {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    ret.push(c);
                    self.state.next();
                    next_char = self.state.peek().cloned();
                }
                Some(Segment::Text(ret))
            }
            None => None,
        }
    }
}

/// RPM's segment-wise version comparison (`labelCompare`'s version/release
/// half): tilde sorts below everything including the empty string, caret
/// sorts above everything including the empty string, digit segments outrank
/// alpha segments, and equal-kind segments compare numerically or
/// lexically as appropriate.
pub fn vercmp(v1: &str, v2: &str) -> Ordering {
    let mut v1_parts = RpmSplit::new(v1);
    let mut v2_parts = RpmSplit::new(v2);
    vercmp_parts(&mut v1_parts, &mut v2_parts)
}

fn vercmp_parts(v1: &mut RpmSplit, v2: &mut RpmSplit) -> Ordering {
    fn compare_ints(s1: &str, s2: &str) -> Ordering {
        // no leading zeroes by construction; longer digit string wins
        s1.len().cmp(&s2.len()).then_with(|| s1.cmp(s2))
    }

    let v1_next = v1.next();
    let v2_next = v2.next();

    match (v1_next, v2_next) {
        (Some(Segment::Tilde), Some(Segment::Tilde)) => vercmp_parts(v1, v2),
        (Some(Segment::Tilde), _) => Ordering::Less,
        (_, Some(Segment::Tilde)) => Ordering::Greater,

        (Some(Segment::Caret), Some(Segment::Caret)) => vercmp_parts(v1, v2),
        (Some(Segment::Caret), None) => Ordering::Less,
        (None, Some(Segment::Caret)) => Ordering::Greater,
        (Some(Segment::Caret), _) => Ordering::Less,
        (_, Some(Segment::Caret)) => Ordering::Greater,

        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,

        (Some(Segment::Text(s1)), Some(Segment::Text(s2))) => {
            let s1_digit = s1.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);
            let s2_digit = s2.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);

            if s1_digit && !s2_digit {
                Ordering::Greater
            } else if !s1_digit && s2_digit {
                Ordering::Less
            } else if s1_digit {
                compare_ints(&s1, &s2).then_with(|| vercmp_parts(v1, v2))
            } else {
                s1.cmp(&s2).then_with(|| vercmp_parts(v1, v2))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evr_parses_epoch_version_release() {
        let evr: EVR = "1:2.3-4".parse().unwrap();
        assert_eq!(evr.epoch, Some(1));
        assert_eq!(evr.version, "2.3");
        assert_eq!(evr.release, "4");
    }

    #[test]
    fn tilde_sorts_lowest() {
        assert_eq!(vercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(vercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
    }

    #[test]
    fn caret_sorts_highest() {
        assert_eq!(vercmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(vercmp("1.0", "1.0^git1"), Ordering::Less);
    }

    #[test]
    fn digits_outrank_letters() {
        assert_eq!(vercmp("1.0", "1.a"), Ordering::Greater);
    }

    #[test]
    fn no_epoch_equals_epoch_zero() {
        let a: EVR = "1.0-1".parse().unwrap();
        let b: EVR = "0:1.0-1".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn requirement_resolves_by_name_only_when_unflagged() {
        let provider = RpmDependency::name_only("foo");
        let req = RpmDependency::name_only("foo");
        assert!(provider.resolves(&req));
    }

    #[test]
    fn requirement_checks_flag_against_provider_evr() {
        let provider = RpmDependency {
            name: "foo".into(),
            epoch: None,
            version: Some("2.0".into()),
            release: Some("1".into()),
            flags: None,
        };
        let req = RpmDependency {
            name: "foo".into(),
            epoch: None,
            version: Some("1.0".into()),
            release: None,
            flags: Some(ReqFlag::GreaterThanEqual),
        };
        assert!(provider.resolves(&req));

        let req_too_high = RpmDependency {
            flags: Some(ReqFlag::GreaterThanEqual),
            version: Some("3.0".into()),
            ..req
        };
        assert!(!provider.resolves(&req_too_high));
    }
}
