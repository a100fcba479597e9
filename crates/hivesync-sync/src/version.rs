// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HiveSync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Version parsing and comparison module

use std::cmp::Ordering;
use std::fmt;

/// Numeric (major, minor, patch) triple. Suffixes such as `-rc1` are dropped
/// when parsing and never take part in ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse semver-like version strings (e.g., "0.2.38", "v0.2.38", "1.2-beta")
    ///
    /// Never fails: missing components are 0, and so is any component that
    /// does not start with a digit.
    pub fn parse(s: &str) -> Self {
        let s = s
            .strip_prefix(|c: char| !c.is_ascii_digit())
            .unwrap_or(s);
        let core = s.split_once('-').map_or(s, |(core, _suffix)| core);

        let mut parts = core.splitn(3, '.');
        let major = parts.next().map_or(0, leading_number);
        let minor = parts.next().map_or(0, leading_number);
        let patch = parts.next().map_or(0, leading_number);

        Self::new(major, minor, patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(segment: &str) -> u32 {
    segment
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// Compare two version strings numerically
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// Returns true if `candidate` is strictly newer than `current`
pub fn is_newer(current: &str, candidate: &str) -> bool {
    compare_versions(current, candidate) == Ordering::Less
}
