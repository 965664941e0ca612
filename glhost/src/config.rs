//! OpenGL context configuration

use std::fmt;
use std::str::FromStr;

/// OpenGL versions a context can be requested for.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum GlVersion {
    V3_0,
    V3_1,
    V3_2,
    V3_3,
    V4_0,
    V4_1,
    V4_2,
    V4_3,
    V4_4,
    V4_5,
    V4_6,
}

impl GlVersion {
    /// Every supported version, oldest first.
    pub const ALL: [GlVersion; 11] = [
        GlVersion::V3_0,
        GlVersion::V3_1,
        GlVersion::V3_2,
        GlVersion::V3_3,
        GlVersion::V4_0,
        GlVersion::V4_1,
        GlVersion::V4_2,
        GlVersion::V4_3,
        GlVersion::V4_4,
        GlVersion::V4_5,
        GlVersion::V4_6,
    ];

    pub fn major(self) -> u8 {
        match self {
            GlVersion::V3_0 | GlVersion::V3_1 | GlVersion::V3_2 | GlVersion::V3_3 => 3,
            _ => 4,
        }
    }

    pub fn minor(self) -> u8 {
        match self {
            GlVersion::V3_0 | GlVersion::V4_0 => 0,
            GlVersion::V3_1 | GlVersion::V4_1 => 1,
            GlVersion::V3_2 | GlVersion::V4_2 => 2,
            GlVersion::V3_3 | GlVersion::V4_3 => 3,
            GlVersion::V4_4 => 4,
            GlVersion::V4_5 => 5,
            GlVersion::V4_6 => 6,
        }
    }

    /// Profiles only exist from 3.2 onwards; those contexts are requested as core profile.
    pub fn uses_core_profile(self) -> bool {
        self >= GlVersion::V3_2
    }
}

impl fmt::Display for GlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl TryFrom<(u8, u8)> for GlVersion {
    type Error = UnknownGlVersion;

    fn try_from((major, minor): (u8, u8)) -> Result<Self, Self::Error> {
        GlVersion::ALL
            .into_iter()
            .find(|v| v.major() == major && v.minor() == minor)
            .ok_or_else(|| UnknownGlVersion(format!("{major}.{minor}")))
    }
}

impl FromStr for GlVersion {
    type Err = UnknownGlVersion;

    /// Accepts both `"4.6"` and `"V4_6"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('V')
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);

        let (major, minor) = digits
            .split_once(['.', '_'])
            .ok_or_else(|| UnknownGlVersion(s.to_string()))?;

        match (major.parse::<u8>(), minor.parse::<u8>()) {
            (Ok(major), Ok(minor)) => {
                GlVersion::try_from((major, minor)).map_err(|_| UnknownGlVersion(s.to_string()))
            }
            _ => Err(UnknownGlVersion(s.to_string())),
        }
    }
}

/// Returned when parsing a version outside of 3.0 ..= 4.6.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported OpenGL version {0:?} (expected 3.0 through 4.6)")]
pub struct UnknownGlVersion(pub String);

/// Requested context parameters. Fixed for the lifetime of a window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlConfig {
    pub version: GlVersion,
}

impl GlConfig {
    pub fn new(version: GlVersion) -> Self {
        Self { version }
    }
}

impl Default for GlConfig {
    fn default() -> Self {
        Self {
            version: GlVersion::V3_1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_minor_cover_every_variant() {
        let pairs: Vec<(u8, u8)> = GlVersion::ALL
            .iter()
            .map(|v| (v.major(), v.minor()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (3, 0),
                (3, 1),
                (3, 2),
                (3, 3),
                (4, 0),
                (4, 1),
                (4, 2),
                (4, 3),
                (4, 4),
                (4, 5),
                (4, 6)
            ]
        );
    }

    #[test]
    fn test_parse_dotted_and_variant_names() {
        assert_eq!("4.6".parse::<GlVersion>(), Ok(GlVersion::V4_6));
        assert_eq!("V3_3".parse::<GlVersion>(), Ok(GlVersion::V3_3));
        assert_eq!(" 3.0 ".parse::<GlVersion>(), Ok(GlVersion::V3_0));
    }

    #[test]
    fn test_parse_rejects_unknown_versions() {
        assert!("2.1".parse::<GlVersion>().is_err());
        assert!("4.7".parse::<GlVersion>().is_err());
        assert!("four".parse::<GlVersion>().is_err());
    }

    #[test]
    fn test_core_profile_starts_at_3_2() {
        assert!(!GlVersion::V3_1.uses_core_profile());
        assert!(GlVersion::V3_2.uses_core_profile());
        assert!(GlVersion::V4_6.uses_core_profile());
    }

    #[test]
    fn test_default_config_is_3_1() {
        assert_eq!(GlConfig::default().version, GlVersion::V3_1);
        assert_eq!(GlConfig::default().version.to_string(), "3.1");
    }
}
