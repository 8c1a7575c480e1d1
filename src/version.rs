//! Semantic version parsing and comparison for release tags.
//!
//! Release tags arrive as free-form strings (`"v1.2.3"`, `"1.2"`, sometimes
//! worse). Parsing is deliberately lenient: it never fails, and any component
//! it cannot read resolves to zero. Callers that need to distinguish a
//! genuinely-zero version from an unreadable tag should compare the parse
//! result against [`Version::ZERO`] themselves.

/// A `major.minor.patch` semantic version.
///
/// Ordering is lexicographic on `(major, minor, patch)`, which matches
/// semver precedence for plain release versions (no pre-release tags).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// The all-zero version, also the result of parsing an unreadable tag.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Build a version from its three components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string of the form `X.Y.Z` or `vX.Y.Z`.
    ///
    /// Components are scanned left to right. A component that is missing or
    /// does not start with a digit resolves to zero, along with every
    /// component to its right; trailing non-digit text inside a component
    /// keeps that component's leading digits and ends the scan. So
    /// `"1.2"` parses as `1.2.0` and `"1.2rc.9"` parses as `1.2.0`.
    ///
    /// Parsing never fails; an empty or fully unreadable string yields
    /// [`Version::ZERO`].
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let text = text.strip_prefix('v').unwrap_or(text);

        let mut fields = [0u32; 3];
        for (slot, token) in fields.iter_mut().zip(text.splitn(3, '.')) {
            let digits = token.len()
                - token
                    .trim_start_matches(|c: char| c.is_ascii_digit())
                    .len();
            if digits == 0 {
                break;
            }
            *slot = token[..digits].parse().unwrap_or(0);
            if digits < token.len() {
                break;
            }
        }

        Self::new(fields[0], fields[1], fields[2])
    }

    /// The major version number.
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// The minor version number.
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// The patch version number.
    pub const fn patch(&self) -> u32 {
        self.patch
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
