//! Log levels and their numeric wire representation.

use std::fmt;
use std::str::FromStr;

/// Severity attached to every log record.
///
/// The ordering follows severity, so `level >= threshold` is the usual
/// enablement check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FemtoLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl FemtoLevel {
    /// Every level in ascending severity.
    pub const ALL: [FemtoLevel; 6] = [
        FemtoLevel::Trace,
        FemtoLevel::Debug,
        FemtoLevel::Info,
        FemtoLevel::Warn,
        FemtoLevel::Error,
        FemtoLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FemtoLevel::Trace => "TRACE",
            FemtoLevel::Debug => "DEBUG",
            FemtoLevel::Info => "INFO",
            FemtoLevel::Warn => "WARN",
            FemtoLevel::Error => "ERROR",
            FemtoLevel::Critical => "CRITICAL",
        }
    }

    /// Numeric code carried on the wire.
    ///
    /// The values match the level constants remote collectors already
    /// understand (`TRACE = 0` through `FATAL = 50000`).
    pub fn wire_code(self) -> u32 {
        match self {
            FemtoLevel::Trace => 0,
            FemtoLevel::Debug => 10_000,
            FemtoLevel::Info => 20_000,
            FemtoLevel::Warn => 30_000,
            FemtoLevel::Error => 40_000,
            FemtoLevel::Critical => 50_000,
        }
    }

    /// Map a wire code back to a level.
    ///
    /// Codes between the well-known values round down to the nearest level so
    /// custom levels from other producers keep their relative severity.
    pub fn from_wire_code(code: u32) -> Self {
        match code {
            0..=9_999 => FemtoLevel::Trace,
            10_000..=19_999 => FemtoLevel::Debug,
            20_000..=29_999 => FemtoLevel::Info,
            30_000..=39_999 => FemtoLevel::Warn,
            40_000..=49_999 => FemtoLevel::Error,
            _ => FemtoLevel::Critical,
        }
    }

    pub fn parse_or_info(s: &str) -> Self {
        s.parse().unwrap_or(Self::Info)
    }
}

impl From<FemtoLevel> for u8 {
    fn from(level: FemtoLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for FemtoLevel {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        Self::ALL.get(usize::from(value)).copied().ok_or(())
    }
}

impl fmt::Display for FemtoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FemtoLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FemtoLevel::Trace, 0)]
    #[case(FemtoLevel::Info, 20_000)]
    #[case(FemtoLevel::Critical, 50_000)]
    fn wire_codes_match_collector_constants(#[case] level: FemtoLevel, #[case] code: u32) {
        assert_eq!(level.wire_code(), code);
        assert_eq!(FemtoLevel::from_wire_code(code), level);
    }

    #[rstest]
    fn custom_codes_round_down() {
        assert_eq!(FemtoLevel::from_wire_code(25_000), FemtoLevel::Info);
        assert_eq!(FemtoLevel::from_wire_code(u32::MAX), FemtoLevel::Critical);
    }

    #[rstest]
    fn parses_fatal_alias() {
        assert_eq!("fatal".parse::<FemtoLevel>(), Ok(FemtoLevel::Critical));
        assert_eq!(FemtoLevel::parse_or_info("bogus"), FemtoLevel::Info);
    }
}
