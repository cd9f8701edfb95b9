//! The human-readable size grammar (`[0-9]+ (B|KB|MB|GB|TB|KiB|MiB|GiB|TiB|K|M|G|T)?`),
//! grounded byte-for-byte on `original_source/lib/size.c`. SI suffixes are
//! powers of 1000; binary suffixes (`*iB` or a bare letter) are powers of
//! 1024; no suffix means bytes.

use core::fmt;
use core::str::FromStr;

use bmfs_core::error::Error;

/// The unit a parsed [`Size`] was given in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSuffix {
    None,
    Kilo,
    Mega,
    Giga,
    Tera,
    Kibi,
    Mebi,
    Gibi,
    Tebi,
}

impl SizeSuffix {
    fn multiplier(self) -> u64 {
        match self {
            SizeSuffix::None => 1,
            SizeSuffix::Kilo => 1_000,
            SizeSuffix::Mega => 1_000_000,
            SizeSuffix::Giga => 1_000_000_000,
            SizeSuffix::Tera => 1_000_000_000_000,
            SizeSuffix::Kibi => 1024,
            SizeSuffix::Mebi => 1024 * 1024,
            SizeSuffix::Gibi => 1024 * 1024 * 1024,
            SizeSuffix::Tebi => 1024 * 1024 * 1024 * 1024,
        }
    }
}

/// A size given as a value plus a unit suffix, e.g. `512MiB` or `10GB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub value: u64,
    pub suffix: SizeSuffix,
}

impl Size {
    /// The size in bytes, saturating on overflow rather than wrapping.
    pub fn bytes(self) -> u64 {
        self.value.saturating_mul(self.suffix.multiplier())
    }

    /// Wraps a raw byte count with no suffix.
    pub fn from_bytes(bytes: u64) -> Self {
        Self { value: bytes, suffix: SizeSuffix::None }
    }
}

impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if digits_end == 0 {
            return Err(Error::Invalid);
        }
        let value: u64 = s[..digits_end].parse().map_err(|_| Error::Invalid)?;
        let suffix = match &s[digits_end..] {
            "" | "B" => SizeSuffix::None,
            "KB" => SizeSuffix::Kilo,
            "MB" => SizeSuffix::Mega,
            "GB" => SizeSuffix::Giga,
            "TB" => SizeSuffix::Tera,
            "KiB" | "K" => SizeSuffix::Kibi,
            "MiB" | "M" => SizeSuffix::Mebi,
            "GiB" | "G" => SizeSuffix::Gibi,
            "TiB" | "T" => SizeSuffix::Tebi,
            _ => return Err(Error::Invalid),
        };
        Ok(Self { value, suffix })
    }
}

impl fmt::Display for Size {
    /// Renders as the largest binary unit that keeps the value above 1, the
    /// same successive-division-by-1024 scheme `size.c`'s `to_string` uses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SUFFIXES: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
        let mut bytes = self.bytes();
        let mut index = 0;
        while bytes > 1024 && index < SUFFIXES.len() - 1 {
            bytes /= 1024;
            index += 1;
        }
        write!(f, "{bytes}{}", SUFFIXES[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_bytes() {
        assert_eq!("1024".parse::<Size>().unwrap().bytes(), 1024);
        assert_eq!("1024B".parse::<Size>().unwrap().bytes(), 1024);
    }

    #[test]
    fn si_suffixes_use_powers_of_1000() {
        assert_eq!("10KB".parse::<Size>().unwrap().bytes(), 10_000);
        assert_eq!("3MB".parse::<Size>().unwrap().bytes(), 3_000_000);
        assert_eq!("1GB".parse::<Size>().unwrap().bytes(), 1_000_000_000);
        assert_eq!("2TB".parse::<Size>().unwrap().bytes(), 2_000_000_000_000);
    }

    #[test]
    fn binary_suffixes_use_powers_of_1024() {
        assert_eq!("512KiB".parse::<Size>().unwrap().bytes(), 512 * 1024);
        assert_eq!("2MiB".parse::<Size>().unwrap().bytes(), 2 * 1024 * 1024);
        assert_eq!("1GiB".parse::<Size>().unwrap().bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn bare_letters_are_binary_not_si() {
        assert_eq!("2K".parse::<Size>().unwrap().bytes(), 2 * 1024);
        assert_eq!("4M".parse::<Size>().unwrap().bytes(), 4 * 1024 * 1024);
        assert_eq!("1G".parse::<Size>().unwrap().bytes(), 1024 * 1024 * 1024);
        assert_eq!("1T".parse::<Size>().unwrap().bytes(), 1024 * 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_missing_digits_or_unknown_suffix() {
        assert_eq!("MB".parse::<Size>(), Err(Error::Invalid));
        assert_eq!("10XB".parse::<Size>(), Err(Error::Invalid));
    }

    #[test]
    fn display_picks_the_largest_clean_unit() {
        assert_eq!(Size::from_bytes(2 * 1024 * 1024).to_string(), "2MiB");
        assert_eq!(Size::from_bytes(512).to_string(), "512B");
    }
}
