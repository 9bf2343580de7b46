//! Episode range filter (`all`, `3`, `1-3,5`).

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid episode range `{0}`, expected `all` or a list such as `1-3,5`")]
pub struct EpisodeRangeError(String);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EpisodeFilter {
    #[default]
    All,
    Ranges(Vec<RangeInclusive<u32>>),
}

impl EpisodeFilter {
    pub fn contains(&self, episode: u32) -> bool {
        match self {
            Self::All => true,
            Self::Ranges(ranges) => ranges.iter().any(|r| r.contains(&episode)),
        }
    }

    /// Match an episode number as written in metadata.
    ///
    /// Non-numeric numbers (specials, empty) only pass the `all` filter.
    pub fn matches(&self, episode_number: &str) -> bool {
        match self {
            Self::All => true,
            Self::Ranges(_) => episode_number
                .trim()
                .parse::<u32>()
                .is_ok_and(|n| self.contains(n)),
        }
    }
}

impl FromStr for EpisodeFilter {
    type Err = EpisodeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let invalid = || EpisodeRangeError(s.to_string());
        let mut ranges = Vec::new();

        for part in trimmed.split(',').map(str::trim) {
            let range = match part.split_once('-') {
                Some((start, end)) => {
                    let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                    let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                    if start > end {
                        return Err(invalid());
                    }
                    start..=end
                }
                None => {
                    let episode: u32 = part.parse().map_err(|_| invalid())?;
                    episode..=episode
                }
            };
            ranges.push(range);
        }

        Ok(Self::Ranges(ranges))
    }
}

impl fmt::Display for EpisodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Ranges(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|r| {
                        if r.start() == r.end() {
                            r.start().to_string()
                        } else {
                            format!("{}-{}", r.start(), r.end())
                        }
                    })
                    .collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}
