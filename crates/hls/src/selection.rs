//! Rendition selection.
//!
//! A request is either `auto` (highest available height) or an explicit
//! height. Explicit heights that the manifest lacks either fail or, with
//! fallback enabled, settle for the greatest height below the request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{QualityParseError, SelectionError};
use crate::manifest::{Manifest, Variant};

/// Requested quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityRequest {
    /// The highest height the manifest offers.
    #[default]
    Auto,
    /// An explicit height in pixels, written as `720p` or `720`.
    Height(u32),
}

impl FromStr for QualityRequest {
    type Err = QualityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }

        let digits = trimmed
            .strip_suffix('p')
            .or_else(|| trimmed.strip_suffix('P'))
            .unwrap_or(trimmed);

        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Ok(Self::Height(height)),
            _ => Err(QualityParseError(s.to_string())),
        }
    }
}

impl fmt::Display for QualityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Height(h) => write!(f, "{h}p"),
        }
    }
}

impl Serialize for QualityRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QualityRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Set when an explicit request was satisfied by a lower height.
///
/// The selector only returns it; reporting is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DowngradeWarning {
    pub requested: u32,
    pub selected: u32,
}

impl fmt::Display for DowngradeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}p is not available, downloading {}p instead",
            self.requested, self.selected
        )
    }
}

/// The chosen rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub variant: Variant,
    pub height: u32,
    pub warning: Option<DowngradeWarning>,
}

/// Chooses a variant out of a [`Manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionSelector {
    auto_fallback: bool,
}

impl Default for ResolutionSelector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResolutionSelector {
    pub fn new(auto_fallback: bool) -> Self {
        Self { auto_fallback }
    }

    pub fn auto_fallback(&self) -> bool {
        self.auto_fallback
    }

    /// Distinct heights of `manifest`, ascending.
    pub fn available_heights(&self, manifest: &Manifest) -> Vec<u32> {
        manifest.heights()
    }

    /// Select the variant for `request`.
    ///
    /// Among variants sharing the resolved height the first one in manifest
    /// order wins.
    pub fn select(
        &self,
        manifest: &Manifest,
        request: QualityRequest,
    ) -> Result<Selection, SelectionError> {
        let heights = manifest.heights();
        let Some(&highest) = heights.last() else {
            return Err(SelectionError::NoVariants);
        };

        let unavailable = |requested: u32| SelectionError::ResolutionUnavailable {
            requested,
            available: heights.clone(),
        };

        let target = match request {
            QualityRequest::Auto => highest,
            QualityRequest::Height(h) => h,
        };

        let resolved = if heights.binary_search(&target).is_ok() {
            target
        } else if !self.auto_fallback {
            return Err(unavailable(target));
        } else {
            heights
                .iter()
                .rev()
                .copied()
                .find(|&h| h < target)
                .ok_or_else(|| unavailable(target))?
        };

        let variant = manifest
            .variants()
            .iter()
            .find(|v| v.height == resolved)
            .cloned()
            .ok_or(SelectionError::NoVariants)?;

        let warning = match request {
            QualityRequest::Height(requested) if requested != resolved => Some(DowngradeWarning {
                requested,
                selected: resolved,
            }),
            _ => None,
        };

        debug!(
            "Selected {}x{} ({}) for request {}",
            variant.width, variant.height, variant.uri, request
        );

        Ok(Selection {
            variant,
            height: resolved,
            warning,
        })
    }
}

/// Shorthand for [`ResolutionSelector::select`].
pub fn select(
    manifest: &Manifest,
    request: QualityRequest,
    auto_fallback: bool,
) -> Result<Selection, SelectionError> {
    ResolutionSelector::new(auto_fallback).select(manifest, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn manifest_with_heights(heights: &[u32]) -> Manifest {
        heights
            .iter()
            .map(|&h| Variant::new(h * 16 / 9, h, format!("{h}.m3u8")))
            .collect()
    }

    // ========== QualityRequest parsing tests ==========

    #[test]
    fn test_parse_quality() {
        assert_eq!("auto".parse::<QualityRequest>(), Ok(QualityRequest::Auto));
        assert_eq!("AUTO".parse::<QualityRequest>(), Ok(QualityRequest::Auto));
        assert_eq!(
            "720p".parse::<QualityRequest>(),
            Ok(QualityRequest::Height(720))
        );
        assert_eq!(
            "1080".parse::<QualityRequest>(),
            Ok(QualityRequest::Height(1080))
        );
        assert!("0p".parse::<QualityRequest>().is_err());
        assert!("hd".parse::<QualityRequest>().is_err());
        assert!("-720".parse::<QualityRequest>().is_err());
    }

    #[test]
    fn test_quality_display_and_serde() {
        assert_eq!(QualityRequest::Auto.to_string(), "auto");
        assert_eq!(QualityRequest::Height(480).to_string(), "480p");

        let json = serde_json::to_string(&QualityRequest::Height(720)).unwrap();
        assert_eq!(json, "\"720p\"");
        let parsed: QualityRequest = serde_json::from_str("\"360p\"").unwrap();
        assert_eq!(parsed, QualityRequest::Height(360));
        assert!(serde_json::from_str::<QualityRequest>("\"best\"").is_err());
    }

    // ========== Selection tests ==========

    #[test]
    fn test_auto_picks_highest() {
        let manifest = manifest_with_heights(&[360, 1080, 720]);
        let selection = ResolutionSelector::new(false)
            .select(&manifest, QualityRequest::Auto)
            .unwrap();

        assert_eq!(selection.height, 1080);
        assert_eq!(selection.variant.uri, "1080.m3u8");
        assert!(selection.warning.is_none());
    }

    #[test]
    fn test_exact_match() {
        let manifest = manifest_with_heights(&[360, 480, 720, 1080]);
        let selection = select(&manifest, QualityRequest::Height(480), false).unwrap();

        assert_eq!(selection.height, 480);
        assert!(selection.warning.is_none());
    }

    #[test]
    fn test_fallback_downgrades_with_warning() {
        let manifest = manifest_with_heights(&[360, 480, 720]);
        let selection = ResolutionSelector::new(true)
            .select(&manifest, QualityRequest::Height(1080))
            .unwrap();

        assert_eq!(selection.height, 720);
        assert_eq!(
            selection.warning,
            Some(DowngradeWarning {
                requested: 1080,
                selected: 720
            })
        );
    }

    #[test]
    fn test_fallback_picks_nearest_lower_not_lowest() {
        let manifest = manifest_with_heights(&[240, 360, 720, 1080]);
        let selection = ResolutionSelector::new(true)
            .select(&manifest, QualityRequest::Height(480))
            .unwrap();

        assert_eq!(selection.height, 360);
    }

    #[test]
    fn test_no_fallback_reports_available() {
        let manifest = manifest_with_heights(&[720, 360, 480]);
        let err = ResolutionSelector::new(false)
            .select(&manifest, QualityRequest::Height(1080))
            .unwrap_err();

        assert_eq!(
            err,
            SelectionError::ResolutionUnavailable {
                requested: 1080,
                available: vec![360, 480, 720],
            }
        );
    }

    #[test]
    fn test_fallback_with_nothing_lower() {
        let manifest = manifest_with_heights(&[720, 1080]);
        let err = ResolutionSelector::new(true)
            .select(&manifest, QualityRequest::Height(480))
            .unwrap_err();

        assert!(matches!(
            err,
            SelectionError::ResolutionUnavailable { requested: 480, .. }
        ));
    }

    #[test]
    fn test_duplicate_heights_take_first_in_order() {
        let manifest = Manifest::new(vec![
            Variant::new(1280, 720, "first.m3u8"),
            Variant::new(640, 360, "low.m3u8"),
            Variant::new(1280, 720, "second.m3u8"),
        ]);
        let selection = ResolutionSelector::default()
            .select(&manifest, QualityRequest::Height(720))
            .unwrap();

        assert_eq!(selection.variant.uri, "first.m3u8");
    }

    #[test]
    fn test_empty_manifest() {
        let err = ResolutionSelector::default()
            .select(&Manifest::default(), QualityRequest::Auto)
            .unwrap_err();
        assert_eq!(err, SelectionError::NoVariants);
    }

    // ========== Selection properties ==========

    proptest! {
        #[test]
        fn prop_auto_selects_maximum(heights in prop::collection::vec(1u32..4000, 1..10)) {
            let manifest = manifest_with_heights(&heights);
            let max = heights.iter().copied().max().unwrap();
            for fallback in [false, true] {
                let selection = ResolutionSelector::new(fallback)
                    .select(&manifest, QualityRequest::Auto)
                    .unwrap();
                prop_assert_eq!(selection.height, max);
                prop_assert!(selection.warning.is_none());
            }
        }

        #[test]
        fn prop_present_height_is_exact(
            heights in prop::collection::btree_set(1u32..4000, 1..10),
            pick in any::<prop::sample::Index>(),
        ) {
            let heights: Vec<u32> = heights.into_iter().collect();
            let target = heights[pick.index(heights.len())];
            let manifest = manifest_with_heights(&heights);
            for fallback in [false, true] {
                let selection = ResolutionSelector::new(fallback)
                    .select(&manifest, QualityRequest::Height(target))
                    .unwrap();
                prop_assert_eq!(selection.height, target);
                prop_assert_eq!(selection.variant.height, target);
                prop_assert!(selection.warning.is_none());
            }
        }

        #[test]
        fn prop_absent_height_without_fallback_fails(
            heights in prop::collection::btree_set(1u32..4000, 1..10),
            target in 1u32..4000,
        ) {
            prop_assume!(!heights.contains(&target));
            let heights: Vec<u32> = heights.into_iter().collect();
            let manifest = manifest_with_heights(&heights);
            let err = ResolutionSelector::new(false)
                .select(&manifest, QualityRequest::Height(target))
                .unwrap_err();
            prop_assert_eq!(
                err,
                SelectionError::ResolutionUnavailable { requested: target, available: heights }
            );
        }

        #[test]
        fn prop_fallback_picks_greatest_lower(
            heights in prop::collection::btree_set(1u32..4000, 1..10),
            target in 1u32..4000,
        ) {
            prop_assume!(!heights.contains(&target));
            let expected = heights.iter().copied().filter(|&h| h < target).max();
            let manifest = manifest_with_heights(&heights.iter().copied().collect::<Vec<_>>());
            let result = ResolutionSelector::new(true).select(&manifest, QualityRequest::Height(target));

            match expected {
                Some(lower) => {
                    let selection = result.unwrap();
                    prop_assert_eq!(selection.height, lower);
                    prop_assert!(selection.height < target);
                    prop_assert_eq!(
                        selection.warning,
                        Some(DowngradeWarning { requested: target, selected: lower })
                    );
                }
                None => {
                    let is_unavailable =
                        matches!(result, Err(SelectionError::ResolutionUnavailable { .. }));
                    prop_assert!(is_unavailable);
                }
            }
        }
    }
}
