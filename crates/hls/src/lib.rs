//! HLS master playlist handling.
//!
//! [`manifest`] turns a master playlist into a list of [`Variant`]s and
//! [`selection`] picks the rendition matching a requested [`QualityRequest`].

pub mod error;
pub mod manifest;
pub mod selection;

pub use error::{ManifestError, QualityParseError, SelectionError};
pub use manifest::{Manifest, Variant, parse, parse_with_base};
pub use selection::{DowngradeWarning, QualityRequest, ResolutionSelector, Selection, select};
