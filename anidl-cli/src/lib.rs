//! Library target for the `anidl` package.
//!
//! The primary deliverable of this package is the `anidl` CLI binary
//! (`src/main.rs`). This library re-exports the workspace crates it drives.

#[doc(hidden)]
pub use anidl_engine;
#[doc(hidden)]
pub use hls;
#[doc(hidden)]
pub use subtitles;
