//! Overlay state and display-space projection.

pub mod geometry;
pub mod state;

pub use geometry::{project, DisplayGeometry, RenderedBox, SourceGeometry};
pub use state::{OverlayCell, OverlaySnapshot};
