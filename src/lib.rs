//! # meshview
//!
//! Core of an interactive 3D viewer. Scene objects are read through a
//! geometry adapter, packed into consolidated GPU buffers per primitive kind
//! and drawn with a handful of shared pipelines. Per-object transforms and
//! display settings live in storage buffers indexed by a per-vertex object
//! index, so moving, hiding or recoloring an object never re-uploads
//! geometry.
//!
//! ## Modules
//!
//! - [`scene`] - Objects, geometry kinds, selection state
//! - [`camera`] - Orbit camera with view presets
//! - [`buffers`] - Consolidated buffer manager
//! - [`renderer`] - Render modes, pipelines, draw ordering
//! - [`picking`] - Instance-color picking and selection actions
//! - [`engine`] - [`Viewer`], the context the shell drives
//!
//! ## Example
//!
//! ```ignore
//! use meshview::{Viewer, scene::{Cuboid, ObjectStyle}};
//!
//! let mut viewer = Viewer::default();
//! let cube = viewer.add_object("cube", Cuboid::cube(1.0), ObjectStyle::default());
//! viewer.set_selected(cube, true)?;
//! viewer.focus_selection();
//! ```

pub mod util;
pub mod scene;
pub mod camera;
pub mod buffers;
pub mod renderer;
pub mod picking;
pub mod redraw;
pub mod settings;
pub mod engine;

// Desktop shell (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

// Re-export commonly used types
pub use util::{Error, Result};
pub use camera::{Camera, ViewMode};
pub use engine::Viewer;
pub use renderer::RenderMode;
pub use scene::{ObjectId, Scene};
pub use settings::Settings;
