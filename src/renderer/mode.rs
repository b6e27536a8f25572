//! Render modes.

use flat_shading::mode;
use serde::{Deserialize, Serialize};

/// Mutually exclusive shading modes. Switching only changes uniforms and
/// which prebuilt pipelines are bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Lines and points only
    Wireframe,
    /// Flat face colors, no lighting
    Shaded,
    /// Faces with a headlight term
    #[default]
    Lighted,
    /// Lighted with forced global opacity below 1
    Ghosted,
    /// Picking pass: flat instance colors, no blending
    Instance,
}

impl RenderMode {
    /// Modes a user can pick for display.
    pub const DISPLAY: [RenderMode; 4] = [
        RenderMode::Wireframe,
        RenderMode::Shaded,
        RenderMode::Lighted,
        RenderMode::Ghosted,
    ];

    pub fn draws_faces(self) -> bool {
        self != RenderMode::Wireframe
    }

    pub fn is_lit(self) -> bool {
        matches!(self, RenderMode::Lighted | RenderMode::Ghosted)
    }

    /// Number written to the frame uniform.
    pub fn shader_mode(self) -> u32 {
        match self {
            RenderMode::Wireframe => mode::WIREFRAME,
            RenderMode::Shaded => mode::SHADED,
            RenderMode::Lighted => mode::LIGHTED,
            RenderMode::Ghosted => mode::GHOSTED,
            RenderMode::Instance => mode::INSTANCE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Wireframe => "Wireframe",
            RenderMode::Shaded => "Shaded",
            RenderMode::Lighted => "Lighted",
            RenderMode::Ghosted => "Ghosted",
            RenderMode::Instance => "Instance",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_gating() {
        assert!(!RenderMode::Wireframe.draws_faces());
        for m in [RenderMode::Shaded, RenderMode::Lighted, RenderMode::Ghosted, RenderMode::Instance] {
            assert!(m.draws_faces(), "{m:?}");
        }
    }

    #[test]
    fn test_shader_modes_distinct() {
        let mut seen: Vec<u32> = RenderMode::DISPLAY.iter().map(|m| m.shader_mode()).collect();
        seen.push(RenderMode::Instance.shader_mode());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&RenderMode::Ghosted).unwrap();
        assert_eq!(json, "\"Ghosted\"");
        let back: RenderMode = serde_json::from_str("\"Wireframe\"").unwrap();
        assert_eq!(back, RenderMode::Wireframe);
    }
}
