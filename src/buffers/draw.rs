//! Draw planning over the consolidated element arrays.

use std::ops::Range;

use super::BufferManager;
use crate::renderer::RenderMode;
use crate::scene::GeometryKind;

/// Which slots a draw covers.
#[derive(Clone, Copy, Debug)]
pub enum DrawSet<'a> {
    /// Every buffered slot, one draw per kind
    All,
    /// These slot indices, in this order
    Slots(&'a [u32]),
}

/// One indexed draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub kind: GeometryKind,
    pub elements: Range<u32>,
}

const WITH_FACES: [GeometryKind; 4] = [
    GeometryKind::FrontFaces,
    GeometryKind::BackFaces,
    GeometryKind::Lines,
    GeometryKind::Points,
];
const WITHOUT_FACES: [GeometryKind; 2] = [GeometryKind::Lines, GeometryKind::Points];

impl BufferManager {
    /// Faces first (skipped in wireframe), then lines, then points.
    ///
    /// For an explicit slot list, element ranges of consecutive slots that are
    /// adjacent in the buffer are merged into one draw.
    pub fn plan_draws(&self, mode: RenderMode, set: DrawSet<'_>) -> Vec<DrawCommand> {
        let kinds: &[GeometryKind] = if mode.draws_faces() { &WITH_FACES } else { &WITHOUT_FACES };
        let mut commands: Vec<DrawCommand> = Vec::new();

        for &kind in kinds {
            match set {
                DrawSet::All => {
                    let count = self.kind(kind).element_count();
                    if count > 0 {
                        commands.push(DrawCommand { kind, elements: 0..count });
                    }
                }
                DrawSet::Slots(slots) => {
                    let first = commands.len();
                    for &index in slots {
                        let Some(slot) = self.slots().get(index as usize) else {
                            continue;
                        };
                        let range = slot.range(kind).elements();
                        if range.is_empty() {
                            continue;
                        }
                        if let Some(last) = commands[first..]
                            .last_mut()
                            .filter(|last| last.elements.end == range.start)
                        {
                            last.elements.end = range.end;
                        } else {
                            commands.push(DrawCommand { kind, elements: range });
                        }
                    }
                }
            }
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cuboid, ObjectStyle, Polyline, Scene};
    use glam::Vec3;

    fn three_cubes_and_a_line() -> BufferManager {
        let mut scene = Scene::new();
        for i in 0..3 {
            scene.add(format!("cube{i}"), Cuboid::cube(1.0), ObjectStyle::default());
        }
        scene.add(
            "line",
            Polyline {
                points: vec![Vec3::ZERO, Vec3::X],
                closed: false,
            },
            ObjectStyle::default(),
        );
        let mut bm = BufferManager::new();
        assert!(bm.add_scene(&scene).is_empty());
        bm
    }

    #[test]
    fn test_wireframe_issues_no_face_draws() {
        let bm = three_cubes_and_a_line();
        assert!(bm.kind(GeometryKind::FrontFaces).element_count() > 0);
        let cmds = bm.plan_draws(RenderMode::Wireframe, DrawSet::All);
        assert!(cmds.iter().all(|c| !c.kind.is_faces()));
        assert_eq!(cmds.len(), 2);

        let cmds = bm.plan_draws(RenderMode::Wireframe, DrawSet::Slots(&[0, 1, 2, 3]));
        assert!(cmds.iter().all(|c| !c.kind.is_faces()));
    }

    #[test]
    fn test_order_faces_lines_points() {
        let bm = three_cubes_and_a_line();
        let kinds: Vec<_> = bm
            .plan_draws(RenderMode::Shaded, DrawSet::All)
            .into_iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                GeometryKind::FrontFaces,
                GeometryKind::BackFaces,
                GeometryKind::Lines,
                GeometryKind::Points
            ]
        );
    }

    #[test]
    fn test_contiguous_slots_merge() {
        let bm = three_cubes_and_a_line();
        let cmds = bm.plan_draws(RenderMode::Lighted, DrawSet::Slots(&[0, 1, 2]));
        let faces: Vec<_> = cmds.iter().filter(|c| c.kind == GeometryKind::FrontFaces).collect();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].elements, 0..108);
    }

    #[test]
    fn test_out_of_order_slots_keep_order() {
        let bm = three_cubes_and_a_line();
        let cmds = bm.plan_draws(RenderMode::Shaded, DrawSet::Slots(&[2, 0]));
        let faces: Vec<_> = cmds
            .iter()
            .filter(|c| c.kind == GeometryKind::FrontFaces)
            .map(|c| c.elements.clone())
            .collect();
        assert_eq!(faces, vec![72..108, 0..36]);
    }

    #[test]
    fn test_empty_kinds_skipped() {
        let bm = three_cubes_and_a_line();
        // the line (slot 3) has no faces
        let cmds = bm.plan_draws(RenderMode::Shaded, DrawSet::Slots(&[3]));
        assert!(cmds.iter().all(|c| !c.kind.is_faces()));
        assert!(BufferManager::new().plan_draws(RenderMode::Shaded, DrawSet::All).is_empty());
    }
}
