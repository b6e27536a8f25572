//! Selection transitions driven by pick results.

use serde::{Deserialize, Serialize};

use crate::scene::{ObjectId, Scene};

/// What a pick does to the selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionAction {
    /// Click: deselect everything, then select the hit
    #[default]
    Select,
    /// Click with modifier: deselect the hit only
    Deselect,
    /// Click with modifier: add the hit to the selection
    MultiSelect,
    /// Drag box: select every hit
    DragSelect,
    /// Drag box: deselect every hit
    DragDeselect,
}

/// Apply `action` for `hits` (most pixels first). Returns the objects whose
/// flag was targeted.
pub fn apply_selection(scene: &mut Scene, action: SelectionAction, hits: &[ObjectId]) -> Vec<ObjectId> {
    let first = hits.first().copied();
    let targeted: Vec<ObjectId> = match action {
        SelectionAction::Select => {
            scene.deselect_all();
            first.into_iter().collect()
        }
        SelectionAction::Deselect | SelectionAction::MultiSelect => first.into_iter().collect(),
        SelectionAction::DragSelect | SelectionAction::DragDeselect => hits.to_vec(),
    };
    let value = matches!(
        action,
        SelectionAction::Select | SelectionAction::MultiSelect | SelectionAction::DragSelect
    );
    for &id in &targeted {
        // hits come from the live instance map
        let _ = scene.set_selected(id, value);
    }
    targeted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cuboid, ObjectStyle};

    fn scene3() -> (Scene, [ObjectId; 3]) {
        let mut scene = Scene::new();
        let a = scene.add("a", Cuboid::cube(1.0), ObjectStyle::default());
        let b = scene.add("b", Cuboid::cube(1.0), ObjectStyle::default());
        let c = scene.add("c", Cuboid::cube(1.0), ObjectStyle::default());
        (scene, [a, b, c])
    }

    #[test]
    fn test_click_select_replaces() {
        let (mut scene, [a, b, _]) = scene3();
        scene.set_selected(a, true).unwrap();
        apply_selection(&mut scene, SelectionAction::Select, &[b]);
        assert_eq!(scene.selected(), vec![b]);

        // click on background clears
        apply_selection(&mut scene, SelectionAction::Select, &[]);
        assert!(scene.selected().is_empty());
    }

    #[test]
    fn test_click_deselect_keeps_others() {
        let (mut scene, [a, b, _]) = scene3();
        scene.select_all();
        apply_selection(&mut scene, SelectionAction::Deselect, &[a]);
        assert_eq!(scene.selected().len(), 2);
        assert!(!scene.get(a).unwrap().is_selected());
        assert!(scene.get(b).unwrap().is_selected());
    }

    #[test]
    fn test_multi_select_adds() {
        let (mut scene, [a, b, _]) = scene3();
        apply_selection(&mut scene, SelectionAction::MultiSelect, &[a]);
        apply_selection(&mut scene, SelectionAction::MultiSelect, &[b]);
        assert_eq!(scene.selected(), vec![a, b]);
    }

    #[test]
    fn test_drag_affects_all_hits_only() {
        let (mut scene, [a, b, c]) = scene3();
        scene.set_selected(c, true).unwrap();
        apply_selection(&mut scene, SelectionAction::DragSelect, &[b, a]);
        assert_eq!(scene.selected(), vec![a, b, c]);

        apply_selection(&mut scene, SelectionAction::DragDeselect, &[a, c]);
        assert_eq!(scene.selected(), vec![b]);

        // empty box leaves the selection alone
        apply_selection(&mut scene, SelectionAction::DragSelect, &[]);
        apply_selection(&mut scene, SelectionAction::DragDeselect, &[]);
        assert_eq!(scene.selected(), vec![b]);
    }
}
