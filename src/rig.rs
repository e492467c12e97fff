use std::collections::{HashMap, HashSet};

use nalgebra::Matrix4;

use crate::error::RigError;

// ─── Bones ────────────────────────────────────────────────────────────────────

/// Lifecycle state of a rig bone. A bone is created with its bind transform
/// in one step and posed afterwards; there is no half-initialized state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneState {
    Created,
    Posed,
}

/// One editable bone. `bind` is the global edit (rest) transform, set once
/// at creation; `pose` is the global pose transform and may be overwritten
/// as more source data becomes available.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: Option<String>,
    pub bind: Matrix4<f32>,
    pub pose: Matrix4<f32>,
    pub state: BoneState,
}

// ─── Rig ──────────────────────────────────────────────────────────────────────

/// An editable armature: a forest of named, parented bones.
///
/// Bones are added incrementally and never removed. Insertion is
/// first-writer-wins; parent assignment rejects anything that would make a
/// bone its own ancestor.
#[derive(Debug, Clone)]
pub struct Rig {
    pub name: String,
    bones: HashMap<String, Bone>,
    creation_order: Vec<String>,
    skin_transform: Option<Matrix4<f32>>,
}

impl Rig {
    pub fn new(name: impl Into<String>) -> Self {
        Rig {
            name: name.into(),
            bones: HashMap::new(),
            creation_order: Vec::new(),
            skin_transform: None,
        }
    }

    pub fn len(&self) -> usize {
        self.creation_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creation_order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bones.contains_key(name)
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(name)
    }

    /// Bone names in creation order.
    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.creation_order.iter().map(String::as_str)
    }

    /// Position of the bone in creation order, if present.
    pub fn creation_index(&self, name: &str) -> Option<usize> {
        self.creation_order.iter().position(|entry| entry == name)
    }

    /// Transform shared by every shape parented to this rig, published by
    /// the first shape attached.
    pub fn skin_transform(&self) -> Option<&Matrix4<f32>> {
        self.skin_transform.as_ref()
    }

    pub fn publish_skin_transform(&mut self, xf: Matrix4<f32>) {
        if self.skin_transform.is_none() {
            self.skin_transform = Some(xf);
        }
    }

    /// Add a bone with the given global bind transform. The pose starts at
    /// the bind position. Returns false (and leaves the existing bone
    /// untouched) when the name is already taken: first writer wins.
    pub fn add_bone(&mut self, name: &str, bind: Matrix4<f32>) -> bool {
        if self.bones.contains_key(name) {
            return false;
        }
        self.bones.insert(
            name.to_string(),
            Bone {
                name: name.to_string(),
                parent: None,
                bind,
                pose: bind,
                state: BoneState::Created,
            },
        );
        self.creation_order.push(name.to_string());
        true
    }

    /// Assign a parent to a bone, rejecting assignments that would create a
    /// cycle in the parent graph.
    pub fn set_parent(&mut self, child: &str, parent: &str) -> Result<(), RigError> {
        if !self.bones.contains_key(child) {
            return Err(RigError::NotFound(child.to_string()));
        }
        if !self.bones.contains_key(parent) {
            return Err(RigError::NotFound(parent.to_string()));
        }

        // Walk the ancestor chain of the prospective parent; reaching the
        // child means the assignment would close a loop.
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cursor = Some(parent);
        while let Some(name) = cursor {
            if name == child {
                return Err(RigError::CyclicHierarchy(child.to_string()));
            }
            if !visited.insert(name) {
                return Err(RigError::CyclicHierarchy(name.to_string()));
            }
            cursor = self.bones.get(name).and_then(|bone| bone.parent.as_deref());
        }

        if let Some(bone) = self.bones.get_mut(child) {
            bone.parent = Some(parent.to_string());
        }
        Ok(())
    }

    /// Overwrite a bone's pose transform and mark it posed.
    pub fn set_pose(&mut self, name: &str, pose: Matrix4<f32>) -> Result<(), RigError> {
        let bone = self
            .bones
            .get_mut(name)
            .ok_or_else(|| RigError::NotFound(name.to_string()))?;
        bone.pose = pose;
        bone.state = BoneState::Posed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;

    #[test]
    fn given_existing_bone_when_adding_again_then_first_writer_wins() {
        let mut rig = Rig::new("Armature");
        let first = Translation3::new(0.0, 0.0, 10.0).to_homogeneous();
        let second = Translation3::new(5.0, 0.0, 0.0).to_homogeneous();

        assert!(rig.add_bone("Spine", first));
        assert!(!rig.add_bone("Spine", second));

        let bone = rig.bone("Spine").expect("bone present");
        assert_eq!(bone.bind, first);
        assert_eq!(rig.len(), 1);
    }

    #[test]
    fn given_parent_assignment_when_it_would_loop_then_cycle_is_rejected() {
        let mut rig = Rig::new("Armature");
        rig.add_bone("A", Matrix4::identity());
        rig.add_bone("B", Matrix4::identity());

        rig.set_parent("A", "B").expect("A under B");
        assert_eq!(
            rig.set_parent("B", "A"),
            Err(RigError::CyclicHierarchy("B".to_string()))
        );
        assert!(rig.bone("B").and_then(|bone| bone.parent.clone()).is_none());
    }

    #[test]
    fn given_self_parent_assignment_then_cycle_is_rejected() {
        let mut rig = Rig::new("Armature");
        rig.add_bone("A", Matrix4::identity());
        assert!(matches!(
            rig.set_parent("A", "A"),
            Err(RigError::CyclicHierarchy(_))
        ));
    }

    #[test]
    fn given_new_bone_when_posing_then_state_advances() {
        let mut rig = Rig::new("Armature");
        rig.add_bone("Neck", Matrix4::identity());
        assert_eq!(rig.bone("Neck").map(|bone| bone.state), Some(BoneState::Created));

        let pose = Translation3::new(0.0, 1.0, 0.0).to_homogeneous();
        rig.set_pose("Neck", pose).expect("pose set");

        let bone = rig.bone("Neck").expect("bone present");
        assert_eq!(bone.state, BoneState::Posed);
        assert_eq!(bone.pose, pose);
    }
}
