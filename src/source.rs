use std::collections::{HashMap, HashSet};

use nalgebra::Matrix4;

use crate::error::RigError;
use crate::transform::try_inverse_or_identity;

// ─── Source scene graph ───────────────────────────────────────────────────────

/// Block tag carried by a source node. Replaces duck-typed block-name string
/// checks with an explicit kind the traversal code can match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// A plain scene-graph node, eligible to become a rig bone.
    Node,
    /// A skinned or static shape.
    Shape,
    /// Any other block type, kept by name for diagnostics.
    Other(String),
}

/// One node of the loaded source file. Immutable after load; the parent is
/// a weak by-name reference resolved through the owning [`SourceScene`].
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub name: String,
    pub parent: Option<String>,
    pub local_transform: Matrix4<f32>,
    pub kind: BlockKind,
}

/// The source file's node graph, keyed by node name.
#[derive(Debug, Clone)]
pub struct SourceScene {
    root: String,
    nodes: HashMap<String, SourceNode>,
}

impl SourceScene {
    pub fn new(root: impl Into<String>, nodes: Vec<SourceNode>) -> Self {
        SourceScene {
            root: root.into(),
            nodes: nodes
                .into_iter()
                .map(|node| (node.name.clone(), node))
                .collect(),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn node(&self, name: &str) -> Option<&SourceNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Global transform of a node, computed by walking its parent chain.
    ///
    /// A parent name that resolves to no node terminates the walk (the
    /// reference is weak). A parent chain that revisits a node fails with
    /// `CyclicHierarchy` instead of looping.
    pub fn node_global(&self, name: &str) -> Result<Matrix4<f32>, RigError> {
        let mut current = self
            .nodes
            .get(name)
            .ok_or_else(|| RigError::NotFound(name.to_string()))?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut global = current.local_transform;

        while let Some(parent_name) = current.parent.as_deref() {
            if !visited.insert(current.name.as_str()) {
                return Err(RigError::CyclicHierarchy(current.name.clone()));
            }
            match self.nodes.get(parent_name) {
                Some(parent) => {
                    global = parent.local_transform * global;
                    current = parent;
                }
                None => break,
            }
        }

        Ok(global)
    }
}

// ─── Skin data ────────────────────────────────────────────────────────────────

/// Per-shape skin data: a skin-to-bone transform for every bone the shape's
/// vertex weights use, plus an optional transform offsetting the whole skin.
#[derive(Debug, Clone, Default)]
pub struct SkinBinding {
    pub skin_to_bone: HashMap<String, Matrix4<f32>>,
    pub global_to_skin: Option<Matrix4<f32>>,
}

impl SkinBinding {
    /// The bone's global bind position as seen from this shape's skin, i.e.
    /// the inverse of the skin-to-bone transform. Degrades to identity for
    /// a non-invertible entry.
    pub fn bind_position(&self, bone: &str) -> Option<Matrix4<f32>> {
        self.skin_to_bone.get(bone).map(try_inverse_or_identity)
    }
}

/// A shape together with the bones it uses, in file order.
#[derive(Debug, Clone)]
pub struct SkinnedShape {
    pub name: String,
    /// Bone names the shape's vertex weights reference.
    pub bones: Vec<String>,
    pub binding: SkinBinding,
    /// The shape's own static transform, used when it carries no skin.
    pub transform: Matrix4<f32>,
}

impl SkinnedShape {
    pub fn is_skinned(&self) -> bool {
        !self.binding.skin_to_bone.is_empty()
    }

    /// Offset between the bone's current pose and its bind position as
    /// recorded in this shape: `node_global * skin_to_bone`. When every used
    /// bone agrees, the shape was exported as a simple reposition.
    pub fn pose_offset(&self, scene: &SourceScene, bone: &str) -> Result<Matrix4<f32>, RigError> {
        let skin_to_bone = self
            .binding
            .skin_to_bone
            .get(bone)
            .ok_or_else(|| RigError::NotFound(bone.to_string()))?;
        Ok(scene.node_global(bone)? * skin_to_bone)
    }
}

// ─── Reference skeleton ───────────────────────────────────────────────────────

/// One bone of the canonical skeleton, with its global bind precomputed.
#[derive(Debug, Clone)]
pub struct ReferenceBone {
    pub name: String,
    pub parent: Option<String>,
    pub global_bind: Matrix4<f32>,
}

/// Read-only canonical skeleton used to fill in bones and parentage missing
/// from the live source file. Never mutated.
#[derive(Debug, Clone)]
pub struct ReferenceSkeleton {
    root: String,
    bones: HashMap<String, ReferenceBone>,
}

impl ReferenceSkeleton {
    pub fn new(root: impl Into<String>, bones: Vec<ReferenceBone>) -> Self {
        ReferenceSkeleton {
            root: root.into(),
            bones: bones
                .into_iter()
                .map(|bone| (bone.name.clone(), bone))
                .collect(),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bones.contains_key(name)
    }

    pub fn global_bind(&self, name: &str) -> Option<Matrix4<f32>> {
        self.bones.get(name).map(|bone| bone.global_bind)
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.bones.get(name).and_then(|bone| bone.parent.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;

    fn node(name: &str, parent: Option<&str>, x: f32) -> SourceNode {
        SourceNode {
            name: name.to_string(),
            parent: parent.map(ToOwned::to_owned),
            local_transform: Translation3::new(x, 0.0, 0.0).to_homogeneous(),
            kind: BlockKind::Node,
        }
    }

    #[test]
    fn given_parent_chain_when_computing_global_then_locals_accumulate() {
        let scene = SourceScene::new(
            "Scene Root",
            vec![
                node("Scene Root", None, 0.0),
                node("Spine", Some("Scene Root"), 1.0),
                node("Neck", Some("Spine"), 2.0),
            ],
        );

        let global = scene.node_global("Neck").expect("global transform");
        assert!((global[(0, 3)] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn given_dangling_parent_when_computing_global_then_walk_stops_there() {
        let scene = SourceScene::new("Scene Root", vec![node("Orphan", Some("Missing"), 4.0)]);
        let global = scene.node_global("Orphan").expect("global transform");
        assert!((global[(0, 3)] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn given_cyclic_parents_when_computing_global_then_cycle_is_reported() {
        let scene = SourceScene::new(
            "Scene Root",
            vec![node("A", Some("B"), 1.0), node("B", Some("A"), 1.0)],
        );
        assert!(matches!(
            scene.node_global("A"),
            Err(RigError::CyclicHierarchy(_))
        ));
    }

    #[test]
    fn given_unknown_node_when_computing_global_then_not_found_is_returned() {
        let scene = SourceScene::new("Scene Root", vec![]);
        assert_eq!(
            scene.node_global("Ghost"),
            Err(RigError::NotFound("Ghost".to_string()))
        );
    }
}
