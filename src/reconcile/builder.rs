use std::collections::HashSet;

use log::debug;
use nalgebra::Matrix4;

use crate::error::RigError;
use crate::rig::Rig;
use crate::source::{BlockKind, SkinnedShape};
use crate::transform::{apply_scale_to_translation, mat_near_equal};

use super::compat::reference_compatible;
use super::resolve::pose_in_rig;
use super::{BIND_MATCH_EPSILON, ImportSession, ShapePlacement};

impl ImportSession<'_> {
    // ─── Skin transform ───────────────────────────────────────────────────

    /// Skin transform to use for a shape under a rig. Every shape parented
    /// to the same rig must share one transform for editing; the first
    /// shape attached publishes it, and later shapes that disagree keep
    /// their own transform but raise a warning.
    pub fn calc_skin_transform(
        &mut self,
        rig: &mut Rig,
        shape: Option<(&str, &Matrix4<f32>)>,
    ) -> Matrix4<f32> {
        let Some((shape_name, world)) = shape else {
            return rig
                .skin_transform()
                .copied()
                .unwrap_or_else(Matrix4::identity);
        };

        match rig.skin_transform().copied() {
            None => {
                rig.publish_skin_transform(*world);
                *world
            }
            Some(existing) => {
                if !mat_near_equal(&existing, world, BIND_MATCH_EPSILON) {
                    self.warn(
                        "SKIN_TRANSFORM_MISMATCH",
                        format!(
                            "Skin transform on '{shape_name}' does not match rig '{}'; shapes may be offset",
                            rig.name
                        ),
                    );
                }
                *world
            }
        }
    }

    // ─── Bone creation ────────────────────────────────────────────────────

    /// Create a bone in the rig if it is not there yet, ancestors first.
    ///
    /// The bind transform comes from the reference skeleton when extending
    /// missing bones, otherwise from the source node's global transform
    /// combined with the rig's skin transform. An existing bone wins
    /// silently: calling this twice changes nothing the second time. The
    /// pose is left at the bind position; run [`Self::set_pose_transforms`]
    /// afterwards, once per batch.
    pub fn ensure_bone(
        &self,
        rig: &mut Rig,
        bone_name: &str,
        source_name: &str,
    ) -> Result<(), RigError> {
        let mut in_flight = HashSet::new();
        self.ensure_bone_inner(rig, bone_name, source_name, &mut in_flight)
    }

    fn ensure_bone_inner(
        &self,
        rig: &mut Rig,
        bone_name: &str,
        source_name: &str,
        in_flight: &mut HashSet<String>,
    ) -> Result<(), RigError> {
        if rig.contains(bone_name) {
            return Ok(());
        }
        if !in_flight.insert(bone_name.to_string()) {
            return Err(RigError::CyclicHierarchy(bone_name.to_string()));
        }

        // Parent first, so parent transforms are established before
        // children and creation order stays top-down.
        let parent_name = self.lookup_parent(source_name);
        if let Some(parent) = &parent_name {
            self.ensure_bone_inner(rig, parent, parent, in_flight)?;
        }

        let bind_global = self.bind_source_transform(rig, source_name)?;
        let bind = pose_in_rig(&bind_global, &self.convention, self.options.scale_factor);
        rig.add_bone(bone_name, bind);
        debug!("created bone '{bone_name}' from source node '{source_name}'");

        if let Some(parent) = &parent_name {
            rig.set_parent(bone_name, parent)?;
        }
        Ok(())
    }

    /// Source-space global bind transform for a bone about to be created.
    fn bind_source_transform(&self, rig: &Rig, source_name: &str) -> Result<Matrix4<f32>, RigError> {
        if self.options.extend_missing_bones {
            if let Some(reference) = self.reference {
                if let Some(bind) = reference.global_bind(source_name) {
                    return Ok(bind);
                }
            }
        }

        let node_xf = self.source.node_global(source_name)?;
        let rig_xf = rig
            .skin_transform()
            .copied()
            .unwrap_or_else(Matrix4::identity);
        Ok(apply_scale_to_translation(&rig_xf, 1.0 / self.options.scale_factor) * node_xf)
    }

    /// Parent for a bone: the live source hierarchy first, the reference
    /// skeleton as fallback when extending. The scene/skeleton root is
    /// never a parent.
    fn lookup_parent(&self, source_name: &str) -> Option<String> {
        if let Some(node) = self.source.node(source_name) {
            if let Some(parent) = node.parent.as_deref() {
                if parent != self.source.root_name() && self.source.contains(parent) {
                    return Some(parent.to_string());
                }
            }
        }

        if self.options.extend_missing_bones {
            if let Some(reference) = self.reference {
                if let Some(parent) = reference.parent_of(source_name) {
                    if parent != reference.root_name() {
                        return Some(parent.to_string());
                    }
                }
            }
        }

        None
    }

    // ─── Hierarchy connection ─────────────────────────────────────────────

    /// Wire up parent/child links for every rig bone and republish poses.
    ///
    /// The bone list is processed as a growing worklist: discovering a
    /// parent that is absent from the rig creates it (via
    /// [`Self::ensure_bone`]) and appends it, because that parent's own
    /// parent must be found too. Terminates when the queue is exhausted; a
    /// parent assignment that would close a loop fails the pass with
    /// `CyclicHierarchy`.
    ///
    /// Returns the bones created during the pass, in creation order.
    pub fn connect_hierarchy(&self, rig: &mut Rig) -> Result<Vec<(String, String)>, RigError> {
        let existing = rig.len();
        let mut queue: Vec<String> = rig.bone_names().map(ToOwned::to_owned).collect();

        let mut index = 0;
        while index < queue.len() {
            let bone_name = queue[index].clone();
            index += 1;

            let has_parent = rig
                .bone(&bone_name)
                .is_some_and(|bone| bone.parent.is_some());
            if has_parent {
                continue;
            }

            let Some(parent_name) = self.lookup_parent(&bone_name) else {
                continue;
            };
            if !rig.contains(&parent_name) {
                self.ensure_bone(rig, &parent_name, &parent_name)?;
                queue.push(parent_name.clone());
            }
            rig.set_parent(&bone_name, &parent_name)?;
        }

        let new_bones: Vec<(String, String)> = rig
            .bone_names()
            .skip(existing)
            .map(|name| (name.to_string(), name.to_string()))
            .collect();

        // Poses always come last, once per batch; recomputing binds after
        // poses are set would invalidate them.
        let all_bones: Vec<(String, String)> = rig
            .bone_names()
            .map(|name| (name.to_string(), name.to_string()))
            .collect();
        self.set_pose_transforms(rig, &all_bones)?;

        Ok(new_bones)
    }

    // ─── Pose publication ─────────────────────────────────────────────────

    /// Overwrite pose transforms from the source file for each
    /// `(source_name, bone_name)` pair present on both sides. Non-node
    /// blocks and the scene root are skipped.
    pub fn set_pose_transforms(
        &self,
        rig: &mut Rig,
        bones: &[(String, String)],
    ) -> Result<(), RigError> {
        for (source_name, bone_name) in bones {
            let Some(node) = self.source.node(source_name) else {
                continue;
            };
            if node.kind != BlockKind::Node {
                continue;
            }
            if source_name == self.source.root_name() {
                continue;
            }
            if !rig.contains(bone_name) {
                continue;
            }

            let node_xf = self.source.node_global(source_name)?;
            let pose = pose_in_rig(&node_xf, &self.convention, self.options.scale_factor);
            rig.set_pose(bone_name, pose)?;
        }
        Ok(())
    }

    // ─── Shape attachment ─────────────────────────────────────────────────

    /// Add the bones a shape uses to the rig and pose them.
    ///
    /// When the shape is compatible with the reference skeleton and missing
    /// bones are being extended, bones are created at the reference bind
    /// positions; otherwise at the shape's own bind positions under the
    /// rig's skin transform. Existing bones are left untouched.
    ///
    /// Returns the bones created for this shape, in creation order.
    pub fn attach_shape(
        &mut self,
        rig: &mut Rig,
        shape: &SkinnedShape,
        placement: &ShapePlacement,
    ) -> Result<Vec<(String, String)>, RigError> {
        let unscaled_skin_xf =
            self.calc_skin_transform(rig, Some((shape.name.as_str(), &placement.transform)));
        let skin_xf =
            apply_scale_to_translation(&unscaled_skin_xf, 1.0 / self.options.scale_factor);

        let reference_ok = match self.reference {
            None => {
                self.warn(
                    "NO_REFERENCE_SKELETON",
                    format!("Shape '{}' has no reference skeleton", shape.name),
                );
                false
            }
            Some(reference) => {
                let compatible = reference_compatible(&skin_xf, shape, reference);
                if !compatible {
                    self.warn(
                        "REFERENCE_INCOMPATIBLE",
                        format!(
                            "Shape '{}' is not compatible with the reference skeleton",
                            shape.name
                        ),
                    );
                }
                compatible
            }
        };

        let existing = rig.len();
        for bone_name in &shape.bones {
            if rig.contains(bone_name) {
                continue;
            }

            let reference_bind = if self.options.extend_missing_bones && reference_ok {
                self.reference
                    .and_then(|reference| reference.global_bind(bone_name))
            } else {
                None
            };
            let bind_global = match reference_bind {
                Some(bind) => bind,
                None => {
                    let Some(bind_position) = shape.binding.bind_position(bone_name) else {
                        debug!(
                            "shape '{}' uses bone '{bone_name}' without a skin-to-bone transform",
                            shape.name
                        );
                        continue;
                    };
                    skin_xf * bind_position
                }
            };

            rig.add_bone(
                bone_name,
                pose_in_rig(&bind_global, &self.convention, self.options.scale_factor),
            );
        }

        let new_bones: Vec<(String, String)> = rig
            .bone_names()
            .skip(existing)
            .map(|name| (name.to_string(), name.to_string()))
            .collect();

        // Pose in a separate pass, never interleaved with bind creation.
        self.set_pose_transforms(rig, &new_bones)?;

        Ok(new_bones)
    }
}
