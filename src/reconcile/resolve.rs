use nalgebra::Matrix4;

use crate::convention::ConventionEntry;
use crate::error::RigError;
use crate::rig::Rig;
use crate::transform::{apply_scale_to_translation, try_inverse_or_identity};

// ─── Rig-side resolution ──────────────────────────────────────────────────────

/// Global transform represented by a rig bone, corrected back into source
/// convention. `use_pose` selects the pose transform over the bind.
pub fn bone_global_transform(
    rig: &Rig,
    bone_name: &str,
    convention: &ConventionEntry,
    use_pose: bool,
) -> Result<Matrix4<f32>, RigError> {
    let bone = rig
        .bone(bone_name)
        .ok_or_else(|| RigError::NotFound(bone_name.to_string()))?;
    let global = if use_pose { bone.pose } else { bone.bind };
    Ok(global * convention.from_rig)
}

/// Global or parent-relative transform for a rig bone.
///
/// With `preserve_hierarchy` set and a parent present, the result is
/// `inverse(parent_global) * bone_global`. Callers must feed the same form
/// consistently to whatever consumes it; mixing forms misplaces bones.
pub fn bone_transform(
    rig: &Rig,
    bone_name: &str,
    convention: &ConventionEntry,
    preserve_hierarchy: bool,
    use_pose: bool,
) -> Result<Matrix4<f32>, RigError> {
    let global = bone_global_transform(rig, bone_name, convention, use_pose)?;

    if preserve_hierarchy {
        let parent = rig
            .bone(bone_name)
            .and_then(|bone| bone.parent.as_deref().map(ToOwned::to_owned));
        if let Some(parent_name) = parent {
            let parent_global = bone_global_transform(rig, &parent_name, convention, use_pose)?;
            return Ok(try_inverse_or_identity(&parent_global) * global);
        }
    }

    Ok(global)
}

// ─── Source-side resolution ───────────────────────────────────────────────────

/// Take a source-file global transform into rig convention: the uniform
/// scale factor moves the position only, then the axis correction applies.
pub fn pose_in_rig(
    node_global: &Matrix4<f32>,
    convention: &ConventionEntry,
    scale_factor: f32,
) -> Matrix4<f32> {
    apply_scale_to_translation(node_global, scale_factor) * convention.into_rig
}
