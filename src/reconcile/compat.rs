use log::debug;
use nalgebra::Matrix4;

use crate::convention::ConventionEntry;
use crate::error::RigError;
use crate::rig::Rig;
use crate::source::{ReferenceSkeleton, SkinnedShape};
use crate::transform::{apply_scale_except_scale, mat_near_equal, try_inverse_or_identity};

use super::resolve::bone_global_transform;
use super::types::CompatibilityResult;
use super::BIND_MATCH_EPSILON;

/// Match one shape against one candidate rig.
///
/// For every bone the shape uses that the rig also has, the bone's global
/// bind position as seen through the shape's placement is compared with the
/// rig's edit position. All equal means the rig can be reused as-is. When
/// every mismatching bone is off by the same delta, that delta is the
/// corrective transform to fold into the skin transform; bones that already
/// match do not contribute to it. Anything else is incompatible.
pub(super) fn match_rig(
    shape: &SkinnedShape,
    shape_world: &Matrix4<f32>,
    rig: &Rig,
    convention: &ConventionEntry,
    scale_factor: f32,
) -> Result<CompatibilityResult, RigError> {
    let mut all_match = true;
    let mut offset_xf: Option<Matrix4<f32>> = None;
    let mut offset_consistent = true;

    for bone_name in &shape.bones {
        if !rig.contains(bone_name) {
            continue;
        }
        let Some(bind_position) = shape.binding.bind_position(bone_name) else {
            continue;
        };

        let shape_bone_xf =
            shape_world * apply_scale_except_scale(&bind_position, scale_factor);
        let rig_bone_xf = bone_global_transform(rig, bone_name, convention, false)?;

        if !mat_near_equal(&shape_bone_xf, &rig_bone_xf, BIND_MATCH_EPSILON) {
            all_match = false;
            let this_offset = shape_bone_xf * try_inverse_or_identity(&rig_bone_xf);
            match &offset_xf {
                None => offset_xf = Some(this_offset),
                Some(previous) => {
                    if !mat_near_equal(previous, &this_offset, BIND_MATCH_EPSILON) {
                        debug!(
                            "rig '{}' offsets differ at bone '{}' for shape '{}'",
                            rig.name, bone_name, shape.name
                        );
                        offset_consistent = false;
                        break;
                    }
                }
            }
        }
    }

    if all_match {
        return Ok(CompatibilityResult::Compatible);
    }
    if offset_consistent {
        if let Some(offset) = offset_xf {
            return Ok(CompatibilityResult::CompatibleWithOffset(offset));
        }
    }
    Ok(CompatibilityResult::Incompatible)
}

/// Search candidate rigs, in caller order, for one the shape can reuse.
///
/// The first `Compatible` or `CompatibleWithOffset` candidate wins; there is
/// no scoring. A candidate that comes back `Incompatible` stops the search
/// instead of trying the remaining candidates — a deliberate simplification
/// carried over from the original priority-order contract, flagged for
/// product-owner review.
pub(super) fn find_compatible_rig<'a>(
    shape: &SkinnedShape,
    shape_world: &Matrix4<f32>,
    candidates: &[&'a Rig],
    convention: &ConventionEntry,
    scale_factor: f32,
) -> Result<Option<(&'a Rig, CompatibilityResult)>, RigError> {
    for rig in candidates {
        match match_rig(shape, shape_world, rig, convention, scale_factor)? {
            CompatibilityResult::Incompatible => {
                debug!(
                    "rig '{}' incompatible with shape '{}', stopping search",
                    rig.name, shape.name
                );
                return Ok(None);
            }
            result => return Ok(Some((rig, result))),
        }
    }
    Ok(None)
}

/// Go/no-go check of a shape's bind positions against the reference
/// skeleton: compatible when every used bone's bind position, seen through
/// the skin transform, lands on the reference bind position.
pub(super) fn reference_compatible(
    skin_xf: &Matrix4<f32>,
    shape: &SkinnedShape,
    reference: &ReferenceSkeleton,
) -> bool {
    for bone_name in &shape.bones {
        let Some(reference_xf) = reference.global_bind(bone_name) else {
            continue;
        };
        let Some(bind_position) = shape.binding.bind_position(bone_name) else {
            continue;
        };
        let shape_bone_xf = skin_xf * bind_position;
        if !mat_near_equal(&shape_bone_xf, &reference_xf, BIND_MATCH_EPSILON) {
            debug!(
                "shape '{}' not compatible with reference skeleton at '{}'",
                shape.name, bone_name
            );
            return false;
        }
    }
    true
}
