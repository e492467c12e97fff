use log::debug;
use nalgebra::Matrix4;

use crate::error::RigError;
use crate::source::{ReferenceSkeleton, SkinnedShape, SourceScene};
use crate::transform::{apply_scale_except_scale, mat_near_equal, try_inverse_or_identity};

use super::types::{ImportIssue, Severity, ShapePlacement};
use super::{BIND_MATCH_EPSILON, POSE_MATCH_EPSILON};

/// Compute the transform that positions a shape sensibly for editing.
///
/// Priority order:
/// 1. the shape's explicit global-to-skin transform, inverted;
/// 2. a consistent offset between the shape's bind positions and the
///    reference skeleton (only when extending missing bones);
/// 3. a consistent offset between the shape's pose and bind positions,
///    inverted — a loose tolerance absorbs the small author error common in
///    real-world assets;
/// 4. identity, flagged inconsistent so the caller can warn the user.
///
/// The uniform scale factor lands on the translation only; verts are
/// assumed to be scaled already.
pub(super) fn shape_placement(
    shape: &SkinnedShape,
    source: &SourceScene,
    reference: Option<&ReferenceSkeleton>,
    scale_factor: f32,
    extend_missing_bones: bool,
    issues: &mut Vec<ImportIssue>,
) -> Result<ShapePlacement, RigError> {
    if !shape.is_skinned() {
        // Statics get placed by their own transform.
        return Ok(ShapePlacement {
            transform: apply_scale_except_scale(&shape.transform, scale_factor),
            offset_consistent: true,
        });
    }

    let mut xf = Matrix4::identity();
    let mut offset_consistent = false;

    if let Some(global_to_skin) = shape.binding.global_to_skin {
        // An explicit transform offsets the whole skin; use it as-is.
        xf = try_inverse_or_identity(&global_to_skin);
        offset_consistent = true;
    }

    if extend_missing_bones {
        if let Some(reference) = reference {
            // Creating missing reference bones only works when the shape's
            // bind positions sit at one consistent offset from the
            // reference bind positions.
            let mut offset_xf: Option<Matrix4<f32>> = None;
            for bone_name in &shape.bones {
                let Some(reference_xf) = reference.global_bind(bone_name) else {
                    continue;
                };
                let Some(bind_position) = shape.binding.bind_position(bone_name) else {
                    continue;
                };
                let bind_in_shape = xf * bind_position;
                let this_offset = reference_xf * try_inverse_or_identity(&bind_in_shape);
                match &offset_xf {
                    None => {
                        offset_xf = Some(this_offset);
                        offset_consistent = true;
                    }
                    Some(previous) => {
                        if !mat_near_equal(previous, &this_offset, BIND_MATCH_EPSILON) {
                            debug!(
                                "shape '{}' bind offset differs from reference at '{}'",
                                shape.name, bone_name
                            );
                            offset_consistent = false;
                            break;
                        }
                    }
                }
            }

            if offset_consistent {
                if let Some(offset) = offset_xf {
                    xf *= offset;
                }
            }
        }
    }

    if !offset_consistent {
        // No global-to-skin and no consistent bind offset; if every bone's
        // pose offset agrees, the file is a simple reposition of the whole
        // shape and the inverse puts it back.
        let mut pose_xf: Option<Matrix4<f32>> = None;
        let mut same = true;
        for bone_name in &shape.bones {
            let bone_xf = match shape.pose_offset(source, bone_name) {
                Ok(bone_xf) => bone_xf,
                Err(RigError::NotFound(name)) => {
                    debug!("shape '{}' uses bone '{name}' with no source node", shape.name);
                    continue;
                }
                Err(err) => return Err(err),
            };
            match &pose_xf {
                None => pose_xf = Some(bone_xf),
                Some(previous) => {
                    if !mat_near_equal(previous, &bone_xf, POSE_MATCH_EPSILON) {
                        same = false;
                        break;
                    }
                }
            }
        }

        if same {
            if let Some(pose) = pose_xf {
                xf = try_inverse_or_identity(&(xf * pose));
                offset_consistent = true;
            }
        }
    }

    if !offset_consistent {
        issues.push(ImportIssue {
            severity: Severity::Warning,
            code: "SHAPE_OFFSET_INCONSISTENT".to_string(),
            message: format!(
                "Shape '{}' has no consistent bind or pose offset and may be misplaced",
                shape.name
            ),
        });
    }

    Ok(ShapePlacement {
        transform: apply_scale_except_scale(&xf, scale_factor),
        offset_consistent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BlockKind, ReferenceBone, SkinBinding, SourceNode};
    use nalgebra::Translation3;
    use std::collections::HashMap;

    fn translate(z: f32) -> Matrix4<f32> {
        Translation3::new(0.0, 0.0, z).to_homogeneous()
    }

    fn scene_with(bones: &[(&str, f32)]) -> SourceScene {
        let mut nodes = vec![SourceNode {
            name: "Scene Root".to_string(),
            parent: None,
            local_transform: Matrix4::identity(),
            kind: BlockKind::Node,
        }];
        for (name, z) in bones {
            nodes.push(SourceNode {
                name: name.to_string(),
                parent: Some("Scene Root".to_string()),
                local_transform: translate(*z),
                kind: BlockKind::Node,
            });
        }
        SourceScene::new("Scene Root", nodes)
    }

    fn reference_with(bones: &[(&str, f32)]) -> ReferenceSkeleton {
        ReferenceSkeleton::new(
            "Ref Root",
            bones
                .iter()
                .map(|(name, z)| ReferenceBone {
                    name: name.to_string(),
                    parent: None,
                    global_bind: translate(*z),
                })
                .collect(),
        )
    }

    fn shape_with_binds(binds: &[(&str, f32)]) -> SkinnedShape {
        let mut skin_to_bone = HashMap::new();
        for (name, z) in binds {
            skin_to_bone.insert(
                name.to_string(),
                try_inverse_or_identity(&translate(*z)),
            );
        }
        SkinnedShape {
            name: "Body".to_string(),
            bones: binds.iter().map(|(name, _)| name.to_string()).collect(),
            binding: SkinBinding {
                skin_to_bone,
                global_to_skin: None,
            },
            transform: Matrix4::identity(),
        }
    }

    #[test]
    fn given_global_to_skin_when_placing_then_its_inverse_wins() {
        let scene = scene_with(&[("Spine", 8.0)]);
        let mut shape = shape_with_binds(&[("Spine", 8.0)]);
        shape.binding.global_to_skin = Some(translate(-3.0));

        let mut issues = Vec::new();
        let placement =
            shape_placement(&shape, &scene, None, 1.0, false, &mut issues).expect("placement");

        assert!(placement.offset_consistent);
        assert!((placement.transform[(2, 3)] - 3.0).abs() < 1e-4);
        assert!(issues.is_empty());
    }

    #[test]
    fn given_consistent_reference_offset_when_placing_then_offset_is_applied() {
        // Reference has Spine at z=10 and Neck at z=15; the shape binds them
        // at 8 and 13 — a uniform offset of +2.
        let scene = scene_with(&[("Spine", 8.0), ("Neck", 13.0)]);
        let reference = reference_with(&[("Spine", 10.0), ("Neck", 15.0)]);
        let shape = shape_with_binds(&[("Spine", 8.0), ("Neck", 13.0)]);

        let mut issues = Vec::new();
        let placement =
            shape_placement(&shape, &scene, Some(&reference), 1.0, true, &mut issues)
                .expect("placement");

        assert!(placement.offset_consistent);
        assert!((placement.transform[(2, 3)] - 2.0).abs() < 1e-4);
        assert!(issues.is_empty());
    }

    #[test]
    fn given_inconsistent_reference_offset_when_placing_then_pose_check_takes_over() {
        // Neck disagrees with Spine's offset by 5, but the pose transforms
        // match the binds, so the pose branch settles on identity.
        let scene = scene_with(&[("Spine", 8.0), ("Neck", 20.0)]);
        let reference = reference_with(&[("Spine", 10.0), ("Neck", 15.0)]);
        let shape = shape_with_binds(&[("Spine", 8.0), ("Neck", 20.0)]);

        let mut issues = Vec::new();
        let placement =
            shape_placement(&shape, &scene, Some(&reference), 1.0, true, &mut issues)
                .expect("placement");

        assert!(placement.offset_consistent);
        assert!(mat_near_equal(
            &placement.transform,
            &Matrix4::identity(),
            1e-4
        ));
    }

    #[test]
    fn given_inconsistent_pose_offsets_when_placing_then_identity_and_warning() {
        // Bind and pose disagree per bone by different amounts: nothing to
        // work with.
        let scene = scene_with(&[("Spine", 9.0), ("Neck", 20.0)]);
        let shape = shape_with_binds(&[("Spine", 8.0), ("Neck", 13.0)]);

        let mut issues = Vec::new();
        let placement =
            shape_placement(&shape, &scene, None, 1.0, false, &mut issues).expect("placement");

        assert!(!placement.offset_consistent);
        assert!(mat_near_equal(
            &placement.transform,
            &Matrix4::identity(),
            1e-4
        ));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "SHAPE_OFFSET_INCONSISTENT");
    }

    #[test]
    fn given_unskinned_shape_when_placing_then_its_own_transform_is_used() {
        let scene = scene_with(&[]);
        let shape = SkinnedShape {
            name: "Static".to_string(),
            bones: Vec::new(),
            binding: SkinBinding::default(),
            transform: translate(4.0),
        };

        let mut issues = Vec::new();
        let placement =
            shape_placement(&shape, &scene, None, 10.0, false, &mut issues).expect("placement");

        assert!(placement.offset_consistent);
        assert!((placement.transform[(2, 3)] - 40.0).abs() < 1e-3);
    }
}
