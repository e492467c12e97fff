use nalgebra::{Matrix3, Matrix4, Translation3, UnitQuaternion, Vector3};

/// Maximum per-element drift allowed by a decompose/compose round trip.
pub const DECOMPOSE_EPSILON: f32 = 1e-4;

// ─── Decomposition ────────────────────────────────────────────────────────────

/// Translation-rotation-scale parts of an affine transform.
#[derive(Debug, Clone, Copy)]
pub struct TrsParts {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

/// Split an affine matrix into translation, rotation, and scale.
///
/// The rotation comes out orthonormal; non-uniform scale is carried per
/// axis. A mirrored basis (negative determinant) folds the sign into the
/// X scale so the rotation stays proper. Degenerate axes decompose to the
/// raw column and an unchanged rotation estimate rather than failing.
pub fn decompose_trs(xf: &Matrix4<f32>) -> TrsParts {
    let translation = Vector3::new(xf[(0, 3)], xf[(1, 3)], xf[(2, 3)]);

    let mut basis: Matrix3<f32> = xf.fixed_view::<3, 3>(0, 0).into_owned();
    let mut scale = Vector3::new(
        basis.column(0).norm(),
        basis.column(1).norm(),
        basis.column(2).norm(),
    );
    if basis.determinant() < 0.0 {
        scale.x = -scale.x;
    }

    for axis in 0..3 {
        let factor = scale[axis];
        if factor.abs() > 1e-12 {
            let column = basis.column(axis) / factor;
            basis.set_column(axis, &column);
        }
    }

    TrsParts {
        translation,
        rotation: UnitQuaternion::from_matrix(&basis),
        scale,
    }
}

/// Rebuild an affine matrix from translation, rotation, and scale.
pub fn compose_trs(parts: &TrsParts) -> Matrix4<f32> {
    Translation3::from(parts.translation).to_homogeneous()
        * parts.rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(&parts.scale)
}

// ─── Scale-factor helpers ─────────────────────────────────────────────────────

/// Apply a scale factor to the translation component of the matrix only.
pub fn apply_scale_to_translation(xf: &Matrix4<f32>, factor: f32) -> Matrix4<f32> {
    let mut parts = decompose_trs(xf);
    parts.translation *= factor;
    compose_trs(&parts)
}

/// Apply a scale factor to the matrix but NOT to its scale component.
///
/// When importing with a uniform scale factor the verts have already been
/// scaled, so the factor must move the transform's position without
/// compounding the shape's own intrinsic scale.
pub fn apply_scale_except_scale(xf: &Matrix4<f32>, factor: f32) -> Matrix4<f32> {
    let original_scale = decompose_trs(xf).scale;
    let mut parts = decompose_trs(&(xf * factor));
    parts.scale = original_scale;
    compose_trs(&parts)
}

// ─── Comparison and inversion ─────────────────────────────────────────────────

/// Element-wise near-equality for affine matrices.
pub fn mat_near_equal(a: &Matrix4<f32>, b: &Matrix4<f32>, epsilon: f32) -> bool {
    (a - b).amax() <= epsilon
}

/// Invert the matrix, degrading to identity when it is not invertible.
pub fn try_inverse_or_identity(xf: &Matrix4<f32>) -> Matrix4<f32> {
    xf.try_inverse().unwrap_or_else(Matrix4::identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_3;

    fn sample_transform() -> Matrix4<f32> {
        compose_trs(&TrsParts {
            translation: Vector3::new(1.5, -2.0, 7.25),
            rotation: UnitQuaternion::from_euler_angles(0.3, -0.7, FRAC_PI_3),
            scale: Vector3::new(2.0, 2.0, 2.0),
        })
    }

    #[test]
    fn given_orthonormal_rotation_when_decomposing_then_compose_round_trips() {
        let original = sample_transform();
        let rebuilt = compose_trs(&decompose_trs(&original));
        assert!(
            mat_near_equal(&original, &rebuilt, DECOMPOSE_EPSILON),
            "round trip drifted: {original} != {rebuilt}"
        );
    }

    #[test]
    fn given_scale_factor_when_scaling_translation_then_rotation_and_scale_are_untouched() {
        let original = sample_transform();
        let scaled = apply_scale_to_translation(&original, 10.0);

        let before = decompose_trs(&original);
        let after = decompose_trs(&scaled);

        assert!((after.translation - before.translation * 10.0).norm() < 1e-3);
        assert!(after.rotation.angle_to(&before.rotation) < 1e-4);
        assert!((after.scale - before.scale).norm() < 1e-4);
    }

    #[test]
    fn given_scale_factor_when_scaling_except_component_then_intrinsic_scale_survives() {
        let original = sample_transform();
        let scaled = apply_scale_except_scale(&original, 0.1);

        let before = decompose_trs(&original);
        let after = decompose_trs(&scaled);

        assert!((after.translation - before.translation * 0.1).norm() < 1e-4);
        assert!((after.scale - before.scale).norm() < 1e-4);
    }

    #[test]
    fn given_singular_matrix_when_inverting_then_identity_is_returned() {
        let singular = Matrix4::<f32>::zeros();
        assert_eq!(try_inverse_or_identity(&singular), Matrix4::identity());
    }

    #[test]
    fn given_mirrored_basis_when_decomposing_then_rotation_stays_proper() {
        let mirrored = Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0));
        let parts = decompose_trs(&mirrored);
        assert!(parts.scale.x < 0.0);
        assert!(mat_near_equal(
            &mirrored,
            &compose_trs(&parts),
            DECOMPOSE_EPSILON
        ));
    }
}
