mod builder;
mod compat;
mod placement;
mod resolve;
mod types;

use nalgebra::Matrix4;

use crate::convention::{ConventionEntry, ConventionTable, TargetDomain};
use crate::error::RigError;
use crate::rig::Rig;
use crate::source::{ReferenceSkeleton, SkinnedShape, SourceScene};

pub use resolve::{bone_global_transform, bone_transform, pose_in_rig};
pub use types::{CompatibilityResult, ImportIssue, ImportOptions, Severity, ShapePlacement};

/// Tolerance for bind-position equality. The original uses 0.01 for all
/// bind/compatibility comparisons.
pub const BIND_MATCH_EPSILON: f32 = 0.01;

/// Tolerance for pose-offset consistency. Deliberately loose: widely-used
/// assets carry small author error in their pose transforms, and tightening
/// this stops their shapes from being adjusted to the rig location.
pub const POSE_MATCH_EPSILON: f32 = 0.5;

/// One reconciliation pass over a loaded source file.
///
/// Holds the source graph, the optional reference skeleton, and the import
/// options as explicit handles — there is no ambient "active object" state.
/// Warnings accumulate on the session and never abort a pass; drain them
/// with [`ImportSession::take_issues`] after each shape or rig.
pub struct ImportSession<'a> {
    source: &'a SourceScene,
    reference: Option<&'a ReferenceSkeleton>,
    options: ImportOptions,
    convention: ConventionEntry,
    issues: Vec<ImportIssue>,
}

impl<'a> ImportSession<'a> {
    /// Create a session. Fails with `Configuration` when the convention
    /// table has no entry for the requested game, which callers should
    /// treat as fatal at startup.
    pub fn new(
        source: &'a SourceScene,
        reference: Option<&'a ReferenceSkeleton>,
        options: ImportOptions,
    ) -> Result<Self, RigError> {
        let convention =
            *ConventionTable::standard().entry(TargetDomain::Bone, options.game.axis())?;
        Ok(ImportSession {
            source,
            reference,
            options,
            convention,
            issues: Vec::new(),
        })
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn issues(&self) -> &[ImportIssue] {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<ImportIssue> {
        std::mem::take(&mut self.issues)
    }

    pub(crate) fn warn(&mut self, code: &str, message: String) {
        self.issues.push(ImportIssue {
            severity: types::Severity::Warning,
            code: code.to_string(),
            message,
        });
    }

    // ─── Shape placement ──────────────────────────────────────────────────

    /// Placement transform for a shape (§ shape placement calculator).
    pub fn shape_placement(&mut self, shape: &SkinnedShape) -> Result<ShapePlacement, RigError> {
        placement::shape_placement(
            shape,
            self.source,
            self.reference,
            self.options.scale_factor,
            self.options.extend_missing_bones,
            &mut self.issues,
        )
    }

    // ─── Compatibility ────────────────────────────────────────────────────

    /// Match a shape against one candidate rig.
    pub fn match_rig(
        &self,
        shape: &SkinnedShape,
        shape_world: &Matrix4<f32>,
        rig: &Rig,
    ) -> Result<CompatibilityResult, RigError> {
        compat::match_rig(
            shape,
            shape_world,
            rig,
            &self.convention,
            self.options.scale_factor,
        )
    }

    /// Search candidate rigs in caller order for one the shape can reuse.
    pub fn find_compatible_rig<'r>(
        &self,
        shape: &SkinnedShape,
        shape_world: &Matrix4<f32>,
        candidates: &[&'r Rig],
    ) -> Result<Option<(&'r Rig, CompatibilityResult)>, RigError> {
        compat::find_compatible_rig(
            shape,
            shape_world,
            candidates,
            &self.convention,
            self.options.scale_factor,
        )
    }

    /// Go/no-go check of a shape against the reference skeleton. True when
    /// no reference is needed for the comparison to hold.
    pub fn reference_compatible(&self, skin_xf: &Matrix4<f32>, shape: &SkinnedShape) -> bool {
        match self.reference {
            Some(reference) => compat::reference_compatible(skin_xf, shape, reference),
            None => false,
        }
    }

    // ─── Resolver access ──────────────────────────────────────────────────

    /// Bone transform in the session's configured form: parent-relative
    /// when `preserve_hierarchy` is set, scene-relative otherwise.
    pub fn bone_transform(
        &self,
        rig: &Rig,
        bone_name: &str,
        use_pose: bool,
    ) -> Result<Matrix4<f32>, RigError> {
        resolve::bone_transform(
            rig,
            bone_name,
            &self.convention,
            self.options.preserve_hierarchy,
            use_pose,
        )
    }
}
