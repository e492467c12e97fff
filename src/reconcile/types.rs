use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::convention::TargetGame;

// ─── Options ──────────────────────────────────────────────────────────────────

/// Import options shared by every reconciliation entry point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Game convention the source file is authored for.
    pub game: TargetGame,
    /// Uniform scale factor already applied to imported vertices.
    pub scale_factor: f32,
    /// Create bones from the reference skeleton when the source file lacks
    /// them.
    pub extend_missing_bones: bool,
    /// Report bone transforms parent-relative instead of scene-relative.
    pub preserve_hierarchy: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            game: TargetGame::SkyrimSE,
            scale_factor: 1.0,
            extend_missing_bones: true,
            preserve_hierarchy: false,
        }
    }
}

// ─── Structured warnings ──────────────────────────────────────────────────────

/// Severity level used by import issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single issue collected while reconciling a shape or rig. Issues never
/// abort a pass; the caller reports them in aggregate afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

// ─── Results ──────────────────────────────────────────────────────────────────

/// Placement computed for an imported shape.
#[derive(Debug, Clone, Copy)]
pub struct ShapePlacement {
    /// Transform to apply to the shape for display and editing.
    pub transform: Matrix4<f32>,
    /// False when no consistent offset was found and the shape may sit at
    /// the wrong location; the caller should warn the user.
    pub offset_consistent: bool,
}

/// Outcome of matching a shape against one candidate rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompatibilityResult {
    /// Every bone the shape uses already sits at the rig's bind position.
    Compatible,
    /// All mismatching bones are off by this single corrective transform.
    CompatibleWithOffset(Matrix4<f32>),
    /// Bind positions disagree by differing amounts; the rig cannot be
    /// reused for this shape.
    Incompatible,
}
