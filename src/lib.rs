//! Transform and rig reconciliation for skinned 3D assets.
//!
//! A source file carries a node graph, skinned shapes with bind positions,
//! and an optional pose; the editing rig wants one consistent picture of
//! where every bone sits. This crate computes that picture: shape placement,
//! bind/pose resolution, compatibility against existing rigs and a reference
//! skeleton, and hierarchy-safe rig construction.
//!
//! Entry point is [`reconcile::ImportSession`], created per source file.

pub mod convention;
pub mod error;
pub mod reconcile;
pub mod rig;
pub mod source;
pub mod transform;

pub use convention::{AxisConvention, ConventionEntry, ConventionTable, TargetDomain, TargetGame};
pub use error::RigError;
pub use reconcile::{
    CompatibilityResult, ImportIssue, ImportOptions, ImportSession, Severity, ShapePlacement,
};
pub use rig::{Bone, BoneState, Rig};
pub use source::{
    BlockKind, ReferenceBone, ReferenceSkeleton, SkinBinding, SkinnedShape, SourceNode,
    SourceScene,
};
