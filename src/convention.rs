use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::sync::OnceLock;

use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::RigError;

/// Havok physics units per editor unit, used for collision geometry.
pub const HAVOK_UNIT_SCALE: f32 = 69.991_25;

// ─── Convention keys ──────────────────────────────────────────────────────────

/// Target game a source file is authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetGame {
    Skyrim,
    SkyrimSE,
    Fallout4,
    Fallout76,
    FalloutNV,
}

impl TargetGame {
    /// Axis convention the game's skeletal transforms are authored in.
    pub fn axis(self) -> AxisConvention {
        match self {
            TargetGame::Skyrim
            | TargetGame::SkyrimSE
            | TargetGame::Fallout4
            | TargetGame::Fallout76
            | TargetGame::FalloutNV => AxisConvention::ZUp,
        }
    }
}

/// Axis convention identifier for a family of source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisConvention {
    /// Z-up with bones pointing down +X, the Gamebryo skeletal convention.
    ZUp,
}

/// Domain a convention entry applies to. Collision geometry carries a
/// different unit scale than skeletal bones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetDomain {
    Bone,
    Collision,
}

// ─── Entries and table ────────────────────────────────────────────────────────

/// Fixed correction bridging a source-file convention and the rig convention.
///
/// `into_rig` is post-multiplied onto a source-space transform when storing
/// it on a rig bone; `from_rig` is post-multiplied onto a rig bone transform
/// when reading it back into source space. The two are inverses.
#[derive(Debug, Clone, Copy)]
pub struct ConventionEntry {
    pub into_rig: Matrix4<f32>,
    pub from_rig: Matrix4<f32>,
    pub unit_scale: f32,
}

/// Process-wide table of axis corrections and unit scales, read-only after
/// initialization. An entry missing for a supported key is a configuration
/// error and is caught by [`ConventionTable::validate`] at startup.
#[derive(Debug, Clone)]
pub struct ConventionTable {
    entries: HashMap<(TargetDomain, AxisConvention), ConventionEntry>,
}

impl ConventionTable {
    /// The built-in table shared by the whole process.
    pub fn standard() -> &'static ConventionTable {
        static TABLE: OnceLock<ConventionTable> = OnceLock::new();
        TABLE.get_or_init(ConventionTable::builtin)
    }

    fn builtin() -> ConventionTable {
        let bone_rotation =
            Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2).to_homogeneous();
        let bone_rotation_inv =
            Rotation3::from_axis_angle(&Vector3::z_axis(), -FRAC_PI_2).to_homogeneous();

        let mut entries = HashMap::new();
        entries.insert(
            (TargetDomain::Bone, AxisConvention::ZUp),
            ConventionEntry {
                into_rig: bone_rotation,
                from_rig: bone_rotation_inv,
                unit_scale: 1.0,
            },
        );
        entries.insert(
            (TargetDomain::Collision, AxisConvention::ZUp),
            ConventionEntry {
                into_rig: bone_rotation,
                from_rig: bone_rotation_inv,
                unit_scale: HAVOK_UNIT_SCALE,
            },
        );

        ConventionTable { entries }
    }

    /// Look up the correction entry for a convention key.
    pub fn entry(
        &self,
        domain: TargetDomain,
        axis: AxisConvention,
    ) -> Result<&ConventionEntry, RigError> {
        self.entries
            .get(&(domain, axis))
            .ok_or_else(|| RigError::Configuration(format!("{domain:?}/{axis:?}")))
    }

    /// Verify every supported (domain, axis) combination has an entry.
    /// Intended to run once at process startup.
    pub fn validate(&self) -> Result<(), RigError> {
        for domain in [TargetDomain::Bone, TargetDomain::Collision] {
            for axis in [AxisConvention::ZUp] {
                self.entry(domain, axis)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::mat_near_equal;

    #[test]
    fn given_standard_table_when_validating_then_all_keys_resolve() {
        assert!(ConventionTable::standard().validate().is_ok());
    }

    #[test]
    fn given_bone_entry_when_composing_corrections_then_they_cancel() {
        let entry = ConventionTable::standard()
            .entry(TargetDomain::Bone, AxisConvention::ZUp)
            .expect("bone entry");
        let product = entry.into_rig * entry.from_rig;
        assert!(mat_near_equal(&product, &Matrix4::identity(), 1e-5));
    }

    #[test]
    fn given_collision_domain_when_looking_up_then_unit_scale_differs_from_bones() {
        let table = ConventionTable::standard();
        let bone = table
            .entry(TargetDomain::Bone, TargetGame::SkyrimSE.axis())
            .expect("bone entry");
        let collision = table
            .entry(TargetDomain::Collision, TargetGame::SkyrimSE.axis())
            .expect("collision entry");
        assert_eq!(bone.unit_scale, 1.0);
        assert_eq!(collision.unit_scale, HAVOK_UNIT_SCALE);
    }
}
