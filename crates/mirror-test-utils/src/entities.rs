//! Entity reference factories.

use mirror_data::{EntityKind, EntityRef};

/// A project reference with the attachment hint set.
pub fn project(perm_id: &str) -> EntityRef {
    EntityRef::new(
        EntityKind::Project,
        perm_id,
        format!("/LAB/{perm_id}"),
        true,
    )
}

/// An experiment reference with the attachment hint set.
pub fn experiment(perm_id: &str) -> EntityRef {
    EntityRef::new(
        EntityKind::Experiment,
        perm_id,
        format!("/LAB/PROJ/{perm_id}"),
        true,
    )
}

/// A sample reference with the attachment hint set.
pub fn sample(perm_id: &str) -> EntityRef {
    EntityRef::new(
        EntityKind::Sample,
        perm_id,
        format!("/LAB/PROJ/{perm_id}"),
        true,
    )
}

/// A sample reference whose change feed asserted "no attachments".
pub fn sample_without_attachments(perm_id: &str) -> EntityRef {
    EntityRef::new(
        EntityKind::Sample,
        perm_id,
        format!("/LAB/PROJ/{perm_id}"),
        false,
    )
}

/// A data-set reference; `perm_id` doubles as the data-set code.
pub fn data_set(code: &str) -> EntityRef {
    EntityRef::new(EntityKind::DataSet, code, code, false)
}
