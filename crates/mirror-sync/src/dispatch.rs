//! Kind dispatch for a mixed entity batch.
//!
//! The reconciliation algorithm is kind-agnostic; what differs per kind is
//! the route: projects, experiments and samples go through the attachment
//! pipeline (the store addresses their attachment holder by the kind segment
//! of the endpoint), data sets go through [`DataSetReconciler`].
//!
//! [`DataSetReconciler`]: crate::DataSetReconciler

use mirror_data::{EntityKind, EntityRef};

/// One schedulable unit of work for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    /// Reconcile the attachments of one project/experiment/sample.
    Attachments(EntityRef),
    /// Reconcile a whole homogeneous group of one kind with one batched
    /// update call per entity.
    AttachmentBatch(EntityKind, Vec<EntityRef>),
    /// Reconcile one whole data-set record.
    DataSet(EntityRef),
}

/// A mixed batch partitioned by kind, input order preserved within each
/// kind.
#[derive(Debug, Default)]
pub struct KindGroups {
    /// Attachment-carrying kinds, grouped project, experiment, sample.
    /// Kinds with no entities are absent.
    pub attachments: Vec<(EntityKind, Vec<EntityRef>)>,
    /// Data-set refs, input order.
    pub data_sets: Vec<EntityRef>,
}

impl KindGroups {
    /// One unit per entity: attachment kinds first, then data sets. The
    /// shape for independent parallel processing.
    pub fn into_entity_units(self) -> Vec<WorkUnit> {
        let mut units = Vec::new();
        for (_, group) in self.attachments {
            units.extend(group.into_iter().map(WorkUnit::Attachments));
        }
        units.extend(self.data_sets.into_iter().map(WorkUnit::DataSet));
        units
    }

    /// One unit per attachment kind group, then one per data set. The shape
    /// for round-trip-minimizing batched application.
    pub fn into_batched_units(self) -> Vec<WorkUnit> {
        let mut units: Vec<WorkUnit> = self
            .attachments
            .into_iter()
            .map(|(kind, group)| WorkUnit::AttachmentBatch(kind, group))
            .collect();
        units.extend(self.data_sets.into_iter().map(WorkUnit::DataSet));
        units
    }
}

/// Partitions a mixed batch by kind. Stable: input order is preserved
/// within every kind.
pub fn partition(refs: &[EntityRef]) -> KindGroups {
    let mut groups = KindGroups::default();
    for kind in [EntityKind::Project, EntityKind::Experiment, EntityKind::Sample] {
        let group: Vec<EntityRef> = refs.iter().filter(|r| r.kind == kind).cloned().collect();
        if !group.is_empty() {
            groups.attachments.push((kind, group));
        }
    }
    groups.data_sets = refs
        .iter()
        .filter(|r| r.kind == EntityKind::DataSet)
        .cloned()
        .collect();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: EntityKind, perm_id: &str) -> EntityRef {
        EntityRef::new(kind, perm_id, format!("/LAB/{perm_id}"), true)
    }

    #[test]
    fn partition_is_stable_within_kind() {
        let refs = vec![
            entity(EntityKind::Sample, "S-2"),
            entity(EntityKind::Project, "P-1"),
            entity(EntityKind::Sample, "S-1"),
            entity(EntityKind::DataSet, "DS-1"),
            entity(EntityKind::Sample, "S-3"),
        ];
        let groups = partition(&refs);

        assert_eq!(groups.attachments.len(), 2);
        let (kind, samples) = &groups.attachments[1];
        assert_eq!(*kind, EntityKind::Sample);
        let ids: Vec<&str> = samples.iter().map(|r| r.perm_id.as_str()).collect();
        assert_eq!(ids, vec!["S-2", "S-1", "S-3"]);

        assert_eq!(groups.data_sets.len(), 1);
        assert_eq!(groups.data_sets[0].perm_id, "DS-1");
    }

    #[test]
    fn empty_kinds_produce_no_groups() {
        let refs = vec![entity(EntityKind::Experiment, "E-1")];
        let groups = partition(&refs);
        assert_eq!(groups.attachments.len(), 1);
        assert!(groups.data_sets.is_empty());
    }

    #[test]
    fn entity_units_carry_every_entity_exactly_once() {
        let refs = vec![
            entity(EntityKind::Project, "P-1"),
            entity(EntityKind::DataSet, "DS-1"),
            entity(EntityKind::Experiment, "E-1"),
        ];
        let units = partition(&refs).into_entity_units();
        assert_eq!(units.len(), 3);
        assert!(matches!(&units[2], WorkUnit::DataSet(r) if r.perm_id == "DS-1"));
    }

    #[test]
    fn batched_units_group_whole_kinds() {
        let refs = vec![
            entity(EntityKind::Sample, "S-1"),
            entity(EntityKind::Sample, "S-2"),
            entity(EntityKind::DataSet, "DS-1"),
        ];
        let units = partition(&refs).into_batched_units();
        assert_eq!(units.len(), 2);
        assert!(matches!(
            &units[0],
            WorkUnit::AttachmentBatch(EntityKind::Sample, group) if group.len() == 2
        ));
    }
}
