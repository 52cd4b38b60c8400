#![forbid(unsafe_code)]

use super::Reconciler;
use crate::dao::EntityKind;
use crate::doc::DocAttachment;
use crate::error::ReconcileError;
use crate::ids::ExternalId;
use crate::model::{Attachment, AttachmentNamespace, AttachmentType, AttachmentTypeRef, Entity};
use std::collections::BTreeSet;
use tracing::debug;

impl Reconciler<'_> {
    /// Merges `sources` into an owner's attachments. Attachments no source
    /// matched are deleted. Returns true when the owner's set changed.
    pub fn merge_attachments(
        &mut self,
        targets: &mut Vec<Attachment>,
        sources: &[DocAttachment],
    ) -> Result<bool, ReconcileError> {
        let before: Vec<ExternalId> = targets.iter().map(|a| a.id().clone()).collect();

        let mut kept = BTreeSet::new();
        for source in sources {
            let attachment = self.merge_attachment(targets, source)?;
            kept.insert(attachment.id().clone());
        }

        let (keep, orphaned): (Vec<_>, Vec<_>) = std::mem::take(targets)
            .into_iter()
            .partition(|attachment| kept.contains(attachment.id()));
        for attachment in &orphaned {
            self.orphan(attachment)?;
        }
        *targets = keep;

        let after: Vec<&ExternalId> = targets.iter().map(|a| a.id()).collect();
        Ok(after.len() != before.len() || after.iter().zip(&before).any(|(a, b)| *a != b))
    }

    /// Merges one attachment into `targets`, matched by string value. The
    /// match is scoped to `targets`; a miss creates a new attachment.
    pub fn merge_attachment<'t>(
        &mut self,
        targets: &'t mut Vec<Attachment>,
        source: &DocAttachment,
    ) -> Result<&'t mut Attachment, ReconcileError> {
        let attachment_type = self.resolve_attachment_type(source)?;

        let position = match targets
            .iter()
            .position(|target| target.string_value() == source.string_value.as_deref())
        {
            Some(position) => position,
            None => {
                self.admit_new(EntityKind::Attachment, source.external_id.as_ref())?;
                let attachment = Attachment::new(attachment_type.clone());
                self.created(&attachment, source.doc_id.as_deref())?;
                targets.push(attachment);
                targets.len() - 1
            }
        };

        let Some(attachment) = targets.get_mut(position) else {
            return Err(ReconcileError::invariant("attachment slot vanished"));
        };
        attachment.set_label(source.label.clone());
        attachment.set_string_value(source.string_value.clone());
        attachment.set_bytes_value(source.bytes_value.clone());
        attachment.set_attachment_type(attachment_type);
        Ok(attachment)
    }

    /// Session cache first, then the persisted vocabulary, then a new entry.
    fn resolve_attachment_type(
        &mut self,
        source: &DocAttachment,
    ) -> Result<AttachmentTypeRef, ReconcileError> {
        let Some(doc_type) = source.attachment_type.as_ref() else {
            return Err(ReconcileError::malformed("attachment has no type"));
        };
        let Some(doc_namespace) = doc_type.namespace.as_ref() else {
            return Err(ReconcileError::malformed(format!(
                "attachment type {:?} has no namespace",
                doc_type.label
            )));
        };
        self.resolve_namespace(&doc_namespace.label)?;

        let key = (doc_namespace.label.clone(), doc_type.label.clone());
        if let Some(cached) = self.attachment_types.get(&key) {
            return Ok(cached.to_ref());
        }

        let attachment_type = match self.dao.attachment_type_by_label(&key.0, &key.1)? {
            Some(persisted) => persisted,
            None => {
                let created = AttachmentType::new(key.0.clone(), key.1.clone());
                self.dao.make_persistent(&created.handle())?;
                self.report.count_created(EntityKind::AttachmentType);
                debug!(namespace = %key.0, label = %key.1, "created attachment type");
                created
            }
        };
        let reference = attachment_type.to_ref();
        self.attachment_types.insert(key, attachment_type);
        Ok(reference)
    }

    fn resolve_namespace(&mut self, label: &str) -> Result<(), ReconcileError> {
        if self.namespaces.contains_key(label) {
            return Ok(());
        }
        let namespace = match self.dao.namespace_by_label(label)? {
            Some(persisted) => persisted,
            None => {
                let created = AttachmentNamespace::new(label);
                self.dao.make_persistent(&created.handle())?;
                self.report.count_created(EntityKind::AttachmentNamespace);
                debug!(label, "created attachment namespace");
                created
            }
        };
        self.namespaces.insert(label.to_string(), namespace);
        Ok(())
    }
}
