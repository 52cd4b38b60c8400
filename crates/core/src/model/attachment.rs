#![forbid(unsafe_code)]

use super::meta::{Versioned, entity, set_field};
use crate::dao::EntityKind;
use crate::ids::ExternalId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentNamespace {
    pub(crate) meta: Versioned,
    label: String,
}

entity!(AttachmentNamespace, EntityKind::AttachmentNamespace);

impl AttachmentNamespace {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: label.into(),
        }
    }

    pub fn from_parts(meta: Versioned, label: String) -> Self {
        Self { meta, label }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentType {
    pub(crate) meta: Versioned,
    namespace: String,
    label: String,
}

entity!(AttachmentType, EntityKind::AttachmentType);

impl AttachmentType {
    pub fn new(namespace: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            meta: Versioned::fresh(),
            namespace: namespace.into(),
            label: label.into(),
        }
    }

    pub fn from_parts(meta: Versioned, namespace: String, label: String) -> Self {
        Self {
            meta,
            namespace,
            label,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn to_ref(&self) -> AttachmentTypeRef {
        AttachmentTypeRef {
            external_id: self.meta.external_id().clone(),
            namespace: self.namespace.clone(),
            label: self.label.clone(),
        }
    }
}

/// Denormalized pointer from an attachment to its vocabulary entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentTypeRef {
    pub external_id: ExternalId,
    pub namespace: String,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub(crate) meta: Versioned,
    label: Option<String>,
    string_value: Option<String>,
    bytes_value: Option<Vec<u8>>,
    attachment_type: AttachmentTypeRef,
}

entity!(Attachment, EntityKind::Attachment);

impl Attachment {
    pub fn new(attachment_type: AttachmentTypeRef) -> Self {
        Self {
            meta: Versioned::fresh(),
            label: None,
            string_value: None,
            bytes_value: None,
            attachment_type,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn string_value(&self) -> Option<&str> {
        self.string_value.as_deref()
    }

    pub fn bytes_value(&self) -> Option<&[u8]> {
        self.bytes_value.as_deref()
    }

    pub fn attachment_type(&self) -> &AttachmentTypeRef {
        &self.attachment_type
    }

    pub fn set_label(&mut self, label: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.label, label)
    }

    pub fn set_string_value(&mut self, value: Option<String>) -> bool {
        set_field(&mut self.meta, &mut self.string_value, value)
    }

    pub fn set_bytes_value(&mut self, value: Option<Vec<u8>>) -> bool {
        set_field(&mut self.meta, &mut self.bytes_value, value)
    }

    pub fn set_attachment_type(&mut self, value: AttachmentTypeRef) -> bool {
        set_field(&mut self.meta, &mut self.attachment_type, value)
    }
}
