#![forbid(unsafe_code)]

use crate::dao::{EntityHandle, EntityKind};
use crate::ids::ExternalId;
use crate::version::Version;
use serde::{Deserialize, Serialize};

/// Identity and version bookkeeping shared by every reconcilable entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned {
    external_id: ExternalId,
    version: Option<Version>,
    #[serde(skip)]
    dirty: bool,
}

impl Versioned {
    /// A brand new entity: fresh id, no version yet, in need of one.
    pub fn fresh() -> Self {
        Self {
            external_id: ExternalId::generate(),
            version: None,
            dirty: true,
        }
    }

    pub fn persisted(external_id: ExternalId, version: Version) -> Self {
        Self {
            external_id,
            version: Some(version),
            dirty: false,
        }
    }

    pub fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Assigns `version` when the entity changed or never had one.
    /// Returns true when a version was written.
    pub(crate) fn stamp(&mut self, version: Version) -> bool {
        if !self.dirty && self.version.is_some() {
            return false;
        }
        self.version = Some(version);
        self.dirty = false;
        true
    }

    pub fn touched_in(&self, version: Version) -> bool {
        self.version == Some(version)
    }
}

/// Writes `value` into `field` and marks the owner dirty when it differs.
pub(crate) fn set_field<T: PartialEq>(meta: &mut Versioned, field: &mut T, value: T) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    meta.mark_dirty();
    true
}

/// Anything that can be matched by external id.
pub trait Identified {
    fn external_id(&self) -> Option<&ExternalId>;
}

impl Identified for ExternalId {
    fn external_id(&self) -> Option<&ExternalId> {
        Some(self)
    }
}

impl<T: Identified> Identified for Option<T> {
    fn external_id(&self) -> Option<&ExternalId> {
        self.as_ref().and_then(Identified::external_id)
    }
}

pub trait Entity: Identified {
    const KIND: EntityKind;

    fn meta(&self) -> &Versioned;

    fn meta_mut(&mut self) -> &mut Versioned;

    fn id(&self) -> &ExternalId {
        self.meta().external_id()
    }

    fn version(&self) -> Option<Version> {
        self.meta().version()
    }

    fn handle(&self) -> EntityHandle {
        EntityHandle::new(Self::KIND, self.meta())
    }
}

macro_rules! entity {
    ($ty:ty, $kind:expr) => {
        impl $crate::model::meta::Identified for $ty {
            fn external_id(&self) -> Option<&$crate::ids::ExternalId> {
                Some(self.meta.external_id())
            }
        }

        impl $crate::model::meta::Entity for $ty {
            const KIND: $crate::dao::EntityKind = $kind;

            fn meta(&self) -> &$crate::model::meta::Versioned {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::model::meta::Versioned {
                &mut self.meta
            }
        }
    };
}

pub(crate) use entity;
