#![forbid(unsafe_code)]

use super::element::Element;
use super::meta::{Entity, Identified, Versioned};
use crate::dao::EntityKind;
use crate::error::ReconcileError;
use crate::ids::ExternalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellType {
    #[default]
    Unassigned,
    Inapplicable,
    Single,
    Polymorphic,
    Uncertain,
}

impl CellType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unassigned => "UNASSIGNED",
            Self::Inapplicable => "INAPPLICABLE",
            Self::Single => "SINGLE",
            Self::Polymorphic => "POLYMORPHIC",
            Self::Uncertain => "UNCERTAIN",
        }
    }

    /// Parses a wire tag. Unknown tags cannot be produced by a well-behaved
    /// client, so they are reported as invariant violations.
    pub fn parse(value: &str) -> Result<Self, ReconcileError> {
        match value.trim() {
            "UNASSIGNED" => Ok(Self::Unassigned),
            "INAPPLICABLE" => Ok(Self::Inapplicable),
            "SINGLE" => Ok(Self::Single),
            "POLYMORPHIC" => Ok(Self::Polymorphic),
            "UNCERTAIN" => Ok(Self::Uncertain),
            other => Err(ReconcileError::invariant(format!(
                "unknown cell type {other:?}"
            ))),
        }
    }

    pub fn check_cardinality(self, count: usize) -> Result<(), CellError> {
        let ok = match self {
            Self::Unassigned | Self::Inapplicable => count == 0,
            Self::Single => count == 1,
            Self::Polymorphic | Self::Uncertain => count >= 2,
        };
        if ok {
            Ok(())
        } else {
            Err(CellError {
                cell_type: self,
                found: count,
            })
        }
    }
}

/// Element count does not fit the cell type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellError {
    pub cell_type: CellType,
    pub found: usize,
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let expected = match self.cell_type {
            CellType::Unassigned | CellType::Inapplicable => "no elements",
            CellType::Single => "exactly one element",
            CellType::Polymorphic | CellType::Uncertain => "at least two elements",
        };
        write!(
            f,
            "{} cell needs {expected}, found {}",
            self.cell_type.as_str(),
            self.found
        )
    }
}

impl std::error::Error for CellError {}

impl From<CellError> for ReconcileError {
    fn from(value: CellError) -> Self {
        Self::Malformed(value.to_string())
    }
}

/// A validated cell payload, resolved against the target matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellValue<E> {
    cell_type: CellType,
    elements: BTreeSet<E>,
    lower_case: bool,
}

impl<E: Element> CellValue<E> {
    pub fn new(
        cell_type: CellType,
        elements: BTreeSet<E>,
        lower_case: bool,
    ) -> Result<Self, CellError> {
        cell_type.check_cardinality(elements.len())?;
        let lower_case = lower_case && cell_type == CellType::Single;
        Ok(Self {
            cell_type,
            elements,
            lower_case,
        })
    }

    pub fn unassigned() -> Self {
        Self {
            cell_type: CellType::Unassigned,
            elements: BTreeSet::new(),
            lower_case: false,
        }
    }

    pub fn inapplicable() -> Self {
        Self {
            cell_type: CellType::Inapplicable,
            elements: BTreeSet::new(),
            lower_case: false,
        }
    }

    pub fn single(element: E, lower_case: bool) -> Self {
        Self {
            cell_type: CellType::Single,
            elements: BTreeSet::from([element]),
            lower_case,
        }
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn elements(&self) -> &BTreeSet<E> {
        &self.elements
    }

    pub fn lower_case(&self) -> bool {
        self.lower_case
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell<E: Ord> {
    pub(crate) meta: Versioned,
    cell_type: CellType,
    elements: BTreeSet<E>,
    #[serde(default)]
    lower_case: bool,
}

impl<E: Element> Identified for Cell<E> {
    fn external_id(&self) -> Option<&ExternalId> {
        Some(self.meta.external_id())
    }
}

impl<E: Element> Entity for Cell<E> {
    const KIND: EntityKind = EntityKind::Cell;

    fn meta(&self) -> &Versioned {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Versioned {
        &mut self.meta
    }
}

impl<E: Element> Default for Cell<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element> Cell<E> {
    /// A new, unassigned cell.
    pub fn new() -> Self {
        Self {
            meta: Versioned::fresh(),
            cell_type: CellType::Unassigned,
            elements: BTreeSet::new(),
            lower_case: false,
        }
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn elements(&self) -> &BTreeSet<E> {
        &self.elements
    }

    pub fn lower_case(&self) -> bool {
        self.lower_case
    }

    pub fn value(&self) -> CellValue<E> {
        CellValue {
            cell_type: self.cell_type,
            elements: self.elements.clone(),
            lower_case: self.lower_case,
        }
    }

    pub fn set_unassigned(&mut self) -> bool {
        self.replace(CellType::Unassigned, BTreeSet::new(), false)
    }

    pub fn set_inapplicable(&mut self) -> bool {
        self.replace(CellType::Inapplicable, BTreeSet::new(), false)
    }

    pub fn set_single(&mut self, element: E, lower_case: bool) -> bool {
        self.replace(CellType::Single, BTreeSet::from([element]), lower_case)
    }

    pub fn set_polymorphic(&mut self, elements: BTreeSet<E>) -> Result<bool, CellError> {
        CellType::Polymorphic.check_cardinality(elements.len())?;
        Ok(self.replace(CellType::Polymorphic, elements, false))
    }

    pub fn set_uncertain(&mut self, elements: BTreeSet<E>) -> Result<bool, CellError> {
        CellType::Uncertain.check_cardinality(elements.len())?;
        Ok(self.replace(CellType::Uncertain, elements, false))
    }

    /// Applies an already validated value. Returns true when the cell changed.
    pub fn set_value(&mut self, value: &CellValue<E>) -> bool {
        if self.value() == *value {
            return false;
        }
        self.replace(value.cell_type, value.elements.clone(), value.lower_case)
    }

    fn replace(&mut self, cell_type: CellType, elements: BTreeSet<E>, lower_case: bool) -> bool {
        if self.cell_type == cell_type && self.elements == elements && self.lower_case == lower_case
        {
            return false;
        }
        self.cell_type = cell_type;
        self.elements = elements;
        self.lower_case = lower_case;
        self.meta.mark_dirty();
        true
    }
}
