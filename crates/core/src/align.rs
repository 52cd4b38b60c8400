#![forbid(unsafe_code)]

use crate::error::ReconcileError;
use crate::ids::ExternalId;
use crate::model::Identified;
use std::collections::BTreeSet;

/// Incoming value that may name the persisted entity it updates.
pub trait Incoming {
    fn external_id(&self) -> Option<&ExternalId>;

    /// Document-local identifier chosen by the client.
    fn doc_id(&self) -> Option<&str>;
}

/// First item whose external id equals `id`, in iteration order.
pub fn find_by_id<'a, T: Identified>(items: &'a [T], id: &ExternalId) -> Option<&'a T> {
    items.iter().find(|item| item.external_id() == Some(id))
}

pub fn position_by_id<T: Identified>(items: &[T], id: &ExternalId) -> Option<usize> {
    items.iter().position(|item| item.external_id() == Some(id))
}

/// Result of aligning a persisted collection to an incoming one.
#[derive(Debug)]
pub struct Alignment<T> {
    /// Reused or created targets, in source order.
    pub aligned: Vec<T>,
    /// Targets no source referenced.
    pub orphaned: Vec<T>,
    /// For each aligned item, its index in the old target list, or `None`
    /// when it was created.
    pub previous_positions: Vec<Option<usize>>,
}

impl<T> Alignment<T> {
    /// Same targets in the same order as before.
    pub fn is_unchanged(&self, previous_len: usize) -> bool {
        self.orphaned.is_empty()
            && self.aligned.len() == previous_len
            && self
                .previous_positions
                .iter()
                .enumerate()
                .all(|(index, previous)| *previous == Some(index))
    }

    pub fn created(&self) -> usize {
        self.previous_positions
            .iter()
            .filter(|previous| previous.is_none())
            .count()
    }
}

/// Matches every source against `targets` by external id, reusing the first
/// match and calling `create` otherwise.
///
/// A source external id may appear at most once; sources without one always
/// produce a new target.
pub fn align_by_id<T, S, F>(
    targets: Vec<T>,
    sources: &[S],
    mut create: F,
) -> Result<Alignment<T>, ReconcileError>
where
    T: Identified,
    S: Incoming,
    F: FnMut(&S) -> Result<T, ReconcileError>,
{
    let mut seen = BTreeSet::new();
    let mut slots: Vec<Option<T>> = targets.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(sources.len());
    let mut previous_positions = Vec::with_capacity(sources.len());

    for source in sources {
        let found = match source.external_id() {
            Some(id) => {
                if !seen.insert(id.clone()) {
                    return Err(ReconcileError::malformed(format!(
                        "external id {id} appears more than once"
                    )));
                }
                position_by_id(&slots, id)
            }
            None => None,
        };

        match found {
            Some(position) => {
                let Some(target) = slots[position].take() else {
                    return Err(ReconcileError::invariant(format!(
                        "target slot {position} matched twice"
                    )));
                };
                aligned.push(target);
                previous_positions.push(Some(position));
            }
            None => {
                aligned.push(create(source)?);
                previous_positions.push(None);
            }
        }
    }

    Ok(Alignment {
        aligned,
        orphaned: slots.into_iter().flatten().collect(),
        previous_positions,
    })
}
