#![forbid(unsafe_code)]

use super::Reconciler;
use crate::doc::{DocOtu, DocTree, DocTreeSet};
use crate::error::ReconcileError;
use crate::model::{Entity, Otu, Tree, TreeSet};
use tracing::warn;

impl Reconciler<'_> {
    pub fn reconcile_tree_set(
        &mut self,
        source_otus: &[DocOtu],
        otus: &[Otu],
        tree_set: &mut TreeSet,
        source: &DocTreeSet,
    ) -> Result<(), ReconcileError> {
        tree_set.set_label(source.label.clone());

        let (changed, orphaned) = self.align_owned(&mut tree_set.trees, &source.trees, |doc: &DocTree| {
            Tree::new(doc.label.clone())
        })?;
        for tree in &orphaned {
            self.orphan(tree)?;
        }
        if changed {
            tree_set.meta.mark_dirty();
        }

        for (tree, doc) in tree_set.trees.iter_mut().zip(&source.trees) {
            tree.set_label(doc.label.clone());
            tree.set_newick(rewrite_newick(&doc.newick, source_otus, otus)?);
            if self.merge_attachments(&mut tree.attachments, &doc.attachments)? {
                tree.meta.mark_dirty();
            }
        }

        if self.merge_attachments(&mut tree_set.attachments, &source.attachments)? {
            tree_set.meta.mark_dirty();
        }
        Ok(())
    }
}

/// Replaces every source OTU's textual id in `newick` with the external id
/// of the OTU at the same position in `otus`.
///
/// Plain substring replacement: an id must not occur inside another token.
pub fn rewrite_newick(
    newick: &str,
    source_otus: &[DocOtu],
    otus: &[Otu],
) -> Result<String, ReconcileError> {
    if source_otus.len() != otus.len() {
        return Err(ReconcileError::malformed(format!(
            "tree references {} source OTUs but the OTU set has {}",
            source_otus.len(),
            otus.len()
        )));
    }

    let mut rewritten = newick.to_string();
    for (source, target) in source_otus.iter().zip(otus) {
        match source.doc_id.as_deref() {
            Some(doc_id) if !doc_id.is_empty() => {
                rewritten = rewritten.replace(doc_id, target.id().as_str());
            }
            _ => warn!(
                otu = target.label(),
                "OTU has no textual id; its Newick references are left as is"
            ),
        }
    }
    Ok(rewritten)
}
