//! Detection of replies whose parent annotation no longer exists.
//!
//! A reply is kept when its `target.source` names an annotation in the same
//! set, by store id or by viewer id. Detection only sees the rows it is
//! given, so callers must pass the whole document, not a single page.

use std::collections::HashSet;

use crate::annotation::Annotation;
use crate::types::StoreId;

/// Store ids of replies whose parent is absent from `annotations`.
///
/// Order follows the input.
pub fn find_orphans(annotations: &[Annotation]) -> Vec<StoreId> {
    let known: HashSet<&str> = annotations
        .iter()
        .flat_map(|a| [a.annotation_id.as_str(), a.viewer_id()])
        .collect();

    annotations
        .iter()
        .filter(|a| a.reply_parent().is_some_and(|parent| !known.contains(parent)))
        .map(|a| a.annotation_id.clone())
        .collect()
}

/// Like [`find_orphans`], but keeps going until no reply is left dangling:
/// once an orphan is removed, replies to it are orphans too.
pub fn find_orphans_transitive(annotations: &[Annotation]) -> Vec<StoreId> {
    let mut remaining: Vec<Annotation> = annotations.to_vec();
    let mut orphans = Vec::new();

    loop {
        let round = find_orphans(&remaining);
        if round.is_empty() {
            return orphans;
        }
        let removed: HashSet<&str> = round.iter().map(String::as_str).collect();
        remaining.retain(|a| !removed.contains(a.annotation_id.as_str()));
        orphans.extend(round);
    }
}

/// Split rows into those to keep and the store ids of orphaned replies.
pub fn partition_orphans(annotations: Vec<Annotation>) -> (Vec<Annotation>, Vec<StoreId>) {
    let orphans = find_orphans_transitive(&annotations);
    if orphans.is_empty() {
        return (annotations, orphans);
    }

    let dropped: HashSet<&str> = orphans.iter().map(String::as_str).collect();
    let kept = annotations
        .into_iter()
        .filter(|a| !dropped.contains(a.annotation_id.as_str()))
        .collect();
    (kept, orphans)
}
