//! Project document merging
//!
//! Folds a freshly generated document into an existing one of the same
//! shape. The existing node's kind picks the strategy:
//! - Mapping + Mapping: recurse on shared keys, append new keys
//! - Sequence + Sequence: append
//! - Scalar + Scalar: overwrite
//!
//! Any other combination is a [`ConvertError::SchemaMismatch`].

use crate::error::ConvertError;
use crate::node::{Node, NodeKind, child_path};

/// Merge `additive` into `existing` in place.
pub fn merge(existing: &mut Node, additive: Node) -> Result<(), ConvertError> {
    merge_at(existing, additive, "")
}

fn merge_at(existing: &mut Node, additive: Node, path: &str) -> Result<(), ConvertError> {
    match (&mut existing.kind, additive.kind) {
        (NodeKind::Mapping(base), NodeKind::Mapping(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(current) => merge_at(current, value, &child_path(path, &key))?,
                    None => base.push_unchecked(key, value),
                }
            }
            Ok(())
        }
        (NodeKind::Sequence(base), NodeKind::Sequence(layer)) => {
            // No deduplication: translated declarations are removed from the
            // legacy manifest, so they are never generated twice.
            base.extend(layer);
            Ok(())
        }
        (NodeKind::Scalar(base), NodeKind::Scalar(layer)) => {
            *base = layer;
            Ok(())
        }
        (base, layer) => Err(ConvertError::SchemaMismatch {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.to_string()
            },
            existing: base.name(),
            additive: layer.name(),
        }),
    }
}
