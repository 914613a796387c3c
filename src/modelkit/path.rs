//! Path addressing.
//!
//! A path names an object by the id of its closest identified ancestor and the
//! child hops from there:
//!
//! ```text
//! <id:root>.child.children[1]
//! ```
//!
//! Ids must be non-empty and contain only ASCII letters, digits, `_` and `-`.
//! Hops only go through child attributes; list hops carry the element index.
//!
//! Resolution is lenient about data and strict about syntax: an unknown id or
//! a missing element resolves to `None`, a malformed path is an error.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::meta::Value;
use crate::object::Object;
use crate::tree::push_hop;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("id pattern is valid"));

static PART_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\[\]]+)(?:\[(\d+)\])?$").expect("part pattern is valid"));

pub fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}

/// Builds the path of `object`.
///
/// Fails when neither the object nor any of its ancestors has an id, or when
/// the id used is not a valid path id.
pub fn path(object: &Object) -> Result<String> {
    let chain = object.path_from_root();
    let start = chain
        .iter()
        .rposition(|o| o.id().is_some())
        .ok_or_else(|| ModelError::MissingId {
            object: object.debug_path_default(),
        })?;
    let id = chain[start].id().unwrap_or_default();
    if !is_valid_id(&id) {
        return Err(ModelError::InvalidId(id));
    }

    let mut out = format!("<id:{}>", id);
    for pair in chain[start..].windows(2) {
        push_hop(&mut out, &pair[0], &pair[1]);
    }
    Ok(out)
}

impl Object {
    /// See [`path`].
    pub fn path(&self) -> Result<String> {
        path(self)
    }
}

/// Anything that can turn a path into an object.
pub trait ReferenceResolver {
    fn resolve(&self, path: &str) -> Result<Option<Object>>;
}

/// Resolves paths against a fixed set of root trees.
///
/// The id index is built eagerly; later changes to the trees are not picked
/// up, except that hops are followed on the live objects.
#[derive(Debug, Default)]
pub struct Resolver {
    ids: HashMap<String, Object>,
}

impl Resolver {
    pub fn new<'a>(roots: impl IntoIterator<Item = &'a Object>) -> Result<Resolver> {
        let mut ids = HashMap::new();
        let mut root_count = 0;
        for root in roots {
            root_count += 1;
            let mut duplicate = None;
            root.walk(|object| {
                if let Some(id) = object.id() {
                    if ids.insert(id.clone(), object.clone()).is_some() && duplicate.is_none() {
                        duplicate = Some(id);
                    }
                }
                duplicate.is_none()
            });
            if let Some(id) = duplicate {
                return Err(ModelError::DuplicateId(id));
            }
        }
        debug!(roots = root_count, ids = ids.len(), "built resolver");
        Ok(Resolver { ids })
    }

    /// The object carrying `id`, if any.
    pub fn by_id(&self, id: &str) -> Option<&Object> {
        self.ids.get(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn resolve(&self, path: &str) -> Result<Option<Object>> {
        let malformed = |reason: String| ModelError::MalformedPath {
            path: path.to_string(),
            reason,
        };

        let mut parts = path.split('.');
        let first = parts.next().unwrap_or_default();
        let id = first
            .strip_prefix("<id:")
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| malformed(format!("'{}' is not an id segment", first)))?;

        let Some(mut current) = self.ids.get(id).cloned() else {
            return Ok(None);
        };

        for part in parts {
            let captures = PART_PATTERN
                .captures(part)
                .ok_or_else(|| malformed(format!("'{}' is not a valid segment", part)))?;
            let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let index = match captures.get(2) {
                Some(m) => Some(
                    m.as_str()
                        .parse::<usize>()
                        .map_err(|e| malformed(format!("bad index in '{}': {}", part, e)))?,
                ),
                None => None,
            };

            let class = current.class();
            let attr = class.child_attribute(name).ok_or_else(|| {
                malformed(format!("{} is not a child attribute of {}", name, class.name()))
            })?;

            let next = match (attr.is_list(), index) {
                (false, None) => current.read_unary(attr),
                (true, Some(index)) => {
                    current.with_list(attr, |items| items.get(index).cloned().unwrap_or_default())
                }
                (false, Some(_)) => {
                    return Err(malformed(format!("{} is unary but indexed", name)))
                }
                (true, None) => return Err(malformed(format!("{} is a list but has no index", name))),
            };

            match next {
                Value::Object(object) => current = object,
                _ => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

impl ReferenceResolver for Resolver {
    fn resolve(&self, path: &str) -> Result<Option<Object>> {
        Resolver::resolve(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestNode, TestRoot};
    use crate::ModelType;

    fn tree() -> (TestRoot, TestNode, TestNode) {
        let root = TestRoot::create();
        root.set_id(Some("root")).unwrap();
        let n0 = TestNode::create();
        let n1 = TestNode::create();
        root.children().push(n0.object()).unwrap();
        root.children().push(n1.object()).unwrap();
        (root, n0, n1)
    }

    #[test]
    fn test_path_tracks_index() {
        let (root, n0, n1) = tree();
        assert_eq!(n1.object().path().unwrap(), "<id:root>.children[1]");
        root.children().remove_value(&n0.object().into()).unwrap();
        assert_eq!(n1.object().path().unwrap(), "<id:root>.children[0]");
    }

    #[test]
    fn test_path_starts_at_closest_id() {
        let (root, n0, _) = tree();
        let leaf = TestNode::create();
        n0.set_id(Some("n0")).unwrap();
        n0.children().push(leaf.object()).unwrap();
        assert_eq!(leaf.object().path().unwrap(), "<id:n0>.children[0]");
        assert_eq!(root.object().path().unwrap(), "<id:root>");

        let child = TestNode::create();
        root.set_child(Some(&child)).unwrap();
        assert_eq!(child.object().path().unwrap(), "<id:root>.child");
    }

    #[test]
    fn test_path_requires_id() {
        let orphan = TestNode::create();
        assert!(matches!(orphan.object().path(), Err(ModelError::MissingId { .. })));

        orphan.set_id(Some("has space")).unwrap();
        assert!(matches!(orphan.object().path(), Err(ModelError::InvalidId(_))));
    }

    #[test]
    fn test_round_trip() {
        let (root, n0, n1) = tree();
        let leaf = TestNode::create();
        n1.children().push(leaf.object()).unwrap();
        let resolver = Resolver::new([root.object()]).unwrap();
        for object in [root.object(), n0.object(), n1.object(), leaf.object()] {
            let path = object.path().unwrap();
            assert_eq!(resolver.resolve(&path).unwrap().as_ref(), Some(object));
        }
    }

    #[test]
    fn test_soft_misses() {
        let (root, ..) = tree();
        let resolver = Resolver::new([root.object()]).unwrap();
        assert!(resolver.resolve("<id:nobody>").unwrap().is_none());
        assert!(resolver.resolve("<id:root>.children[7]").unwrap().is_none());
        assert!(resolver.resolve("<id:root>.child").unwrap().is_none());
    }

    #[test]
    fn test_malformed_paths() {
        let (root, ..) = tree();
        let resolver = Resolver::new([root.object()]).unwrap();
        for bad in [
            "",
            "root.children[0]",
            "<id:root>.children",
            "<id:root>.child[0]",
            "<id:root>.name",
            "<id:root>.children[x]",
            "<id:root>.unknown[0]",
        ] {
            assert!(
                matches!(resolver.resolve(bad), Err(ModelError::MalformedPath { .. })),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let a = TestRoot::create();
        a.set_id(Some("same")).unwrap();
        let b = TestRoot::create();
        b.set_id(Some("same")).unwrap();
        assert!(matches!(
            Resolver::new([a.object(), b.object()]),
            Err(ModelError::DuplicateId(id)) if id == "same"
        ));
    }

    #[test]
    fn test_multiple_roots() {
        let (root, n0, _) = tree();
        let other = TestRoot::create();
        other.set_id(Some("other")).unwrap();
        let resolver = Resolver::new([root.object(), other.object()]).unwrap();
        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.by_id("other"), Some(other.object()));
        assert_eq!(
            resolver.resolve("<id:root>.children[0]").unwrap().as_ref(),
            Some(n0.object())
        );
    }
}
