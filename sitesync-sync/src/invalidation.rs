//! Invalidation minimizer.
//!
//! Given the keys whose cached copies are stale, compute the fewest
//! invalidation patterns (exact keys or prefix wildcards) that cover all of
//! them. Every pattern costs one unit of the CDN's invalidation quota, so a
//! wildcard over a directory is preferred whenever it replaces two or more
//! narrower patterns, even though it also purges unchanged siblings.
//!
//! ## Algorithm
//!
//! 1. Insert every key into a trie of path segments; mark the terminal node.
//! 2. Post-order, for every node pick the cheaper of
//!    - *collapse*: one wildcard at the node (cost 1), or
//!    - *expand*: the children's best covers, plus one exact pattern when the
//!      node is itself a changed key.
//!
//!    Collapse must be strictly cheaper to win; on a tie the narrower expand
//!    result is kept, so a lone file stays an exact pattern.
//! 3. The root is never collapsed. The result is the concatenation of each
//!    top-level subtree's cover, in first-encountered order.

use std::collections::HashMap;

use sitesync_core::{InvalidationPattern, ObjectKey};

// ---------------------------------------------------------------------------
// Trie
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Children {
    nodes: Vec<TrieNode>,
    by_segment: HashMap<String, usize>,
}

impl Children {
    fn get_or_insert(&mut self, key: ObjectKey) -> &mut TrieNode {
        let idx = match self.by_segment.get(key.file_name()) {
            Some(&idx) => idx,
            None => {
                let idx = self.nodes.len();
                self.by_segment.insert(key.file_name().to_owned(), idx);
                self.nodes.push(TrieNode::new(key));
                idx
            }
        };
        &mut self.nodes[idx]
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug)]
struct TrieNode {
    /// Full path from the root to this node.
    key: ObjectKey,
    children: Children,
    is_changed_leaf: bool,
}

impl TrieNode {
    fn new(key: ObjectKey) -> Self {
        Self {
            key,
            children: Children::default(),
            is_changed_leaf: false,
        }
    }
}

fn build_trie<'a>(keys: impl IntoIterator<Item = &'a ObjectKey>) -> Children {
    let mut root = Children::default();
    for key in keys {
        let mut prefixes = key.prefixes();
        let Some(first) = prefixes.next() else {
            continue;
        };
        let mut node = root.get_or_insert(first);
        for prefix in prefixes {
            node = node.children.get_or_insert(prefix);
        }
        node.is_changed_leaf = true;
    }
    root
}

// ---------------------------------------------------------------------------
// Bottom-up cover
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Cover {
    cost: usize,
    patterns: Vec<InvalidationPattern>,
}

impl Cover {
    fn single(pattern: InvalidationPattern) -> Self {
        Self {
            cost: 1,
            patterns: vec![pattern],
        }
    }

    fn absorb(&mut self, other: Cover) {
        self.cost += other.cost;
        self.patterns.extend(other.patterns);
    }
}

fn cover(node: &TrieNode) -> Cover {
    if node.children.is_empty() {
        return Cover::single(InvalidationPattern::Exact(node.key.clone()));
    }

    let mut expand = Cover::default();
    if node.is_changed_leaf {
        // A wildcard below this node cannot reach the node's own object.
        expand.absorb(Cover::single(InvalidationPattern::Exact(node.key.clone())));
    }
    for child in &node.children.nodes {
        expand.absorb(cover(child));
    }

    const COLLAPSE_COST: usize = 1;
    if COLLAPSE_COST < expand.cost {
        Cover::single(InvalidationPattern::Wildcard {
            prefix: node.key.clone(),
            includes_prefix_object: node.is_changed_leaf,
        })
    } else {
        expand
    }
}

/// Smallest set of patterns covering every key in `keys`.
///
/// Duplicate keys are ignored. An empty input yields an empty result; callers
/// should skip invalidation entirely in that case. The output order follows
/// the first appearance of each top-level subtree in `keys`, so equal inputs
/// always produce identical outputs.
pub fn minimize<'a, I>(keys: I) -> Vec<InvalidationPattern>
where
    I: IntoIterator<Item = &'a ObjectKey>,
{
    let root = build_trie(keys);
    let mut total = Cover::default();
    for top in &root.nodes {
        total.absorb(cover(top));
    }
    tracing::debug!(
        "minimized invalidation to {} pattern(s) across {} top-level prefix(es)",
        total.cost,
        root.nodes.len()
    );
    total.patterns
}

/// Whether at least one of `patterns` covers `key`.
pub fn is_covered(patterns: &[InvalidationPattern], key: &ObjectKey) -> bool {
    patterns.iter().any(|p| p.covers(key))
}

// ---------------------------------------------------------------------------
// CDN paths
// ---------------------------------------------------------------------------

/// Render a pattern as a CDN invalidation path (leading `/`).
///
/// An exact key naming the index document is invalidated through its
/// directory URL (`docs/index.html` → `/docs/`, `index.html` → `/`). A
/// wildcard whose prefix is itself a changed object drops the separator so
/// the prefix object is purged too (`/docs*`).
pub fn cdn_path(pattern: &InvalidationPattern, index_document: Option<&str>) -> String {
    match pattern {
        InvalidationPattern::Exact(key) => match index_document {
            Some(index) if key.file_name() == index => match key.parent() {
                Some(parent) => format!("/{parent}/"),
                None => "/".to_string(),
            },
            _ => format!("/{key}"),
        },
        InvalidationPattern::Wildcard {
            prefix,
            includes_prefix_object: true,
        } => format!("/{prefix}*"),
        InvalidationPattern::Wildcard { prefix, .. } => format!("/{prefix}/*"),
    }
}

/// Split rendered paths into request-sized batches. A `size` of zero is
/// treated as one.
pub fn batches(paths: &[String], size: usize) -> Vec<Vec<String>> {
    paths.chunks(size.max(1)).map(<[String]>::to_vec).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<ObjectKey> {
        raw.iter().map(|k| ObjectKey::parse(k).unwrap()).collect()
    }

    fn rendered(raw: &[&str]) -> Vec<String> {
        minimize(&keys(raw)).iter().map(ToString::to_string).collect()
    }

    #[test]
    fn single_root_file_is_exact() {
        assert_eq!(rendered(&["index.html"]), ["index.html"]);
    }

    #[test]
    fn two_siblings_collapse() {
        assert_eq!(rendered(&["assets/a.js", "assets/b.js"]), ["assets/*"]);
    }

    #[test]
    fn lone_nested_file_is_not_widened() {
        assert_eq!(rendered(&["assets/a.js"]), ["assets/a.js"]);
        assert_eq!(rendered(&["a/b/c/d.txt"]), ["a/b/c/d.txt"]);
    }

    #[test]
    fn independent_top_level_subtrees_stay_separate() {
        assert_eq!(
            rendered(&["css/a.css", "img/b.png"]),
            ["css/a.css", "img/b.png"]
        );
    }

    #[test]
    fn root_is_never_collapsed() {
        let out = rendered(&["a.html", "b.html", "c.html"]);
        assert_eq!(out, ["a.html", "b.html", "c.html"]);
    }

    #[test]
    fn collapse_happens_at_deepest_branching_point() {
        let out = rendered(&["blog/2024/a.html", "blog/2024/b.html"]);
        assert_eq!(out, ["blog/2024/*"]);
    }

    #[test]
    fn collapse_bubbles_up_when_siblings_also_change() {
        let out = rendered(&[
            "blog/2024/a.html",
            "blog/2024/b.html",
            "blog/2023/c.html",
        ]);
        assert_eq!(out, ["blog/*"]);
    }

    #[test]
    fn changed_prefix_object_with_children_collapses_inclusively() {
        let patterns = minimize(&keys(&["docs", "docs/intro.html"]));
        assert_eq!(
            patterns,
            vec![InvalidationPattern::Wildcard {
                prefix: ObjectKey::parse("docs").unwrap(),
                includes_prefix_object: true,
            }]
        );
    }

    #[test]
    fn duplicates_are_ignored() {
        assert_eq!(rendered(&["index.html", "index.html"]), ["index.html"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(minimize(&Vec::<ObjectKey>::new()).is_empty());
    }

    #[test]
    fn output_follows_first_encountered_order() {
        let out = rendered(&["z.html", "assets/a.js", "assets/b.js", "b.html"]);
        assert_eq!(out, ["z.html", "assets/*", "b.html"]);
    }

    #[test]
    fn every_key_is_covered() {
        let input = keys(&[
            "index.html",
            "assets/app.js",
            "assets/img/a.png",
            "assets/img/b.png",
            "about/team.html",
        ]);
        let patterns = minimize(&input);
        for key in &input {
            assert!(is_covered(&patterns, key), "{key} not covered");
        }
        assert_eq!(patterns.len(), 3);
    }

    #[test]
    fn cdn_paths_render_exact_and_wildcards() {
        let k = |s: &str| ObjectKey::parse(s).unwrap();
        assert_eq!(
            cdn_path(&InvalidationPattern::Exact(k("css/main.css")), None),
            "/css/main.css"
        );
        assert_eq!(
            cdn_path(
                &InvalidationPattern::Wildcard {
                    prefix: k("assets"),
                    includes_prefix_object: false
                },
                None
            ),
            "/assets/*"
        );
        assert_eq!(
            cdn_path(
                &InvalidationPattern::Wildcard {
                    prefix: k("docs"),
                    includes_prefix_object: true
                },
                None
            ),
            "/docs*"
        );
    }

    #[test]
    fn cdn_paths_map_index_documents_to_directories() {
        let k = |s: &str| ObjectKey::parse(s).unwrap();
        let index = Some("index.html");
        assert_eq!(cdn_path(&InvalidationPattern::Exact(k("index.html")), index), "/");
        assert_eq!(
            cdn_path(&InvalidationPattern::Exact(k("blog/index.html")), index),
            "/blog/"
        );
        assert_eq!(
            cdn_path(&InvalidationPattern::Exact(k("blog/post.html")), index),
            "/blog/post.html"
        );
    }

    #[test]
    fn batches_split_by_size() {
        let paths: Vec<String> = (0..5).map(|i| format!("/{i}")).collect();
        let b = batches(&paths, 2);
        assert_eq!(b.len(), 3);
        assert_eq!(b[2], vec!["/4".to_string()]);
        assert_eq!(batches(&paths, 0).len(), 5);
        assert!(batches(&[], 10).is_empty());
    }
}
