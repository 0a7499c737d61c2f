//! Integration tests for the flattened-text cache
//!
//! Random mutation sequences are replayed through the public API and every
//! node's cached text is compared with a naive recursive flattening of the
//! same tree.

use doc_tree::{NodeId, Presentation, TreeConfig, TreeError, XmlProperty};
use proptest::prelude::*;

const WORDS: &[&str] = &["Hello ", "World", "", "α", "שלום", " ", "x"];

/// Text a node contributes on its own, computed without the cache
fn naive_own(pres: &Presentation, id: NodeId) -> Option<String> {
    if let Some(media) = pres.text_media(id) {
        if !media.text.is_empty() {
            return Some(media.text.clone());
        }
    }
    if !pres.config().accept_image_alt_text || pres.child_count(id) > 0 {
        return None;
    }
    let xml = pres.get_property::<XmlProperty>(id)?;
    let value = |name: &str| {
        xml.attribute_value(name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let special = match xml.local_name.to_ascii_lowercase().as_str() {
        "img" | "video" => value("alt"),
        "math" => value("alttext").or_else(|| value("alt")),
        _ => None,
    };
    special.or_else(|| value("title"))
}

fn naive_flatten(pres: &Presentation, id: NodeId) -> Option<String> {
    if let Some(own) = naive_own(pres, id) {
        return Some(own);
    }
    let parts: Vec<String> = pres
        .children(id)
        .iter()
        .filter_map(|c| naive_flatten(pres, *c))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.concat())
    }
}

fn assert_cache_matches(pres: &Presentation, nodes: &[NodeId]) {
    for id in nodes {
        assert_eq!(
            pres.get_text_flattened(*id),
            naive_flatten(pres, *id),
            "flattened text of {} differs from a full walk",
            id
        );
        if pres.parent_of(*id).is_none() {
            pres.check_text_cache(*id).unwrap();
        }
    }
}

fn verified() -> Presentation {
    Presentation::with_config(TreeConfig {
        verify_text_cache: true,
        ..TreeConfig::default()
    })
}

/// Create one node of a kind picked by `kind`
fn make_node(pres: &mut Presentation, kind: u8, word: usize) -> NodeId {
    let word = WORDS[word % WORDS.len()];
    match kind % 7 {
        0 => pres.create_text_node(word),
        1 => pres.create_element("p"),
        2 => {
            let id = pres.create_element("img");
            pres.set_xml_attribute(id, "alt", word).unwrap();
            id
        }
        3 => {
            let id = pres.create_element("abbr");
            pres.set_xml_attribute(id, "title", word).unwrap();
            id
        }
        4 => pres.create_element("section"),
        5 => {
            let id = pres.create_element("math");
            pres.set_xml_attribute(id, "alttext", word).unwrap();
            id
        }
        _ => {
            let id = pres.create_element("span");
            pres.set_text(id, word).unwrap();
            id
        }
    }
}

/// Build a tree under a fresh `body` from (parent choice, kind, word) triples
fn build_tree(pres: &mut Presentation, layout: &[(usize, u8, usize)]) -> Vec<NodeId> {
    let body = pres.create_element("body");
    let mut nodes = vec![body];
    for (parent, kind, word) in layout {
        let id = make_node(pres, *kind, *word);
        let parent = nodes[parent % nodes.len()];
        let index = pres.child_count(parent);
        pres.insert(parent, id, index).unwrap();
        nodes.push(id);
    }
    nodes
}

fn tree_strategy() -> impl Strategy<Value = Vec<(usize, u8, usize)>> {
    prop::collection::vec((any::<usize>(), any::<u8>(), any::<usize>()), 1..20)
}

#[derive(Debug, Clone)]
enum Op {
    Insert { parent: usize, index: usize, kind: u8, word: usize },
    Remove { parent: usize, index: usize },
    Reattach { node: usize, parent: usize, index: usize },
    Replace { parent: usize, index: usize, kind: u8, word: usize },
    Swap { a: usize, b: usize },
    Split { node: usize, index: usize, copy: bool },
    AppendChildrenOf { a: usize, b: usize },
    SetText { node: usize, word: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), any::<usize>(), any::<u8>(), any::<usize>())
            .prop_map(|(parent, index, kind, word)| Op::Insert { parent, index, kind, word }),
        (any::<usize>(), any::<usize>()).prop_map(|(parent, index)| Op::Remove { parent, index }),
        (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(node, parent, index)| Op::Reattach { node, parent, index }),
        (any::<usize>(), any::<usize>(), any::<u8>(), any::<usize>())
            .prop_map(|(parent, index, kind, word)| Op::Replace { parent, index, kind, word }),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap { a, b }),
        (any::<usize>(), any::<usize>(), any::<bool>())
            .prop_map(|(node, index, copy)| Op::Split { node, index, copy }),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AppendChildrenOf { a, b }),
        (any::<usize>(), any::<usize>()).prop_map(|(node, word)| Op::SetText { node, word }),
    ]
}

fn pick_from(nodes: &[NodeId], i: usize) -> NodeId {
    nodes[i % nodes.len()]
}

/// Apply one operation; precondition failures are expected and ignored
fn apply(pres: &mut Presentation, nodes: &mut Vec<NodeId>, op: &Op) {
    match op.clone() {
        Op::Insert { parent, index, kind, word } => {
            let parent = pick_from(nodes, parent);
            let id = make_node(pres, kind, word);
            let index = index % (pres.child_count(parent) + 1);
            pres.insert(parent, id, index).unwrap();
            nodes.push(id);
        }
        Op::Remove { parent, index } => {
            let parent = pick_from(nodes, parent);
            let len = pres.child_count(parent);
            if len > 0 {
                pres.remove_child_at(parent, index % len).unwrap();
            }
        }
        Op::Reattach { node, parent, index } => {
            let (node, parent) = (pick_from(nodes, node), pick_from(nodes, parent));
            let index = index % (pres.child_count(parent) + 1);
            let _ = pres.insert(parent, node, index);
        }
        Op::Replace { parent, index, kind, word } => {
            let parent = pick_from(nodes, parent);
            let len = pres.child_count(parent);
            if len > 0 {
                let id = make_node(pres, kind, word);
                pres.replace_child_at(parent, id, index % len).unwrap();
                nodes.push(id);
            }
        }
        Op::Swap { a, b } => {
            let _ = pres.swap_with(pick_from(nodes, a), pick_from(nodes, b));
        }
        Op::Split { node, index, copy } => {
            let node = pick_from(nodes, node);
            let len = pres.child_count(node);
            if len > 0 {
                let tail = pres.split_children(node, index % len, copy).unwrap();
                nodes.push(tail);
            }
        }
        Op::AppendChildrenOf { a, b } => {
            let _ = pres.append_children_of(pick_from(nodes, a), pick_from(nodes, b));
        }
        Op::SetText { node, word } => {
            pres.set_text(pick_from(nodes, node), WORDS[word % WORDS.len()]).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn flattened_text_matches_full_walk(
        layout in tree_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let mut pres = verified();
        let mut nodes = build_tree(&mut pres, &layout);
        assert_cache_matches(&pres, &nodes);

        for op in &ops {
            apply(&mut pres, &mut nodes, op);
            assert_cache_matches(&pres, &nodes);
        }
    }

    #[test]
    fn flattened_text_matches_without_alt_text(
        layout in tree_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..20),
    ) {
        let mut pres = Presentation::with_config(TreeConfig {
            accept_image_alt_text: false,
            verify_text_cache: true,
        });
        let mut nodes = build_tree(&mut pres, &layout);
        for op in &ops {
            apply(&mut pres, &mut nodes, op);
        }
        assert_cache_matches(&pres, &nodes);

        pres.set_config(TreeConfig::default());
        assert_cache_matches(&pres, &nodes);
    }

    #[test]
    fn remove_then_reinsert_restores_tree(layout in tree_strategy(), pick in any::<usize>()) {
        let mut pres = verified();
        let nodes = build_tree(&mut pres, &layout);
        let body = nodes[0];
        let node = nodes[1 + pick % (nodes.len() - 1)];
        let parent = pres.parent_of(node).unwrap();
        let index = pres.index_in_parent(node).unwrap();

        let ancestors: Vec<NodeId> = pres.ancestors(node).collect();
        let before_text: Vec<Option<String>> =
            ancestors.iter().map(|a| pres.get_text_flattened(*a)).collect();
        let before = pres.snapshot(body).unwrap();

        let removed = pres.remove_child_at(parent, index).unwrap();
        prop_assert_eq!(removed, node);
        pres.insert(parent, node, index).unwrap();

        let after_text: Vec<Option<String>> =
            ancestors.iter().map(|a| pres.get_text_flattened(*a)).collect();
        prop_assert_eq!(before_text, after_text);
        prop_assert_eq!(before, pres.snapshot(body).unwrap());
        prop_assert_eq!(pres.children(parent)[index], node);
        pres.check_text_cache(body).unwrap();
    }

    #[test]
    fn document_order_is_transitive(layout in tree_strategy()) {
        let mut pres = Presentation::new();
        let nodes = build_tree(&mut pres, &layout);

        for a in &nodes {
            for b in &nodes {
                if !pres.is_before(*a, *b).unwrap() {
                    continue;
                }
                prop_assert!(pres.is_after(*b, *a).unwrap());
                for c in &nodes {
                    if pres.is_before(*b, *c).unwrap() {
                        prop_assert!(pres.is_before(*a, *c).unwrap());
                    }
                }
            }
        }
    }

    #[test]
    fn rejected_relationship_calls_change_nothing(layout in tree_strategy(), pick in any::<usize>()) {
        let mut pres = verified();
        let nodes = build_tree(&mut pres, &layout);
        let body = nodes[0];
        let node = nodes[pick % nodes.len()];
        let before = pres.snapshot(body).unwrap();
        let before_text = pres.get_text_flattened(body);

        let mut related = vec![node];
        related.extend(pres.ancestors(node));
        related.extend(pres.descendants(node));

        for other in related {
            let swapped = pres.swap_with(node, other);
            prop_assert!(matches!(
                swapped,
                Err(TreeError::NodeIsSelf(_) | TreeError::NodeIsAncestor(_) | TreeError::NodeIsDescendant(_))
            ));
            let appended = pres.append_children_of(node, other);
            prop_assert!(appended.is_err());
            prop_assert_eq!(&before, &pres.snapshot(body).unwrap());
            prop_assert_eq!(&before_text, &pres.get_text_flattened(body));
        }
    }
}

#[test]
fn test_hello_world_scenario() {
    let mut pres = verified();
    let root = pres.create_node();
    let a = pres.create_text_node("Hello ");
    let b = pres.create_text_node("World");
    pres.append_child(root, a).unwrap();
    pres.append_child(root, b).unwrap();
    assert_eq!(pres.get_text_flattened(root).as_deref(), Some("Hello World"));

    let a_chunk = pres.get_text_chunk(a).unwrap();
    let b_chunk = pres.get_text_chunk(b).unwrap();

    pres.remove_child(root, a).unwrap();
    assert_eq!(pres.get_text_flattened(root).as_deref(), Some("World"));
    assert_eq!(pres.chunk(b_chunk).unwrap().previous, None);

    pres.insert(root, a, 0).unwrap();
    assert_eq!(pres.get_text_flattened(root).as_deref(), Some("Hello World"));
    assert_eq!(pres.chunk(a_chunk).unwrap().next, Some(b_chunk));
    assert_eq!(pres.chunk(b_chunk).unwrap().previous, Some(a_chunk));
    assert_eq!(pres.text_chunks(root), vec![a_chunk, b_chunk]);
}

#[test]
fn test_img_alt_scenario() {
    let mut pres = verified();
    let img = pres.create_element("img");
    pres.set_xml_attribute(img, "alt", "A cat").unwrap();

    let chunk = pres.get_text_chunk(img).unwrap();
    assert_eq!(pres.chunk_text(chunk), Some("A cat"));

    let child = pres.create_node();
    pres.append_child(img, child).unwrap();
    assert!(pres.get_text_chunk(img).is_none());
}

#[test]
fn test_deep_subtree_moves_as_one_range() {
    let mut pres = verified();
    let nodes = build_tree(
        &mut pres,
        &[(0, 1, 0), (1, 0, 0), (1, 0, 1), (0, 4, 0), (4, 0, 3), (4, 2, 6)],
    );
    let body = nodes[0];
    assert_eq!(pres.get_text_flattened(body).as_deref(), Some("Hello Worldαx"));

    let section = nodes[4];
    let paragraph = nodes[1];
    pres.swap_with(section, paragraph).unwrap();
    assert_eq!(pres.get_text_flattened(body).as_deref(), Some("αxHello World"));
    assert_eq!(pres.first_descendant_with_text(body), Some(nodes[5]));
    assert_eq!(pres.last_descendant_with_text(body), Some(nodes[3]));
    assert_cache_matches(&pres, &nodes);
}
