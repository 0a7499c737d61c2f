//! Navigation and query helpers
//!
//! Read-only walks over the node arena. Queries that depend on text use the
//! cached chunk ranges; document-order comparison is the one query that
//! walks the whole tree.

use crate::{ChannelType, NodeId, Presentation, Result, TreeError, XmlProperty};

/// Depth-first visitor driven by [`Presentation::accept_depth_first`]
pub trait TreeVisitor {
    /// Called before a node's children. Returning `false` skips them.
    fn pre_visit(&mut self, pres: &Presentation, node: NodeId) -> bool;

    /// Called after a node's children, whether or not they were visited
    fn post_visit(&mut self, _pres: &Presentation, _node: NodeId) {}
}

impl Presentation {
    // ========== Structure ==========

    /// Topmost ancestor, or the node itself when it has no parent
    pub fn root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        current
    }

    /// Number of ancestors
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Ancestors from the parent upward
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent_of(id), move |n| self.parent_of(*n))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    /// Index of `child` in `parent`'s child list
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Index of a node within its own parent
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        self.index_of(self.parent_of(id)?, id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let index = self.index_of(parent, id)?;
        index.checked_sub(1).and_then(|i| self.child(parent, i))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let index = self.index_of(parent, id)?;
        self.child(parent, index + 1)
    }

    /// Whether `ancestor` is a proper ancestor of `node`
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether `node` is a proper descendant of `ancestor`
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.is_ancestor_of(ancestor, node)
    }

    /// Distinct nodes sharing a parent
    pub fn is_sibling_of(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.parent_of(a).is_some() && self.parent_of(a) == self.parent_of(b)
    }

    /// All proper descendants in preorder
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Run a visitor over the subtree rooted at `id`
    pub fn accept_depth_first<V: TreeVisitor + ?Sized>(&self, id: NodeId, visitor: &mut V) {
        if visitor.pre_visit(self, id) {
            for child in self.children(id) {
                self.accept_depth_first(*child, visitor);
            }
        }
        visitor.post_visit(self, id);
    }

    // ========== Document order ==========

    /// Whichever of `a` and `b` a preorder walk from their shared root
    /// reaches first
    pub fn meet_first(&self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Ok(a);
        }
        let root = self.root(a);
        if root != self.root(b) {
            return Err(TreeError::NodesInDifferentTrees(a, b));
        }

        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if current == a || current == b {
                return Ok(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        Err(TreeError::NodesInDifferentTrees(a, b))
    }

    pub fn is_before(&self, a: NodeId, b: NodeId) -> Result<bool> {
        Ok(a != b && self.meet_first(a, b)? == a)
    }

    pub fn is_after(&self, a: NodeId, b: NodeId) -> Result<bool> {
        Ok(a != b && self.meet_first(a, b)? == b)
    }

    // ========== Text ==========

    /// Nearest node before `id` in document order, outside its subtree,
    /// that has text: a preceding sibling or a preceding sibling of an
    /// ancestor
    pub fn previous_sibling_with_text(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent_of(current)?;
            let index = self.index_of(parent, current)?;
            let siblings = self.children(parent);
            if let Some(found) = siblings[..index]
                .iter()
                .rev()
                .find(|s| self.text_range(**s).is_some())
            {
                return Some(*found);
            }
            current = parent;
        }
    }

    /// Counterpart of [`previous_sibling_with_text`](Self::previous_sibling_with_text)
    pub fn next_sibling_with_text(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent_of(current)?;
            let index = self.index_of(parent, current)?;
            let siblings = self.children(parent);
            if let Some(found) = siblings[index + 1..]
                .iter()
                .find(|s| self.text_range(**s).is_some())
            {
                return Some(*found);
            }
            current = parent;
        }
    }

    /// Owner of the first chunk of the node's aggregated text
    pub fn first_descendant_with_text(&self, id: NodeId) -> Option<NodeId> {
        let range = self.nodes.get(&id)?.text_flattened?;
        self.chunk(range.first).map(|c| c.owner)
    }

    /// Owner of the last chunk of the node's aggregated text
    pub fn last_descendant_with_text(&self, id: NodeId) -> Option<NodeId> {
        let range = self.nodes.get(&id)?.text_flattened?;
        self.chunk(range.last).map(|c| c.owner)
    }

    // ========== XML and media ==========

    fn has_element(&self, id: NodeId, local_name: &str) -> bool {
        self.get_property::<XmlProperty>(id)
            .is_some_and(|x| x.is_named(local_name))
    }

    /// Nearest proper ancestor whose XML element has the given local name
    pub fn first_ancestor_with_xml_element(&self, id: NodeId, local_name: &str) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.has_element(*a, local_name))
    }

    /// First proper descendant in preorder whose XML element has the
    /// given local name
    pub fn first_descendant_with_xml_element(&self, id: NodeId, local_name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|d| self.has_element(*d, local_name))
    }

    /// Nearest proper ancestor with media in a channel of type `C`
    pub fn first_ancestor_with_media<C: ChannelType>(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|a| self.media_in_channel::<C>(*a).is_some())
    }

    /// First proper descendant in preorder with media in a channel of type `C`
    pub fn first_descendant_with_media<C: ChannelType>(&self, id: NodeId) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|d| self.media_in_channel::<C>(*d).is_some())
    }

    /// Nearest node before `id` in document order, outside its subtree,
    /// whose subtree holds media in a channel of type `C`
    pub fn previous_sibling_with_media<C: ChannelType>(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent_of(current)?;
            let index = self.index_of(parent, current)?;
            if let Some(found) = self.children(parent)[..index]
                .iter()
                .rev()
                .find(|s| self.subtree_has_media::<C>(**s))
            {
                return Some(*found);
            }
            current = parent;
        }
    }

    pub fn next_sibling_with_media<C: ChannelType>(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent_of(current)?;
            let index = self.index_of(parent, current)?;
            if let Some(found) = self.children(parent)[index + 1..]
                .iter()
                .find(|s| self.subtree_has_media::<C>(**s))
            {
                return Some(*found);
            }
            current = parent;
        }
    }

    fn subtree_has_media<C: ChannelType>(&self, id: NodeId) -> bool {
        self.media_in_channel::<C>(id).is_some() || self.first_descendant_with_media::<C>(id).is_some()
    }

    /// Marked nodes of the subtree rooted at `id`, in preorder
    pub fn marked_nodes(&self, id: NodeId) -> Vec<NodeId> {
        std::iter::once(id)
            .chain(self.descendants(id))
            .filter(|n| self.is_marked(*n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioChannel, ChannelKind, Media};

    /// body
    /// ├── h1 "Title"
    /// └── section
    ///     ├── p "One"
    ///     └── p "Two"
    fn sample() -> (Presentation, Vec<NodeId>) {
        let mut pres = Presentation::new();
        let body = pres.create_element("body");
        let h1 = pres.create_element("h1");
        let title = pres.create_text_node("Title");
        let section = pres.create_element("section");
        let p1 = pres.create_element("p");
        let one = pres.create_text_node("One");
        let p2 = pres.create_element("p");
        let two = pres.create_text_node("Two");

        pres.append_child(h1, title).unwrap();
        pres.append_child(p1, one).unwrap();
        pres.append_child(p2, two).unwrap();
        pres.append_child(section, p1).unwrap();
        pres.append_child(section, p2).unwrap();
        pres.append_child(body, h1).unwrap();
        pres.append_child(body, section).unwrap();
        (pres, vec![body, h1, title, section, p1, one, p2, two])
    }

    #[test]
    fn test_structure_queries() {
        let (pres, ids) = sample();
        let (body, h1, section, p1, one, p2) = (ids[0], ids[1], ids[3], ids[4], ids[5], ids[6]);

        assert_eq!(pres.root(one), body);
        assert_eq!(pres.depth(one), 3);
        assert_eq!(pres.index_in_parent(section), Some(1));
        assert_eq!(pres.next_sibling(h1), Some(section));
        assert_eq!(pres.previous_sibling(h1), None);
        assert_eq!(pres.previous_sibling(p2), Some(p1));
        assert!(pres.is_ancestor_of(body, one));
        assert!(pres.is_descendant_of(one, section));
        assert!(!pres.is_ancestor_of(one, one));
        assert!(pres.is_sibling_of(p1, p2));
        assert!(!pres.is_sibling_of(p1, p1));
    }

    #[test]
    fn test_descendants_preorder() {
        let (pres, ids) = sample();
        assert_eq!(pres.descendants(ids[0]), ids[1..].to_vec());
    }

    #[test]
    fn test_document_order() {
        let (pres, ids) = sample();
        let (h1, p1, two) = (ids[1], ids[4], ids[7]);

        assert!(pres.is_before(h1, two).unwrap());
        assert!(pres.is_after(two, p1).unwrap());
        assert!(!pres.is_before(p1, p1).unwrap());
        assert_eq!(pres.meet_first(two, h1).unwrap(), h1);
    }

    #[test]
    fn test_document_order_different_trees() {
        let (mut pres, ids) = sample();
        let stray = pres.create_node();
        assert!(matches!(
            pres.is_before(ids[1], stray),
            Err(TreeError::NodesInDifferentTrees(_, _))
        ));
    }

    #[test]
    fn test_sibling_with_text() {
        let (mut pres, ids) = sample();
        let (h1, section, p1, p2) = (ids[1], ids[3], ids[4], ids[6]);
        let empty = pres.create_element("p");
        pres.insert(section, empty, 0).unwrap();

        assert_eq!(pres.previous_sibling_with_text(p1), Some(h1));
        assert_eq!(pres.next_sibling_with_text(empty), Some(p1));
        assert_eq!(pres.next_sibling_with_text(p2), None);
    }

    #[test]
    fn test_descendant_with_text_boundaries() {
        let (pres, ids) = sample();
        let (body, title, two) = (ids[0], ids[2], ids[7]);
        assert_eq!(pres.first_descendant_with_text(body), Some(title));
        assert_eq!(pres.last_descendant_with_text(body), Some(two));
        assert_eq!(pres.first_descendant_with_text(two), None);
    }

    #[test]
    fn test_xml_element_queries() {
        let (pres, ids) = sample();
        let (body, section, p1, one) = (ids[0], ids[3], ids[4], ids[5]);
        assert_eq!(pres.first_ancestor_with_xml_element(one, "SECTION"), Some(section));
        assert_eq!(pres.first_descendant_with_xml_element(body, "p"), Some(p1));
        assert_eq!(pres.first_ancestor_with_xml_element(body, "p"), None);
    }

    #[test]
    fn test_media_queries() {
        let (mut pres, ids) = sample();
        let (body, h1, section, p2) = (ids[0], ids[1], ids[3], ids[6]);
        let audio = pres.channels_mut().find_or_add("audio", ChannelKind::Audio);
        pres.set_media(p2, audio, Media::Audio(crate::AudioMedia::new("two.mp3")))
            .unwrap();

        assert_eq!(pres.first_descendant_with_media::<AudioChannel>(body), Some(p2));
        assert_eq!(pres.next_sibling_with_media::<AudioChannel>(h1), Some(section));
        assert_eq!(pres.first_ancestor_with_media::<AudioChannel>(ids[7]), Some(p2));
        assert_eq!(pres.previous_sibling_with_media::<AudioChannel>(h1), None);
    }

    #[test]
    fn test_marked_nodes() {
        let (mut pres, ids) = sample();
        pres.set_marked(ids[6], true).unwrap();
        pres.set_marked(ids[1], true).unwrap();
        assert_eq!(pres.marked_nodes(ids[0]), vec![ids[1], ids[6]]);
    }

    struct Recorder(Vec<String>);

    impl TreeVisitor for Recorder {
        fn pre_visit(&mut self, pres: &Presentation, node: NodeId) -> bool {
            let name = pres
                .get_property::<XmlProperty>(node)
                .map(|x| x.local_name.clone())
                .unwrap_or_else(|| "#text".into());
            self.0.push(format!("<{}", name));
            name != "h1"
        }

        fn post_visit(&mut self, _pres: &Presentation, _node: NodeId) {
            self.0.push(">".into());
        }
    }

    #[test]
    fn test_visitor_skips_children_but_still_post_visits() {
        let (pres, ids) = sample();
        let mut recorder = Recorder(Vec::new());
        pres.accept_depth_first(ids[0], &mut recorder);
        assert_eq!(
            recorder.0.join(""),
            "<body<h1><section<p<#text>><p<#text>>>>"
        );
    }
}
