//! Tree mutation API
//!
//! Every structural and property change goes through these methods. Each
//! one validates all of its preconditions before touching any link, then
//! applies the change, repairs the text cache, drops cached outlines and
//! publishes a [`TreeEvent`]. Composite operations are built from the
//! single-child primitives so the cache is consistent between every step.

use crate::{
    ChannelId, ChannelKind, ChannelsProperty, Media, NodeId, Presentation, Property, PropertyKind,
    Result, TreeError, TreeEvent, XmlAttribute, XmlProperty,
};

impl Presentation {
    // ========== Primitives ==========

    fn link_child(&mut self, parent: NodeId, child: NodeId, index: usize) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.insert(index, child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }

        if self.local_text_is_stale(parent) {
            self.refresh_text_cache(parent);
        } else {
            self.text_cache_after_insert(child);
        }
        self.invalidate_outlines();

        tracing::trace!(parent = %parent, child = %child, index, "inserted child");
        self.publish(TreeEvent::ChildAdded { parent, child, index });
        self.debug_verify_text_cache(parent);
    }

    fn unlink_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let child = self.child(parent, index).ok_or(TreeError::IndexOutOfBounds {
            index,
            len: self.child_count(parent),
        })?;

        self.text_cache_before_remove(child);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.remove(index);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = None;
        }
        if self.local_text_is_stale(parent) {
            self.refresh_text_cache(parent);
        }
        self.invalidate_outlines();

        tracing::trace!(parent = %parent, child = %child, index, "removed child");
        self.publish(TreeEvent::ChildRemoved { parent, child, index });
        self.debug_verify_text_cache(parent);
        self.debug_verify_text_cache(child);
        Ok(child)
    }

    /// Checks shared by every operation that attaches `node` under `parent`
    fn check_attachable(&self, parent: NodeId, node: NodeId) -> Result<()> {
        self.require(parent)?;
        if self.require(node)?.parent.is_some() {
            return Err(TreeError::NodeNotDetached(node));
        }
        if node == parent {
            return Err(TreeError::NodeIsSelf(node));
        }
        if self.is_ancestor_of(node, parent) {
            return Err(TreeError::NodeIsAncestor(node));
        }
        Ok(())
    }

    /// Checks shared by the two-node relationship operations
    fn check_related(&self, this: NodeId, other: NodeId) -> Result<()> {
        self.require(this)?;
        if !self.contains(other) {
            return Err(TreeError::NodeInDifferentPresentation(other));
        }
        if this == other {
            return Err(TreeError::NodeIsSelf(other));
        }
        if self.is_ancestor_of(other, this) {
            return Err(TreeError::NodeIsAncestor(other));
        }
        if self.is_descendant_of(other, this) {
            return Err(TreeError::NodeIsDescendant(other));
        }
        Ok(())
    }

    // ========== Structural changes ==========

    /// Insert a detached node as the `index`-th child of `parent`
    pub fn insert(&mut self, parent: NodeId, node: NodeId, index: usize) -> Result<()> {
        self.check_attachable(parent, node)?;
        let len = self.child_count(parent);
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        self.link_child(parent, node, index);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<()> {
        let len = self.child_count(parent);
        self.insert(parent, node, len)
    }

    pub fn insert_before(&mut self, parent: NodeId, node: NodeId, anchor: NodeId) -> Result<()> {
        let index = self.require_child_index(parent, anchor)?;
        self.insert(parent, node, index)
    }

    pub fn insert_after(&mut self, parent: NodeId, node: NodeId, anchor: NodeId) -> Result<()> {
        let index = self.require_child_index(parent, anchor)?;
        self.insert(parent, node, index + 1)
    }

    fn require_child_index(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.require(parent)?;
        self.index_of(parent, child)
            .ok_or(TreeError::NodeDoesNotExist { parent, node: child })
    }

    /// Remove and return the `index`-th child of `parent`
    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        self.require(parent)?;
        self.unlink_child(parent, index)
    }

    pub fn remove_child(&mut self, parent: NodeId, node: NodeId) -> Result<NodeId> {
        let index = self.require_child_index(parent, node)?;
        self.unlink_child(parent, index)
    }

    /// Put `node` in place of the `index`-th child and return the old child
    pub fn replace_child_at(&mut self, parent: NodeId, node: NodeId, index: usize) -> Result<NodeId> {
        self.check_attachable(parent, node)?;
        let len = self.child_count(parent);
        if index >= len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        self.link_child(parent, node, index);
        self.unlink_child(parent, index + 1)
    }

    pub fn replace_child(&mut self, parent: NodeId, node: NodeId, old: NodeId) -> Result<NodeId> {
        let index = self.require_child_index(parent, old)?;
        self.replace_child_at(parent, node, index)
    }

    /// Remove a node from its parent; roots are left as they are
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        if let Some(parent) = self.require(node)?.parent {
            self.remove_child(parent, node)?;
        }
        Ok(())
    }

    /// Move every child of `other` to the end of `this`, one at a time
    pub fn append_children_of(&mut self, this: NodeId, other: NodeId) -> Result<()> {
        self.check_related(this, other)?;
        while self.child_count(other) > 0 {
            let child = self.unlink_child(other, 0)?;
            let len = self.child_count(this);
            self.link_child(this, child, len);
        }
        Ok(())
    }

    /// Exchange the positions of two attached nodes
    pub fn swap_with(&mut self, this: NodeId, other: NodeId) -> Result<()> {
        self.check_related(this, other)?;
        let this_parent = self
            .parent_of(this)
            .ok_or(TreeError::NodeHasNoParent(this))?;
        let other_parent = self
            .parent_of(other)
            .ok_or(TreeError::NodeHasNoParent(other))?;
        let this_index = self.require_child_index(this_parent, this)?;

        self.unlink_child(this_parent, this_index)?;
        let other_index = self.require_child_index(other_parent, other)?;
        self.link_child(other_parent, this, other_index + 1);
        self.unlink_child(other_parent, other_index)?;
        self.link_child(this_parent, other, this_index);
        Ok(())
    }

    /// Swap with the previous sibling; `false` when there is none
    pub fn swap_with_previous_sibling(&mut self, node: NodeId) -> Result<bool> {
        self.require(node)?;
        match self.previous_sibling(node) {
            Some(sibling) => self.swap_with(node, sibling).map(|_| true),
            None => Ok(false),
        }
    }

    /// Swap with the next sibling; `false` when there is none
    pub fn swap_with_next_sibling(&mut self, node: NodeId) -> Result<bool> {
        self.require(node)?;
        match self.next_sibling(node) {
            Some(sibling) => self.swap_with(node, sibling).map(|_| true),
            None => Ok(false),
        }
    }

    /// Move the children from `index` on into a new shallow copy of the
    /// node and return the copy
    pub fn split_children(&mut self, node: NodeId, index: usize, copy_properties: bool) -> Result<NodeId> {
        let len = self.require(node)?.child_count();
        if index >= len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }

        let tail = self.copy(node, false, copy_properties)?;
        while self.child_count(node) > index {
            let child = self.unlink_child(node, index)?;
            let end = self.child_count(tail);
            self.link_child(tail, child, end);
        }
        Ok(tail)
    }

    /// Structural copy inside this presentation; the copy is detached
    pub fn copy(&mut self, node: NodeId, deep: bool, copy_properties: bool) -> Result<NodeId> {
        let source = self.require(node)?;
        let properties = if copy_properties {
            source.properties.clone()
        } else {
            Vec::new()
        };
        let children = if deep { source.children.clone() } else { Vec::new() };

        let copy = self.create_node();
        for property in properties {
            self.add_property(copy, property)?;
        }
        for child in children {
            let child_copy = self.copy(child, true, copy_properties)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Destroy a detached subtree and free its chunks
    pub fn dispose(&mut self, node: NodeId) -> Result<()> {
        if self.require(node)?.parent.is_some() {
            return Err(TreeError::NodeNotDetached(node));
        }
        let mut ids = vec![node];
        ids.extend(self.descendants(node));
        self.release_text_cache(&ids);
        for id in &ids {
            self.nodes.remove(id);
        }
        if self.root_node() == Some(node) {
            self.set_root_node(None)?;
        }
        self.invalidate_outlines();
        tracing::trace!(node = %node, count = ids.len(), "disposed subtree");
        Ok(())
    }

    // ========== Property changes ==========

    /// Apply the consequences of a change to a node's own properties
    fn after_property_change(&mut self, node: NodeId, event: TreeEvent) {
        if self.local_text_is_stale(node) {
            self.refresh_text_cache(node);
        } else {
            self.invalidate_direction(node);
        }
        self.invalidate_outlines();
        tracing::trace!(node = %node, ?event, "property change");
        self.publish(event);
        self.debug_verify_text_cache(node);
    }

    /// Attach a property and return its index
    pub fn add_property(&mut self, node: NodeId, property: Property) -> Result<usize> {
        let target = self.require_mut(node)?;
        target.properties.push(property);
        let index = target.properties.len() - 1;
        self.after_property_change(node, TreeEvent::PropertyAdded { node, index });
        Ok(index)
    }

    pub fn remove_property_at(&mut self, node: NodeId, index: usize) -> Result<Property> {
        let target = self.require_mut(node)?;
        let len = target.properties.len();
        if index >= len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        let property = target.properties.remove(index);
        self.after_property_change(node, TreeEvent::PropertyRemoved { node, index });
        Ok(property)
    }

    /// Remove every property of type `T`, returning them in order
    pub fn remove_properties<T: PropertyKind>(&mut self, node: NodeId) -> Result<Vec<Property>> {
        let target = self.require_mut(node)?;
        let mut removed = Vec::new();
        let mut index = 0;
        let mut removed_indices = Vec::new();
        let mut original_index = 0;
        while index < target.properties.len() {
            if T::from_property(&target.properties[index]).is_some() {
                removed.push(target.properties.remove(index));
                removed_indices.push(original_index);
            } else {
                index += 1;
            }
            original_index += 1;
        }
        for index in removed_indices.into_iter().rev() {
            self.after_property_change(node, TreeEvent::PropertyRemoved { node, index });
        }
        Ok(removed)
    }

    /// Edit the first property of type `T` in place
    ///
    /// Returns `None` without calling `f` when the node has no such property.
    pub fn update_property<T, R, F>(&mut self, node: NodeId, f: F) -> Result<Option<R>>
    where
        T: PropertyKind,
        F: FnOnce(&mut T) -> R,
    {
        let Some(property) = self.require_mut(node)?.property_mut::<T>() else {
            return Ok(None);
        };
        let result = f(property);
        self.after_property_change(node, TreeEvent::PropertyChanged { node });
        Ok(Some(result))
    }

    // ========== Media ==========

    /// Attach media to a registered channel, returning the media it replaced
    pub fn set_media(&mut self, node: NodeId, channel: ChannelId, media: Media) -> Result<Option<Media>> {
        self.require(node)?;
        self.channels.require(channel)?;

        if self.get_property::<ChannelsProperty>(node).is_none() {
            self.add_property(node, ChannelsProperty::new().with_media(channel, media).into())?;
            return Ok(None);
        }
        let replaced = self.update_property::<ChannelsProperty, _, _>(node, |p| p.set_media(channel, media))?;
        Ok(replaced.flatten())
    }

    pub fn remove_media(&mut self, node: NodeId, channel: ChannelId) -> Result<Option<Media>> {
        let removed = self.update_property::<ChannelsProperty, _, _>(node, |p| p.remove_media(channel))?;
        Ok(removed.flatten())
    }

    /// Set the node's text media, reusing the text channel it already uses
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<Option<Media>> {
        let existing = self.get_property::<ChannelsProperty>(node).and_then(|p| {
            p.used_channels().find(|c| {
                self.channels
                    .get(*c)
                    .is_some_and(|ch| ch.kind == ChannelKind::Text)
            })
        });
        let channel = match existing {
            Some(channel) => channel,
            None => self.default_text_channel(),
        };
        self.set_media(node, channel, Media::text(text))
    }

    // ========== XML ==========

    /// Name the node's XML element, creating the property when missing
    pub fn set_xml_element(&mut self, node: NodeId, local_name: &str) -> Result<()> {
        self.require(node)?;
        if self.get_property::<XmlProperty>(node).is_none() {
            self.add_property(node, XmlProperty::new(local_name).into())?;
        } else {
            self.update_property::<XmlProperty, _, _>(node, |x| x.local_name = local_name.to_string())?;
        }
        Ok(())
    }

    pub fn set_xml_attribute(&mut self, node: NodeId, local_name: &str, value: &str) -> Result<()> {
        self.update_property::<XmlProperty, _, _>(node, |x| x.set_attribute(local_name, value))?
            .ok_or_else(|| TreeError::InvalidOperation(format!("node {} has no XML element", node)))
    }

    pub fn remove_xml_attribute(&mut self, node: NodeId, local_name: &str) -> Result<Option<XmlAttribute>> {
        let removed = self.update_property::<XmlProperty, _, _>(node, |x| x.remove_attribute(local_name))?;
        Ok(removed.flatten())
    }

    // ========== Marks ==========

    pub fn set_marked(&mut self, node: NodeId, marked: bool) -> Result<()> {
        let target = self.require_mut(node)?;
        if target.marked == marked {
            return Ok(());
        }
        target.marked = marked;
        self.publish(TreeEvent::MarkChanged { node, marked });
        Ok(())
    }
}
