//! The presentation: node arena, factory and shared registries

use crate::{
    ChannelType, ChannelsManager, ChannelsProperty, ChunkArena, Listeners, Media, NodeId,
    Outline, PropertyKind, Result, SubscriptionId, TextChannel, TextMedia, TreeConfig, TreeError,
    TreeEvent, TreeNode, TREE_NODE_LOCAL_NAME, TREE_NODE_NAMESPACE,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Owner of a set of publication trees.
///
/// Every node is created by and stays inside one presentation. Nodes and
/// text chunks live in arenas addressed by handles; all structural and
/// property changes go through the methods in `mutation.rs`, which keep the
/// flattened-text cache exact and publish [`TreeEvent`]s.
#[derive(Debug)]
pub struct Presentation {
    pub(crate) nodes: HashMap<NodeId, TreeNode>,
    pub(crate) chunks: ChunkArena,
    pub(crate) channels: ChannelsManager,
    pub(crate) config: TreeConfig,
    root: Option<NodeId>,
    pub(crate) listeners: Listeners,
    pub(crate) outlines: RefCell<HashMap<NodeId, Arc<Outline>>>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}

impl Presentation {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            chunks: ChunkArena::default(),
            channels: ChannelsManager::new(),
            config,
            root: None,
            listeners: Listeners::default(),
            outlines: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Replace the configuration, rebuilding the text cache when the
    /// text policy changed
    pub fn set_config(&mut self, config: TreeConfig) {
        let rebuild = self.config.text_policy_differs(&config);
        self.config = config;
        if rebuild {
            tracing::debug!(nodes = self.nodes.len(), "text policy changed, rebuilding text cache");
            self.rebuild_text_cache();
            self.invalidate_outlines();
        }
    }

    // ========== Factory ==========

    /// Create a detached node with no properties
    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, TreeNode::new(id));
        id
    }

    /// Create a node from its qualified type name, as used when reading
    /// serialized trees. Unknown names yield `None`.
    pub fn create_node_qualified(&mut self, local_name: &str, namespace_uri: &str) -> Option<NodeId> {
        if local_name == TREE_NODE_LOCAL_NAME && namespace_uri == TREE_NODE_NAMESPACE {
            Some(self.create_node())
        } else {
            None
        }
    }

    /// Create a detached node carrying an [`XmlProperty`](crate::XmlProperty)
    pub fn create_element(&mut self, local_name: &str) -> NodeId {
        let id = self.create_node();
        // Fresh node: neither lookup nor cache repair can fail
        let _ = self.set_xml_element(id, local_name);
        id
    }

    /// Create a detached text leaf in the first text channel, registering
    /// a channel named `"text"` when none exists
    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        let channel = self.default_text_channel();
        let id = self.create_node();
        let _ = self.set_media(id, channel, Media::text(text));
        id
    }

    // ========== Access ==========

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Like [`node`](Self::node) but reports unknown handles as errors
    pub fn require(&self, id: NodeId) -> Result<&TreeNode> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    pub(crate) fn require_mut(&mut self, id: NodeId) -> Result<&mut TreeNode> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live text chunks across all trees
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// The designated document root, if one was set
    pub fn root_node(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root_node(&mut self, id: Option<NodeId>) -> Result<()> {
        if let Some(id) = id {
            let node = self.require(id)?;
            if node.parent.is_some() {
                return Err(TreeError::NodeNotDetached(id));
            }
        }
        self.root = id;
        Ok(())
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.nodes.get(&id).map_or(0, |n| n.children.len())
    }

    // ========== Properties and media ==========

    /// First property of type `T` on a node
    pub fn get_property<T: PropertyKind>(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(&id)?.property::<T>()
    }

    pub fn is_marked(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.marked)
    }

    pub fn channels(&self) -> &ChannelsManager {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelsManager {
        &mut self.channels
    }

    pub(crate) fn default_text_channel(&mut self) -> crate::ChannelId {
        match self.channels.first_of_kind(crate::ChannelKind::Text) {
            Some(id) => id,
            None => self.channels.find_or_add("text", crate::ChannelKind::Text),
        }
    }

    /// Media attached to a node in the first channel of type `C`
    pub fn media_in_channel<C: ChannelType>(&self, id: NodeId) -> Option<&Media> {
        let prop = self.get_property::<ChannelsProperty>(id)?;
        prop.entries()
            .find(|(channel, _)| {
                self.channels
                    .get(*channel)
                    .is_some_and(|c| c.kind == C::KIND)
            })
            .map(|(_, media)| media)
    }

    pub fn text_media(&self, id: NodeId) -> Option<&TextMedia> {
        self.media_in_channel::<TextChannel>(id)?.as_text()
    }

    pub fn audio_media(&self, id: NodeId) -> Option<&crate::AudioMedia> {
        self.media_in_channel::<crate::AudioChannel>(id)?.as_audio()
    }

    pub fn image_media(&self, id: NodeId) -> Option<&crate::ImageMedia> {
        self.media_in_channel::<crate::ImageChannel>(id)?.as_image()
    }

    pub fn video_media(&self, id: NodeId) -> Option<&crate::VideoMedia> {
        self.media_in_channel::<crate::VideoChannel>(id)?.as_video()
    }

    // ========== Observers ==========

    /// Register a callback invoked after every applied change
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&TreeEvent) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn publish(&mut self, event: TreeEvent) {
        self.listeners.publish(&event);
    }

    pub(crate) fn invalidate_outlines(&self) {
        self.outlines.borrow_mut().clear();
    }
}
