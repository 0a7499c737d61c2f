//! Incremental flattened-text cache
//!
//! Every node that contributes text owns one [`StringChunk`]. Chunks are
//! threaded into a doubly-linked list in document order, and every node
//! caches the `(first, last)` span of the chunks in its subtree. Reading a
//! node's flattened text walks only that span; structural changes patch the
//! list and the boundary pointers of the affected ancestors in place.
//!
//! The cache is kept exact at all times: a node without a cached range has
//! no text. A node that carries text media *and* has children is opaque: its
//! own chunk stands for its whole text, and the chunks of its descendants
//! form a separate chain that is not reachable from outside.

use crate::{NodeId, Presentation, XmlProperty};
use serde::{Deserialize, Serialize};

/// Handle of a chunk in the presentation's chunk arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    index: u32,
    generation: u32,
}

/// Where a chunk reads its string from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkSource {
    /// The owner's text media in its text channel
    TextMedia,
    /// An attribute of the owner's XML element
    Attribute { local_name: String },
}

/// One atomic piece of flattenable text
///
/// The string itself is not stored; it is resolved from the owner's
/// properties on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringChunk {
    pub owner: NodeId,
    pub source: ChunkSource,
    pub next: Option<ChunkId>,
    pub previous: Option<ChunkId>,
}

impl StringChunk {
    fn new(owner: NodeId, source: ChunkSource) -> Self {
        Self {
            owner,
            source,
            next: None,
            previous: None,
        }
    }
}

/// Inclusive span of chunks, contiguous in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringChunkRange {
    pub first: ChunkId,
    pub last: ChunkId,
}

impl StringChunkRange {
    pub fn single(chunk: ChunkId) -> Self {
        Self {
            first: chunk,
            last: chunk,
        }
    }

    pub fn is_single(&self) -> bool {
        self.first == self.last
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    chunk: Option<StringChunk>,
}

/// Generational slot arena for chunks
#[derive(Debug, Default)]
pub(crate) struct ChunkArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ChunkArena {
    fn alloc(&mut self, chunk: StringChunk) -> ChunkId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.chunk = Some(chunk);
            return ChunkId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            chunk: Some(chunk),
        });
        ChunkId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, id: ChunkId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.chunk.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
            }
        }
    }

    pub(crate) fn get(&self, id: ChunkId) -> Option<&StringChunk> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.chunk.as_ref()
    }

    fn get_mut(&mut self, id: ChunkId) -> Option<&mut StringChunk> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.chunk.as_mut()
    }

    fn set_next(&mut self, id: ChunkId, next: Option<ChunkId>) {
        if let Some(chunk) = self.get_mut(id) {
            chunk.next = next;
        }
    }

    fn set_previous(&mut self, id: ChunkId, previous: Option<ChunkId>) {
        if let Some(chunk) = self.get_mut(id) {
            chunk.previous = previous;
        }
    }

    fn link(&mut self, left: ChunkId, right: ChunkId) {
        self.set_next(left, Some(right));
        self.set_previous(right, Some(left));
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

// ========== Chunk sources and queries ==========

impl Presentation {
    /// The chunk source a node would contribute given its current
    /// properties, children and the configured text policy
    pub(crate) fn text_chunk_source(&self, id: NodeId) -> Option<ChunkSource> {
        if self.text_media(id).is_some_and(|m| !m.text.is_empty()) {
            return Some(ChunkSource::TextMedia);
        }

        if !self.config.accept_image_alt_text {
            return None;
        }
        let node = self.nodes.get(&id)?;
        if node.has_children() {
            return None;
        }
        let xml = node.property::<XmlProperty>()?;

        let mut candidates = Vec::with_capacity(3);
        if xml.is_named("img") || xml.is_named("video") {
            candidates.push("alt");
        } else if xml.is_named("math") {
            candidates.extend(["alttext", "alt"]);
        }
        candidates.push("title");

        candidates
            .into_iter()
            .find(|name| xml.attribute_value(name).is_some_and(|v| !v.is_empty()))
            .map(|name| ChunkSource::Attribute {
                local_name: name.to_string(),
            })
    }

    /// Live string of a chunk
    pub fn chunk_text(&self, chunk: ChunkId) -> Option<&str> {
        let chunk = self.chunks.get(chunk)?;
        match &chunk.source {
            ChunkSource::TextMedia => self.text_media(chunk.owner).map(|m| m.text.as_str()),
            ChunkSource::Attribute { local_name } => self
                .get_property::<XmlProperty>(chunk.owner)?
                .attribute_value(local_name),
        }
    }

    pub fn chunk(&self, chunk: ChunkId) -> Option<&StringChunk> {
        self.chunks.get(chunk)
    }

    /// Cached range of a node: its own chunk or the span of its descendants
    pub fn text_range(&self, id: NodeId) -> Option<StringChunkRange> {
        self.nodes.get(&id)?.text_range()
    }

    /// The chunk a node contributes itself, if any
    pub fn get_text_chunk(&self, id: NodeId) -> Option<ChunkId> {
        self.nodes.get(&id)?.text_local.map(|r| r.first)
    }

    /// The node's own text, without descendants
    pub fn get_text(&self, id: NodeId) -> Option<&str> {
        self.chunk_text(self.get_text_chunk(id)?)
    }

    /// Concatenated text of the node's subtree in document order
    ///
    /// Walks only the chunks between the node's cached range boundaries.
    pub fn get_text_flattened(&self, id: NodeId) -> Option<String> {
        let range = self.text_range(id)?;
        let mut out = String::new();
        let mut current = Some(range.first);
        while let Some(chunk) = current {
            if let Some(text) = self.chunk_text(chunk) {
                out.push_str(text);
            }
            if chunk == range.last {
                break;
            }
            current = self.chunks.get(chunk).and_then(|c| c.next);
        }
        Some(out)
    }

    /// Chunks of the node's range in order
    pub fn text_chunks(&self, id: NodeId) -> Vec<ChunkId> {
        let mut out = Vec::new();
        let Some(range) = self.text_range(id) else {
            return out;
        };
        let mut current = Some(range.first);
        while let Some(chunk) = current {
            out.push(chunk);
            if chunk == range.last {
                break;
            }
            current = self.chunks.get(chunk).and_then(|c| c.next);
        }
        out
    }

    /// Whether the cached own chunk no longer matches what the node's
    /// properties and children call for
    pub(crate) fn local_text_is_stale(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let cached = node
            .text_local
            .and_then(|r| self.chunks.get(r.first))
            .map(|c| &c.source);
        let expected = self.text_chunk_source(id);
        cached != expected.as_ref()
    }
}

// ========== Incremental maintenance ==========

impl Presentation {
    /// Populate a node's cache from its own source or its children's
    /// ranges. No-op when a range is already cached.
    pub(crate) fn text_cache_init(&mut self, id: NodeId) {
        let children = match self.nodes.get(&id) {
            Some(node) if node.text_range().is_none() => node.children.clone(),
            _ => return,
        };

        let mut span: Option<StringChunkRange> = None;
        for child in children {
            let Some(range) = self.text_range(child) else {
                continue;
            };
            span = Some(match span {
                None => range,
                Some(s) => {
                    self.chunks.link(s.last, range.first);
                    StringChunkRange {
                        first: s.first,
                        last: range.last,
                    }
                }
            });
        }

        let local = self
            .text_chunk_source(id)
            .map(|source| StringChunkRange::single(self.chunks.alloc(StringChunk::new(id, source))));
        if let Some(node) = self.nodes.get_mut(&id) {
            match local {
                Some(range) => node.text_local = Some(range),
                None => node.text_flattened = span,
            }
        }
    }

    /// Last chunk before `id` in its chain: the nearest preceding
    /// sibling-or-ancestor-sibling with text, bounded by an opaque ancestor
    fn preceding_chunk(&self, id: NodeId) -> Option<ChunkId> {
        let mut current = id;
        loop {
            let parent = self.nodes.get(&self.nodes.get(&current)?.parent?)?;
            let index = parent.children.iter().position(|c| *c == current)?;
            if let Some(range) = parent.children[..index]
                .iter()
                .rev()
                .find_map(|sibling| self.text_range(*sibling))
            {
                return Some(range.last);
            }
            if parent.text_local.is_some() {
                return None;
            }
            current = parent.id();
        }
    }

    fn following_chunk(&self, id: NodeId) -> Option<ChunkId> {
        let mut current = id;
        loop {
            let parent = self.nodes.get(&self.nodes.get(&current)?.parent?)?;
            let index = parent.children.iter().position(|c| *c == current)?;
            if let Some(range) = parent.children[index + 1..]
                .iter()
                .find_map(|sibling| self.text_range(*sibling))
            {
                return Some(range.first);
            }
            if parent.text_local.is_some() {
                return None;
            }
            current = parent.id();
        }
    }

    /// Splice a just-linked node's range into the chain and widen the
    /// ancestors' ranges
    pub(crate) fn text_cache_after_insert(&mut self, id: NodeId) {
        self.text_cache_init(id);
        let Some(range) = self.text_range(id) else {
            return;
        };
        let Some(parent) = self.parent_of(id) else {
            return;
        };

        let prev = self.preceding_chunk(id);
        let next = self.following_chunk(id);
        debug_assert_eq!(
            prev.and_then(|p| self.chunks.get(p)).and_then(|c| c.next),
            next.filter(|_| prev.is_some()),
            "neighbouring chunks must be adjacent before a splice"
        );

        self.chunks.set_previous(range.first, prev);
        self.chunks.set_next(range.last, next);
        if let Some(p) = prev {
            self.chunks.set_next(p, Some(range.first));
        }
        if let Some(n) = next {
            self.chunks.set_previous(n, Some(range.last));
        }
        tracing::trace!(node = %id, ?prev, ?next, "spliced text range");

        let mut current = Some(parent);
        while let Some(ancestor) = current {
            let Some(node) = self.nodes.get_mut(&ancestor) else {
                break;
            };
            if node.text_local.is_some() {
                break;
            }
            match node.text_flattened.as_mut() {
                None => node.text_flattened = Some(range),
                Some(r) => {
                    let mut touched = false;
                    if next.is_some() && Some(r.first) == next {
                        r.first = range.first;
                        touched = true;
                    }
                    if prev.is_some() && Some(r.last) == prev {
                        r.last = range.last;
                        touched = true;
                    }
                    if !touched {
                        break;
                    }
                }
            }
            current = node.parent;
        }
    }

    /// Bridge the chain across a node's range and shrink the ancestors'
    /// ranges. Runs while the node is still attached.
    pub(crate) fn text_cache_before_remove(&mut self, id: NodeId) {
        let Some(range) = self.text_range(id) else {
            return;
        };
        let prev = self.chunks.get(range.first).and_then(|c| c.previous);
        let next = self.chunks.get(range.last).and_then(|c| c.next);

        if let Some(p) = prev {
            self.chunks.set_next(p, next);
        }
        if let Some(n) = next {
            self.chunks.set_previous(n, prev);
        }
        self.chunks.set_previous(range.first, None);
        self.chunks.set_next(range.last, None);
        tracing::trace!(node = %id, ?prev, ?next, "unlinked text range");

        let mut current = self.parent_of(id);
        while let Some(ancestor) = current {
            debug_assert!(
                self.ancestor_boundaries_stay_inside(ancestor, range, prev, next),
                "replacement boundary chunk must belong to the ancestor"
            );
            let Some(node) = self.nodes.get_mut(&ancestor) else {
                break;
            };
            if node.text_local.is_some() {
                break;
            }
            let Some(r) = node.text_flattened else {
                break;
            };
            let starts = r.first == range.first;
            let ends = r.last == range.last;
            if !starts && !ends {
                break;
            }
            node.text_flattened = match (starts, ends, prev, next) {
                (true, true, _, _) => None,
                (true, false, _, Some(n)) => Some(StringChunkRange { first: n, last: r.last }),
                (false, true, Some(p), _) => Some(StringChunkRange { first: r.first, last: p }),
                _ => None,
            };
            current = node.parent;
        }
    }

    fn ancestor_boundaries_stay_inside(
        &self,
        ancestor: NodeId,
        removed: StringChunkRange,
        prev: Option<ChunkId>,
        next: Option<ChunkId>,
    ) -> bool {
        let Some(node) = self.nodes.get(&ancestor) else {
            return true;
        };
        let Some(r) = node.text_flattened else {
            return true;
        };
        let owned = |chunk: Option<ChunkId>| {
            chunk
                .and_then(|c| self.chunks.get(c))
                .is_some_and(|c| self.is_descendant_of(c.owner, ancestor))
        };
        match (r.first == removed.first, r.last == removed.last) {
            (true, false) => owned(next),
            (false, true) => owned(prev),
            _ => true,
        }
    }

    /// Drop a node's own cache slots, freeing its chunk
    fn clear_text_cache(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let local = node.text_local.take();
        node.text_flattened = None;
        if let Some(range) = local {
            self.chunks.release(range.first);
        }
    }

    /// Recompute a node's contribution after its own text may have changed
    pub(crate) fn refresh_text_cache(&mut self, id: NodeId) {
        self.text_cache_before_remove(id);
        self.clear_text_cache(id);
        self.text_cache_after_insert(id);
        self.invalidate_direction(id);
    }

    /// Discard every cache and rebuild each tree bottom-up
    pub(crate) fn rebuild_text_cache(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in &ids {
            self.clear_text_cache(*id);
            self.invalidate_direction(*id);
        }
        let roots: Vec<NodeId> = ids
            .into_iter()
            .filter(|id| self.parent_of(*id).is_none())
            .collect();
        for root in roots {
            for id in self.postorder(root) {
                self.text_cache_init(id);
            }
        }
    }

    /// Free the chunks of every node in a subtree
    pub(crate) fn release_text_cache(&mut self, ids: &[NodeId]) {
        for id in ids {
            self.clear_text_cache(*id);
        }
    }

    fn postorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(node) = self.nodes.get(&id) {
                for child in node.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
        out
    }
}

// ========== Verification ==========

impl Presentation {
    /// Compare the cached ranges and links of a subtree with a full
    /// recomputation
    pub fn check_text_cache(&self, root: NodeId) -> Result<(), String> {
        if self.parent_of(root).is_none() {
            if let Some(range) = self.text_range(root) {
                let first = self.chunks.get(range.first).ok_or("dangling first chunk")?;
                let last = self.chunks.get(range.last).ok_or("dangling last chunk")?;
                if first.previous.is_some() || last.next.is_some() {
                    return Err(format!("root {} range is linked to outside chunks", root));
                }
            }
        }
        self.check_node(root).map(|_| ())
    }

    /// Returns the owners of the node's expected chunks
    fn check_node(&self, id: NodeId) -> Result<Vec<NodeId>, String> {
        let node = self.nodes.get(&id).ok_or(format!("missing node {}", id))?;
        if node.text_local.is_some() && node.text_flattened.is_some() {
            return Err(format!("{} has both local and flattened ranges", id));
        }

        let mut children_owners = Vec::new();
        let mut previous_range: Option<StringChunkRange> = None;
        for child in &node.children {
            if self.parent_of(*child) != Some(id) {
                return Err(format!("{} does not point back to parent {}", child, id));
            }
            children_owners.extend(self.check_node(*child)?);
            if let Some(range) = self.text_range(*child) {
                if let Some(prev) = previous_range {
                    let left = self.chunks.get(prev.last).and_then(|c| c.next);
                    let right = self.chunks.get(range.first).and_then(|c| c.previous);
                    if left != Some(range.first) || right != Some(prev.last) {
                        return Err(format!("siblings under {} are not linked", id));
                    }
                }
                previous_range = Some(range);
            }
        }

        let expected_source = self.text_chunk_source(id);
        let expected = match &expected_source {
            Some(_) => vec![id],
            None => children_owners,
        };

        if let Some(local) = node.text_local {
            if !local.is_single() {
                return Err(format!("{} local range spans several chunks", id));
            }
            let chunk = self.chunks.get(local.first).ok_or(format!("{} has a dangling chunk", id))?;
            if chunk.owner != id || Some(&chunk.source) != expected_source.as_ref() {
                return Err(format!("{} local chunk does not match its source", id));
            }
        } else if expected_source.is_some() {
            return Err(format!("{} is missing its local chunk", id));
        }

        let actual: Vec<NodeId> = self
            .text_chunks(id)
            .into_iter()
            .map(|c| self.chunks.get(c).map(|c| c.owner))
            .collect::<Option<Vec<_>>>()
            .ok_or(format!("{} range walks into a dangling chunk", id))?;
        if actual != expected {
            return Err(format!(
                "{} flattens {} chunks, expected {}",
                id,
                actual.len(),
                expected.len()
            ));
        }

        let chunks = self.text_chunks(id);
        for pair in chunks.windows(2) {
            if self.chunks.get(pair[1]).and_then(|c| c.previous) != Some(pair[0]) {
                return Err(format!("{} range has a broken back link", id));
            }
        }

        Ok(expected)
    }

    /// Run the verifier after a mutation when configured to
    pub(crate) fn debug_verify_text_cache(&self, id: NodeId) {
        if cfg!(debug_assertions) && self.config.verify_text_cache {
            let root = self.root(id);
            if let Err(message) = self.check_text_cache(root) {
                debug_assert!(false, "text cache out of sync: {}", message);
            }
        }
    }
}
