//! Change notification
//!
//! The presentation publishes a [`TreeEvent`] after every successful
//! structural or property change, once the text cache has already been
//! repaired. Listeners are plain callbacks; having none registered is the
//! normal case and costs nothing beyond an empty loop.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// A change that has been applied to a presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    ChildAdded {
        parent: NodeId,
        child: NodeId,
        index: usize,
    },
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
        index: usize,
    },
    PropertyAdded {
        node: NodeId,
        index: usize,
    },
    PropertyRemoved {
        node: NodeId,
        index: usize,
    },
    /// A property payload was edited in place
    PropertyChanged {
        node: NodeId,
    },
    MarkChanged {
        node: NodeId,
        marked: bool,
    },
}

impl TreeEvent {
    /// The node whose own state changed
    pub fn source(&self) -> NodeId {
        match self {
            TreeEvent::ChildAdded { parent, .. } | TreeEvent::ChildRemoved { parent, .. } => *parent,
            TreeEvent::PropertyAdded { node, .. }
            | TreeEvent::PropertyRemoved { node, .. }
            | TreeEvent::PropertyChanged { node }
            | TreeEvent::MarkChanged { node, .. } => *node,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&TreeEvent) + Send>;

/// Ordered list of registered listeners
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

impl Listeners {
    pub(crate) fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sub, _)| *sub != id);
        self.entries.len() != before
    }

    pub(crate) fn publish(&mut self, event: &TreeEvent) {
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("next_id", &self.next_id)
            .field("entries", &self.entries.iter().map(|(id, _)| (*id, "<callback>")).collect::<Vec<_>>())
            .finish()
    }
}
