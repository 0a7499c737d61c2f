//! Text direction of nodes

use crate::{NodeId, Presentation, XmlProperty};
use serde::{Deserialize, Serialize};

/// Resolved writing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextDirectionality {
    /// Nothing on the node or its ancestors decides the direction
    #[default]
    Unsure,
    Ltr,
    Rtl,
}

impl TextDirectionality {
    /// Parse an HTML `dir` attribute value
    pub fn from_dir_attribute(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => TextDirectionality::Ltr,
            "rtl" => TextDirectionality::Rtl,
            _ => TextDirectionality::Unsure,
        }
    }

    /// Direction of the first strong character of `text`
    pub fn detect(text: &str) -> Self {
        match unicode_bidi::get_base_direction(text) {
            unicode_bidi::Direction::Ltr => TextDirectionality::Ltr,
            unicode_bidi::Direction::Rtl => TextDirectionality::Rtl,
            unicode_bidi::Direction::Mixed => TextDirectionality::Unsure,
        }
    }
}

impl Presentation {
    /// Direction decided by the node itself: its `dir` attribute, or else
    /// the first strong character of its own text. Cached per node.
    pub fn own_text_direction(&self, id: NodeId) -> TextDirectionality {
        let Some(node) = self.nodes.get(&id) else {
            return TextDirectionality::Unsure;
        };
        if let Some(cached) = node.direction.get() {
            return cached;
        }

        let from_attribute = node
            .property::<XmlProperty>()
            .and_then(|x| x.attribute_value("dir"))
            .map(TextDirectionality::from_dir_attribute)
            .unwrap_or_default();
        let direction = match from_attribute {
            TextDirectionality::Unsure => self
                .get_text(id)
                .map(TextDirectionality::detect)
                .unwrap_or_default(),
            decided => decided,
        };
        node.direction.set(Some(direction));
        direction
    }

    /// Direction of a node, inherited from the nearest ancestor that
    /// decides one when the node itself does not
    pub fn text_direction(&self, id: NodeId) -> TextDirectionality {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .map(|n| self.own_text_direction(n))
            .find(|d| *d != TextDirectionality::Unsure)
            .unwrap_or_default()
    }

    pub(crate) fn invalidate_direction(&self, id: NodeId) {
        if let Some(node) = self.nodes.get(&id) {
            node.direction.set(None);
        }
    }
}
