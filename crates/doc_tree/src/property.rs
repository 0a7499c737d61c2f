//! Properties attached to tree nodes
//!
//! Two kinds matter to the tree core: [`XmlProperty`] (element name and
//! attributes, used for alt/title text and outline classification) and
//! [`ChannelsProperty`] (channel to media mapping, used for text, audio and
//! image lookups). A property value is moved into exactly one node and moved
//! back out on removal, so a property can never be owned twice.

use crate::{ChannelId, Media};
use serde::{Deserialize, Serialize};

/// Namespace used for the SDK's own qualified names
pub const SDK_NAMESPACE: &str = "urn:doc-tree:sdk";

/// One XML attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlAttribute {
    pub local_name: String,
    #[serde(default)]
    pub namespace_uri: String,
    pub value: String,
}

impl XmlAttribute {
    pub fn new(local_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace_uri: String::new(),
            value: value.into(),
        }
    }
}

/// XML element metadata of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlProperty {
    pub local_name: String,
    #[serde(default)]
    pub namespace_uri: String,
    #[serde(default)]
    pub attributes: Vec<XmlAttribute>,
}

impl XmlProperty {
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace_uri: String::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace_uri: impl Into<String>) -> Self {
        self.namespace_uri = namespace_uri.into();
        self
    }

    pub fn with_attribute(mut self, local_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(local_name, value);
        self
    }

    /// Case-insensitive comparison against the element's local name
    pub fn is_named(&self, local_name: &str) -> bool {
        self.local_name.eq_ignore_ascii_case(local_name)
    }

    pub fn attribute(&self, local_name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.local_name == local_name)
    }

    pub fn attribute_value(&self, local_name: &str) -> Option<&str> {
        self.attribute(local_name).map(|a| a.value.as_str())
    }

    /// Set or replace an attribute, keeping insertion order for new ones
    pub fn set_attribute(&mut self, local_name: impl Into<String>, value: impl Into<String>) {
        let local_name = local_name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.local_name == local_name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(XmlAttribute::new(local_name, value)),
        }
    }

    pub fn remove_attribute(&mut self, local_name: &str) -> Option<XmlAttribute> {
        let idx = self.attributes.iter().position(|a| a.local_name == local_name)?;
        Some(self.attributes.remove(idx))
    }
}

/// Channel to media mapping of a node, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsProperty {
    entries: Vec<(ChannelId, Media)>,
}

impl ChannelsProperty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media(mut self, channel: ChannelId, media: Media) -> Self {
        self.set_media(channel, media);
        self
    }

    pub fn media(&self, channel: ChannelId) -> Option<&Media> {
        self.entries
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, m)| m)
    }

    /// Attach media to a channel, returning the media it replaced
    pub fn set_media(&mut self, channel: ChannelId, media: Media) -> Option<Media> {
        match self.entries.iter_mut().find(|(c, _)| *c == channel) {
            Some((_, slot)) => Some(std::mem::replace(slot, media)),
            None => {
                self.entries.push((channel, media));
                None
            }
        }
    }

    pub fn remove_media(&mut self, channel: ChannelId) -> Option<Media> {
        let idx = self.entries.iter().position(|(c, _)| *c == channel)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn entries(&self) -> impl Iterator<Item = (ChannelId, &Media)> {
        self.entries.iter().map(|(c, m)| (*c, m))
    }

    pub fn used_channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A property attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Property {
    Xml(XmlProperty),
    Channels(ChannelsProperty),
}

impl Property {
    /// Factory entry point keyed by qualified name
    ///
    /// Returns an empty property of the named kind, or `None` when the name
    /// is not one the SDK knows.
    pub fn create(local_name: &str, namespace_uri: &str) -> Option<Property> {
        if namespace_uri != SDK_NAMESPACE {
            return None;
        }
        match local_name {
            "XmlProperty" => Some(Property::Xml(XmlProperty::default())),
            "ChannelsProperty" => Some(Property::Channels(ChannelsProperty::new())),
            _ => None,
        }
    }

    /// Qualified local name used when the property crosses a serialization boundary
    pub fn type_name(&self) -> &'static str {
        match self {
            Property::Xml(_) => "XmlProperty",
            Property::Channels(_) => "ChannelsProperty",
        }
    }
}

impl From<XmlProperty> for Property {
    fn from(p: XmlProperty) -> Self {
        Property::Xml(p)
    }
}

impl From<ChannelsProperty> for Property {
    fn from(p: ChannelsProperty) -> Self {
        Property::Channels(p)
    }
}

/// Typed access into the [`Property`] enum, used by `get_property::<T>()`
pub trait PropertyKind: Sized {
    fn from_property(property: &Property) -> Option<&Self>;
    fn from_property_mut(property: &mut Property) -> Option<&mut Self>;
}

impl PropertyKind for XmlProperty {
    fn from_property(property: &Property) -> Option<&Self> {
        match property {
            Property::Xml(p) => Some(p),
            _ => None,
        }
    }

    fn from_property_mut(property: &mut Property) -> Option<&mut Self> {
        match property {
            Property::Xml(p) => Some(p),
            _ => None,
        }
    }
}

impl PropertyKind for ChannelsProperty {
    fn from_property(property: &Property) -> Option<&Self> {
        match property {
            Property::Channels(p) => Some(p),
            _ => None,
        }
    }

    fn from_property_mut(property: &mut Property) -> Option<&mut Self> {
        match property {
            Property::Channels(p) => Some(p),
            _ => None,
        }
    }
}
