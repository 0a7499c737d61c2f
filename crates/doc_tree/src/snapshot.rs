//! Serializable form of a subtree
//!
//! A snapshot records ordered properties and ordered children. Channels are
//! referenced by name and kind so a snapshot can be restored into another
//! presentation. Restoring rebuilds the tree through the mutation API, so a
//! restored tree carries exactly the cache a hand-built one would.

use crate::{
    ChannelKind, ChannelsProperty, Media, NodeId, Presentation, Property, Result, TreeError,
    XmlProperty,
};
use serde::{Deserialize, Serialize};

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub version: u32,
    pub root: NodeSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertySnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PropertySnapshot {
    Xml(XmlProperty),
    Channels { media: Vec<ChannelMedia> },
}

/// Media bound to a channel identified by name and kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMedia {
    pub channel_name: String,
    pub channel_kind: ChannelKind,
    pub media: Media,
}

impl TreeSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: TreeSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TreeError::InvalidOperation(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

impl Presentation {
    /// Capture a subtree. Marks and caches are not part of a snapshot.
    pub fn snapshot(&self, id: NodeId) -> Result<TreeSnapshot> {
        Ok(TreeSnapshot {
            version: SNAPSHOT_VERSION,
            root: self.snapshot_node(id)?,
        })
    }

    fn snapshot_node(&self, id: NodeId) -> Result<NodeSnapshot> {
        let node = self.require(id)?;
        let properties = node
            .properties()
            .iter()
            .map(|p| self.snapshot_property(p))
            .collect::<Result<Vec<_>>>()?;
        let children = node
            .children()
            .iter()
            .map(|c| self.snapshot_node(*c))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeSnapshot {
            properties,
            children,
        })
    }

    fn snapshot_property(&self, property: &Property) -> Result<PropertySnapshot> {
        Ok(match property {
            Property::Xml(xml) => PropertySnapshot::Xml(xml.clone()),
            Property::Channels(channels) => PropertySnapshot::Channels {
                media: channels
                    .entries()
                    .map(|(id, media)| {
                        let channel = self.channels.require(id)?;
                        Ok(ChannelMedia {
                            channel_name: channel.name.clone(),
                            channel_kind: channel.kind,
                            media: media.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            },
        })
    }

    /// Rebuild a snapshot as a new detached tree and return its root
    pub fn restore(&mut self, snapshot: &TreeSnapshot) -> Result<NodeId> {
        let root = self.restore_node(&snapshot.root)?;
        tracing::debug!(root = %root, "restored snapshot");
        Ok(root)
    }

    fn restore_node(&mut self, snapshot: &NodeSnapshot) -> Result<NodeId> {
        let id = self.create_node();
        for property in &snapshot.properties {
            let property = match property {
                PropertySnapshot::Xml(xml) => Property::Xml(xml.clone()),
                PropertySnapshot::Channels { media } => {
                    let mut channels = ChannelsProperty::new();
                    for entry in media {
                        let channel = self
                            .channels
                            .find_or_add(&entry.channel_name, entry.channel_kind);
                        channels.set_media(channel, entry.media.clone());
                    }
                    Property::Channels(channels)
                }
            };
            self.add_property(id, property)?;
        }
        for child in &snapshot.children {
            let child = self.restore_node(child)?;
            self.append_child(id, child)?;
        }
        Ok(id)
    }

    /// Deep copy of a subtree into another presentation
    pub fn export(&self, id: NodeId, destination: &mut Presentation) -> Result<NodeId> {
        destination.restore(&self.snapshot(id)?)
    }

    /// Whether two subtrees have the same properties and structure
    pub fn value_equals(&self, id: NodeId, other: &Presentation, other_id: NodeId) -> Result<bool> {
        Ok(self.snapshot(id)? == other.snapshot(other_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioMedia, TreeConfig};

    fn sample(pres: &mut Presentation) -> NodeId {
        let body = pres.create_element("body");
        let p = pres.create_element("p");
        let hello = pres.create_text_node("Hello ");
        let img = pres.create_element("img");
        pres.set_xml_attribute(img, "alt", "A cat").unwrap();
        let audio = pres.channels_mut().find_or_add("audio", ChannelKind::Audio);
        pres.set_media(p, audio, Media::Audio(AudioMedia::new("p.mp3")))
            .unwrap();

        pres.append_child(p, hello).unwrap();
        pres.append_child(p, img).unwrap();
        pres.append_child(body, p).unwrap();
        body
    }

    #[test]
    fn test_export_into_other_presentation() {
        let mut source = Presentation::new();
        let body = sample(&mut source);

        let mut dest = Presentation::with_config(TreeConfig {
            verify_text_cache: true,
            ..TreeConfig::default()
        });
        dest.channels_mut().find_or_add("unrelated", ChannelKind::Image);
        let copy = source.export(body, &mut dest).unwrap();

        assert_eq!(dest.get_text_flattened(copy).as_deref(), Some("Hello A cat"));
        assert!(source.value_equals(body, &dest, copy).unwrap());
        dest.check_text_cache(copy).unwrap();

        let p = dest.child(copy, 0).unwrap();
        assert_eq!(dest.audio_media(p).map(|a| a.src.as_str()), Some("p.mp3"));
    }

    #[test]
    fn test_json_round_trip() {
        let mut pres = Presentation::new();
        let body = sample(&mut pres);
        let json = pres.snapshot(body).unwrap().to_json().unwrap();

        let parsed = TreeSnapshot::from_json(&json).unwrap();
        let restored = pres.restore(&parsed).unwrap();
        assert!(pres.value_equals(body, &pres, restored).unwrap());
        assert_eq!(pres.get_text_flattened(restored).as_deref(), Some("Hello A cat"));
    }

    #[test]
    fn test_value_equals_detects_difference() {
        let mut pres = Presentation::new();
        let a = sample(&mut pres);
        let b = sample(&mut pres);
        assert!(pres.value_equals(a, &pres, b).unwrap());

        let p = pres.child(b, 0).unwrap();
        let hello = pres.child(p, 0).unwrap();
        pres.set_text(hello, "Bye ").unwrap();
        assert!(!pres.value_equals(a, &pres, b).unwrap());
    }

    #[test]
    fn test_marks_are_not_captured() {
        let mut pres = Presentation::new();
        let a = sample(&mut pres);
        let b = sample(&mut pres);
        pres.set_marked(a, true).unwrap();
        assert!(pres.value_equals(a, &pres, b).unwrap());
    }

    #[test]
    fn test_unsupported_version() {
        let json = r#"{ "version": 99, "root": {} }"#;
        assert!(matches!(
            TreeSnapshot::from_json(json),
            Err(TreeError::InvalidOperation(_))
        ));
    }
}
