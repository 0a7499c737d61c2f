//! Channels and the media payloads attached through them
//!
//! A node carries media through a [`ChannelsProperty`](crate::ChannelsProperty)
//! that maps channels to media. Channels are registered once per
//! presentation and classified by [`ChannelKind`]; lookups are expressed
//! against a marker type implementing [`ChannelType`].

use crate::{ChannelId, Result, TreeError};
use serde::{Deserialize, Serialize};

/// Classification of a channel, deciding which media it is expected to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Audio,
    Image,
    Video,
}

/// Compile-time selector for `media_in_channel::<C>()` lookups
pub trait ChannelType {
    const KIND: ChannelKind;
}

/// Selects channels of kind [`ChannelKind::Text`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TextChannel;

/// Selects channels of kind [`ChannelKind::Audio`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioChannel;

/// Selects channels of kind [`ChannelKind::Image`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageChannel;

/// Selects channels of kind [`ChannelKind::Video`]
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoChannel;

impl ChannelType for TextChannel {
    const KIND: ChannelKind = ChannelKind::Text;
}

impl ChannelType for AudioChannel {
    const KIND: ChannelKind = ChannelKind::Audio;
}

impl ChannelType for ImageChannel {
    const KIND: ChannelKind = ChannelKind::Image;
}

impl ChannelType for VideoChannel {
    const KIND: ChannelKind = ChannelKind::Video;
}

/// A named channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Registry of the channels known to a presentation
#[derive(Debug, Clone, Default)]
pub struct ChannelsManager {
    channels: Vec<Channel>,
}

impl ChannelsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel and return its handle
    pub fn add(&mut self, channel: Channel) -> ChannelId {
        let id = ChannelId(self.channels.len() as u32);
        self.channels.push(channel);
        id
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index())
    }

    /// Like [`get`](Self::get) but reports unknown handles as errors
    pub fn require(&self, id: ChannelId) -> Result<&Channel> {
        self.get(id).ok_or(TreeError::ChannelNotFound(id))
    }

    /// Find a channel by name and kind
    pub fn find(&self, name: &str, kind: ChannelKind) -> Option<ChannelId> {
        self.channels
            .iter()
            .position(|c| c.kind == kind && c.name == name)
            .map(|idx| ChannelId(idx as u32))
    }

    /// Find a channel by name and kind, registering it when missing
    pub fn find_or_add(&mut self, name: &str, kind: ChannelKind) -> ChannelId {
        match self.find(name, kind) {
            Some(id) => id,
            None => self.add(Channel::new(name, kind)),
        }
    }

    /// First registered channel of the given kind
    pub fn first_of_kind(&self, kind: ChannelKind) -> Option<ChannelId> {
        self.channels
            .iter()
            .position(|c| c.kind == kind)
            .map(|idx| ChannelId(idx as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(idx, c)| (ChannelId(idx as u32), c))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Text payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMedia {
    pub text: String,
}

impl TextMedia {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Reference to an audio clip; playback is outside this crate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMedia {
    pub src: String,
    /// Clip start in milliseconds
    pub clip_begin_ms: u64,
    /// Clip end in milliseconds, `None` for end of file
    pub clip_end_ms: Option<u64>,
}

impl AudioMedia {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            clip_begin_ms: 0,
            clip_end_ms: None,
        }
    }

    pub fn with_clip(mut self, begin_ms: u64, end_ms: u64) -> Self {
        self.clip_begin_ms = begin_ms;
        self.clip_end_ms = Some(end_ms);
        self
    }

    /// Clip duration when the end is known
    pub fn duration_ms(&self) -> Option<u64> {
        self.clip_end_ms
            .map(|end| end.saturating_sub(self.clip_begin_ms))
    }
}

/// Reference to an image resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMedia {
    pub src: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageMedia {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            width: None,
            height: None,
        }
    }
}

/// Reference to a video resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMedia {
    pub src: String,
}

/// Media payload carried by a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Media {
    Text(TextMedia),
    Audio(AudioMedia),
    Image(ImageMedia),
    Video(VideoMedia),
}

impl Media {
    pub fn text(text: impl Into<String>) -> Self {
        Media::Text(TextMedia::new(text))
    }

    pub fn as_text(&self) -> Option<&TextMedia> {
        match self {
            Media::Text(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioMedia> {
        match self {
            Media::Audio(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageMedia> {
        match self {
            Media::Image(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoMedia> {
        match self {
            Media::Video(m) => Some(m),
            _ => None,
        }
    }

    /// The channel kind this payload naturally belongs to
    pub fn kind(&self) -> ChannelKind {
        match self {
            Media::Text(_) => ChannelKind::Text,
            Media::Audio(_) => ChannelKind::Audio,
            Media::Image(_) => ChannelKind::Image,
            Media::Video(_) => ChannelKind::Video,
        }
    }
}
