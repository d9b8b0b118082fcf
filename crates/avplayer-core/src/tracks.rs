//! Track catalog
//!
//! Snapshotted from the engine's track groups when a session becomes Ready.
//! Descriptors are keyed `"<group>.<option>"`; the same coordinates address
//! overrides.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Track media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "sub")]
    Subtitle,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "sub"),
        }
    }
}

/// Format details an engine reports for one option
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFormat {
    pub label: Option<String>,
    pub language: Option<String>,
    /// Codec string, e.g. `avc1.64001f`
    pub codecs: Option<String>,
    /// Sample MIME type, used when no codec string is known
    pub mime_type: Option<String>,
    pub average_bitrate: Option<u64>,
    pub peak_bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub hdr: bool,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
}

/// One selectable option inside a track group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackOption {
    /// The engine can decode this option
    pub supported: bool,
    /// Trick-play (I-frame only) rendition
    pub trick_play: bool,
    pub format: TrackFormat,
}

impl TrackOption {
    pub fn new(format: TrackFormat) -> Self {
        Self {
            supported: true,
            trick_play: false,
            format,
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn trick_play(mut self) -> Self {
        self.trick_play = true;
        self
    }
}

/// A group of mutually exclusive options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackGroup {
    /// `None` for groups of a type the player does not expose (metadata, images)
    pub kind: Option<TrackKind>,
    pub options: Vec<TrackOption>,
}

impl TrackGroup {
    pub fn new(kind: TrackKind, options: Vec<TrackOption>) -> Self {
        Self {
            kind: Some(kind),
            options,
        }
    }
}

/// Outward description of one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub title: Option<String>,
    pub language: Option<String>,
    pub format: Option<String>,
    pub bit_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hdr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl TrackDescriptor {
    fn from_option(kind: TrackKind, option: &TrackOption) -> Self {
        let format = &option.format;
        let mut descriptor = Self {
            kind,
            title: format.label.clone(),
            language: format.language.clone(),
            format: format.codecs.clone().or_else(|| format.mime_type.clone()),
            bit_rate: format
                .average_bitrate
                .filter(|b| *b > 0)
                .or(format.peak_bitrate),
            width: None,
            height: None,
            frame_rate: None,
            is_hdr: None,
            channels: None,
            sample_rate: None,
        };
        match kind {
            TrackKind::Video => {
                descriptor.width = format.width;
                descriptor.height = format.height;
                descriptor.frame_rate = format.frame_rate;
                descriptor.is_hdr = Some(format.hdr);
            }
            TrackKind::Audio => {
                descriptor.channels = format.channels;
                descriptor.sample_rate = format.sample_rate;
            }
            TrackKind::Subtitle => {}
        }
        descriptor
    }
}

/// Track key used on the wire
pub fn track_key(group: usize, option: usize) -> String {
    format!("{group}.{option}")
}

/// Per-session track snapshot plus explicit overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCatalog {
    groups: Vec<TrackGroup>,
    descriptors: BTreeMap<String, TrackDescriptor>,
    overrides: HashMap<usize, usize>,
}

impl TrackCatalog {
    /// Snapshot the engine's groups
    pub fn snapshot(groups: Vec<TrackGroup>) -> Self {
        let mut descriptors = BTreeMap::new();
        for (g, group) in groups.iter().enumerate() {
            let Some(kind) = group.kind else {
                continue;
            };
            for (o, option) in group.options.iter().enumerate() {
                if option.supported && !option.trick_play {
                    descriptors.insert(track_key(g, o), TrackDescriptor::from_option(kind, option));
                }
            }
        }
        Self {
            groups,
            descriptors,
            overrides: HashMap::new(),
        }
    }

    pub fn descriptors(&self) -> &BTreeMap<String, TrackDescriptor> {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Group exists, is exposed, and the option is decodable
    pub fn is_selectable(&self, group: usize, option: usize) -> bool {
        self.groups
            .get(group)
            .filter(|g| g.kind.is_some())
            .and_then(|g| g.options.get(option))
            .map(|o| o.supported)
            .unwrap_or(false)
    }

    pub fn active_override(&self, group: usize) -> Option<usize> {
        self.overrides.get(&group).copied()
    }

    pub fn record_override(&mut self, group: usize, option: usize) {
        self.overrides.insert(group, option);
    }

    /// Drop the override for `group` only if it selects `option`
    pub fn release_override(&mut self, group: usize, option: usize) -> bool {
        if self.overrides.get(&group) == Some(&option) {
            self.overrides.remove(&group);
            true
        } else {
            false
        }
    }

    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }
}
