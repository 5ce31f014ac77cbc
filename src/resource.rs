//! Resource kinds and the conventional file layout for generated artifacts

use serde::{Deserialize, Serialize};

/// Provider-side resource class a call is metered under.
///
/// Image and video generations hit different provider ceilings, so the rate
/// limiter and the worker pool both partition work by this class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaClass {
    Image,
    Video,
}

impl MediaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaClass::Image => "image",
            MediaClass::Video => "video",
        }
    }
}

/// Kind of generated artifact tracked by the version store.
///
/// Closed set: each variant knows its stable output path, file extension and
/// media class, so no caller ever branches on a resource-type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Storyboards,
    Videos,
    Characters,
    Clues,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Storyboards,
        ResourceKind::Videos,
        ResourceKind::Characters,
        ResourceKind::Clues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Storyboards => "storyboards",
            ResourceKind::Videos => "videos",
            ResourceKind::Characters => "characters",
            ResourceKind::Clues => "clues",
        }
    }

    /// File extension for artifacts of this kind, with the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ResourceKind::Videos => ".mp4",
            _ => ".png",
        }
    }

    pub fn media_class(&self) -> MediaClass {
        match self {
            ResourceKind::Videos => MediaClass::Video,
            _ => MediaClass::Image,
        }
    }

    /// Stable path of the current artifact, relative to the project root.
    pub fn current_rel_path(&self, resource_id: &str) -> String {
        match self {
            ResourceKind::Storyboards => format!("storyboards/scene_{}.png", resource_id),
            ResourceKind::Videos => format!("videos/scene_{}.mp4", resource_id),
            ResourceKind::Characters => format!("characters/{}.png", resource_id),
            ResourceKind::Clues => format!("clues/{}.png", resource_id),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "storyboards" => Ok(ResourceKind::Storyboards),
            "videos" => Ok(ResourceKind::Videos),
            "characters" => Ok(ResourceKind::Characters),
            "clues" => Ok(ResourceKind::Clues),
            other => Err(format!("unsupported resource type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_paths_follow_convention() {
        assert_eq!(
            ResourceKind::Storyboards.current_rel_path("E1S01"),
            "storyboards/scene_E1S01.png"
        );
        assert_eq!(
            ResourceKind::Videos.current_rel_path("E1S01"),
            "videos/scene_E1S01.mp4"
        );
        assert_eq!(
            ResourceKind::Characters.current_rel_path("jade"),
            "characters/jade.png"
        );
        assert_eq!(ResourceKind::Clues.current_rel_path("amulet"), "clues/amulet.png");
    }

    #[test]
    fn test_media_class_partition() {
        assert_eq!(ResourceKind::Videos.media_class(), MediaClass::Video);
        assert_eq!(ResourceKind::Storyboards.media_class(), MediaClass::Image);
        assert_eq!(ResourceKind::Characters.media_class(), MediaClass::Image);
    }

    #[test]
    fn test_round_trip_from_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("thumbnails".parse::<ResourceKind>().is_err());
    }
}
