//! Built-in prompt styles.

/// A named prompt the user can pick instead of typing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub key: &'static str,
    pub title: &'static str,
    pub emoji: &'static str,
    /// Empty for [`CUSTOM`], which keeps whatever prompt is already set.
    pub prompt: &'static str,
}

impl Preset {
    pub fn is_custom(&self) -> bool {
        self.prompt.is_empty()
    }
}

pub const CUSTOM: &str = "custom";

pub const PRESETS: &[Preset] = &[
    Preset {
        key: "vintage",
        title: "Vintage",
        emoji: "🎞️",
        prompt: "Make this photo look like an old film photo from the 1970s. \
                 Add grain, slightly faded colors, and warm tones.",
    },
    Preset {
        key: "cartoon",
        title: "Cartoon",
        emoji: "🎨",
        prompt: "Turn this photo into a vibrant, colorful cartoon. \
                 Exaggerate the features slightly and use bold outlines.",
    },
    Preset {
        key: "bw",
        title: "Black & White",
        emoji: "🔳",
        prompt: "Turn this photo into a dramatic, high-contrast black and white photo. \
                 Emphasize shadows and highlights.",
    },
    Preset {
        key: "pop-art",
        title: "Pop Art",
        emoji: "💥",
        prompt: "Turn this photo into a Roy Lichtenstein style pop art piece, \
                 with halftone dots and bold primary colors.",
    },
    Preset {
        key: CUSTOM,
        title: "Custom",
        emoji: "✏️",
        prompt: "",
    },
];

/// Look up a preset by key (case-insensitive).
pub fn find(key: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.key.eq_ignore_ascii_case(key))
}
