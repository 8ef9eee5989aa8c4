//! Operation-specific options with their enumerated recognized values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// Highest tempo accepted for tempo-related options
pub const MAX_BPM: f64 = 400.0;

/// Declares a string-backed option enum with `as_str`, `ALL`, `FromStr` and serde names.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every recognized value
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let valid: Vec<_> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        Error::validation(
                            $field,
                            format!("invalid {} '{}'; valid options are: {}", $field, wanted, valid.join(", ")),
                        )
                    })
            }
        }
    };
}

wire_enum! {
    /// Stem that can be requested from a stem split
    Stem, "stems" {
        /// Isolated vocals
        Vocals => "vocals",
        /// Isolated drums
        Drums => "drums",
        /// Isolated bass
        Bass => "bass",
        /// Everything else
        Other => "other",
        /// Mix without vocals
        FullSongWithoutVocals => "full_song_without_vocals",
        /// Mix without drums
        FullSongWithoutDrums => "full_song_without_drums",
        /// Mix without bass
        FullSongWithoutBass => "full_song_without_bass",
        /// Mix without the "other" stem
        FullSongWithoutOther => "full_song_without_other",
    }
}

impl Stem {
    /// Stems requested when none are given
    pub const DEFAULT: [Stem; 4] = [Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other];

    /// Parse a comma-separated list such as `"vocals,drums"`
    pub fn parse_list(list: &str) -> Result<Vec<Stem>, Error> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Stem::from_str)
            .collect()
    }
}

wire_enum! {
    /// Musical component for segmentation and sample packs
    Component, "components" {
        /// Bass line
        Bass => "bass",
        /// Beat / percussion
        Beat => "beat",
        /// Melody
        Melody => "melody",
        /// Vocals
        Vocal => "vocal",
    }
}

wire_enum! {
    /// Segmentation analysis depth
    AnalysisType, "analysis_type" {
        /// Only the features listed in `features`
        SelectFeatures => "select_features",
        /// Every available feature
        Full => "full",
    }
}

wire_enum! {
    /// Feature extracted by segmentation
    Feature, "features" {
        /// Major/minor mode
        Mode => "mode",
        /// Energy
        Energy => "energy",
        /// Loudness
        Loudness => "loudness",
        /// Danceability
        Danceability => "danceability",
        /// Tatum grid
        Tatum => "tatum",
        /// Lyrics transcription
        Lyrics => "lyrics",
        /// Descriptive tags
        Tags => "tags",
    }
}

/// Options for a stem split
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StemSplitOptions {
    /// Stems to extract (default: vocals, drums, bass, other)
    #[serde(default = "default_stems")]
    pub stems: Vec<Stem>,
    /// Tempo to stretch the stems to
    #[serde(default)]
    pub target_bpm: Option<f64>,
    /// Key to pitch-shift the stems to
    #[serde(default)]
    pub target_key: Option<String>,
    /// Separation model (default: "primaudio")
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for StemSplitOptions {
    fn default() -> Self {
        Self {
            stems: default_stems(),
            target_bpm: None,
            target_key: None,
            algorithm: default_algorithm(),
        }
    }
}

impl StemSplitOptions {
    /// Request these stems
    pub fn stems(mut self, stems: impl IntoIterator<Item = Stem>) -> Self {
        self.stems = stems.into_iter().collect();
        self
    }

    /// Stretch to a tempo
    pub fn target_bpm(mut self, bpm: f64) -> Self {
        self.target_bpm = Some(bpm);
        self
    }

    /// Shift to a key
    pub fn target_key(mut self, key: impl Into<String>) -> Self {
        self.target_key = Some(key.into());
        self
    }

    /// Use a different separation model
    pub fn algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }
}

/// Options for analysis (the service takes none)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeOptions {}

/// Options for segmentation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Components to segment
    #[serde(default)]
    pub components: Vec<Component>,
    /// Analysis depth
    #[serde(default)]
    pub analysis_type: Option<AnalysisType>,
    /// Features to extract; requires `AnalysisType::SelectFeatures`
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Genre hint
    #[serde(default)]
    pub genre: Option<String>,
}

/// Options for mastering
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterOptions {
    /// Track whose sound the master should match
    #[serde(default)]
    pub reference_file: Option<PathBuf>,
}

/// Options for sample pack generation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateSamplesOptions {
    /// Kind of sample pack
    #[serde(default)]
    pub job_type: Option<String>,
    /// Components to include
    #[serde(default)]
    pub components: Vec<Component>,
    /// Genre hint
    #[serde(default)]
    pub genre: Option<String>,
}

/// Options for MIDI generation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateMidiOptions {
    /// Tempo of the generated MIDI
    #[serde(default)]
    pub bpm: Option<f64>,
}

fn default_stems() -> Vec<Stem> {
    Stem::DEFAULT.to_vec()
}

fn default_algorithm() -> String {
    "primaudio".to_string()
}
