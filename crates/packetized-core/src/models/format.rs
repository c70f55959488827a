use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Adaptive streaming container family.
///
/// The uppercase name is part of every published object path
/// (`videos/{id}/HLS/...`) and is what clients pass as `?format=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamFormat {
    Hls,
    Dash,
}

impl StreamFormat {
    pub const ALL: [StreamFormat; 2] = [StreamFormat::Hls, StreamFormat::Dash];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "HLS",
            StreamFormat::Dash => "DASH",
        }
    }

    /// File name of the top-level manifest the encoder writes for this format.
    pub fn manifest_name(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "playlist.m3u8",
            StreamFormat::Dash => "manifest.mpd",
        }
    }

    /// Extension of media segments, used when counting published segments.
    pub fn segment_extension(&self) -> &'static str {
        match self {
            StreamFormat::Hls => "ts",
            StreamFormat::Dash => "m4s",
        }
    }
}

impl Display for StreamFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamFormat {
    type Err = anyhow::Error;

    /// Exact, case-sensitive match on `HLS` / `DASH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HLS" => Ok(StreamFormat::Hls),
            "DASH" => Ok(StreamFormat::Dash),
            _ => Err(anyhow::anyhow!("Invalid stream format: {}", s)),
        }
    }
}

/// One rendition of the bitrate/resolution ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LadderRung {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
}

impl LadderRung {
    pub const fn new(name: &'static str, width: u32, height: u32, video_bitrate_kbps: u32) -> Self {
        Self {
            name,
            width,
            height,
            video_bitrate_kbps,
        }
    }

    /// `640x360` style size argument.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// `800k` style bitrate argument.
    pub fn bitrate(&self) -> String {
        format!("{}k", self.video_bitrate_kbps)
    }
}
