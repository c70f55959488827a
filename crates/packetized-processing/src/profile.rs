//! Versioned encoder parameter profiles.
//!
//! A profile fixes codec settings, the bitrate ladder and segmenting for both
//! container families, and turns them into an ffmpeg argument vector.

use std::path::Path;

use packetized_core::{LadderRung, StreamFormat};

/// 360p / 720p / 1080p ladder shared by HLS and DASH.
pub const DEFAULT_LADDER: [LadderRung; 3] = [
    LadderRung::new("360p", 640, 360, 800),
    LadderRung::new("720p", 1280, 720, 1400),
    LadderRung::new("1080p", 1920, 1080, 2800),
];

/// Fixed encode parameters. Changing any value means a new `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProfile {
    pub version: &'static str,
    pub ladder: Vec<LadderRung>,
    pub segment_duration_secs: u32,
    pub preset: &'static str,
    pub gop_size: u32,
    pub video_codec: &'static str,
    pub crf: u32,
    pub h264_profile: &'static str,
    pub audio_codec: &'static str,
    pub audio_sample_rate: u32,
    pub audio_bitrate_kbps: u32,
    /// Constant output frame rate forced for DASH so segment boundaries line up.
    pub dash_frame_rate: u32,
}

impl EncodeProfile {
    pub fn v1() -> Self {
        Self {
            version: "v1",
            ladder: DEFAULT_LADDER.to_vec(),
            segment_duration_secs: 10,
            preset: "fast",
            gop_size: 48,
            video_codec: "libx264",
            crf: 23,
            h264_profile: "main",
            audio_codec: "aac",
            audio_sample_rate: 48000,
            audio_bitrate_kbps: 128,
            dash_frame_rate: 30,
        }
    }

    /// HLS variant playlist and segment directory for a rung, relative to the output dir.
    pub fn hls_variant_dir(rung: &LadderRung) -> &'static str {
        rung.name
    }

    /// Full ffmpeg argument vector (without the program name) for one format.
    pub fn ffmpeg_args(&self, format: StreamFormat, input: &Path, output_dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-nostdin".into(),
            "-i".into(),
            path_arg(input),
            "-preset".into(),
            self.preset.into(),
            "-g".into(),
            self.gop_size.to_string(),
            "-sc_threshold".into(),
            "0".into(),
        ];

        match format {
            StreamFormat::Hls => {
                // One video and one audio output stream per variant.
                for _ in &self.ladder {
                    args.extend([
                        "-map".to_string(),
                        "0:v:0".to_string(),
                        "-map".to_string(),
                        "0:a:0".to_string(),
                    ]);
                }
            }
            StreamFormat::Dash => {
                args.extend([
                    "-r".to_string(),
                    self.dash_frame_rate.to_string(),
                    "-vsync".to_string(),
                    "cfr".to_string(),
                ]);
                for _ in &self.ladder {
                    args.extend(["-map".to_string(), "0:v:0".to_string()]);
                }
                args.extend(["-map".to_string(), "0:a:0".to_string()]);
            }
        }

        args.extend([
            "-c:v".to_string(),
            self.video_codec.to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-profile:v".to_string(),
            self.h264_profile.to_string(),
            "-c:a".to_string(),
            self.audio_codec.to_string(),
            "-ar".to_string(),
            self.audio_sample_rate.to_string(),
            "-b:a".to_string(),
            format!("{}k", self.audio_bitrate_kbps),
        ]);

        for (index, rung) in self.ladder.iter().enumerate() {
            args.extend([
                format!("-b:v:{}", index),
                rung.bitrate(),
                format!("-s:v:{}", index),
                rung.size(),
            ]);
        }

        match format {
            StreamFormat::Hls => {
                let var_stream_map = self
                    .ladder
                    .iter()
                    .enumerate()
                    .map(|(index, rung)| format!("v:{i},a:{i},name:{}", rung.name, i = index))
                    .collect::<Vec<_>>()
                    .join(" ");

                args.extend([
                    "-f".to_string(),
                    "hls".to_string(),
                    "-hls_time".to_string(),
                    self.segment_duration_secs.to_string(),
                    "-hls_playlist_type".to_string(),
                    "vod".to_string(),
                    "-hls_flags".to_string(),
                    "independent_segments".to_string(),
                    "-master_pl_name".to_string(),
                    StreamFormat::Hls.manifest_name().to_string(),
                    "-var_stream_map".to_string(),
                    var_stream_map,
                    "-hls_segment_filename".to_string(),
                    path_arg(&output_dir.join("%v").join("segment_%03d.ts")),
                    path_arg(&output_dir.join("%v").join("index.m3u8")),
                ]);
            }
            StreamFormat::Dash => {
                args.extend([
                    "-f".to_string(),
                    "dash".to_string(),
                    "-adaptation_sets".to_string(),
                    "id=0,streams=v id=1,streams=a".to_string(),
                    "-seg_duration".to_string(),
                    self.segment_duration_secs.to_string(),
                    "-use_timeline".to_string(),
                    "1".to_string(),
                    "-use_template".to_string(),
                    "1".to_string(),
                    "-init_seg_name".to_string(),
                    "init-stream$RepresentationID$.m4s".to_string(),
                    "-media_seg_name".to_string(),
                    "chunk-stream$RepresentationID$-$Number$.m4s".to_string(),
                    path_arg(&output_dir.join(StreamFormat::Dash.manifest_name())),
                ]);
            }
        }

        args
    }
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self::v1()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
