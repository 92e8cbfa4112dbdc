//! Generation results returned by adapters.

use crate::request::RequestType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of a completed generation.
///
/// The variant always corresponds to the [`RequestType`] of the job that
/// produced it; see [`GenerationResult::request_type`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GenerationResult {
    /// A vector icon.
    #[serde(rename_all = "camelCase")]
    IconGen {
        /// SVG output.
        svg_url: String,
        /// Optional raster preview.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        png_url: Option<String>,
    },
    /// One or more images.
    #[serde(rename_all = "camelCase")]
    ImageGen {
        /// Generated images.
        image_urls: Vec<String>,
    },
    /// A video clip.
    #[serde(rename_all = "camelCase")]
    VideoGen {
        /// The clip.
        video_url: String,
        /// Optional poster frame.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    /// Synthesized speech.
    #[serde(rename_all = "camelCase")]
    AudioTts {
        /// The audio file.
        audio_url: String,
    },
    /// Separated stems keyed by stem name.
    #[serde(rename_all = "camelCase")]
    AudioDemix {
        /// Stem name to audio url.
        stem_urls: BTreeMap<String, String>,
    },
    /// Mastered audio.
    #[serde(rename_all = "camelCase")]
    AudioMaster {
        /// The mastered file.
        mastered_audio_url: String,
    },
    /// A depth map.
    #[serde(rename_all = "camelCase")]
    Depth {
        /// Grayscale depth image.
        depth_map_url: String,
    },
    /// An inpainted image.
    #[serde(rename_all = "camelCase")]
    RetouchInpaint {
        /// The repainted image.
        inpainted_image_url: String,
    },
    /// A composited image.
    #[serde(rename_all = "camelCase")]
    VfxComposite {
        /// The composite.
        composition_url: String,
    },
    /// A stabilized video.
    #[serde(rename_all = "camelCase")]
    VideoStabilize {
        /// The stabilized clip.
        stabilized_video_url: String,
    },
    /// A trained concept.
    #[serde(rename_all = "camelCase")]
    ForgeTraining {
        /// Location of the trained weights.
        model_path: String,
    },
}

/// Visual output of a result, suitable for attaching to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOutput<'a> {
    /// An image url.
    Image(&'a str),
    /// A video url.
    Video(&'a str),
}

impl GenerationResult {
    /// Returns the request type this result answers.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::IconGen { .. } => RequestType::IconGen,
            Self::ImageGen { .. } => RequestType::ImageGen,
            Self::VideoGen { .. } => RequestType::VideoGen,
            Self::AudioTts { .. } => RequestType::AudioTts,
            Self::AudioDemix { .. } => RequestType::AudioDemix,
            Self::AudioMaster { .. } => RequestType::AudioMaster,
            Self::Depth { .. } => RequestType::Depth,
            Self::RetouchInpaint { .. } => RequestType::RetouchInpaint,
            Self::VfxComposite { .. } => RequestType::VfxComposite,
            Self::VideoStabilize { .. } => RequestType::VideoStabilize,
            Self::ForgeTraining { .. } => RequestType::ForgeTraining,
        }
    }

    /// Returns image and video outputs. Audio and training outputs yield nothing.
    #[must_use]
    pub fn media(&self) -> Vec<MediaOutput<'_>> {
        match self {
            Self::IconGen { svg_url, .. } => vec![MediaOutput::Image(svg_url)],
            Self::ImageGen { image_urls } => {
                image_urls.iter().map(|u| MediaOutput::Image(u)).collect()
            }
            Self::VideoGen { video_url, .. } => vec![MediaOutput::Video(video_url)],
            Self::Depth { depth_map_url } => vec![MediaOutput::Image(depth_map_url)],
            Self::RetouchInpaint {
                inpainted_image_url,
            } => vec![MediaOutput::Image(inpainted_image_url)],
            Self::VfxComposite { composition_url } => vec![MediaOutput::Image(composition_url)],
            Self::VideoStabilize {
                stabilized_video_url,
            } => vec![MediaOutput::Video(stabilized_video_url)],
            Self::AudioTts { .. }
            | Self::AudioDemix { .. }
            | Self::AudioMaster { .. }
            | Self::ForgeTraining { .. } => Vec::new(),
        }
    }

    /// Returns the poster frame of a video result.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        match self {
            Self::VideoGen { thumbnail_url, .. } => thumbnail_url.as_deref(),
            Self::IconGen { png_url, .. } => png_url.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_serialize_camel_case() {
        let result = GenerationResult::AudioMaster {
            mastered_audio_url: "m.wav".into(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "type": "audio-master", "masteredAudioUrl": "m.wav" })
        );
    }

    #[test]
    fn image_results_expose_every_url() {
        let result: GenerationResult = serde_json::from_value(json!({
            "type": "image-gen",
            "imageUrls": ["a.png", "b.png"]
        }))
        .unwrap();

        assert_eq!(result.request_type(), RequestType::ImageGen);
        assert_eq!(
            result.media(),
            vec![MediaOutput::Image("a.png"), MediaOutput::Image("b.png")]
        );
    }

    #[test]
    fn audio_results_have_no_media() {
        let result = GenerationResult::AudioTts {
            audio_url: "s.mp3".into(),
        };
        assert!(result.media().is_empty());
    }
}
