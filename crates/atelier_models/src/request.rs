//! Typed generation requests.
//!
//! [`GenerationRequest`] is a closed set: one payload struct per
//! [`RequestType`]. Each request type routes through a single capability key
//! and targets one [`ModelKind`].

use crate::error::ValidationError;
use crate::model::ModelKind;
use serde::{Deserialize, Serialize};

/// The kind of generation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestType {
    /// Vector icon generation.
    IconGen,
    /// Text-to-image generation.
    ImageGen,
    /// Text/image-to-video generation.
    VideoGen,
    /// Text-to-speech.
    AudioTts,
    /// Stem separation.
    AudioDemix,
    /// Loudness mastering.
    AudioMaster,
    /// Depth map estimation.
    Depth,
    /// Masked inpainting.
    RetouchInpaint,
    /// Subject/background compositing.
    VfxComposite,
    /// Video stabilization.
    VideoStabilize,
    /// Concept fine-tuning.
    ForgeTraining,
}

impl RequestType {
    /// Every request type, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::IconGen,
        Self::ImageGen,
        Self::VideoGen,
        Self::AudioTts,
        Self::AudioDemix,
        Self::AudioMaster,
        Self::Depth,
        Self::RetouchInpaint,
        Self::VfxComposite,
        Self::VideoStabilize,
        Self::ForgeTraining,
    ];

    /// Returns the wire name (e.g., `"audio-tts"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IconGen => "icon-gen",
            Self::ImageGen => "image-gen",
            Self::VideoGen => "video-gen",
            Self::AudioTts => "audio-tts",
            Self::AudioDemix => "audio-demix",
            Self::AudioMaster => "audio-master",
            Self::Depth => "depth",
            Self::RetouchInpaint => "retouch-inpaint",
            Self::VfxComposite => "vfx-composite",
            Self::VideoStabilize => "video-stabilize",
            Self::ForgeTraining => "forge-training",
        }
    }

    /// Returns the capability key a model must declare to serve this type.
    #[must_use]
    pub fn capability(self) -> &'static str {
        match self {
            Self::IconGen => "txt2icon",
            Self::ImageGen => "txt2img",
            Self::VideoGen => "txt2vid",
            Self::AudioTts => "tts",
            Self::AudioDemix => "demix",
            Self::AudioMaster => "mastering",
            Self::Depth => "depth",
            Self::RetouchInpaint => "inpainting",
            Self::VfxComposite => "composite",
            Self::VideoStabilize => "stabilize",
            Self::ForgeTraining => "training",
        }
    }

    /// Returns the model kind that serves this type.
    #[must_use]
    pub fn model_kind(self) -> ModelKind {
        match self {
            Self::IconGen
            | Self::ImageGen
            | Self::Depth
            | Self::RetouchInpaint
            | Self::VfxComposite
            | Self::ForgeTraining => ModelKind::Image,
            Self::VideoGen | Self::VideoStabilize => ModelKind::Video,
            Self::AudioTts | Self::AudioDemix | Self::AudioMaster => ModelKind::Audio,
        }
    }
}

impl core::fmt::Display for RequestType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Icon generation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconRequest {
    /// What the icon depicts.
    pub prompt: String,
    /// Optional style preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Image generation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    /// Text prompt.
    pub prompt: String,
    /// Optional style preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Aspect ratio (`"W:H"`).
    #[serde(default = "default_image_aspect")]
    pub aspect_ratio: String,
}

/// Video generation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    /// Text prompt.
    pub prompt: String,
    /// Optional first frame for image-to-video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Clip length in seconds.
    #[serde(default = "default_video_duration")]
    pub duration_secs: u32,
    /// Aspect ratio (`"W:H"`).
    #[serde(default = "default_video_aspect")]
    pub aspect_ratio: String,
    /// Output quality (e.g., `"1080p"`).
    #[serde(default = "default_video_quality")]
    pub quality: String,
    /// Reference images blended into the clip.
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Text-to-speech payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    /// Text to speak.
    pub text: String,
    /// Voice identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// BCP 47 language tag.
    #[serde(default = "default_language")]
    pub language: String,
}

/// Stem separation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemixRequest {
    /// Source audio.
    pub audio_url: String,
    /// Stems to extract.
    #[serde(default = "default_stems")]
    pub stems: Vec<String>,
}

/// Mastering payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterRequest {
    /// Source audio.
    pub audio_url: String,
    /// Integrated loudness target.
    #[serde(default = "default_target_lufs")]
    pub target_lufs: f32,
}

/// Depth estimation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthRequest {
    /// Source image.
    pub image_url: String,
    /// Estimator variant.
    #[serde(default = "default_depth_model")]
    pub model_variant: String,
}

/// Inpainting payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InpaintRequest {
    /// Source image.
    pub image_url: String,
    /// Mask marking the region to repaint.
    pub mask_url: String,
    /// What to paint into the masked region.
    pub prompt: String,
}

/// Compositing mode for [`CompositeRequest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeMode {
    /// Learned subject matting.
    #[default]
    AlphaMatting,
    /// Green/blue screen keying.
    ChromaKey,
}

/// VFX compositing payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRequest {
    /// Foreground subject.
    pub subject_url: String,
    /// Background plate.
    pub background_url: String,
    /// Extraction mode.
    #[serde(default)]
    pub mode: CompositeMode,
}

/// Stabilization payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizeRequest {
    /// Source video.
    pub video_url: String,
    /// Smoothing strength in `0.0..=1.0`.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

/// Concept training payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    /// Training images.
    pub images: Vec<String>,
    /// Name of the concept being learned.
    pub concept_name: String,
    /// Prompt used to invoke the concept.
    pub instance_prompt: String,
}

fn default_image_aspect() -> String {
    "1:1".to_string()
}

fn default_video_aspect() -> String {
    "16:9".to_string()
}

fn default_video_duration() -> u32 {
    8
}

fn default_video_quality() -> String {
    "1080p".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_stems() -> Vec<String> {
    ["vocals", "drums", "bass", "other"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_target_lufs() -> f32 {
    -14.0
}

fn default_depth_model() -> String {
    "v2-large".to_string()
}

fn default_intensity() -> f32 {
    0.5
}

// ─────────────────────────────────────────────────────────────────────────────
// GenerationRequest
// ─────────────────────────────────────────────────────────────────────────────

/// A typed generation request.
///
/// Serialized with a `type` tag carrying the [`RequestType`] wire name:
///
/// ```
/// use atelier_models::{GenerationRequest, RequestType};
///
/// let request: GenerationRequest =
///     serde_json::from_str(r#"{ "type": "audio-tts", "text": "hello" }"#).unwrap();
/// assert_eq!(request.request_type(), RequestType::AudioTts);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GenerationRequest {
    /// See [`IconRequest`].
    IconGen(IconRequest),
    /// See [`ImageRequest`].
    ImageGen(ImageRequest),
    /// See [`VideoRequest`].
    VideoGen(VideoRequest),
    /// See [`SpeechRequest`].
    AudioTts(SpeechRequest),
    /// See [`DemixRequest`].
    AudioDemix(DemixRequest),
    /// See [`MasterRequest`].
    AudioMaster(MasterRequest),
    /// See [`DepthRequest`].
    Depth(DepthRequest),
    /// See [`InpaintRequest`].
    RetouchInpaint(InpaintRequest),
    /// See [`CompositeRequest`].
    VfxComposite(CompositeRequest),
    /// See [`StabilizeRequest`].
    VideoStabilize(StabilizeRequest),
    /// See [`TrainingRequest`].
    ForgeTraining(TrainingRequest),
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}

fn require_ratio(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let valid = value
        .split_once(':')
        .is_some_and(|(w, h)| w.parse::<u32>().is_ok_and(|w| w > 0) && h.parse::<u32>().is_ok_and(|h| h > 0));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new(field, format!("'{value}' is not W:H")))
    }
}

impl GenerationRequest {
    /// Returns the request type.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::IconGen(_) => RequestType::IconGen,
            Self::ImageGen(_) => RequestType::ImageGen,
            Self::VideoGen(_) => RequestType::VideoGen,
            Self::AudioTts(_) => RequestType::AudioTts,
            Self::AudioDemix(_) => RequestType::AudioDemix,
            Self::AudioMaster(_) => RequestType::AudioMaster,
            Self::Depth(_) => RequestType::Depth,
            Self::RetouchInpaint(_) => RequestType::RetouchInpaint,
            Self::VfxComposite(_) => RequestType::VfxComposite,
            Self::VideoStabilize(_) => RequestType::VideoStabilize,
            Self::ForgeTraining(_) => RequestType::ForgeTraining,
        }
    }

    /// Returns the text prompt, for request types that carry one.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        match self {
            Self::IconGen(r) => Some(&r.prompt),
            Self::ImageGen(r) => Some(&r.prompt),
            Self::VideoGen(r) => Some(&r.prompt),
            Self::AudioTts(r) => Some(&r.text),
            Self::RetouchInpaint(r) => Some(&r.prompt),
            Self::ForgeTraining(r) => Some(&r.instance_prompt),
            Self::AudioDemix(_)
            | Self::AudioMaster(_)
            | Self::Depth(_)
            | Self::VfxComposite(_)
            | Self::VideoStabilize(_) => None,
        }
    }

    /// Checks the payload for missing or out-of-range fields.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::IconGen(r) => require("prompt", &r.prompt),
            Self::ImageGen(r) => {
                require("prompt", &r.prompt)?;
                require_ratio("aspectRatio", &r.aspect_ratio)
            }
            Self::VideoGen(r) => {
                if r.prompt.trim().is_empty() && r.image_url.is_none() {
                    return Err(ValidationError::new(
                        "prompt",
                        "a prompt or an image url is required",
                    ));
                }
                if r.duration_secs == 0 || r.duration_secs > 120 {
                    return Err(ValidationError::new(
                        "durationSecs",
                        format!("{} is outside 1..=120", r.duration_secs),
                    ));
                }
                require_ratio("aspectRatio", &r.aspect_ratio)
            }
            Self::AudioTts(r) => require("text", &r.text),
            Self::AudioDemix(r) => {
                require("audioUrl", &r.audio_url)?;
                if r.stems.is_empty() {
                    return Err(ValidationError::new("stems", "at least one stem is required"));
                }
                Ok(())
            }
            Self::AudioMaster(r) => {
                require("audioUrl", &r.audio_url)?;
                if !(-60.0..=0.0).contains(&r.target_lufs) {
                    return Err(ValidationError::new(
                        "targetLufs",
                        format!("{} is outside -60..=0", r.target_lufs),
                    ));
                }
                Ok(())
            }
            Self::Depth(r) => require("imageUrl", &r.image_url),
            Self::RetouchInpaint(r) => {
                require("imageUrl", &r.image_url)?;
                require("maskUrl", &r.mask_url)?;
                require("prompt", &r.prompt)
            }
            Self::VfxComposite(r) => {
                require("subjectUrl", &r.subject_url)?;
                require("backgroundUrl", &r.background_url)
            }
            Self::VideoStabilize(r) => {
                require("videoUrl", &r.video_url)?;
                if !(0.0..=1.0).contains(&r.intensity) {
                    return Err(ValidationError::new(
                        "intensity",
                        format!("{} is outside 0..=1", r.intensity),
                    ));
                }
                Ok(())
            }
            Self::ForgeTraining(r) => {
                if r.images.is_empty() {
                    return Err(ValidationError::new("images", "at least one image is required"));
                }
                require("conceptName", &r.concept_name)?;
                require("instancePrompt", &r.instance_prompt)
            }
        }
    }

    /// Builds a text-to-speech request with default language.
    #[must_use]
    pub fn speech(text: impl Into<String>) -> Self {
        Self::AudioTts(SpeechRequest {
            text: text.into(),
            voice_id: None,
            language: default_language(),
        })
    }

    /// Builds an image request with default aspect ratio.
    #[must_use]
    pub fn image(prompt: impl Into<String>) -> Self {
        Self::ImageGen(ImageRequest {
            prompt: prompt.into(),
            style: None,
            aspect_ratio: default_image_aspect(),
        })
    }

    /// Builds a video request with default duration, aspect ratio and quality.
    #[must_use]
    pub fn video(prompt: impl Into<String>) -> Self {
        Self::VideoGen(VideoRequest {
            prompt: prompt.into(),
            image_url: None,
            duration_secs: default_video_duration(),
            aspect_ratio: default_video_aspect(),
            quality: default_video_quality(),
            ingredients: Vec::new(),
        })
    }
}
