//! Data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status a [`Job`] can be in. Transitions are monotone along
/// `pending -> processing -> (completed | failed | cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether `self -> to` is a legal transition per the §3 DAG.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Pending, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// A single render request and its outcome, owned exclusively by the
/// [`crate::store::JobStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub config: VideoProject,
    pub output_id: Option<String>,
    pub error: Option<String>,
    /// Non-fatal degradation surfaced to the client without failing the job
    /// (e.g. a per-scene transcription failure). See spec §9 open question.
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(config: VideoProject) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            progress: 0,
            config,
            output_id: None,
            error: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// The declarative video description clients submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProject {
    pub scenes: Vec<Scene>,
    /// Project-scope elements: exactly one `video` element is expected here.
    pub elements: Vec<Element>,
    #[serde(default)]
    pub quality: Quality,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Video {
        src: String,
        #[serde(default)]
        duration: f64,
    },
    Audio {
        src: String,
        #[serde(default)]
        duration: f64,
        #[serde(default = "default_language")]
        language: String,
    },
    Image {
        src: String,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        #[serde(default)]
        z: i32,
    },
    Subtitles {
        #[serde(default = "default_language")]
        language: String,
        #[serde(default)]
        settings: SubtitleSettingsInput,
    },
}

fn default_language() -> String {
    "en".to_string()
}

/// Raw, partially-specified subtitle settings as received over the wire.
/// Every field is optional; [`SubtitleSettings::merge`] fills gaps from
/// global defaults. Field names follow the §6 JSON payload's kebab-case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtitleSettingsInput {
    pub style: Option<SubtitleStyle>,
    #[serde(rename = "font-family")]
    pub font_family: Option<String>,
    #[serde(rename = "font-size")]
    pub font_size: Option<i32>,
    #[serde(rename = "word-color")]
    pub word_color: Option<String>,
    #[serde(rename = "line-color")]
    pub line_color: Option<String>,
    #[serde(rename = "outline-color")]
    pub outline_color: Option<String>,
    #[serde(rename = "outline-width")]
    pub outline_width: Option<i32>,
    #[serde(rename = "shadow-color")]
    pub shadow_color: Option<String>,
    #[serde(rename = "shadow-offset")]
    pub shadow_offset: Option<i32>,
    #[serde(rename = "box-color")]
    pub box_color: Option<String>,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStyle {
    Progressive,
    Classic,
}

/// Nine-way grid position: {left,center,right} x {top,center,bottom}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    LeftTop,
    CenterTop,
    RightTop,
    LeftCenter,
    CenterCenter,
    RightCenter,
    LeftBottom,
    CenterBottom,
    RightBottom,
}

/// Settings fully merged with global defaults (§4.6). Always valid: field
/// ranges are enforced by [`SubtitleSettings::validate`] after merge, not at
/// parse time, so merging itself stays total.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSettings {
    pub style: SubtitleStyle,
    pub font_family: String,
    pub font_size: i32,
    pub word_color: String,
    pub line_color: String,
    pub outline_color: String,
    pub outline_width: i32,
    pub shadow_color: String,
    pub shadow_offset: i32,
    pub box_color: String,
    pub position: Position,
}

impl SubtitleSettings {
    pub fn merge(input: &SubtitleSettingsInput, defaults: &SubtitleSettings) -> Self {
        Self {
            style: input.style.unwrap_or(defaults.style),
            font_family: input
                .font_family
                .clone()
                .unwrap_or_else(|| defaults.font_family.clone()),
            font_size: input.font_size.unwrap_or(defaults.font_size),
            word_color: input
                .word_color
                .clone()
                .unwrap_or_else(|| defaults.word_color.clone()),
            line_color: input
                .line_color
                .clone()
                .unwrap_or_else(|| defaults.line_color.clone()),
            outline_color: input
                .outline_color
                .clone()
                .unwrap_or_else(|| defaults.outline_color.clone()),
            outline_width: input.outline_width.unwrap_or(defaults.outline_width),
            shadow_color: input
                .shadow_color
                .clone()
                .unwrap_or_else(|| defaults.shadow_color.clone()),
            shadow_offset: input.shadow_offset.unwrap_or(defaults.shadow_offset),
            box_color: input
                .box_color
                .clone()
                .unwrap_or_else(|| defaults.box_color.clone()),
            position: input.position.unwrap_or(defaults.position),
        }
    }

    /// Post-merge validation (§4.6): font size in [6, 300], outline width and
    /// shadow offset in [0, 20], colors starting with `#` are 6 hex digits.
    pub fn validate(&self) -> Result<(), String> {
        if !(6..=300).contains(&self.font_size) {
            return Err(format!("font size {} out of range [6, 300]", self.font_size));
        }
        if !(0..=20).contains(&self.outline_width) {
            return Err(format!(
                "outline width {} out of range [0, 20]",
                self.outline_width
            ));
        }
        if !(0..=20).contains(&self.shadow_offset) {
            return Err(format!(
                "shadow offset {} out of range [0, 20]",
                self.shadow_offset
            ));
        }
        for (name, color) in [
            ("word-color", &self.word_color),
            ("line-color", &self.line_color),
            ("outline-color", &self.outline_color),
            ("shadow-color", &self.shadow_color),
            ("box-color", &self.box_color),
        ] {
            validate_hex_color(name, color)?;
        }
        Ok(())
    }
}

fn validate_hex_color(name: &str, value: &str) -> Result<(), String> {
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("{name} is not a 6-hex-digit color: {value}"));
        }
    }
    Ok(())
}

/// A `[start, end)` interval on the video timeline, tagged with the audio
/// source that defined it (§3). Segment `i`'s start equals segment `i-1`'s
/// end; `timings[0].start == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSegment {
    pub start: f64,
    pub end: f64,
}

impl TimingSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A `[start, end)` subtitle event with text and a layer index (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEvent {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub layer: u32,
}

/// A single transcribed word with its offsets relative to the start of its
/// own audio clip (§6 wire protocol `word_timestamps`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Result of transcribing one audio clip (§3). `success = false` models a
/// per-clip failure that degrades its scene to "no subtitles" (§4.11 step 3)
/// without failing the job.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: String,
    pub duration: f64,
    #[serde(default)]
    pub word_timestamps: Vec<WordTiming>,
    pub success: bool,
}

impl TranscriptionResult {
    pub fn failed() -> Self {
        Self {
            text: String::new(),
            language: String::new(),
            duration: 0.0,
            word_timestamps: Vec::new(),
            success: false,
        }
    }
}
