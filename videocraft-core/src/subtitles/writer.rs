//! Subtitle file writer (§4.6, C6) — serializes events into the
//! transcoder's styled-subtitle (ASS/SSA `V4+`) format described in §6.

use crate::error::CoreError;
use crate::types::{Position, SubtitleEvent, SubtitleSettings};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Write `events` styled with `settings` to a fresh file under `temp_dir`,
/// written atomically (temp file + rename) so a reader never observes a
/// partial write.
pub async fn write(
    events: &[SubtitleEvent],
    settings: &SubtitleSettings,
    temp_dir: &std::path::Path,
) -> Result<PathBuf, CoreError> {
    settings
        .validate()
        .map_err(|e| CoreError::InvalidInput(format!("invalid subtitle settings: {e}")))?;

    let contents = serialize(events, settings);

    let final_path = temp_dir.join(format!("{}.ass", Uuid::new_v4().simple()));
    let tmp_path = temp_dir.join(format!("{}.ass.tmp", Uuid::new_v4().simple()));

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| CoreError::Internal(format!("failed to create subtitle temp file: {e}")))?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(|e| CoreError::Internal(format!("failed to write subtitle file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| CoreError::Internal(format!("failed to flush subtitle file: {e}")))?;
    drop(file);

    tokio::fs::rename(&tmp_path, &final_path)
        .await
        .map_err(|e| CoreError::Internal(format!("failed to finalize subtitle file: {e}")))?;

    Ok(final_path)
}

fn serialize(events: &[SubtitleEvent], settings: &SubtitleSettings) -> String {
    let mut out = String::new();

    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    out.push_str("Collisions: Normal\n");
    out.push_str("PlayResX: 1920\n");
    out.push_str("PlayResY: 1080\n\n");

    out.push_str("[V4+ Styles]\n");
    out.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    out.push_str(&format!(
        "Style: Default,{font},{size},{primary},{secondary},{outline_color},{back},0,0,0,0,100,100,0,0,1,{outline},{shadow},{alignment},10,10,10,1\n\n",
        font = settings.font_family,
        size = settings.font_size,
        primary = ass_color(&settings.word_color),
        secondary = ass_color(&settings.line_color),
        outline_color = ass_color(&settings.outline_color),
        back = ass_color(&settings.box_color),
        outline = settings.outline_width,
        shadow = settings.shadow_offset,
        alignment = alignment_code(settings.position),
    ));

    out.push_str("[Events]\n");
    out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for event in events {
        out.push_str(&format!(
            "Dialogue: {layer},{start},{end},Default,,0,0,0,,{text}\n",
            layer = event.layer,
            start = format_time(event.start),
            end = format_time(event.end),
            text = escape_text(&event.text),
        ));
    }

    out
}

/// `#RRGGBB` -> ASS's reversed-channel `&H00BBGGRR`.
fn ass_color(hex: &str) -> String {
    let stripped = hex.strip_prefix('#').unwrap_or(hex);
    if stripped.len() != 6 {
        return "&H00FFFFFF".to_string();
    }
    let r = &stripped[0..2];
    let g = &stripped[2..4];
    let b = &stripped[4..6];
    format!("&H00{b}{g}{r}").to_uppercase()
}

/// Nine-way grid position to ASS numpad alignment (1-9).
fn alignment_code(position: Position) -> u8 {
    match position {
        Position::LeftBottom => 1,
        Position::CenterBottom => 2,
        Position::RightBottom => 3,
        Position::LeftCenter => 4,
        Position::CenterCenter => 5,
        Position::RightCenter => 6,
        Position::LeftTop => 7,
        Position::CenterTop => 8,
        Position::RightTop => 9,
    }
}

/// `H:MM:SS.CC` (centiseconds), as required by the transcoder's
/// styled-subtitle format (§6).
fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_cs = (seconds * 100.0).round() as i64;
    let hours = total_cs / 360000;
    let minutes = (total_cs / 6000) % 60;
    let secs = (total_cs / 100) % 60;
    let cs = total_cs % 100;
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

fn escape_text(text: &str) -> String {
    text.replace('{', "\\{")
        .replace('}', "\\}")
        .replace('|', "\\h")
        .replace('\n', "\\N")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubtitleStyle;

    fn settings() -> SubtitleSettings {
        SubtitleSettings {
            style: SubtitleStyle::Progressive,
            font_family: "Arial".to_string(),
            font_size: 24,
            word_color: "#FFD700".to_string(),
            line_color: "#FFFFFF".to_string(),
            outline_color: "#000000".to_string(),
            outline_width: 1,
            shadow_color: "#808080".to_string(),
            shadow_offset: 2,
            box_color: "#000000".to_string(),
            position: Position::CenterBottom,
        }
    }

    #[test]
    fn formats_time_as_h_mm_ss_cc() {
        assert_eq!(format_time(0.0), "0:00:00.00");
        assert_eq!(format_time(41.36), "0:00:41.36");
        assert_eq!(format_time(3661.5), "1:01:01.50");
    }

    #[test]
    fn converts_hex_color_to_reversed_ass_hex() {
        assert_eq!(ass_color("#FFD700"), "&H0000D7FF");
        assert_eq!(ass_color("#000000"), "&H00000000");
    }

    #[test]
    fn escapes_braces_pipe_and_newline() {
        assert_eq!(escape_text("a{b}c|d\ne"), "a\\{b\\}c\\hd\\Ne");
    }

    #[test]
    fn center_bottom_maps_to_alignment_two() {
        assert_eq!(alignment_code(Position::CenterBottom), 2);
    }

    #[tokio::test]
    async fn writes_file_atomically_and_includes_dialogue_lines() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![SubtitleEvent {
            start: 0.0,
            end: 1.0,
            text: "hi".to_string(),
            layer: 0,
        }];
        let path = write(&events, &settings(), dir.path()).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("[Events]"));
        assert!(contents.contains("Dialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,hi"));
        // no leftover temp file
        let tmp_exists = tokio::fs::try_exists(path.with_extension("ass.tmp"))
            .await
            .unwrap_or(false);
        assert!(!tmp_exists);
    }

    #[test]
    fn rejects_out_of_range_font_size_after_merge() {
        let mut bad = settings();
        bad.font_size = 1000;
        assert!(bad.validate().is_err());
    }
}
