//! Transcoder argument-vector builder (§4.3, C3).
//!
//! Security-first: every value lands in its own `Vec<String>` slot. There is
//! no string concatenation anywhere near user input, which structurally
//! rules out shell-injection; the resulting argv feeds a `tokio::process
//! ::Command` purely through `.arg()` calls, never a shell string.

use crate::error::CoreError;
use crate::types::{Element, Quality, TimingSegment, VideoProject};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const AUDIO_TAIL_PAD_SECS: f64 = 2.0;
const IMAGE_FALLBACK_SLOT_SECS: f64 = 5.0;
const PROTOCOL_WHITELIST: &str = "file,http,https,tcp,tls";

const INJECTION_CHARS: &[char] = &[';', '|', '`', '$', '(', ')', '{', '}'];

/// Output of [`build`]: the argv to pass to the transcoder and the path the
/// output file will be written to.
#[derive(Debug, Clone)]
pub struct TranscoderCommand {
    pub argv: Vec<String>,
    pub output_path: PathBuf,
}

/// Build the transcoder argv for `project`. Callers MUST have already run
/// [`crate::validation::validate_config`] on `project` (precondition, §4.3).
///
/// `audio_durations` holds one measured duration per audio element in scene
/// order (from [`crate::probe::probe`]); `scene_timings` is the contiguous
/// timeline built from those durations.
pub fn build(
    project: &VideoProject,
    audio_durations: &[f64],
    scene_timings: &[TimingSegment],
    output_dir: &Path,
    subtitle_path: Option<&Path>,
) -> Result<TranscoderCommand, CoreError> {
    let background = find_background_video(project)?;
    let audio_elements = collect_audio(project);
    let image_elements = collect_images(project);

    if audio_elements.is_empty() {
        return Err(CoreError::InvalidInput(
            "project has no audio elements".to_string(),
        ));
    }

    reject_injection_chars(&background.src)?;
    for audio in &audio_elements {
        reject_injection_chars(audio)?;
    }
    for image in &image_elements {
        reject_injection_chars(&image.src)?;
    }
    if let Some(path) = subtitle_path {
        reject_injection_chars(&path.to_string_lossy())?;
    }
    if audio_durations.len() != audio_elements.len() {
        return Err(CoreError::Internal(
            "audio_durations length does not match audio element count".to_string(),
        ));
    }

    let total_duration: f64 = audio_durations.iter().sum::<f64>() + AUDIO_TAIL_PAD_SECS;
    let loops_needed = if background.duration > 0.0 {
        (total_duration / background.duration).ceil().max(1.0) as u64
    } else {
        1
    };

    let mut argv: Vec<String> = vec![
        "-y".to_string(),
        "-protocol_whitelist".to_string(),
        PROTOCOL_WHITELIST.to_string(),
    ];

    // Input 0: background video, looped to cover the audio.
    argv.push("-stream_loop".to_string());
    argv.push(loops_needed.to_string());
    argv.push("-i".to_string());
    argv.push(background.src.clone());

    // Inputs 1..=N: audio, in scene order.
    for audio in &audio_elements {
        argv.push("-i".to_string());
        argv.push(audio.clone());
    }

    // Inputs N+1..: images, in scene order.
    for image in &image_elements {
        argv.push("-i".to_string());
        argv.push(image.src.clone());
    }

    let (filter_complex, final_video_label, final_audio_present) = build_filter_graph(
        audio_elements.len(),
        &image_elements,
        scene_timings,
        subtitle_path,
    );

    argv.push("-filter_complex".to_string());
    argv.push(filter_complex);

    argv.push("-map".to_string());
    argv.push(final_video_label);
    if final_audio_present {
        argv.push("-map".to_string());
        argv.push("[final_audio]".to_string());
    }

    argv.push("-c:v".to_string());
    argv.push("libx264".to_string());
    argv.push("-c:a".to_string());
    argv.push("aac".to_string());
    argv.push("-crf".to_string());
    argv.push(
        if matches!(project.quality, Quality::High) {
            "18"
        } else {
            "23"
        }
        .to_string(),
    );
    if let Some(res) = project.resolution {
        argv.push("-s".to_string());
        argv.push(format!("{}x{}", res.width, res.height));
    }
    argv.push("-movflags".to_string());
    argv.push("+faststart".to_string());
    argv.push("-pix_fmt".to_string());
    argv.push("yuv420p".to_string());
    argv.push("-preset".to_string());
    argv.push("medium".to_string());

    let output_path = output_dir.join(format!("{}.mp4", Uuid::new_v4().simple()));
    argv.push(output_path.to_string_lossy().into_owned());

    Ok(TranscoderCommand { argv, output_path })
}

/// Rejects shell/filter metacharacters in a user-sourced value (a URL or
/// path that will be interpolated into the `-filter_complex` graph or
/// passed as a bare argv entry). Never applied to filter-graph syntax we
/// generate ourselves, which legitimately contains `(`/`)`/`{`/`}`.
fn reject_injection_chars(value: &str) -> Result<(), CoreError> {
    if value.chars().any(|c| INJECTION_CHARS.contains(&c)) {
        return Err(CoreError::InvalidInput(format!(
            "value contains disallowed characters: {value}"
        )));
    }
    Ok(())
}

struct BackgroundVideo {
    src: String,
    duration: f64,
}

fn find_background_video(project: &VideoProject) -> Result<BackgroundVideo, CoreError> {
    let videos: Vec<&Element> = project
        .elements
        .iter()
        .filter(|e| matches!(e, Element::Video { .. }))
        .collect();

    match videos.as_slice() {
        [Element::Video { src, duration }] => Ok(BackgroundVideo {
            src: src.clone(),
            duration: *duration,
        }),
        [] => Err(CoreError::InvalidInput(
            "project has no background video element".to_string(),
        )),
        _ => Err(CoreError::InvalidInput(
            "project has more than one background video element".to_string(),
        )),
    }
}

fn collect_audio(project: &VideoProject) -> Vec<String> {
    project
        .scenes
        .iter()
        .flat_map(|scene| scene.elements.iter())
        .filter_map(|e| match e {
            Element::Audio { src, .. } => Some(src.clone()),
            _ => None,
        })
        .collect()
}

struct ImageElement {
    src: String,
    x: i32,
    y: i32,
}

fn collect_images(project: &VideoProject) -> Vec<ImageElement> {
    project
        .scenes
        .iter()
        .flat_map(|scene| scene.elements.iter())
        .filter_map(|e| match e {
            Element::Image { src, x, y, .. } => Some(ImageElement {
                src: src.clone(),
                x: *x,
                y: *y,
            }),
            _ => None,
        })
        .collect()
}

/// Builds the `-filter_complex` string plus the label to `-map` for video,
/// and whether `[final_audio]` exists to map. See §4.3 "Build a filter
/// graph".
fn build_filter_graph(
    num_audio: usize,
    images: &[ImageElement],
    scene_timings: &[TimingSegment],
    subtitle_path: Option<&Path>,
) -> (String, String, bool) {
    let mut parts: Vec<String> = Vec::new();

    // Audio: concat all clips then tail-pad, or pad the single clip directly.
    if num_audio > 1 {
        let labels: String = (1..=num_audio).map(|i| format!("[{i}:a]")).collect();
        parts.push(format!(
            "{labels}concat=n={num_audio}:v=0:a=1[concat_audio]"
        ));
        parts.push(format!(
            "[concat_audio]apad=pad_dur={AUDIO_TAIL_PAD_SECS}[final_audio]"
        ));
    } else {
        parts.push(format!("[1:a]apad=pad_dur={AUDIO_TAIL_PAD_SECS}[final_audio]"));
    }

    // Video: overlay each image within its scene's [start, end), falling
    // back to fixed 5s slots if there are fewer timings than images.
    let mut running_label = "0:v".to_string();
    for (i, image) in images.iter().enumerate() {
        let input_idx = 1 + num_audio + i;
        let scaled = format!("img{i}_scaled");
        parts.push(format!("[{input_idx}:v]scale=500:500[{scaled}]"));

        let (start, end) = match scene_timings.get(i) {
            Some(t) => (t.start, t.end),
            None => (
                i as f64 * IMAGE_FALLBACK_SLOT_SECS,
                (i + 1) as f64 * IMAGE_FALLBACK_SLOT_SECS,
            ),
        };

        let out_label = format!("v{i}");
        parts.push(format!(
            "[{running_label}][{scaled}]overlay={x}:{y}:enable='between(t,{start},{end})'[{out_label}]",
            x = image.x,
            y = image.y,
        ));
        running_label = out_label;
    }

    if let Some(path) = subtitle_path {
        let escaped = escape_subtitle_filter_path(path);
        parts.push(format!(
            "[{running_label}]subtitles='{escaped}'[subtitled_video]"
        ));
        running_label = "subtitled_video".to_string();
    }

    let final_video_label = format!("[{running_label}]");
    (parts.join(";"), final_video_label, true)
}

fn escape_subtitle_filter_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace(':', "\\:")
}
