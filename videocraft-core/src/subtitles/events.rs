//! Subtitle event generator (§4.5, C5).

use crate::types::{SubtitleEvent, SubtitleStyle, TimingSegment, TranscriptionResult};

/// Generate subtitle events for `transcriptions`, one per scene in order,
/// using `scene_timings` to place events on the video timeline.
///
/// A scene whose transcription failed or whose text is empty contributes no
/// events at all — never a placeholder.
pub fn generate(
    transcriptions: &[TranscriptionResult],
    scene_timings: &[TimingSegment],
    style: SubtitleStyle,
) -> Vec<SubtitleEvent> {
    let mut events = Vec::new();

    for (transcription, timing) in transcriptions.iter().zip(scene_timings.iter()) {
        if !transcription.success || transcription.text.trim().is_empty() {
            continue;
        }

        match style {
            SubtitleStyle::Progressive if !transcription.word_timestamps.is_empty() => {
                events.extend(progressive_events(transcription, timing));
            }
            _ => {
                events.push(SubtitleEvent {
                    start: timing.start,
                    end: timing.end,
                    text: transcription.text.clone(),
                    layer: 0,
                });
            }
        }
    }

    events
}

fn progressive_events(
    transcription: &TranscriptionResult,
    timing: &TimingSegment,
) -> Vec<SubtitleEvent> {
    let words = &transcription.word_timestamps;
    let mut events = Vec::with_capacity(words.len());

    for (i, word) in words.iter().enumerate() {
        if word.word.trim().is_empty() {
            continue;
        }

        let start = (timing.start + word.start).max(timing.start);
        let end = match words.get(i + 1) {
            Some(next) => timing.start + next.start,
            None => timing.start + word.end,
        }
        .min(timing.end);

        if end <= start {
            continue;
        }

        events.push(SubtitleEvent {
            start,
            end,
            text: word.word.clone(),
            layer: 0,
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WordTiming;

    fn timing(start: f64, end: f64) -> TimingSegment {
        TimingSegment { start, end }
    }

    #[test]
    fn empty_words_produce_zero_events_not_a_placeholder() {
        let t = TranscriptionResult {
            text: "hi".to_string(),
            language: "en".to_string(),
            duration: 1.0,
            word_timestamps: vec![],
            success: true,
        };
        // Progressive style with no words falls back to a classic event
        // under §4.5 ("if style is progressive AND word timings exist"),
        // so emptiness only applies when transcription itself is empty.
        let events = generate(&[t], &[timing(0.0, 1.0)], SubtitleStyle::Progressive);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "hi");
    }

    #[test]
    fn unsuccessful_transcription_emits_nothing() {
        let t = TranscriptionResult::failed();
        let events = generate(&[t], &[timing(0.0, 5.0)], SubtitleStyle::Progressive);
        assert!(events.is_empty());
    }

    #[test]
    fn progressive_single_word_matches_scenario_s1() {
        let t = TranscriptionResult {
            text: "hi".to_string(),
            language: "en".to_string(),
            duration: 0.5,
            word_timestamps: vec![WordTiming {
                word: "hi".to_string(),
                start: 0.0,
                end: 0.5,
            }],
            success: true,
        };
        let events = generate(&[t], &[timing(0.0, 7.0)], SubtitleStyle::Progressive);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, 0.0);
        assert!(events[0].end <= 7.0);
        assert_eq!(events[0].text, "hi");
    }

    #[test]
    fn progressive_events_respect_scene_bounds() {
        let t = TranscriptionResult {
            text: "hello world".to_string(),
            language: "en".to_string(),
            duration: 2.0,
            word_timestamps: vec![
                WordTiming { word: "hello".to_string(), start: 0.0, end: 0.8 },
                WordTiming { word: "world".to_string(), start: 0.9, end: 1.9 },
            ],
            success: true,
        };
        let scene = timing(10.0, 12.0);
        let events = generate(&[t], &[scene], SubtitleStyle::Progressive);
        for e in &events {
            assert!(e.start >= scene.start && e.end <= scene.end);
        }
        // word order preserved when starts tie or otherwise.
        assert_eq!(events[0].text, "hello");
        assert_eq!(events[1].text, "world");
    }

    #[test]
    fn classic_style_emits_one_event_spanning_scene() {
        let t = TranscriptionResult {
            text: "full transcript".to_string(),
            language: "en".to_string(),
            duration: 3.0,
            word_timestamps: vec![WordTiming {
                word: "full".to_string(),
                start: 0.0,
                end: 1.0,
            }],
            success: true,
        };
        let scene = timing(0.0, 3.0);
        let events = generate(&[t], &[scene], SubtitleStyle::Classic);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, scene.start);
        assert_eq!(events[0].end, scene.end);
        assert_eq!(events[0].text, "full transcript");
    }
}
