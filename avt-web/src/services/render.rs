//! Transcript presentation formats

use avt_common::time::format_srt_timestamp;

use crate::models::Transcript;

/// SubRip subtitles, one cue per segment
pub fn render_srt(transcript: &Transcript) -> String {
    let mut srt = String::new();
    for (index, segment) in transcript.segments.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_timestamp(segment.start),
            format_srt_timestamp(segment.end),
            segment.text.trim(),
        ));
    }
    srt
}

/// Plain text, one segment per line
pub fn render_txt(transcript: &Transcript) -> String {
    if transcript.segments.is_empty() {
        return transcript.text.clone();
    }
    let mut txt = transcript
        .segments
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join("\n");
    txt.push('\n');
    txt
}
