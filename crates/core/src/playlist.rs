//! HLS playlist and segment-name handling: segment file naming, seek index
//! computation, and the seek rewrite that re-emits a playlist starting at a
//! target segment.

/// Separator between the session id and the segment index in segment file
/// names: `<session_id>_segment_<NNN>.ts`.
pub const SEGMENT_INFIX: &str = "_segment_";

/// Playlist header lines copied verbatim during a seek rewrite.
const HEADER_PREFIXES: [&str; 4] = [
    "#EXTM3U",
    "#EXT-X-VERSION",
    "#EXT-X-TARGETDURATION",
    "#EXT-X-MEDIA-SEQUENCE",
];

/// Build the segment file name for `session_id` at `index` (zero-padded to
/// width 3, matching the transcoder's output pattern).
pub fn segment_file_name(session_id: &str, index: u64) -> String {
    format!("{session_id}{SEGMENT_INFIX}{index:03}.ts")
}

/// The index of the segment covering `seek_seconds`, by integer division
/// with the configured segment duration.
pub fn segment_index_for(seek_seconds: u64, segment_duration_secs: u64) -> u64 {
    seek_seconds / segment_duration_secs.max(1)
}

/// Recover the session name from a bare segment file name, for the
/// deprecated short-form URLs where the path carries only the segment.
///
/// The prefix before `_segment_` has the form `<uuid>_<name>_<timestamp>`;
/// the name is the penultimate underscore-separated token.
pub fn session_name_from_segment(file_name: &str) -> Option<&str> {
    if !file_name.ends_with(".ts") {
        return None;
    }
    let (prefix, _) = file_name.split_once(SEGMENT_INFIX)?;
    let parts: Vec<&str> = prefix.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(parts[parts.len() - 2])
}

/// Whether `file_name` names a segment of the session with `session_id`.
pub fn is_segment_of(file_name: &str, session_id: &str) -> bool {
    file_name.starts_with(&format!("{session_id}{SEGMENT_INFIX}")) && file_name.ends_with(".ts")
}

/// Rewrite a playlist so playback starts at `target_segment`.
///
/// Header lines are copied verbatim. While scanning, the most recent
/// `#EXTINF` duration is remembered; once the target segment is reached,
/// every remaining segment line is emitted preceded by its remembered
/// `#EXTINF` line. Returns `None` when the target segment does not appear
/// in the playlist.
pub fn rewrite_from_segment(playlist: &str, target_segment: &str) -> Option<String> {
    let mut out = String::new();
    let mut found = false;
    let mut last_duration = 2.0f64;

    for line in playlist.lines() {
        if HEADER_PREFIXES.iter().any(|p| line.starts_with(p)) {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            last_duration = rest.trim_end_matches(',').parse().unwrap_or(2.0);
            continue;
        }
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        // A segment line.
        if !found && line.contains(target_segment) {
            found = true;
        }
        if found {
            out.push_str(&format!("#EXTINF:{last_duration:.3},\n"));
            out.push_str(line);
            out.push('\n');
        }
    }

    found.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_ID: &str = "6f1c9a2e-44d3-4b6a-9f1e-0c8b7d5a3e21_camC_20260802120000";

    fn sample_playlist(segments: usize) -> String {
        let mut p = String::from(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n#EXT-X-MEDIA-SEQUENCE:0\n",
        );
        for i in 0..segments {
            p.push_str("#EXTINF:2.000000,\n");
            p.push_str(&segment_file_name(SESSION_ID, i as u64));
            p.push('\n');
        }
        p.push_str("#EXT-X-ENDLIST\n");
        p
    }

    #[test]
    fn segment_names_are_zero_padded() {
        assert_eq!(
            segment_file_name("abc", 7),
            "abc_segment_007.ts".to_string()
        );
        assert_eq!(segment_file_name("abc", 123), "abc_segment_123.ts");
    }

    #[test]
    fn seek_index_uses_integer_division() {
        assert_eq!(segment_index_for(6, 2), 3);
        assert_eq!(segment_index_for(7, 2), 3);
        assert_eq!(segment_index_for(0, 2), 0);
        // Zero duration must not divide by zero.
        assert_eq!(segment_index_for(10, 0), 10);
    }

    #[test]
    fn session_name_is_penultimate_token() {
        let segment = segment_file_name(SESSION_ID, 2);
        assert_eq!(session_name_from_segment(&segment), Some("camC"));
    }

    #[test]
    fn short_form_rejects_malformed_names() {
        assert_eq!(session_name_from_segment("nosegmentmarker.ts"), None);
        assert_eq!(session_name_from_segment("a_segment_000.ts"), None);
        assert_eq!(session_name_from_segment("a_b_segment_000.mp4"), None);
    }

    #[test]
    fn segment_prefix_validation() {
        let segment = segment_file_name(SESSION_ID, 0);
        assert!(is_segment_of(&segment, SESSION_ID));
        assert!(!is_segment_of(&segment, "other-session"));
        assert!(!is_segment_of("evil.m3u8", SESSION_ID));
    }

    #[test]
    fn rewrite_starts_at_target_segment() {
        // Ten two-second segments, seek to 6 s: first emitted segment is
        // index 3 and seven #EXTINF entries remain.
        let playlist = sample_playlist(10);
        let target = segment_file_name(SESSION_ID, 3);
        let rewritten = rewrite_from_segment(&playlist, &target).unwrap();

        let first_segment = rewritten
            .lines()
            .find(|l| !l.starts_with('#'))
            .unwrap();
        assert_eq!(first_segment, target);

        let extinf_count = rewritten
            .lines()
            .filter(|l| l.starts_with("#EXTINF:"))
            .count();
        assert_eq!(extinf_count, 7);
    }

    #[test]
    fn rewrite_keeps_header_lines() {
        let playlist = sample_playlist(4);
        let target = segment_file_name(SESSION_ID, 1);
        let rewritten = rewrite_from_segment(&playlist, &target).unwrap();

        for header in ["#EXTM3U", "#EXT-X-VERSION:3", "#EXT-X-TARGETDURATION:2"] {
            assert!(rewritten.contains(header), "missing {header}");
        }
    }

    #[test]
    fn rewrite_preserves_segment_durations() {
        let playlist = "#EXTM3U\n#EXT-X-VERSION:3\n\
            #EXTINF:2.500000,\nx_a_1_segment_000.ts\n\
            #EXTINF:1.750000,\nx_a_1_segment_001.ts\n";
        let rewritten = rewrite_from_segment(playlist, "x_a_1_segment_001.ts").unwrap();
        assert!(rewritten.contains("#EXTINF:1.750,"));
        assert!(!rewritten.contains("x_a_1_segment_000.ts"));
    }

    #[test]
    fn rewrite_fails_for_absent_segment() {
        let playlist = sample_playlist(3);
        let target = segment_file_name(SESSION_ID, 9);
        assert!(rewrite_from_segment(&playlist, &target).is_none());
    }
}
