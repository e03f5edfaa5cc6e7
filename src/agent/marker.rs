//! Completion-marker detection in agent output.
//!
//! The agent signals task completion by printing the marker (default
//! `LOOP_COMPLETE`) in its final output. The marker must appear outside any
//! `<event ...>...</event>` block the agent emits, so a task description
//! that merely mentions the marker inside an event payload does not end the
//! run.

/// Checks if output contains the completion marker outside event tags
pub fn contains_marker(output: &str, marker: &str) -> bool {
    strip_event_tags(output).contains(marker)
}

/// Strips all `<event ...>...</event>` blocks from output
fn strip_event_tags(output: &str) -> String {
    let mut result = String::with_capacity(output.len());
    let mut remaining = output;

    while let Some(start_idx) = remaining.find("<event ") {
        result.push_str(&remaining[..start_idx]);

        let after_start = &remaining[start_idx..];
        if let Some(close_idx) = after_start.find("</event>") {
            remaining = &after_start[close_idx + "</event>".len()..];
        } else {
            // Malformed: no closing tag, keep the rest and stop
            result.push_str(after_start);
            remaining = "";
            break;
        }
    }

    result.push_str(remaining);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_detected_in_plain_output() {
        assert!(contains_marker("LOOP_COMPLETE", "LOOP_COMPLETE"));
        assert!(contains_marker("prefix LOOP_COMPLETE suffix", "LOOP_COMPLETE"));
        assert!(!contains_marker("no marker here", "LOOP_COMPLETE"));
    }

    #[test]
    fn test_marker_ignored_inside_event_payload() {
        let output = r#"<event topic="build.task">Fix LOOP_COMPLETE detection</event>"#;
        assert!(!contains_marker(output, "LOOP_COMPLETE"));

        let output = r#"<event topic="build.task">
## Task: fix completion detection
- Given LOOP_COMPLETE appears inside an event tag
- Then it should be ignored
</event>"#;
        assert!(!contains_marker(output, "LOOP_COMPLETE"));
    }

    #[test]
    fn test_marker_detected_outside_events() {
        let output = "<event topic=\"build.done\">Task complete</event>\nAll done! LOOP_COMPLETE";
        assert!(contains_marker(output, "LOOP_COMPLETE"));

        let output = "LOOP_COMPLETE\n<event topic=\"summary\">Final summary</event>";
        assert!(contains_marker(output, "LOOP_COMPLETE"));
    }

    #[test]
    fn test_marker_mixed_content() {
        let output = "Working...\n<event topic=\"build.task\">Fix LOOP_COMPLETE bug</event>\nStill working...";
        assert!(!contains_marker(output, "LOOP_COMPLETE"));

        let output = "All tasks done. LOOP_COMPLETE\n<event topic=\"summary\">Completed LOOP_COMPLETE task</event>";
        assert!(contains_marker(output, "LOOP_COMPLETE"));
    }

    #[test]
    fn test_strip_event_tags() {
        let output = r#"before <event topic="test">payload</event> after"#;
        let stripped = strip_event_tags(output);
        assert_eq!(stripped, "before  after");

        let output = r#"start <event topic="a">one</event> middle <event topic="b">two</event> end"#;
        assert_eq!(strip_event_tags(output), "start  middle  end");

        assert_eq!(strip_event_tags("just plain text"), "just plain text");
    }

    #[test]
    fn test_strip_event_tags_unclosed() {
        let output = r#"done <event topic="x">never closed"#;
        let stripped = strip_event_tags(output);
        // Unclosed tag content survives rather than being silently dropped
        assert!(stripped.contains("never closed"));
    }

    #[test]
    fn test_custom_marker() {
        assert!(contains_marker("TASK_DONE", "TASK_DONE"));
        assert!(!contains_marker("LOOP_COMPLETE", "TASK_DONE"));
    }
}
