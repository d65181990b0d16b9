//! `[Sendfile: <path>]` directive extraction.
//!
//! Both the streaming-delta path and the final `completed` answer can see
//! the same directive; callers dedup against a per-session set of paths
//! already sent so the file is never delivered twice.

/// One extracted file-send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFileDirective {
    pub path: String,
    pub caption: Option<String>,
}

/// Pull every `[Sendfile: <path>]` (optionally followed by `Caption:
/// <text>` on the next line) out of `text`, returning the directives found
/// and the remaining text with those lines removed.
pub fn extract_sendfile_directives(text: &str) -> (String, Vec<SendFileDirective>) {
    let mut directives = Vec::new();
    let mut remaining = String::with_capacity(text.len());
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("[Sendfile:").and_then(|s| s.strip_suffix(']')) {
            let path = rest.trim().to_string();
            let mut caption = None;
            if let Some(next) = lines.peek() {
                if let Some(cap) = next.trim().strip_prefix("Caption:") {
                    caption = Some(cap.trim().to_string());
                    lines.next();
                }
            }
            directives.push(SendFileDirective { path, caption });
            continue;
        }
        remaining.push_str(line);
        remaining.push('\n');
    }

    // Drop the trailing newline added by the loop unless the original had one.
    if !text.ends_with('\n') && remaining.ends_with('\n') {
        remaining.pop();
    }

    (remaining, directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_directive_with_caption() {
        let text = "Here is the file.\n[Sendfile: /tmp/out.csv]\nCaption: export\nThanks!";
        let (remaining, directives) = extract_sendfile_directives(text);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].path, "/tmp/out.csv");
        assert_eq!(directives[0].caption.as_deref(), Some("export"));
        assert_eq!(remaining, "Here is the file.\nThanks!");
    }

    #[test]
    fn no_directive_leaves_text_untouched() {
        let text = "just some answer text";
        let (remaining, directives) = extract_sendfile_directives(text);
        assert!(directives.is_empty());
        assert_eq!(remaining, text);
    }

    #[test]
    fn directive_without_caption() {
        let text = "[Sendfile: /tmp/a.png]";
        let (remaining, directives) = extract_sendfile_directives(text);
        assert_eq!(directives[0].caption, None);
        assert_eq!(remaining, "");
    }
}
