//! The LLM-output extractor (spec.md §4.1, component C1).
//!
//! Idempotent and side-effect free: given the same input it always returns the
//! same block, and extracting never mutates the input. Used by the Negotiator to
//! pull a JSON [`protoforge_types::NegotiationResult`] out of an LLM response, and
//! by the Code-Generator facade to pull generated source out of one.

const FENCE: &str = "```";

/// Extracts the last fenced block in `text` whose opening fence carries `language`
/// as its tag (e.g. `` ```json ``). Pass `None` to match a fence with no language
/// tag at all (a bare `` ``` ``).
///
/// Returns the inner text trimmed of leading/trailing whitespace, or `None` if no
/// matching fence exists. A fence opened but never closed is not matched (spec.md
/// §4.1: "Malformed or missing fence -> returns NONE").
///
/// Fence matching is not nested: an opening fence always pairs with the next
/// closing fence line, regardless of what that closing line's own content looks
/// like.
pub fn extract_fenced_block(text: &str, language: Option<&str>) -> Option<String> {
    let mut matches = Vec::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed_start = line.trim_start();
        if let Some(rest) = trimmed_start.strip_prefix(FENCE) {
            let tag = rest.trim();
            let tag_matches = match language {
                Some(expected) => tag.eq_ignore_ascii_case(expected),
                None => tag.is_empty(),
            };
            if tag_matches {
                if let Some(close_offset) =
                    lines[i + 1..].iter().position(|candidate| candidate.trim_start().starts_with(FENCE))
                {
                    let close_index = i + 1 + close_offset;
                    let body = lines[i + 1..close_index].join("\n");
                    matches.push(body.trim().to_owned());
                    i = close_index + 1;
                    continue;
                }
                // Unterminated fence: nothing after this point can close it.
                break;
            }
        }
        i += 1;
    }
    matches.pop()
}

/// Convenience wrapper for extracting the last JSON fenced block.
pub fn extract_json_block(text: &str) -> Option<String> {
    extract_fenced_block(text, Some("json"))
}

/// Convenience wrapper for extracting the last Python fenced block.
pub fn extract_python_block(text: &str) -> Option<String> {
    extract_fenced_block(text, Some("python"))
}
