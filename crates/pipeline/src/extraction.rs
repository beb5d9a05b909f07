//! Pulls source code out of an agent's markdown reply.

use crate::ScriptLanguage;

const FENCE: &str = "```";

/// Returns the code inside the first fenced block tagged for `language`.
///
/// The opening fence must carry exactly the language tag (so a `java`
/// request does not match a ```` ```javascript ```` block). The block runs to
/// the next ```` ``` ```` or to the end of the text when it is never closed,
/// and the result is trimmed. Without a matching fence the reply is returned
/// unchanged.
pub fn extract_code(response: &str, language: ScriptLanguage) -> String {
    match fenced_block(response, language.fence_tag()) {
        Some(code) => code.trim().to_string(),
        None => response.to_string(),
    }
}

fn fenced_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let opener = format!("{FENCE}{tag}");
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(&opener) {
        let body_start = search_from + offset + opener.len();
        let rest = &text[body_start..];
        let tag_ends = rest
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace());
        if tag_ends {
            let end = rest.find(FENCE).unwrap_or(rest.len());
            return Some(&rest[..end]);
        }
        search_from = body_start;
    }
    None
}
