//! Script extraction for HTML fragments carried by element items.

const OPEN_TAG: &str = "<script";
const CLOSE_TAG: &str = "</script";

/// Splits `html` into markup without `<script>` blocks and the bodies of those
/// blocks, in document order. Tag matching is ASCII case-insensitive; an
/// unterminated script keeps the remainder of the input as its body.
pub fn extract_scripts(html: &str) -> (String, Vec<String>) {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lower = html.to_ascii_lowercase();
    let mut markup = String::with_capacity(html.len());
    let mut scripts = Vec::new();
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(OPEN_TAG) {
        let start = cursor + found;
        let after_name = start + OPEN_TAG.len();
        let is_tag = matches!(
            lower[after_name..].chars().next(),
            Some(c) if c == '>' || c == '/' || c.is_ascii_whitespace()
        );
        if !is_tag {
            // e.g. `<scripted>`
            markup.push_str(&html[cursor..after_name]);
            cursor = after_name;
            continue;
        }

        markup.push_str(&html[cursor..start]);
        let Some(open_end) = lower[start..].find('>') else {
            cursor = html.len();
            break;
        };
        let body_start = start + open_end + 1;

        match lower[body_start..].find(CLOSE_TAG) {
            Some(close) => {
                let body_end = body_start + close;
                push_script(&mut scripts, &html[body_start..body_end]);
                cursor = lower[body_end..]
                    .find('>')
                    .map_or(html.len(), |end| body_end + end + 1);
            }
            None => {
                push_script(&mut scripts, &html[body_start..]);
                cursor = html.len();
            }
        }
    }

    markup.push_str(&html[cursor..]);
    (markup, scripts)
}

fn push_script(scripts: &mut Vec<String>, body: &str) {
    if !body.trim().is_empty() {
        scripts.push(body.to_string());
    }
}
