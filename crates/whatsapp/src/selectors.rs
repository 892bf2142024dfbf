//! CSS selectors for the WhatsApp Web UI.
//!
//! These track the live web client and break when it changes markup.

/// Chat search box in the side pane. Its presence means the session is logged in.
pub const SEARCH_BOX: &str = r#"div[contenteditable="true"][data-tab="3"]"#;

/// Message composer of the open conversation.
pub const COMPOSER: &str = r#"div[contenteditable="true"][data-tab="10"]"#;

/// First search result in the side pane.
pub const FIRST_RESULT: &str = r#"#pane-side [role="listitem"]"#;

/// Attachment ("Anexar") menu button.
pub const ATTACH_BUTTON: &str = r#"div[title="Anexar"]"#;

/// Hidden file input for photos and videos, revealed by the attachment menu.
pub const MEDIA_INPUT: &str = r#"input[accept="image/*,video/mp4,video/3gpp,video/quicktime"]"#;

/// Send button of the media preview.
pub const MEDIA_SEND: &str = r#"span[data-icon="send"]"#;

/// Search result whose title is exactly `address`.
pub fn contact_title(address: &str) -> String {
    format!("span[title={}]", css_string(address))
}

/// Quote `value` as a CSS string literal.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            },
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_title_quotes_the_address() {
        assert_eq!(contact_title("5511999999999"), r#"span[title="5511999999999"]"#);
    }

    #[test]
    fn contact_title_escapes_quotes() {
        assert_eq!(contact_title(r#"a"b\c"#), r#"span[title="a\"b\\c"]"#);
    }
}
