//! Page-level primitives: element lookup, clicks and keystrokes over CDP.

use std::{path::Path, time::Duration};

use {
    chromiumoxide::{
        Page,
        cdp::browser_protocol::{
            dom::SetFileInputFilesParams,
            input::{
                DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
                DispatchMouseEventType, MouseButton,
            },
        },
    },
    rand::Rng,
    serde_json::Value,
    tracing::debug,
};

use crate::{error::WhatsAppError, typing::TypingPacing};

type Result<T> = std::result::Result<T, WhatsAppError>;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// CDP modifier bit for Shift.
const SHIFT: i64 = 8;

/// Returns `{x, y}` for the center of the first match, scrolled into view, or null.
const CENTER_JS: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return null;
    el.scrollIntoView({ behavior: 'instant', block: 'center' });
    const rect = el.getBoundingClientRect();
    return { x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 };
}"#;

const CLEAR_FOCUSED_JS: &str = r#"(() => {
    document.execCommand('selectAll', false);
    document.execCommand('delete', false);
    return true;
})()"#;

async fn evaluate(page: &Page, js: &str) -> Result<Value> {
    page.evaluate(js)
        .await
        .map_err(|e| WhatsAppError::JsEvalFailed(e.to_string()))?
        .into_value()
        .map_err(|e| WhatsAppError::JsEvalFailed(format!("failed to get result: {e:?}")))
}

fn js_string(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| WhatsAppError::JsEvalFailed(e.to_string()))
}

fn call_with_selector(function: &str, selector: &str) -> Result<String> {
    Ok(format!("({function})({})", js_string(selector)?))
}

pub async fn is_present(page: &Page, selector: &str) -> Result<bool> {
    let js = format!("document.querySelector({}) !== null", js_string(selector)?);
    let result = evaluate(page, &js).await?;
    Ok(result.as_bool() == Some(true))
}

pub async fn element_center(page: &Page, selector: &str) -> Result<Option<(f64, f64)>> {
    let result = evaluate(page, &call_with_selector(CENTER_JS, selector)?).await?;
    if result.is_null() {
        return Ok(None);
    }
    match (result["x"].as_f64(), result["y"].as_f64()) {
        (Some(x), Some(y)) => Ok(Some((x, y))),
        _ => Err(WhatsAppError::JsEvalFailed(format!(
            "unexpected element geometry: {result}"
        ))),
    }
}

/// Poll until one of `selectors` matches. Earlier selectors win when several
/// match in the same round. Returns the index of the match, or `None` once
/// `timeout` has elapsed.
pub async fn wait_for_any(
    page: &Page,
    selectors: &[&str],
    timeout: Duration,
) -> Result<Option<usize>> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        for (index, selector) in selectors.iter().enumerate() {
            if is_present(page, selector).await? {
                return Ok(Some(index));
            }
        }
        if tokio::time::Instant::now() >= deadline {
            debug!(?selectors, timeout_ms = timeout.as_millis() as u64, "element wait timed out");
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for `selector`, failing with [`WhatsAppError::ElementNotFound`] on timeout.
pub async fn wait_for(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    match wait_for_any(page, &[selector], timeout).await? {
        Some(_) => Ok(()),
        None => Err(WhatsAppError::element_not_found(selector)),
    }
}

pub async fn click(page: &Page, selector: &str) -> Result<()> {
    let (x, y) = element_center(page, selector)
        .await?
        .ok_or_else(|| WhatsAppError::element_not_found(selector))?;
    click_at(page, x, y).await
}

pub async fn click_at(page: &Page, x: f64, y: f64) -> Result<()> {
    for event in [
        DispatchMouseEventType::MousePressed,
        DispatchMouseEventType::MouseReleased,
    ] {
        let cmd = DispatchMouseEventParams::builder()
            .r#type(event)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(WhatsAppError::Cdp)?;
        page.execute(cmd).await?;
    }
    debug!(x, y, "clicked");
    Ok(())
}

/// Empty the focused editable element.
pub async fn clear_focused(page: &Page) -> Result<()> {
    evaluate(page, CLEAR_FOCUSED_JS).await?;
    Ok(())
}

async fn key_char(page: &Page, c: char) -> Result<()> {
    for event in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
        let cmd = DispatchKeyEventParams::builder()
            .r#type(event)
            .text(c.to_string())
            .build()
            .map_err(WhatsAppError::Cdp)?;
        page.execute(cmd).await?;
    }
    Ok(())
}

/// Press Enter, optionally with Shift held (a line break in the composer).
pub async fn press_enter(page: &Page, shift: bool) -> Result<()> {
    let modifiers = if shift { SHIFT } else { 0 };
    let down = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key("Enter")
        .code("Enter")
        .windows_virtual_key_code(13)
        .native_virtual_key_code(13)
        .modifiers(modifiers)
        .text("\r")
        .build()
        .map_err(WhatsAppError::Cdp)?;
    page.execute(down).await?;

    let up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key("Enter")
        .code("Enter")
        .windows_virtual_key_code(13)
        .native_virtual_key_code(13)
        .modifiers(modifiers)
        .build()
        .map_err(WhatsAppError::Cdp)?;
    page.execute(up).await?;
    Ok(())
}

/// Type `text` into the focused element one character at a time.
///
/// Newlines become Shift+Enter so multi-line text is not submitted early.
pub async fn type_text<R: Rng + ?Sized>(
    page: &Page,
    text: &str,
    pacing: &TypingPacing,
    rng: &mut R,
) -> Result<()> {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            press_enter(page, true).await?;
        }
        for c in line.chars().filter(|c| *c != '\r') {
            key_char(page, c).await?;
            let delay = pacing.char_delay(rng);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
    debug!(chars = text.chars().count(), "typed text");
    Ok(())
}

/// Attach a local file to the `<input type=file>` matched by `selector`.
pub async fn set_file_input(page: &Page, selector: &str, file: &Path) -> Result<()> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| WhatsAppError::element_not_found(selector))?;
    let cmd = SetFileInputFilesParams::builder()
        .files(vec![file.to_string_lossy().into_owned()])
        .backend_node_id(element.backend_node_id)
        .build()
        .map_err(WhatsAppError::Cdp)?;
    page.execute(cmd).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_passed_as_a_js_string_literal() {
        let js = call_with_selector("(s) => s", r#"span[title="55"]"#).unwrap();
        assert_eq!(js, r#"((s) => s)("span[title=\"55\"]")"#);
    }
}
