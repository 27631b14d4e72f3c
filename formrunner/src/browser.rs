//! Actuator that drives the active browser tab through the extension bridge.
//!
//! Each command is rendered into one self-contained script; element lookup is
//! by id, and a missing element is reported as `NOT_FOUND: <id>`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::actuator::{wait_duration, Actuator};
use crate::bridge::BrowserBridge;
use crate::errors::ActuatorError;

pub struct BrowserActuator {
    bridge: Arc<BrowserBridge>,
    timeout: Duration,
}

impl BrowserActuator {
    pub fn new(bridge: Arc<BrowserBridge>, timeout: Duration) -> Self {
        Self { bridge, timeout }
    }

    async fn run(&self, action: &str, script: String) -> Result<(), ActuatorError> {
        debug!(
            action,
            script_bytes = script.len(),
            script_preview = %script.chars().take(200).collect::<String>(),
            "Executing browser script"
        );
        let result = self.bridge.eval(&script, self.timeout).await?;
        debug!(action, %result, "Browser script finished");
        Ok(())
    }
}

#[async_trait]
impl Actuator for BrowserActuator {
    async fn click(&self, id: &str) -> Result<(), ActuatorError> {
        self.run("click", click_script(id)).await
    }

    async fn radio_click(&self, id: &str) -> Result<(), ActuatorError> {
        self.run("radio_click", radio_script(id)).await
    }

    async fn select_card(&self, tail: &str) -> Result<(), ActuatorError> {
        self.run("select_card", card_script(tail)).await
    }

    async fn fill_subject_amount(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.run("fill_subject_amount", fill_script(id, value)).await
    }

    async fn select_dropdown(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.run("select_dropdown", select_script(id, value)).await
    }

    async fn select_date(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.run("select_date", date_script(id, value)).await
    }

    async fn plain_fill(&self, id: &str, value: &str) -> Result<(), ActuatorError> {
        self.run("plain_fill", fill_script(id, value)).await
    }

    async fn press_enter(&self) -> Result<(), ActuatorError> {
        self.run("press_enter", enter_script()).await
    }

    async fn wait(&self, seconds: f64) -> Result<(), ActuatorError> {
        info!(seconds, "Waiting");
        tokio::time::sleep(wait_duration(seconds)?).await;
        Ok(())
    }
}

/// JSON string literals are valid JavaScript string literals.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn with_element(id: &str, body: &str) -> String {
    format!(
        "(() => {{\n  const el = document.getElementById({id});\n  if (!el) throw new Error('NOT_FOUND: ' + {id});\n{body}\n  return 'ok';\n}})()",
        id = js_str(id),
    )
}

const NOTIFY: &str = "  el.dispatchEvent(new Event('input', { bubbles: true }));\n  el.dispatchEvent(new Event('change', { bubbles: true }));";

pub(crate) fn click_script(id: &str) -> String {
    with_element(id, "  el.scrollIntoView({ block: 'center' });\n  el.click();")
}

pub(crate) fn radio_script(id: &str) -> String {
    with_element(id, &format!("  el.checked = true;\n  el.click();\n{NOTIFY}"))
}

pub(crate) fn fill_script(id: &str, value: &str) -> String {
    with_element(
        id,
        &format!("  el.focus();\n  el.value = {};\n{NOTIFY}", js_str(value)),
    )
}

pub(crate) fn select_script(id: &str, value: &str) -> String {
    with_element(
        id,
        &format!(
            "  const opt = Array.from(el.options || []).find(o => o.value === {v});\n  if (!opt) throw new Error('option ' + {v} + ' not offered');\n  el.value = {v};\n{NOTIFY}",
            v = js_str(value)
        ),
    )
}

pub(crate) fn date_script(id: &str, value: &str) -> String {
    with_element(
        id,
        &format!(
            "  el.removeAttribute('readonly');\n  el.value = {};\n{NOTIFY}\n  el.blur();",
            js_str(value)
        ),
    )
}

pub(crate) fn card_script(tail: &str) -> String {
    format!(
        "(() => {{\n  const tail = {tail};\n  const hit = Array.from(document.querySelectorAll('label, option, li, td, span'))\n    .find(n => n.textContent.trim().endsWith(tail));\n  if (!hit) throw new Error('NOT_FOUND: card *' + tail);\n  if (hit.tagName === 'OPTION') {{\n    hit.selected = true;\n    hit.parentElement.dispatchEvent(new Event('change', {{ bubbles: true }}));\n  }} else {{\n    hit.click();\n  }}\n  return 'ok';\n}})()",
        tail = js_str(tail)
    )
}

pub(crate) fn enter_script() -> String {
    "(() => {\n  const el = document.activeElement || document.body;\n  for (const type of ['keydown', 'keypress', 'keyup']) {\n    el.dispatchEvent(new KeyboardEvent(type, { key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true }));\n  }\n  if (el.form && typeof el.form.requestSubmit === 'function') el.form.requestSubmit();\n  return 'ok';\n})()"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_escaped() {
        let script = fill_script("reason", "it's \"quoted\"\nline");
        assert!(script.contains(r#"document.getElementById("reason")"#));
        assert!(script.contains(r#"el.value = "it's \"quoted\"\nline";"#));
    }

    #[test]
    fn test_scripts_report_missing_elements() {
        for script in [
            click_script("x"),
            radio_script("x"),
            select_script("x", "10"),
            date_script("x", "2024-01-01"),
        ] {
            assert!(script.contains("NOT_FOUND: "), "{script}");
        }
        assert!(card_script("1234").contains("endsWith(tail)"));
    }

    #[test]
    fn test_select_uses_encoded_value() {
        let script = select_script("pay_type", "10");
        assert!(script.contains(r#"o.value === "10""#));
    }
}
