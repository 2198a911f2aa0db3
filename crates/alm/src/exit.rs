// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Final-result extraction and completion notification (spec §4.3 "Exit
//! handling").

use serde_json::Value;
use std::time::Duration;

/// Cap on how much of an unterminated candidate object we'll buffer before
/// giving up (spec §9 Design Notes: "must never allocate unbounded memory
/// on unterminated objects").
const MAX_CANDIDATE_BYTES: usize = 1024 * 1024;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Scans `log` for the first `{"type":"result", ...}` object and parses it.
/// Brace-depth state machine over the whole text, tracking string literals
/// (including escape runs) so `{`/`}` inside a quoted value never throws
/// off the depth count.
pub fn extract_result(log: &str) -> Option<Value> {
    let bytes = log.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some((candidate, end)) = scan_object(bytes, i) {
                if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                    if value.get("type").and_then(Value::as_str) == Some("result") {
                        return Some(value);
                    }
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }
    None
}

/// Returns the `{...}` slice starting at `start` once balanced, or `None`
/// if it never balances within `MAX_CANDIDATE_BYTES` or before the input
/// ends.
fn scan_object(bytes: &[u8], start: usize) -> Option<(&str, usize)> {
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let limit = (start + MAX_CANDIDATE_BYTES).min(bytes.len());

    let mut i = start;
    while i < limit {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = i + 1;
                        return std::str::from_utf8(&bytes[start..end]).ok().map(|s| (s, end));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Truncation threshold and cut point for the comment body (spec L5).
const COMMENT_TRUNCATE_AT: usize = 10_000;
const COMMENT_TRUNCATE_TO: usize = 9_900;

/// Pulls the `result` string out of an extracted result object and applies
/// the truncation rule from L5: bodies over 10000 chars are cut to 9900
/// plus a truncation marker.
pub fn comment_body(result: &Value) -> Option<String> {
    let text = result.get("result")?.as_str()?;
    if text.is_empty() {
        return None;
    }
    if text.len() > COMMENT_TRUNCATE_AT {
        let mut truncated = text.chars().take(COMMENT_TRUNCATE_TO).collect::<String>();
        truncated.push_str("\n\n... (truncated)");
        Some(truncated)
    } else {
        Some(text.to_string())
    }
}

/// Best-effort POST of the completion payload to the spawn-supplied
/// callback URL. Failures are swallowed (spec §5: "failures are swallowed;
/// downstream polling is expected to cover it").
pub async fn notify_callback(client: &reqwest::Client, url: &str, body: &Value) {
    let result = client.post(url).timeout(CALLBACK_TIMEOUT).json(body).send().await;
    if let Err(e) = result {
        tracing::warn!(url, error = %e, "completion callback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_result_with_surrounding_noise() {
        let log = "agent starting...\nsome output\n{\"type\":\"result\",\"summary\":\"done\"}\ntrailing junk";
        let value = extract_result(log).unwrap();
        assert_eq!(value["summary"], "done");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_depth() {
        let log = r#"{"type":"result","note":"uses { and } in text"}"#;
        let value = extract_result(log).unwrap();
        assert_eq!(value["note"], "uses { and } in text");
    }

    #[test]
    fn ignores_non_result_objects() {
        let log = r#"{"type":"progress","pct":50} then {"type":"result","ok":true}"#;
        let value = extract_result(log).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn no_result_object_returns_none() {
        assert!(extract_result("plain text, no json here").is_none());
    }

    #[test]
    fn unterminated_object_does_not_panic() {
        let log = format!("{{\"type\":\"result\", {}", "a".repeat(MAX_CANDIDATE_BYTES));
        assert!(extract_result(&log).is_none());
    }

    #[test]
    fn comment_body_passes_short_result_through() {
        let value = serde_json::json!({"type": "result", "result": "short summary"});
        assert_eq!(comment_body(&value).as_deref(), Some("short summary"));
    }

    #[test]
    fn comment_body_truncates_past_ten_thousand_chars() {
        let long = "x".repeat(10_001);
        let value = serde_json::json!({"type": "result", "result": long});
        let body = comment_body(&value).unwrap();
        assert_eq!(body.len(), COMMENT_TRUNCATE_TO + "\n\n... (truncated)".len());
        assert!(body.ends_with("\n\n... (truncated)"));
    }

    #[test]
    fn comment_body_is_none_without_result_field() {
        let value = serde_json::json!({"type": "result"});
        assert!(comment_body(&value).is_none());
    }
}
