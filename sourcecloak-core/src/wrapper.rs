//! Self-executing stub generation.
//!
//! The stub is the only persisted wire format: a PHP file that embeds the
//! encoded payload as a literal and decodes and `eval`s it at runtime.
//! Executing the stub must be observably identical to executing the original
//! source.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker stripped from the head of the decoded source before `eval`.
pub const OPEN_TAG: &str = "<?php";
/// Marker stripped from the tail of the decoded source before `eval`.
pub const CLOSE_TAG: &str = "?>";

static PAYLOAD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\$obfuscated = "([^"]+)";"#).unwrap()
});

/// Embed an encoded payload in the fixed decode-and-execute template.
pub fn wrap(payload: &str) -> String {
    let mut stub = String::with_capacity(payload.len() + 512);
    stub.push_str("<?php\n");
    stub.push_str("// Obfuscated PHP code - generated by sourcecloak\n");
    stub.push_str(&format!("$obfuscated = \"{}\";\n", escape_literal(payload)));
    stub.push_str("$reversed = strrev($obfuscated);\n");
    stub.push_str("$decoded = base64_decode($reversed);\n");
    stub.push_str("if (substr($decoded, 0, 5) === \"<?php\") {\n");
    stub.push_str("    $decoded = substr($decoded, 5);\n");
    stub.push_str("}\n");
    stub.push_str("if (substr($decoded, -2) === \"?>\") {\n");
    stub.push_str("    $decoded = substr($decoded, 0, -2);\n");
    stub.push_str("}\n");
    stub.push_str("eval($decoded);\n");
    stub.push_str("?>\n");
    stub
}

/// Pull the embedded payload back out of a stub.
///
/// Returns `None` when the content does not carry the wrapper literal, in
/// which case callers fall back to treating the whole content as a raw
/// payload.
pub fn extract_payload(content: &str) -> Option<&str> {
    PAYLOAD_REGEX
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn escape_literal(payload: &str) -> String {
    payload.replace('\\', "\\\\").replace('"', "\\\"")
}
