//! Level-based transformation pipeline.
//!
//! The passes operate on raw text with regular expressions and never parse the
//! source. They are best-effort: malformed input (or input whose string syntax
//! the regexes do not model, such as heredocs) can come out corrupted, and no
//! pass validates that its output is still valid PHP. The pipeline output is
//! always fed through [`crate::encoder::encode`] as the final step.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use base64::{engine::general_purpose, Engine as _};

static BLOCK_COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)/\*.*?\*/").unwrap()
});

static LINE_COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)//.*$").unwrap()
});

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").unwrap()
});

static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)").unwrap()
});

static DOUBLE_QUOTED_STRING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]*)""#).unwrap()
});

const DEAD_CODE_SNIPPETS: [&str; 3] = [
    r#"$dummy = "dead_code";"#,
    r#"if(false){ $never = "executed"; }"#,
    r#"for($i=0;$i<0;$i++){ $loop = "never"; }"#,
];

const ANTI_DEBUG_SNIPPETS: [&str; 2] = [
    r#"if(function_exists("xdebug_get_trace")){ return; }"#,
    r#"if(extension_loaded("xdebug")){ return; }"#,
];

/// Obfuscation level. Higher levels are strictly additive over lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObfuscationLevel {
    Basic,
    Advanced,
    Enterprise,
}

impl ObfuscationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObfuscationLevel::Basic => "basic",
            ObfuscationLevel::Advanced => "advanced",
            ObfuscationLevel::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for ObfuscationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObfuscationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ObfuscationLevel::Basic),
            "advanced" => Ok(ObfuscationLevel::Advanced),
            "enterprise" => Ok(ObfuscationLevel::Enterprise),
            other => Err(format!(
                "unknown level '{other}', expected basic, advanced or enterprise"
            )),
        }
    }
}

/// Per-pass overrides. `None` leaves the pass at its level default; `Some`
/// forces it on or off regardless of level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PassOptions {
    pub randomize_variables: Option<bool>,
    pub encrypt_strings: Option<bool>,
    pub control_flow_obfuscation: Option<bool>,
    pub dead_code_injection: Option<bool>,
    pub anti_debugging: Option<bool>,
}

/// Applies the level-selected chain of text passes ahead of the encoder.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    remove_whitespace: bool,
}

impl TransformPipeline {
    pub fn new(remove_whitespace: bool) -> Self {
        Self { remove_whitespace }
    }

    /// Run the passes selected by `level` and `options` over `source`.
    ///
    /// The result is the cleartext input to the encoder, not the final
    /// payload.
    pub fn apply(&self, source: &str, level: ObfuscationLevel, options: &PassOptions) -> String {
        let mut code = self.strip_comments(source);
        if self.remove_whitespace {
            code = WHITESPACE_REGEX.replace_all(&code, " ").into_owned();
        }

        let advanced = level >= ObfuscationLevel::Advanced;
        if options.randomize_variables.unwrap_or(advanced) {
            code = randomize_variables(&code);
        }
        if options.encrypt_strings.unwrap_or(advanced) {
            code = encrypt_strings(&code);
        }

        let enterprise = level >= ObfuscationLevel::Enterprise;
        if options.control_flow_obfuscation.unwrap_or(enterprise) {
            code = format!("if(true){{{code}}}");
        }
        if options.dead_code_injection.unwrap_or(enterprise) {
            code = inject_dead_code(&code);
        }
        if options.anti_debugging.unwrap_or(enterprise) {
            code = add_anti_debugging(&code);
        }

        code
    }

    fn strip_comments(&self, code: &str) -> String {
        let code = BLOCK_COMMENT_REGEX.replace_all(code, "");
        LINE_COMMENT_REGEX.replace_all(&code, "").into_owned()
    }
}

/// Consistent per-invocation renaming of `$name` tokens.
///
/// Every occurrence of the same name maps to the same `_xxxxxxxx` replacement.
/// This matches on raw text, so names inside string literals are renamed too.
fn randomize_variables(code: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut table: HashMap<String, String> = HashMap::new();
    VARIABLE_REGEX
        .replace_all(code, |caps: &Captures| {
            let renamed = table
                .entry(caps[1].to_string())
                .or_insert_with(|| format!("_{:08x}", rng.gen::<u32>()));
            format!("${renamed}")
        })
        .into_owned()
}

/// Replace the contents of double-quoted literals with their base64 form.
///
/// Cosmetic only: the text stays a plain literal and this is not the final
/// encoder step. Escaped quotes and interpolation are not modeled.
fn encrypt_strings(code: &str) -> String {
    DOUBLE_QUOTED_STRING_REGEX
        .replace_all(code, |caps: &Captures| {
            format!("\"{}\"", general_purpose::STANDARD.encode(&caps[1]))
        })
        .into_owned()
}

fn inject_dead_code(code: &str) -> String {
    let mut rng = rand::thread_rng();
    let snippet = DEAD_CODE_SNIPPETS
        .choose(&mut rng)
        .unwrap_or(&DEAD_CODE_SNIPPETS[0]);
    format!("{code}\n{snippet}")
}

fn add_anti_debugging(code: &str) -> String {
    let mut rng = rand::thread_rng();
    let snippet = ANTI_DEBUG_SNIPPETS
        .choose(&mut rng)
        .unwrap_or(&ANTI_DEBUG_SNIPPETS[0]);
    format!("{snippet}\n{code}")
}
