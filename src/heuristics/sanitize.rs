use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Special tokens used by chat templates of common model families
static CONTROL_TOKEN_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"<\|[A-Za-z0-9_]+\|>|\[/?INST\]|<</?SYS>>|</?s>|<\|?(?:im_start|im_end|endoftext)\|?>")
});

/// Chat role prefixes at the start of a line, e.g. "system:" or "Assistant :"
static ROLE_MARKER_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:system|assistant|user|developer|human|ai)[ \t]*:[ \t]*")
});

/// Phrases that try to replace the instructions the model was given
static OVERRIDE_PHRASE_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:ignore|disregard|forget|override)\s+(?:all\s+|any\s+)?(?:of\s+)?(?:the\s+|your\s+|my\s+)?",
        r"(?:previous|prior|above|earlier|preceding|system)\s+(?:instructions?|prompts?|messages?|directions?|rules?)\b",
        r"|(?i)\bnew\s+(?:system\s+)?(?:instructions?|prompt)\s*:",
        r"|(?i)\byou\s+are\s+now\s+(?:in\s+)?(?:developer|dan|jailbreak|god)\s+mode\b",
    ))
});

/// Strip prompt-injection patterns from transcript text.
///
/// Removes chat control tokens, line-leading role markers and instruction
/// override phrases. Everything else is left byte-for-byte intact. Rules are
/// applied until nothing changes, so `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let mut out = text.to_string();
    for (name, pattern) in [
        ("control token", &CONTROL_TOKEN_RE),
        ("role marker", &ROLE_MARKER_RE),
        ("override phrase", &OVERRIDE_PHRASE_RE),
    ] {
        match &**pattern {
            Ok(re) => {
                if re.is_match(&out) {
                    out = re.replace_all(&out, "").into_owned();
                }
            }
            Err(e) => warn!("Skipping {} sanitizer rule: {}", name, e),
        }
    }
    out
}
