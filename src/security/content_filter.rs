//! Pattern-based detection and sanitization of unsafe text.
//!
//! Detection runs independent pattern families over inbound text and reports
//! every family that matched. Output sanitization strips executable markup and
//! then entity-escapes what is left so backend output renders as plain text.
//! Sanitization never fails and is idempotent.

use regex::Regex;
use serde::Serialize;

/// Family of malicious input patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    SqlInjection,
    ScriptInjection,
    CommandInjection,
    OversizedPayload,
}

impl PatternFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternFamily::SqlInjection => "sql_injection",
            PatternFamily::ScriptInjection => "script_injection",
            PatternFamily::CommandInjection => "command_injection",
            PatternFamily::OversizedPayload => "oversized_payload",
        }
    }
}

/// Result of scanning a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub is_malicious: bool,
    pub patterns: Vec<PatternFamily>,
}

const SQL_PATTERNS: &[&str] = &[
    r"(?i)\bunion\s+(all\s+)?select\b",
    r#"(?i)'\s*or\s+'?\d+'?\s*=\s*'?\d+"#,
    r#"(?i)'\s*or\s+'[^']*'\s*=\s*'"#,
    r"(?i);\s*(drop|truncate|alter)\s+(table|database)\b",
    r"(?i);\s*delete\s+from\b",
    r"(?i)\bxp_cmdshell\b",
    r"(?i)\b(sleep|benchmark)\s*\(\s*\d+\s*[,)]",
    r"'\s*--",
];

const SCRIPT_PATTERNS: &[&str] = &[
    r"(?i)<\s*script\b",
    r"(?i)<\s*/\s*script\s*>",
    r"(?i)javascript\s*:",
    r"(?i)\bon(error|load|click|mouseover|focus|submit)\s*=",
    r"(?i)<\s*(iframe|object|embed)\b",
    r"(?i)data\s*:\s*text/html",
];

const COMMAND_PATTERNS: &[&str] = &[
    r"(?i)(;|&&|\|\|?)\s*(rm|curl|wget|nc|ncat|bash|sh|chmod|chown|cat|whoami)\s+[-/\w]",
    r"\$\(\s*(rm|curl|wget|nc|bash|sh|cat|whoami|id)\b[^)]*\)",
    r"`\s*(rm|curl|wget|nc|bash|sh|cat|whoami|id)\b[^`]*`",
    r"(?i)/etc/(passwd|shadow)\b",
];

/// Elements removed wholesale, content included.
const STRIP_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed"];

pub struct ContentFilter {
    families: Vec<(PatternFamily, Vec<Regex>)>,
    strip: Vec<Regex>,
    /// A single `<...>` tag; event-handler attributes are only removed inside one.
    markup_tag: Option<Regex>,
    event_attr: Option<Regex>,
    max_payload_length: usize,
}

impl std::fmt::Debug for ContentFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentFilter")
            .field("max_payload_length", &self.max_payload_length)
            .finish_non_exhaustive()
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = %p, error = %e, "Invalid content filter pattern");
                None
            }
        })
        .collect()
}

impl ContentFilter {
    pub fn new(max_payload_length: usize) -> Self {
        let families = vec![
            (PatternFamily::SqlInjection, compile(SQL_PATTERNS)),
            (PatternFamily::ScriptInjection, compile(SCRIPT_PATTERNS)),
            (PatternFamily::CommandInjection, compile(COMMAND_PATTERNS)),
        ];

        let mut strip_patterns: Vec<String> = Vec::new();
        for element in STRIP_ELEMENTS {
            strip_patterns.push(format!(r"(?is)<\s*{0}\b[^>]*>.*?<\s*/\s*{0}\s*>", element));
            strip_patterns.push(format!(r"(?i)<\s*/?\s*{}\b[^>]*>", element));
        }
        strip_patterns.push(r"(?i)javascript\s*:".to_string());
        strip_patterns.push(r"(?i)data\s*:\s*text/html".to_string());
        let strip_refs: Vec<&str> = strip_patterns.iter().map(String::as_str).collect();

        Self {
            families,
            strip: compile(&strip_refs),
            markup_tag: compile(&[r"<[^<>]*>"]).into_iter().next(),
            event_attr: compile(&[r#"(?i)\bon[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#])
                .into_iter()
                .next(),
            max_payload_length,
        }
    }

    /// Scan inbound text; every matching family is reported.
    pub fn detect_malicious(&self, text: &str) -> Detection {
        let mut patterns: Vec<PatternFamily> = self
            .families
            .iter()
            .filter(|(_, regexes)| regexes.iter().any(|re| re.is_match(text)))
            .map(|(family, _)| *family)
            .collect();

        if text.chars().count() > self.max_payload_length {
            patterns.push(PatternFamily::OversizedPayload);
        }

        Detection {
            is_malicious: !patterns.is_empty(),
            patterns,
        }
    }

    /// Make backend output safe to render as text.
    pub fn sanitize_output(&self, text: &str) -> String {
        let mut current = text.to_string();
        // Removing one match can splice a new one together, so run to a fixed point.
        loop {
            let mut next = current.clone();
            for re in &self.strip {
                next = re.replace_all(&next, "").into_owned();
            }
            next = self.strip_event_attributes(&next);
            if next == current {
                break;
            }
            current = next;
        }
        escape_html(&current)
    }

    fn strip_event_attributes(&self, text: &str) -> String {
        let (Some(tag), Some(attr)) = (&self.markup_tag, &self.event_attr) else {
            return text.to_string();
        };
        tag.replace_all(text, |caps: &regex::Captures<'_>| attr.replace_all(&caps[0], "").into_owned())
            .into_owned()
    }
}

/// Entity-escape markup characters, leaving existing entities intact.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '&' if starts_with_entity(&text[i + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// True when `rest` (the text after an `&`) begins a complete entity reference.
fn starts_with_entity(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let body = &rest[..end];
    if body.is_empty() || body.len() > 10 {
        return false;
    }
    if let Some(num) = body.strip_prefix('#') {
        if let Some(hexdigits) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            return !hexdigits.is_empty() && hexdigits.chars().all(|c| c.is_ascii_hexdigit());
        }
        return !num.is_empty() && num.chars().all(|c| c.is_ascii_digit());
    }
    body.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ContentFilter {
        ContentFilter::new(1000)
    }

    #[test]
    fn test_benign_prompts_pass() {
        let f = filter();
        for prompt in [
            "2+2?",
            "List the top 10 sci-fi novels of all time",
            "Explain how `cargo build` works",
            "What's the difference between SELECT and UNION in SQL?",
            "Compare Python & Rust for CLI tools",
        ] {
            let d = f.detect_malicious(prompt);
            assert!(!d.is_malicious, "{:?} flagged as {:?}", prompt, d.patterns);
        }
    }

    #[test]
    fn test_each_family_detected() {
        let f = filter();
        assert_eq!(
            f.detect_malicious("' OR 1=1 --").patterns,
            vec![PatternFamily::SqlInjection]
        );
        assert_eq!(
            f.detect_malicious("<script>alert(1)</script>").patterns,
            vec![PatternFamily::ScriptInjection]
        );
        assert_eq!(
            f.detect_malicious("hello; rm -rf /").patterns,
            vec![PatternFamily::CommandInjection]
        );
        assert_eq!(
            f.detect_malicious(&"a".repeat(1001)).patterns,
            vec![PatternFamily::OversizedPayload]
        );
    }

    #[test]
    fn test_reports_every_matching_family() {
        let f = filter();
        let d = f.detect_malicious("1 UNION SELECT password; <img onerror=x> $(curl evil)");
        assert!(d.is_malicious);
        assert_eq!(
            d.patterns,
            vec![
                PatternFamily::SqlInjection,
                PatternFamily::ScriptInjection,
                PatternFamily::CommandInjection
            ]
        );
    }

    #[test]
    fn test_sanitize_strips_executable_markup() {
        let f = filter();
        let out = f.sanitize_output(
            "Hi <script>steal()</script><b onclick=\"x()\">bold</b> <a href=\"javascript:go()\">l</a>",
        );
        assert!(!out.contains("steal"));
        assert!(!out.contains("onclick"));
        assert!(!out.contains("javascript"));
        assert!(!out.contains('<'));
        assert!(out.contains("&lt;b &gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn test_sanitize_escapes_plain_text() {
        let f = filter();
        assert_eq!(
            f.sanitize_output(r#"a < b && "c" > 'd'"#),
            "a &lt; b &amp;&amp; &quot;c&quot; &gt; &#39;d&#39;"
        );
        assert_eq!(f.sanitize_output("Tom &amp; Jerry"), "Tom &amp; Jerry");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let f = filter();
        for input in [
            "plain answer",
            "<iframe src=x></iframe><p>ok</p>",
            "javajavascript:script:alert(1)",
            "R&D costs < 5% & rising; &#x27; &copy;",
            "<scr<script>ipt>alert(1)</script>",
            "data:text/html,<h1>x</h1> onload=boom",
        ] {
            let once = f.sanitize_output(input);
            let twice = f.sanitize_output(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_prose_with_on_words_survives() {
        let f = filter();
        for input in [
            "Let one = 1 and two = 2",
            "set online = true in the config",
            "x + one=y",
        ] {
            assert_eq!(f.sanitize_output(input), input);
        }
        let out = f.sanitize_output("<img src=a onerror=boom()> once = 1");
        assert!(!out.contains("onerror"));
        assert!(out.ends_with(" once = 1"));
    }

    #[test]
    fn test_fixed_point_removes_spliced_markup() {
        let f = filter();
        let out = f.sanitize_output("javajavascript:script:alert(1)");
        assert!(!out.to_lowercase().contains("javascript"));
    }
}
