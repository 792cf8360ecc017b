use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest bare base64 run treated as an embedded image.
///
/// Long hashes or token chains above this length will also match; that false
/// positive is accepted in exchange for not parsing the payload.
pub const DEFAULT_MIN_RUN: usize = 100;
pub const MIN_RUN_FLOOR: usize = 16;

static DATA_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:image/[^;,\s]+;base64,[A-Za-z0-9+/]+=*").expect("data URL pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    DataUrl,
    BareRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPayload {
    pub text: String,
    pub kind: PayloadKind,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub payload: Option<EmbeddedPayload>,
    pub remainder: String,
}

impl Detection {
    pub fn found(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload_text(&self) -> Option<&str> {
        self.payload.as_ref().map(|payload| payload.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base64Detector {
    min_run: usize,
}

impl Default for Base64Detector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RUN)
    }
}

impl Base64Detector {
    pub fn new(min_run: usize) -> Self {
        Self {
            min_run: min_run.max(MIN_RUN_FLOOR),
        }
    }

    pub fn min_run(&self) -> usize {
        self.min_run
    }

    /// Finds the first embedded image in `prompt`.
    ///
    /// Data URLs win over bare runs regardless of position, and only the
    /// first occurrence of the winning kind is extracted.
    pub fn detect(&self, prompt: &str) -> Detection {
        let payload = DATA_URL_PATTERN
            .find(prompt)
            .map(|found| EmbeddedPayload {
                text: found.as_str().to_string(),
                kind: PayloadKind::DataUrl,
                span: found.range(),
            })
            .or_else(|| {
                find_bare_run(prompt, self.min_run).map(|span| EmbeddedPayload {
                    text: prompt[span.clone()].to_string(),
                    kind: PayloadKind::BareRun,
                    span,
                })
            });

        match payload {
            Some(payload) => {
                let remainder = format!(
                    "{}{}",
                    &prompt[..payload.span.start],
                    &prompt[payload.span.end..]
                )
                .trim()
                .to_string();
                Detection {
                    payload: Some(payload),
                    remainder,
                }
            }
            None => Detection {
                payload: None,
                remainder: prompt.to_string(),
            },
        }
    }
}

pub fn detect(prompt: &str) -> Detection {
    Base64Detector::default().detect(prompt)
}

fn is_base64_symbol(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/'
}

// Every byte tested here is ASCII, so the returned offsets always fall on
// char boundaries of the original str.
fn find_bare_run(text: &str, min_run: usize) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if !is_base64_symbol(bytes[idx]) {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < bytes.len() && is_base64_symbol(bytes[idx]) {
            idx += 1;
        }
        if idx - start >= min_run {
            let mut end = idx;
            while end < bytes.len() && end - idx < 2 && bytes[end] == b'=' {
                end += 1;
            }
            return Some(start..end);
        }
    }
    None
}
