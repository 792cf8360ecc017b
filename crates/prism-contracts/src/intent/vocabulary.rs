/// Phrases that ask about the content of an image wherever they appear.
pub(crate) const CONTENT_CUES: &[&str] = &[
    "describe",
    "identify",
    "explain",
    "analyze",
    "analyse",
    "caption",
    "what's in",
    "what is in",
    "tell me about",
    "how many",
];

/// Question words that only count as the first word of the prompt, and only
/// when the prompt asks for no new image.
pub(crate) const QUESTION_WORDS: &[&str] = &[
    "what", "what's", "whats", "who", "where", "which", "why", "how", "is", "are", "does",
];

/// Verbs asking for a new or modified image. Multi-word entries are matched
/// as whole phrases.
pub(crate) const GENERATION_VERBS: &[&str] = &[
    "generate",
    "generating",
    "create",
    "creating",
    "draw",
    "drawing",
    "make",
    "making",
    "produce",
    "producing",
    "paint",
    "render",
    "design",
    "sketch",
    "illustrate",
    "convert",
    "transform",
    "modify",
    "turn into",
    "turn it into",
    "turn this into",
    "turn them into",
];

pub(crate) const ACTION_LABELS: &[(&str, &str)] = &[
    (
        "generate_image",
        "User wants to CREATE/GENERATE an image from a text description (no input image).",
    ),
    (
        "analyze_image",
        "User wants to ANALYZE/UNDERSTAND an existing image.",
    ),
    (
        "transform_image",
        "User wants to TRANSFORM/MODIFY an existing image based on the prompt (image-to-image).",
    ),
];
