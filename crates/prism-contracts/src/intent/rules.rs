use super::vocabulary::{CONTENT_CUES, GENERATION_VERBS, QUESTION_WORDS};
use super::{Intent, IntentAction, IntentSource};

struct NormalizedPrompt {
    tokens: Vec<String>,
    padded: String,
}

impl NormalizedPrompt {
    fn new(prompt: &str) -> Self {
        let lowered = prompt.replace('\u{2019}', "'").to_lowercase();
        let tokens: Vec<String> = lowered
            .split(|ch: char| !(ch.is_alphanumeric() || ch == '\''))
            .map(|token| token.trim_matches('\''))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
        let padded = format!(" {} ", tokens.join(" "));
        Self { tokens, padded }
    }

    fn contains(&self, phrase: &str) -> bool {
        self.padded.contains(&format!(" {phrase} "))
    }

    fn starts_with(&self, phrase: &str) -> bool {
        self.padded.starts_with(&format!(" {phrase} "))
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AnalysisCue {
    /// Content question anywhere in the prompt, e.g. "describe".
    Content(&'static str),
    /// Leading question word, e.g. "is".
    Question(&'static str),
}

fn analysis_cue(prompt: &NormalizedPrompt) -> Option<AnalysisCue> {
    if prompt.is_empty() {
        return None;
    }
    if let Some(cue) = CONTENT_CUES.iter().copied().find(|cue| prompt.contains(cue)) {
        return Some(AnalysisCue::Content(cue));
    }
    QUESTION_WORDS
        .iter()
        .copied()
        .find(|word| prompt.starts_with(word))
        .map(AnalysisCue::Question)
}

fn find_generation_verb(prompt: &NormalizedPrompt) -> Option<&'static str> {
    GENERATION_VERBS
        .iter()
        .find(|verb| prompt.contains(verb))
        .copied()
}

/// Local rendition of the classification policy, first matching rule wins:
///
/// 1. asking about existing content -> analyze
/// 2. image attached + generation verb -> transform
/// 3. no image + generation verb -> generate
/// 4. image attached, ambiguous -> analyze
/// 5. otherwise -> generate
///
/// A leading question word only makes the prompt "about existing content"
/// when no generation verb follows ("is it possible to draw a fox" asks for
/// a drawing). A content cue such as "describe" wins over a verb when an
/// image is attached; without an image there is nothing to describe, so the
/// verb decides.
pub fn classify_by_rules(prompt: &str, has_image: bool) -> Intent {
    let normalized = NormalizedPrompt::new(prompt);
    let verb = find_generation_verb(&normalized);

    match analysis_cue(&normalized) {
        Some(AnalysisCue::Content(cue)) if has_image || verb.is_none() => {
            return Intent::new(
                IntentAction::AnalyzeImage,
                format!("Prompt asks about existing content ('{cue}')."),
                IntentSource::Rules,
            );
        }
        Some(AnalysisCue::Question(word)) if verb.is_none() => {
            return Intent::new(
                IntentAction::AnalyzeImage,
                format!("Prompt is a question ('{word}') and asks for no new image."),
                IntentSource::Rules,
            );
        }
        _ => {}
    }

    match (verb, has_image) {
        (Some(verb), true) => Intent::new(
            IntentAction::TransformImage,
            format!("Image attached and prompt asks to '{verb}' it."),
            IntentSource::Rules,
        ),
        (Some(verb), false) => Intent::new(
            IntentAction::GenerateImage,
            format!("No image attached and prompt asks to '{verb}' an image."),
            IntentSource::Rules,
        ),
        (None, true) => Intent::new(
            IntentAction::AnalyzeImage,
            "Image attached and prompt is ambiguous; defaulting to analysis.",
            IntentSource::Rules,
        ),
        (None, false) => Intent::new(
            IntentAction::GenerateImage,
            "No image attached and prompt is ambiguous; defaulting to generation.",
            IntentSource::Rules,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation_verb(prompt: &str) -> Option<&'static str> {
        find_generation_verb(&NormalizedPrompt::new(prompt))
    }

    #[test]
    fn reference_examples_follow_precedence() {
        let cases = [
            ("generate a sunset", false, IntentAction::GenerateImage),
            ("generate a pokemon", true, IntentAction::TransformImage),
            ("what's in this image?", true, IntentAction::AnalyzeImage),
            (
                "turn this into a watercolor painting",
                true,
                IntentAction::TransformImage,
            ),
            (
                "create an impressionist painting",
                false,
                IntentAction::GenerateImage,
            ),
            (
                "make this image look like a cartoon",
                true,
                IntentAction::TransformImage,
            ),
        ];
        for (prompt, has_image, expected) in cases {
            let intent = classify_by_rules(prompt, has_image);
            assert_eq!(intent.action, expected, "prompt: {prompt}");
            assert!(!intent.reasoning.is_empty());
            assert_eq!(intent.source, IntentSource::Rules);
        }
    }

    #[test]
    fn analysis_beats_generation_verbs() {
        let intent = classify_by_rules("Describe what you would draw to make this better", true);
        assert_eq!(intent.action, IntentAction::AnalyzeImage);
        assert!(intent.reasoning.contains("describe"));
    }

    #[test]
    fn leading_question_words_only_count_at_the_start() {
        assert_eq!(
            classify_by_rules("draw what you see in your dreams", false).action,
            IntentAction::GenerateImage
        );
        assert_eq!(
            classify_by_rules("What’s the breed of this dog", true).action,
            IntentAction::AnalyzeImage
        );
    }

    #[test]
    fn ambiguous_prompts_default_on_image_presence() {
        assert_eq!(
            classify_by_rules("a cat on a skateboard", true).action,
            IntentAction::AnalyzeImage
        );
        assert_eq!(
            classify_by_rules("a cat on a skateboard", false).action,
            IntentAction::GenerateImage
        );
        assert_eq!(classify_by_rules("", false).action, IntentAction::GenerateImage);
    }

    #[test]
    fn question_words_yield_to_generation_verbs() {
        let cases = [
            (
                "How about you generate a sunset over the sea",
                false,
                IntentAction::GenerateImage,
            ),
            ("Is it possible to draw a red fox", false, IntentAction::GenerateImage),
            (
                "Does this look better as a watercolor? convert it",
                true,
                IntentAction::TransformImage,
            ),
            ("Why is the sky in this photo so orange", true, IntentAction::AnalyzeImage),
            ("how many birds are there", true, IntentAction::AnalyzeImage),
        ];
        for (prompt, has_image, expected) in cases {
            assert_eq!(
                classify_by_rules(prompt, has_image).action,
                expected,
                "prompt: {prompt}"
            );
        }
    }

    #[test]
    fn content_cue_without_image_yields_to_generation_verb() {
        let intent = classify_by_rules("Can you describe a castle and then draw it", false);
        assert_eq!(intent.action, IntentAction::GenerateImage);
        assert!(intent.reasoning.contains("draw"));

        let intent = classify_by_rules("Can you describe a castle and then draw it", true);
        assert_eq!(intent.action, IntentAction::AnalyzeImage);

        let intent = classify_by_rules("describe a castle", false);
        assert_eq!(intent.action, IntentAction::AnalyzeImage);
    }

    #[test]
    fn verbs_match_whole_words_only() {
        assert_eq!(generation_verb("remake history"), None);
        assert_eq!(generation_verb("please Make it blue"), Some("make"));
        assert_eq!(generation_verb("turn them into robots"), Some("turn them into"));
    }
}
