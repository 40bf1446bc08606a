/// Intent classification for codebase questions.
///
/// Rules are evaluated in table order against the lower-cased question and the
/// first match wins. Triggers overlap between rules ("how do" is a prefix of
/// "how do i"), so the table order decides ambiguous questions.
use crate::model::QuestionType;

struct IntentRule {
    question_type: QuestionType,
    confidence: f32,
    triggers: &'static [&'static str],
}

const RULES: &[IntentRule] = &[
    IntentRule {
        question_type: QuestionType::Implementation,
        confidence: 0.9,
        triggers: &[
            "how does",
            "how do",
            "show me",
            "implementation",
            "code for",
            "method",
            "function",
        ],
    },
    IntentRule {
        question_type: QuestionType::Comparison,
        confidence: 0.85,
        triggers: &[
            "difference between",
            "compare",
            "vs ",
            "versus",
            "or ",
            "when should i use",
        ],
    },
    IntentRule {
        question_type: QuestionType::Usage,
        confidence: 0.85,
        triggers: &[
            "how to",
            "how do i",
            "use ",
            "example",
            "getting started",
            "tutorial",
        ],
    },
];

const DEFAULT_CONFIDENCE: f32 = 0.7;

/// Result of classifying a question, before any ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub question_type: QuestionType,
    pub confidence: f32,
}

/// Classify a question into one of the four question types.
///
/// Never fails: questions matching no rule are `Overview`.
pub fn classify(question: &str) -> Classification {
    let lower = question.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.triggers.iter().any(|t| lower.contains(t)))
        .map(|rule| Classification {
            question_type: rule.question_type,
            confidence: rule.confidence,
        })
        .unwrap_or(Classification {
            question_type: QuestionType::Overview,
            confidence: DEFAULT_CONFIDENCE,
        })
}
