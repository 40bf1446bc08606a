//! Post-processing of generated answers: file mentions and fenced code blocks.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    /// Info string of the fence, e.g. "ts"; `None` for bare fences
    pub language: Option<String>,
    pub code: String,
}

/// File paths mentioned in `text`, first mention first.
///
/// Matches backticked names with an extension and bare slash-separated paths.
/// When `known_files` is non-empty, only paths that equal or suffix-match a
/// known file are kept, reported as the known path.
pub fn extract_file_references(text: &str, known_files: &[String]) -> Vec<String> {
    let mention_re = Regex::new(
        r"`([^`\s]+\.[A-Za-z0-9]{1,8})`|((?:[A-Za-z0-9_.-]+/)+[A-Za-z0-9_.-]+\.[A-Za-z0-9]{1,8})",
    )
    .expect("valid regex");

    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for caps in mention_re.captures_iter(text) {
        let Some(mention) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let mention = mention.as_str().trim_start_matches("./");

        let resolved = if known_files.is_empty() {
            Some(mention.to_string())
        } else {
            known_files
                .iter()
                .find(|known| {
                    known.as_str() == mention || known.ends_with(&format!("/{mention}"))
                })
                .cloned()
        };

        if let Some(path) = resolved {
            if seen.insert(path.clone()) {
                references.push(path);
            }
        }
    }

    references
}

pub fn extract_code_snippets(text: &str) -> Vec<CodeSnippet> {
    let fence_re = Regex::new(r"(?s)```([A-Za-z0-9_+#-]*)[^\n]*\n(.*?)```").expect("valid regex");

    fence_re
        .captures_iter(text)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let code = caps
                .get(2)
                .map(|m| m.as_str().trim_end_matches('\n').to_string())
                .unwrap_or_default();
            CodeSnippet { language, code }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_backticked_and_bare_paths() {
        let answer = "See `src/cache.ts` and src/storage/Adapter.ts; also `src/cache.ts` again.";
        let refs = extract_file_references(answer, &[]);
        assert_eq!(refs, vec!["src/cache.ts", "src/storage/Adapter.ts"]);
    }

    #[test]
    fn test_known_files_filter_and_suffix_match() {
        let known = vec!["src/services/Cache.ts".to_string(), "src/index.ts".to_string()];
        let answer = "The logic lives in `Cache.ts`, not in lib/other.ts.";
        let refs = extract_file_references(answer, &known);
        assert_eq!(refs, vec!["src/services/Cache.ts"]);
    }

    #[test]
    fn test_no_references() {
        assert!(extract_file_references("Nothing to see here.", &[]).is_empty());
    }

    #[test]
    fn test_extract_code_snippets() {
        let answer = "Use it like this:\n```ts\nconst c = new Cache();\n```\nOr:\n```\nplain\n```\n";
        let snippets = extract_code_snippets(answer);
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].language.as_deref(), Some("ts"));
        assert_eq!(snippets[0].code, "const c = new Cache();");
        assert_eq!(snippets[1].language, None);
        assert_eq!(snippets[1].code, "plain");
    }
}
