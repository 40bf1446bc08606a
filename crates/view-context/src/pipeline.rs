use tracing::info;

use crate::assembler::ContextAssembler;
use crate::catalog::ViewCatalog;
use crate::intent::classify;
use crate::model::QuestionIntent;
use crate::ranker::{self, RankingOptions};
use crate::source::FileSource;

/// Classifier, ranker and assembler bound to one catalog and file source.
pub struct ContextPipeline<'a> {
    catalog: &'a dyn ViewCatalog,
    source: &'a dyn FileSource,
    options: &'a RankingOptions,
}

impl<'a> ContextPipeline<'a> {
    pub fn new(
        catalog: &'a dyn ViewCatalog,
        source: &'a dyn FileSource,
        options: &'a RankingOptions,
    ) -> Self {
        Self {
            catalog,
            source,
            options,
        }
    }

    /// Classify the question and select views and files for it.
    pub fn analyze(&self, question: &str) -> QuestionIntent {
        analyze_question(question, self.catalog, self.options)
    }

    pub async fn build_context(&self, question: &str) -> (QuestionIntent, String) {
        let intent = self.analyze(question);
        let context = ContextAssembler::new(self.catalog, self.source)
            .assemble(&intent)
            .await;
        info!(
            question_type = %intent.question_type,
            views = intent.relevant_views.len(),
            files = intent.relevant_files.len(),
            context_chars = context.chars().count(),
            "context assembled"
        );
        (intent, context)
    }
}

pub fn analyze_question(
    question: &str,
    catalog: &dyn ViewCatalog,
    options: &RankingOptions,
) -> QuestionIntent {
    let views = catalog.views();
    let classification = classify(question);
    let keywords = ranker::extract_keywords(question, views, &options.vocabulary);
    let relevant_views = ranker::rank_views(views, &keywords, classification.question_type);
    let needs_file_content = ranker::needs_file_content(question, classification.question_type);
    let relevant_files = if needs_file_content {
        ranker::rank_files(views, &relevant_views, &keywords, &options.source_extension)
    } else {
        Vec::new()
    };

    QuestionIntent {
        question_type: classification.question_type,
        confidence: classification.confidence,
        keywords,
        relevant_views,
        needs_file_content,
        relevant_files,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::model::{QuestionType, ReferenceGroup, View};
    use crate::source::MemorySource;

    fn catalog() -> InMemoryCatalog {
        let mut storage_groups = BTreeMap::new();
        storage_groups.insert(
            "adapters".to_string(),
            ReferenceGroup {
                description: None,
                files: vec![
                    "src/Storage.test.ts".to_string(),
                    "src/Storage.ts".to_string(),
                    "src/memory.ts".to_string(),
                ],
            },
        );
        let mut guide_groups = BTreeMap::new();
        guide_groups.insert(
            "examples".to_string(),
            ReferenceGroup {
                description: None,
                files: vec!["examples/basic.ts".to_string()],
            },
        );

        InMemoryCatalog::new(vec![
            View {
                id: "storage".to_string(),
                name: "Storage Adapter".to_string(),
                category: "architecture".to_string(),
                description: "How records are persisted".to_string(),
                overview_path: Some("views/storage.md".to_string()),
                reference_groups: storage_groups,
            },
            View {
                id: "quickstart".to_string(),
                name: "Quickstart".to_string(),
                category: "guide".to_string(),
                description: "First steps with the library".to_string(),
                overview_path: None,
                reference_groups: guide_groups,
            },
        ])
    }

    #[test]
    fn test_implementation_question_selects_files() {
        let catalog = catalog();
        let options = RankingOptions::default();
        let intent = analyze_question("How does the storage adapter save data?", &catalog, &options);

        assert_eq!(intent.question_type, QuestionType::Implementation);
        assert_eq!(intent.relevant_views.first().map(String::as_str), Some("storage"));
        assert!(intent.needs_file_content);
        assert_eq!(intent.relevant_files.first().map(String::as_str), Some("src/Storage.ts"));
        assert!(intent.relevant_files.len() <= 5);
    }

    #[test]
    fn test_overview_question_has_no_files() {
        let catalog = catalog();
        let options = RankingOptions::default();
        let intent = analyze_question("Give me the big picture", &catalog, &options);

        assert_eq!(intent.question_type, QuestionType::Overview);
        assert!(!intent.needs_file_content);
        assert!(intent.relevant_files.is_empty());
        // architecture bonus
        assert_eq!(intent.relevant_views, vec!["storage"]);
    }

    #[test]
    fn test_usage_question_prefers_guides() {
        let catalog = catalog();
        let options = RankingOptions::default();
        let intent = analyze_question("Is there a tutorial with example code?", &catalog, &options);

        assert_eq!(intent.question_type, QuestionType::Usage);
        assert_eq!(intent.relevant_views, vec!["quickstart"]);
        assert!(intent.needs_file_content);
        assert_eq!(intent.relevant_files, vec!["examples/basic.ts"]);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = InMemoryCatalog::default();
        let options = RankingOptions::default();
        let intent = analyze_question("Show me the cache", &catalog, &options);

        assert!(intent.relevant_views.is_empty());
        assert!(intent.relevant_files.is_empty());
        assert_eq!(intent.keywords, vec!["cache"]);
    }

    #[tokio::test]
    async fn test_build_context_end_to_end() {
        let catalog = catalog();
        let options = RankingOptions::default();
        let source = MemorySource::new()
            .with_file("views/storage.md", "Storage writes through adapters.")
            .with_file("src/Storage.ts", "export class Storage {}");
        let pipeline = ContextPipeline::new(&catalog, &source, &options);

        let (intent, context) = pipeline.build_context("Show me the storage code").await;
        assert_eq!(intent.question_type, QuestionType::Implementation);
        assert!(context.contains("Storage writes through adapters."));
        assert!(context.contains("export class Storage {}"));
        assert!(context.contains("File content is not accessible"));
    }
}
