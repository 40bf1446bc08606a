/// Context assembly for the answering prompt.
///
/// Produces a markdown block with two sections, in ranked order:
/// - view summaries with their overview documents and reference groups
/// - excerpts of the ranked files, when the intent asks for file content
///
/// Fetch failures never abort assembly. A missing overview drops that
/// subsection only; a missing file is replaced by a placeholder line.
use std::fmt::Write as _;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::catalog::ViewCatalog;
use crate::model::{QuestionIntent, View};
use crate::source::FileSource;

pub const FILE_CONTENT_BUDGET: usize = 3000;
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";
pub const VIEW_SECTION_HEADER: &str = "## Relevant Codebase Views\n";
pub const FILE_SECTION_HEADER: &str = "## Relevant Source Files\n";

pub struct ContextAssembler<'a> {
    catalog: &'a dyn ViewCatalog,
    source: &'a dyn FileSource,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(catalog: &'a dyn ViewCatalog, source: &'a dyn FileSource) -> Self {
        Self { catalog, source }
    }

    pub async fn assemble(&self, intent: &QuestionIntent) -> String {
        let mut context = String::from(VIEW_SECTION_HEADER);

        for view_id in &intent.relevant_views {
            let Some(view) = self.catalog.get_view(view_id) else {
                debug!(view_id, "relevant view missing from catalog, skipping");
                continue;
            };
            let overview = self.fetch_overview(view).await;
            push_view(&mut context, view, overview.as_deref());
        }

        if intent.needs_file_content && !intent.relevant_files.is_empty() {
            context.push('\n');
            context.push_str(FILE_SECTION_HEADER);

            // Fetched concurrently, emitted in ranked order.
            let contents = join_all(
                intent
                    .relevant_files
                    .iter()
                    .map(|path| self.source.read_file(path)),
            )
            .await;

            for (path, content) in intent.relevant_files.iter().zip(contents) {
                match content {
                    Ok(content) => push_file(&mut context, path, &content),
                    Err(e) => {
                        warn!(error = %e, path = %path, "file content unavailable");
                        let _ = write!(
                            context,
                            "\n### {path}\n_File content is not accessible ({e})._\n"
                        );
                    }
                }
            }
        }

        context
    }

    async fn fetch_overview(&self, view: &View) -> Option<String> {
        let path = view.overview_path.as_deref()?;
        self.source
            .read_file(path)
            .await
            .inspect_err(|e| warn!(error = %e, view_id = %view.id, path, "view overview unavailable"))
            .ok()
    }
}

fn push_view(context: &mut String, view: &View, overview: Option<&str>) {
    let _ = write!(context, "\n### {}\n", view.name);
    let _ = writeln!(context, "Category: {}", view.category);
    if !view.description.is_empty() {
        let _ = writeln!(context, "{}", view.description);
    }

    if let Some(overview) = overview {
        let _ = write!(context, "\n#### Overview\n{}\n", overview.trim_end());
    }

    context.push_str("\n#### Reference Groups\n");
    for (group_name, group) in &view.reference_groups {
        if group.files.is_empty() {
            let _ = writeln!(context, "- {group_name} (no files)");
            continue;
        }
        let _ = writeln!(context, "- {group_name}:");
        for file in &group.files {
            let _ = writeln!(context, "  - `{file}`");
        }
    }
}

fn push_file(context: &mut String, path: &str, content: &str) {
    let _ = write!(
        context,
        "\n### {path}\n```\n{}\n```\n",
        truncate_content(content, FILE_CONTENT_BUDGET)
    );
}

/// Cut `content` to `max_chars` characters, appending the truncation marker
/// when anything was dropped.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &content[..byte_idx]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::model::{QuestionType, ReferenceGroup};
    use crate::source::MemorySource;

    fn storage_view() -> View {
        let mut groups = BTreeMap::new();
        groups.insert(
            "core".to_string(),
            ReferenceGroup {
                description: None,
                files: vec!["src/Storage.ts".to_string(), "src/Storage.test.ts".to_string()],
            },
        );
        groups.insert("docs".to_string(), ReferenceGroup::default());
        View {
            id: "storage".to_string(),
            name: "Storage Adapter".to_string(),
            category: "architecture".to_string(),
            description: "Persists documents".to_string(),
            overview_path: Some("views/storage.md".to_string()),
            reference_groups: groups,
        }
    }

    fn intent(views: &[&str], files: &[&str]) -> QuestionIntent {
        QuestionIntent {
            question_type: QuestionType::Implementation,
            confidence: 0.9,
            keywords: vec!["storage".to_string()],
            relevant_views: views.iter().map(|s| s.to_string()).collect(),
            needs_file_content: !files.is_empty(),
            relevant_files: files.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_empty_intent_yields_header_only() {
        let catalog = InMemoryCatalog::new(vec![storage_view()]);
        let source = MemorySource::new();
        let assembler = ContextAssembler::new(&catalog, &source);

        let mut empty = intent(&[], &[]);
        empty.question_type = QuestionType::Overview;
        let context = assembler.assemble(&empty).await;
        assert_eq!(context, VIEW_SECTION_HEADER);
        assert!(!context.contains(FILE_SECTION_HEADER));
    }

    #[tokio::test]
    async fn test_view_section_with_overview() {
        let catalog = InMemoryCatalog::new(vec![storage_view()]);
        let source = MemorySource::new().with_file("views/storage.md", "# Storage\nKeeps data.\n");
        let assembler = ContextAssembler::new(&catalog, &source);

        let context = assembler.assemble(&intent(&["storage"], &[])).await;
        assert!(context.contains("### Storage Adapter"));
        assert!(context.contains("Category: architecture"));
        assert!(context.contains("Persists documents"));
        assert!(context.contains("#### Overview\n# Storage\nKeeps data.\n"));
        assert!(context.contains("- core:\n  - `src/Storage.ts`\n  - `src/Storage.test.ts`"));
        assert!(context.contains("- docs (no files)"));
    }

    #[tokio::test]
    async fn test_missing_overview_keeps_groups() {
        let catalog = InMemoryCatalog::new(vec![storage_view()]);
        let source = MemorySource::new();
        let assembler = ContextAssembler::new(&catalog, &source);

        let context = assembler.assemble(&intent(&["storage", "ghost"], &[])).await;
        assert!(!context.contains("#### Overview"));
        assert!(context.contains("#### Reference Groups"));
        assert!(context.contains("`src/Storage.ts`"));
    }

    #[tokio::test]
    async fn test_file_section_order_truncation_and_placeholder() {
        let catalog = InMemoryCatalog::new(vec![storage_view()]);
        let mut source = MemorySource::new();
        source.insert("src/Storage.ts", "x".repeat(FILE_CONTENT_BUDGET + 10));
        source.insert("src/small.ts", "export const a = 1;");
        let assembler = ContextAssembler::new(&catalog, &source);

        let context = assembler
            .assemble(&intent(
                &["storage"],
                &["src/Storage.ts", "src/missing.ts", "src/small.ts"],
            ))
            .await;

        let section = context
            .find(FILE_SECTION_HEADER)
            .expect("file section present");
        let big = context.find("### src/Storage.ts").expect("first file");
        let missing = context.find("### src/missing.ts").expect("second file");
        let small = context.find("### src/small.ts").expect("third file");
        assert!(section < big && big < missing && missing < small);

        assert!(context.contains(&format!("{}{TRUNCATION_MARKER}", "x".repeat(FILE_CONTENT_BUDGET))));
        assert!(!context.contains(&"x".repeat(FILE_CONTENT_BUDGET + 1)));
        assert!(context.contains("File content is not accessible"));
        assert!(context.contains("export const a = 1;"));
    }

    #[tokio::test]
    async fn test_files_ignored_when_not_needed() {
        let catalog = InMemoryCatalog::new(vec![]);
        let source = MemorySource::new().with_file("src/a.ts", "a");
        let assembler = ContextAssembler::new(&catalog, &source);

        let mut i = intent(&[], &["src/a.ts"]);
        i.needs_file_content = false;
        let context = assembler.assemble(&i).await;
        assert_eq!(context, VIEW_SECTION_HEADER);
    }

    #[test]
    fn test_truncate_content_counts_chars() {
        assert_eq!(truncate_content("héllo", 10), "héllo");
        assert_eq!(truncate_content("héllo", 5), "héllo");
        assert_eq!(truncate_content("héllo", 2), format!("hé{TRUNCATION_MARKER}"));
    }
}
