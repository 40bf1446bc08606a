pub mod assembler;
pub mod catalog;
pub mod intent;
pub mod model;
pub mod pipeline;
pub mod ranker;
pub mod references;
pub mod source;

pub use catalog::{InMemoryCatalog, ViewCatalog};
pub use model::{QuestionIntent, QuestionType, ReferenceGroup, View, ViewSummary};
pub use pipeline::{analyze_question, ContextPipeline};
pub use ranker::RankingOptions;
pub use source::{FileSource, MemorySource, SourceError};
