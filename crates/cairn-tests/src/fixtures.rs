//! Test fixtures for tasks, outputs and entries.

use cairn_cache::{Fingerprinter, InputClassifier};
use cairn_core::{CacheEntry, CacheKey, ContentDigest, OutputSet, TaskIdentity};

/// Factory for test task identities.
pub struct TaskFixture;

impl TaskFixture {
    /// A compile task with one declared output.
    pub fn compile() -> TaskIdentity {
        TaskIdentity::new("compile-java", ":app:compileJava")
    }

    /// Key for `compile()` with a single source input of `content`.
    pub fn key_for_source(content: &str) -> CacheKey {
        Fingerprinter::new(Self::compile(), "1.0")
            .input(
                "sources",
                InputClassifier::FullContent,
                ContentDigest::of_bytes(content.as_bytes()),
            )
            .output("classes")
            .finish()
            .expect("fixture inputs are unique")
    }
}

/// Factory for task outputs.
pub struct OutputFixture;

impl OutputFixture {
    /// What "compiling" `source` produces.
    pub fn classes(source: &str) -> OutputSet {
        OutputSet::new().with("classes", format!("bytecode({source})"))
    }
}

/// A complete entry for `source`, keyed as `TaskFixture::key_for_source`.
pub fn entry_for_source(source: &str) -> CacheEntry {
    CacheEntry::new(
        TaskFixture::key_for_source(source),
        TaskFixture::compile(),
        OutputFixture::classes(source),
    )
}
