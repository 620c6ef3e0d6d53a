//! Cache key derivation.
//!
//! The key is a SHA-256 over a length-prefixed encoding of the task kind,
//! the implementation version, the ordered input fingerprints and the
//! declared output names. Inputs arrive as pre-computed digests; nothing
//! here touches the filesystem except the [`Fingerprinter::input_file`]
//! convenience.

use cairn_core::{CacheKey, ContentDigest, Error, Result, TaskIdentity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Bumped whenever the hashed layout changes.
const FINGERPRINT_DOMAIN: &[u8] = b"cairn.fingerprint.v1";

/// How an input's digest was derived.
///
/// Supplied by whatever understands the input's semantics: an interface-only
/// digest of a library lets internal-only changes keep the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputClassifier {
    /// Digest of the complete content.
    FullContent,
    /// Digest of the externally visible interface only.
    InterfaceOnly,
    /// Digest of a normalized property value.
    NormalizedValue,
    /// A normalization scheme known to the caller.
    Custom(String),
}

impl InputClassifier {
    /// Stable tag mixed into the key.
    pub fn tag(&self) -> Cow<'_, str> {
        match self {
            InputClassifier::FullContent => Cow::Borrowed("full"),
            InputClassifier::InterfaceOnly => Cow::Borrowed("interface"),
            InputClassifier::NormalizedValue => Cow::Borrowed("value"),
            InputClassifier::Custom(name) => Cow::Owned(format!("custom:{name}")),
        }
    }
}

impl fmt::Display for InputClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// One declared input: name, classifier and content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    pub name: String,
    pub classifier: InputClassifier,
    pub digest: ContentDigest,
}

impl InputFingerprint {
    pub fn new(name: impl Into<String>, classifier: InputClassifier, digest: ContentDigest) -> Self {
        Self {
            name: name.into(),
            classifier,
            digest,
        }
    }
}

/// Compute the cache key for one task execution.
///
/// Input order is significant. Duplicate input names are rejected, as they
/// would make two different input sets indistinguishable to callers.
pub fn fingerprint<S: AsRef<str>>(
    task: &TaskIdentity,
    implementation_version: &str,
    inputs: &[InputFingerprint],
    output_names: &[S],
) -> Result<CacheKey> {
    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.name.as_str()) {
            return Err(Error::InvalidInput(format!(
                "duplicate input '{}' for task {}",
                input.name, task
            )));
        }
    }

    let mut hasher = KeyHasher::new();
    hasher.field(task.kind.as_bytes());
    hasher.field(implementation_version.as_bytes());

    hasher.count(inputs.len());
    for input in inputs {
        hasher.field(input.name.as_bytes());
        hasher.field(input.classifier.tag().as_bytes());
        hasher.field(input.digest.as_bytes());
    }

    hasher.count(output_names.len());
    for name in output_names {
        hasher.field(name.as_ref().as_bytes());
    }

    Ok(hasher.finish())
}

/// Length-prefixed SHA-256 so no two field sequences share an encoding.
struct KeyHasher(Sha256);

impl KeyHasher {
    fn new() -> Self {
        let mut hasher = Self(Sha256::new());
        hasher.field(FINGERPRINT_DOMAIN);
        hasher
    }

    fn field(&mut self, bytes: &[u8]) {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
    }

    fn count(&mut self, n: usize) {
        self.0.update((n as u64).to_be_bytes());
    }

    fn finish(self) -> CacheKey {
        CacheKey::from_bytes(self.0.finalize().into())
    }
}

/// Collects a task's declared inputs and outputs in declaration order.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    task: TaskIdentity,
    version: String,
    inputs: Vec<InputFingerprint>,
    outputs: Vec<String>,
}

impl Fingerprinter {
    pub fn new(task: TaskIdentity, implementation_version: impl Into<String>) -> Self {
        Self {
            task,
            version: implementation_version.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add an input whose digest was computed elsewhere.
    pub fn input(
        mut self,
        name: impl Into<String>,
        classifier: InputClassifier,
        digest: ContentDigest,
    ) -> Self {
        self.inputs.push(InputFingerprint::new(name, classifier, digest));
        self
    }

    /// Add a property value, hashed as a normalized value.
    pub fn value(self, name: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        let digest = ContentDigest::of_bytes(value.as_ref());
        self.input(name, InputClassifier::NormalizedValue, digest)
    }

    /// Add a file input, hashing its full content.
    pub fn input_file(self, name: impl Into<String>, path: &Path) -> Result<Self> {
        let digest = ContentDigest::of_file(path)?;
        Ok(self.input(name, InputClassifier::FullContent, digest))
    }

    /// Declare an output property name.
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn task(&self) -> &TaskIdentity {
        &self.task
    }

    pub fn inputs(&self) -> &[InputFingerprint] {
        &self.inputs
    }

    pub fn finish(&self) -> Result<CacheKey> {
        fingerprint(&self.task, &self.version, &self.inputs, &self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn task() -> TaskIdentity {
        TaskIdentity::new("compile-java", ":lib:compileJava")
    }

    fn digest(s: &str) -> ContentDigest {
        ContentDigest::of_bytes(s.as_bytes())
    }

    fn base() -> Fingerprinter {
        Fingerprinter::new(task(), "1.0")
            .input("sources", InputClassifier::FullContent, digest("class A {}"))
            .input("classpath", InputClassifier::InterfaceOnly, digest("api"))
            .value("target", "17")
            .output("classes")
    }

    #[test]
    fn test_same_inputs_same_key() {
        assert_eq!(base().finish().unwrap(), base().finish().unwrap());
    }

    #[test]
    fn test_key_is_64_hex_chars() {
        let hex = base().finish().unwrap().to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<CacheKey>().unwrap(), base().finish().unwrap());
    }

    #[test]
    fn test_input_content_changes_key() {
        let changed = Fingerprinter::new(task(), "1.0")
            .input("sources", InputClassifier::FullContent, digest("class A { int x; }"))
            .input("classpath", InputClassifier::InterfaceOnly, digest("api"))
            .value("target", "17")
            .output("classes");
        assert_ne!(base().finish().unwrap(), changed.finish().unwrap());
    }

    #[test]
    fn test_classifier_changes_key() {
        let a = Fingerprinter::new(task(), "1")
            .input("dep", InputClassifier::FullContent, digest("x"))
            .finish()
            .unwrap();
        let b = Fingerprinter::new(task(), "1")
            .input("dep", InputClassifier::InterfaceOnly, digest("x"))
            .finish()
            .unwrap();
        let c = Fingerprinter::new(task(), "1")
            .input("dep", InputClassifier::Custom("abi".into()), digest("x"))
            .finish()
            .unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_version_and_kind_change_key() {
        let v2 = Fingerprinter::new(task(), "2.0")
            .input("sources", InputClassifier::FullContent, digest("class A {}"))
            .input("classpath", InputClassifier::InterfaceOnly, digest("api"))
            .value("target", "17")
            .output("classes");
        assert_ne!(base().finish().unwrap(), v2.finish().unwrap());

        let other_kind = fingerprint::<&str>(&TaskIdentity::new("kotlin", ":lib:compileJava"), "1.0", &[], &[]);
        let same_kind = fingerprint::<&str>(&task(), "1.0", &[], &[]);
        assert_ne!(other_kind.unwrap(), same_kind.unwrap());
    }

    #[test]
    fn test_task_path_does_not_affect_key() {
        let elsewhere = TaskIdentity::new("compile-java", ":app:compileJava");
        let a = fingerprint(&task(), "1", &[], &["classes"]).unwrap();
        let b = fingerprint(&elsewhere, "1", &[], &["classes"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_names_change_key() {
        let a = fingerprint::<&str>(&task(), "1", &[], &["classes"]).unwrap();
        let b = fingerprint::<&str>(&task(), "1", &[], &["classes", "headers"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // "ab" + "c" must not collide with "a" + "bc".
        let a = fingerprint::<&str>(&task(), "1", &[], &["ab", "c"]).unwrap();
        let b = fingerprint::<&str>(&task(), "1", &[], &["a", "bc"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_input_names_rejected() {
        let err = Fingerprinter::new(task(), "1")
            .value("opt", "a")
            .value("opt", "b")
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_input_file_hashes_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("A.java");
        std::fs::write(&path, "X").unwrap();
        let from_file = Fingerprinter::new(task(), "1")
            .input_file("src", &path)
            .unwrap()
            .finish()
            .unwrap();
        let from_digest = Fingerprinter::new(task(), "1")
            .input("src", InputClassifier::FullContent, digest("X"))
            .finish()
            .unwrap();
        assert_eq!(from_file, from_digest);
    }

    fn inputs_strategy() -> impl Strategy<Value = Vec<InputFingerprint>> {
        prop::collection::btree_map("[a-z]{1,8}", any::<[u8; 32]>(), 0..6).prop_map(|m| {
            m.into_iter()
                .map(|(name, bytes)| {
                    InputFingerprint::new(
                        name,
                        InputClassifier::FullContent,
                        ContentDigest::from_bytes(bytes),
                    )
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(
            inputs in inputs_strategy(),
            outputs in prop::collection::vec("[a-z]{1,8}", 0..4),
            version in "[0-9.]{1,6}",
        ) {
            let a = fingerprint(&task(), &version, &inputs, &outputs).unwrap();
            let b = fingerprint(&task(), &version, &inputs.clone(), &outputs.clone()).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_input_order_is_significant(inputs in inputs_strategy()) {
            prop_assume!(inputs.len() >= 2);
            let mut swapped = inputs.clone();
            swapped.swap(0, 1);
            let a = fingerprint::<&str>(&task(), "1", &inputs, &[]).unwrap();
            let b = fingerprint::<&str>(&task(), "1", &swapped, &[]).unwrap();
            prop_assert_ne!(a, b);
        }
    }
}
