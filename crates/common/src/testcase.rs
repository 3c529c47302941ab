//! Manual test cases: title, steps and expected outcome

use serde::{Deserialize, Serialize};

/// A human-readable test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub expected: String,
}

impl TestCase {
    pub fn new(title: impl Into<String>, steps: Vec<String>, expected: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            steps,
            expected: expected.into(),
        }
    }

    /// File-name slug: lowercased title with spaces replaced by underscores
    pub fn slug(&self) -> String {
        self.title.to_lowercase().replace(' ', "_")
    }

    /// Render as a markdown section
    pub fn to_markdown(&self) -> String {
        let steps = self
            .steps
            .iter()
            .map(|s| format!("  - {}", s))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "### {}\n\n- Шаги:\n{}\n\n- Ожидаемо: {}\n",
            self.title, steps, self.expected
        )
    }
}

/// Serialized form `{"test_cases": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseSet {
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl TestCaseSet {
    pub fn new(test_cases: Vec<TestCase>) -> Self {
        Self { test_cases }
    }

    pub fn to_markdown(&self) -> String {
        self.test_cases
            .iter()
            .map(TestCase::to_markdown)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pretty JSON, non-ASCII kept as-is
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
