//! Declarative YAML test specification

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,

    /// File the spec was loaded from
    #[serde(skip)]
    pub file: Option<PathBuf>,
}

/// How to find an element, mirroring Playwright's user-facing locators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    /// Element with an ARIA role, optionally filtered by accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Form control associated with a label
    Label { label: String },
    /// Element containing text
    Text { text: String },
    /// Raw CSS selector
    Css { css: String },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Role { role, name: Some(name) } => write!(f, "role={}[name={:?}]", role, name),
            Locator::Role { role, name: None } => write!(f, "role={}", role),
            Locator::Label { label } => write!(f, "label={:?}", label),
            Locator::Text { text } => write!(f, "text={:?}", text),
            Locator::Css { css } => write!(f, "css={}", css),
        }
    }
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate { url: String },

    /// Set the value of a form control
    Fill { locator: Locator, value: String },

    /// Click an element
    Click { locator: Locator },

    /// Page title matches a regex
    ExpectTitle { pattern: String },

    /// Current URL matches a regex
    ExpectUrl { pattern: String },

    /// Element text equals the given string (whitespace-normalized)
    ExpectText { locator: Locator, text: String },

    /// Element is visible
    ExpectVisible { locator: Locator },

    /// Log a message (for debugging)
    Log { message: String },
}

impl TestStep {
    /// Short name used in results and traces
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate:{}", url),
            TestStep::Fill { locator, .. } => format!("fill:{}", locator),
            TestStep::Click { locator } => format!("click:{}", locator),
            TestStep::ExpectTitle { pattern } => format!("expect_title:/{}/", pattern),
            TestStep::ExpectUrl { pattern } => format!("expect_url:/{}/", pattern),
            TestStep::ExpectText { locator, .. } => format!("expect_text:{}", locator),
            TestStep::ExpectVisible { locator } => format!("expect_visible:{}", locator),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    /// Whether this step waits on the expectation timeout
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            TestStep::ExpectTitle { .. }
                | TestStep::ExpectUrl { .. }
                | TestStep::ExpectText { .. }
                | TestStep::ExpectVisible { .. }
        )
    }

    /// Compile regex patterns up front so bad specs fail at load time
    fn check(&self) -> E2eResult<()> {
        match self {
            TestStep::ExpectTitle { pattern } | TestStep::ExpectUrl { pattern } => {
                regex::Regex::new(pattern)?;
                Ok(())
            }
            TestStep::Navigate { url } if url.trim().is_empty() => {
                Err(E2eError::SpecParse("navigate url is empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}

pub(crate) fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

/// A spec file: one test or a suite of tests sharing tags
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SpecDocument {
    Suite {
        #[serde(default)]
        tags: Vec<String>,
        tests: Vec<TestSpec>,
    },
    Single(TestSpec),
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let mut specs = Self::all_from_yaml(yaml)?;
        if specs.len() != 1 {
            return Err(E2eError::SpecParse(format!(
                "expected a single test, found {}",
                specs.len()
            )));
        }
        Ok(specs.remove(0))
    }

    /// Parse every test in a YAML document
    pub fn all_from_yaml(yaml: &str) -> E2eResult<Vec<Self>> {
        let specs = match serde_yaml::from_str::<SpecDocument>(yaml)? {
            SpecDocument::Single(spec) => vec![spec],
            SpecDocument::Suite { tags, tests } => tests
                .into_iter()
                .map(|mut spec| {
                    for tag in &tags {
                        if !spec.tags.contains(tag) {
                            spec.tags.push(tag.clone());
                        }
                    }
                    spec
                })
                .collect(),
        };

        for spec in &specs {
            spec.check()?;
        }
        Ok(specs)
    }

    /// Parse all test specs from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        let mut specs = Self::all_from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))?;
        for spec in &mut specs {
            spec.file = Some(path.to_path_buf());
        }
        Ok(specs)
    }

    /// Load all test specs from a directory, in sorted path order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::Config(format!(
                "test directory not found: {}",
                dir.display()
            )));
        }

        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.extend(Self::from_file(entry.path())?);
        }

        Self::check_unique(&specs)?;
        Ok(specs)
    }

    /// Names must stay distinct once turned into file names
    pub fn check_unique(specs: &[Self]) -> E2eResult<()> {
        let mut seen = std::collections::HashMap::new();
        for spec in specs {
            if let Some(other) = seen.insert(spec.slug(), spec.name.as_str()) {
                return Err(E2eError::SpecParse(if other == spec.name {
                    format!("duplicate test name: {}", spec.name)
                } else {
                    format!("test names {:?} and {:?} map to the same file name", other, spec.name)
                }));
            }
        }
        Ok(())
    }

    /// Lowercased name with every non-alphanumeric character replaced by `-`
    pub fn slug(&self) -> String {
        slug(&self.name)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// File name for display, if known
    pub fn file_name(&self) -> Option<String> {
        self.file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
    }

    fn check(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("test name is empty".to_string()));
        }
        for step in &self.steps {
            step.check()?;
        }
        Ok(())
    }
}
