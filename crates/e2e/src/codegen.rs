//! Playwright test code generation
//!
//! Turns YAML specs into `.spec.ts` / `.spec.js` files runnable with
//! `npx playwright test`, plus a matching `playwright.config`.

use std::path::PathBuf;

use crate::config::{ReporterConfig, RunnerConfig, BASE_URL_ENV, PLAYWRIGHT_BASE_URL_ENV};
use crate::spec::{Locator, TestSpec, TestStep};

pub const HEADER_TS: &str = "import { test, expect } from '@playwright/test';\n";
pub const HEADER_JS: &str = "const { test, expect } = require('@playwright/test');\n";

/// Directory, relative to the generated config, holding the test files
pub const GENERATED_TEST_DIR: &str = "e2e";

/// Target language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Lang {
    #[default]
    Ts,
    Js,
}

impl Lang {
    pub fn extension(&self) -> &'static str {
        match self {
            Lang::Ts => "ts",
            Lang::Js => "js",
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            Lang::Ts => HEADER_TS,
            Lang::Js => HEADER_JS,
        }
    }
}

/// A file to write, path relative to the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Single-quoted JS string literal
pub fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// JS regex literal; unescaped `/` is escaped
fn js_regex(pattern: &str) -> String {
    let mut out = String::from("/");
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '/' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out.push('/');
    out
}

/// Playwright locator expression on `page`
pub fn locator_expr(locator: &Locator) -> String {
    match locator {
        Locator::Role { role, name: Some(name) } => {
            format!("page.getByRole({}, {{ name: {} }})", js_string(role), js_string(name))
        }
        Locator::Role { role, name: None } => format!("page.getByRole({})", js_string(role)),
        Locator::Label { label } => format!("page.getByLabel({})", js_string(label)),
        Locator::Text { text } => format!("page.getByText({})", js_string(text)),
        Locator::Css { css } => format!("page.locator({})", js_string(css)),
    }
}

fn step_code(step: &TestStep) -> String {
    match step {
        TestStep::Navigate { url } => format!("await page.goto({});", js_string(url.trim())),
        TestStep::Fill { locator, value } => {
            format!("await {}.fill({});", locator_expr(locator), js_string(value))
        }
        TestStep::Click { locator } => format!("await {}.click();", locator_expr(locator)),
        TestStep::ExpectTitle { pattern } => {
            format!("await expect(page).toHaveTitle({});", js_regex(pattern))
        }
        TestStep::ExpectUrl { pattern } => {
            format!("await expect(page).toHaveURL({});", js_regex(pattern))
        }
        TestStep::ExpectText { locator, text } => format!(
            "await expect({}).toHaveText({});",
            locator_expr(locator),
            js_string(text)
        ),
        TestStep::ExpectVisible { locator } => {
            format!("await expect({}).toBeVisible();", locator_expr(locator))
        }
        TestStep::Log { message } => format!("console.log({});", js_string(message)),
    }
}

/// `test_<name lowercased, spaces to underscores>.spec.<ext>`
pub fn spec_file_name(name: &str, lang: Lang) -> String {
    let stem: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!("test_{}.spec.{}", stem, lang.extension())
}

/// One test file per spec
pub fn generate_spec(spec: &TestSpec, lang: Lang) -> GeneratedFile {
    let mut content = String::from(lang.header());
    content.push('\n');
    if !spec.description.is_empty() {
        for line in spec.description.lines() {
            content.push_str(&format!("// {}\n", line));
        }
    }
    content.push_str(&format!("test({}, async ({{ page }}) => {{\n", js_string(&spec.name)));
    for step in &spec.steps {
        content.push_str("  ");
        content.push_str(&step_code(step));
        content.push('\n');
    }
    content.push_str("});\n");

    GeneratedFile {
        path: PathBuf::from(GENERATED_TEST_DIR).join(spec_file_name(&spec.name, lang)),
        content,
    }
}

/// `playwright.config.<ext>` mirroring the runner configuration
pub fn generate_config(config: &RunnerConfig, lang: Lang) -> GeneratedFile {
    let fallback = config
        .base_url
        .clone()
        .unwrap_or_else(|| formcheck_common::DEFAULT_BASE_URL.to_string());

    let reporters: Vec<String> = config
        .reporters
        .iter()
        .map(|r| match r {
            ReporterConfig::List => "['list']".to_string(),
            ReporterConfig::Html { output_folder } => format!(
                "['html', {{ outputFolder: {}, open: 'never' }}]",
                js_string(&output_folder.to_string_lossy())
            ),
            ReporterConfig::Json { output_file } => format!(
                "['json', {{ outputFile: {} }}]",
                js_string(
                    &output_file
                        .clone()
                        .unwrap_or_else(|| config.output_dir.join("test-results.json"))
                        .to_string_lossy()
                )
            ),
        })
        .collect();

    let workers = config
        .workers
        .map(|w| format!("\tworkers: {},\n", w))
        .unwrap_or_default();

    let body = format!(
        r#"({{
	testDir: './{test_dir}',
	timeout: {timeout},
	retries: {retries},
{workers}	expect: {{
		timeout: {expect_timeout},
	}},
	use: {{
		baseURL: process.env.{pw_env} || process.env.{base_env} || {fallback},
		trace: '{trace}',
		browserName: '{browser}',
		headless: {headless},
		viewport: {{ width: {width}, height: {height} }},
	}},
	reporter: [{reporters}],
	outputDir: {output_dir},
}});
"#,
        test_dir = GENERATED_TEST_DIR,
        timeout = config.timeout_ms,
        retries = config.retries,
        workers = workers,
        expect_timeout = config.expect.timeout_ms,
        pw_env = PLAYWRIGHT_BASE_URL_ENV,
        base_env = BASE_URL_ENV,
        fallback = js_string(&fallback),
        trace = config.trace.as_str(),
        browser = config.playwright.browser.as_str(),
        headless = config.playwright.headless,
        width = config.playwright.viewport_width,
        height = config.playwright.viewport_height,
        reporters = reporters.join(", "),
        output_dir = js_string(&config.output_dir.to_string_lossy()),
    );

    let content = match lang {
        Lang::Ts => format!(
            "import {{ defineConfig }} from '@playwright/test';\n\nexport default defineConfig{}",
            body
        ),
        Lang::Js => format!(
            "const {{ defineConfig }} = require('@playwright/test');\n\nmodule.exports = defineConfig{}",
            body
        ),
    };

    GeneratedFile {
        path: PathBuf::from(format!("playwright.config.{}", lang.extension())),
        content,
    }
}

/// Config plus one file per spec
pub fn generate_all(specs: &[TestSpec], config: &RunnerConfig, lang: Lang) -> Vec<GeneratedFile> {
    std::iter::once(generate_config(config, lang))
        .chain(specs.iter().map(|s| generate_spec(s, lang)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn login_spec() -> TestSpec {
        TestSpec::from_yaml(
            r#"
name: Login smoke
description: Demo credential reaches the dashboard
steps:
  - action: navigate
    url: /login
  - action: fill
    locator: { label: Email }
    value: user@example.com
  - action: fill
    locator: { label: Пароль }
    value: Passw0rd!
  - action: click
    locator: { role: button, name: Войти }
  - action: expect_url
    pattern: 'dashboard\.html$'
  - action: expect_visible
    locator: { text: Добро пожаловать }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_generated_ts_spec() {
        let file = generate_spec(&login_spec(), Lang::Ts);
        assert_eq!(file.path, PathBuf::from("e2e/test_login_smoke.spec.ts"));
        let expected = "import { test, expect } from '@playwright/test';

// Demo credential reaches the dashboard
test('Login smoke', async ({ page }) => {
  await page.goto('/login');
  await page.getByLabel('Email').fill('user@example.com');
  await page.getByLabel('Пароль').fill('Passw0rd!');
  await page.getByRole('button', { name: 'Войти' }).click();
  await expect(page).toHaveURL(/dashboard\\.html$/);
  await expect(page.getByText('Добро пожаловать')).toBeVisible();
});
";
        assert_eq!(file.content, expected);
    }

    #[test]
    fn test_generated_js_uses_require() {
        let file = generate_spec(&login_spec(), Lang::Js);
        assert!(file.content.starts_with(HEADER_JS));
        assert!(file.path.to_string_lossy().ends_with(".spec.js"));
    }

    #[test_case("it's", r"'it\'s'" ; "quote")]
    #[test_case("a\\b", r"'a\\b'" ; "backslash")]
    #[test_case("line\nbreak", r"'line\nbreak'" ; "newline")]
    fn test_js_string(input: &str, expected: &str) {
        assert_eq!(js_string(input), expected);
    }

    #[test_case("login(\\.html)?$", "/login(\\.html)?$/" ; "plain")]
    #[test_case("a/b", "/a\\/b/" ; "slash")]
    #[test_case("a\\/b", "/a\\/b/" ; "already escaped")]
    fn test_js_regex(pattern: &str, expected: &str) {
        assert_eq!(js_regex(pattern), expected);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(spec_file_name("Вход Пользователя", Lang::Ts), "test_вход_пользователя.spec.ts");
        assert_eq!(spec_file_name("a/b", Lang::Js), "test_a_b.spec.js");
    }

    #[test]
    fn test_default_config_matches_runner_defaults() {
        let file = generate_config(&RunnerConfig::default(), Lang::Ts);
        assert_eq!(file.path, PathBuf::from("playwright.config.ts"));
        let c = &file.content;
        assert!(c.starts_with("import { defineConfig } from '@playwright/test';"));
        assert!(c.contains("testDir: './e2e',"));
        assert!(c.contains("timeout: 30000,"));
        assert!(c.contains("timeout: 5000,"));
        assert!(c.contains(
            "baseURL: process.env.PLAYWRIGHT_BASE_URL || process.env.BASE_URL || 'http://localhost:3000',"
        ));
        assert!(c.contains("trace: 'on-first-retry',"));
        assert!(c.contains(
            "reporter: [['list'], ['html', { outputFolder: 'playwright-report', open: 'never' }]],"
        ));
        assert!(!c.contains("workers:"));
    }

    #[test]
    fn test_generate_all() {
        let files = generate_all(&[login_spec()], &RunnerConfig::default(), Lang::Js);
        assert_eq!(files.len(), 2);
        assert!(files[0].content.contains("module.exports = defineConfig({"));
    }
}
