//! Static HTML queries for the HTTP driver
//!
//! Resolves [`Locator`]s against a parsed document the way Playwright's
//! user-facing locators do: label, ARIA role with accessible name, text and
//! CSS. Matching of labels, names and text is case-insensitive substring
//! over whitespace-normalized strings. No scripts run and no layout is
//! computed; visibility only looks at `hidden`, inline `display`/`visibility`
//! and non-rendered containers.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use crate::error::{E2eError, E2eResult};
use crate::spec::Locator;

/// Collapse runs of whitespace and trim
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    normalize_ws(haystack)
        .to_lowercase()
        .contains(&normalize_ws(needle).to_lowercase())
}

fn selector(css: &str) -> E2eResult<Selector> {
    Selector::parse(css).map_err(|e| E2eError::SpecParse(format!("bad css selector {:?}: {}", css, e)))
}

fn all_elements() -> Selector {
    Selector::parse("*").expect("universal selector parses")
}

pub fn element_text(el: &ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

const NON_RENDERED: [&str; 7] = ["head", "script", "style", "template", "noscript", "title", "meta"];

/// Static visibility check for one element and its ancestors
pub fn is_visible(el: &ElementRef<'_>) -> bool {
    let hidden_self = |e: &ElementRef<'_>| {
        let v = e.value();
        if NON_RENDERED.contains(&v.name()) || v.attr("hidden").is_some() {
            return true;
        }
        if v.name() == "input" && v.attr("type").map(|t| t.eq_ignore_ascii_case("hidden")).unwrap_or(false) {
            return true;
        }
        if v.attr("aria-hidden") == Some("true") {
            return true;
        }
        let style: String = v
            .attr("style")
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        style.contains("display:none") || style.contains("visibility:hidden")
    };

    if hidden_self(el) {
        return false;
    }
    !el.ancestors().filter_map(ElementRef::wrap).any(|a| hidden_self(&a))
}

/// Role an element exposes, explicit `role` first
pub fn role_of(el: &ElementRef<'_>) -> Option<String> {
    let v = el.value();
    if let Some(role) = v.attr("role").and_then(|r| r.split_whitespace().next()) {
        return Some(role.to_lowercase());
    }

    let input_type = v.attr("type").unwrap_or("text").to_lowercase();
    let role = match v.name() {
        "button" => "button",
        "a" | "area" if v.attr("href").is_some() => "link",
        "textarea" => "textbox",
        "select" => {
            if v.attr("multiple").is_some() {
                "listbox"
            } else {
                "combobox"
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "main" => "main",
        "nav" => "navigation",
        "form" => "form",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "table" => "table",
        "input" => match input_type.as_str() {
            "button" | "submit" | "reset" | "image" => "button",
            "checkbox" => "checkbox",
            "radio" => "radio",
            "range" => "slider",
            "number" => "spinbutton",
            "search" => "searchbox",
            "text" | "email" | "tel" | "url" => "textbox",
            _ => return None,
        },
        _ => return None,
    };
    Some(role.to_string())
}

/// Accessible name (simplified accname computation)
pub fn accessible_name(doc: &Html, el: &ElementRef<'_>) -> String {
    let v = el.value();
    if let Some(label) = v.attr("aria-label").map(normalize_ws).filter(|s| !s.is_empty()) {
        return label;
    }
    if let Some(ids) = v.attr("aria-labelledby") {
        let text = ids
            .split_whitespace()
            .filter_map(|id| element_by_id(doc, id))
            .map(|e| element_text(&e))
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            return text;
        }
    }

    match v.name() {
        "input" | "textarea" | "select" => {
            let input_type = v.attr("type").unwrap_or("text").to_lowercase();
            if v.name() == "input" && matches!(input_type.as_str(), "submit" | "reset" | "button") {
                let default = match input_type.as_str() {
                    "submit" => "Submit",
                    "reset" => "Reset",
                    _ => "",
                };
                return normalize_ws(v.attr("value").unwrap_or(default));
            }
            if v.name() == "input" && input_type == "image" {
                return normalize_ws(v.attr("alt").unwrap_or("Submit"));
            }
            if let Some(text) = labels_for(doc, el).into_iter().next() {
                return text;
            }
        }
        "img" => {
            if let Some(alt) = v.attr("alt") {
                return normalize_ws(alt);
            }
        }
        _ => {
            let text = element_text(el);
            if !text.is_empty() {
                return text;
            }
        }
    }

    v.attr("title").map(normalize_ws).unwrap_or_default()
}

fn element_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.select(&all_elements()).find(|e| e.value().id() == Some(id))
}

fn is_labelable(el: &ElementRef<'_>) -> bool {
    matches!(
        el.value().name(),
        "input" | "textarea" | "select" | "button" | "meter" | "output" | "progress"
    )
}

/// Texts of `<label>` elements associated with `el`
fn labels_for(doc: &Html, el: &ElementRef<'_>) -> Vec<String> {
    let mut texts = Vec::new();
    if let Some(id) = el.value().id() {
        let sel = Selector::parse("label").expect("label selector parses");
        for label in doc.select(&sel) {
            if label.value().attr("for") == Some(id) {
                texts.push(element_text(&label));
            }
        }
    }
    if let Some(wrapping) = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "label" && a.value().attr("for").is_none())
    {
        texts.push(element_text(&wrapping));
    }
    texts
}

/// Control a `<label>` points at
fn labelled_control<'a>(doc: &'a Html, label: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    match label.value().attr("for") {
        Some(id) => element_by_id(doc, id).filter(is_labelable),
        None => label
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| is_labelable(e)),
    }
}

/// A parsed page
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Contents of `<title>`, whitespace-normalized
    pub fn title(&self) -> String {
        let sel = Selector::parse("title").expect("title selector parses");
        self.html
            .select(&sel)
            .next()
            .map(|t| element_text(&t))
            .unwrap_or_default()
    }

    /// All elements matching `locator`, in document order
    pub fn query(&self, locator: &Locator) -> E2eResult<Vec<ElementRef<'_>>> {
        let doc = &self.html;
        let found: Vec<ElementRef<'_>> = match locator {
            Locator::Css { css } => doc.select(&selector(css)?).collect(),

            Locator::Label { label } => {
                let mut matches = Vec::new();
                let label_sel = Selector::parse("label").expect("label selector parses");
                for l in doc.select(&label_sel) {
                    if contains_ci(&element_text(&l), label) {
                        if let Some(control) = labelled_control(doc, &l) {
                            matches.push(control);
                        }
                    }
                }
                for e in doc.select(&all_elements()) {
                    if let Some(aria) = e.value().attr("aria-label") {
                        if contains_ci(aria, label) {
                            matches.push(e);
                        }
                    }
                }
                matches
            }

            Locator::Role { role, name } => doc
                .select(&all_elements())
                .filter(|e| role_of(e).as_deref() == Some(role.to_lowercase().as_str()))
                .filter(is_visible)
                .filter(|e| match name {
                    Some(n) => contains_ci(&accessible_name(doc, e), n),
                    None => true,
                })
                .collect(),

            Locator::Text { text } => {
                let body_sel = Selector::parse("body").expect("body selector parses");
                doc.select(&body_sel)
                    .flat_map(|body| body.descendants().filter_map(ElementRef::wrap))
                    .filter(|e| !NON_RENDERED.contains(&e.value().name()))
                    .filter(|e| contains_ci(&element_text(e), text))
                    .filter(|e| {
                        !e.children()
                            .filter_map(ElementRef::wrap)
                            .any(|c| contains_ci(&element_text(&c), text))
                    })
                    .collect()
            }
        };

        Ok(dedupe(found))
    }

    /// Exactly one element matching `locator`
    pub fn query_one(&self, locator: &Locator) -> E2eResult<Option<ElementRef<'_>>> {
        let mut found = self.query(locator)?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => Err(E2eError::StrictMode {
                locator: locator.to_string(),
                count,
            }),
        }
    }

    /// Position of the form owning `el`, counted in document order
    pub fn form_index(&self, el: &ElementRef<'_>) -> Option<usize> {
        let form = owning_form(el)?;
        let sel = Selector::parse("form").expect("form selector parses");
        self.html.select(&sel).position(|f| f.id() == form.id())
    }

    /// What clicking `el` does
    pub fn click_action(&self, el: &ElementRef<'_>) -> ClickAction {
        let v = el.value();
        if v.name() == "a" {
            if let Some(href) = v.attr("href") {
                return ClickAction::Follow(href.to_string());
            }
        }
        if is_submitter(el) {
            if let Some(form) = owning_form(el) {
                return ClickAction::Submit(self.submission(&form, Some(el)));
            }
        }
        ClickAction::None
    }

    /// Build the default submission for `form`, as submitted by `submitter`
    fn submission(&self, form: &ElementRef<'_>, submitter: Option<&ElementRef<'_>>) -> FormSubmission {
        let v = form.value();
        let method = submitter
            .and_then(|s| s.value().attr("formmethod"))
            .or_else(|| v.attr("method"))
            .unwrap_or("get")
            .to_lowercase();
        let action = submitter
            .and_then(|s| s.value().attr("formaction"))
            .or_else(|| v.attr("action"))
            .unwrap_or("")
            .to_string();

        let mut fields = Vec::new();
        for e in form.descendants().filter_map(ElementRef::wrap) {
            let ev = e.value();
            let Some(name) = ev.attr("name") else { continue };
            if ev.attr("disabled").is_some() {
                continue;
            }
            match ev.name() {
                "input" => {
                    let t = ev.attr("type").unwrap_or("text").to_lowercase();
                    match t.as_str() {
                        "submit" | "button" | "reset" | "image" | "file" => {}
                        "checkbox" | "radio" => {
                            if ev.attr("checked").is_some() {
                                fields.push((name.to_string(), ev.attr("value").unwrap_or("on").to_string()));
                            }
                        }
                        _ => fields.push((name.to_string(), ev.attr("value").unwrap_or("").to_string())),
                    }
                }
                "textarea" => fields.push((name.to_string(), e.text().collect())),
                "select" => {
                    let options: Vec<ElementRef<'_>> = e
                        .descendants()
                        .filter_map(ElementRef::wrap)
                        .filter(|o| o.value().name() == "option")
                        .collect();
                    let chosen = options
                        .iter()
                        .find(|o| o.value().attr("selected").is_some())
                        .or_else(|| options.first());
                    if let Some(o) = chosen {
                        let value = o
                            .value()
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| element_text(o));
                        fields.push((name.to_string(), value));
                    }
                }
                _ => {}
            }
        }

        if let Some(s) = submitter {
            if let Some(name) = s.value().attr("name") {
                fields.push((name.to_string(), s.value().attr("value").unwrap_or("").to_string()));
            }
        }

        FormSubmission {
            form_index: self.form_index(form).unwrap_or(0),
            method,
            action,
            fields,
        }
    }
}

/// What a click resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Follow a link
    Follow(String),
    /// Submit a form
    Submit(FormSubmission),
    /// Nothing observable without scripts
    None,
}

/// A form about to be submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub form_index: usize,
    /// Lowercased method, `get` when absent
    pub method: String,
    /// Raw action attribute; empty means the current URL
    pub action: String,
    /// Default field values in document order
    pub fields: Vec<(String, String)>,
}

fn owning_form<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "form")
}

fn is_submitter(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    let t = v.attr("type").map(str::to_lowercase);
    match v.name() {
        "button" => matches!(t.as_deref(), None | Some("submit")),
        "input" => matches!(t.as_deref(), Some("submit") | Some("image")),
        _ => false,
    }
}

/// Whether `el` accepts typed text
pub fn is_fillable(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    match v.name() {
        "textarea" => true,
        "input" => !matches!(
            v.attr("type").map(str::to_lowercase).as_deref(),
            Some("submit" | "button" | "reset" | "image" | "checkbox" | "radio" | "file" | "hidden")
        ),
        _ => v.attr("contenteditable").is_some(),
    }
}

fn dedupe(elements: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let mut seen = HashSet::new();
    elements.into_iter().filter(|e| seen.insert(e.id())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const LOGIN: &str = r#"<!DOCTYPE html>
<html><head><title>  Вход | Demo </title></head>
<body>
  <form method="post" action="/login" novalidate>
    <label for="email">Email</label>
    <input id="email" name="email" type="text">
    <label>Пароль <input name="password" type="password"></label>
    <input type="hidden" name="csrf" value="t0k">
    <button type="submit">Войти</button>
  </form>
  <div role="alert">Email обязателен</div>
  <p hidden>Скрыто</p>
  <h1>Добро   пожаловать</h1>
  <a href="/dashboard.html">Панель</a>
</body></html>"#;

    fn label(s: &str) -> Locator {
        Locator::Label { label: s.to_string() }
    }

    fn role(r: &str, name: Option<&str>) -> Locator {
        Locator::Role {
            role: r.to_string(),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_title_is_normalized() {
        assert_eq!(Document::parse(LOGIN).title(), "Вход | Demo");
    }

    #[test_case("Email", "email" ; "label for")]
    #[test_case("email", "email" ; "case insensitive")]
    #[test_case("Пароль", "password" ; "wrapping label")]
    fn test_label_resolves_control(text: &str, name: &str) {
        let doc = Document::parse(LOGIN);
        let el = doc.query_one(&label(text)).unwrap().unwrap();
        assert_eq!(el.value().attr("name"), Some(name));
        assert!(is_fillable(&el));
    }

    #[test]
    fn test_role_button_by_name() {
        let doc = Document::parse(LOGIN);
        let el = doc.query_one(&role("button", Some("Войти"))).unwrap().unwrap();
        assert_eq!(el.value().name(), "button");
        assert!(doc.query_one(&role("button", Some("Отмена"))).unwrap().is_none());
    }

    #[test]
    fn test_alert_text() {
        let doc = Document::parse(LOGIN);
        let el = doc.query_one(&role("alert", None)).unwrap().unwrap();
        assert_eq!(element_text(&el), "Email обязателен");
    }

    #[test]
    fn test_text_locator_picks_deepest_match() {
        let doc = Document::parse(LOGIN);
        let el = doc
            .query_one(&Locator::Text { text: "Добро пожаловать".to_string() })
            .unwrap()
            .unwrap();
        assert_eq!(el.value().name(), "h1");
        assert!(is_visible(&el));
    }

    #[test]
    fn test_hidden_elements() {
        let doc = Document::parse(LOGIN);
        let el = doc
            .query_one(&Locator::Text { text: "Скрыто".to_string() })
            .unwrap()
            .unwrap();
        assert!(!is_visible(&el));
    }

    #[test]
    fn test_strict_mode() {
        let html = r#"<html><body><div role="alert">a</div><div role="alert">b</div></body></html>"#;
        let doc = Document::parse(html);
        assert!(matches!(
            doc.query_one(&role("alert", None)),
            Err(E2eError::StrictMode { count: 2, .. })
        ));
    }

    #[test]
    fn test_submit_collects_defaults() {
        let doc = Document::parse(LOGIN);
        let button = doc.query_one(&role("button", Some("Войти"))).unwrap().unwrap();
        match doc.click_action(&button) {
            ClickAction::Submit(sub) => {
                assert_eq!(sub.form_index, 0);
                assert_eq!(sub.method, "post");
                assert_eq!(sub.action, "/login");
                assert_eq!(
                    sub.fields,
                    vec![
                        ("email".to_string(), String::new()),
                        ("password".to_string(), String::new()),
                        ("csrf".to_string(), "t0k".to_string()),
                    ]
                );
            }
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn test_link_click_follows() {
        let doc = Document::parse(LOGIN);
        let link = doc.query_one(&role("link", Some("Панель"))).unwrap().unwrap();
        assert_eq!(
            doc.click_action(&link),
            ClickAction::Follow("/dashboard.html".to_string())
        );
    }

    #[test]
    fn test_css_locator() {
        let doc = Document::parse(LOGIN);
        let found = doc.query(&Locator::Css { css: "input".to_string() }).unwrap();
        assert_eq!(found.len(), 3);
        assert!(doc.query(&Locator::Css { css: "[[".to_string() }).is_err());
    }
}
