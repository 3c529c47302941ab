//! Embedded HTML pages
//!
//! Submitted values are never echoed back. The configured title and the
//! request path are escaped before they reach the markup.

use formcheck_common::login::{
    LoginError, EMAIL_LABEL, PASSWORD_LABEL, SUBMIT_LABEL, WELCOME_TEXT,
};

fn render(page: String, title: &str) -> String {
    page.replace("{{STYLE}}", STYLE)
        .replace("{{TITLE}}", &escape(title))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            c => out.push(c),
        }
    }
    out
}

/// Landing page
pub fn landing(title: &str) -> String {
    render(LANDING_HTML.to_string(), title)
}

/// Login form posting back to `action`, with an optional single alert
pub fn login(title: &str, action: &str, error: Option<LoginError>) -> String {
    let alert = match error {
        Some(e) => format!(
            r#"<div class="alert" role="alert">{}</div>"#,
            e.message()
        ),
        None => String::new(),
    };

    let page = LOGIN_HTML
        .replace("{{EMAIL_LABEL}}", EMAIL_LABEL)
        .replace("{{PASSWORD_LABEL}}", PASSWORD_LABEL)
        .replace("{{SUBMIT_LABEL}}", SUBMIT_LABEL)
        .replace("{{ALERT}}", &alert)
        .replace("{{ACTION}}", &escape(action));
    render(page, title)
}

/// Dashboard shown after a successful login
pub fn dashboard(title: &str) -> String {
    render(DASHBOARD_HTML.replace("{{WELCOME}}", WELCOME_TEXT), title)
}

/// 404 page
pub fn not_found(title: &str) -> String {
    render(NOT_FOUND_HTML.to_string(), title)
}

const STYLE: &str = r#"
    <style>
        body { font-family: system-ui, sans-serif; margin: 0; background: #f4f5f7; }
        main { max-width: 360px; margin: 10vh auto; background: #fff; padding: 2rem; border-radius: 8px; }
        label { display: block; margin-top: 1rem; }
        input { width: 100%; padding: 0.5rem; box-sizing: border-box; }
        button { margin-top: 1.5rem; padding: 0.5rem 1.5rem; }
        .alert { margin-top: 1rem; padding: 0.75rem; background: #fdecea; color: #b3261e; border-radius: 4px; }
    </style>"#;

const LANDING_HTML: &str = r#"<!DOCTYPE html>
<html lang="ru">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{TITLE}}</title>{{STYLE}}
</head>
<body>
    <main>
        <h1>{{TITLE}}</h1>
        <p><a href="/login">Вход</a></p>
    </main>
</body>
</html>
"#;

// `novalidate` and plain text inputs keep the browser from blocking submits
// that the server is expected to reject.
const LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html lang="ru">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Вход | {{TITLE}}</title>{{STYLE}}
</head>
<body>
    <main>
        <h1>Вход</h1>
        <form method="post" action="{{ACTION}}" novalidate>
            <label for="email">{{EMAIL_LABEL}}</label>
            <input id="email" name="email" type="text" inputmode="email" autocomplete="username">
            <label for="password">{{PASSWORD_LABEL}}</label>
            <input id="password" name="password" type="password" autocomplete="current-password">
            <button type="submit">{{SUBMIT_LABEL}}</button>
        </form>
        {{ALERT}}
    </main>
</body>
</html>
"#;

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="ru">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Панель | {{TITLE}}</title>{{STYLE}}
</head>
<body>
    <main>
        <h1>{{WELCOME}}</h1>
        <p><a href="/login">Выйти</a></p>
    </main>
</body>
</html>
"#;

const NOT_FOUND_HTML: &str = r#"<!DOCTYPE html>
<html lang="ru">
<head>
    <meta charset="UTF-8">
    <title>404 | {{TITLE}}</title>{{STYLE}}
</head>
<body>
    <main><h1>Страница не найдена</h1></main>
</body>
</html>
"#;
