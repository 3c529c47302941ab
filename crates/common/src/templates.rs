//! Test case templates
//!
//! Each template turns a small parameter map into a [`TestCase`]. The `type`
//! parameter selects the scenario; every other parameter has a default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::testcase::TestCase;

/// Parameters passed to a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateParams(Map<String, Value>);

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Parse `key=value`. The value is read as JSON when it parses, else as a string.
    pub fn insert_pair(&mut self, pair: &str) -> Result<()> {
        let (key, raw) = pair.split_once('=').ok_or_else(|| Error::InvalidParam {
            name: pair.to_string(),
            reason: "expected key=value".to_string(),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidParam {
                name: pair.to_string(),
                reason: "empty key".to_string(),
            });
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    /// Scenario selector
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    fn text(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    fn number(&self, key: &str, default: u64) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    fn fields(&self) -> Result<Vec<FormField>> {
        match self.0.get("fields") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| Error::InvalidParam {
                name: "fields".to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FormField {
    #[serde(default = "default_field_name")]
    name: String,
    #[serde(default = "default_field_value")]
    value: String,
    #[serde(default)]
    required: bool,
}

fn default_field_name() -> String {
    "поле".to_string()
}

fn default_field_value() -> String {
    "тестовое значение".to_string()
}

/// A generator of test cases for one feature area
pub trait TestTemplate: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> &'static str;
    fn generate_test_case(&self, params: &TemplateParams) -> Result<TestCase>;
}

/// Listing entry for a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub name: String,
    pub description: String,
    pub category: String,
}

/// Login, logout and validation
pub struct AuthTemplate;

impl TestTemplate for AuthTemplate {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn description(&self) -> &'static str {
        "Тестирование авторизации: логин, логаут, валидация"
    }

    fn category(&self) -> &'static str {
        "security"
    }

    fn generate_test_case(&self, params: &TemplateParams) -> Result<TestCase> {
        let login_url = params.text("login_url", "/login");
        let email = params.text("email", crate::login::DEMO_EMAIL);
        let password = params.text("password", crate::login::DEMO_PASSWORD);
        let success_url = params.text("success_url", "/dashboard");

        let case = match params.kind() {
            Some("positive") => TestCase::new(
                "Успешная авторизация с валидными данными",
                vec![
                    format!("Открыть страницу {}", login_url),
                    format!("Ввести email: {}", email),
                    format!("Ввести пароль: {}", password),
                    "Нажать кнопку 'Войти' или 'Login'".to_string(),
                ],
                format!(
                    "Редирект на {}, отображается приветственное сообщение или имя пользователя",
                    success_url
                ),
            ),
            Some("negative_password") => TestCase::new(
                "Попытка входа с неверным паролем",
                vec![
                    format!("Открыть страницу {}", login_url),
                    format!("Ввести email: {}", email),
                    "Ввести пароль: wrongpassword".to_string(),
                    "Нажать кнопку 'Войти'".to_string(),
                ],
                "Отображается ошибка 'Неверные учетные данные' или 'Invalid credentials', пользователь остается на странице логина",
            ),
            Some("negative_validation") => TestCase::new(
                "Попытка входа с пустыми полями",
                vec![
                    format!("Открыть страницу {}", login_url),
                    "Оставить поля email и пароль пустыми".to_string(),
                    "Нажать кнопку 'Войти'".to_string(),
                ],
                "Отображается сообщение валидации 'Email обязателен'",
            ),
            _ => TestCase::new(
                "Попытка входа с неверным форматом email",
                vec![
                    format!("Открыть страницу {}", login_url),
                    "Ввести email: invalid-email".to_string(),
                    format!("Ввести пароль: {}", password),
                    "Нажать кнопку 'Войти'".to_string(),
                ],
                "Отображается ошибка валидации 'Неверный формат email' или 'Invalid email format'",
            ),
        };
        Ok(case)
    }
}

/// Filling, validating and submitting forms
pub struct FormTemplate;

impl TestTemplate for FormTemplate {
    fn name(&self) -> &'static str {
        "form"
    }

    fn description(&self) -> &'static str {
        "Тестирование форм: заполнение, валидация, отправка"
    }

    fn category(&self) -> &'static str {
        "forms"
    }

    fn generate_test_case(&self, params: &TemplateParams) -> Result<TestCase> {
        let form_url = params.text("form_url", "/form");
        let submit_button = params.text("submit_button", "Отправить");
        let fields = params.fields()?;

        let mut steps = vec![format!("Открыть страницу {}", form_url)];

        if params.kind() == Some("positive") {
            for field in &fields {
                steps.push(format!("Заполнить поле '{}': {}", field.name, field.value));
            }
            steps.push(format!("Нажать кнопку '{}'", submit_button));
            return Ok(TestCase::new(
                "Успешная отправка формы",
                steps,
                "Форма успешно отправлена, отображается сообщение об успехе или редирект",
            ));
        }

        let first_required = fields.iter().find(|f| f.required).map(|f| f.name.as_str());
        if let Some(name) = first_required {
            steps.push(format!("Оставить поле '{}' пустым", name));
        }
        steps.push(format!("Нажать кнопку '{}'", submit_button));

        Ok(TestCase::new(
            "Валидация обязательных полей формы",
            steps,
            format!(
                "Отображается сообщение валидации для обязательного поля '{}'",
                first_required.unwrap_or("поле")
            ),
        ))
    }
}

/// Lists and tables
pub struct ListTemplate;

impl TestTemplate for ListTemplate {
    fn name(&self) -> &'static str {
        "list"
    }

    fn description(&self) -> &'static str {
        "Тестирование списков: отображение, фильтрация, сортировка, пагинация"
    }

    fn category(&self) -> &'static str {
        "data"
    }

    fn generate_test_case(&self, params: &TemplateParams) -> Result<TestCase> {
        let list_url = params.text("list_url", "/list");
        let open = format!("Открыть страницу {}", list_url);

        let case = match params.kind() {
            Some("display") => TestCase::new(
                "Отображение списка элементов",
                vec![open, "Дождаться загрузки списка".to_string()],
                format!(
                    "Отображается список из {} элементов, каждый элемент содержит необходимые данные",
                    params.number("item_count", 10)
                ),
            ),
            Some("filter") => {
                let filter_value = params.text("filter_value", "test");
                TestCase::new(
                    "Фильтрация списка",
                    vec![
                        open,
                        format!("Ввести в поле фильтра: {}", filter_value),
                        "Нажать кнопку 'Фильтровать' или дождаться автоматической фильтрации"
                            .to_string(),
                    ],
                    format!(
                        "Список отфильтрован, отображаются только элементы, соответствующие '{}'",
                        filter_value
                    ),
                )
            }
            Some("pagination") => TestCase::new(
                "Пагинация списка",
                vec![
                    open,
                    "Прокрутить список до конца".to_string(),
                    "Нажать кнопку 'Следующая страница' или 'Next'".to_string(),
                ],
                "Загружается следующая страница списка, отображаются новые элементы",
            ),
            _ => TestCase::new(
                "Сортировка списка",
                vec![open, "Нажать на заголовок колонки для сортировки".to_string()],
                "Список отсортирован по выбранной колонке, элементы расположены в правильном порядке",
            ),
        };
        Ok(case)
    }
}

/// Create, read, update, delete
pub struct CrudTemplate;

impl TestTemplate for CrudTemplate {
    fn name(&self) -> &'static str {
        "crud"
    }

    fn description(&self) -> &'static str {
        "Тестирование CRUD: создание, чтение, обновление, удаление"
    }

    fn category(&self) -> &'static str {
        "data"
    }

    fn generate_test_case(&self, params: &TemplateParams) -> Result<TestCase> {
        let entity = params.text("entity_name", "элемент");
        let open = format!("Открыть страницу {}", params.text("base_url", "/items"));

        let case = match params.kind().unwrap_or("create") {
            "create" => TestCase::new(
                format!("Создание нового {}", entity),
                vec![
                    open,
                    "Нажать кнопку 'Создать' или 'Add'".to_string(),
                    "Заполнить форму создания".to_string(),
                    "Нажать кнопку 'Сохранить'".to_string(),
                ],
                format!("Новый {} успешно создан, отображается в списке", entity),
            ),
            "read" => TestCase::new(
                format!("Просмотр деталей {}", entity),
                vec![open, "Нажать на первый элемент в списке".to_string()],
                format!(
                    "Открывается страница с деталями {}, отображается вся необходимая информация",
                    entity
                ),
            ),
            "update" => TestCase::new(
                format!("Обновление {}", entity),
                vec![
                    open,
                    "Нажать на элемент в списке".to_string(),
                    "Нажать кнопку 'Редактировать' или 'Edit'".to_string(),
                    "Изменить данные".to_string(),
                    "Нажать кнопку 'Сохранить'".to_string(),
                ],
                format!("{} успешно обновлен, изменения отображаются в списке", entity),
            ),
            _ => TestCase::new(
                format!("Удаление {}", entity),
                vec![
                    open,
                    "Нажать кнопку 'Удалить' на элементе".to_string(),
                    "Подтвердить удаление в диалоге".to_string(),
                ],
                format!("{} успешно удален, больше не отображается в списке", entity),
            ),
        };
        Ok(case)
    }
}

static TEMPLATES: [&dyn TestTemplate; 4] = [&AuthTemplate, &FormTemplate, &ListTemplate, &CrudTemplate];

/// Look up a template by name
pub fn get_template(name: &str) -> Option<&'static dyn TestTemplate> {
    TEMPLATES.iter().copied().find(|t| t.name() == name)
}

/// Generate a case from a named template
pub fn generate(name: &str, params: &TemplateParams) -> Result<TestCase> {
    let template = get_template(name).ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
    template.generate_test_case(params)
}

/// All templates, in registry order
pub fn list_templates() -> Vec<TemplateInfo> {
    TEMPLATES
        .iter()
        .map(|t| TemplateInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            category: t.category().to_string(),
        })
        .collect()
}
