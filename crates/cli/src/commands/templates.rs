//! `formcheck templates`: list the test-case templates

use anyhow::Result;

use formcheck_common::templates::{self, TemplateInfo};

use crate::output::{print_list, OutputFormat, TableDisplay};

impl TableDisplay for TemplateInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Category", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.category.clone(),
            self.description.clone(),
        ]
    }
}

pub fn execute(format: OutputFormat) -> Result<()> {
    print_list(&templates::list_templates(), format)
}
