//! `formcheck codegen`: emit Playwright test files from the YAML specs

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use formcheck_common::LocalStorage;
use formcheck_e2e::codegen::{self, GeneratedFile, Lang};
use formcheck_e2e::{RunnerConfig, TestSpec};

use crate::output::{print_info, print_success};

#[derive(Args, Debug)]
pub struct CodegenArgs {
    /// Runner config file; defaults apply when it does not exist
    #[arg(short, long, default_value = "formcheck.toml")]
    pub config: PathBuf,

    /// Directory specs are loaded from, overriding the config
    #[arg(long)]
    pub test_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Lang::Ts)]
    pub lang: Lang,

    /// Output root; test files land in `<out>/e2e`
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

/// Files for every spec plus the config
pub fn generate(args: &CodegenArgs) -> Result<Vec<GeneratedFile>> {
    let config = RunnerConfig::load(&args.config)?;
    let test_dir = match &args.test_dir {
        Some(dir) => dir.clone(),
        None => config.test_dir(),
    };
    let specs = TestSpec::load_all(&test_dir)?;
    info!("Generating {} spec(s) from {}", specs.len(), test_dir.display());
    Ok(codegen::generate_all(&specs, &config, args.lang))
}

pub fn execute(args: CodegenArgs) -> Result<()> {
    let files = generate(&args)?;
    let storage = LocalStorage::new(&args.out)?;
    for file in &files {
        let path = storage.save_file(&file.path.to_string_lossy(), &file.content)?;
        print_info(&path.display().to_string());
    }
    print_success(&format!(
        "Generated {} file(s); run with `npx playwright test` from {}",
        files.len(),
        storage.root().display()
    ));
    Ok(())
}
