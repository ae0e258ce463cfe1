use crate::config::{CliConfig, Overrides};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use docflow_core::{ExecutionId, WorkflowId};
use docflow_sdk::{ConvertOptions, InputConfig, OcrOptions, PageOptions};
use std::path::PathBuf;

pub mod documents;
pub mod local;
pub mod remote;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a workflow definition and print its execution layers
    Validate {
        /// Path to the JSON definition
        definition: PathBuf,

        #[command(flatten)]
        tokens: TokenArgs,
    },

    /// Print a workflow definition as a dependency tree
    Visualize {
        /// Path to the JSON definition
        definition: PathBuf,

        #[command(flatten)]
        tokens: TokenArgs,
    },

    /// Create a workflow, execute it and wait for the result
    Run {
        /// Path to the JSON definition (built-in parse and extract workflow if omitted)
        #[arg(long)]
        definition: Option<PathBuf>,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        tokens: TokenArgs,

        #[command(flatten)]
        poll: PollArgs,

        /// Save the final execution state as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Show or wait for the status of an execution
    Status {
        #[arg(long)]
        execution_id: u64,

        /// Check once instead of polling
        #[arg(long, conflicts_with_all = ["max_polls", "poll_interval"])]
        single: bool,

        #[command(flatten)]
        poll: PollArgs,

        /// Save the execution state as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// List workflows
    List,

    /// Show one workflow
    Get {
        #[arg(long)]
        workflow_id: u64,
    },

    /// List the step types the service offers
    StepTypes,

    /// Convert one document to markdown, HTML, JSON or chunks
    Convert {
        /// Local file or http(s) URL
        document: String,

        #[command(flatten)]
        options: ConvertArgs,

        #[command(flatten)]
        poll: PollArgs,

        /// Save the output under this path; extensions follow the content
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Recognise the text of one document
    Ocr {
        /// Local file or http(s) URL
        document: String,

        #[command(flatten)]
        pages: PageArgs,

        #[command(flatten)]
        poll: PollArgs,

        /// Save the text and the full response under this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct TokenArgs {
    /// Replace a placeholder token in step settings (repeatable)
    #[arg(long = "replace", num_args = 2, value_names = ["TOKEN", "VALUE"])]
    pub replace: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct PollArgs {
    /// Maximum number of status checks
    #[arg(long)]
    pub max_polls: Option<u32>,

    /// Seconds between status checks
    #[arg(long)]
    pub poll_interval: Option<f64>,
}

#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// Document URL to process (repeatable)
    #[arg(long = "file-url", required_unless_present = "bucket")]
    pub file_urls: Vec<String>,

    /// Bucket to enumerate instead of explicit URLs
    #[arg(long)]
    pub bucket: Option<String>,

    #[arg(long, requires = "bucket")]
    pub prefix: Option<String>,

    /// Glob matched against object names, e.g. "*.pdf"
    #[arg(long, requires = "bucket")]
    pub pattern: Option<String>,

    /// `s3` or `r2`
    #[arg(long, requires = "bucket")]
    pub storage_type: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct PageArgs {
    /// Maximum number of pages to process
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Pages to process, e.g. "0-2" or "0,1,2"
    #[arg(long)]
    pub page_range: Option<String>,

    /// Skip the service's cache
    #[arg(long)]
    pub skip_cache: bool,
}

impl PageArgs {
    pub fn to_page_options(&self) -> PageOptions {
        PageOptions {
            max_pages: self.max_pages,
            page_range: self.page_range.clone(),
            skip_cache: self.skip_cache,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub pages: PageArgs,

    /// Output format
    #[arg(long = "format", default_value = "markdown", value_parser = ["markdown", "html", "json", "chunks"])]
    pub output_format: String,

    #[arg(long, default_value = "fast", value_parser = ["fast", "balanced", "accurate"])]
    pub mode: String,

    /// Force OCR on every page
    #[arg(long)]
    pub force_ocr: bool,

    /// Partially OCR lines for better formatting
    #[arg(long)]
    pub format_lines: bool,

    /// Add page delimiters to the output
    #[arg(long)]
    pub paginate: bool,

    /// Use an LLM to improve accuracy
    #[arg(long)]
    pub use_llm: bool,

    /// Remove existing OCR text and redo OCR
    #[arg(long)]
    pub strip_existing_ocr: bool,

    #[arg(long)]
    pub disable_image_extraction: bool,

    /// Custom prompt for block correction
    #[arg(long)]
    pub block_correction_prompt: Option<String>,

    /// JSON schema for structured extraction
    #[arg(long)]
    pub page_schema: Option<String>,
}

impl ConvertArgs {
    pub fn to_convert_options(&self) -> Result<ConvertOptions> {
        let page_schema = self
            .page_schema
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("--page-schema must be valid JSON")?;

        Ok(ConvertOptions {
            pages: self.pages.to_page_options(),
            force_ocr: self.force_ocr,
            format_lines: self.format_lines,
            paginate: self.paginate,
            use_llm: self.use_llm,
            strip_existing_ocr: self.strip_existing_ocr,
            disable_image_extraction: self.disable_image_extraction,
            block_correction_prompt: self.block_correction_prompt.clone(),
            additional_config: None,
            page_schema,
            output_format: self.output_format.clone(),
            mode: self.mode.clone(),
        })
    }
}

impl InputArgs {
    pub fn to_input_config(&self) -> InputConfig {
        InputConfig {
            file_urls: self.file_urls.clone(),
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            pattern: self.pattern.clone(),
            storage_type: self.storage_type.clone(),
        }
    }
}

/// Run a command with the loaded configuration.
pub async fn dispatch(command: Command, mut config: CliConfig, overrides: Overrides) -> Result<()> {
    let poll_overrides = |poll: &PollArgs| Overrides {
        max_polls: poll.max_polls,
        poll_interval: poll.poll_interval,
        ..overrides.clone()
    };

    match command {
        Command::Validate { definition, tokens } => local::validate(&definition, &tokens.replace),
        Command::Visualize { definition, tokens } => {
            local::visualize(&definition, &tokens.replace)
        }
        Command::Run {
            definition,
            input,
            tokens,
            poll,
            save,
        } => {
            config.apply(&poll_overrides(&poll));
            let replacements = local::parse_replacements(&tokens.replace)?;
            let definition = local::load_definition(definition.as_deref(), &replacements)?;
            let client = config.client()?;
            remote::run(
                &client,
                &definition,
                &input.to_input_config(),
                config.poll_config()?,
                save.as_deref(),
            )
            .await
            .map(|_| ())
        }
        Command::Status {
            execution_id,
            single,
            poll,
            save,
        } => {
            config.apply(&poll_overrides(&poll));
            let client = config.client()?;
            let poll = if single {
                None
            } else {
                Some(config.poll_config()?)
            };
            remote::status(&client, ExecutionId(execution_id), poll, save.as_deref())
                .await
                .map(|_| ())
        }
        Command::List => {
            config.apply(&overrides);
            remote::list(&config.client()?).await
        }
        Command::Get { workflow_id } => {
            config.apply(&overrides);
            remote::get(&config.client()?, WorkflowId(workflow_id)).await
        }
        Command::StepTypes => {
            config.apply(&overrides);
            remote::step_types(&config.client()?).await
        }
        Command::Convert {
            document,
            options,
            poll,
            save,
        } => {
            config.apply(&poll_overrides(&poll));
            let options = options.to_convert_options()?;
            let client = config.client()?;
            documents::convert(
                &client,
                &documents::source(&document),
                &options,
                config.poll_config()?,
                save.as_deref(),
            )
            .await
            .map(|_| ())
        }
        Command::Ocr {
            document,
            pages,
            poll,
            save,
        } => {
            config.apply(&poll_overrides(&poll));
            let options = OcrOptions {
                pages: pages.to_page_options(),
            };
            let client = config.client()?;
            documents::ocr(
                &client,
                &documents::source(&document),
                &options,
                config.poll_config()?,
                save.as_deref(),
            )
            .await
            .map(|_| ())
        }
    }
}
