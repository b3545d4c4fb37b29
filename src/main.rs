use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use covcomment::changed_files::{resolve_changed_files, ChangedFilesSource};
use covcomment::comment::{check_length, post_action, render_sections, watermark, PostAction};
use covcomment::config::Config;
use covcomment::git::GitChanges;
use covcomment::github::{CommentOutcome, GithubClient, GithubContext};
use covcomment::outputs::build_outputs;
use covcomment::{collect_reports, logging, ParsedReports};

const CONFIG_FILE: &str = "covcomment.toml";

#[derive(Parser)]
#[command(name = "covcomment")]
#[command(about = "Coverage and test result comments for pull requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file (default: covcomment.toml when present)
    #[arg(short, long, global = true, env = "INPUT_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse reports, export values and post the comment (default)
    Comment,

    /// Write the comment body without posting
    Render {
        /// Output path (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump the parsed reports as JSON
    Parse {
        #[arg(long)]
        pretty: bool,
    },
}

/// Options that override the config file. Each can come from the matching
/// GitHub Actions `INPUT_*` variable.
#[derive(Args, Debug, Default)]
struct ReportArgs {
    #[arg(long, global = true, env = "INPUT_TITLE")]
    title: Option<String>,

    #[arg(long, global = true, env = "INPUT_BADGE_TITLE")]
    badge_title: Option<String>,

    #[arg(long, global = true, env = "INPUT_HIDE_BADGE")]
    hide_badge: Option<bool>,

    #[arg(long, global = true, env = "INPUT_HIDE_REPORT")]
    hide_report: Option<bool>,

    #[arg(long, global = true, env = "INPUT_HIDE_COMMENT")]
    hide_comment: Option<bool>,

    #[arg(long, global = true, env = "INPUT_CREATE_NEW_COMMENT")]
    create_new_comment: Option<bool>,

    #[arg(long, global = true, env = "INPUT_UNIQUE_ID_FOR_COMMENT")]
    unique_id: Option<String>,

    #[arg(long, global = true, env = "INPUT_ISSUE_NUMBER")]
    issue_number: Option<u64>,

    #[arg(long, global = true, env = "INPUT_COVERAGE_FILE")]
    coverage_file: Option<String>,

    #[arg(long, global = true, env = "INPUT_COVERAGE_XML_FILE")]
    coverage_xml_file: Option<String>,

    #[arg(long, global = true, env = "INPUT_LAST_RUN_FILE")]
    last_run_file: Option<String>,

    #[arg(long, global = true, env = "INPUT_TEST_RESULTS_PATH")]
    test_results_path: Option<String>,

    #[arg(long, global = true, env = "INPUT_INCLUDE_FILE_DETAILS")]
    include_file_details: Option<bool>,

    #[arg(long, global = true, env = "INPUT_MAX_FILES_TO_SHOW")]
    max_files_to_show: Option<usize>,

    #[arg(long, global = true, env = "INPUT_INCLUDE_CATEGORY_SUMMARY")]
    include_category_summary: Option<bool>,

    #[arg(long, global = true, env = "INPUT_INCLUDE_LAST_RUN")]
    include_last_run: Option<bool>,

    #[arg(long, global = true, env = "INPUT_LAST_RUN_TITLE")]
    last_run_title: Option<String>,

    #[arg(long, global = true, env = "INPUT_TEST_RESULTS_TITLE")]
    test_results_title: Option<String>,

    #[arg(long, global = true, env = "INPUT_REPORT_ONLY_CHANGED_FILES")]
    report_only_changed_files: Option<bool>,

    #[arg(long, global = true, env = "INPUT_INCLUDE_CHANGED_FILES_DETAILS")]
    include_changed_files_details: Option<bool>,

    /// Comma separated, e.g. `rb,rake`; empty keeps every file
    #[arg(long, global = true, env = "INPUT_CHANGED_FILES_EXTENSIONS")]
    changed_files_extensions: Option<String>,

    /// Compute changed files with git instead of the pull request API
    #[arg(long, global = true)]
    changed_since: Option<String>,

    /// One `title, coverage_path[, test_results_path]` entry per line
    #[arg(long, global = true, env = "INPUT_MULTIPLE_FILES")]
    multiple_files: Option<String>,

    #[arg(long, global = true, env = "INPUT_STRIP_PREFIX")]
    strip_prefix: Option<String>,

    #[arg(long, global = true, env = "INPUT_PATH_PREFIX")]
    path_prefix: Option<String>,

    #[arg(long, global = true, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

impl ReportArgs {
    fn apply(&self, config: &mut Config) {
        let report = &mut config.report;
        set(&mut report.title, &self.title);
        set(&mut report.badge_title, &self.badge_title);
        set(&mut report.hide_badge, &self.hide_badge);
        set(&mut report.hide_report, &self.hide_report);
        set(&mut report.include_file_details, &self.include_file_details);
        set(&mut report.max_files_to_show, &self.max_files_to_show);
        set(&mut report.include_category_summary, &self.include_category_summary);
        set(&mut report.include_last_run, &self.include_last_run);
        set(&mut report.last_run_title, &self.last_run_title);
        set(&mut report.test_results_title, &self.test_results_title);
        set(&mut report.report_only_changed_files, &self.report_only_changed_files);
        set(&mut report.include_changed_files_details, &self.include_changed_files_details);
        set(&mut report.strip_prefix, &self.strip_prefix);
        set(&mut report.path_prefix, &self.path_prefix);
        if let Some(ref extensions) = self.changed_files_extensions {
            report.changed_files_extensions = split_list(extensions, ',');
        }

        let sources = &mut config.sources;
        if self.coverage_file.is_some() {
            sources.coverage_file = self.coverage_file.clone();
        }
        if self.coverage_xml_file.is_some() {
            sources.coverage_xml_file = self.coverage_xml_file.clone();
        }
        if self.last_run_file.is_some() {
            sources.last_run_file = self.last_run_file.clone();
        }
        if self.test_results_path.is_some() {
            sources.test_results_file = self.test_results_path.clone();
        }
        if let Some(ref lines) = self.multiple_files {
            sources.multiple_files = split_list(lines, '\n');
        }

        let comment = &mut config.comment;
        set(&mut comment.hide_comment, &self.hide_comment);
        set(&mut comment.create_new_comment, &self.create_new_comment);
        if self.unique_id.is_some() {
            comment.unique_id = self.unique_id.clone();
        }
        if self.issue_number.is_some() {
            comment.issue_number = self.issue_number;
        }

        if self.github_token.is_some() {
            config.github.token = self.github_token.clone();
        }
    }
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref(), &cli.report)?;
    let changed_since = cli.report.changed_since.clone();

    match cli.command.unwrap_or(Commands::Comment) {
        Commands::Comment => cmd_comment(&config, changed_since.as_deref()),
        Commands::Render { output } => cmd_render(&config, changed_since.as_deref(), output.as_deref()),
        Commands::Parse { pretty } => cmd_parse(&config, pretty),
    }
}

/// Config file first, then CLI/env overrides
fn load_config(path: Option<&Path>, args: &ReportArgs) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path).with_context(|| format!("Could not load {}", path.display()))?,
        None if Path::new(CONFIG_FILE).exists() => Config::load(Path::new(CONFIG_FILE))?,
        None => Config::default(),
    };

    args.apply(&mut config);
    config.validate()?;

    tracing::debug!("Configuration: {:?}", redacted(&config));
    Ok(config)
}

fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.github.token.is_some() {
        config.github.token = Some("[SET]".to_string());
    }
    config
}

fn collect(config: &Config) -> ParsedReports {
    let reports = collect_reports(&config.sources.report_sources(), &config.collect_options());
    if reports.is_empty() {
        tracing::warn!("No coverage or test result reports found");
    }
    reports
}

fn git_changed_files(since: &str) -> Result<Vec<String>> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    GitChanges::open(&cwd)?.changed_since(since)
}

fn cmd_parse(config: &Config, pretty: bool) -> Result<()> {
    let reports = collect(config);
    let json = reports.to_json();

    let text = if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{}", text);

    Ok(())
}

fn cmd_render(config: &Config, changed_since: Option<&str>, output: Option<&Path>) -> Result<()> {
    let context = GithubContext::from_env();
    let reports = collect(config);

    let source = ChangedFilesSource::select(config.report.wants_changed_files(), changed_since, false, None);
    let changed = match source {
        ChangedFilesSource::Git(since) => {
            resolve_changed_files(git_changed_files(&since), &config.report.changed_files_extensions)
        }
        _ => None,
    };

    let links = context.source_links(&config.report.path_prefix);
    let sections = render_sections(&reports, config, changed.as_deref(), &links);
    let body = sections.body(&watermark(&context.job, config.comment.unique_id.as_deref()));

    match output {
        Some(path) => {
            std::fs::write(path, &body).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Comment written to {}", "✓".green(), path.display().to_string().cyan());
        }
        None => println!("{}", body),
    }

    Ok(())
}

#[tokio::main]
async fn cmd_comment(config: &Config, changed_since: Option<&str>) -> Result<()> {
    let context = GithubContext::from_env();
    let event = if context.event_name.is_empty() { "[NOT SET]" } else { context.event_name.as_str() };
    tracing::info!("Event: {}", event);

    let reports = collect(config);
    let number = context.target_number(config.comment.issue_number);

    let token = config
        .github
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|t| !t.is_empty());
    let api_url = config.github.api_url.as_deref().unwrap_or(&context.api_url);
    let client = || -> Result<GithubClient> {
        let token = token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GitHub token not found (set GITHUB_TOKEN or --github-token)"))?;
        GithubClient::new(token, api_url, &context.repository)
    };

    let extensions = &config.report.changed_files_extensions;
    let source = ChangedFilesSource::select(
        config.report.wants_changed_files(),
        changed_since,
        context.is_pull_request(),
        number,
    );
    let changed = match source {
        ChangedFilesSource::Disabled => None,
        ChangedFilesSource::Unavailable => {
            tracing::info!("Not a pull request, reporting all files");
            None
        }
        ChangedFilesSource::Git(since) => resolve_changed_files(git_changed_files(&since), extensions),
        ChangedFilesSource::PullRequest(number) => {
            let fetched = match client() {
                Ok(client) => client.list_pull_files(number).await,
                Err(e) => Err(e),
            };
            resolve_changed_files(fetched, extensions)
        }
    };

    let links = context.source_links(&config.report.path_prefix);
    let sections = render_sections(&reports, config, changed.as_deref(), &links);

    if let Err(e) = build_outputs(&reports, &sections, &config.report, changed.as_deref()).export() {
        tracing::error!("Failed to export outputs: {:#}", e);
    }
    check_length(&sections, &context.event_name);

    let watermark = watermark(&context.job, config.comment.unique_id.as_deref());
    let body = sections.body(&watermark);

    match post_action(&config.comment, number) {
        PostAction::Hidden => tracing::info!("Comment hidden, not posting"),
        PostAction::NoTarget => {
            tracing::error!("No issue number found. Provide --issue-number or run on a pull request.")
        }
        PostAction::Create(number) => {
            tracing::info!("Creating new comment");
            client()?.create_comment(number, &body).await?;
            println!("{} Comment created on #{}", "✓".green(), number);
        }
        PostAction::Upsert(number) => match client()?.upsert_comment(number, &body, &watermark).await? {
            CommentOutcome::Created => println!("{} Comment created on #{}", "✓".green(), number),
            CommentOutcome::Updated(id) => {
                println!("{} Comment {} updated on #{}", "✓".green(), id, number)
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "covcomment",
            "render",
            "--title",
            "API coverage",
            "--hide-badge",
            "true",
            "--changed-files-extensions",
            "rb, rake",
            "--multiple-files",
            "API, a.json\nWeb, w.json",
            "--issue-number",
            "12",
        ]);

        let mut config = Config::default();
        config.report.max_files_to_show = 10;
        cli.report.apply(&mut config);

        assert_eq!(config.report.title, "API coverage");
        assert!(config.report.hide_badge);
        assert_eq!(config.report.max_files_to_show, 10);
        assert_eq!(config.report.changed_files_extensions, vec!["rb", "rake"]);
        assert_eq!(config.sources.multiple_files.len(), 2);
        assert_eq!(config.comment.issue_number, Some(12));
        assert!(matches!(cli.command, Some(Commands::Render { output: None })));
    }

    #[test]
    fn test_malformed_multiple_files_line_loads() {
        let cli = Cli::parse_from([
            "covcomment",
            "render",
            "--multiple-files",
            "API, coverage/coverage.json\nbroken-line",
        ]);

        let config = load_config(None, &cli.report).unwrap();
        assert_eq!(config.sources.multiple_files.len(), 2);
    }

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["covcomment", "--verbose"]);
        assert!(cli.command.is_none());
        assert!(cli.verbose);
    }

    #[test]
    fn test_redacted_token() {
        let mut config = Config::default();
        config.github.token = Some("secret".into());
        assert_eq!(redacted(&config).github.token.as_deref(), Some("[SET]"));
    }
}
