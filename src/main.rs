use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use vigil_core::{RepoId, ReviewRequest, TriggerPolicy, VigilConfig};
use vigil_review::github::GitHubClient;
use vigil_review::llm::LlmClient;
use vigil_review::pipeline::{PublishOutcome, ReviewPipeline};

#[derive(Parser)]
#[command(
    name = "vigil",
    version,
    about = "AI review for pull requests",
    long_about = "Vigil reviews pull requests with a language model.\n\n\
                   Materializes the repository, extracts the diff the pull request introduces\n\
                   against its merge base, asks an OpenAI-compatible model for a review,\n\
                   prints it, and posts it as a comment on the pull request.\n\n\
                   Examples:\n  \
                     vigil review --repo octo/widgets --pr 42   Review a pull request\n  \
                     vigil init                                 Create a .vigil.toml config file\n  \
                     vigil doctor                               Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .vigil.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull request and post the result as a comment
    #[command(long_about = "Review a pull request and post the result as a comment.\n\n\
        Fetches the repository into a scratch working copy, computes the diff the\n\
        pull request introduces against its merge base, sends it to the configured\n\
        model, and prints the review. The review is then posted as a comment on\n\
        the pull request; a failed comment is a warning, not an error, since the\n\
        review was already printed.\n\n\
        Examples:\n  vigil review --repo octo/widgets --pr 42\n  vigil review --repo octo/widgets --pr 42 --model gpt-4o-mini\n  vigil review --repo corp/app --pr 7 --base-domain github.corp.example")]
    Review {
        /// Repository to review (format: owner/name)
        #[arg(long)]
        repo: String,

        /// Pull request number
        #[arg(long)]
        pr: u64,

        /// GitHub access token (overrides config and GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// Model identifier (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// LLM API key (overrides config and the provider env var)
        #[arg(long)]
        api_key: Option<String>,

        /// Base URL of an OpenAI-compatible endpoint
        #[arg(
            long,
            long_help = "Base URL of an OpenAI-compatible endpoint.\n\nUse for self-hosted providers (Ollama, vLLM, LiteLLM). The client calls\n{base_url}/v1/chat/completions."
        )]
        base_url: Option<String>,

        /// GitHub host for Enterprise installs (default: github.com)
        #[arg(long)]
        base_domain: Option<String>,

        /// Scratch directory for the repository working copy
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Create a default .vigil.toml configuration file
    #[command(long_about = "Create a default .vigil.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .vigil.toml already exists.")]
    Init,
    /// Check your Vigil setup and environment
    #[command(long_about = "Check your Vigil setup and environment.\n\n\
        Runs diagnostics for the config file, LLM provider and API key,\n\
        GitHub token, and the repository working copy.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[33m⚡\x1b[0m \x1b[1mvigil\x1b[0m v{version} — AI review for pull requests\n");

        println!("Quick start:");
        println!("  \x1b[36mvigil init\x1b[0m                               Create a .vigil.toml config file");
        println!("  \x1b[36mvigil review --repo octo/widgets --pr 42\x1b[0m Review a pull request");
        println!("  \x1b[36mvigil doctor\x1b[0m                             Check setup and environment\n");

        println!("All commands:");
        println!("  \x1b[32mreview\x1b[0m    Fetch a PR diff, ask the model, post the review");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("vigil v{version} — AI review for pull requests\n");

        println!("Quick start:");
        println!("  vigil init                               Create a .vigil.toml config file");
        println!("  vigil review --repo octo/widgets --pr 42 Review a pull request");
        println!("  vigil doctor                             Check setup and environment\n");

        println!("All commands:");
        println!("  review    Fetch a PR diff, ask the model, post the review");
        println!("  doctor    Check your setup and environment");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'vigil <command> --help' for details.");
}

struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(config: &VigilConfig, use_color: bool) {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    if std::path::Path::new(".vigil.toml").exists() {
        checks.push(CheckResult::pass("config_file", ".vigil.toml found"));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            ".vigil.toml not found",
            "run 'vigil init' to create a default config",
        ));
    }

    // 2. LLM provider + API key
    let llm_env_var = config.llm.api_key_env();
    checks.push(CheckResult::pass(
        "llm_provider",
        format!("{} (model: {})", config.llm.provider, config.llm.model),
    ));
    if config.llm.resolve_api_key().is_some() {
        checks.push(CheckResult::pass(
            "llm_api_key",
            format!("{llm_env_var} set"),
        ));
    } else {
        checks.push(CheckResult::fail(
            "llm_api_key",
            format!("{llm_env_var} not set"),
            format!("export {llm_env_var}=... or set api_key in .vigil.toml"),
        ));
    }

    // 3. GitHub token + host
    if config.github.resolve_token().is_some() {
        checks.push(CheckResult::pass("github_token", "GITHUB_TOKEN set"));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "GITHUB_TOKEN not set",
            "export GITHUB_TOKEN=... (needed to fetch the repository and comment)",
        ));
    }
    checks.push(CheckResult::info(
        "github_host",
        format!("{} ({})", config.github.base_domain, config.github.api_base()),
    ));

    // 4. Working copy
    let repo_dir = config.review.repo_dir();
    if repo_dir.join(".git").exists() {
        checks.push(CheckResult::info(
            "working_copy",
            format!("materialized at {}", repo_dir.display()),
        ));
    } else {
        checks.push(CheckResult::info(
            "working_copy",
            "not yet materialized (first review will clone)",
        ));
    }

    let version = env!("CARGO_PKG_VERSION");
    println!("Vigil v{version} — Environment Check\n");

    for check in &checks {
        let sym = if use_color {
            check.colored_symbol()
        } else {
            check.symbol().to_string()
        };
        let label = check.name.replace('_', " ");
        println!("  {sym} {label:<20} {}", check.detail);
        if let Some(hint) = &check.hint {
            println!("    hint: {hint}");
        }
    }

    let passed = checks.iter().filter(|c| c.status == "pass").count();
    let failed = checks.iter().filter(|c| c.status == "fail").count();
    let info = checks.iter().filter(|c| c.status == "info").count();
    println!("\n{passed} checks passed, {failed} failed, {info} info");
}

const DEFAULT_CONFIG: &str = r#"# Vigil Configuration
# See: https://github.com/vigil-dev/vigil

[github]
# Personal access token; falls back to GITHUB_TOKEN / GH_TOKEN
# token = "ghp_..."
# GitHub Enterprise host (default: github.com)
# base_domain = "github.com"

[llm]
# provider = "openai"
# model = "gpt-4o"
# api_key = "sk-..."
# OpenAI-compatible endpoint for self-hosted providers
# base_url = "http://localhost:11434"
# request_timeout_secs = 120
# max_retries = 0

[review]
# Scratch directory for the repository working copy
# workdir = ".vigil"
# Diff bytes sent to the model before truncation kicks in
# max_diff_bytes = 50000
# Comment author identity; its own pull requests are not reviewed
# bot_login = "vigil-bot"
# Pull requests with this marker in the title are not reviewed
# skip_marker = "[no-review]"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => VigilConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = std::path::Path::new(".vigil.toml");
            if default_path.exists() {
                VigilConfig::from_file(default_path).into_diagnostic()?
            } else {
                VigilConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            Ok(())
        }
        Some(Command::Review {
            ref repo,
            pr,
            ref token,
            ref model,
            ref api_key,
            ref base_url,
            ref base_domain,
            ref workdir,
        }) => {
            let repo_id: RepoId = repo.parse().map_err(|e: String| {
                miette::miette!(
                    help = "Use the owner/name form, e.g. octo/widgets",
                    "invalid repository '{repo}': {e}"
                )
            })?;

            let mut config = config;
            if let Some(t) = token {
                config.github.token = Some(t.clone());
            }
            if let Some(d) = base_domain {
                config.github.base_domain = d.clone();
            }
            if let Some(m) = model {
                config.llm.model = m.clone();
            }
            if let Some(k) = api_key {
                config.llm.api_key = Some(k.clone());
            }
            if let Some(u) = base_url {
                config.llm.base_url = Some(u.clone());
            }
            if let Some(w) = workdir {
                config.review.workdir = w.clone();
            }

            // Credentials must exist before any client is built.
            let llm_env_var = config.llm.api_key_env();
            if config.llm.resolve_api_key().is_none() {
                miette::bail!(miette::miette!(
                    help = "Set {llm_env_var} or add api_key in your .vigil.toml under [llm]",
                    "No API key configured for LLM provider '{}'",
                    config.llm.provider
                ));
            }
            if config.github.resolve_token().is_none() {
                miette::bail!(miette::miette!(
                    help = "Set GITHUB_TOKEN or add token in your .vigil.toml under [github]",
                    "No GitHub token configured"
                ));
            }

            let github =
                GitHubClient::new(&config.github, config.review.repo_dir()).into_diagnostic()?;
            let llm = LlmClient::new(&config.llm).into_diagnostic()?;
            let pipeline = ReviewPipeline::new(github, llm, config.review.clone());

            let request = ReviewRequest {
                repo: repo_id.clone(),
                number: pr,
            };

            let pull = pipeline
                .resolve(&request)
                .await
                .into_diagnostic()
                .wrap_err(format!("resolving {repo_id}#{pr}"))?;

            let policy = TriggerPolicy::new(
                config.review.bot_login.clone(),
                config.review.skip_marker.clone(),
            );
            if let Some(reason) = policy.skip_reason(&pull) {
                eprintln!("Skipping review of {repo_id}#{pr}: {reason}");
                return Ok(());
            }

            let is_tty = std::io::stderr().is_terminal();
            let spinner = if is_tty {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .unwrap(),
                );
                pb.set_message(format!("Reviewing {repo_id}#{pr}..."));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let report = pipeline
                .run(&request, &pull)
                .await
                .inspect_err(|_e| {
                    if let Some(pb) = &spinner {
                        pb.finish_with_message("Failed");
                    }
                })
                .into_diagnostic()
                .wrap_err(format!("review of {repo_id}#{pr} failed"))?;

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            if cli.verbose {
                eprintln!("--- Run Stats ---");
                eprintln!(
                    "Diff: {} bytes{}",
                    report.stats.diff_bytes,
                    if report.stats.diff_truncated {
                        " (truncated)"
                    } else {
                        ""
                    }
                );
                eprintln!("Prompt: {} bytes", report.stats.prompt_bytes);
                eprintln!("-----------------");
            }

            match &report.publication {
                PublishOutcome::Published => {
                    eprintln!("Review posted to {repo_id}#{pr}");
                }
                PublishOutcome::Failed(reason) => {
                    eprintln!("warning: review was not posted to {repo_id}#{pr}: {reason}");
                }
            }

            Ok(())
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".vigil.toml");
            if path.exists() {
                miette::bail!(".vigil.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .vigil.toml with default configuration");
            Ok(())
        }
        Some(Command::Doctor) => {
            run_doctor(&config, use_color);
            Ok(())
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "vigil", &mut std::io::stdout());
            Ok(())
        }
    }
}
