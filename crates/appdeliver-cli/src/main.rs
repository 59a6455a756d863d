use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use appdeliver::auth::{AuthInputs, Credentials};
use appdeliver::config::{CliOverrides, DeliverConfig};
use appdeliver::engine::{self, Reporter, UploadRequest};
use appdeliver::environment::{collect_tool_environment, detect_xcode_major_version, xcrun_program};
use appdeliver::package::ArchiveMetadataReader;
use appdeliver::retry::UploadReport;

#[derive(Parser, Debug)]
#[command(name = "appdeliver", version)]
#[command(about = "Upload .ipa/.pkg archives to App Store Connect with altool, retrying known transient failures")]
struct Cli {
    /// Config file (default: ./.appdeliver.toml if present)
    #[arg(long, global = true, env = "APPDELIVER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload the archive, retrying known transient failures.
    Upload(UploadArgs),
    /// Print the redacted altool invocation without running it.
    Plan(UploadArgs),
    /// Print tool and authentication diagnostics.
    Doctor(UploadArgs),
    /// Write a commented .appdeliver.toml into the current directory.
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct UploadArgs {
    /// Path to the .ipa to upload
    #[arg(long, env = "APPDELIVER_IPA_PATH")]
    ipa_path: Option<PathBuf>,

    /// Path to the .pkg to upload; wins over --ipa-path
    #[arg(long, env = "APPDELIVER_PKG_PATH")]
    pkg_path: Option<PathBuf>,

    /// Apple ID user name
    #[arg(long, env = "APPDELIVER_APPLE_ID_USER")]
    apple_id_user: Option<String>,

    /// Apple ID password
    #[arg(long, env = "APPDELIVER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// App-specific password; preferred over --password
    #[arg(long, env = "APPDELIVER_APP_PASSWORD", hide_env_values = true)]
    app_password: Option<String>,

    /// App Store Connect API key file (AuthKey_<ID>.p8)
    #[arg(long, env = "APPDELIVER_API_KEY_PATH")]
    api_key_path: Option<String>,

    /// API key id; derived from the key file name when omitted
    #[arg(long, env = "APPDELIVER_API_KEY_ID")]
    api_key_id: Option<String>,

    /// API issuer id
    #[arg(long, env = "APPDELIVER_API_ISSUER")]
    api_issuer: Option<String>,

    /// Apple ID of the app (numeric); requires Xcode 26 or newer
    #[arg(long, env = "APPDELIVER_APP_ID")]
    app_id: Option<String>,

    #[arg(long, env = "APPDELIVER_BUNDLE_ID")]
    bundle_id: Option<String>,

    #[arg(long, env = "APPDELIVER_BUNDLE_VERSION")]
    bundle_version: Option<String>,

    #[arg(long, env = "APPDELIVER_BUNDLE_SHORT_VERSION")]
    bundle_short_version: Option<String>,

    /// auto, ios, macos or tvos
    #[arg(long, env = "APPDELIVER_PLATFORM")]
    platform: Option<String>,

    /// Extra altool flags, shell-quoted
    #[arg(long, env = "APPDELIVER_ALTOOL_OPTIONS", allow_hyphen_values = true)]
    altool_options: Option<String>,

    /// Skip `xcodebuild -version` and use this Xcode major version
    #[arg(long, env = "APPDELIVER_XCODE_MAJOR_VERSION")]
    xcode_major_version: Option<u32>,

    /// Total upload attempts (default: 10)
    #[arg(long, env = "APPDELIVER_RETRY_TIMES")]
    retry_times: Option<String>,

    /// Pass --verbose to altool and print debug output
    #[arg(long, env = "APPDELIVER_VERBOSE")]
    verbose: bool,

    /// Write a JSON report of every attempt to this path
    #[arg(long, env = "APPDELIVER_REPORT")]
    report: Option<PathBuf>,
}

impl UploadArgs {
    fn auth_inputs(&self) -> AuthInputs {
        AuthInputs {
            apple_id_user: self.apple_id_user.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            app_password: self.app_password.clone().unwrap_or_default(),
            api_key_path: self.api_key_path.clone().unwrap_or_default(),
            api_key_id: self.api_key_id.clone().unwrap_or_default(),
            api_issuer: self.api_issuer.clone().unwrap_or_default(),
        }
    }

    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            ipa_path: self.ipa_path.clone(),
            pkg_path: self.pkg_path.clone(),
            auth: self.auth_inputs(),
            app_id: self.app_id.clone(),
            bundle_id: self.bundle_id.clone(),
            bundle_version: self.bundle_version.clone(),
            bundle_short_version: self.bundle_short_version.clone(),
            platform: self.platform.clone(),
            altool_options: self.altool_options.clone(),
            retry_times: self.retry_times.clone(),
            verbose: self.verbose,
        }
    }
}

struct CliReporter {
    verbose: bool,
}

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }

    fn debug(&mut self, msg: &str) {
        if self.verbose {
            eprintln!("[debug] {msg}");
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut reporter = CliReporter { verbose: false };

    match run(cli, &mut reporter) {
        Ok(code) => code,
        Err(e) => {
            reporter.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, reporter: &mut CliReporter) -> Result<ExitCode> {
    let (config, config_path) = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Commands::Upload(args) => {
            reporter.verbose = args.verbose || config.verbose;
            let request = build_request(&config, &args, reporter)?;
            let report = engine::perform_upload(
                &request,
                &ArchiveMetadataReader,
                &xcrun_program(),
                reporter,
            )?;
            finish_upload(&report, args.report.as_deref(), reporter)
        }
        Commands::Plan(args) => {
            reporter.verbose = args.verbose || config.verbose;
            let request = build_request(&config, &args, reporter)?;
            let prepared = engine::prepare_upload(&request, &ArchiveMetadataReader, reporter)?;
            println!("platform: {}", prepared.platform);
            println!("xcode_major_version: {}", request.xcode_major_version);
            println!("max_attempts: {}", request.retry.max_attempts);
            println!("command: {}", prepared.printable(&xcrun_program()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Doctor(args) => {
            run_doctor(&args, config_path.as_deref());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { force } => {
            let path = env::current_dir()
                .context("failed to resolve current directory")?
                .join(appdeliver::config::CONFIG_FILE_NAME);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            fs::write(&path, DeliverConfig::default_toml_template())
                .with_context(|| format!("failed to write {}", path.display()))?;
            reporter.info(&format!("wrote {}", path.display()));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<(DeliverConfig, Option<PathBuf>)> {
    let (config, path) = match explicit {
        Some(path) => (DeliverConfig::load_from_file(path)?, Some(path.to_path_buf())),
        None => {
            let cwd = env::current_dir().context("failed to resolve current directory")?;
            match DeliverConfig::load_from_workspace(&cwd)? {
                Some(config) => (
                    config,
                    Some(cwd.join(appdeliver::config::CONFIG_FILE_NAME)),
                ),
                None => (DeliverConfig::default(), None),
            }
        }
    };
    config.validate()?;
    Ok((config, path))
}

fn build_request(
    config: &DeliverConfig,
    args: &UploadArgs,
    reporter: &mut dyn Reporter,
) -> Result<UploadRequest> {
    let xcode_major_version = match args.xcode_major_version {
        Some(v) => v,
        None => detect_xcode_major_version().context("failed to determine Xcode version")?,
    };
    reporter.info(&format!("Xcode major version: {xcode_major_version}"));
    Ok(config.build_request(args.overrides(), xcode_major_version, reporter)?)
}

fn finish_upload(
    report: &UploadReport,
    report_path: Option<&Path>,
    reporter: &mut dyn Reporter,
) -> Result<ExitCode> {
    if report.attempts.len() > 1 {
        reporter.debug(&format!(
            "stdout of all {} attempts:\n{}",
            report.attempts.len(),
            report.combined_stdout()
        ));
    }

    let raw = report.raw_output();
    if !raw.trim().is_empty() {
        println!("{}", raw.trim_end());
    }

    for warning in report.warnings() {
        reporter.warn(&warning.render());
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        reporter.info(&format!("report written to {}", path.display()));
    }

    if report.succeeded() {
        if !report.result.success_details.delivery_uuid.is_empty() {
            reporter.info(&format!(
                "delivery id: {}",
                report.result.success_details.delivery_uuid
            ));
        }
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn run_doctor(args: &UploadArgs, config_path: Option<&Path>) {
    let tools = collect_tool_environment();

    println!("appdeliver: {}", tools.appdeliver_version);
    println!("os: {}/{}", tools.os, tools.arch);
    match config_path {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: <none>"),
    }
    match &tools.program_path {
        Some(path) => println!("program: {} ({})", tools.program, path.display()),
        None => println!("program: {} (not found)", tools.program),
    }
    match args.xcode_major_version.or(tools.xcode_major_version) {
        Some(v) => println!("xcode_major_version: {v}"),
        None => println!("xcode_major_version: <unknown>"),
    }
    match Credentials::resolve(&args.auth_inputs()) {
        Ok(creds) => println!("auth: {}", creds.kind()),
        Err(e) => println!("auth: <not configured> ({e})"),
    }
}
