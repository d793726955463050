// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{LevelFilter, Log, Metadata, Record, Level, SetLoggerError, info};
use once_cell::sync::OnceCell;
use std::io::Write;
use std::path::PathBuf;

use linewise::app_config::{Config, LogLevel};
use linewise::app_controller::Controller;
use linewise::file_utils::FileManager;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate subtitle files (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for linewise
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Subtitle file or directory of subtitle files to translate
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// File holding the OpenAI API key
    #[arg(short = 'k', long)]
    api_key_file: Option<PathBuf>,

    /// Target language, as ISO 639 code or English name (e.g., 'de', 'german')
    #[arg(short = 'l', long)]
    language: Option<String>,

    /// Target country as ISO 3166-1 alpha-2 code (e.g., 'de', 'at')
    #[arg(short = 'c', long)]
    country: Option<String>,

    /// Directory for translated files (defaults to the input directory)
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Token budget per minute; zero or negative disables the limit
    #[arg(long, allow_negative_numbers = true)]
    tokens_per_minute: Option<i64>,

    /// Pause after every request, in seconds
    #[arg(long)]
    delay: Option<f64>,

    /// Send the whole file's dialogue with every line
    #[arg(long)]
    keep_history: bool,

    /// Model name to use for translation
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Configuration file path
    #[arg(long = "config", default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// linewise - line-by-line subtitle translation
///
/// Translates SRT subtitle files one caption at a time through an
/// OpenAI-compatible chat-completion service.
#[derive(Parser, Debug)]
#[command(name = "linewise")]
#[command(version)]
#[command(about = "Line-by-line subtitle translation with a chat-completion service")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "linewise translates SRT subtitle files one caption at a time using an OpenAI-compatible chat-completion service.

EXAMPLES:
    linewise show.srt -k key.txt -l de -c de           # Translate into German (Germany)
    linewise /subs/ -k key.txt -l french -c ca         # Translate every .srt in a directory
    linewise show.srt -k key.txt -l es -c mx --tokens-per-minute 40000
    linewise show.srt -k key.txt -l it -c it --keep-history --delay 0.5
    linewise completions bash > linewise.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. Command line options override the file.

OUTPUT:
    <name>.<country>.<language>.srt next to the input or in --output-dir.
    A text log and one JSON dump per request are written below the log directory.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,
}

// Target of the file sink, known once the configuration is loaded
static LOG_FILE: OnceCell<PathBuf> = OnceCell::new();

// @struct: Custom logger implementation, filtered by log::max_level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let level = record.level();

        let mut stderr = std::io::stderr();
        let _ = writeln!(
            stderr,
            "{}{} {} {}\x1B[0m",
            Self::get_color_for_level(level), now, Self::get_emoji_for_level(level), record.args()
        );

        if let Some(path) = LOG_FILE.get() {
            if let Err(e) = FileManager::append_to_log_file(path, &format!("{:<5} {}", level, record.args())) {
                let _ = writeln!(stderr, "Failed to log to {}: {}", path.display(), e);
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "linewise", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        // Default behavior - top-level args are the translate command
        None => run_translate(cli.translate).await,
    }
}

fn apply_overrides(config: &mut Config, args: &TranslateArgs) {
    if let Some(path) = &args.api_key_file {
        config.api_key_file = Some(path.clone());
    }
    if let Some(language) = &args.language {
        config.target_language = language.clone();
    }
    if let Some(country) = &args.country {
        config.country_code = country.clone();
    }
    if let Some(tokens) = args.tokens_per_minute {
        config.tokens_per_minute = tokens;
    }
    if let Some(delay) = args.delay {
        config.delay_secs = delay;
    }
    if args.keep_history {
        config.keep_history = true;
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(level) = args.log_level {
        config.log_level = level.into();
    }
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let input_path = args.input_path.clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required"))?;

    // If log level is set via command line, apply it immediately
    if let Some(level) = args.log_level {
        log::set_max_level(LogLevel::from(level).to_level_filter());
    }

    let mut config = Config::load_or_create(&args.config_path)?;
    apply_overrides(&mut config, &args);
    log::set_max_level(config.log_level.to_level_filter());

    let log_file = config.resolved_log_dir().join("log").join("log.txt");
    let _ = LOG_FILE.set(log_file.clone());
    info!("Logging to: {}", log_file.display());

    let controller = Controller::with_config(config)?;
    let summary = controller.run(&input_path, args.output_dir.clone()).await?;

    if summary.translated == 0 && summary.failed > 0 {
        return Err(anyhow!("None of the {} file(s) could be translated", summary.failed));
    }

    Ok(())
}
