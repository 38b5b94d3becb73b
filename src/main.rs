use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use polydoc::cache::{CacheStats, CachedTranslator};
use polydoc::config::{self, Config, ProviderKind, TranslationConfig};
use polydoc::fetch::{LocalFetcher, SourceType};
use polydoc::pipeline::{Pipeline, PipelineError, RunOptions, Settings};
use polydoc::store::FsProjectStore;
use polydoc::translate::provider::{
    CommandTranslator, GlossaryTranslator, IdentityTranslator, ProviderError, TaggingTranslator,
    TextTranslator,
};
use polydoc::output;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "polydoc")]
#[command(about = "Translate documentation into a self-contained static site")]
#[command(long_about = "\
Translate documentation into a self-contained static site

A project moves through four phases, each stored so it can be resumed or
retried on its own:

  fetch      collect documentation pages from a source
  parse      classify page content into headings, paragraphs, code, ...
  translate  translate prose; code, links and raw HTML stay untouched
  build      render output/sites/{project}/{lang}/ and optionally a .zip

Every phase command prints the project id needed by the next one. 'run'
does all four in one go.

Run 'polydoc gen-config' to generate a documented polydoc.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Print results as a JSON envelope
    #[arg(long, global = true)]
    json: bool,

    /// Log verbosity (overrides RUST_LOG)
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LevelFilter {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => LevelFilter::Error,
            CliLogLevel::Warn => LevelFilter::Warn,
            CliLogLevel::Info => LevelFilter::Info,
            CliLogLevel::Debug => LevelFilter::Debug,
            CliLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Shared flags for commands that fetch a source.
#[derive(clap::Args, Clone)]
struct SourceArgs {
    /// Repository URL or local path
    url: String,

    /// Kind of source
    #[arg(long, value_enum, default_value_t = SourceType::Local)]
    source_type: SourceType,

    /// Stop after this many pages (default from config)
    #[arg(long)]
    max_pages: Option<usize>,
}

/// Shared flags for commands that translate.
#[derive(clap::Args, Clone)]
struct LangArgs {
    /// Language of the source pages (default from config)
    #[arg(long)]
    source_lang: Option<String>,

    /// Language to translate into (default from config)
    #[arg(long)]
    target_lang: Option<String>,

    /// Ignore the translation memory for this run
    #[arg(long)]
    no_cache: bool,
}

/// Shared flags for commands that build.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Site directory name (defaults to the project id)
    #[arg(long)]
    name: Option<String>,

    /// Also write a .zip archive to the downloads directory
    #[arg(long)]
    package: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Collect documentation pages into a new project
    Fetch(SourceArgs),
    /// Parse a project's fetched pages
    Parse { project_id: String },
    /// Translate a project's parsed documents
    Translate {
        project_id: String,
        #[command(flatten)]
        langs: LangArgs,
    },
    /// Render a project's translated documents into a site
    Build {
        project_id: String,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Show a project's phase and page counts
    Status { project_id: String },
    /// List stored projects
    Projects,
    /// List supported languages
    Languages,
    /// Copy a packaged site out of the downloads directory
    Download {
        filename: String,
        /// Destination file; stdout when absent
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run the full pipeline: fetch → parse → translate → build
    Run {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        langs: LangArgs,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Print a stock polydoc.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    init_thread_pool(&config.processing);

    let store = FsProjectStore::new(config.store_path());
    let fetcher = LocalFetcher;
    let no_cache = match &cli.command {
        Command::Translate { langs, .. } | Command::Run { langs, .. } => langs.no_cache,
        _ => false,
    };
    let provider = Provider::from_config(&config, no_cache)?;
    let pipeline = Pipeline::new(
        &store,
        &fetcher,
        provider.as_dyn(),
        Settings::from_config(&config),
    );
    let json = cli.json;

    match cli.command {
        Command::Fetch(source) => emit(
            json,
            pipeline.fetch(&source.url, source.source_type, source.max_pages),
            output::print_fetch_output,
        ),
        Command::Parse { project_id } => {
            emit(json, pipeline.parse(&project_id), output::print_parse_output)
        }
        Command::Translate { project_id, langs } => {
            let (source_lang, target_lang) = languages(&langs, &config.translation);
            let result = pipeline.translate(&project_id, &source_lang, &target_lang);
            let stats = provider.finish()?;
            emit(json, result, |report| {
                output::print_translate_output(report, stats)
            })
        }
        Command::Build { project_id, build } => emit(
            json,
            pipeline.build(&project_id, build.name.as_deref(), build.package),
            output::print_build_output,
        ),
        Command::Status { project_id } => {
            emit(json, pipeline.status(&project_id), output::print_status_output)
        }
        Command::Projects => emit(json, pipeline.projects(), output::print_projects_output),
        Command::Languages => emit(
            json,
            Ok::<_, PipelineError>(pipeline.languages()),
            output::print_languages_output,
        ),
        Command::Download {
            filename,
            output: dest,
        } => {
            let bytes = pipeline.download(&filename)?;
            match dest {
                Some(path) => std::fs::write(&path, bytes)?,
                None => std::io::stdout().lock().write_all(&bytes)?,
            }
            Ok(())
        }
        Command::Run {
            source,
            langs,
            build,
        } => {
            let (source_lang, target_lang) = languages(&langs, &config.translation);
            let options = RunOptions {
                source_type: source.source_type,
                max_pages: source.max_pages,
                source_lang,
                target_lang,
                project_name: build.name,
                create_package: build.package,
            };
            let result = pipeline.run(&source.url, &options);
            let stats = provider.finish()?;
            emit(json, result, |report| output::print_run_output(report, stats))
        }
        Command::GenConfig => Ok(()),
    }
}

/// Print a phase result as text or as a JSON envelope.
///
/// With `--json` a failed phase still prints its envelope before exiting
/// with status 1.
fn emit<T: Serialize>(
    json: bool,
    result: Result<T, PipelineError>,
    print: impl FnOnce(&T),
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let failed = result.is_err();
        println!("{}", output::format_json(result));
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }
    print(&result?);
    Ok(())
}

fn languages(langs: &LangArgs, defaults: &TranslationConfig) -> (String, String) {
    (
        langs
            .source_lang
            .clone()
            .unwrap_or_else(|| defaults.source_lang.clone()),
        langs
            .target_lang
            .clone()
            .unwrap_or_else(|| defaults.target_lang.clone()),
    )
}

/// The configured provider, wrapped in a translation memory when enabled.
enum Provider {
    Cached(CachedTranslator),
    Plain(Box<dyn TextTranslator>),
}

impl Provider {
    fn from_config(config: &Config, no_cache: bool) -> Result<Self, ProviderError> {
        let translation = &config.translation;
        let inner: Box<dyn TextTranslator> = match translation.provider {
            ProviderKind::Tagging => Box::new(TaggingTranslator),
            ProviderKind::Identity => Box::new(IdentityTranslator),
            ProviderKind::Glossary => {
                let path = translation.glossary.as_deref().unwrap_or_default();
                Box::new(GlossaryTranslator::load(Path::new(path))?)
            }
            ProviderKind::Command => Box::new(CommandTranslator::new(&translation.command)?),
        };
        if !translation.cache {
            return Ok(Provider::Plain(inner));
        }
        let output_dir = config.output_path();
        Ok(Provider::Cached(if no_cache {
            CachedTranslator::fresh(inner, &output_dir)
        } else {
            CachedTranslator::new(inner, &output_dir)
        }))
    }

    fn as_dyn(&self) -> &dyn TextTranslator {
        match self {
            Provider::Cached(cached) => cached,
            Provider::Plain(inner) => inner.as_ref(),
        }
    }

    /// Persist the translation memory and report how it was used.
    fn finish(&self) -> std::io::Result<Option<CacheStats>> {
        match self {
            Provider::Cached(cached) => {
                cached.save()?;
                Ok(Some(cached.stats()))
            }
            Provider::Plain(_) => Ok(None),
        }
    }
}

/// Install the logger: `--log-level` wins over `RUST_LOG`, default `warn`.
fn init_logging(level: Option<CliLogLevel>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level.into());
    }
    builder.init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
