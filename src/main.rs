//! Rattle CLI
//!
//! Usage:
//!   rattle [OPTIONS] [TEMPLATE]
//!
//! Options:
//!   -c, --context <FILE>   Render context (TOML format)
//!   -d, --dir <DIR>        Template directory; TEMPLATE is then looked up by name
//!   --config <FILE>        Render configuration (TOML format)
//!   --no-autoescape        Emit interpolated values without HTML escaping
//!   --debug                Log the compiled tree and render steps
//!   -h, --help             Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rattle::{select_template, Context, Library, LoadError, RenderConfig, Template};

#[derive(Parser)]
#[command(name = "rattle")]
#[command(about = "Render a text template against a TOML context")]
struct Cli {
    /// Template file, or name when --dir is given (reads stdin if not provided)
    template: Option<String>,

    /// Context file (TOML format)
    #[arg(short, long)]
    context: Option<PathBuf>,

    /// Template directory, may be repeated
    #[arg(short = 'd', long = "dir")]
    dirs: Vec<PathBuf>,

    /// Render configuration file (TOML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable HTML auto-escaping
    #[arg(long)]
    no_autoescape: bool,

    /// Debug mode: log the compiled tree
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug { "rattle=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, String> {
    let mut config = match &cli.config {
        Some(path) => RenderConfig::from_file(path)
            .map_err(|e| format!("Error loading config '{}': {}", path.display(), e))?,
        None => RenderConfig::default(),
    };
    if cli.no_autoescape {
        config.autoescape = false;
    }
    if cli.debug {
        config.debug = true;
    }
    config.template_dirs.extend(cli.dirs.iter().cloned());

    let context = match &cli.context {
        Some(path) => Context::from_file(path)
            .map_err(|e| format!("Error loading context '{}': {}", path.display(), e))?,
        None => Context::new(),
    };

    let (template, filename) = load(cli, &config)?;
    let library = Library::with_builtins();
    template
        .render_with_config(&context, &library, &config)
        .map_err(|e| e.format(template.source(), &filename))
}

/// Compile the template named on the command line
fn load(cli: &Cli, config: &RenderConfig) -> Result<(Template, String), String> {
    match (&cli.template, config.template_dirs.is_empty()) {
        (Some(name), false) => match select_template(&[name.as_str()], &config.template_dirs) {
            Ok(template) => {
                let filename = template
                    .origin()
                    .map_or_else(|| name.clone(), |p| p.display().to_string());
                Ok((template, filename))
            }
            Err(LoadError::Parse { path, text, source }) => {
                Err(source.format(&text, &path.display().to_string()))
            }
            Err(e) => Err(format!("Error: {}", e)),
        },
        (Some(name), true) => {
            let path = Path::new(name);
            let source = fs::read_to_string(path)
                .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
            let template = Template::with_origin(source.as_str(), path)
                .map_err(|e| e.format(&source, name))?;
            Ok((template, name.clone()))
        }
        (None, _) => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|e| format!("Error reading from stdin: {}", e))?;
            let template =
                Template::new(source.as_str()).map_err(|e| e.format(&source, "<stdin>"))?;
            Ok((template, "<stdin>".to_string()))
        }
    }
}
