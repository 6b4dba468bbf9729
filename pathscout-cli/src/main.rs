use clap::Parser;
use colored::{ColoredString, Colorize};
use itertools::Itertools;
use pathscout::{
    config::{CliOverrides, FilterOptions, MatchKind, SearchConfig},
    entry::{EntryMeta, PathEntry},
    filters::extension_of,
    find,
    results::ResultSet,
    EntryType, FindRequest, SearchError, MATCH_ALL,
};
use serde_json::json;
use std::io::IsTerminal;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, SearchError>;

/// Find files and directories by name, in parallel.
#[derive(Parser)]
#[command(
    name = "pathscout",
    author,
    version,
    about,
    long_about = None,
    disable_version_flag = true
)]
struct Cli {
    /// Substring, regex (-r) or glob (-g) to match; "." lists everything
    pattern: Option<String>,

    /// Only report paths containing this string
    pathname: Option<String>,

    /// Treat the pattern as a regular expression
    #[arg(short = 'r', long)]
    regex: bool,

    /// Treat the pattern as a glob matched against base names
    #[arg(short = 'g', long)]
    glob: bool,

    /// Maximum directory depth (-1 for no limit)
    #[arg(short = 'd', long, allow_negative_numbers = true)]
    max_depth: Option<i64>,

    /// Exclude paths matching a glob (repeatable, comma-separated)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Only report entries of this type (file|dir|symlink)
    #[arg(short = 't', long)]
    file_type: Option<String>,

    /// Only report entries with this extension
    #[arg(short = 'e', long)]
    extension: Option<String>,

    /// Match the pattern case-sensitively
    #[arg(short = 'S', long)]
    case_sensitive: bool,

    /// Print absolute paths
    #[arg(short = 'A', long)]
    absolute_path: bool,

    /// Number of worker threads (default: all cores)
    #[arg(short = 'T', long, allow_negative_numbers = true)]
    threads: Option<i64>,

    /// Include hidden files and directories
    #[arg(short = 'H', long)]
    hidden: bool,

    /// Include entries matched by *ignore files
    #[arg(short = 'I', long)]
    ignore: bool,

    /// Print type, permissions, size and modification time
    #[arg(short = 'l', long)]
    long_list: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,
}

struct OutputFormat {
    long_list: bool,
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let profile = SearchConfig::load_from(cli.config.as_deref())?.merge_with_cli(CliOverrides {
        max_depth: cli.max_depth,
        thread_count: cli.threads,
        include_hidden: cli.hidden,
        include_ignored: cli.ignore,
        exclude_patterns: cli.exclude.clone(),
        absolute_path: cli.absolute_path,
        log_level: cli.log_level.clone(),
    });
    setup_logging(&profile.log_level);

    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let mut filters = FilterOptions::new(MatchKind::from_flags(cli.regex, cli.glob)?);
    filters.case_sensitive = cli.case_sensitive;
    filters.exclude_globs = profile.exclude_patterns.iter().cloned().collect();
    filters.type_filter = cli
        .file_type
        .as_deref()
        .map(str::parse::<EntryType>)
        .transpose()?;
    filters.extension_filter = cli.extension.clone();
    filters.absolute_path = profile.absolute_path;
    filters.validate()?;

    if let Some(pathname) = cli.pathname.as_deref() {
        if pathname != "." && !Path::new(pathname).exists() {
            return Err(SearchError::path_not_found(pathname));
        }
    }

    let pattern = cli.pattern.clone().unwrap_or_else(|| MATCH_ALL.to_string());
    let mut request = FindRequest::new(pattern, profile.traversal_config(".")?);
    request.pathname = cli.pathname.clone();
    request.filters = filters;
    debug!("Running {:?}", request);

    let output = find(&request)?;
    print_results(
        output.results,
        &OutputFormat {
            long_list: cli.long_list,
            json: cli.json,
        },
    );

    // Results found before the failure are still printed.
    match output.first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_results(results: ResultSet, format: &OutputFormat) {
    let rendered: Vec<(String, PathEntry)> = results
        .into_iter()
        .sorted()
        .map(|path| {
            let entry = PathEntry::new(Path::new("."), &path);
            (display_path(path, &entry), entry)
        })
        .collect();

    if format.json {
        let paths: Vec<&str> = rendered.iter().map(|(path, _)| path.as_str()).collect();
        println!("{}", json!({ "count": paths.len(), "results": paths }));
        return;
    }

    if rendered.is_empty() {
        println!("No files found.");
        return;
    }

    for (path, entry) in &rendered {
        if format.long_list {
            match entry.metadata() {
                Some(meta) => println!("{} {}", long_prefix(meta), colorize(path, entry)),
                None => println!("{}", colorize(path, entry)),
            }
        } else {
            println!("{}", colorize(path, entry));
        }
    }
}

/// Directories are shown with a trailing separator. Links to directories
/// are not.
fn display_path(mut path: String, entry: &PathEntry) -> String {
    if !path.ends_with(MAIN_SEPARATOR) && entry.metadata().is_some_and(|m| m.is_dir) {
        path.push(MAIN_SEPARATOR);
    }
    path
}

fn colorize(path: &str, entry: &PathEntry) -> ColoredString {
    if path.ends_with(MAIN_SEPARATOR) || entry.is_dir() {
        return path.cyan().bold();
    }
    if entry.metadata().is_some_and(|m| m.is_symlink) {
        return path.magenta();
    }
    match extension_of(Path::new(path)).as_deref() {
        Some("rs" | "go" | "py" | "js" | "ts" | "c" | "h" | "cpp" | "java" | "sh") => path.green(),
        Some("json" | "yaml" | "yml" | "toml" | "ini" | "xml") => path.yellow(),
        Some("zip" | "gz" | "tar" | "xz" | "bz2" | "7z" | "zst") => path.red(),
        _ => path.normal(),
    }
}

/// `drwxr-xr-x       4096 2024-01-01T00:00:00Z`
fn long_prefix(meta: &EntryMeta) -> String {
    let modified = meta
        .modified
        .map(|t| humantime::format_rfc3339_seconds(t).to_string())
        .unwrap_or_else(|| "-".repeat(20));
    format!("{} {:>10} {}", mode_string(meta), meta.size, modified)
}

fn mode_string(meta: &EntryMeta) -> String {
    let kind = match meta.entry_type() {
        Some(EntryType::Dir) => 'd',
        Some(EntryType::Symlink) => 'l',
        Some(EntryType::File) => '-',
        None => '?',
    };
    let mut mode = String::with_capacity(10);
    mode.push(kind);
    for shift in [6, 3, 0] {
        let bits = (meta.mode >> shift) & 0o7;
        mode.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        mode.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        mode.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    mode
}
