use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use log::debug;
use rayon::prelude::*;
use similar::{ChangeTag, TextDiff};

use pdxfmt_core::{CONFIG_DEFAULT_NAME, Config};

/// File extensions that contain Clausewitz script
const FORMAT_EXTENSIONS: [&str; 2] = ["txt", "map"];

#[derive(Parser)]
#[command(name = "pdxfmt")]
#[command(about = "A formatter for Paradox mod script files", long_about = None)]
struct Cli {
    /// Path to the mod directory (default: resolved from the .mod file
    /// in the current directory)
    #[arg(long = "mod", value_name = "DIR")]
    mod_dir: Option<PathBuf>,

    /// Format a single file or subtree instead of the whole mod
    #[arg(long)]
    file: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Check if files are formatted (don't modify)
    #[arg(long, short)]
    check: bool,

    /// Show diff of formatting changes
    #[arg(long)]
    diff: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Outcome of formatting one file
enum Outcome {
    Unchanged,
    Formatted {
        path: PathBuf,
        original: String,
        formatted: String,
    },
    Failed {
        path: PathBuf,
        message: String,
    },
}

fn run(cli: &Cli) -> Result<(), String> {
    let mod_root = match &cli.mod_dir {
        Some(dir) => {
            if !dir.is_dir() {
                return Err(format!("'{}' is not a directory", dir.display()));
            }
            dir.clone()
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
            find_mod_root(&cwd)?
        }
    };
    debug!("mod root: {}", mod_root.display());

    let config_path = resolve_config_path(cli.config.as_deref(), &mod_root)?;
    debug!("config: {}", config_path.display());
    let config = Config::load(&config_path).map_err(|e| e.to_string())?;

    let files = match &cli.file {
        Some(target) if target.is_dir() => collect_script_files(target, &mod_root, &config)?,
        Some(target) => {
            if !is_formattable(target, &mod_root, &config) {
                return Err(format!(
                    "'{}' is not a formattable script file",
                    target.display()
                ));
            }
            vec![target.clone()]
        }
        None => collect_script_files(&mod_root, &mod_root, &config)?,
    };

    if files.is_empty() {
        println!("{}", "No script files found.".yellow());
        return Ok(());
    }
    debug!("formatting {} file(s)", files.len());

    let outcomes: Vec<Outcome> = files
        .par_iter()
        .map(|file| format_file(file, &mod_root, &config, cli.check))
        .collect();

    report(&outcomes, cli.check, cli.diff)
}

/// Resolve the mod content directory from the single .mod file in `dir`
fn find_mod_root(dir: &Path) -> Result<PathBuf, String> {
    let entries =
        fs::read_dir(dir).map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?;

    let mut mod_files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "mod") {
            mod_files.push(path);
        }
    }

    let mod_file = match mod_files.as_slice() {
        [single] => single,
        [] => {
            return Err(format!(
                "No .mod file found in {}; pass --mod to select the mod directory",
                dir.display()
            ));
        }
        _ => {
            return Err(format!(
                "Multiple .mod files found in {}; pass --mod to select the mod directory",
                dir.display()
            ));
        }
    };

    let content = fs::read_to_string(mod_file)
        .map_err(|e| format!("Failed to read {}: {}", mod_file.display(), e))?;
    let relative = parse_mod_path(&content).ok_or_else(|| {
        format!("No 'path' or 'user_dir' entry found in {}", mod_file.display())
    })?;

    Ok(dir.join(relative))
}

/// Extract the content directory entry from a .mod descriptor; older
/// descriptors call it `user_dir`, newer ones `path`
fn parse_mod_path(content: &str) -> Option<String> {
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=')
            && matches!(key.trim(), "path" | "user_dir")
        {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// Explicit --config must exist; otherwise the default name is looked up
/// next to the mod folder, falling back to the working directory
fn resolve_config_path(explicit: Option<&Path>, mod_root: &Path) -> Result<PathBuf, String> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(format!("Config file '{}' not found", path.display()));
        }
        return Ok(path.to_path_buf());
    }

    if let Some(parent) = mod_root.parent() {
        let candidate = parent.join(CONFIG_DEFAULT_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Ok(PathBuf::from(CONFIG_DEFAULT_NAME))
}

fn collect_script_files(
    dir: &Path,
    mod_root: &Path,
    config: &Config,
) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    collect_script_files_into(dir, mod_root, config, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_script_files_into(
    dir: &Path,
    mod_root: &Path,
    config: &Config,
    files: &mut Vec<PathBuf>,
) -> Result<(), String> {
    let entries =
        fs::read_dir(dir).map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();

        if path.is_dir() {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if !name.starts_with('.') {
                collect_script_files_into(&path, mod_root, config, files)?;
            }
        } else if is_formattable(&path, mod_root, config) {
            files.push(path);
        }
    }

    Ok(())
}

fn is_formattable(path: &Path, mod_root: &Path, config: &Config) -> bool {
    if !path.is_file() {
        return false;
    }
    let extension = path.extension().and_then(|ext| ext.to_str());
    if !extension.is_some_and(|ext| FORMAT_EXTENSIONS.contains(&ext)) {
        return false;
    }
    !config.is_excluded(&relative_name(path, mod_root))
}

/// Path relative to the mod root, as matched against the configuration
fn relative_name(path: &Path, mod_root: &Path) -> String {
    path.strip_prefix(mod_root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn format_file(path: &Path, mod_root: &Path, config: &Config, check: bool) -> Outcome {
    match try_format_file(path, mod_root, config, check) {
        Ok(outcome) => outcome,
        Err(message) => Outcome::Failed {
            path: path.to_path_buf(),
            message,
        },
    }
}

fn try_format_file(
    path: &Path,
    mod_root: &Path,
    config: &Config,
    check: bool,
) -> Result<Outcome, String> {
    let bytes =
        fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let (original, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);

    let options = config.options_for(&relative_name(path, mod_root));
    let formatted = pdxfmt_core::format(&original, &options).map_err(|e| e.to_string())?;

    if original == formatted {
        return Ok(Outcome::Unchanged);
    }

    if !check {
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(&formatted);
        fs::write(path, &encoded)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    }

    Ok(Outcome::Formatted {
        path: path.to_path_buf(),
        original: original.into_owned(),
        formatted,
    })
}

fn report(outcomes: &[Outcome], check: bool, show_diff: bool) -> Result<(), String> {
    let mut changed = Vec::new();
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome {
            Outcome::Unchanged => {}
            Outcome::Formatted {
                path,
                original,
                formatted,
            } => {
                if show_diff {
                    print_diff(path, original, formatted);
                }
                changed.push(path);
            }
            Outcome::Failed { path, message } => errors.push((path, message)),
        }
    }

    if check {
        if changed.is_empty() && errors.is_empty() {
            println!("{}", "All files are properly formatted.".green());
            return Ok(());
        }
        if !changed.is_empty() {
            println!("{}", "The following files need formatting:".yellow());
            for path in &changed {
                println!("  {}", path.display());
            }
        }
        for (path, message) in &errors {
            eprintln!("{} {}: {}", "Error:".red(), path.display(), message);
        }
        return Err("Some files are not properly formatted".to_string());
    }

    for (path, message) in &errors {
        eprintln!("{} {}: {}", "Error:".red(), path.display(), message);
    }
    if !errors.is_empty() {
        return Err("Some files had formatting errors".to_string());
    }

    if changed.is_empty() {
        println!("{}", "All files are already properly formatted.".green());
    } else {
        for path in &changed {
            println!("{} {}", "Formatted:".green(), path.display());
        }
        println!(
            "{}",
            format!("Formatted {} file(s).", changed.len()).green().bold()
        );
    }
    Ok(())
}

fn print_diff(file: &Path, original: &str, formatted: &str) {
    println!("\n{} {}:", "Diff for".cyan().bold(), file.display());

    let diff = TextDiff::from_lines(original, formatted);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
    }
}
