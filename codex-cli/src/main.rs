//! Codex CLI - catalog, search and reconcile code files

use clap::{Parser, Subcommand};
use codex_core::reconcile::IssueKind;
use codex_core::{Catalog, CodexError, Config, IndexReport, ReconcileAnalysis, SearchQuery};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Errors shown in text mode before truncating
const MAX_ERRORS_SHOWN: usize = 5;

#[derive(Parser)]
#[command(name = "codex")]
#[command(about = "Catalog code files and keep the catalog in sync with disk", long_about = None)]
struct Cli {
    /// Catalog database (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (default: ./codex.toml when present)
    #[arg(long, global = true, env = "CODEX_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write codex.toml and create the catalog database
    Init,

    /// Index a directory tree
    Index {
        /// Directory to scan (default: configured repository)
        dir: Option<PathBuf>,
        /// Assign every file to this project instead of deriving one
        #[arg(long)]
        project: Option<i64>,
    },

    /// Index, then deactivate records whose files are gone
    SmartReindex {
        dir: Option<PathBuf>,
        #[arg(long)]
        project: Option<i64>,
    },

    /// Report differences between the catalog and the filesystem
    Analyze { dir: Option<PathBuf> },

    /// Repair differences between the catalog and the filesystem
    Fix {
        dir: Option<PathBuf>,
        /// Apply without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show catalog totals
    Stats,

    /// Search active files by filename, description or tag
    Search {
        query: String,
        /// Project name filter
        #[arg(short, long)]
        project: Option<String>,
        /// Extension filter, e.g. ".py"
        #[arg(short = 't', long)]
        filetype: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
    },

    /// List projects
    Projects,

    /// Create a project
    ProjectAdd {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List tags
    Tags,

    /// Create a tag
    TagAdd {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Mark a file record inactive
    Deactivate { id: i64 },

    /// Delete every inactive file record
    PurgeInactive {
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(&cli);

    if let Err(e) = result {
        if cli.json {
            let error_json = serde_json::json!({
                "code": e.code(),
                "message": e.to_string(),
                "hint": "",
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error_json).unwrap_or_default()
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> codex_core::Result<()> {
    let config = Config::resolve(cli.config.as_deref())?;

    if let Commands::Init = cli.command {
        return cmd_init(cli, config);
    }

    let mut catalog = open_catalog(cli, config)?;
    let json = cli.json;

    match &cli.command {
        Commands::Init => Ok(()),
        Commands::Index { dir, project } => {
            let root = scan_root(&catalog, dir.as_deref());
            let report = catalog.index_directory(&root, *project)?;
            print_index_report("Indexed", &report, json)
        }
        Commands::SmartReindex { dir, project } => {
            let root = scan_root(&catalog, dir.as_deref());
            let report = catalog.smart_reindex(&root, *project)?;
            print_index_report("Reindexed", &report, json)
        }
        Commands::Analyze { dir } => {
            let root = scan_root(&catalog, dir.as_deref());
            let analysis = catalog.analyze(&root)?;
            print_analysis(&analysis, json)
        }
        Commands::Fix { dir, yes } => cmd_fix(&mut catalog, dir.as_deref(), *yes, json),
        Commands::Stats => cmd_stats(&catalog, json),
        Commands::Search {
            query,
            project,
            filetype,
            page,
            per_page,
        } => {
            let page = catalog.search(&SearchQuery {
                text: query.clone(),
                project: project.clone(),
                filetype: filetype.clone(),
                page: Some(*page),
                per_page: *per_page,
            })?;
            print_search(&page, json)
        }
        Commands::Projects => cmd_projects(&catalog, json),
        Commands::ProjectAdd { name, description } => {
            let project = catalog.create_project(name, description.as_deref())?;
            print_created("project", &project, project.id, &project.name, json)
        }
        Commands::Tags => cmd_tags(&catalog, json),
        Commands::TagAdd { name, description } => {
            let tag = catalog.create_tag(name, description.as_deref())?;
            print_created("tag", &tag, tag.id, &tag.name, json)
        }
        Commands::Deactivate { id } => {
            use colored::Colorize;

            let record = catalog.deactivate_file(*id)?;
            if json {
                print_json(&record)?;
            } else {
                println!("{}: {} (ID: {})", "Deactivated".yellow(), record.path, record.id);
            }
            Ok(())
        }
        Commands::PurgeInactive { yes } => cmd_purge(&mut catalog, *yes, json),
    }
}

fn open_catalog(cli: &Cli, config: Config) -> codex_core::Result<Catalog> {
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.catalog.database.clone());
    Catalog::open(&db_path, config)
}

fn scan_root(catalog: &Catalog, dir: Option<&Path>) -> PathBuf {
    dir.map(Path::to_path_buf)
        .unwrap_or_else(|| catalog.config().catalog.repository.clone())
}

fn print_json<T: serde::Serialize>(value: &T) -> codex_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ask on stderr, read a y/N answer from stdin
fn confirm(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn cmd_init(cli: &Cli, config: Config) -> codex_core::Result<()> {
    use colored::Colorize;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(codex_core::config::CONFIG_FILE_NAME));
    match Config::write_default(&config_path) {
        Ok(()) => println!("{} {}", "Created".green(), config_path.display()),
        Err(CodexError::ConfigExists(path)) => {
            println!("{} {}", "Exists".yellow(), path.display())
        }
        Err(e) => return Err(e),
    }

    let catalog = open_catalog(cli, config)?;
    if let Some(db) = catalog.db_path() {
        println!("{} {}", "Catalog".green(), db.display());
    }
    Ok(())
}

fn print_index_report(label: &str, report: &IndexReport, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    if json {
        return print_json(report);
    }

    println!("{}: {} new files", label.green(), report.files_indexed);
    println!("{}: {} files", "Updated".blue(), report.files_updated);
    println!(
        "{}: {} files",
        "Reactivated".cyan(),
        report.ghost_files_reactivated
    );
    println!("{}: {} files", "Unchanged".blue(), report.files_unchanged);
    println!("{}: {} files", "Skipped".yellow(), report.files_skipped);
    if report.files_deactivated > 0 {
        println!(
            "{}: {} files",
            "Deactivated".yellow(),
            report.files_deactivated
        );
    }
    print_errors(&report.errors);
    Ok(())
}

fn print_errors(errors: &[String]) {
    use colored::Colorize;

    if errors.is_empty() {
        return;
    }
    println!("{}: {}", "Errors".red(), errors.len());
    for error in errors.iter().take(MAX_ERRORS_SHOWN) {
        println!("  {}", error);
    }
    if errors.len() > MAX_ERRORS_SHOWN {
        println!("  ... and {} more", errors.len() - MAX_ERRORS_SHOWN);
    }
}

fn print_analysis(analysis: &ReconcileAnalysis, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    if json {
        return print_json(analysis);
    }

    println!("{}: {}", "Root".blue(), analysis.root);
    println!(
        "{}: {} files on disk, {} records",
        "Scanned".blue(),
        analysis.files_on_disk,
        analysis.records_in_db
    );

    if analysis.is_clean() {
        println!("{}: catalog matches disk", "Clean".green());
    } else {
        for issue in &analysis.issues {
            let label = match issue.kind {
                IssueKind::OrphanedDbRecord | IssueKind::DuplicateRecord => {
                    issue.kind.to_string().red()
                }
                IssueKind::GhostFile | IssueKind::HashMismatch => issue.kind.to_string().yellow(),
                IssueKind::OrphanedDiskFile => issue.kind.to_string().cyan(),
            };
            match issue.record_id {
                Some(id) => println!("{}: {} (ID: {})", label, issue.path, id),
                None => println!("{}: {}", label, issue.path),
            }
        }
        println!(
            "{}: {} issues ({} fixable)",
            "Found".yellow(),
            analysis.total_issues(),
            analysis.fixable_issues()
        );
    }
    print_errors(&analysis.errors);
    Ok(())
}

fn cmd_fix(catalog: &mut Catalog, dir: Option<&Path>, yes: bool, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    let root = scan_root(catalog, dir);
    let analysis = catalog.analyze(&root)?;

    if analysis.fixable_issues() == 0 {
        if json {
            return print_json(&analysis);
        }
        return print_analysis(&analysis, false);
    }

    if !json {
        print_analysis(&analysis, false)?;
    }

    let approved = yes
        || catalog.config().reconcile.auto_fix
        || confirm(&format!("Apply {} fixes?", analysis.fixable_issues()));
    if !approved {
        if !json {
            println!("{}: no changes made", "Aborted".yellow());
        }
        return Ok(());
    }

    let report = catalog.fix(&root)?;
    if json {
        return print_json(&report);
    }

    println!("{}: {} ghosts", "Reactivated".green(), report.ghosts_reactivated);
    println!("{}: {} orphaned records", "Removed".green(), report.orphans_removed);
    println!("{}: {} duplicates", "Removed".green(), report.duplicates_removed);
    println!("{}: {} hashes", "Refreshed".green(), report.hashes_refreshed);
    if report.orphaned_disk_files > 0 {
        println!(
            "{}: {} unrecorded files (run smart-reindex to add them)",
            "Note".cyan(),
            report.orphaned_disk_files
        );
    }
    Ok(())
}

fn cmd_stats(catalog: &Catalog, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    let stats = catalog.stats()?;
    if json {
        return print_json(&stats);
    }

    println!("{}: {}", "Projects".blue(), stats.projects);
    println!("{}: {}", "Tags".blue(), stats.tags);
    println!(
        "{}: {} ({} active, {} inactive)",
        "Files".blue(),
        stats.files_total,
        stats.files_active,
        stats.files_inactive
    );
    println!(
        "{}: {:.1} MB",
        "Size".blue(),
        stats.total_size as f64 / (1024.0 * 1024.0)
    );
    for (filetype, count) in &stats.by_type {
        let label: &str = if filetype.is_empty() { "(none)" } else { filetype };
        println!("  {:<12} {}", label, count);
    }
    if let Some(last) = &stats.last_indexed {
        println!("{}: {}", "Last indexed".blue(), last);
    }
    Ok(())
}

fn print_search(page: &codex_core::SearchPage, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    if json {
        return print_json(page);
    }

    for hit in &page.results {
        let project = hit.project.as_deref().unwrap_or("-");
        println!(
            "{}: {} [{}] {}",
            hit.id.to_string().cyan(),
            hit.path,
            project,
            hit.tags.join(", ")
        );
    }
    println!(
        "{}: {} matches (page {} of {})",
        "Found".green(),
        page.total,
        page.page,
        page.pages.max(1)
    );
    Ok(())
}

fn cmd_projects(catalog: &Catalog, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    let projects = catalog.list_projects()?;
    if json {
        return print_json(&projects);
    }
    for project in &projects {
        println!(
            "{}: {} {}",
            project.id.to_string().cyan(),
            project.name,
            project.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_tags(catalog: &Catalog, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    let tags = catalog.list_tags()?;
    if json {
        return print_json(&tags);
    }
    for tag in &tags {
        println!("{}: {}", tag.id.to_string().cyan(), tag.name);
    }
    Ok(())
}

fn print_created<T: serde::Serialize>(
    kind: &str,
    value: &T,
    id: i64,
    name: &str,
    json: bool,
) -> codex_core::Result<()> {
    use colored::Colorize;

    if json {
        return print_json(value);
    }
    println!("{} {} '{}' (ID: {})", "Created".green(), kind, name, id);
    Ok(())
}

fn cmd_purge(catalog: &mut Catalog, yes: bool, json: bool) -> codex_core::Result<()> {
    use colored::Colorize;

    let inactive = catalog.stats()?.files_inactive;
    if inactive == 0 {
        if json {
            return print_json(&serde_json::json!({ "removed": 0 }));
        }
        println!("{}: no inactive records", "Clean".green());
        return Ok(());
    }

    if !yes && !confirm(&format!("Permanently delete {} inactive records?", inactive)) {
        if !json {
            println!("{}: no changes made", "Aborted".yellow());
        }
        return Ok(());
    }

    let removed = catalog.purge_inactive()?;
    if json {
        print_json(&serde_json::json!({ "removed": removed }))
    } else {
        println!("{}: {} inactive records", "Purged".green(), removed);
        Ok(())
    }
}
