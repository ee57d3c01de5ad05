use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use photocat::config::Config;
use photocat::db::{Column, Database, PhotoQuery, PhotoUpdate};
use photocat::export::{self, ExportFormat};
use photocat::logging::{self, LogTarget};
use photocat::scanner::Importer;

#[derive(Debug, PartialEq)]
enum Command {
    Init,
    Import { directory: PathBuf, prune: bool },
    Add { file: PathBuf, title: Option<String> },
    Show { id: i64 },
    List { query: PhotoQuery },
    Set { id: i64, assignments: Vec<(Column, String)> },
    Remove { id: i64 },
    Export { path: PathBuf, format: Option<ExportFormat> },
    Migrate { url: String },
}

#[derive(Debug, PartialEq)]
struct Cli {
    config_path: Option<PathBuf>,
    verbose: bool,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut config_path = None;
    let mut verbose = false;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photocat {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                let path = args.get(i + 1).context("--config requires a path argument")?;
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--verbose" | "-v" => verbose = true,
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let (name, rest) = rest.split_first().context("No command given, see --help")?;
    let command = parse_command(name, rest)?;

    Ok(Cli {
        config_path,
        verbose,
        command,
    })
}

fn parse_command(name: &str, args: &[String]) -> Result<Command> {
    let positional = |index: usize, what: &str| -> Result<String> {
        args.get(index)
            .cloned()
            .with_context(|| format!("`{}` requires {}", name, what))
    };
    let id = |index: usize| -> Result<i64> {
        let raw = positional(index, "a photo id")?;
        raw.parse().with_context(|| format!("Invalid photo id: {}", raw))
    };

    let command = match name {
        "init" => Command::Init,
        "import" => {
            let directory = PathBuf::from(positional(0, "a directory")?);
            let prune = match args.get(1).map(String::as_str) {
                Some("--prune") => true,
                Some(other) => bail!("Unknown argument: {}", other),
                None => false,
            };
            Command::Import { directory, prune }
        }
        "add" => {
            let file = PathBuf::from(positional(0, "a file")?);
            let title = match args.get(1).map(String::as_str) {
                Some("--title") => Some(positional(2, "a title after --title")?),
                Some(other) => bail!("Unknown argument: {}", other),
                None => None,
            };
            Command::Add { file, title }
        }
        "show" => Command::Show { id: id(0)? },
        "list" => {
            let mut query = PhotoQuery::default();
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--sort" => {
                        let columns = args.get(i + 1).context("--sort requires column names")?;
                        query.sort = columns
                            .split(',')
                            .map(|c| c.parse::<Column>())
                            .collect::<Result<Vec<_>, _>>()?;
                        i += 1;
                    }
                    "--reverse" => query.reverse = true,
                    "--limit" => {
                        let limit = args.get(i + 1).context("--limit requires a number")?;
                        query.limit = Some(limit.parse::<usize>().with_context(|| format!("Invalid limit: {}", limit))?);
                        i += 1;
                    }
                    other => bail!("Unknown argument: {}", other),
                }
                i += 1;
            }
            Command::List { query }
        }
        "set" => {
            let id = id(0)?;
            if args.len() < 2 {
                bail!("`set` requires at least one COLUMN=VALUE");
            }
            let assignments = args[1..]
                .iter()
                .map(|pair| -> Result<(Column, String)> {
                    let (column, value) = pair
                        .split_once('=')
                        .with_context(|| format!("Expected COLUMN=VALUE, got `{}`", pair))?;
                    Ok((column.parse::<Column>()?, value.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            Command::Set { id, assignments }
        }
        "remove" | "rm" => Command::Remove { id: id(0)? },
        "export" => {
            let path = PathBuf::from(positional(0, "an output path")?);
            let format = match args.get(1).map(String::as_str) {
                Some("--format") => Some(positional(2, "a format after --format")?.parse::<ExportFormat>()?),
                Some(other) => bail!("Unknown argument: {}", other),
                None => None,
            };
            Command::Export { path, format }
        }
        "migrate" => Command::Migrate {
            url: positional(0, "a PostgreSQL connection string")?,
        },
        other => bail!("Unknown command: {}", other),
    };
    Ok(command)
}

fn print_help() {
    println!(
        r#"photocat - photo metadata catalog

USAGE:
    photocat [OPTIONS] <COMMAND>

COMMANDS:
    init                            Create the photo table
    import <DIR> [--prune]          Import every image under DIR, update
                                    filenames of moved files, and with
                                    --prune drop photos no longer found
    add <FILE> [--title TITLE]      Import a single image
    show <ID>                       Print one photo as JSON
    list [--sort COL[,COL..]] [--reverse] [--limit N]
                                    Print photos as JSON lines
    set <ID> <COL>=<VALUE>...       Update fields ("null" clears nullable columns)
    remove <ID>                     Delete a photo
    export <PATH> [--format json|csv]
                                    Write all photos to a file
    migrate <POSTGRES_URL>          Copy the SQLite catalog to PostgreSQL

OPTIONS:
    --config, -c PATH   Path to config file
    --verbose, -v       Log to stderr
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOCAT_CONFIG     Path to config file (overrides default location)
    PHOTOCAT_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photocat/config.toml"#
    );
}

/// Stderr when verbose, otherwise journald or the default log directory.
fn log_target(verbose: bool) -> LogTarget {
    if verbose {
        LogTarget::Stderr
    } else {
        LogTarget::File(None)
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("Run `photocat --help` for usage.");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(log_target(cli.verbose)) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let config = match cli.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.database)?;
    db.initialize()?;

    run(cli.command, &config, &db)
}

fn run(command: Command, config: &Config, db: &Database) -> Result<()> {
    match command {
        Command::Init => {
            println!("Catalog ready ({} photos)", db.count_photos()?);
        }
        Command::Import { directory, prune } => {
            let result = Importer::new(&config.scanner)
                .with_prune(prune)
                .import_directory(&directory, db, None)?;
            println!(
                "{} found, {} imported, {} skipped, {} renamed, {} removed, {} failed",
                result.found,
                result.imported,
                result.skipped,
                result.renamed,
                result.removed,
                result.failed
            );
        }
        Command::Add { file, title } => {
            match Importer::new(&config.scanner).import_file(&file, db, title)? {
                Some(photo) => println!("{}", serde_json::to_string_pretty(&photo)?),
                None => println!("Already catalogued: {}", file.display()),
            }
        }
        Command::Show { id } => {
            let photo = db.get_photo(id)?.with_context(|| format!("No photo with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&photo)?);
        }
        Command::List { query } => {
            for photo in db.list_photos(&query)? {
                println!("{}", serde_json::to_string(&photo)?);
            }
        }
        Command::Set { id, assignments } => {
            let mut update = PhotoUpdate::default();
            for (column, value) in &assignments {
                update.set(*column, value)?;
            }
            let photo = db
                .update_photo(id, &update)?
                .with_context(|| format!("No photo with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&photo)?);
        }
        Command::Remove { id } => {
            if !db.remove_photo(id)? {
                bail!("No photo with id {}", id);
            }
            info!("Removed photo {}", id);
            println!("Removed photo {}", id);
        }
        Command::Export { mut path, format } => {
            let format = format.unwrap_or_else(|| ExportFormat::from_path(&path));
            if path.extension().is_none() {
                path.set_extension(format.extension());
            }
            let count = export::export_photos(db, &path, format)?;
            println!("Exported {} photos to {}", count, path.display());
        }
        Command::Migrate { url } => migrate(config, &url)?,
    }
    Ok(())
}

#[cfg(feature = "postgres")]
fn migrate(config: &Config, url: &str) -> Result<()> {
    let count = photocat::db::migrate::migrate_sqlite_to_postgres(&config.database.sqlite_path, url)?;
    println!("Migrated {} photos", count);
    Ok(())
}

#[cfg(not(feature = "postgres"))]
fn migrate(_config: &Config, _url: &str) -> Result<()> {
    bail!("photocat was built without the `postgres` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_list() {
        let cli = parse_args(&args("-c /tmp/c.toml list --sort date_taken,title --reverse --limit 3")).unwrap();
        assert_eq!(cli.config_path, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(
            cli.command,
            Command::List {
                query: PhotoQuery {
                    sort: vec![Column::DateTaken, Column::Title],
                    reverse: true,
                    limit: Some(3),
                }
            }
        );
    }

    #[test]
    fn test_parse_set() {
        let cli = parse_args(&args("set 7 title=Dunes width=null")).unwrap();
        assert_eq!(
            cli.command,
            Command::Set {
                id: 7,
                assignments: vec![
                    (Column::Title, "Dunes".to_string()),
                    (Column::Width, "null".to_string()),
                ],
            }
        );
        assert!(parse_args(&args("set 7 path=/x")).is_err());
        assert!(parse_args(&args("set 7")).is_err());
    }

    #[test]
    fn test_parse_import() {
        assert_eq!(
            parse_args(&args("import /photos")).unwrap().command,
            Command::Import {
                directory: PathBuf::from("/photos"),
                prune: false,
            }
        );
        assert_eq!(
            parse_args(&args("import /photos --prune")).unwrap().command,
            Command::Import {
                directory: PathBuf::from("/photos"),
                prune: true,
            }
        );
        assert!(parse_args(&args("import /photos --purge")).is_err());
    }

    #[test]
    fn test_log_target() {
        assert!(matches!(log_target(true), LogTarget::Stderr));
        // File logging uses the logging module's data-dir default
        assert!(matches!(log_target(false), LogTarget::File(None)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args("show abc")).is_err());
        assert!(parse_args(&args("frobnicate")).is_err());
        assert!(parse_args(&args("list --sort nonsense")).is_err());
    }

    #[test]
    fn test_run_set_and_remove() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let photo = db.insert_photo(&Default::default()).unwrap();
        let config = Config::default();

        run(
            Command::Set {
                id: photo.id,
                assignments: vec![(Column::Aperture, "f/1.4".to_string())],
            },
            &config,
            &db,
        )
        .unwrap();
        assert_eq!(db.get_photo(photo.id).unwrap().unwrap().aperture, "f/1.4");

        run(Command::Remove { id: photo.id }, &config, &db).unwrap();
        assert!(run(Command::Remove { id: photo.id }, &config, &db).is_err());
    }
}
