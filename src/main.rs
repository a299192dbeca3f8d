// Company Registry CLI
// Import company CSV files and query the store from the terminal

use anyhow::{bail, Context, Result};
use company_registry::{
    import_from_file, init_logging, CompanySearch, Page, Company, RecordStore, RegistryConfig,
    SqliteStore, SuggestionAggregator,
};
use std::env;
use std::path::PathBuf;
use tracing::Level;

const USAGE: &str = "Usage: company-registry [--db <path>] [-v] <command>

Commands:
  import <file.csv> [--buffer N]   Import a ';'-separated company file
  suggest <query>                  Autocomplete suggestions
  search <query> [page]            Search companies by name, city or CoC number
  list [page]                      List all companies
  count                            Number of stored companies
  clear                            Delete all companies";

/// Command line after global flags have been taken out
struct Cli {
    database_path: Option<PathBuf>,
    buffer_threshold: Option<usize>,
    verbose: bool,
    args: Vec<String>,
}

impl Cli {
    fn parse(raw: impl Iterator<Item = String>) -> Result<Self> {
        let mut cli = Cli {
            database_path: None,
            buffer_threshold: None,
            verbose: false,
            args: Vec::new(),
        };

        let mut raw = raw;
        while let Some(arg) = raw.next() {
            match arg.as_str() {
                "--db" => {
                    let path = raw.next().context("--db needs a path")?;
                    cli.database_path = Some(PathBuf::from(path));
                }
                "--buffer" => {
                    let value = raw.next().context("--buffer needs a number")?;
                    let threshold = value
                        .parse::<usize>()
                        .with_context(|| format!("Invalid buffer size: {}", value))?;
                    if threshold == 0 {
                        bail!("--buffer must be at least 1");
                    }
                    cli.buffer_threshold = Some(threshold);
                }
                "-v" | "--verbose" => cli.verbose = true,
                _ => cli.args.push(arg),
            }
        }

        Ok(cli)
    }

    fn page_arg(&self, index: usize) -> Result<usize> {
        match self.args.get(index) {
            Some(page) => page
                .parse()
                .with_context(|| format!("Invalid page number: {}", page)),
            None => Ok(1),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse(env::args().skip(1))?;

    init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO })?;

    let mut config = RegistryConfig::load().context("Failed to load configuration")?;
    config.apply_overrides(cli.database_path.clone());

    let Some(command) = cli.args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let store = SqliteStore::open(&config.database_path, config.import.created_at_policy)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    match command.as_str() {
        "import" => run_import(&cli, &config, &store),
        "suggest" => run_suggest(&cli, &config, &store),
        "search" => run_search(&cli, &config, &store),
        "list" => {
            let page = CompanySearch::new(&store, config.search).list(cli.page_arg(1)?, None)?;
            print_page(&page);
            Ok(())
        }
        "count" => {
            println!("{}", store.count_all()?);
            Ok(())
        }
        "clear" => {
            let deleted = store.delete_all()?;
            println!("✓ All company data has been cleared ({} removed).", deleted);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

fn run_import(cli: &Cli, config: &RegistryConfig, store: &SqliteStore) -> Result<()> {
    let path = cli.args.get(1).context("import needs a CSV file path")?;

    let mut options = config.import.options();
    if let Some(threshold) = cli.buffer_threshold {
        options = options.with_buffer_threshold(threshold);
    }

    println!("📂 Importing {} ...", path);
    let result = import_from_file(store, path, options);

    match result.error_message() {
        None => {
            println!("✓ {}", result.success_message());
            println!("✓ Database contains {} companies", store.count_all()?);
            Ok(())
        }
        Some(message) => bail!(message),
    }
}

fn run_suggest(cli: &Cli, config: &RegistryConfig, store: &SqliteStore) -> Result<()> {
    let query = cli.args.get(1).map(String::as_str);
    let suggestions = SuggestionAggregator::new(store, config.search).suggest(query)?;

    if suggestions.is_empty() {
        println!("No suggestions.");
    }
    for suggestion in suggestions {
        println!("{:<14} {}", suggestion.kind.label(), suggestion.text);
    }
    Ok(())
}

fn run_search(cli: &Cli, config: &RegistryConfig, store: &SqliteStore) -> Result<()> {
    let query = cli.args.get(1).map(String::as_str);
    let page = CompanySearch::new(store, config.search).search(query, cli.page_arg(2)?, None)?;
    print_page(&page);
    Ok(())
}

fn print_page(page: &Page<Company>) {
    for company in &page.items {
        println!(
            "{:<12} {:<40} {}",
            company.key,
            company.name_or_empty(),
            company.locality_or_empty()
        );
    }
    println!(
        "Page {} of {} ({} companies)",
        page.page,
        page.total_pages().max(1),
        page.total_count
    );
}
