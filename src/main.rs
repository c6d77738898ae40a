//! Specguard CLI - Rule-driven API spec security scanner

use clap::{Parser, ValueEnum};
use colored::Colorize;
use specguard::config::{Config, OutputFormat};
use specguard::engine::Engine;
use specguard::output::{JsonFormatter, OutputFormatter, TextFormatter};
use specguard::rule::RuleFile;
use specguard::stats::SpecStats;
use specguard::SpecDocument;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specguard",
    version,
    about = "API spec security scanner",
    long_about = "Scans OpenAPI specification documents against declarative JSON rule files \
                  and reports security and design violations."
)]
struct Cli {
    /// Rule file (JSON)
    #[arg(short, long)]
    rules: PathBuf,

    /// Spec files to scan
    specs: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Disable parallel spec processing
    #[arg(long)]
    no_parallel: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value = "0")]
    jobs: usize,

    /// Disable specific rule sets (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// List rule sets from the rule file and exit
    #[arg(long)]
    list_rules: bool,

    /// Show per-spec summary statistics
    #[arg(long)]
    stats: bool,

    /// Show per-rule-set timing statistics
    #[arg(long)]
    timing: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Print one rule set in a consistent format
fn print_rule_set(rule_set: &specguard::RuleSet) {
    let severity = match rule_set.severity {
        specguard::Severity::Error => "error".red(),
        specguard::Severity::Warning => "warning".yellow(),
        specguard::Severity::Info => "info".blue(),
    };

    println!("  {} [{}]", rule_set.id.cyan(), severity);
    for rule in &rule_set.rules {
        println!(
            "      {} {} {}",
            rule.identifier,
            rule.operator,
            rule.expected
        );
    }
}

fn load_rule_file(path: &PathBuf) -> RuleFile {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        eprintln!(
            "{}: Rule file '{}' must be a .json file",
            "error".red().bold(),
            path.display()
        );
        std::process::exit(2);
    }

    let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!(
            "{}: Failed to read rule file '{}': {}",
            "error".red().bold(),
            path.display(),
            e
        );
        std::process::exit(2);
    });

    RuleFile::from_json_str(&content).unwrap_or_else(|e| {
        eprintln!(
            "{}: Invalid rule file '{}': {}",
            "error".red().bold(),
            path.display(),
            e
        );
        std::process::exit(2);
    })
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Handle --no-color
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path).unwrap_or_else(|e| {
            eprintln!("{}: Failed to load config: {}", "error".red().bold(), e);
            std::process::exit(1);
        })
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Merge CLI arguments
    let format = match cli.format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
    };
    config.merge_cli(Some(format), Some(cli.verbose), Some(cli.jobs), cli.disable);
    if cli.no_parallel {
        config.engine.parallel = false;
    }

    // Compile rules
    let rule_file = load_rule_file(&cli.rules);
    let output_format = config.output.format;
    let verbose = config.output.verbose;
    let mut engine = Engine::new(config);
    engine.load_rules(&rule_file);

    // Invalid rule sets are excluded but always reported
    for diag in engine.invalid_rule_sets() {
        eprintln!(
            "{}: rule set '{}' is invalid and was skipped: {}",
            "warning".yellow().bold(),
            diag.id,
            diag.error
        );
    }

    // Handle --list-rules
    if cli.list_rules {
        println!("{}", "Rule sets:".bold());
        println!();
        for rule_set in engine.rule_sets() {
            print_rule_set(rule_set);
        }
        return;
    }

    if cli.specs.is_empty() {
        eprintln!("{}: No spec files specified", "error".red().bold());
        eprintln!();
        eprintln!("Usage: specguard --rules <RULES> <SPECS>...");
        eprintln!();
        eprintln!("For more information, try '--help'");
        std::process::exit(2);
    }

    if verbose {
        eprintln!(
            "Scanning {} spec(s) with {} rule set(s)",
            cli.specs.len(),
            engine.rule_sets().len()
        );
    }

    let result = engine.scan(&cli.specs);

    // Handle --stats
    if cli.stats {
        for spec in &cli.specs {
            match SpecDocument::from_file(spec) {
                Ok(doc) => {
                    println!("{}", spec.display().to_string().bold());
                    print!("{}", SpecStats::collect(&doc));
                    println!();
                }
                Err(e) => eprintln!("{}: {}", "warning".yellow().bold(), e),
            }
        }
    }

    // Format output
    let formatter: Box<dyn OutputFormatter> = match output_format {
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
        OutputFormat::Text => {
            let text = TextFormatter::new();
            if cli.no_color {
                Box::new(text.without_color())
            } else {
                Box::new(text)
            }
        }
    };
    print!("{}", formatter.format(&result));

    // Handle --timing
    if cli.timing {
        println!();
        println!("{}", result.format_timings());
    }

    std::process::exit(result.exit_code());
}
