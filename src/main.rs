use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Attribute, Cell, Table};
use scholar_search::config::{load_config, Config, LogFormat};
use scholar_search::models::{Concept, PaperRecord, PdfLink, SearchRequest, SearchResult, SortBy};
use scholar_search::search::{ComparisonReport, SearchError, UnifiedSearch};
use scholar_search::sources::{SourceCapabilities, SourceRegistry};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scholar Search - Search arXiv, OpenAlex and Semantic Scholar through one interface
#[derive(Parser, Debug)]
#[command(name = "scholar-search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search academic papers across arXiv, OpenAlex and Semantic Scholar", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Upper bound in seconds for a whole fallback chain
    #[arg(long, global = true)]
    deadline: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

/// Sort field for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    /// Sort by relevance
    Relevance,
    /// Sort by publication date
    Date,
    /// Sort by citation count
    Citations,
}

impl From<SortField> for SortBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Relevance => SortBy::Relevance,
            SortField::Date => SortBy::Date,
            SortField::Citations => SortBy::CitationCount,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct QueryArgs {
    /// Search query string
    query: String,

    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Results per page
    #[arg(long, short = 'n', default_value_t = 10)]
    page_size: u32,

    /// Category/subject filter (e.g. cs.LG on arXiv)
    #[arg(long, short)]
    category: Option<String>,

    /// Earliest publication year
    #[arg(long)]
    year_from: Option<i32>,

    /// Latest publication year
    #[arg(long)]
    year_to: Option<i32>,

    /// Journal or conference
    #[arg(long)]
    venue: Option<String>,

    /// Sort by field
    #[arg(long, value_enum)]
    sort_by: Option<SortField>,

    /// Minimum citation count
    #[arg(long)]
    min_citations: Option<u32>,

    /// Only papers with an open access copy
    #[arg(long)]
    open_access: bool,
}

impl QueryArgs {
    fn to_request(&self) -> SearchRequest {
        let mut request = SearchRequest::new(self.query.clone())
            .page(self.page)
            .page_size(self.page_size)
            .years(self.year_from, self.year_to)
            .open_access_only(self.open_access);

        if let Some(category) = &self.category {
            request = request.category(category.clone());
        }
        if let Some(venue) = &self.venue {
            request = request.venue(venue.clone());
        }
        if let Some(sort) = self.sort_by {
            request = request.sort(sort.into());
        }
        if let Some(min) = self.min_citations {
            request = request.min_citations(min);
        }
        request
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for papers, falling back across sources
    #[command(alias = "s")]
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Source to try first (arxiv, openalex, semantic_scholar)
        #[arg(long, short)]
        source: Option<String>,

        /// Return an empty answer instead of trying the next source
        #[arg(long)]
        no_fallback_on_empty: bool,
    },

    /// Get paper metadata by identifier
    Get {
        /// arXiv id, OpenAlex work id, DOI or Semantic Scholar id
        id: String,

        /// Only ask this source
        #[arg(long, short)]
        source: Option<String>,
    },

    /// Resolve the PDF link of a paper
    Pdf {
        id: String,

        /// Only ask this source
        #[arg(long, short)]
        source: Option<String>,
    },

    /// Run one query against every source and compare the answers
    Compare {
        #[command(flatten)]
        query: QueryArgs,

        /// Papers shown per source
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Papers citing a paper
    Citations {
        id: String,

        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Papers related to a paper
    #[command(alias = "recommendations")]
    Recommend {
        id: String,

        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Most cited works
    TopCited {
        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,
    },

    /// Subject areas of the source taxonomy
    Concepts {
        #[arg(long, short, default_value_t = 25)]
        limit: usize,
    },

    /// List configured sources and their capabilities
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(deadline) = cli.deadline {
        config.search.deadline_secs = Some(deadline);
    }

    init_tracing(&cli, &config);

    let format = cli.output.resolve();
    let result = run(cli.command, config, format).await;

    // Machine-readable failure so callers can see which sources were tried
    if let (Err(err), OutputFormat::Json) = (&result, format) {
        if let Some(search_err) = err.downcast_ref::<SearchError>() {
            let body = serde_json::json!({
                "success": false,
                "error": search_err.to_string(),
                "report": search_err.report(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            std::process::exit(1);
        }
    }
    result
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("scholar_search={}", level)));
    let json = config.logging.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(command: Commands, mut config: Config, format: OutputFormat) -> Result<()> {
    if let Commands::Search {
        no_fallback_on_empty: true,
        ..
    } = command
    {
        config.search.fallback_on_empty = false;
    }

    let search = UnifiedSearch::from_config(&config).context("Failed to build sources")?;

    match command {
        Commands::Search { query, source, .. } => {
            let result = search.search(&query.to_request(), source.as_deref()).await?;
            output_result(&result, format)?;
        }
        Commands::Get { id, source } => {
            let paper = search.get_by_id(&id, source.as_deref()).await?;
            output_paper(&paper, format)?;
        }
        Commands::Pdf { id, source } => {
            let link = search.get_pdf_url(&id, source.as_deref()).await?;
            output_pdf(&link, format)?;
        }
        Commands::Compare { query, limit } => {
            let report = search.compare_sources(&query.to_request(), limit).await?;
            output_comparison(&report, format)?;
        }
        Commands::Citations { id, limit } => {
            let papers = search.citations(&id, limit).await?;
            output_papers(&papers, format)?;
        }
        Commands::Recommend { id, limit } => {
            let papers = search.recommendations(&id, limit).await?;
            output_papers(&papers, format)?;
        }
        Commands::TopCited { count } => {
            let papers = search.top_cited(count).await?;
            output_papers(&papers, format)?;
        }
        Commands::Concepts { limit } => {
            let concepts = search.concepts(limit).await?;
            output_concepts(&concepts, format)?;
        }
        Commands::Sources => output_sources(search.registry(), format)?,
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn papers_table(papers: &[PaperRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Title", "Authors", "Year", "Cited", "Source"]);

    for paper in papers {
        table.add_row(vec![
            Cell::new(&paper.id),
            Cell::new(truncate(&paper.title, 60)).add_attribute(Attribute::Bold),
            Cell::new(truncate(&paper.authors.join(", "), 30)),
            Cell::new(paper.published_year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(paper.citation_count.map(|c| c.to_string()).unwrap_or_default()),
            Cell::new(paper.source_name.as_deref().unwrap_or_default()),
        ]);
    }
    table
}

fn output_result(result: &SearchResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(result);
    }

    println!("{}", papers_table(&result.papers));
    println!(
        "Page {} of {} ({} matches) from {}",
        result.page,
        result.total_pages,
        result.total_matches,
        result.source_name.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn output_papers(papers: &[PaperRecord], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(papers);
    }

    println!("{}", papers_table(papers));
    Ok(())
}

fn output_paper(paper: &PaperRecord, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(paper);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    let rows = [
        ("ID", paper.id.clone()),
        ("Title", paper.title.clone()),
        ("Authors", paper.authors.join(", ")),
        ("Published", paper.published_date.clone().unwrap_or_default()),
        ("Categories", paper.categories.join(", ")),
        ("Venue", paper.venue.clone().unwrap_or_default()),
        ("DOI", paper.doi.clone().unwrap_or_default()),
        ("Citations", paper.citation_count.map(|c| c.to_string()).unwrap_or_default()),
        ("PDF", paper.pdf_url.clone().unwrap_or_default()),
        ("URL", paper.landing_url.clone()),
        ("Source", paper.source_name.clone().unwrap_or_default()),
        ("Abstract", truncate(&paper.abstract_text, 600)),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    println!("{table}");
    Ok(())
}

fn output_pdf(link: &PdfLink, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(link);
    }

    match &link.pdf_url {
        Some(url) => println!("{}", url),
        None => println!(
            "No PDF available for {} (landing page: {})",
            link.paper_id,
            link.landing_url.as_deref().unwrap_or("-")
        ),
    }
    Ok(())
}

fn output_comparison(report: &ComparisonReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    for entry in &report.sources {
        match &entry.error {
            Some(error) => println!("{}: failed ({})", entry.source, error),
            None => {
                println!("{}: {} matches", entry.source, entry.total);
                if !entry.papers.is_empty() {
                    println!("{}", papers_table(&entry.papers));
                }
            }
        }
    }
    Ok(())
}

fn output_concepts(concepts: &[Concept], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(concepts);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Level", "Works"]);
    for concept in concepts {
        table.add_row(vec![
            Cell::new(&concept.id),
            Cell::new(&concept.name).add_attribute(Attribute::Bold),
            Cell::new(concept.level),
            Cell::new(concept.works_count),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[derive(Serialize)]
struct SourceInfo<'a> {
    id: &'a str,
    name: &'a str,
    capabilities: Vec<&'static str>,
}

fn capability_names(caps: SourceCapabilities) -> Vec<&'static str> {
    [
        (SourceCapabilities::SEARCH, "search"),
        (SourceCapabilities::DETAILS, "details"),
        (SourceCapabilities::PDF_LINK, "pdf"),
        (SourceCapabilities::CITATIONS, "citations"),
        (SourceCapabilities::RECOMMENDATIONS, "recommendations"),
        (SourceCapabilities::TOP_CITED, "top_cited"),
        (SourceCapabilities::CONCEPTS, "concepts"),
    ]
    .into_iter()
    .filter(|(flag, _)| caps.contains(*flag))
    .map(|(_, name)| name)
    .collect()
}

fn output_sources(registry: &SourceRegistry, format: OutputFormat) -> Result<()> {
    let sources: Vec<_> = registry
        .all()
        .map(|s| SourceInfo {
            id: s.id(),
            name: s.name(),
            capabilities: capability_names(s.capabilities()),
        })
        .collect();

    if format == OutputFormat::Json {
        return print_json(&sources);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Order", "ID", "Name", "Capabilities"]);
    for (index, source) in sources.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(source.id).add_attribute(Attribute::Bold),
            Cell::new(source.name),
            Cell::new(source.capabilities.join(", ")),
        ]);
    }
    println!("{table}");
    Ok(())
}
