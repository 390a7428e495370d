//! topicgraph CLI: file links under a graph of topics and search them.
//!
//! Usage:
//!   topicgraph repo <create|list> [--db path]
//!   topicgraph topic <subcommand> [--repo id] [--db path]
//!   topicgraph link <subcommand> [--repo id] [--db path]
//!   topicgraph search <query>... [--from topic] [--budget n] [--repo id]
//!   topicgraph index rebuild [--repo id]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use topicgraph::{
    query, Alert, AlertKind, EngineConfig, GraphError, LinkId, OpenStore, QuerySpec, RepositoryId,
    SqliteStore, Synonym, Topic, TopicGraph, TopicId,
};

#[derive(Parser)]
#[command(
    name = "topicgraph",
    version,
    about = "Organize links under a graph of topics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Repository ID (defaults to the only repository, if there is one)
    #[arg(long, global = true)]
    repo: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage repositories
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
    /// Manage topics
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },
    /// Manage links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },
    /// Search topics and links under a topic
    Search {
        /// Query words; `in:/topics/<id>` narrows the scope
        #[arg(required = true)]
        query: Vec<String>,
        /// Topic to search under (ID or name; defaults to the root)
        #[arg(long)]
        from: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
        budget: i64,
        /// Locale for display names
        #[arg(long)]
        locale: Option<String>,
    },
    /// Maintain the closure index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Create a repository with its root topic
    Create {
        name: String,
        #[arg(long)]
        owner: Option<String>,
    },
    /// List all repositories
    List,
}

#[derive(Subcommand)]
enum TopicAction {
    /// Create a topic, or report the existing one with that name
    Upsert {
        name: String,
        /// Parent topic (ID or name); repeatable
        #[arg(long = "parent")]
        parents: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// File a topic under another topic
    AddParent { topic: String, parent: String },
    /// Take a topic out from under another topic
    RemoveParent { topic: String, parent: String },
    /// Delete a topic
    Delete { topic: String },
    /// Show a topic with its parents, children and links
    Show {
        topic: String,
        #[arg(long)]
        locale: Option<String>,
    },
    /// Replace a topic's synonyms; each is `name` or `locale:name`
    Synonyms {
        topic: String,
        #[arg(required = true)]
        synonyms: Vec<String>,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Add a link, or update the existing one with the same URL
    Upsert {
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// Parent topic (ID or name); repeatable
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
    /// File a link under a topic
    AddParent { link: String, parent: String },
    /// Take a link out from under a topic
    RemoveParent { link: String, parent: String },
    /// Delete a link
    Delete { link: String },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Recompute the closure index from the edges
    Rebuild,
}

/// Get the default database path (~/.local/share/topicgraph/topicgraph.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("topicgraph").join("topicgraph.db")
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
}

fn open_graph(db: Option<PathBuf>, config: Option<&Path>) -> Result<TopicGraph, String> {
    let config = load_config(config)?;
    let db_path = db.unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(TopicGraph::with_config(Arc::new(store), config))
}

fn resolve_repo(graph: &TopicGraph, repo: Option<&str>) -> Result<RepositoryId, String> {
    if let Some(id) = repo {
        let id = RepositoryId::from(id);
        graph.repository(&id).map_err(|e| e.to_string())?;
        return Ok(id);
    }
    let mut repositories = graph.list_repositories().map_err(|e| e.to_string())?;
    match repositories.len() {
        1 => Ok(repositories.remove(0).id),
        0 => Err("no repositories; create one with `topicgraph repo create <name>`".into()),
        _ => Err("several repositories exist; pass --repo <id>".into()),
    }
}

/// Accept a topic ID or an exact synonym
fn resolve_topic(graph: &TopicGraph, repo: &RepositoryId, reference: &str) -> Result<Topic, String> {
    match graph.topic(repo, &TopicId::from(reference)) {
        Ok(topic) => return Ok(topic),
        Err(GraphError::TopicNotFound(_)) => {}
        Err(e) => return Err(e.to_string()),
    }
    graph
        .topic_named(repo, reference)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("topic '{}' not found", reference))
}

fn resolve_topics(graph: &TopicGraph, repo: &RepositoryId, references: &[String]) -> Result<Vec<TopicId>, String> {
    references
        .iter()
        .map(|r| resolve_topic(graph, repo, r).map(|t| t.id))
        .collect()
}

fn print_alerts(alerts: &[Alert]) {
    for alert in alerts {
        match alert.kind {
            AlertKind::Success => println!("{}", alert.text),
            AlertKind::Warn => eprintln!("Warning: {}", alert.text),
            AlertKind::Error => eprintln!("Error: {}", alert.text),
        }
    }
}

fn parse_synonym(raw: &str, default_locale: &str) -> Synonym {
    match raw.split_once(':') {
        Some((locale, name))
            if !locale.is_empty() && locale.len() <= 8 && locale.chars().all(|c| c.is_ascii_alphabetic() || c == '-') =>
        {
            Synonym::new(locale, name)
        }
        _ => Synonym::new(default_locale, raw),
    }
}

fn cmd_repo_create(graph: &TopicGraph, name: &str, owner: Option<&str>) -> Result<(), String> {
    let repository = graph.create_repository(name, owner).map_err(|e| e.to_string())?;
    println!(
        "Created repository '{}' ({}), root topic {}",
        name, repository.id, repository.root_topic_id
    );
    Ok(())
}

fn cmd_repo_list(graph: &TopicGraph) -> Result<(), String> {
    let repositories = graph.list_repositories().map_err(|e| e.to_string())?;
    if repositories.is_empty() {
        println!("No repositories defined.");
        return Ok(());
    }
    println!("{:<36}  {:<24}  {:<16}", "ID", "NAME", "OWNER");
    println!("{}", "-".repeat(80));
    for repository in repositories {
        println!(
            "{:<36}  {:<24}  {:<16}",
            repository.id,
            repository.name,
            repository.owner.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_topic(graph: &TopicGraph, repo: &RepositoryId, action: TopicAction) -> Result<(), String> {
    let locale = graph.config().default_locale.clone();
    match action {
        TopicAction::Upsert {
            name,
            parents,
            description,
        } => {
            let parents = resolve_topics(graph, repo, &parents)?;
            let result = graph
                .upsert_topic(repo, &name, &parents, description.as_deref())
                .map_err(|e| e.to_string())?;
            print_alerts(&result.alerts);
            println!("{}", result.topic.id);
        }
        TopicAction::AddParent { topic, parent } => {
            let topic = resolve_topic(graph, repo, &topic)?;
            let parent = resolve_topic(graph, repo, &parent)?;
            let added = graph
                .add_parent_topic(repo, &topic.id, &parent.id)
                .map_err(|e| e.to_string())?;
            if added {
                println!("Filed '{}' under '{}'", topic.display_name(&locale), parent.display_name(&locale));
            } else {
                println!("'{}' is already under '{}'", topic.display_name(&locale), parent.display_name(&locale));
            }
        }
        TopicAction::RemoveParent { topic, parent } => {
            let topic = resolve_topic(graph, repo, &topic)?;
            let parent = resolve_topic(graph, repo, &parent)?;
            graph
                .remove_parent_topic(repo, &topic.id, &parent.id)
                .map_err(|e| e.to_string())?;
            println!("Removed '{}' from '{}'", topic.display_name(&locale), parent.display_name(&locale));
        }
        TopicAction::Delete { topic } => {
            let topic = resolve_topic(graph, repo, &topic)?;
            graph.delete_topic(repo, &topic.id).map_err(|e| e.to_string())?;
            println!("Deleted topic '{}'", topic.display_name(&locale));
        }
        TopicAction::Show { topic, locale: wanted } => {
            let locale = wanted.unwrap_or(locale);
            let topic = resolve_topic(graph, repo, &topic)?;
            let (name, found) = topic.resolve_display_name(&locale);
            println!("{}{}", name, if found { "" } else { " (no synonyms)" });
            println!("  id:     {}", topic.id);
            println!("  scope:  {}", query::scope_token(&topic.id));
            if let Some(description) = &topic.description {
                println!("  about:  {}", description);
            }
            for synonym in topic.synonyms.iter() {
                println!("  name:   [{}] {}", synonym.locale, synonym.name);
            }
            for parent in graph.parent_topics(repo, &topic.id).map_err(|e| e.to_string())? {
                println!("  parent: {} ({})", parent.display_name(&locale), parent.id);
            }
            for child in graph.child_topics(repo, &topic.id).map_err(|e| e.to_string())? {
                println!("  child:  {} ({})", child.display_name(&locale), child.id);
            }
            for link in graph.child_links(repo, &topic.id).map_err(|e| e.to_string())? {
                println!("  link:   {} <{}> ({})", link.title, link.url, link.id);
            }
        }
        TopicAction::Synonyms { topic, synonyms } => {
            let topic = resolve_topic(graph, repo, &topic)?;
            let synonyms = synonyms.iter().map(|s| parse_synonym(s, &locale)).collect();
            let topic = graph
                .update_synonyms(repo, &topic.id, synonyms)
                .map_err(|e| e.to_string())?;
            println!("Updated synonyms of '{}'", topic.display_name(&locale));
        }
    }
    Ok(())
}

fn cmd_link(graph: &TopicGraph, repo: &RepositoryId, action: LinkAction) -> Result<(), String> {
    match action {
        LinkAction::Upsert { url, title, parents } => {
            let parents = resolve_topics(graph, repo, &parents)?;
            let result = graph
                .upsert_link(repo, &url, title.as_deref(), &parents)
                .map_err(|e| e.to_string())?;
            print_alerts(&result.alerts);
            println!("{}", result.link.id);
        }
        LinkAction::AddParent { link, parent } => {
            let parent = resolve_topic(graph, repo, &parent)?;
            graph
                .add_link_parent_topic(repo, &LinkId::from(link.as_str()), &parent.id)
                .map_err(|e| e.to_string())?;
            println!("Filed link {} under '{}'", link, parent.display_name(&graph.config().default_locale));
        }
        LinkAction::RemoveParent { link, parent } => {
            let parent = resolve_topic(graph, repo, &parent)?;
            graph
                .remove_link_parent_topic(repo, &LinkId::from(link.as_str()), &parent.id)
                .map_err(|e| e.to_string())?;
            println!("Removed link {} from '{}'", link, parent.display_name(&graph.config().default_locale));
        }
        LinkAction::Delete { link } => {
            graph
                .delete_link(repo, &LinkId::from(link.as_str()))
                .map_err(|e| e.to_string())?;
            println!("Deleted link {}", link);
        }
    }
    Ok(())
}

fn cmd_search(
    graph: &TopicGraph,
    repo: &RepositoryId,
    words: &[String],
    from: Option<&str>,
    budget: i64,
    locale: Option<&str>,
) -> Result<(), String> {
    let base = match from {
        Some(reference) => resolve_topic(graph, repo, reference)?.id,
        None => graph.repository(repo).map_err(|e| e.to_string())?.root_topic_id,
    };
    let locale = locale.unwrap_or(graph.config().default_locale.as_str()).to_string();
    let spec = QuerySpec::parse(&words.join(" "));
    let results = graph
        .search_in_locale(repo, &spec, &base, budget, &locale)
        .map_err(|e| e.to_string())?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for topic in &results.topics {
        println!("topic  {:<40}  {}", topic.display_name(&locale), topic.id);
    }
    for link in &results.links {
        println!("link   {:<40}  {}", link.title, link.url);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    let graph = open_graph(cli.db, cli.config.as_deref())?;
    match cli.command {
        Commands::Repo { action } => match action {
            RepoAction::Create { name, owner } => cmd_repo_create(&graph, &name, owner.as_deref()),
            RepoAction::List => cmd_repo_list(&graph),
        },
        Commands::Topic { action } => {
            let repo = resolve_repo(&graph, cli.repo.as_deref())?;
            cmd_topic(&graph, &repo, action)
        }
        Commands::Link { action } => {
            let repo = resolve_repo(&graph, cli.repo.as_deref())?;
            cmd_link(&graph, &repo, action)
        }
        Commands::Search {
            query,
            from,
            budget,
            locale,
        } => {
            let repo = resolve_repo(&graph, cli.repo.as_deref())?;
            cmd_search(&graph, &repo, &query, from.as_deref(), budget, locale.as_deref())
        }
        Commands::Index {
            action: IndexAction::Rebuild,
        } => {
            let repo = resolve_repo(&graph, cli.repo.as_deref())?;
            let stats = graph.rebuild_index(&repo).map_err(|e| e.to_string())?;
            println!(
                "Rebuilt index: {} topics, {} topic rows, {} link rows",
                stats.topics, stats.topic_rows, stats.link_rows
            );
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    std::process::exit(code);
}
