//! 命令行入口

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use tokio::task::LocalSet;

use wordmark::config::{load_engine_config, ConfigManager};
use wordmark::env::{core::LogLevel, EnvVar};
use wordmark::services::{
    Background, LogNotifier, MemoryStore, OfflineLookup, RemoteLookup, DEFAULT_REVIEW_LIMIT,
};
use wordmark::{
    html_to_dom, serialize_document, AnnotatorResult, Annotator, Collaborators, EngineConfig,
    StartOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "wordmark", version)]
#[command(about = "Mark known vocabulary in HTML documents and attach translations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate every known term in an HTML file
    Annotate {
        /// Input HTML file
        input: PathBuf,

        /// Write the annotated document here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Mark/dictionary store (JSON)
        #[arg(short, long, value_name = "FILE")]
        store: Option<PathBuf>,

        /// Host name the document was loaded from, checked against excluded domains
        #[arg(long)]
        host: Option<String>,

        /// Document charset
        #[arg(short, long, default_value = "utf-8")]
        encoding: String,

        /// Never contact the translation service
        #[arg(long)]
        offline: bool,

        /// Configuration file (TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<String>,
    },
    /// List dictionary words that are due for review
    Review {
        #[arg(short, long, value_name = "FILE")]
        store: PathBuf,

        #[arg(short, long, default_value_t = DEFAULT_REVIEW_LIMIT)]
        limit: usize,
    },
    /// Write an example configuration file
    InitConfig {
        path: String,
    },
}

fn main() {
    setup_tracing();

    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = LogLevel::get_or_default("warn".to_string());
        EnvFilter::new(format!("wordmark={}", level))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> AnnotatorResult<()> {
    match cli.command {
        Command::Annotate {
            input,
            output,
            store,
            host,
            encoding,
            offline,
            config,
        } => {
            let config = match config {
                Some(path) => ConfigManager::from_path(&path)?.into_config(),
                None => load_engine_config(),
            };
            let request = AnnotateRequest {
                input,
                output,
                store,
                host,
                encoding,
            };

            if offline {
                block_on_local(annotate(request, config, OfflineLookup))
            } else {
                annotate_online(request, config)
            }
        }
        Command::Review { store, limit } => {
            let store = MemoryStore::load_from_path(&store)?;
            let mut stdout = io::stdout().lock();
            for entry in store.review_candidates(limit) {
                writeln!(
                    stdout,
                    "{}\t{}\t{}",
                    entry.word, entry.translation, entry.reviewed
                )?;
            }
            Ok(())
        }
        Command::InitConfig { path } => {
            ConfigManager::generate_example_config(&path)?;
            eprintln!("已生成示例配置: {}", path);
            Ok(())
        }
    }
}

struct AnnotateRequest {
    input: PathBuf,
    output: Option<PathBuf>,
    store: Option<PathBuf>,
    host: Option<String>,
    encoding: String,
}

#[cfg(feature = "remote")]
fn annotate_online(request: AnnotateRequest, config: EngineConfig) -> AnnotatorResult<()> {
    let remote = wordmark::services::HttpLookup::from_config(&config)?;
    block_on_local(annotate(request, config, remote))
}

#[cfg(not(feature = "remote"))]
fn annotate_online(request: AnnotateRequest, config: EngineConfig) -> AnnotatorResult<()> {
    tracing::warn!("未启用 remote 特性，使用离线模式");
    block_on_local(annotate(request, config, OfflineLookup))
}

fn block_on_local<F>(future: F) -> AnnotatorResult<()>
where
    F: std::future::Future<Output = AnnotatorResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    LocalSet::new().block_on(&runtime, future)
}

async fn annotate<R: RemoteLookup + 'static>(
    request: AnnotateRequest,
    config: EngineConfig,
    remote: R,
) -> AnnotatorResult<()> {
    let data = fs::read(&request.input)?;
    let dom = html_to_dom(&data, &request.encoding)?;

    let store = Rc::new(match &request.store {
        Some(path) => MemoryStore::load_from_path(path)?,
        None => MemoryStore::new(),
    });
    let notifier = Rc::new(LogNotifier);
    let background = Background::new(remote, Rc::clone(&store), notifier.clone());

    let annotator = Annotator::new(
        dom.document.clone(),
        config,
        Collaborators {
            translator: Rc::new(background),
            store: store.clone(),
            notifier,
        },
    );

    match annotator.start(request.host.as_deref()).await? {
        StartOutcome::Excluded { host } => {
            tracing::warn!("{} 在排除列表中，输出原文档", host);
        }
        StartOutcome::Started(report) => {
            eprintln!(
                "标记了 {} 处（扫描 {} 个文本节点）",
                report.marks_created.len(),
                report.nodes_visited
            );
        }
    }

    let result = serialize_document(&dom.document, &request.encoding)?;
    match &request.output {
        Some(path) => fs::write(path, result)?,
        None => io::stdout().lock().write_all(&result)?,
    }
    Ok(())
}
