//! `remote-browser`: lists a folder of a remote file server from the command line.
//!
//! Drives the same controller a UI would: the listing streams in batches, further pages
//! are loaded on demand, and thumbnails are prefetched with bounded concurrency.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use remote_browser::browser::{NoActions, SearchFilter, ServerActions, ViewItem, normalize_path};
use remote_browser::{
    BrowserConfig, EntryKind, FileActionSink, FileServer, FolderController, InMemoryServer, ServerClient, SessionState,
    SortField, ViewMode,
};

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Date,
    Size,
    Type,
}

impl From<SortArg> for SortField {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => Self::Name,
            SortArg::Date => Self::Date,
            SortArg::Size => Self::Size,
            SortArg::Type => Self::Type,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    File,
    Dir,
}

#[derive(Debug, Parser)]
#[command(name = "remote-browser")]
#[command(about = "List a folder of a remote file server", version)]
struct Cli {
    /// Folder to list
    #[arg(value_name = "PATH", default_value = "/")]
    path: String,
    /// Server base URL (overrides SERVER_URL and the settings file)
    #[arg(long, value_name = "URL")]
    server: Option<String>,
    /// Bearer token
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,
    /// Keep loading pages until the folder is exhausted
    #[arg(long)]
    all: bool,
    #[arg(long, value_enum)]
    sort: Option<SortArg>,
    /// Sort descending
    #[arg(long)]
    desc: bool,
    /// Search the folder by name instead of listing it
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,
    /// Only show files or folders (implies a search)
    #[arg(long = "type", value_enum)]
    kind: Option<KindArg>,
    /// Prefetch thumbnails for the listed files
    #[arg(long)]
    thumbnails: bool,
    /// Browse a generated in-memory folder of COUNT images instead of a server
    #[arg(long, value_name = "COUNT")]
    demo: Option<usize>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(message) = run(cli) {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Couldn't start the runtime: {e}"))?;

    let mut config = BrowserConfig::from_env();
    if let Some(server) = cli.server.clone() {
        config.server_url = server;
    }
    if let Some(token) = cli.token.clone() {
        config.token = Some(token);
    }

    let (server, actions): (Arc<dyn FileServer>, Box<dyn FileActionSink>) = match cli.demo {
        Some(count) => {
            let demo = InMemoryServer::with_file_count(&normalize_path(&cli.path), count);
            (Arc::new(demo), Box::new(NoActions))
        }
        None => {
            let client = ServerClient::new(&config.server_url, config.token.clone()).map_err(|e| e.to_string())?;
            let actions = ServerActions::new(client.clone(), runtime.handle().clone());
            (Arc::new(client), Box::new(actions))
        }
    };
    log::debug!("browsing {} on {}", cli.path, config.server_url);

    let mut controller = FolderController::new(server, runtime.handle().clone(), config, actions);
    if cli.thumbnails {
        // Before anything is loaded this only switches the mode
        controller.set_view_mode(ViewMode::Thumbnails);
    }
    controller.load_path(&cli.path);
    wait(&mut controller)?;

    if cli.all {
        while controller.load_more() {
            wait(&mut controller)?;
        }
    }

    let filter = SearchFilter {
        query: cli.search.clone(),
        kind: cli.kind.map(|kind| match kind {
            KindArg::File => EntryKind::File,
            KindArg::Dir => EntryKind::Directory,
        }),
        ..SearchFilter::default()
    };
    if !filter.is_empty() {
        controller.apply_filter(filter);
        wait(&mut controller)?;
    }

    if let Some(sort) = cli.sort {
        controller.set_sort(sort.into(), !cli.desc);
    } else if cli.desc {
        let field = controller.sort().field;
        controller.set_sort(field, false);
    }

    if cli.thumbnails && !controller.wait_for_thumbnails(THUMBNAIL_TIMEOUT) {
        log::warn!("Gave up waiting for thumbnails");
    }

    for item in controller.items() {
        println!("{}", describe(item));
    }
    print_summary(&controller);

    let failed = controller.state() == SessionState::Errored;
    controller.shutdown();
    if failed {
        return Err(controller
            .status_text()
            .map(str::to_string)
            .unwrap_or_else(|| String::from("Listing failed")));
    }
    Ok(())
}

fn wait(controller: &mut FolderController) -> Result<(), String> {
    if controller.wait_until_idle(LOAD_TIMEOUT) {
        Ok(())
    } else {
        Err(format!("Timed out loading {}", controller.current_path()))
    }
}

fn describe(item: &ViewItem) -> String {
    let entry = &item.entry;
    let size = match (entry.is_directory(), entry.size) {
        (true, _) => String::from("<dir>"),
        (false, Some(size)) => size.to_string(),
        (false, None) => String::from("-"),
    };
    let thumbnail = item
        .thumbnail
        .as_ref()
        .map(|image| format!("  [{}x{}]", image.width(), image.height()))
        .unwrap_or_default();
    format!("{size:>12}  {}{thumbnail}", entry.path)
}

fn print_summary(controller: &FolderController) {
    let items = controller.items();
    let folders = items.iter().filter(|item| item.entry.is_directory()).count();
    println!();
    println!(
        "{}: {} entries ({folders} folders, {} files){}",
        controller.current_path(),
        items.len(),
        items.len() - folders,
        if controller.has_more() { ", more available" } else { "" }
    );
    if let Some(status) = controller.status_text() {
        println!("{status}");
    }
    if controller.view_mode() == ViewMode::Thumbnails {
        let stats = controller.thumbnail_stats();
        println!(
            "thumbnails: {} fetched, {} failed, {} cache hits",
            stats.completed, stats.failed, stats.cache_hits
        );
    }
}
