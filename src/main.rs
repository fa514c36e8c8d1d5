use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use libris::catalog::{cover_url, display_stars, BookSearchItem, CoverSize};
use libris::suggest::SuggestOutcome;
use libris::views::{favorites_view, read_view};
use libris::{App, Config, PagerStatus};

#[derive(Parser, Debug)]
#[command(name = "libris")]
#[command(about = "Browse Open Library and keep track of what you read")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/libris/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Session name; caches and navigation state are kept per session
  #[arg(short, long, global = true)]
  session: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Search the catalog
  Search {
    query: String,
    /// Show results up to this page
    #[arg(short, long, default_value_t = 1)]
    page: u32,
  },
  /// Suggestions for partial input
  Suggest { input: String },
  /// Works listed under a subject
  Subject {
    subject: String,
    #[arg(short, long)]
    limit: Option<u32>,
  },
  /// Every configured category
  Categories,
  /// Work details with rating summary
  Work { work_id: String },
  /// Author details
  Author { author_id: String },
  /// Manage favorites
  Favorites {
    #[command(subcommand)]
    action: ListAction,
  },
  /// Manage the read-list
  Read {
    #[command(subcommand)]
    action: ListAction,
  },
  /// Rate a read work, 0 clears
  Rate { work_id: String, rating: i64 },
  /// Set a note on a read work; no text clears it
  Note { work_id: String, text: Vec<String> },
  /// Past searches
  History {
    #[arg(long)]
    clear: bool,
  },
  /// Drop cached search pages and subject listings
  ClearCache,
}

#[derive(Subcommand, Debug)]
enum ListAction {
  /// Show the list with the saved sort and filter
  List {
    /// Only titles or authors containing this
    #[arg(short, long)]
    filter: Option<String>,
  },
  Add { work_id: String },
  Remove { work_id: String },
  Toggle { work_id: String },
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(session) = args.session {
    config.storage.session_id = Some(session);
  }

  let _guard = init_logging(&config)?;
  info!("libris v{} starting", env!("CARGO_PKG_VERSION"));

  let app = App::open(config)?;
  run(&app, args.command).await
}

/// Log to a daily file so stdout stays clean for command output.
fn init_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = config.data_dir()?.join("logs");
  let file_appender = tracing_appender::rolling::daily(&log_dir, "libris.log");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let filter = EnvFilter::try_from_env("LIBRIS_LOG").unwrap_or_else(|_| EnvFilter::new("libris=info"));
  tracing_subscriber::fmt()
    .with_writer(non_blocking)
    .with_env_filter(filter)
    .with_ansi(false)
    .init();

  Ok(guard)
}

async fn run(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Search { query, page } => search(app, &query, page).await,
    Command::Suggest { input } => {
      for s in app.suggester().history_suggestions(&input) {
        println!("  {} (recent)", s.label);
      }
      if let SuggestOutcome::Ready(list) = app.suggester().suggest(&input).await {
        for s in list {
          match s.subtitle {
            Some(sub) => println!("  {} - {}", s.label, sub),
            None => println!("  {}", s.label),
          }
        }
      }
      Ok(())
    }
    Command::Subject { subject, limit } => {
      let limit = limit.unwrap_or(app.config().cache.subject_limit);
      let items = app
        .subjects()
        .fetch(&subject, limit, app.config().cache.subject_ttl())
        .await?;
      print_items(&items);
      Ok(())
    }
    Command::Categories => {
      for row in app.load_categories().await {
        println!("{}", row.category.title);
        match row.result {
          Ok(items) => print_items(&items),
          Err(e) => println!("  ! {}", e),
        }
      }
      Ok(())
    }
    Command::Work { work_id } => {
      let (work, rating) = tokio::join!(
        app.catalog().get_work_detail(&work_id),
        app.catalog().get_work_rating(&work_id)
      );
      let work = work?;
      println!("{} ({})", work.title, work.work_id);
      let authors: Vec<&str> = work.authors.iter().map(|a| a.name.as_str()).collect();
      if !authors.is_empty() {
        println!("by {}", authors.join(", "));
      }
      if let (Some(avg), Some(count)) = (rating.average, rating.count) {
        println!("{} ({:.2} from {} ratings)", stars(display_stars(avg)), avg, count);
      }
      if let Some(id) = work.covers.first() {
        let base = &app.config().catalog.covers_url;
        println!("Cover: {}", cover_url(base, *id, CoverSize::Large));
      }
      if let Some(description) = &work.description {
        println!("\n{}", description);
      }
      if !work.subjects.is_empty() {
        println!("\nSubjects: {}", work.subjects.join(", "));
      }
      app.navigation().set_last_focused_work(&work.work_id);
      Ok(())
    }
    Command::Author { author_id } => {
      let author = app.catalog().get_author_detail(&author_id).await?;
      println!("{} ({})", author.name, author.author_id);
      if let Some(bio) = author.bio {
        println!("\n{}", bio);
      }
      Ok(())
    }
    Command::Favorites { action } => favorites(app, action).await,
    Command::Read { action } => read(app, action).await,
    Command::Rate { work_id, rating } => {
      if !app.read_list().contains(&work_id) {
        return Err(eyre!("{} is not on the read-list", work_id));
      }
      app.ratings().set_rating(&work_id, rating);
      println!("{} {}", work_id, stars(app.ratings().get_rating(&work_id)));
      Ok(())
    }
    Command::Note { work_id, text } => {
      if !app.read_list().contains(&work_id) {
        return Err(eyre!("{} is not on the read-list", work_id));
      }
      app.notes().set_note(&work_id, &text.join(" "));
      Ok(())
    }
    Command::History { clear } => {
      if clear {
        app.history().clear();
      } else {
        for q in app.history().list() {
          println!("  {}", q);
        }
      }
      Ok(())
    }
    Command::ClearCache => {
      app.search_cache().clear();
      app.subjects().reset();
      println!("Caches cleared");
      Ok(())
    }
  }
}

async fn search(app: &App, query: &str, page: u32) -> Result<()> {
  let pager = app.pager();
  pager.open(query, page).await;
  app.history().add(query);

  let snapshot = pager.snapshot();
  if let PagerStatus::ErrorInitial(e) | PagerStatus::ErrorMore(e) = &snapshot.status {
    return Err(eyre!("Search failed: {}", e));
  }

  let location = url::form_urlencoded::Serializer::new(String::new())
    .append_pair("q", query.trim())
    .append_pair("page", &snapshot.page.to_string())
    .finish();
  app.navigation().set_last_search_url(&format!("/?{}", location));

  print_items(&snapshot.items);
  let more = if snapshot.status == PagerStatus::Exhausted {
    ""
  } else {
    ", more with --page"
  };
  println!(
    "{} of {} results{}",
    snapshot.items.len(),
    snapshot.total_found,
    more
  );
  Ok(())
}

async fn favorites(app: &App, action: ListAction) -> Result<()> {
  let list = app.favorites();
  match action {
    ListAction::List { filter } => {
      let mut prefs = app.prefs().favorites_prefs();
      if let Some(filter) = filter {
        prefs.filter = filter;
        app.prefs().set_favorites_prefs(&prefs);
      }
      print_items(&favorites_view(&list.list(), &prefs));
    }
    ListAction::Add { work_id } => list.add(fetch_item(app, &work_id).await?),
    ListAction::Remove { work_id } => list.remove(&work_id),
    ListAction::Toggle { work_id } => {
      let added = list.toggle(fetch_item(app, &work_id).await?);
      println!("{} {}", work_id, if added { "added" } else { "removed" });
    }
    ListAction::Clear => list.clear(),
  }
  Ok(())
}

async fn read(app: &App, action: ListAction) -> Result<()> {
  let list = app.read_list();
  match action {
    ListAction::List { filter } => {
      let prefs = app.prefs().read_prefs();
      let view = read_view(
        &list.list(),
        &app.ratings().all(),
        &prefs,
        filter.as_deref().unwrap_or(""),
      );
      for entry in view {
        let note = app.notes().get_note(&entry.book.work_id);
        println!(
          "  {} {} - {} [{}]",
          stars(entry.rating),
          entry.book.title,
          entry.book.authors_line(),
          entry.book.work_id
        );
        if !note.is_empty() {
          println!("      {}", note);
        }
      }
    }
    ListAction::Add { work_id } => list.add(fetch_item(app, &work_id).await?),
    ListAction::Remove { work_id } => app.forget_read(&work_id),
    ListAction::Toggle { work_id } => {
      if list.contains(&work_id) {
        app.forget_read(&work_id);
        println!("{} removed", work_id);
      } else {
        list.add(fetch_item(app, &work_id).await?);
        println!("{} added", work_id);
      }
    }
    ListAction::Clear => {
      for item in list.list() {
        app.forget_read(&item.work_id);
      }
    }
  }
  Ok(())
}

/// Item for a work not necessarily seen in results yet.
async fn fetch_item(app: &App, work_id: &str) -> Result<BookSearchItem> {
  let work = app.catalog().get_work_detail(work_id).await?;
  Ok(BookSearchItem::from(&work))
}

fn print_items(items: &[BookSearchItem]) {
  for (i, item) in items.iter().enumerate() {
    let year = item
      .first_publish_year
      .map(|y| format!(" ({})", y))
      .unwrap_or_default();
    println!(
      "{:>3}. {}{} - {} [{}]",
      i + 1,
      item.title,
      year,
      item.authors_line(),
      item.work_id
    );
  }
}

fn stars(n: u8) -> String {
  let n = n.min(5) as usize;
  format!("{}{}", "*".repeat(n), ".".repeat(5 - n))
}
