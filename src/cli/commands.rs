use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use crate::api::{DiaryApi, Notebook};
use crate::app::{App, EditorScreen};
use crate::cache::{format_cache_time, now_millis, CacheSlot, EntrySnapshot, LocalCacheStore};
use crate::config::AppConfig;
use crate::editor::describe_mood;
use crate::storage::KeyValueStore;

#[derive(Args, Debug, Clone, Default)]
pub struct WriteArgs {
    /// Notebook the new entry is filed under (defaults to editor.default_notebook)
    #[arg(long)]
    pub notebook: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Identifier of the diary entry to edit
    pub entry_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommand {
    /// List every cached snapshot, newest first
    List,
    /// Print one cached snapshot as JSON
    Show(SlotArgs),
    /// Remove cached snapshots
    Clear(ClearArgs),
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SlotArgs {
    /// The unsaved new entry
    #[arg(long)]
    pub new: bool,
    /// Unsaved changes to an existing entry
    #[arg(long, value_name = "ID")]
    pub entry: Option<i64>,
}

impl SlotArgs {
    pub fn slot(&self) -> CacheSlot {
        CacheSlot::for_entry(self.entry)
    }
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ClearTarget {
    /// The unsaved new entry
    #[arg(long)]
    pub new: bool,
    /// Unsaved changes to an existing entry
    #[arg(long, value_name = "ID")]
    pub entry: Option<i64>,
    /// Every snapshot this client wrote
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    #[command(flatten)]
    pub target: ClearTarget,
    /// Skip the confirmation prompt for --all
    #[arg(long)]
    pub yes: bool,
}

pub fn write_entry<S: KeyValueStore>(
    config: Arc<AppConfig>,
    api: Arc<dyn DiaryApi>,
    cache: LocalCacheStore<S>,
    args: WriteArgs,
) -> Result<()> {
    let notebooks = fetch_notebooks(api.as_ref());
    let notebook_id = initial_notebook(args.notebook, config.editor.default_notebook, &notebooks);
    let screen = EditorScreen::open_new(cache, &config.auto_save, notebook_id, Instant::now());
    run_screen(config, api, screen, notebooks)
}

pub fn edit_entry<S: KeyValueStore>(
    config: Arc<AppConfig>,
    api: Arc<dyn DiaryApi>,
    cache: LocalCacheStore<S>,
    args: EditArgs,
) -> Result<()> {
    let entry = api
        .get_entry(args.entry_id)
        .with_context(|| format!("loading diary #{}", args.entry_id))?;
    let notebooks = fetch_notebooks(api.as_ref());
    let screen = EditorScreen::open_existing(cache, &config.auto_save, &entry, Instant::now());
    run_screen(config, api, screen, notebooks)
}

fn run_screen<S: KeyValueStore>(
    config: Arc<AppConfig>,
    api: Arc<dyn DiaryApi>,
    screen: EditorScreen<S>,
    notebooks: Vec<Notebook>,
) -> Result<()> {
    let mut app = App::new(config, api, screen, notebooks);
    app.run()?;
    let screen = app.screen();
    tracing::info!(
        slot = %screen.slot(),
        unsaved = screen.has_unsaved_changes(),
        "editor closed"
    );
    Ok(())
}

/// Flag first, then config, then the first notebook the server lists.
/// Without one, autosave has nothing to file snapshots under.
fn initial_notebook(requested: Option<i64>, configured: Option<i64>, notebooks: &[Notebook]) -> Option<i64> {
    requested
        .or(configured)
        .or_else(|| notebooks.first().map(|notebook| notebook.id))
}

fn fetch_notebooks(api: &dyn DiaryApi) -> Vec<Notebook> {
    match api.list_notebooks() {
        Ok(notebooks) => notebooks,
        Err(error) => {
            tracing::warn!(%error, "could not load notebooks, picker will be empty");
            Vec::new()
        }
    }
}

pub fn list_notebooks(api: &dyn DiaryApi) -> Result<()> {
    let notebooks = api.list_notebooks().context("listing notebooks")?;
    print!("{}", format_notebooks(&notebooks));
    Ok(())
}

fn format_notebooks(notebooks: &[Notebook]) -> String {
    if notebooks.is_empty() {
        return "No notebooks.\n".to_string();
    }
    let mut out = String::new();
    for notebook in notebooks {
        let _ = write!(out, "#{:<6} {}", notebook.id, notebook.name);
        if let Some(description) = notebook.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, " - {description}");
        }
        out.push('\n');
    }
    out
}

pub fn handle_cache_command<S: KeyValueStore>(cache: &LocalCacheStore<S>, args: CacheArgs) -> Result<()> {
    match args.command {
        CacheCommand::List => {
            print!("{}", format_cache_list(&collect_snapshots(cache), now_millis()));
            Ok(())
        }
        CacheCommand::Show(args) => {
            println!("{}", show_snapshot(cache, args.slot())?);
            Ok(())
        }
        CacheCommand::Clear(args) => {
            let confirmed = if args.target.all && !args.yes {
                confirm_clear_all()?
            } else {
                true
            };
            if !confirmed {
                println!("Nothing removed.");
                return Ok(());
            }
            println!("{}", clear_snapshots(cache, &args.target));
            Ok(())
        }
    }
}

fn collect_snapshots<S: KeyValueStore>(cache: &LocalCacheStore<S>) -> Vec<EntrySnapshot> {
    let mut snapshots: Vec<EntrySnapshot> = cache.get(CacheSlot::New).into_iter().collect();
    snapshots.extend(cache.list_editing());
    snapshots.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
    snapshots
}

fn format_cache_list(snapshots: &[EntrySnapshot], now_ms: i64) -> String {
    if snapshots.is_empty() {
        return "No cached snapshots.\n".to_string();
    }
    let mut out = String::new();
    for snapshot in snapshots {
        let title = if snapshot.title.trim().is_empty() {
            "Untitled"
        } else {
            snapshot.title.as_str()
        };
        let _ = write!(
            out,
            "{:<10} {:<14} {} (notebook #{})",
            snapshot.slot().cache_id(),
            format_cache_time(snapshot.cached_at, now_ms),
            title,
            snapshot.notebook_id,
        );
        if let Some(mood) = snapshot.mood.as_ref().and_then(describe_mood) {
            let _ = write!(out, " {mood}");
        }
        if !snapshot.tags.is_empty() {
            let tags: Vec<String> = snapshot.tags.iter().map(|t| format!("#{t}")).collect();
            let _ = write!(out, " {}", tags.join(" "));
        }
        out.push('\n');
    }
    out
}

fn show_snapshot<S: KeyValueStore>(cache: &LocalCacheStore<S>, slot: CacheSlot) -> Result<String> {
    let Some(snapshot) = cache.get(slot) else {
        bail!("no cached snapshot for {slot}");
    };
    serde_json::to_string_pretty(&snapshot).context("serializing snapshot")
}

fn clear_snapshots<S: KeyValueStore>(cache: &LocalCacheStore<S>, target: &ClearTarget) -> String {
    if target.all {
        let removed = cache.remove_all();
        return format!("Removed {removed} cached snapshot(s).");
    }
    let slot = CacheSlot::for_entry(target.entry);
    if cache.get(slot).is_none() {
        return format!("No cached snapshot for {slot}.");
    }
    cache.remove(slot);
    format!("Removed cached snapshot for {slot}.")
}

fn confirm_clear_all() -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("refusing to clear every snapshot from a non-interactive stdin without --yes");
    }
    let answer = prompt("Remove every cached snapshot? [y/N]")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label} ")?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryFields;
    use crate::storage::MemoryStore;
    use serde_json::json;

    type TestResult<T = ()> = Result<T>;

    fn seeded_cache() -> LocalCacheStore<Arc<MemoryStore>> {
        let cache = LocalCacheStore::new(Arc::new(MemoryStore::new()));
        let fresh = EntryFields {
            title: "Morning pages".into(),
            notebook_id: Some(2),
            mood: Some(json!({"emoji": "😊", "label": "Happy"})),
            tags: vec!["daily".into()],
            ..EntryFields::default()
        };
        let edit = EntryFields {
            title: String::new(),
            notebook_id: Some(3),
            ..EntryFields::default()
        };
        for snapshot in [
            EntrySnapshot::capture(CacheSlot::New, &fresh, 1_000, None),
            EntrySnapshot::capture(CacheSlot::Editing(42), &edit, 2_000, None),
        ]
        .into_iter()
        .flatten()
        {
            cache.put(&snapshot);
        }
        cache
    }

    #[test]
    fn cache_list_is_newest_first() -> TestResult {
        let cache = seeded_cache();
        let output = format_cache_list(&collect_snapshots(&cache), 2_000 + 30_000);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("edit_42"));
        assert!(lines[0].contains("Untitled (notebook #3)"));
        assert!(lines[1].starts_with("new"));
        assert!(lines[1].contains("Morning pages"));
        assert!(lines[1].contains("#daily"));
        assert!(lines[1].contains("😊 Happy"));
        assert!(lines[1].contains("just now"));
        Ok(())
    }

    #[test]
    fn empty_cache_list_says_so() {
        assert_eq!(format_cache_list(&[], 0), "No cached snapshots.\n");
    }

    #[test]
    fn show_prints_camel_case_json() -> TestResult {
        let cache = seeded_cache();
        let output = show_snapshot(&cache, CacheSlot::Editing(42))?;
        let value: serde_json::Value = serde_json::from_str(&output)?;
        assert_eq!(value["cacheId"], "edit_42");
        assert_eq!(value["entryId"], 42);
        assert_eq!(value["notebookId"], 3);
        assert!(show_snapshot(&cache, CacheSlot::Editing(7)).is_err());
        Ok(())
    }

    #[test]
    fn clear_one_slot_leaves_the_other() {
        let cache = seeded_cache();
        let target = ClearTarget {
            new: false,
            entry: Some(42),
            all: false,
        };
        assert_eq!(
            clear_snapshots(&cache, &target),
            "Removed cached snapshot for edit_42."
        );
        assert_eq!(
            clear_snapshots(&cache, &target),
            "No cached snapshot for edit_42."
        );
        assert!(cache.get(CacheSlot::New).is_some());
    }

    #[test]
    fn clear_all_counts_removed_snapshots() {
        let cache = seeded_cache();
        let target = ClearTarget {
            new: false,
            entry: None,
            all: true,
        };
        assert_eq!(clear_snapshots(&cache, &target), "Removed 2 cached snapshot(s).");
        assert!(!cache.has_any());
    }

    #[test]
    fn new_entries_fall_back_to_the_first_notebook() {
        let notebooks = [
            Notebook {
                id: 5,
                name: "Daily".into(),
                description: None,
            },
            Notebook {
                id: 8,
                name: "Travel".into(),
                description: None,
            },
        ];
        assert_eq!(initial_notebook(Some(8), Some(2), &notebooks), Some(8));
        assert_eq!(initial_notebook(None, Some(2), &notebooks), Some(2));
        assert_eq!(initial_notebook(None, None, &notebooks), Some(5));
        assert_eq!(initial_notebook(None, None, &[]), None);
    }

    #[test]
    fn notebooks_are_listed_with_descriptions() {
        let output = format_notebooks(&[
            Notebook {
                id: 1,
                name: "Daily".into(),
                description: None,
            },
            Notebook {
                id: 12,
                name: "Travel".into(),
                description: Some("trips".into()),
            },
        ]);
        assert_eq!(output, "#1      Daily\n#12     Travel - trips\n");
        assert_eq!(format_notebooks(&[]), "No notebooks.\n");
    }
}
