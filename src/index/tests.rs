use std::fs;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use super::*;
use crate::config::IndexConfig;
use crate::extract::Syntax;
use crate::page::MemoryPages;
use crate::store::{FileBackend, MemoryBackend};

fn n(name: &str) -> PageName {
    PageName::from(name)
}

fn list(names: Vec<PageName>) -> Vec<String> {
    names.into_iter().map(|name| name.to_string()).collect()
}

/// Page source, backend and index wired together.
struct Wiki {
    pages: Arc<MemoryPages>,
    backend: Arc<MemoryBackend>,
    index: ReferenceIndex,
}

impl Wiki {
    fn new() -> Self {
        Self::with_options(IndexConfig::default())
    }

    fn with_options(options: IndexConfig) -> Self {
        let pages = Arc::new(MemoryPages::new());
        let backend = Arc::new(MemoryBackend::new());
        let store = ReferenceStore::new(backend.clone());
        let index = ReferenceIndex::new(store, pages.clone(), options);
        Self {
            pages,
            backend,
            index,
        }
    }

    fn save(&self, name: &str, text: &str) {
        self.pages.write(name, text);
        self.index.on_page_saved(&n(name), text).unwrap();
    }

    fn create(&self, name: &str, text: &str) {
        self.pages.write(name, text);
        self.index.on_page_created(&n(name), text).unwrap();
    }

    fn delete(&self, name: &str) {
        self.pages.remove(name);
        self.index.on_page_deleted(&n(name)).unwrap();
    }

    fn rename(&self, old: &str, new: &str) {
        assert!(self.pages.rename(old, new));
        self.index.on_page_renamed(&n(old), &n(new)).unwrap();
    }

    fn refers_to(&self, name: &str) -> Vec<String> {
        list(self.index.get_refers_to(name))
    }

    fn referred_by(&self, name: &str) -> Vec<String> {
        list(self.index.get_referred_by(name))
    }

    fn uncreated(&self) -> Vec<String> {
        list(self.index.find_uncreated())
    }

    fn unreferenced(&self) -> Vec<String> {
        list(self.index.find_unreferenced())
    }
}

/// Every outbound reference has its inbound twin and vice versa.
fn assert_symmetric(index: &ReferenceIndex) {
    let mut names = index.find_created();
    names.extend(index.find_uncreated());
    for a in &names {
        for b in index.get_refers_to(a.as_str()) {
            assert!(
                index.get_referred_by(b.as_str()).contains(a),
                "{a} -> {b} has no reverse entry"
            );
        }
        for b in index.get_referred_by(a.as_str()) {
            assert!(
                index.get_refers_to(b.as_str()).contains(a),
                "{b} <- {a} has no forward entry"
            );
        }
    }
}

/// Full query state, for comparing two indexes or two points in time.
fn state(index: &ReferenceIndex) -> Vec<(String, Vec<String>, Vec<String>)> {
    let mut names = index.find_created();
    names.extend(index.find_uncreated());
    names.sort();
    let mut out: Vec<_> = names
        .into_iter()
        .map(|name| {
            (
                name.to_string(),
                list(index.get_refers_to(name.as_str())),
                list(index.get_referred_by(name.as_str())),
            )
        })
        .collect();
    out.push((
        "<derived>".into(),
        list(index.find_uncreated()),
        list(index.find_unreferenced()),
    ));
    out
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_self_reference_and_plural_alias() {
    let wiki = Wiki::new();
    wiki.save("TestPage", "Reference to [Foobar].");
    wiki.save("Foobar", "Reference to [Foobar2], [Foobars], [Foobar]");

    // [Foobars] resolves to Foobar via its singular form, [Foobar] is a
    // self-reference: two distinct referrers
    assert_eq!(wiki.referred_by("Foobar"), vec!["Foobar", "TestPage"]);
    assert_eq!(wiki.refers_to("Foobar"), vec!["Foobar", "Foobar2"]);
    assert_eq!(wiki.uncreated(), vec!["Foobar2"]);
    assert_eq!(wiki.unreferenced(), vec!["TestPage"]);
    assert_symmetric(&wiki.index);
}

#[test]
fn test_identical_save_is_idempotent() {
    let wiki = Wiki::new();
    wiki.save("A", "[B] [C] [B]");
    let before = wiki.refers_to("A");
    let commits = wiki.backend.commit_count();

    wiki.save("A", "[B] [C] [B]");
    assert_eq!(wiki.refers_to("A"), before);
    assert_eq!(wiki.backend.commit_count(), commits);
}

#[test]
fn test_exact_page_takes_over_from_plural() {
    let wiki = Wiki::new();
    wiki.create("NewBugs", "");
    wiki.create("BugOne", "See [NewBug].");

    // No exact or singular match: the plural form wins
    assert_eq!(wiki.referred_by("NewBugs"), vec!["BugOne"]);
    assert!(wiki.uncreated().is_empty());

    wiki.create("NewBug", "");
    wiki.save("BugOne", "See [NewBug].");
    assert_eq!(wiki.referred_by("NewBug"), vec!["BugOne"]);
    assert!(wiki.referred_by("NewBugs").is_empty());
    assert_eq!(wiki.unreferenced(), vec!["BugOne", "NewBugs"]);
}

#[test]
fn test_orphan_detection() {
    let wiki = Wiki::new();
    wiki.save("TestPage", "Reference to [Foobar].");
    assert!(wiki.unreferenced().contains(&"TestPage".to_string()));

    wiki.save("Foobar2", "[TestPage]");
    assert!(!wiki.unreferenced().contains(&"TestPage".to_string()));

    wiki.save("Foobar2", "nothing to see here");
    assert!(wiki.unreferenced().contains(&"TestPage".to_string()));
}

#[test]
fn test_rename_preserves_inbound_edges() {
    let wiki = Wiki::new();
    wiki.create("RenameBugTestPage", "");
    wiki.create("OldNameTestPage", "Link to [RenameBugTestPage]");
    wiki.create("Watcher", "[OldNameTestPage]");

    wiki.rename("OldNameTestPage", "NewNameTestPage");

    assert_eq!(wiki.referred_by("RenameBugTestPage"), vec!["NewNameTestPage"]);
    assert_eq!(wiki.refers_to("NewNameTestPage"), vec!["RenameBugTestPage"]);
    assert_eq!(wiki.referred_by("NewNameTestPage"), vec!["Watcher"]);
    assert_eq!(wiki.refers_to("Watcher"), vec!["NewNameTestPage"]);
    assert!(wiki.refers_to("OldNameTestPage").is_empty());
    assert!(wiki.referred_by("OldNameTestPage").is_empty());
    assert!(wiki.uncreated().is_empty());
    assert!(!wiki.index.find_created().contains(&n("OldNameTestPage")));
    assert_symmetric(&wiki.index);
}

#[test]
fn test_rename_moves_self_reference() {
    let wiki = Wiki::new();
    wiki.create("Loop", "I am [Loop]");
    wiki.rename("Loop", "Cycle");

    assert_eq!(wiki.refers_to("Cycle"), vec!["Cycle"]);
    assert_eq!(wiki.referred_by("Cycle"), vec!["Cycle"]);
    assert!(wiki.uncreated().is_empty());
    assert!(wiki.unreferenced().is_empty());
    assert_eq!(wiki.index.stats().pages, 1);
}

#[test]
fn test_rename_adopts_dangling_alias() {
    let wiki = Wiki::new();
    wiki.create("Catalog", "All [Widgets] here");
    wiki.create("Gadget", "");
    assert_eq!(wiki.uncreated(), vec!["Widgets"]);

    wiki.rename("Gadget", "Widget");
    assert_eq!(wiki.refers_to("Catalog"), vec!["Widget"]);
    assert!(wiki.uncreated().is_empty());
}

#[test]
fn test_repeated_rename_keeps_inherited_references() {
    let wiki = Wiki::new();
    wiki.create("Target", "");
    wiki.create("Old", "[Target]");
    wiki.create("Ref", "[Old]");

    wiki.rename("Old", "New");
    let renamed = state(&wiki.index);
    wiki.index.on_page_renamed(&n("Old"), &n("New")).unwrap();

    assert_eq!(state(&wiki.index), renamed);
    assert_eq!(wiki.refers_to("New"), vec!["Target"]);
    assert_eq!(wiki.referred_by("Target"), vec!["New"]);
    assert_eq!(wiki.unreferenced(), vec!["Ref"]);
}

#[test]
fn test_rename_interrupted_by_failed_commit_can_be_retried() {
    let wiki = Wiki::new();
    wiki.create("Target", "");
    wiki.create("Old", "[Target]");
    wiki.create("First", "[Old]");
    wiki.create("Second", "[Old]");
    assert!(wiki.pages.rename("Old", "New"));

    // The page and its first referrer move, the second rewrite fails
    wiki.backend.fail_commits_after(2, 1);
    let err = wiki.index.on_page_renamed(&n("Old"), &n("New")).unwrap_err();
    assert!(matches!(err, StoreError::Injected));
    assert_eq!(wiki.refers_to("New"), vec!["Target"]);
    assert_eq!(wiki.referred_by("Old").len(), 1);
    assert_eq!(wiki.uncreated(), vec!["Old"]);

    wiki.index.on_page_renamed(&n("Old"), &n("New")).unwrap();
    assert_eq!(wiki.refers_to("New"), vec!["Target"]);
    assert_eq!(wiki.referred_by("New"), vec!["First", "Second"]);
    assert_eq!(wiki.refers_to("First"), vec!["New"]);
    assert_eq!(wiki.refers_to("Second"), vec!["New"]);
    assert!(wiki.referred_by("Old").is_empty());
    assert!(wiki.uncreated().is_empty());
    assert_symmetric(&wiki.index);
}

#[test]
fn test_create_repoints_dangling_references() {
    let wiki = Wiki::new();
    wiki.save("TestPage", "[Foobars] and [Foobar]");
    assert_eq!(wiki.uncreated(), vec!["Foobar", "Foobars"]);

    wiki.create("Foobar", "");
    assert!(wiki.uncreated().is_empty());
    assert_eq!(wiki.refers_to("TestPage"), vec!["Foobar"]);
    assert_eq!(wiki.referred_by("Foobar"), vec!["TestPage"]);
    assert!(wiki.referred_by("Foobars").is_empty());
    assert_symmetric(&wiki.index);
}

#[test]
fn test_delete_cascades() {
    let wiki = Wiki::new();
    wiki.create("A", "[B]");
    wiki.create("B", "[C]");
    wiki.create("C", "");

    wiki.delete("B");

    // B's own references are gone; C lost its only referrer
    assert!(wiki.refers_to("B").is_empty());
    assert!(wiki.referred_by("C").is_empty());
    assert_eq!(wiki.unreferenced(), vec!["A", "C"]);
    // A still links to B, which now dangles
    assert_eq!(wiki.referred_by("B"), vec!["A"]);
    assert_eq!(wiki.uncreated(), vec!["B"]);
    assert_symmetric(&wiki.index);

    // Once nothing references B its entry is pruned
    wiki.save("A", "no links");
    assert!(wiki.uncreated().is_empty());
    assert_eq!(wiki.index.stats().edges, 0);
    assert!(!wiki.backend.snapshot().unwrap().nodes.contains_key("B"));
}

#[test]
fn test_rebuild_is_deterministic() {
    let wiki = Wiki::new();
    for (name, text) in [
        ("Main", "[About] [Bugs] [Missing]"),
        ("About", "[Main]"),
        ("Bug", "[Bug] [Orphans]"),
        ("Lonely", ""),
    ] {
        wiki.pages.write(name, text);
    }

    let first_stats = wiki.index.rebuild().unwrap();
    let first = state(&wiki.index);
    let first_snapshot = wiki.backend.snapshot();
    let second_stats = wiki.index.rebuild().unwrap();

    assert_eq!(first_stats, second_stats);
    assert_eq!(first, state(&wiki.index));
    assert_eq!(first_snapshot, wiki.backend.snapshot());
    assert_eq!(wiki.uncreated(), vec!["Missing", "Orphans"]);
    assert_eq!(wiki.unreferenced(), vec!["Lonely"]);
    assert_eq!(wiki.referred_by("Bug"), vec!["Bug", "Main"]);
}

#[test]
fn test_rebuild_matches_incremental_events() {
    let incremental = Wiki::new();
    incremental.create("Home", "[Docs] [Guides]");
    incremental.create("Docs", "[Home]");
    incremental.create("Guide", "[Docs] [Faq]");
    incremental.save("Home", "[Docs] [Guides] [Blog]");

    let rebuilt = Wiki::new();
    for name in ["Home", "Docs", "Guide"] {
        let text = incremental.pages.read(&n(name)).unwrap().unwrap();
        rebuilt.pages.write(name, &text);
    }
    rebuilt.index.rebuild().unwrap();

    assert_eq!(state(&incremental.index), state(&rebuilt.index));
}

#[test]
fn test_exact_matching_mode() {
    let wiki = Wiki::with_options(IndexConfig {
        match_plurals: false,
        ..IndexConfig::default()
    });
    wiki.create("Foobar", "");
    wiki.create("TestPage", "[Foobars]");

    assert_eq!(wiki.uncreated(), vec!["Foobars"]);
    assert!(wiki.referred_by("Foobar").is_empty());
}

#[test]
fn test_markdown_pages() {
    let wiki = Wiki::with_options(IndexConfig {
        syntax: Syntax::Markdown,
        ..IndexConfig::default()
    });
    wiki.create("Guide", "");
    wiki.create("Readme", "See [the guide](Guide.md), [site](https://example.com) and [x](#top).");

    assert_eq!(wiki.refers_to("Readme"), vec!["Guide"]);
    assert_eq!(wiki.unreferenced(), vec!["Readme"]);
}

#[test]
fn test_unknown_names_query_empty() {
    let wiki = Wiki::new();
    assert!(wiki.refers_to("Nowhere").is_empty());
    assert!(wiki.referred_by("Nowhere").is_empty());
    assert!(wiki.uncreated().is_empty());
    assert!(wiki.unreferenced().is_empty());
    assert_eq!(wiki.index.stats(), IndexStats::default());
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_failed_commit_leaves_index_unchanged() {
    let wiki = Wiki::new();
    wiki.save("A", "[B]");
    let before = state(&wiki.index);

    wiki.backend.fail_next_commits(1);
    let err = wiki.index.on_page_saved(&n("A"), "[C]").unwrap_err();
    assert!(matches!(err, StoreError::Injected));
    assert_eq!(state(&wiki.index), before);

    wiki.save("A", "[C]");
    assert_eq!(wiki.refers_to("A"), vec!["C"]);
    assert_eq!(wiki.uncreated(), vec!["C"]);
}

#[test]
fn test_failed_rebuild_keeps_previous_index() {
    let wiki = Wiki::new();
    wiki.save("A", "[B]");
    wiki.pages.write("A", "[Z]");
    let before = state(&wiki.index);

    wiki.backend.fail_next_replace();
    assert!(wiki.index.rebuild().is_err());
    assert_eq!(state(&wiki.index), before);

    wiki.index.rebuild().unwrap();
    assert_eq!(wiki.refers_to("A"), vec!["Z"]);
}

/// Lists a different page set on every call.
#[derive(Default)]
struct ShiftingPages {
    calls: AtomicUsize,
}

impl PageSource for ShiftingPages {
    fn page_names(&self) -> io::Result<Vec<PageName>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![n(&format!("Page{call}"))])
    }

    fn read(&self, _name: &PageName) -> io::Result<Option<String>> {
        Ok(Some(String::new()))
    }
}

#[test]
fn test_rebuild_gives_up_on_shifting_page_set() {
    let source = Arc::new(ShiftingPages::default());
    let index = ReferenceIndex::new(
        ReferenceStore::new(MemoryBackend::new()),
        source.clone(),
        IndexConfig::default(),
    );

    let err = index.rebuild().unwrap_err();
    assert!(matches!(err, StoreError::InconsistentRebuild { attempts: 2 }));
    // Two listings per attempt
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    assert!(index.find_created().is_empty());
}

/// Fails to read one page.
struct UnreadablePage;

impl PageSource for UnreadablePage {
    fn page_names(&self) -> io::Result<Vec<PageName>> {
        Ok(vec![n("Fine"), n("Broken")])
    }

    fn read(&self, name: &PageName) -> io::Result<Option<String>> {
        if name.as_str() == "Broken" {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        } else {
            Ok(Some("[Broken]".into()))
        }
    }
}

#[test]
fn test_rebuild_reports_unreadable_page() {
    let index = ReferenceIndex::new(
        ReferenceStore::new(MemoryBackend::new()),
        Arc::new(UnreadablePage),
        IndexConfig::default(),
    );
    let err = index.rebuild().unwrap_err();
    assert!(matches!(err, StoreError::Content(ref name, _) if name.as_str() == "Broken"));
}

// =============================================================================
// Open / sync
// =============================================================================

#[test]
fn test_open_rebuilds_then_loads() {
    let pages = Arc::new(MemoryPages::with_pages([("Main", "[About]"), ("About", "")]));
    let backend = Arc::new(MemoryBackend::new());

    let (index, loaded) =
        ReferenceIndex::open(backend.clone(), pages.clone(), IndexConfig::default()).unwrap();
    assert!(!loaded);
    let built = state(&index);
    assert_eq!(list(index.get_referred_by("About")), vec!["Main"]);

    let (reopened, loaded) =
        ReferenceIndex::open(backend, pages, IndexConfig::default()).unwrap();
    assert!(loaded);
    assert_eq!(state(&reopened), built);
}

#[test]
fn test_sync_reindexes_only_changed_pages() {
    let wiki = Wiki::new();
    wiki.pages.write("A", "[B]");
    wiki.pages.write("B", "");
    wiki.pages.write("C", "[A]");
    wiki.index.rebuild().unwrap();

    wiki.pages.write("A", "[C]");
    wiki.pages.write("D", "[A]");
    wiki.pages.remove("C");

    let report = wiki.index.sync().unwrap();
    assert_eq!(
        report,
        SyncReport {
            indexed: 2,
            removed: 1,
            unchanged: 1,
        }
    );
    assert_eq!(wiki.refers_to("A"), vec!["C"]);
    assert_eq!(wiki.referred_by("A"), vec!["D"]);
    assert_eq!(wiki.uncreated(), vec!["C"]);
    assert_eq!(wiki.unreferenced(), vec!["B", "D"]);

    // Nothing changed since: nothing to commit
    let commits = wiki.backend.commit_count();
    let report = wiki.index.sync().unwrap();
    assert_eq!(report.indexed + report.removed, 0);
    assert_eq!(wiki.backend.commit_count(), commits);
}

#[test]
fn test_sync_of_new_pages_matches_rebuild() {
    let pages = [("A", "[Foos] [Bars]"), ("Foo", ""), ("Foos", "[Bar]"), ("Bar", "")];

    let synced = Wiki::new();
    let rebuilt = Wiki::new();
    for (name, text) in pages {
        synced.pages.write(name, text);
        rebuilt.pages.write(name, text);
    }
    synced.index.sync().unwrap();
    rebuilt.index.rebuild().unwrap();

    assert_eq!(synced.refers_to("A"), vec!["Bar", "Foos"]);
    assert_eq!(state(&synced.index), state(&rebuilt.index));
}

#[test]
fn test_sync_adopts_dangling_aliases_of_new_pages() {
    let wiki = Wiki::new();
    wiki.pages.write("Catalog", "[Widgets]");
    wiki.index.rebuild().unwrap();
    assert_eq!(wiki.uncreated(), vec!["Widgets"]);

    wiki.pages.write("Widget", "");
    wiki.index.sync().unwrap();
    assert_eq!(wiki.refers_to("Catalog"), vec!["Widget"]);
    assert!(wiki.uncreated().is_empty());
}

#[test]
fn test_file_backend_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("references");
    let pages = Arc::new(MemoryPages::with_pages([
        ("Main", "[About] [Missing]"),
        ("About", "[Main]"),
        ("Lonely", ""),
    ]));

    let (index, _) =
        ReferenceIndex::open(FileBackend::new(&root), pages.clone(), IndexConfig::default())
            .unwrap();
    pages.write("Lonely", "[Main] [Ghost]");
    index.on_page_saved(&n("Lonely"), "[Main] [Ghost]").unwrap();
    index.on_page_deleted(&n("About")).unwrap();
    pages.remove("About");
    let expected = state(&index);
    drop(index);

    let (reopened, loaded) =
        ReferenceIndex::open(FileBackend::new(&root), pages, IndexConfig::default()).unwrap();
    assert!(loaded);
    assert_eq!(state(&reopened), expected);
    assert_eq!(
        list(reopened.find_uncreated()),
        vec!["About", "Ghost", "Missing"]
    );
}

#[test]
fn test_failed_file_commit_is_not_visible_after_reopen() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("references");
    let pages = Arc::new(MemoryPages::with_pages([("A", "[B]"), ("B", "")]));

    let (index, _) =
        ReferenceIndex::open(FileBackend::new(&root), pages.clone(), IndexConfig::default())
            .unwrap();
    let before = state(&index);

    fs::create_dir(root.join("root.json.tmp")).unwrap();
    pages.write("A", "[B] [Ghost]");
    assert!(index.on_page_saved(&n("A"), "[B] [Ghost]").is_err());
    assert_eq!(state(&index), before);
    drop(index);

    let (reopened, loaded) =
        ReferenceIndex::open(FileBackend::new(&root), pages, IndexConfig::default()).unwrap();
    assert!(loaded);
    assert_eq!(state(&reopened), before);
    assert!(reopened.find_uncreated().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_saves_keep_tables_consistent() {
    const THREADS: usize = 8;
    const PAGES: usize = 25;

    let wiki = Wiki::new();
    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let wiki = &wiki;
            scope.spawn(move || {
                for i in 0..PAGES {
                    let name = format!("T{t}P{i}");
                    let text = format!("[Hub] [T{t}P{}] [T{}P{i}]", i + 1, (t + 1) % THREADS);
                    wiki.save(&name, &text);
                }
            });
        }
    });

    assert_eq!(wiki.referred_by("Hub").len(), THREADS * PAGES);
    assert_eq!(wiki.index.stats().pages, THREADS * PAGES);
    assert_symmetric(&wiki.index);

    // The same state a rebuild derives from the final content
    let incremental = state(&wiki.index);
    wiki.index.rebuild().unwrap();
    assert_eq!(state(&wiki.index), incremental);
}

#[test]
fn test_page_locks_are_released_for_removed_names() {
    let wiki = Wiki::new();
    wiki.create("Kept", "[Moved]");
    wiki.create("Moved", "");
    wiki.create("Gone", "");
    assert_eq!(wiki.index.page_locks.len(), 3);

    wiki.delete("Gone");
    wiki.rename("Moved", "Settled");
    assert!(!wiki.index.page_locks.contains_key("Gone"));
    assert!(!wiki.index.page_locks.contains_key("Moved"));
    assert!(wiki.index.page_locks.contains_key("Kept"));
    assert!(wiki.index.page_locks.contains_key("Settled"));
}
