// Integration tests for note persistence across store instances.

use sphere_tutor_rs::notes::NoteStore;

#[test]
fn notes_accumulate_in_order_across_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");

    {
        let mut store = NoteStore::load(&path).unwrap();
        store.add("rust", "ownership", None, "first".into()).unwrap();
        store.add("rust", "ownership", None, "second".into()).unwrap();
    }
    {
        let mut store = NoteStore::load(&path).unwrap();
        store.add("rust", "ownership", None, "third".into()).unwrap();
    }

    let store = NoteStore::load(&path).unwrap();
    let texts: Vec<&str> = store
        .list("rust", "ownership")
        .iter()
        .map(|n| n.text.as_str())
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[test]
fn removal_persists_and_ids_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");

    let mut store = NoteStore::load(&path).unwrap();
    let a = store.add("c", "m", Some("quoted line".into()), "keep".into()).unwrap();
    let b = store.add("c", "m", None, "drop".into()).unwrap();
    assert_ne!(a.id, b.id);

    assert!(store.remove("c", "m", &b.id).unwrap());

    let reloaded = NoteStore::load(&path).unwrap();
    let remaining = reloaded.list("c", "m");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, a.id);
    assert_eq!(remaining[0].quote.as_deref(), Some("quoted line"));
}

#[test]
fn removing_from_an_unknown_module_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = NoteStore::load(dir.path().join("notes.json")).unwrap();
    assert!(!store.remove("ghost", "module", "no-such-id").unwrap());
}
