use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn normalize_collapses_whitespace() {
    assert_eq!(
        normalize_whitespace("hello\n\tworld  again"),
        "hello world again"
    );
    assert_eq!(normalize_whitespace("  leading and trailing \n"), "leading and trailing");
    assert_eq!(normalize_whitespace(""), "");
    assert_eq!(normalize_whitespace(" \t\n "), "");
}

#[test]
fn normalize_is_idempotent() {
    let inputs = [
        "plain text",
        "  spaced\t\tout\ninput  ",
        "",
        "one",
        "tabs\tand\nnewlines\r\nmixed",
    ];
    for input in inputs {
        let once = normalize_whitespace(input);
        assert_eq!(normalize_whitespace(&once), once);
    }
}

#[test]
fn load_notes_drops_empty_rows() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("notes.csv");
    fs::write(
        &path,
        "text,created_at,modified_at\nfirst note,1650000000000000,1650000001000000\n   ,,\nsecond note,,\n",
    )
    .expect("can write csv");

    let notes = load_notes(&path).expect("can load notes");

    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].text, "first note");
    assert_eq!(notes[0].original_index, 0);
    assert_eq!(notes[0].created_at, Some(1_650_000_000_000_000));
    // The empty middle row is dropped but still counted in original_index.
    assert_eq!(notes[1].text, "second note");
    assert_eq!(notes[1].original_index, 2);
    assert_eq!(notes[1].created_at, None);
}

#[test]
fn load_notes_accepts_float_timestamps() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("notes.csv");
    fs::write(
        &path,
        "text,created_at,modified_at\na note,1650000000000000.0,\n",
    )
    .expect("can write csv");

    let notes = load_notes(&path).expect("can load notes");

    assert_eq!(notes[0].created_at, Some(1_650_000_000_000_000));
    assert_eq!(notes[0].modified_at, None);
}

#[test]
fn load_notes_requires_text_column() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("notes.csv");
    fs::write(&path, "body,created_at\nsome text,123\n").expect("can write csv");

    let err = load_notes(&path).expect_err("missing text column should fail");
    assert!(err.to_string().contains("'text' column"));
}

#[test]
fn load_notes_missing_file_is_fatal() {
    let dir = TempDir::new().expect("can create temp dir");
    let err = load_notes(&dir.path().join("nope.csv")).expect_err("missing file should fail");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn import_keep_writes_sorted_csv() {
    let dir = TempDir::new().expect("can create temp dir");
    let json_dir = dir.path().join("keep");
    fs::create_dir_all(&json_dir).expect("can create keep dir");

    fs::write(
        json_dir.join("older.json"),
        r#"{"textContent":"older note","createdTimestampUsec":1000,"userEditedTimestampUsec":1500}"#,
    )
    .expect("can write export");
    fs::write(
        json_dir.join("newer.json"),
        r#"{"textContent":"newer note","createdTimestampUsec":2000,"userEditedTimestampUsec":2500}"#,
    )
    .expect("can write export");
    // No textContent: skipped, not an error.
    fs::write(json_dir.join("empty.json"), r#"{"color":"DEFAULT"}"#).expect("can write export");

    let csv_path = dir.path().join("data").join("all_notes.csv");
    let count = import_keep_exports(&json_dir, &csv_path).expect("can import");
    assert_eq!(count, 2);

    let notes = load_notes(&csv_path).expect("can load imported notes");
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].text, "newer note");
    assert_eq!(notes[0].created_at, Some(2000));
    assert_eq!(notes[0].modified_at, Some(2500));
    assert_eq!(notes[1].text, "older note");
}
