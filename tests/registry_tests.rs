use assert_fs::prelude::*;
use server_manage::error::{Error, Result};
use server_manage::registry::{store, Registry};
use std::fs;
use std::path::Path;
use std::thread;

// Sorted file names directly inside `dir`
fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_load_registry() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("servers.json");
    file.write_str(r#"{"alice": "/srv/bots/alice", "bob": "/srv/bots/./bob"}"#)
        .unwrap();

    let registry = store::load(file.path())?;

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("alice"), Some(Path::new("/srv/bots/alice")));
    assert_eq!(registry.get("bob"), Some(Path::new("/srv/bots/bob")));

    Ok(())
}

#[test]
fn test_load_missing_file() {
    let temp = assert_fs::TempDir::new().unwrap();

    let err = store::load(temp.child("missing.json").path()).unwrap_err();

    assert!(matches!(err, Error::NotFound(ref path) if path.ends_with("missing.json")));
}

#[test]
fn test_load_rejects_malformed_content() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cases = [
        r#"{"alice": "/a", "alice": "/b"}"#,
        r#"{"alice": ["/a"]}"#,
        r#"{"alice": ""}"#,
        "not json",
    ];

    for (i, content) in cases.iter().enumerate() {
        let file = temp.child(format!("bad-{}.json", i));
        file.write_str(content).unwrap();

        let result = store::load(file.path());
        assert!(
            matches!(result, Err(Error::Format(_))),
            "expected format error for {:?}, got {:?}",
            content,
            result
        );
    }
}

#[test]
fn test_load_empty_object() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("servers.json");
    file.write_str("{}\n").unwrap();

    assert!(store::load(file.path())?.is_empty());

    Ok(())
}

#[test]
fn test_save_creates_directories_and_round_trips() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();
    let path = temp.path().join(".servers").join("servers.json");
    let registry = Registry::from_entries([("bob", "/srv/bots/bob"), ("alice", "/srv/bots/alice")])?;

    store::save(&registry, &path)?;
    let loaded = store::load(&path)?;

    assert_eq!(loaded, registry);
    assert_eq!(entry_names(path.parent().unwrap()), vec!["servers.json"]);

    Ok(())
}

#[test]
fn test_save_is_idempotent() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("servers.json");
    file.write_str(r#"{"zed": "./bots/zed", "alice": "/srv/alice"}"#)
        .unwrap();

    store::save(&store::load(file.path())?, file.path())?;
    let first = fs::read(file.path()).unwrap();

    store::save(&store::load(file.path())?, file.path())?;
    let second = fs::read(file.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        String::from_utf8(first).unwrap(),
        "{\n  \"alice\": \"/srv/alice\",\n  \"zed\": \"bots/zed\"\n}\n"
    );

    Ok(())
}

#[test]
fn test_failed_save_keeps_previous_file() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();

    // Parent is a regular file, so the directory cannot be created
    let blocker = temp.child("blocker");
    blocker.write_str("keep me").unwrap();
    let registry = Registry::from_entries([("alice", "/srv/alice")])?;

    let err = store::save(&registry, blocker.path().join("servers.json")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    blocker.assert("keep me");

    // Target is a directory, so the rename fails after the temp file is written
    let target = temp.child("servers.json");
    target.create_dir_all().unwrap();

    let err = store::save(&registry, target.path()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(target.path().is_dir());
    assert_eq!(entry_names(temp.path()), vec!["blocker", "servers.json"]);

    Ok(())
}

#[test]
fn test_concurrent_saves_never_tear_the_file() -> Result<()> {
    let temp = assert_fs::TempDir::new().unwrap();
    let path = temp.path().join("servers.json");

    let large = Registry::from_entries(
        (0..200).map(|i| (format!("server-{:03}", i), format!("/srv/bots/server-{:03}", i))),
    )?;
    let small = Registry::from_entries([("alice", "/srv/bots/alice")])?;
    store::save(&small, &path)?;

    thread::scope(|scope| {
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let registry = if i % 2 == 0 { &large } else { &small };
                let path = &path;
                scope.spawn(move || {
                    (0..300)
                        .filter(|_| store::save(registry, path).is_err())
                        .count()
                })
            })
            .collect();

        for _ in 0..2000 {
            let loaded = store::load(&path).expect("registry must always be readable");
            assert!(loaded == large || loaded == small);
        }
        for writer in writers {
            assert_eq!(writer.join().unwrap(), 0, "no save may fail");
        }
    });

    // Last rename wins and no temporary file is left behind
    let loaded = store::load(&path)?;
    assert!(loaded == large || loaded == small);
    assert_eq!(entry_names(temp.path()), vec!["servers.json"]);

    Ok(())
}
