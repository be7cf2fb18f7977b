//! Integration tests for the external converter and the background tasks
//!
//! These tests verify:
//! - Locating a converter on a search path and probing it
//! - Splitting converter output into blocks
//! - Classifying converter failures from stderr
//! - InitializationTask and ConversionTask reporting through a mailbox
//!
//! The converters are small shell scripts, so the process tests are Unix only.

use camino::{Utf8Path, Utf8PathBuf};
use docmark::models::{ConversionRequest, ConverterSettings, ErrorKind};
use docmark::services::{
    ConversionTask, EngineError, EngineLoader, ExternalConverterLoader,
    InitializationTask, MailboxReceiver, TaskEvent, TaskId, TaskOutcome, mailbox,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

type Event<T, E> = (TaskId, TaskEvent<T, E>);

fn tag<T, E>(id: TaskId, event: TaskEvent<T, E>) -> Event<T, E> {
    (id, event)
}

/// Collect events until the terminal one arrives
async fn finish<T, E>(rx: &mut MailboxReceiver<Event<T, E>>) -> (Vec<String>, TaskOutcome<T, E>) {
    let mut progress = Vec::new();
    loop {
        let (_, event) = timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("Timeout waiting for task")
            .expect("Mailbox closed");
        match event {
            TaskEvent::Progress(message) => progress.push(message),
            TaskEvent::Finished(outcome) => return (progress, outcome),
        }
    }
}

fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
}

fn settings_for(names: &[&str]) -> ConverterSettings {
    let mut settings = ConverterSettings::default();
    settings.profiles = names
        .iter()
        .map(|name| (name.to_string(), vec!["{input}".to_string()]))
        .collect();
    settings
}

#[cfg(unix)]
fn write_script(dir: &Utf8Path, name: &str, body: &str) -> Utf8PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

#[cfg(unix)]
const PAGED_CONVERTER: &str = r#"if [ "$1" = "--version" ]; then echo "paged 1.0"; exit 0; fi
printf '# %s\f\fSecond page' "$(basename "$1")""#;

#[test]
fn test_no_converter_on_empty_search_path() {
    let dir = TempDir::new().unwrap();
    let loader = ExternalConverterLoader::new(settings_for(&["markitdown", "pandoc"]))
        .with_search_path(dir.path().as_os_str());

    match loader.resolve() {
        Err(EngineError::MissingDependency(message)) => {
            assert!(message.contains("markitdown, pandoc"), "got: {}", message)
        }
        other => panic!("expected a missing dependency, got {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn test_profiles_are_searched_in_order() {
    let dir = TempDir::new().unwrap();
    let bin = utf8_dir(&dir);
    write_script(&bin, "second", PAGED_CONVERTER);
    write_script(&bin, "third", PAGED_CONVERTER);

    let loader = ExternalConverterLoader::new(settings_for(&["first", "second", "third"]))
        .with_search_path(bin.as_str());

    let (executable, arguments) = loader.resolve().unwrap();
    assert_eq!(executable, bin.join("second"));
    assert_eq!(arguments, vec!["{input}"]);
}

#[cfg(unix)]
#[test]
fn test_loaded_converter_splits_pages() {
    let dir = TempDir::new().unwrap();
    let bin = utf8_dir(&dir);
    write_script(&bin, "paged", PAGED_CONVERTER);
    let document = bin.join("report.pdf");
    std::fs::write(&document, b"%PDF").unwrap();

    let engine = ExternalConverterLoader::new(settings_for(&["paged"]))
        .with_search_path(bin.as_str())
        .load()
        .unwrap();

    let blocks = engine.convert(&document).unwrap();
    assert_eq!(blocks, vec!["# report.pdf", "", "Second page"]);
}

#[cfg(unix)]
#[test]
fn test_failed_probe_is_classified() {
    let dir = TempDir::new().unwrap();
    let bin = utf8_dir(&dir);
    write_script(
        &bin,
        "broken",
        "echo \"ModuleNotFoundError: No module named 'docling'\" >&2\nexit 1",
    );

    let result = ExternalConverterLoader::new(settings_for(&["broken"]))
        .with_search_path(bin.as_str())
        .load();

    assert_eq!(
        result.map(|_| ()),
        Err(EngineError::MissingDependency(
            "ModuleNotFoundError: No module named 'docling'".to_string()
        ))
    );
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initialize_then_convert() {
    let dir = TempDir::new().unwrap();
    let bin = utf8_dir(&dir);
    write_script(&bin, "paged", PAGED_CONVERTER);
    let document = bin.join("slides.pptx");
    std::fs::write(&document, b"pptx").unwrap();

    let runtime = tokio::runtime::Handle::current();
    let loader = Arc::new(
        ExternalConverterLoader::new(settings_for(&["paged"])).with_search_path(bin.as_str()),
    );

    let (tx, mut rx) = mailbox();
    let init = InitializationTask::start(&runtime, tx, tag, loader);
    let (progress, outcome) = finish(&mut rx).await;
    assert_eq!(progress, vec!["Loading conversion engine..."]);
    assert!(init.is_finished());
    let engine = match outcome {
        TaskOutcome::Succeeded(engine) => engine,
        other => panic!("initialization did not succeed: {}", other.label()),
    };

    let (tx, mut rx) = mailbox();
    ConversionTask::start(
        &runtime,
        tx,
        tag,
        engine,
        ConversionRequest::new(document),
        Some(Duration::from_secs(10)),
    );
    let (progress, outcome) = finish(&mut rx).await;

    assert_eq!(progress, vec!["Converting 'slides.pptx'..."]);
    match outcome {
        TaskOutcome::Succeeded(doc) => {
            assert_eq!(doc.markdown, "# slides.pptx\n\nSecond page");
            assert_eq!(doc.block_count, 3);
        }
        other => panic!("conversion did not succeed: {}", other.label()),
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_converter_times_out() {
    let dir = TempDir::new().unwrap();
    let bin = utf8_dir(&dir);
    write_script(
        &bin,
        "sleepy",
        r#"if [ "$1" = "--version" ]; then exit 0; fi
sleep 2"#,
    );
    let document = bin.join("long.pdf");
    std::fs::write(&document, b"%PDF").unwrap();

    let engine = ExternalConverterLoader::new(settings_for(&["sleepy"]))
        .with_search_path(bin.as_str())
        .load()
        .unwrap();

    let (tx, mut rx) = mailbox();
    ConversionTask::start(
        &tokio::runtime::Handle::current(),
        tx,
        tag,
        engine,
        ConversionRequest::new(document),
        Some(Duration::from_millis(200)),
    );

    match finish(&mut rx).await.1 {
        TaskOutcome::Failed(error) => {
            assert_eq!(error.kind(), ErrorKind::Unexpected);
            assert!(error.message().contains("timed out"), "got: {}", error.message());
        }
        other => panic!("expected a timeout failure, got {}", other.label()),
    }
}
