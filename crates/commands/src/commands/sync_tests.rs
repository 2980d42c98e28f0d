//! Unit tests for the sync command

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use zip::ZipArchive;

use crate::commands::code_versions::CodeVersionManager;
use crate::commands::sync::*;
use crate::test_helpers::{FakeWebDav, MockCodeVersionManagerMock, TestUserInterface};
use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, UserInterface};
use sfcc_runtime::webdav::{Location, WebDavClient};

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Two cartridges, plus one inside node_modules that must be ignored
fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "cartridges/app_site/.project", "<projectDescription/>");
    write(
        dir.path(),
        "cartridges/app_site/cartridge/scripts/hooks.js",
        "module.exports = {};",
    );
    write(dir.path(), "cartridges/int_pay/.project", "<projectDescription/>");
    write(dir.path(), "cartridges/int_pay/cartridge/int_pay.properties", "name=int_pay");
    write(dir.path(), "node_modules/sfcc-lib/.project", "<projectDescription/>");
    dir
}

fn archive_names(bytes: Vec<u8>) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .collect()
}

fn environment() -> Environment {
    let mut env = Environment::new("dev01.example.com").with_account("admin", "secret");
    env.code_version = Some("version7".to_string());
    env
}

struct TestFixture {
    ui: Arc<TestUserInterface>,
    webdav: Arc<FakeWebDav>,
    code_versions: MockCodeVersionManagerMock,
}

impl TestFixture {
    fn new(webdav: FakeWebDav) -> Self {
        Self {
            ui: Arc::new(TestUserInterface::new()),
            webdav: Arc::new(webdav),
            code_versions: MockCodeVersionManagerMock::new(),
        }
    }

    async fn run(self, args: &SyncArgs, env: &Environment) -> (anyhow::Result<i32>, Arc<TestUserInterface>, Arc<FakeWebDav>) {
        let deps = SyncDependencies {
            webdav: self.webdav.clone() as Arc<dyn WebDavClient>,
            code_versions: Arc::new(self.code_versions) as Arc<dyn CodeVersionManager>,
            ui: self.ui.clone() as Arc<dyn UserInterface>,
        };
        let result = execute_with_deps(args, env, &deps).await;
        (result, self.ui, self.webdav)
    }
}

fn args(directory: &Path, delete_and_reactivate: bool) -> SyncArgs {
    SyncArgs {
        directory: directory.to_path_buf(),
        delete_and_reactivate,
    }
}

#[test]
fn test_find_cartridges_skips_node_modules() {
    let dir = project();

    let names: Vec<String> = find_cartridges(dir.path())
        .unwrap()
        .into_iter()
        .map(|cartridge| cartridge.name)
        .collect();

    assert_eq!(names, vec!["app_site", "int_pay"]);
}

#[test]
fn test_find_cartridges_missing_directory() {
    let err = find_cartridges(Path::new("/nonexistent/project")).unwrap_err();
    assert!(err.to_string().starts_with("Cannot read"));
}

#[test]
fn test_archive_entries_are_rooted_at_code_version() {
    let dir = project();
    let cartridges = find_cartridges(dir.path()).unwrap();

    let cursor = write_archive(&cartridges, "version7", Cursor::new(Vec::new())).unwrap();

    assert_eq!(
        archive_names(cursor.into_inner()),
        vec![
            "version7/app_site/.project",
            "version7/app_site/cartridge/scripts/hooks.js",
            "version7/int_pay/.project",
            "version7/int_pay/cartridge/int_pay.properties",
        ]
    );
}

#[test]
fn test_build_archive_reports_size_of_written_file() {
    let dir = project();
    let cartridges = find_cartridges(dir.path()).unwrap();

    let (archive, size) = build_archive(&cartridges, "version7").unwrap();

    let bytes = fs::read(archive.path()).unwrap();
    assert_eq!(bytes.len() as u64, size);
    assert_eq!(archive_names(bytes).len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_sync_on_single_worker_runtime() {
    let dir = project();
    let fixture = TestFixture::new(FakeWebDav::new());

    let (result, _ui, webdav) = fixture.run(&args(dir.path(), false), &environment()).await;

    assert_eq!(result.unwrap(), 0);
    assert!(webdav.exists(Location::Cartridges, "version7.zip"));
}

#[tokio::test]
async fn test_sync_uploads_unzips_and_reactivates() {
    let dir = project();
    let at = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
    let webdav = FakeWebDav::new().with_file(Location::Cartridges, "version7/app_site/old.js", b"old", at);
    let mut fixture = TestFixture::new(webdav);
    fixture
        .code_versions
        .expect_activate_code_version()
        .withf(|id| id == "version7")
        .times(1)
        .returning(|_| Ok(true));

    let (result, ui, webdav) = fixture.run(&args(dir.path(), true), &environment()).await;

    assert_eq!(result.unwrap(), 0);
    assert_eq!(
        webdav.calls(),
        vec![
            format!("delete {}", Location::Cartridges.path("version7")),
            format!("put {}", Location::Cartridges.path("version7.zip")),
            format!("unzip {}", Location::Cartridges.path("version7.zip")),
        ]
    );
    assert!(!webdav.exists(Location::Cartridges, "version7/app_site/old.js"));

    let uploaded = webdav
        .contents(Location::Cartridges, "version7.zip")
        .unwrap();
    let size = uploaded.len() as u64;
    assert_eq!(archive_names(uploaded).len(), 4);
    assert_eq!(ui.get_progress(), vec![0, size]);
    assert!(ui.contains("Collecting app_site..."));
    assert!(ui.contains("Syncing code version version7 on dev01.example.com"));
    assert!(ui.contains("Successfully synced cartridges with dev01.example.com"));
}

#[tokio::test]
async fn test_sync_without_reactivation_leaves_code_version_alone() {
    let dir = project();
    let mut fixture = TestFixture::new(FakeWebDav::new());
    fixture.code_versions.expect_activate_code_version().never();

    let (result, _ui, webdav) = fixture.run(&args(dir.path(), false), &environment()).await;

    assert_eq!(result.unwrap(), 0);
    assert!(
        !webdav
            .calls()
            .iter()
            .any(|call| call.starts_with("delete"))
    );
}

#[tokio::test]
async fn test_sync_missing_code_version_only_warns_on_delete() {
    let dir = project();
    let mut fixture = TestFixture::new(FakeWebDav::new());
    fixture
        .code_versions
        .expect_activate_code_version()
        .returning(|_| Ok(true));

    let (result, ui, _webdav) = fixture.run(&args(dir.path(), true), &environment()).await;

    assert_eq!(result.unwrap(), 0);
    assert!(ui.get_styled_output().contains(&(
        "Code version was not deleted (may not exist)".to_string(),
        MessageStyle::Yellow
    )));
}

#[tokio::test]
async fn test_sync_unzip_refused_stops_before_activation() {
    let dir = project();
    let mut fixture = TestFixture::new(FakeWebDav::new().refusing("unzip"));
    fixture.code_versions.expect_activate_code_version().never();

    let (result, ui, _webdav) = fixture.run(&args(dir.path(), true), &environment()).await;

    assert_eq!(result.unwrap(), 1);
    assert!(ui.contains("Could not unzip code version"));
}

#[tokio::test]
async fn test_sync_activation_refused() {
    let dir = project();
    let mut fixture = TestFixture::new(FakeWebDav::new());
    fixture
        .code_versions
        .expect_activate_code_version()
        .returning(|_| Ok(false));

    let (result, ui, _webdav) = fixture.run(&args(dir.path(), true), &environment()).await;

    assert_eq!(result.unwrap(), 1);
    assert!(ui.contains("Could not activate code version"));
}

#[tokio::test]
async fn test_sync_requires_code_version() {
    let dir = project();
    let fixture = TestFixture::new(FakeWebDav::new());
    let env = Environment::new("dev01.example.com").with_account("admin", "secret");

    let (result, _ui, webdav) = fixture.run(&args(dir.path(), false), &env).await;

    assert_eq!(
        result.unwrap_err().to_string(),
        "A code version must be configured to sync cartridges"
    );
    assert!(webdav.calls().is_empty());
}

#[tokio::test]
async fn test_sync_without_cartridges() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "nothing here");
    let fixture = TestFixture::new(FakeWebDav::new());

    let (result, ui, webdav) = fixture.run(&args(dir.path(), false), &environment()).await;

    assert_eq!(result.unwrap(), 1);
    assert!(ui.contains("No cartridges found"));
    assert!(webdav.calls().is_empty());
}
