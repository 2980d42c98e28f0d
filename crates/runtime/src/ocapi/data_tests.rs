use std::sync::Arc;

use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::migrations::Migration;
use crate::test_helpers::{accessor_holding, test_environment};

const BASE: &str = "/s/-/dw/data/v20_8";

fn api(server: &MockServer) -> DataApi {
    DataApi::with_accessor(&test_environment(&server.uri()), Arc::new(accessor_holding("token"))).unwrap()
}

fn execution(id: &str) -> serde_json::Value {
    json!({ "id": id, "job_id": "ImportCatalog", "execution_status": "finished" })
}

#[tokio::test]
async fn test_sites_selects_all_properties() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/sites")))
        .and(query_param("select", "(**)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_v": "20.8",
            "count": 1,
            "data": [{ "id": "RefArch", "display_name": { "default": "Reference Architecture" } }],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sites = api(&server).sites().await.unwrap();

    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].name(), "Reference Architecture");
}

#[tokio::test]
async fn test_activate_code_version_patches_only_active() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/code_versions/v2")))
        .and(body_json(json!({ "active": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "v2", "active": true })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(api(&server).activate_code_version("v2").await.unwrap());
}

#[tokio::test]
async fn test_activate_code_version_reports_refusal_as_false() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "fault": { "type": "CodeVersionNotFoundException", "message": "missing" }
        })))
        .mount(&server)
        .await;

    assert!(!api(&server).activate_code_version("nope").await.unwrap());
}

#[tokio::test]
async fn test_delete_code_version_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{BASE}/code_versions/active")))
        .respond_with(ResponseTemplate::new(400).set_body_string("cannot delete active version"))
        .mount(&server)
        .await;

    let error = api(&server).delete_code_version("active").await.unwrap_err();

    assert_eq!(error.status(), Some(reqwest::StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn test_ids_are_encoded_as_single_path_segments() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{BASE}/code_versions/release%2F1%20a%3F")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/Import%2FCatalog/executions/42")))
        .respond_with(ResponseTemplate::new(200).set_body_json(execution("42")))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    api.delete_code_version("release/1 a?").await.unwrap();
    let execution = api.get_job_execution("Import/Catalog", "42").await.unwrap();

    assert_eq!(execution.id, "42");
}

#[tokio::test]
async fn test_get_job_execution_uses_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/ImportCatalog/executions/42")))
        .respond_with(ResponseTemplate::new(200).set_body_json(execution("42")))
        .expect(1)
        .mount(&server)
        .await;

    let execution = api(&server).get_job_execution("ImportCatalog", "42").await.unwrap();

    assert_eq!(execution.id, "42");
}

#[tokio::test]
async fn test_site_archive_export_posts_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/jobs/sfcc-site-archive-export/executions")))
        .and(body_partial_json(json!({
            "export_file": "backup.zip",
            "data_units": { "global_data": { "meta_data": true } }
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(execution("7")))
        .expect(1)
        .mount(&server)
        .await;

    let mut configuration = SiteArchiveExportConfiguration {
        export_file: "backup.zip".to_string(),
        ..SiteArchiveExportConfiguration::default()
    };
    configuration.data_units.global_data.meta_data = true;

    let execution = api(&server).site_archive_export(&configuration).await.unwrap();

    assert_eq!(execution.id, "7");
}

#[tokio::test]
async fn test_search_jobs_between_pages_through_results() {
    let server = MockServer::start().await;
    let first_page: Vec<serde_json::Value> = (0..25).map(|i| execution(&i.to_string())).collect();
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/job_execution_search")))
        .and(body_partial_json(json!({
            "start": 0,
            "query": { "filtered_query": { "filter": { "range_filter": {
                "field": "start_time",
                "from": "2020-01-01T00:00:00Z",
                "to": "2020-01-02T00:00:00Z"
            } } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 25, "start": 0, "total": 26,
            "hits": first_page
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/job_execution_search")))
        .and(body_partial_json(json!({ "start": 25 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1, "start": 25, "total": 26,
            "hits": [execution("25")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    let results = api.search_jobs_between(&start, &end).await.unwrap();
    assert_eq!(results.total(), 26);

    let executions: Vec<JobExecution> = results.into_stream().try_collect().await.unwrap();

    assert_eq!(executions.len(), 26);
    assert_eq!(executions[25].id, "25");
}

#[tokio::test]
async fn test_global_preferences_yield_migration_context() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "{BASE}/global_preferences/preference_groups/dwreMigrate/development"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "c_dwreMigrateCurrentVersion": "b",
            "c_dwreMigrateVersionPath": "a,b",
            "c_dwreMigrateHotfixes": "x"
        })))
        .mount(&server)
        .await;

    let preferences = api(&server)
        .global_preferences("dwreMigrate", "development")
        .await
        .unwrap();
    let context = preferences.migration_context().unwrap();

    assert_eq!(context.current, Some(Migration::new("b", Some("a"))));
    assert_eq!(context.hotfixes, vec![Migration::hotfix("x")]);
}

#[tokio::test]
async fn test_update_global_preferences_sends_csv() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!(
            "{BASE}/global_preferences/preference_groups/dwreMigrate/development"
        )))
        .and(body_json(json!({
            "c_dwreMigrateCurrentVersion": "c",
            "c_dwreMigrateVersionPath": "a,b,c"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "c_dwreMigrateCurrentVersion": "c",
            "c_dwreMigrateVersionPath": "a,b,c"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let preferences = OrganizationPreferences {
        migrate_current_version: Some("c".to_string()),
        migrate_version_path: Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        ..OrganizationPreferences::default()
    };

    let updated = api(&server)
        .update_global_preferences("dwreMigrate", "development", &preferences)
        .await
        .unwrap();

    assert_eq!(updated.migrate_current_version.as_deref(), Some("c"));
}
