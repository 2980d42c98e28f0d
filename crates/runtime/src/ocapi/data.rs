use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use reqwest::Method;
use tracing::{debug, warn};

use super::types::{
    CodeVersion, CodeVersionPatch, DataCollection, JobExecution, OrganizationPreferences, Site,
    SiteArchiveExportConfiguration, SiteArchiveImportConfiguration,
};
use crate::accessor::{ClientCredentialsAccessor, TokenAccessor};
use crate::client::{AuthenticatingClient, ensure_success};
use crate::config::{Environment, OCAPI_VERSION};
use crate::error::{ClientError, ClientResult, ConfigError};
use crate::search::{PageFetcher, SearchPage, SearchRequest, SearchResults};

const SITE_ARCHIVE_EXPORT_JOB: &str = "sfcc-site-archive-export";
const SITE_ARCHIVE_IMPORT_JOB: &str = "sfcc-site-archive-import";

/// OCAPI Data API client
#[derive(Clone)]
pub struct DataApi {
    client: AuthenticatingClient,
}

impl DataApi {
    /// Client using the client credentials grant of `env`
    pub fn new(env: &Environment) -> Result<Self, ConfigError> {
        let accessor = Arc::new(ClientCredentialsAccessor::new(env)?);
        Self::with_accessor(env, accessor)
    }

    /// Client sharing an existing token accessor
    pub fn with_accessor(env: &Environment, accessor: Arc<dyn TokenAccessor>) -> Result<Self, ConfigError> {
        let base_url = format!("{}/s/-/dw/data/{OCAPI_VERSION}", env.base_url());
        Ok(Self::from_client(AuthenticatingClient::new(env.http_client()?, base_url, accessor)))
    }

    /// Client over an already configured authenticating client
    pub const fn from_client(client: AuthenticatingClient) -> Self {
        Self { client }
    }

    /// Every site of the instance
    pub async fn sites(&self) -> ClientResult<Vec<Site>> {
        let request = self.client.request(Method::GET, "/sites").query(&[("select", "(**)")]);
        let sites: DataCollection<Site> = self.client.send_json(request).await?;
        Ok(sites.data)
    }

    /// Every code version of the instance
    pub async fn code_versions(&self) -> ClientResult<Vec<CodeVersion>> {
        let versions: DataCollection<CodeVersion> = self
            .client
            .send_json(self.client.request(Method::GET, "/code_versions"))
            .await?;
        Ok(versions.data)
    }

    /// Apply `patch` to code version `id`
    pub async fn update_code_version(&self, id: &str, patch: &CodeVersionPatch) -> ClientResult<CodeVersion> {
        let request = self
            .client
            .request_segments(Method::PATCH, &["code_versions", id])
            .json(patch);
        self.client.send_json(request).await
    }

    /// Make `id` the active code version.
    ///
    /// Returns false if the instance refused, for example because the code
    /// version does not exist.
    pub async fn activate_code_version(&self, id: &str) -> ClientResult<bool> {
        match self.update_code_version(id, &CodeVersionPatch::activate()).await {
            Ok(version) => Ok(version.active),
            Err(error @ ClientError::Status { .. }) => {
                warn!(code_version = id, %error, "code version activation refused");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Delete code version `id`; the active version cannot be deleted
    pub async fn delete_code_version(&self, id: &str) -> ClientResult<()> {
        let response = self
            .client
            .send(self.client.request_segments(Method::DELETE, &["code_versions", id]))
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Start an execution of `job_id`
    pub async fn create_job_execution(&self, job_id: &str) -> ClientResult<JobExecution> {
        debug!(job_id, "starting job");
        self.client
            .send_json(
                self.client
                    .request_segments(Method::POST, &["jobs", job_id, "executions"]),
            )
            .await
    }

    /// Execution `id` of `job_id`, to poll its status
    pub async fn get_job_execution(&self, job_id: &str, id: &str) -> ClientResult<JobExecution> {
        self.client
            .send_json(
                self.client
                    .request_segments(Method::GET, &["jobs", job_id, "executions", id]),
            )
            .await
    }

    /// Start a site archive export
    pub async fn site_archive_export(
        &self,
        configuration: &SiteArchiveExportConfiguration,
    ) -> ClientResult<JobExecution> {
        let request = self
            .client
            .request_segments(Method::POST, &["jobs", SITE_ARCHIVE_EXPORT_JOB, "executions"])
            .json(configuration);
        self.client.send_json(request).await
    }

    /// Start a site archive import of an archive already uploaded to Impex
    pub async fn site_archive_import(
        &self,
        configuration: &SiteArchiveImportConfiguration,
    ) -> ClientResult<JobExecution> {
        let request = self
            .client
            .request_segments(Method::POST, &["jobs", SITE_ARCHIVE_IMPORT_JOB, "executions"])
            .json(configuration);
        self.client.send_json(request).await
    }

    /// Run one page of a job execution search
    pub async fn search_job_executions(&self, request: &SearchRequest) -> ClientResult<SearchPage<JobExecution>> {
        self.client
            .send_json(self.client.request(Method::POST, "/job_execution_search").json(request))
            .await
    }

    /// All job executions started between `start` and `end`, oldest first
    pub async fn search_jobs_between<Tz: TimeZone>(
        &self,
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> ClientResult<SearchResults<'_, JobExecution>> {
        SearchResults::fetch(self, SearchRequest::between("start_time", start, end)).await
    }

    /// Organization preferences of `group` for `instance_type`
    /// (`development`, `staging`, `production` or `current`)
    pub async fn global_preferences(&self, group: &str, instance_type: &str) -> ClientResult<OrganizationPreferences> {
        self.client
            .send_json(
                self.client
                    .request_segments(Method::GET, &preference_group(group, instance_type)),
            )
            .await
    }

    /// Update organization preferences of `group` for `instance_type`
    pub async fn update_global_preferences(
        &self,
        group: &str,
        instance_type: &str,
        preferences: &OrganizationPreferences,
    ) -> ClientResult<OrganizationPreferences> {
        let request = self
            .client
            .request_segments(Method::PATCH, &preference_group(group, instance_type))
            .json(preferences);
        self.client.send_json(request).await
    }
}

fn preference_group<'a>(group: &'a str, instance_type: &'a str) -> [&'a str; 4] {
    ["global_preferences", "preference_groups", group, instance_type]
}

#[async_trait]
impl PageFetcher<JobExecution> for DataApi {
    async fn fetch_page(&self, request: &SearchRequest) -> ClientResult<SearchPage<JobExecution>> {
        self.search_job_executions(request).await
    }
}

#[cfg(test)]
#[path = "data_tests.rs"]
mod tests;
