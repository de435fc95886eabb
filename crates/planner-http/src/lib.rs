//! Planner HTTP - `reqwest` backend for the planner
//!
//! Implements [`CatalogApi`] against the catalog, summary and operational
//! endpoints:
//! - forwards the configured bearer credential verbatim
//! - reads every body as text and decodes it with `planner_core::wire`
//! - turns non-success statuses into `PlannerError::Http` with the body's
//!   `detail` or `message`

#![warn(unreachable_pub)]

use async_trait::async_trait;
use planner_core::wire;
use planner_core::{
    CatalogApi, Leaf, LeafId, LeafSummary, OperationalRecord, PatchReceipt, PlannerConfig,
    PlannerError, Program, ProgramId, RecordId, RecordPatch, Tenant, TenantId,
};
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;

/// Backend client
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpCatalog {
    /// Build client from config
    ///
    /// # Errors
    /// `PlannerError::Config` for an unusable base URL or client settings
    pub fn new(config: &PlannerConfig) -> Result<Self, PlannerError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| PlannerError::Config(format!("http client: {e}")))?;
        Self::with_client(client, &config.base_url, config.token.clone())
    }

    /// Wrap an existing client
    ///
    /// # Errors
    /// `PlannerError::Config` if `base_url` is not an absolute http(s) URL
    pub fn with_client(
        client: Client,
        base_url: &str,
        token: Option<String>,
    ) -> Result<Self, PlannerError> {
        let base = Url::parse(base_url)
            .map_err(|e| PlannerError::Config(format!("base_url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(PlannerError::Config(format!(
                "base_url '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            base,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Base URL in use
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join percent-encoded path segments onto the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PlannerError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| PlannerError::Config("base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, segments: &[&str]) -> Result<String, PlannerError> {
        let url = self.endpoint(segments)?;
        self.send(self.client.get(url)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, PlannerError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await.map_err(transport)?;

        if status.is_success() {
            tracing::trace!(%url, status = status.as_u16(), bytes = body.len(), "response");
            Ok(body)
        } else {
            let detail = wire::error_detail(status.as_u16(), &body);
            tracing::debug!(%url, status = status.as_u16(), %detail, "request failed");
            Err(PlannerError::http(status.as_u16(), detail))
        }
    }
}

fn transport(e: reqwest::Error) -> PlannerError {
    if e.is_decode() {
        PlannerError::Decode(e.to_string())
    } else {
        PlannerError::Transport(e.to_string())
    }
}

#[async_trait]
impl CatalogApi for HttpCatalog {
    async fn list_programs(&self) -> Result<Vec<Program>, PlannerError> {
        let body = self.get(&["catalogo", "subprogramas"]).await?;
        wire::parse_programs(&body)
    }

    async fn list_leaves(&self, program_id: ProgramId) -> Result<Vec<Leaf>, PlannerError> {
        let id = program_id.to_string();
        let body = self
            .get(&["catalogo", "subprogramas", &id, "submodulos"])
            .await?;
        wire::parse_leaves(&body, program_id)
    }

    async fn leaf_summary(
        &self,
        tenant_id: TenantId,
        leaf_id: LeafId,
    ) -> Result<LeafSummary, PlannerError> {
        let (tenant, leaf) = (tenant_id.to_string(), leaf_id.to_string());
        let body = self
            .get(&["api", "resumen", "submodulo", &tenant, &leaf])
            .await?;
        wire::parse_leaf_summary(&body)
    }

    async fn legacy_leaf_summary(&self, leaf_id: LeafId) -> Result<LeafSummary, PlannerError> {
        let leaf = leaf_id.to_string();
        let body = self.get(&["api", "resumen", "submodulo", &leaf]).await?;
        wire::parse_leaf_summary(&body)
    }

    async fn leaf_records(
        &self,
        tenant_slug: &str,
        leaf_id: LeafId,
    ) -> Result<Vec<OperationalRecord>, PlannerError> {
        let leaf = leaf_id.to_string();
        let body = self
            .get(&["operacion", "ies", tenant_slug, "submodulos", &leaf, "evidencias"])
            .await?;
        wire::parse_operational_records(&body)
    }

    async fn patch_record(
        &self,
        record_id: RecordId,
        patch: &RecordPatch,
    ) -> Result<PatchReceipt, PlannerError> {
        let id = record_id.to_string();
        let url = self.endpoint(&["operacion", "evidencias", &id])?;
        let body = self.send(self.client.patch(url).json(patch)).await?;
        wire::parse_patch_receipt(&body)
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, PlannerError> {
        let body = self.get(&["ies", ""]).await?;
        wire::parse_tenants(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(base: &str) -> HttpCatalog {
        HttpCatalog::with_client(Client::new(), base, Some("t0k".into())).unwrap()
    }

    #[test]
    fn endpoint_joins_and_encodes_segments() {
        let api = catalog("http://host:8000/");
        let url = api
            .endpoint(&["operacion", "ies", "san josé", "submodulos", "10", "evidencias"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://host:8000/operacion/ies/san%20jos%C3%A9/submodulos/10/evidencias"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let api = catalog("http://host/backend");
        let url = api.endpoint(&["ies", ""]).unwrap();
        assert_eq!(url.as_str(), "http://host/backend/ies/");
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            HttpCatalog::with_client(Client::new(), "not a url", None),
            Err(PlannerError::Config(_))
        ));
        assert!(matches!(
            HttpCatalog::with_client(Client::new(), "mailto:x@y", None),
            Err(PlannerError::Config(_))
        ));
    }

    #[test]
    fn empty_token_is_dropped() {
        let api = HttpCatalog::with_client(Client::new(), "http://h", Some(String::new())).unwrap();
        assert!(api.token.is_none());
    }
}
