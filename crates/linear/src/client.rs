//! GraphQL client for Linear API.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::models::{
    Connection, ExternalLink, Issue, IssueCreateInput, Label, PageInfo, Project,
    ProjectCreateInput, ProjectRelation, ProjectRelationCreateInput, RelationSide,
};

/// Linear API endpoint
pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Page size for project, issue and relation connections
const PAGE_SIZE: u32 = 100;

/// Page size for the workspace label listing
const LABEL_PAGE_SIZE: u32 = 200;

/// Linear GraphQL client
#[derive(Debug, Clone)]
pub struct LinearClient {
    client: reqwest::Client,
    api_url: String,
    call_delay: Duration,
}

/// GraphQL request body
#[derive(Debug, Serialize)]
struct GraphQLRequest<V: Serialize> {
    query: &'static str,
    variables: V,
}

/// GraphQL response wrapper
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// GraphQL error
#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

/// Mutation payload carrying only a success flag
#[derive(Debug, Deserialize)]
struct SuccessResult {
    success: bool,
}

impl LinearClient {
    /// Create a new Linear client with access token.
    ///
    /// # Arguments
    /// * `access_token` - OAuth access token or Personal API key
    ///   - OAuth tokens: Use "Bearer" prefix (handled automatically)
    ///   - API keys (`lin_api_*`): Use token directly without prefix
    ///
    /// # Errors
    /// Returns error if headers cannot be constructed
    pub fn new(access_token: &str) -> Result<Self> {
        Self::with_url(access_token, LINEAR_API_URL)
    }

    /// Create a client against a custom API URL (self-hosted proxies, tests)
    pub fn with_url(access_token: &str, api_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        // Linear API keys (lin_api_*) should NOT use Bearer prefix
        let auth_value = if access_token.starts_with("lin_api_") {
            access_token.to_string()
        } else {
            format!("Bearer {access_token}")
        };

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).context("Invalid access token")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            call_delay: Duration::ZERO,
        })
    }

    /// Pause for `delay` after every request.
    ///
    /// Linear rate-limits per key; a small fixed pause keeps long provisioning
    /// runs under the limit without any retry machinery.
    #[must_use]
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Execute a GraphQL query/mutation
    async fn execute<V: Serialize, R: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: V,
    ) -> Result<R> {
        let request = GraphQLRequest { query, variables };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Linear API");

        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        let response = response?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Linear API returned error status {status}: {body}"));
        }

        let gql_response: GraphQLResponse<R> = response
            .json()
            .await
            .context("Failed to parse Linear API response")?;

        if let Some(errors) = gql_response.errors.filter(|e| !e.is_empty()) {
            let error_messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("GraphQL errors: {}", error_messages.join(", ")));
        }

        gql_response
            .data
            .ok_or_else(|| anyhow!("No data in GraphQL response"))
    }

    /// Walk a connection page by page until Linear reports no further page.
    async fn collect_pages<R, T>(
        &self,
        query: &'static str,
        mut variables: Map<String, Value>,
        page_size: u32,
        extract: impl Fn(R) -> Result<Connection<T>>,
    ) -> Result<Vec<T>>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            variables.insert("first".to_string(), json!(page_size));
            variables.insert("after".to_string(), json!(after));

            let response: R = self.execute(query, &variables).await?;
            let page = extract(response)?;
            items.extend(page.nodes);

            match page.page_info {
                PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                } => after = Some(cursor),
                PageInfo {
                    has_next_page: true,
                    end_cursor: None,
                } => bail!("Linear reported another page without an end cursor"),
                PageInfo { .. } => break,
            }
        }

        Ok(items)
    }

    // =========================================================================
    // Project Operations
    // =========================================================================

    /// Find a project whose name matches `name` exactly
    #[instrument(skip(self), fields(name = %name))]
    pub async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        #[derive(Serialize)]
        struct Variables<'a> {
            first: u32,
            after: Option<&'a str>,
        }

        #[derive(Deserialize)]
        struct Response {
            projects: Connection<Project>,
        }

        const QUERY: &str = r"
            query FindProjects($first: Int!, $after: String) {
                projects(first: $first, after: $after) {
                    nodes {
                        id
                        name
                        url
                    }
                    pageInfo {
                        hasNextPage
                        endCursor
                    }
                }
            }
        ";

        let mut after: Option<String> = None;
        loop {
            let response: Response = self
                .execute(
                    QUERY,
                    Variables {
                        first: PAGE_SIZE,
                        after: after.as_deref(),
                    },
                )
                .await?;

            let Connection { nodes, page_info } = response.projects;
            if let Some(project) = nodes.into_iter().find(|p| p.name == name) {
                debug!(project_id = %project.id, "Found project by name");
                return Ok(Some(project));
            }

            match page_info.end_cursor {
                Some(cursor) if page_info.has_next_page => after = Some(cursor),
                _ => return Ok(None),
            }
        }
    }

    /// Create a project
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_project(&self, input: ProjectCreateInput) -> Result<Project> {
        #[derive(Serialize)]
        struct Variables {
            input: ProjectCreateInput,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "projectCreate")]
            project_create: ProjectCreateResult,
        }

        #[derive(Deserialize)]
        struct ProjectCreateResult {
            success: bool,
            project: Option<Project>,
        }

        const MUTATION: &str = r"
            mutation CreateProject($input: ProjectCreateInput!) {
                projectCreate(input: $input) {
                    success
                    project {
                        id
                        name
                        url
                    }
                }
            }
        ";

        let response: Response = self.execute(MUTATION, Variables { input }).await?;

        if !response.project_create.success {
            return Err(anyhow!("Failed to create project"));
        }

        response
            .project_create
            .project
            .ok_or_else(|| anyhow!("Project not returned after creation"))
    }

    /// Delete a project. Returns `false` when Linear refuses the deletion.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn delete_project(&self, project_id: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "projectDelete")]
            project_delete: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation DeleteProject($id: String!) {
                projectDelete(id: $id) {
                    success
                }
            }
        ";

        let response: Response = self.execute(MUTATION, json!({ "id": project_id })).await?;
        Ok(response.project_delete.success)
    }

    /// Archive a project. Returns `false` when Linear refuses the archive.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn archive_project(&self, project_id: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "projectArchive")]
            project_archive: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation ArchiveProject($id: String!) {
                projectArchive(id: $id) {
                    success
                }
            }
        ";

        let response: Response = self.execute(MUTATION, json!({ "id": project_id })).await?;
        Ok(response.project_archive.success)
    }

    // =========================================================================
    // Issue Operations
    // =========================================================================

    /// List every issue of a project with its description and label names
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_project_issues(&self, project_id: &str) -> Result<Vec<Issue>> {
        #[derive(Deserialize)]
        struct Response {
            project: Option<ProjectIssues>,
        }

        #[derive(Deserialize)]
        struct ProjectIssues {
            issues: Connection<Issue>,
        }

        const QUERY: &str = r"
            query ProjectIssues($id: String!, $first: Int!, $after: String) {
                project(id: $id) {
                    issues(first: $first, after: $after) {
                        nodes {
                            id
                            title
                            description
                            labels {
                                nodes {
                                    name
                                }
                            }
                        }
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                    }
                }
            }
        ";

        let mut variables = Map::new();
        variables.insert("id".to_string(), json!(project_id));

        let issues = self
            .collect_pages(QUERY, variables, PAGE_SIZE, |response: Response| {
                response
                    .project
                    .map(|p| p.issues)
                    .ok_or_else(|| anyhow!("Project {project_id} not found"))
            })
            .await?;

        debug!(count = issues.len(), "Listed project issues");
        Ok(issues)
    }

    /// Create a new issue, returning its ID
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_issue(&self, input: IssueCreateInput) -> Result<String> {
        #[derive(Serialize)]
        struct Variables {
            input: IssueCreateInput,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueCreate")]
            issue_create: IssueCreateResult,
        }

        #[derive(Deserialize)]
        struct IssueCreateResult {
            success: bool,
            issue: Option<CreatedIssue>,
        }

        #[derive(Deserialize)]
        struct CreatedIssue {
            id: String,
        }

        const MUTATION: &str = r"
            mutation CreateIssue($input: IssueCreateInput!) {
                issueCreate(input: $input) {
                    success
                    issue {
                        id
                        title
                    }
                }
            }
        ";

        let response: Response = self.execute(MUTATION, Variables { input }).await?;

        if !response.issue_create.success {
            return Err(anyhow!("Failed to create issue"));
        }

        response
            .issue_create
            .issue
            .map(|i| i.id)
            .ok_or_else(|| anyhow!("Issue not returned after creation"))
    }

    /// Get an issue's description (empty when unset)
    #[instrument(skip(self), fields(issue_id = %issue_id))]
    pub async fn get_issue_description(&self, issue_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Response {
            issue: IssueDescription,
        }

        #[derive(Deserialize)]
        struct IssueDescription {
            description: Option<String>,
        }

        const QUERY: &str = r"
            query GetIssueDescription($id: String!) {
                issue(id: $id) {
                    description
                }
            }
        ";

        let response: Response = self.execute(QUERY, json!({ "id": issue_id })).await?;
        Ok(response.issue.description.unwrap_or_default())
    }

    /// Replace an issue's description
    #[instrument(skip(self, description), fields(issue_id = %issue_id))]
    pub async fn update_issue_description(&self, issue_id: &str, description: &str) -> Result<()> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueUpdate")]
            issue_update: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation UpdateIssueDescription($id: String!, $input: IssueUpdateInput!) {
                issueUpdate(id: $id, input: $input) {
                    success
                }
            }
        ";

        let response: Response = self
            .execute(
                MUTATION,
                json!({ "id": issue_id, "input": { "description": description } }),
            )
            .await?;

        if !response.issue_update.success {
            return Err(anyhow!("Failed to update issue description"));
        }

        Ok(())
    }

    // =========================================================================
    // Label Operations
    // =========================================================================

    /// List every issue label in the workspace
    #[instrument(skip(self))]
    pub async fn list_labels(&self) -> Result<Vec<Label>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueLabels")]
            issue_labels: Connection<Label>,
        }

        const QUERY: &str = r"
            query ListLabels($first: Int!, $after: String) {
                issueLabels(first: $first, after: $after) {
                    nodes {
                        id
                        name
                    }
                    pageInfo {
                        hasNextPage
                        endCursor
                    }
                }
            }
        ";

        self.collect_pages(QUERY, Map::new(), LABEL_PAGE_SIZE, |response: Response| {
            Ok(response.issue_labels)
        })
        .await
    }

    /// Create a workspace-scoped label
    #[instrument(skip(self), fields(name = %name))]
    pub async fn create_label(&self, name: &str) -> Result<Label> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "issueLabelCreate")]
            issue_label_create: LabelCreateResult,
        }

        #[derive(Deserialize)]
        struct LabelCreateResult {
            #[serde(rename = "issueLabel")]
            issue_label: Option<Label>,
        }

        const MUTATION: &str = r"
            mutation CreateLabel($input: IssueLabelCreateInput!) {
                issueLabelCreate(input: $input) {
                    success
                    issueLabel {
                        id
                        name
                    }
                }
            }
        ";

        let response: Response = self
            .execute(MUTATION, json!({ "input": { "name": name } }))
            .await?;

        response
            .issue_label_create
            .issue_label
            .ok_or_else(|| anyhow!("Failed to create label"))
    }

    // =========================================================================
    // Relation Operations
    // =========================================================================

    /// List relations declared on one side of a project
    #[instrument(skip(self), fields(project_id = %project_id, side = ?side))]
    pub async fn list_project_relations(
        &self,
        project_id: &str,
        side: RelationSide,
    ) -> Result<Vec<ProjectRelation>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            project: Option<ProjectRelations>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ProjectRelations {
            #[serde(alias = "inverseRelations")]
            relations: Connection<ProjectRelation>,
        }

        const OUTGOING_QUERY: &str = r"
            query ProjectRelations($id: String!, $first: Int!, $after: String) {
                project(id: $id) {
                    relations(first: $first, after: $after) {
                        nodes {
                            type
                            project { id name }
                            relatedProject { id name }
                        }
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                    }
                }
            }
        ";

        const INCOMING_QUERY: &str = r"
            query ProjectInverseRelations($id: String!, $first: Int!, $after: String) {
                project(id: $id) {
                    inverseRelations(first: $first, after: $after) {
                        nodes {
                            type
                            project { id name }
                            relatedProject { id name }
                        }
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                    }
                }
            }
        ";

        let query = match side {
            RelationSide::Outgoing => OUTGOING_QUERY,
            RelationSide::Incoming => INCOMING_QUERY,
        };

        let mut variables = Map::new();
        variables.insert("id".to_string(), json!(project_id));

        self.collect_pages(query, variables, PAGE_SIZE, |response: Response| {
            response
                .project
                .map(|p| p.relations)
                .ok_or_else(|| anyhow!("Project {project_id} not found"))
        })
        .await
    }

    /// Create a project relation
    #[instrument(skip(self, input), fields(from = %input.project_id, to = %input.related_project_id))]
    pub async fn create_project_relation(&self, input: ProjectRelationCreateInput) -> Result<()> {
        #[derive(Serialize)]
        struct Variables {
            input: ProjectRelationCreateInput,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "projectRelationCreate")]
            project_relation_create: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation CreateProjectRelation($input: ProjectRelationCreateInput!) {
                projectRelationCreate(input: $input) {
                    success
                    projectRelation {
                        id
                        type
                        anchorType
                        relatedAnchorType
                    }
                }
            }
        ";

        let response: Response = self.execute(MUTATION, Variables { input }).await?;

        if !response.project_relation_create.success {
            return Err(anyhow!("Failed to create project relation"));
        }

        Ok(())
    }

    // =========================================================================
    // External Link Operations
    // =========================================================================

    /// List external links (Resources) attached to a project
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_project_links(&self, project_id: &str) -> Result<Vec<ExternalLink>> {
        #[derive(Deserialize)]
        struct Response {
            project: Option<ProjectLinks>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ProjectLinks {
            external_links: Connection<ExternalLink>,
        }

        const QUERY: &str = r"
            query ProjectExternalLinks($id: String!, $first: Int!, $after: String) {
                project(id: $id) {
                    externalLinks(first: $first, after: $after) {
                        nodes {
                            id
                            url
                            label
                        }
                        pageInfo {
                            hasNextPage
                            endCursor
                        }
                    }
                }
            }
        ";

        let mut variables = Map::new();
        variables.insert("id".to_string(), json!(project_id));

        self.collect_pages(QUERY, variables, PAGE_SIZE, |response: Response| {
            response
                .project
                .map(|p| p.external_links)
                .ok_or_else(|| anyhow!("Project {project_id} not found"))
        })
        .await
    }

    /// Create an external link from a raw input object.
    ///
    /// The input shape of `entityExternalLinkCreate` differs between
    /// workspaces, so callers build the object themselves.
    #[instrument(skip(self, input))]
    pub async fn create_external_link(&self, input: &Map<String, Value>) -> Result<()> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "entityExternalLinkCreate")]
            link_create: SuccessResult,
        }

        const MUTATION: &str = r"
            mutation EntityExternalLinkCreate($input: EntityExternalLinkCreateInput!) {
                entityExternalLinkCreate(input: $input) {
                    success
                    entityExternalLink {
                        id
                        url
                        label
                    }
                }
            }
        ";

        let response: Response = self.execute(MUTATION, json!({ "input": input })).await?;

        if !response.link_create.success {
            return Err(anyhow!("Failed to create external link"));
        }

        Ok(())
    }

    // =========================================================================
    // Schema Introspection
    // =========================================================================

    /// Field names of a GraphQL input type, or `None` if the type is unknown
    #[instrument(skip(self), fields(type_name = %type_name))]
    pub async fn input_type_fields(&self, type_name: &str) -> Result<Option<Vec<String>>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "__type")]
            input_type: Option<InputType>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct InputType {
            #[serde(default)]
            input_fields: Option<Vec<InputField>>,
        }

        #[derive(Deserialize)]
        struct InputField {
            name: String,
        }

        const QUERY: &str = r"
            query InputTypeFields($name: String!) {
                __type(name: $name) {
                    inputFields {
                        name
                    }
                }
            }
        ";

        let response: Response = self.execute(QUERY, json!({ "name": type_name })).await?;

        Ok(response
            .input_type
            .and_then(|t| t.input_fields)
            .map(|fields| fields.into_iter().map(|f| f.name).collect()))
    }
}
