//! Docker runtime capability using Bollard
//!
//! The bot only issues one-shot calls against the daemon: list, start, stop,
//! inspect and logs. They sit behind [`ContainerRuntime`] so the transport
//! layer can be exercised against a fake daemon.

use crate::config::{COMPOSE_PROJECT_LABEL, DEFAULT_LOG_TAIL, STOP_TIMEOUT_SECS};
use async_trait::async_trait;
use bollard::models::ContainerSummary;
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, ListImagesOptions, LogsOptionsBuilder,
    StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::Docker;
use futures_util::TryStreamExt;
use lazy_regex::regex_is_match;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors returned by runtime operations.
///
/// The `Display` output is shown verbatim to administrators.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Error reported by the Docker daemon or its client
    #[error("{0}")]
    Docker(#[from] bollard::errors::Error),
    /// Error serializing an inspect record
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Running
    Running,
    /// Created but never started
    Created,
    /// Restarting
    Restarting,
    /// Being removed
    Removing,
    /// Paused
    Paused,
    /// Exited
    Exited,
    /// Dead
    Dead,
    /// Anything the daemon reports that is not listed above
    Unknown,
}

impl ResourceState {
    /// Parse the state string reported by the daemon.
    #[must_use]
    pub fn parse(state: &str) -> Self {
        match state {
            "running" => Self::Running,
            "created" => Self::Created,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "paused" => Self::Paused,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// State name as used in daemon filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Created => "created",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Paused => "paused",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one container as returned by a listing.
///
/// Never cached: every listing request fetches fresh snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Full container id
    pub id: String,
    /// Primary container name as reported by the daemon (usually `/name`)
    pub name: String,
    /// Lifecycle state
    pub state: ResourceState,
    /// Human readable status, e.g. "Up 3 hours"
    pub status: String,
    /// Image the container was created from
    pub image: String,
    /// Compose project the container belongs to
    pub stack: Option<String>,
}

impl Resource {
    /// Name without the leading `/` the daemon prepends.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }

    /// First `len` characters of the id, or the whole id if it is shorter.
    #[must_use]
    pub fn short_id(&self, len: usize) -> &str {
        self.id
            .char_indices()
            .nth(len)
            .map_or(self.id.as_str(), |(pos, _)| &self.id[..pos])
    }

    fn from_summary(summary: ContainerSummary) -> Self {
        let stack = summary
            .labels
            .as_ref()
            .and_then(|labels| labels.get(COMPOSE_PROJECT_LABEL))
            .cloned();
        let name = summary
            .names
            .and_then(|names| names.into_iter().next())
            .unwrap_or_default();
        let state = summary
            .state
            .as_ref()
            .map_or(ResourceState::Unknown, |s| ResourceState::parse(&s.to_string()));

        Self {
            id: summary.id.unwrap_or_default(),
            name,
            state,
            status: summary.status.unwrap_or_default(),
            image: summary.image.unwrap_or_default(),
            stack,
        }
    }
}

/// Summary of one locally installed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Image id, including the `sha256:` prefix
    pub id: String,
    /// Repository tags; empty for dangling images
    pub tags: Vec<String>,
}

impl ImageSummary {
    /// Twelve hex characters of the digest, without the `sha256:` prefix.
    #[must_use]
    pub fn short_id(&self) -> &str {
        let digest = self.id.strip_prefix("sha256:").unwrap_or(&self.id);
        digest
            .char_indices()
            .nth(12)
            .map_or(digest, |(pos, _)| &digest[..pos])
    }

    /// First repository tag, or `<none>` for dangling images.
    #[must_use]
    pub fn primary_tag(&self) -> &str {
        self.tags.first().map_or("<none>", String::as_str)
    }
}

/// Container listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Include stopped containers
    pub all: bool,
    /// Only containers in this state
    pub state: Option<ResourceState>,
    /// Only containers carrying this label key
    pub label: Option<String>,
}

impl ListFilter {
    /// Running containers only.
    #[must_use]
    pub fn running() -> Self {
        Self::default()
    }

    /// Every container regardless of state.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Every container in the given state.
    #[must_use]
    pub fn with_state(state: ResourceState) -> Self {
        Self {
            all: true,
            state: Some(state),
            label: None,
        }
    }

    /// Every container that belongs to a compose project.
    #[must_use]
    pub fn compose_projects() -> Self {
        Self {
            all: true,
            state: None,
            label: Some(COMPOSE_PROJECT_LABEL.to_string()),
        }
    }

    fn into_options(self) -> ListContainersOptions {
        let mut filters = HashMap::new();
        if let Some(state) = self.state {
            filters.insert("status".to_string(), vec![state.as_str().to_string()]);
        }
        if let Some(label) = self.label {
            filters.insert("label".to_string(), vec![label]);
        }

        ListContainersOptions {
            all: self.all,
            filters: if filters.is_empty() {
                None
            } else {
                Some(filters)
            },
            ..Default::default()
        }
    }
}

/// Number of trailing log lines to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    /// The whole log
    All,
    /// The last n lines
    Lines(u64),
}

impl LogTail {
    /// Parse a user supplied tail.
    ///
    /// `"all"` and plain numbers are honored; anything else falls back to
    /// the default of ten lines.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("all") => Self::All,
            Some(n) => n
                .parse()
                .map_or(Self::Lines(DEFAULT_LOG_TAIL), Self::Lines),
            None => Self::Lines(DEFAULT_LOG_TAIL),
        }
    }
}

impl Default for LogTail {
    fn default() -> Self {
        Self::Lines(DEFAULT_LOG_TAIL)
    }
}

impl fmt::Display for LogTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Lines(n) => write!(f, "{n}"),
        }
    }
}

/// Whether `id` looks like a container id the daemon will accept.
///
/// Accepts 10 to 12 hexadecimal characters, which covers both the short ids
/// shown in listings and the prefixes carried by menu buttons.
///
/// # Examples
///
/// ```
/// use teledock_core::runtime::is_valid_resource_id;
/// assert!(is_valid_resource_id("4f2a9c01bd"));
/// assert!(!is_valid_resource_id("nginx"));
/// ```
#[must_use]
pub fn is_valid_resource_id(id: &str) -> bool {
    regex_is_match!(r"^[A-Fa-f0-9]{10,12}$", id)
}

/// Group compose containers by project name, in name order.
#[must_use]
pub fn group_stacks(resources: Vec<Resource>) -> BTreeMap<String, Vec<Resource>> {
    let mut stacks: BTreeMap<String, Vec<Resource>> = BTreeMap::new();
    for resource in resources {
        if let Some(stack) = resource.stack.clone() {
            stacks.entry(stack).or_default().push(resource);
        }
    }
    stacks
}

/// One-shot operations against the container runtime.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List containers matching `filter`
    async fn list(&self, filter: ListFilter) -> Result<Vec<Resource>, RuntimeError>;
    /// List locally installed images
    async fn list_images(&self) -> Result<Vec<ImageSummary>, RuntimeError>;
    /// Start a stopped container
    async fn start(&self, id: &str) -> Result<(), RuntimeError>;
    /// Stop a running container
    async fn stop(&self, id: &str) -> Result<(), RuntimeError>;
    /// Detailed record of a container, pretty-printed as JSON
    async fn inspect(&self, id: &str) -> Result<String, RuntimeError>;
    /// Stdout and stderr of a container, in emission order
    async fn logs(&self, id: &str, tail: LogTail) -> Result<Vec<String>, RuntimeError>;
}

/// [`ContainerRuntime`] backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon using the local defaults (`DOCKER_HOST` or the unix socket).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured.
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        info!("Connected to the docker daemon");
        Ok(Self { docker })
    }

    /// Health check against the daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon does not answer.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await?;
        let version = self.docker.version().await?;
        info!(
            api_version = version.api_version.as_deref().unwrap_or("unknown"),
            "Docker daemon health check passed"
        );
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self))]
    async fn list(&self, filter: ListFilter) -> Result<Vec<Resource>, RuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(filter.into_options()))
            .await?;
        debug!(count = containers.len(), "Listed containers");
        Ok(containers.into_iter().map(Resource::from_summary).collect())
    }

    #[instrument(skip(self))]
    async fn list_images(&self) -> Result<Vec<ImageSummary>, RuntimeError> {
        let images = self
            .docker
            .list_images(None::<ListImagesOptions>)
            .await?;
        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                id: image.id,
                tags: image.repo_tags,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await?;
        info!(container_id = %id, "Container started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(
                id,
                Some(StopContainerOptionsBuilder::new().t(STOP_TIMEOUT_SECS).build()),
            )
            .await?;
        info!(container_id = %id, "Container stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn inspect(&self, id: &str) -> Result<String, RuntimeError> {
        let record = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(serde_json::to_string_pretty(&record)?)
    }

    #[instrument(skip(self))]
    async fn logs(&self, id: &str, tail: LogTail) -> Result<Vec<String>, RuntimeError> {
        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .tail(&tail.to_string())
            .build();

        let segments: Vec<String> = self
            .docker
            .logs(id, Some(options))
            .map_ok(|output| output.to_string())
            .try_collect()
            .await?;
        debug!(container_id = %id, segments = segments.len(), "Fetched logs");
        Ok(segments)
    }
}
