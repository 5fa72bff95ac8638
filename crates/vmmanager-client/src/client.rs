//! Asynchronous VMmanager client implementation.

use crate::fetch::RetryingFetcher;
use crate::models::{
    DiskConfig, Listing, NewVmConfig, NodeInfo, OwnerChange, PasswordChange, ReinstallConfig,
    ResizeDiskRequest, ResourcesConfig, UpdateConfig, VmInfo,
};
use crate::mutation::{Mutation, MutationOrchestrator};
use crate::session::{HttpSession, Session};
use crate::sleep::{Sleeper, TokioSleeper};
use crate::task::{TaskPoller, TaskStatus, TaskWaiter};
use crate::Result;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use validator::Validate;
use vmmanager_core::query::{Predicate, QueryParams};
use vmmanager_core::{AccountId, ClientConfig, Error, TaskId, VmId, VmRef};

/// Builder for [`VmManagerClient`].
#[derive(Clone)]
pub struct VmManagerClientBuilder {
    config: ClientConfig,
    session: Option<Arc<dyn Session>>,
    sleeper: Arc<dyn Sleeper>,
}

impl VmManagerClientBuilder {
    /// Create a builder from a configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Use an existing transport instead of building an [`HttpSession`].
    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Override how the client waits between retries and task polls.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<VmManagerClient> {
        self.config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        let session: Arc<dyn Session> = match self.session {
            Some(session) => session,
            None => Arc::new(HttpSession::new(&self.config)?),
        };

        let fetcher = RetryingFetcher::new(
            Arc::clone(&session),
            Arc::clone(&self.sleeper),
            self.config.backoff_policy(),
        );
        let poller = TaskPoller::new(
            Arc::clone(&session),
            Arc::clone(&self.sleeper),
            self.config.poll_policy(),
        );
        let waiter: Arc<dyn TaskWaiter> = Arc::new(poller.clone());
        let orchestrator =
            MutationOrchestrator::new(Arc::clone(&session), waiter, self.config.task_timeout());

        Ok(VmManagerClient {
            username: Arc::new(RwLock::new(self.config.username.clone())),
            config: self.config,
            session,
            fetcher,
            poller,
            orchestrator,
        })
    }
}

/// Asynchronous VMmanager client.
///
/// Every method resolves to an explicit outcome; mutations that the service
/// defers to a background task return only once that task has completed or the
/// configured wait budget is spent.
///
/// Clones share one session: a login through any clone authenticates all of them
/// and is reflected by [`VmManagerClient::username`] on each.
#[derive(Clone)]
pub struct VmManagerClient {
    config: ClientConfig,
    username: Arc<RwLock<Option<String>>>,
    session: Arc<dyn Session>,
    fetcher: RetryingFetcher,
    poller: TaskPoller,
    orchestrator: MutationOrchestrator,
}

impl VmManagerClient {
    /// Construct a client directly from the configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        VmManagerClientBuilder::new(config).build()
    }

    /// Start a builder for the given configuration.
    #[must_use]
    pub fn builder(config: ClientConfig) -> VmManagerClientBuilder {
        VmManagerClientBuilder::new(config)
    }

    /// Build a client and log in with the configured credentials, unless an API
    /// token was supplied.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let credentials = match (&config.api_token, &config.username, &config.password) {
            (None, Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };

        let client = Self::new(config)?;
        if let Some((username, password)) = credentials {
            client.login(&username, &password).await?;
        }
        Ok(client)
    }

    /// The configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The login of the last successful [`VmManagerClient::login`], or the
    /// configured username.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.username.read().ok().and_then(|name| name.clone())
    }

    /// Exchange credentials for a session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.session.login(username, password).await?;
        match self.username.write() {
            Ok(mut slot) => *slot = Some(username.to_string()),
            Err(_) => warn!("username lock poisoned; keeping previous username"),
        }
        info!(username, "Logged in to VMmanager");
        Ok(())
    }

    /// Use a pre-issued API token.
    pub fn set_api_token(&self, token: &str) {
        self.session.set_api_token(token);
    }

    /// Provision a new VM and return its id.
    pub async fn create_vm(&self, params: &NewVmConfig) -> Result<VmId> {
        params.validate()?;
        let mutation =
            Mutation::post("host", params)?.describe(format!("create VM `{}`", params.name));
        self.orchestrator.submit(&mutation).await
    }

    /// Delete a VM.
    pub async fn delete_vm(&self, vmr: VmRef) -> Result<()> {
        let mutation = Mutation::delete(vm_path(vmr)).describe(format!("delete VM {vmr}"));
        self.orchestrator.submit(&mutation).await
    }

    /// Change CPU, memory or bandwidth limits.
    pub async fn update_resources(&self, vmr: VmRef, config: &ResourcesConfig) -> Result<()> {
        let mutation = Mutation::post(format!("{}/resource", vm_path(vmr)), config)?
            .describe(format!("update VM {vmr} resources"));
        self.orchestrator.submit(&mutation).await
    }

    /// Grow a disk.
    pub async fn resize_disk(&self, disk: &DiskConfig) -> Result<()> {
        let body = ResizeDiskRequest {
            size_mib: disk.size_mib,
        };
        let mutation = Mutation::post(format!("disk/{}", disk.id), &body)?
            .describe(format!("resize disk {} to {} MiB", disk.id, disk.size_mib));
        self.orchestrator.submit(&mutation).await
    }

    /// Change descriptive settings.
    ///
    /// Unlike the other mutations this does not wait for a deferred task; it only
    /// requires a non-empty response.
    pub async fn update_config(&self, vmr: VmRef, config: &UpdateConfig) -> Result<()> {
        let mutation = Mutation::post(vm_path(vmr), config)?
            .describe(format!("update VM {vmr} config"))
            .without_task_wait();
        self.orchestrator.submit(&mutation).await
    }

    /// Reinstall the operating system.
    pub async fn reinstall(&self, vmr: VmRef, config: &ReinstallConfig) -> Result<()> {
        let mutation = Mutation::post(format!("{}/reinstall", vm_path(vmr)), config)?
            .describe(format!("reinstall VM {vmr}"));
        self.orchestrator.submit(&mutation).await
    }

    /// Set a new root password.
    pub async fn change_password(&self, vmr: VmRef, password: &str) -> Result<()> {
        let mutation = Mutation::post(
            format!("{}/password", vm_path(vmr)),
            &PasswordChange { password },
        )?
        .describe(format!("change VM {vmr} password"));
        self.orchestrator.submit(&mutation).await
    }

    /// Transfer the VM to another account.
    pub async fn change_owner(&self, vmr: VmRef, owner: AccountId) -> Result<()> {
        let mutation = Mutation::post(
            format!("{}/account", vm_path(vmr)),
            &OwnerChange { account: owner },
        )?
        .describe(format!("change VM {vmr} owner to {owner}"));
        self.orchestrator.submit(&mutation).await
    }

    /// Fetch the record of a single VM.
    pub async fn get_vm_info(&self, vmr: VmRef) -> Result<VmInfo> {
        let query = QueryParams::filter(&Predicate::equals("id", vmr.vm_id()));
        let listing: Listing<VmInfo> = self.fetcher.fetch_as("host", &query).await?;
        listing
            .into_records()
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("can't find vm id {vmr}")))
    }

    /// Fetch the lifecycle state of a VM.
    pub async fn get_vm_state(&self, vmr: VmRef) -> Result<String> {
        self.get_vm_info(vmr)
            .await?
            .state
            .ok_or_else(|| Error::FieldMissing("state".to_string()))
    }

    /// List cluster nodes.
    pub async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let listing: Listing<NodeInfo> = self.fetcher.fetch_as("node", &[]).await?;
        Ok(listing.into_records())
    }

    /// List VMs.
    pub async fn list_vms(&self) -> Result<Vec<VmInfo>> {
        let listing: Listing<VmInfo> = self.fetcher.fetch_as("host", &[]).await?;
        Ok(listing.into_records())
    }

    /// Issue a plain `DELETE` against an arbitrary path.
    pub async fn delete_url(&self, path: &str) -> Result<()> {
        self.session.delete(path).await
    }

    /// Fetch a configuration document and return its `data` member.
    ///
    /// `label` names the document in the error raised when `data` is absent.
    pub async fn get_item_config(&self, path: &str, label: &str) -> Result<Value> {
        let mut document = self.fetcher.fetch(path, &[]).await?;
        match document.get_mut("data").map(Value::take) {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(Error::ConfigNotReadable(label.to_string())),
        }
    }

    /// [`VmManagerClient::get_item_config`] for an object payload.
    pub async fn get_item_config_map(&self, path: &str, label: &str) -> Result<Map<String, Value>> {
        match self.get_item_config(path, label).await? {
            Value::Object(map) => Ok(map),
            other => Err(type_mismatch(label, "an object", &other)),
        }
    }

    /// [`VmManagerClient::get_item_config`] for a string payload.
    pub async fn get_item_config_string(&self, path: &str, label: &str) -> Result<String> {
        match self.get_item_config(path, label).await? {
            Value::String(text) => Ok(text),
            other => Err(type_mismatch(label, "a string", &other)),
        }
    }

    /// [`VmManagerClient::get_item_config`] for an array payload.
    pub async fn get_item_config_array(&self, path: &str, label: &str) -> Result<Vec<Value>> {
        match self.get_item_config(path, label).await? {
            Value::Array(items) => Ok(items),
            other => Err(type_mismatch(label, "an array", &other)),
        }
    }

    /// Query the current status of a task once.
    pub async fn task_status(&self, task: TaskId) -> Result<TaskStatus> {
        self.poller.status(task).await
    }

    /// Wait for a task using the configured budget.
    pub async fn wait_for_task(&self, task: TaskId) -> Result<()> {
        self.poller.wait_default(task).await
    }
}

fn vm_path(vmr: VmRef) -> String {
    format!("host/{}", vmr.vm_id())
}

fn type_mismatch(label: &str, expected: &str, found: &Value) -> Error {
    Error::DecodeError(format!("{label} CONFIG data is not {expected}: {found}"))
}
