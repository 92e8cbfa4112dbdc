//! The [`Studio`] facade.

use crate::config::StudioConfig;
use crate::error::StudioError;
use atelier_core::Clock;
use atelier_jobs::{AccessRequest, AuthGate, Job, JobError, JobId, JobStatus, JobTracker, TrackerConfig};
use atelier_models::{Dispatcher, GenerationRequest, GenerationResult, MediaOutput, ModelRegistry};
use atelier_persistence::Store;
use atelier_tree::{
    AttachmentId, ConversationError, ConversationId, Conversations, MediaAttachment, MediaKind, NodeId,
    Role, TreeError,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One message of the active branch, shaped for a chat model prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMessage {
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Vision inputs followed by generated images.
    pub images: Vec<String>,
}

/// What a finished generation left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// The job in its terminal state.
    pub job: Job,
    /// Attachments added to the originating message.
    pub attachments: Vec<AttachmentId>,
}

/// A submitted generation and the task watching it.
///
/// Dropping this detaches the watcher; media is still attached when the job
/// completes.
#[derive(Debug)]
pub struct Generation {
    job_id: JobId,
    watcher: JoinHandle<Result<GenerationOutcome, StudioError>>,
}

impl Generation {
    /// Returns the job id.
    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Waits for the watcher to finish.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::WatchTimeout`] if the job outlived the watch
    /// timeout, a conversation error if the media could not be attached, or
    /// [`StudioError::Watcher`] if the task panicked.
    pub async fn finished(self) -> Result<GenerationOutcome, StudioError> {
        self.watcher
            .await
            .map_err(|err| StudioError::Watcher(err.to_string()))?
    }
}

/// Counts of records restored by [`Studio::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restored {
    /// Conversations loaded.
    pub conversations: usize,
    /// Jobs loaded.
    pub jobs: usize,
}

/// Builder for [`Studio`].
pub struct StudioBuilder {
    dispatcher: Arc<Dispatcher>,
    gate: Option<Arc<dyn AuthGate>>,
    store: Option<Arc<dyn Store>>,
    clock: Clock,
    tracker_config: TrackerConfig,
    config: StudioConfig,
}

impl StudioBuilder {
    /// Uses `gate` to authorize generation requests.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn AuthGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Writes conversations and jobs through to `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the clock shared by conversations and jobs.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the job tracker configuration.
    #[must_use]
    pub fn with_tracker_config(mut self, config: TrackerConfig) -> Self {
        self.tracker_config = config;
        self
    }

    /// Sets how submitted jobs are followed.
    #[must_use]
    pub fn with_config(mut self, config: StudioConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the studio.
    #[must_use]
    pub fn build(self) -> Studio {
        let mut tracker = JobTracker::builder(self.dispatcher)
            .with_clock(self.clock.clone())
            .with_config(self.tracker_config);
        if let Some(gate) = self.gate {
            tracker = tracker.with_gate(gate);
        }
        let conversations = match self.store {
            Some(store) => {
                tracker = tracker.with_store(Arc::clone(&store));
                Conversations::with_store(store, self.clock)
            }
            None => Conversations::new(self.clock),
        };

        Studio {
            conversations: Arc::new(conversations),
            tracker: tracker.build(),
            config: self.config,
        }
    }
}

/// Ties conversations to generation jobs.
///
/// A generation is requested from a message; when its job completes, the
/// image and video outputs are attached to that message. Conversations and
/// jobs stay independently usable through [`conversations`](Self::conversations)
/// and [`tracker`](Self::tracker).
#[derive(Debug, Clone)]
pub struct Studio {
    conversations: Arc<Conversations>,
    tracker: JobTracker,
    config: StudioConfig,
}

impl Studio {
    /// Starts building a studio over `dispatcher`.
    #[must_use]
    pub fn builder(dispatcher: Arc<Dispatcher>) -> StudioBuilder {
        StudioBuilder {
            dispatcher,
            gate: None,
            store: None,
            clock: Clock::default(),
            tracker_config: TrackerConfig::default(),
            config: StudioConfig::default(),
        }
    }

    /// Returns the conversations.
    #[must_use]
    pub fn conversations(&self) -> &Arc<Conversations> {
        &self.conversations
    }

    /// Returns the job tracker.
    #[must_use]
    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Returns the model registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.tracker.dispatcher().registry()
    }

    /// Returns the watcher settings.
    #[must_use]
    pub fn config(&self) -> StudioConfig {
        self.config
    }

    /// Loads conversations and jobs from the store.
    ///
    /// # Errors
    ///
    /// Returns a conversation error if any stored tree is corrupt (nothing
    /// is loaded in that case), or a job error if the store fails.
    pub fn restore(&self) -> Result<Restored, StudioError> {
        let conversations = self.conversations.load_all()?.len();
        let jobs = self.tracker.load()?;
        tracing::info!(conversations, jobs, "studio state restored");
        Ok(Restored { conversations, jobs })
    }

    /// Submits a generation requested from `node` and follows it.
    ///
    /// The job id is available immediately on the returned [`Generation`].
    /// A spawned watcher waits for the job to finish and attaches its image
    /// and video outputs, with the request prompt, to `node`.
    ///
    /// # Errors
    ///
    /// Returns a conversation error if the conversation or node does not
    /// exist, or a job error if the request is refused. No job is created on
    /// error.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub async fn request_generation(
        &self,
        conversation: &ConversationId,
        node: &NodeId,
        access: &AccessRequest,
        request: GenerationRequest,
        model_id: Option<&str>,
    ) -> Result<Generation, StudioError> {
        if !self.conversations.with_tree(conversation, |tree| tree.contains(node))? {
            return Err(ConversationError::from(TreeError::NotFound(node.clone())).into());
        }

        let prompt = request.prompt().map(str::to_string);
        let job_id = self.tracker.submit_as(access, request, model_id).await?;
        tracing::info!(conversation = %conversation, node = %node, job_id = %job_id, "generation requested");

        let watcher = tokio::spawn(self.clone().watch(conversation.clone(), node.clone(), job_id.clone(), prompt));
        Ok(Generation { job_id, watcher })
    }

    async fn watch(
        self,
        conversation: ConversationId,
        node: NodeId,
        job_id: JobId,
        prompt: Option<String>,
    ) -> Result<GenerationOutcome, StudioError> {
        let deadline = Instant::now() + self.config.watch_timeout;
        let job = loop {
            match self.tracker.wait(&job_id, self.config.poll_interval).await {
                Ok(job) => break job,
                Err(JobError::WaitTimeout { .. }) if Instant::now() < deadline => {
                    if let Err(error) = self.tracker.poll(&job_id, self.config.poll_timeout).await {
                        tracing::debug!(job_id = %job_id, %error, "watcher poll failed");
                    }
                }
                Err(JobError::WaitTimeout { .. }) => {
                    tracing::warn!(job_id = %job_id, "gave up watching generation");
                    return Err(StudioError::WatchTimeout {
                        job_id,
                        timeout: self.config.watch_timeout,
                    });
                }
                Err(error) => return Err(error.into()),
            }
        };

        let attachments = match (job.status(), job.result()) {
            (JobStatus::Completed, Some(result)) => {
                self.attach_outputs(&conversation, &node, result, prompt.as_deref())?
            }
            _ => Vec::new(),
        };
        tracing::info!(
            job_id = %job_id,
            conversation = %conversation,
            status = %job.status(),
            attachments = attachments.len(),
            "generation finished"
        );
        Ok(GenerationOutcome { job, attachments })
    }

    fn attach_outputs(
        &self,
        conversation: &ConversationId,
        node: &NodeId,
        result: &GenerationResult,
        prompt: Option<&str>,
    ) -> Result<Vec<AttachmentId>, StudioError> {
        let thumbnail = result.thumbnail();
        let attachments: Vec<MediaAttachment> = result
            .media()
            .into_iter()
            .map(|output| {
                let attachment = match output {
                    MediaOutput::Image(url) => MediaAttachment::new(MediaKind::Image, url),
                    MediaOutput::Video(url) => {
                        let attachment = MediaAttachment::new(MediaKind::Video, url);
                        match thumbnail {
                            Some(thumbnail) => attachment.with_thumbnail(thumbnail),
                            None => attachment,
                        }
                    }
                };
                match prompt {
                    Some(prompt) => attachment.with_prompt(prompt),
                    None => attachment,
                }
            })
            .collect();
        if attachments.is_empty() {
            return Ok(Vec::new());
        }

        let ids = attachments.iter().map(|attachment| attachment.id.clone()).collect();
        self.conversations.update(conversation, |c| {
            attachments
                .into_iter()
                .try_for_each(|attachment| c.tree.attach_media(node, attachment))
        })?;
        Ok(ids)
    }

    /// Returns the active branch of a conversation as prompt context.
    ///
    /// # Errors
    ///
    /// Returns a conversation error if the conversation does not exist.
    pub fn context_for(&self, conversation: &ConversationId) -> Result<Vec<ContextMessage>, StudioError> {
        let messages: Vec<ContextMessage> = self.conversations.with_tree(conversation, |tree| {
            tree.active_path()
                .map(|node| ContextMessage {
                    role: node.role,
                    content: node.content.clone(),
                    images: node
                        .vision_inputs
                        .iter()
                        .cloned()
                        .chain(
                            node.attachments()
                                .iter()
                                .filter(|attachment| attachment.kind == MediaKind::Image)
                                .map(|attachment| attachment.url.clone()),
                        )
                        .collect(),
                })
                .collect()
        })?;
        Ok(messages)
    }
}
