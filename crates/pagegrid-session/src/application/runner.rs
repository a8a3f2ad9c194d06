//! SessionRunner: a tokio task that owns one [`EditSession`].
//!
//! Every command is sent over an `mpsc` channel and answered through a
//! `oneshot`, so commands run one at a time in arrival order and a save can
//! never interleave with an edit.  The same loop sleeps until the session's
//! auto-save deadline and runs the auto-save when it elapses.
//!
//! # How the loop works (for beginners)
//!
//! ```text
//!  SessionHandle ──cmd──► [ mpsc ] ──► run() ──► EditSession
//!        ▲                              │
//!        └──────────── oneshot reply ◄──┘
//!
//!  run():  select! { next command  |  sleep_until(autosave deadline) }
//! ```
//!
//! When every [`SessionHandle`] is dropped the channel closes, the loop ends,
//! and the task's `JoinHandle` yields the session back.  A pending auto-save is
//! discarded at that point.

use pagegrid_core::{Breakpoint, LayoutItem, RawLayoutItem};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::application::edit_session::{
    EditSession, ResetOutcome, SaveOutcome, SessionError, SessionId, SessionSnapshot,
};

/// Commands queued before the sender waits.
const COMMAND_BUFFER: usize = 32;

/// One rendered block, as returned across the task boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub id: String,
    pub item: LayoutItem,
    pub content: Option<String>,
}

type Reply<T> = oneshot::Sender<T>;

enum SessionCommand {
    Load(Reply<Result<bool, SessionError>>),
    BeginEdit(Reply<Result<(), SessionError>>),
    ApplyItems {
        breakpoint: Breakpoint,
        items: Vec<RawLayoutItem>,
        reply: Reply<Result<bool, SessionError>>,
    },
    ToggleHidden {
        block_id: String,
        reply: Reply<Result<bool, SessionError>>,
    },
    Save(Reply<Result<SaveOutcome, SessionError>>),
    Cancel(Reply<Result<(), SessionError>>),
    Reset(Reply<Result<ResetOutcome, SessionError>>),
    Render {
        breakpoint: Breakpoint,
        reply: Reply<Vec<RenderedBlock>>,
    },
    Snapshot(Reply<SessionSnapshot>),
}

pub struct SessionRunner;

impl SessionRunner {
    /// Moves `session` into a new task and returns a handle to it.
    ///
    /// The `JoinHandle` resolves to the session once every handle is dropped.
    pub fn spawn(session: EditSession) -> (SessionHandle, JoinHandle<EditSession>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let id = session.id();
        let task = tokio::spawn(run(session, rx));
        (SessionHandle { id, tx }, task)
    }
}

/// Cloneable front end of a running session.
///
/// Every method fails with [`SessionError::Closed`] once the task is gone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn load(&self) -> Result<bool, SessionError> {
        self.request(SessionCommand::Load).await?
    }

    pub async fn begin_edit(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::BeginEdit).await?
    }

    pub async fn apply_items(
        &self,
        breakpoint: Breakpoint,
        items: Vec<RawLayoutItem>,
    ) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::ApplyItems {
            breakpoint,
            items,
            reply,
        })
        .await?
    }

    pub async fn toggle_hidden(&self, block_id: impl Into<String>) -> Result<bool, SessionError> {
        let block_id = block_id.into();
        self.request(|reply| SessionCommand::ToggleHidden { block_id, reply })
            .await?
    }

    pub async fn save(&self) -> Result<SaveOutcome, SessionError> {
        self.request(SessionCommand::Save).await?
    }

    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::Cancel).await?
    }

    pub async fn reset(&self) -> Result<ResetOutcome, SessionError> {
        self.request(SessionCommand::Reset).await?
    }

    pub async fn render(&self, breakpoint: Breakpoint) -> Result<Vec<RenderedBlock>, SessionError> {
        self.request(|reply| SessionCommand::Render { breakpoint, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(SessionCommand::Snapshot).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionCommand::Load(_) => "Load",
            SessionCommand::BeginEdit(_) => "BeginEdit",
            SessionCommand::ApplyItems { .. } => "ApplyItems",
            SessionCommand::ToggleHidden { .. } => "ToggleHidden",
            SessionCommand::Save(_) => "Save",
            SessionCommand::Cancel(_) => "Cancel",
            SessionCommand::Reset(_) => "Reset",
            SessionCommand::Render { .. } => "Render",
            SessionCommand::Snapshot(_) => "Snapshot",
        };
        f.write_str(name)
    }
}

async fn run(mut session: EditSession, mut rx: mpsc::Receiver<SessionCommand>) -> EditSession {
    debug!(session = %session.id(), page = %session.page_key(), "session runner started");
    loop {
        let deadline = session.autosave_deadline();
        tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(command) => handle(&mut session, command).await,
                None => break,
            },
            () = wait_until(deadline) => {
                debug!(session = %session.id(), "auto-save deadline elapsed");
                // Failures are logged by the session and keep the edits.
                let _ = session.run_autosave().await;
            }
        }
    }
    debug!(session = %session.id(), "session runner stopped");
    session
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// A dropped reply receiver means the caller stopped waiting; the command has
// still been applied.
async fn handle(session: &mut EditSession, command: SessionCommand) {
    match command {
        SessionCommand::Load(reply) => {
            let _ = reply.send(session.load().await);
        }
        SessionCommand::BeginEdit(reply) => {
            let _ = reply.send(session.begin_edit());
        }
        SessionCommand::ApplyItems {
            breakpoint,
            items,
            reply,
        } => {
            let _ = reply.send(session.apply_items(breakpoint, items));
        }
        SessionCommand::ToggleHidden { block_id, reply } => {
            let _ = reply.send(session.toggle_hidden(&block_id));
        }
        SessionCommand::Save(reply) => {
            let _ = reply.send(session.save().await);
        }
        SessionCommand::Cancel(reply) => {
            let _ = reply.send(session.cancel());
        }
        SessionCommand::Reset(reply) => {
            let _ = reply.send(session.reset().await);
        }
        SessionCommand::Render { breakpoint, reply } => {
            let rendered = session
                .render_plan(breakpoint)
                .iter()
                .map(|planned| RenderedBlock {
                    id: planned.block.id.clone(),
                    item: planned.item.clone(),
                    content: planned.render(),
                })
                .collect();
            let _ = reply.send(rendered);
        }
        SessionCommand::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use pagegrid_core::{
        BlockDescriptor, LayoutRecord, ModulePermissions, PageCatalog, Role, UserContext,
    };
    use tokio::time::sleep;

    use crate::application::edit_session::SessionMode;
    use crate::application::ports::{LayoutStore, StoreError};

    /// Records when each save arrives.
    #[derive(Default)]
    struct TimedStore {
        saves: Mutex<Vec<(Instant, LayoutRecord)>>,
    }

    impl TimedStore {
        fn save_times(&self) -> Vec<Instant> {
            self.saves.lock().unwrap().iter().map(|(at, _)| *at).collect()
        }
    }

    #[async_trait]
    impl LayoutStore for TimedStore {
        async fn fetch(&self, _page_key: &str) -> Result<Option<LayoutRecord>, StoreError> {
            Ok(self.saves.lock().unwrap().last().map(|(_, r)| r.clone()))
        }

        async fn save(&self, record: LayoutRecord) -> Result<LayoutRecord, StoreError> {
            self.saves.lock().unwrap().push((Instant::now(), record.clone()));
            Ok(record)
        }

        async fn reset(&self, _page_key: &str) -> Result<Option<LayoutRecord>, StoreError> {
            Ok(None)
        }
    }

    fn spawn_session(store: Arc<TimedStore>) -> (SessionHandle, JoinHandle<EditSession>) {
        let page = PageCatalog::new(
            "home",
            vec![
                BlockDescriptor::new("a"),
                BlockDescriptor::new("b"),
                BlockDescriptor::new("c"),
            ],
        )
        .resolve(&UserContext::new("alice", Role::User), &ModulePermissions::new());
        let session =
            EditSession::new(page, store).with_autosave_delay(Duration::from_millis(1500));
        SessionRunner::spawn(session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_toggles_produces_one_autosave_after_last_change() {
        // Arrange
        let store = Arc::new(TimedStore::default());
        let (handle, _task) = spawn_session(store.clone());
        handle.begin_edit().await.unwrap();
        let start = Instant::now();

        // Act: three changes 500 ms apart.
        handle.toggle_hidden("a").await.unwrap();
        sleep(Duration::from_millis(500)).await;
        handle.toggle_hidden("b").await.unwrap();
        sleep(Duration::from_millis(500)).await;
        handle.toggle_hidden("c").await.unwrap();

        sleep(Duration::from_millis(1400)).await;
        assert!(store.save_times().is_empty(), "no save before the delay elapses");
        sleep(Duration::from_millis(200)).await;

        // Assert
        let times = store.save_times();
        assert_eq!(times.len(), 1);
        let elapsed = times[0] - start;
        assert!(elapsed >= Duration::from_millis(2500) && elapsed < Duration::from_millis(2600));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.mode, SessionMode::Editing);
        assert!(!snapshot.dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_save_disarms_pending_autosave() {
        let store = Arc::new(TimedStore::default());
        let (handle, _task) = spawn_session(store.clone());
        handle.begin_edit().await.unwrap();
        handle.toggle_hidden("a").await.unwrap();

        assert_eq!(handle.save().await.unwrap(), SaveOutcome::Saved);
        sleep(Duration::from_millis(3000)).await;

        assert_eq!(store.save_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggling_back_to_clean_cancels_autosave() {
        let store = Arc::new(TimedStore::default());
        let (handle, _task) = spawn_session(store.clone());
        handle.begin_edit().await.unwrap();

        handle.toggle_hidden("a").await.unwrap();
        handle.toggle_hidden("a").await.unwrap();
        sleep(Duration::from_millis(3000)).await;

        assert!(store.save_times().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_every_handle_returns_the_session() {
        let (handle, task) = spawn_session(Arc::new(TimedStore::default()));
        let id = handle.id();

        drop(handle);
        let session = task.await.unwrap();

        assert_eq!(session.id(), id);
    }

    #[tokio::test]
    async fn test_handle_reports_closed_after_task_aborts() {
        let (handle, task) = spawn_session(Arc::new(TimedStore::default()));

        task.abort();
        let _ = task.await;

        assert_eq!(handle.begin_edit().await, Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn test_render_returns_visible_blocks_in_order() {
        let (handle, _task) = spawn_session(Arc::new(TimedStore::default()));
        handle.begin_edit().await.unwrap();
        handle.toggle_hidden("b").await.unwrap();

        let rendered = handle.render(Breakpoint::Lg).await.unwrap();

        let ids: Vec<&str> = rendered.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(rendered.iter().all(|r| r.content.is_none()));
    }
}
