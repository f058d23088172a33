//! Background execution of account tasks

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::services::{AccountLoginTask, AccountLogoutTask, BookRevokeTask, ServiceContext};
use crate::taskrecorder::TaskResult;
use crate::types::{AccountId, BookId, Credentials, LoginError, LogoutError, RevokeError};

/// Completion signal of the most recently submitted task of an account.
struct QueueTail {
    ticket: u64,
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct AccountQueues {
    next_ticket: u64,
    tails: HashMap<AccountId, QueueTail>,
}

type SharedQueues = Arc<Mutex<AccountQueues>>;

fn lock_queues(queues: &Mutex<AccountQueues>) -> MutexGuard<'_, AccountQueues> {
    queues.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by a running task. Dropping it releases the next task of the same
/// account, and forgets the account when nothing else is queued behind it.
struct QueueSlot {
    queues: SharedQueues,
    account_id: AccountId,
    ticket: u64,
    done: Option<oneshot::Sender<()>>,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        let mut queues = lock_queues(&self.queues);
        if queues
            .tails
            .get(&self.account_id)
            .is_some_and(|tail| tail.ticket == self.ticket)
        {
            queues.tails.remove(&self.account_id);
        }
        drop(queues);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Submits tasks to the tokio runtime.
///
/// At most `max_concurrent_tasks` run at once. Tasks of the same account run
/// one after another in the order `submit` was called, whichever worker
/// thread picks them up first. Dropping a handle does not cancel its task.
pub struct TaskController {
    ctx: Arc<ServiceContext>,
    permits: Arc<Semaphore>,
    queues: SharedQueues,
}

impl TaskController {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let permits = ctx.settings().max_concurrent_tasks.max(1);
        Self {
            ctx,
            permits: Arc::new(Semaphore::new(permits)),
            queues: SharedQueues::default(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.ctx
    }

    pub fn login(
        &self,
        account_id: AccountId,
        credentials: Credentials,
    ) -> JoinHandle<TaskResult<LoginError, Credentials>> {
        let task = AccountLoginTask::new(self.ctx.clone(), account_id, credentials);
        self.submit(account_id, task.run())
    }

    pub fn logout(&self, account_id: AccountId) -> JoinHandle<TaskResult<LogoutError, ()>> {
        let task = AccountLogoutTask::new(self.ctx.clone(), account_id);
        self.submit(account_id, task.run())
    }

    pub fn revoke(
        &self,
        account_id: AccountId,
        book_id: BookId,
    ) -> JoinHandle<TaskResult<RevokeError, ()>> {
        let task = BookRevokeTask::new(self.ctx.clone(), account_id, book_id);
        self.submit(account_id, task.run())
    }

    fn submit<F, T>(&self, account_id: AccountId, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        // The queue position is taken here, before the task exists on any worker.
        let (done_tx, done_rx) = oneshot::channel();
        let (slot, previous) = {
            let mut queues = lock_queues(&self.queues);
            let ticket = queues.next_ticket;
            queues.next_ticket = queues.next_ticket.wrapping_add(1);
            let previous = queues.tails.insert(
                account_id,
                QueueTail {
                    ticket,
                    done: done_rx,
                },
            );
            let slot = QueueSlot {
                queues: Arc::clone(&self.queues),
                account_id,
                ticket,
                done: Some(done_tx),
            };
            (slot, previous)
        };

        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _slot = slot;
            if let Some(previous) = previous {
                // A dropped sender means the previous task ended without finishing.
                let _ = previous.done.await;
            }
            // The semaphore is never closed, so acquisition only waits.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        })
    }

    #[cfg(test)]
    fn queued_accounts(&self) -> usize {
        lock_queues(&self.queues).tails.len()
    }
}
