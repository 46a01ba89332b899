//! Asynchronous fitness evaluation.
//!
//! A [`FitnessService`] owns a fixed pool of worker threads that drain a shared task
//! queue of `(id, instance)` pairs. Each worker scores its task with a
//! [`FitnessFunction`] and publishes a [`ComputationEvent`] to the listener that owns the
//! task, or to every registered [`ComputationListener`] for broadcast tasks. Engines talk
//! to the pool through a cloneable [`FitnessScheduler`].
//!
//! ```text
//! engine ──schedule(id, instance)──▶ queue ──▶ worker ─┬─ compute fitness
//!   ▲                                                  │
//!   └───────── ComputationEvent { id, fitness } ◀──────┘
//! ```
//!
//! Shutdown is cooperative: [`StopToken::cancel`] stops task intake and wakes idle
//! workers, which then exit. A computation in progress runs to completion. Tasks still
//! queued are handed back to their listeners unscored (fitness [`UNSCORED`]), so nobody
//! waiting on them blocks forever.

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
};

use crate::instance::{FitnessFunction, Instance, UNSCORED};

/// Identifier of one scheduled fitness computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("#{_0}")]
pub struct TaskId(u64);

/// Identifier returned by [`FitnessScheduler::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Completion of one fitness computation.
///
/// The event carries the scored instance back, since scoring may have changed it.
#[derive(Debug, Clone)]
pub struct ComputationEvent<I> {
    pub id: TaskId,
    pub fitness: f64,
    pub instance: I,
}

/// Receives completion events from the workers.
pub trait ComputationListener<I>: Send + Sync {
    fn computation_performed(&self, event: ComputationEvent<I>);
}

/// Shared cancellation flag checked by the workers at every wake-up.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Task<I> {
    id: TaskId,
    /// Listener receiving the result; `None` broadcasts to all.
    owner: Option<ListenerId>,
    instance: I,
}

struct Shared<I> {
    tasks: Mutex<VecDeque<Task<I>>>,
    task_available: Condvar,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ComputationListener<I>>)>>,
    next_task_id: AtomicU64,
    next_listener_id: AtomicU64,
    stop: StopToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle used to submit work to a [`FitnessService`] and to subscribe to its results.
pub struct FitnessScheduler<I> {
    shared: Arc<Shared<I>>,
}

impl<I> Clone for FitnessScheduler<I> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I> fmt::Debug for FitnessScheduler<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitnessScheduler")
            .field("queued", &lock(&self.shared.tasks).len())
            .field("stopped", &self.shared.stop.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<I> FitnessScheduler<I>
where
    I: Instance,
{
    /// Allocates a fresh task identifier.
    pub fn create_id(&self) -> TaskId {
        TaskId(self.shared.next_task_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Queues an instance for scoring and wakes one idle worker. The result is
    /// broadcast to every listener.
    ///
    /// Once the service has been stopped the instance is handed back as `Err`.
    pub fn schedule(&self, id: TaskId, instance: I) -> Result<(), I> {
        self.enqueue(Task {
            id,
            owner: None,
            instance,
        })
    }

    /// Like [`schedule`](Self::schedule), but only `listener` receives the result.
    pub fn schedule_for(&self, listener: ListenerId, id: TaskId, instance: I) -> Result<(), I> {
        self.enqueue(Task {
            id,
            owner: Some(listener),
            instance,
        })
    }

    fn enqueue(&self, task: Task<I>) -> Result<(), I> {
        let mut tasks = lock(&self.shared.tasks);
        // checked under the queue lock, so a stopping worker cannot miss this task
        if self.shared.stop.is_cancelled() {
            log::warn!("fitness service stopped, refusing task {}", task.id);
            return Err(task.instance);
        }
        log::trace!("scheduled task {}", task.id);
        tasks.push_back(task);
        drop(tasks);
        self.shared.task_available.notify_one();
        Ok(())
    }

    pub fn add_listener(&self, listener: Arc<dyn ComputationListener<I>>) -> ListenerId {
        let id = ListenerId(self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        lock(&self.shared.listeners).retain(|(listener_id, _)| *listener_id != id);
    }

    /// Number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        lock(&self.shared.tasks).len()
    }

    pub fn stop_token(&self) -> &StopToken {
        &self.shared.stop
    }

    /// Blocks until a task is available, or returns `None` once stopped.
    ///
    /// The first worker to see the stop flag hands every queued task back unscored.
    fn next_task(&self) -> Option<Task<I>> {
        let mut tasks = lock(&self.shared.tasks);
        loop {
            if self.shared.stop.is_cancelled() {
                let orphaned = tasks.drain(..).collect::<Vec<_>>();
                drop(tasks);
                for Task {
                    id,
                    owner,
                    instance,
                } in orphaned
                {
                    log::debug!("returning unscored task {id} after stop");
                    self.publish(
                        owner,
                        ComputationEvent {
                            id,
                            fitness: UNSCORED,
                            instance,
                        },
                    );
                }
                return None;
            }
            if let Some(task) = tasks.pop_front() {
                return Some(task);
            }
            tasks = self
                .shared
                .task_available
                .wait(tasks)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Delivers an event to its owner, or to every listener when there is none.
    ///
    /// On broadcast all listeners but the last receive a clone of the scored instance.
    /// The listener list stays locked for the whole notification.
    fn publish(&self, owner: Option<ListenerId>, event: ComputationEvent<I>) {
        let listeners = lock(&self.shared.listeners);
        if let Some(owner) = owner {
            match listeners.iter().find(|(id, _)| *id == owner) {
                Some((_, listener)) => listener.computation_performed(event),
                None => log::warn!("listener of completed task {} is gone", event.id),
            }
            return;
        }
        let Some(((_, last), rest)) = listeners.split_last() else {
            log::warn!("no listener for completed task {}", event.id);
            return;
        };
        for (_, listener) in rest {
            listener.computation_performed(event.clone());
        }
        last.computation_performed(event);
    }
}

/// A pool of worker threads computing fitness values.
pub struct FitnessService<I> {
    scheduler: FitnessScheduler<I>,
    workers: Vec<JoinHandle<()>>,
}

impl<I> fmt::Debug for FitnessService<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitnessService")
            .field("scheduler", &self.scheduler)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl<I> FitnessService<I>
where
    I: Instance,
{
    /// Starts `worker_count` workers (at least one) scoring with `fitness`.
    pub fn spawn<F>(fitness: Arc<F>, worker_count: usize) -> Self
    where
        F: FitnessFunction<I> + 'static,
    {
        let scheduler = FitnessScheduler {
            shared: Arc::new(Shared {
                tasks: Mutex::new(VecDeque::new()),
                task_available: Condvar::new(),
                listeners: Mutex::new(vec![]),
                next_task_id: AtomicU64::new(0),
                next_listener_id: AtomicU64::new(0),
                stop: StopToken::new(),
            }),
        };
        let workers = (0..worker_count.max(1))
            .map(|index| {
                let scheduler = scheduler.clone();
                let fitness = Arc::clone(&fitness);
                thread::spawn(move || run_worker(index, &scheduler, fitness.as_ref()))
            })
            .collect();
        Self { scheduler, workers }
    }
}

impl<I> FitnessService<I> {
    #[must_use]
    pub fn scheduler(&self) -> FitnessScheduler<I> {
        self.scheduler.clone()
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Raises the stop flag and wakes every idle worker.
    pub fn stop(&self) {
        self.scheduler.shared.stop.cancel();
        // take the queue lock so no worker sits between its flag check and its wait
        let _tasks = lock(&self.scheduler.shared.tasks);
        self.scheduler.shared.task_available.notify_all();
    }

    /// Stops the pool and waits for every worker to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("fitness worker panicked");
            }
        }
    }
}

impl<I> Drop for FitnessService<I> {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_worker<I, F>(index: usize, scheduler: &FitnessScheduler<I>, fitness: &F)
where
    I: Instance,
    F: FitnessFunction<I> + ?Sized,
{
    log::debug!("fitness worker {index} started");
    while let Some(Task {
        id,
        owner,
        mut instance,
    }) = scheduler.next_task()
    {
        let value = fitness.compute(&mut instance);
        instance.set_fitness(value);
        log::trace!("worker {index} finished task {id}: {value}");
        scheduler.publish(
            owner,
            ComputationEvent {
                id,
                fitness: value,
                instance,
            },
        );
    }
    log::debug!("fitness worker {index} stopped");
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use super::*;
    use crate::test_instance::{BitString, OnesFitness};

    struct ChannelListener(Mutex<mpsc::Sender<ComputationEvent<BitString>>>);

    impl ComputationListener<BitString> for ChannelListener {
        fn computation_performed(&self, event: ComputationEvent<BitString>) {
            let _ = lock(&self.0).send(event);
        }
    }

    fn listen(
        scheduler: &FitnessScheduler<BitString>,
    ) -> (ListenerId, mpsc::Receiver<ComputationEvent<BitString>>) {
        let (tx, rx) = mpsc::channel();
        let id = scheduler.add_listener(Arc::new(ChannelListener(Mutex::new(tx))));
        (id, rx)
    }

    #[test]
    fn test_task_ids_are_unique() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 1);
        let scheduler = service.scheduler();
        let a = scheduler.create_id();
        let b = scheduler.create_id();
        assert_ne!(a, b);
        service.shutdown();
    }

    #[test]
    fn test_every_task_is_scored_once() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 4);
        let scheduler = service.scheduler();
        let (_, rx) = listen(&scheduler);

        let mut expected = vec![];
        for ones in 0..20 {
            let id = scheduler.create_id();
            scheduler.schedule(id, BitString::with_ones(ones, 32)).unwrap();
            expected.push((id, f64::from(ones)));
        }

        let mut received = (0..expected.len())
            .map(|_| rx.recv_timeout(Duration::from_secs(10)).unwrap())
            .map(|event| {
                assert!((event.instance.fitness() - event.fitness).abs() < f64::EPSILON);
                (event.id, event.fitness)
            })
            .collect::<Vec<_>>();
        received.sort_by_key(|(id, _)| *id);
        assert_eq!(received, expected);
        service.shutdown();
    }

    #[test]
    fn test_every_listener_is_notified() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 2);
        let scheduler = service.scheduler();
        let (_, rx1) = listen(&scheduler);
        let (_, rx2) = listen(&scheduler);

        let id = scheduler.create_id();
        scheduler.schedule(id, BitString::with_ones(3, 8)).unwrap();

        assert_eq!(rx1.recv_timeout(Duration::from_secs(10)).unwrap().id, id);
        assert_eq!(rx2.recv_timeout(Duration::from_secs(10)).unwrap().id, id);
        service.shutdown();
    }

    #[test]
    fn test_removed_listener_is_not_notified() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 1);
        let scheduler = service.scheduler();
        let (removed, rx1) = listen(&scheduler);
        let (_, rx2) = listen(&scheduler);
        scheduler.remove_listener(removed);

        let id = scheduler.create_id();
        scheduler.schedule(id, BitString::with_ones(1, 4)).unwrap();

        assert_eq!(rx2.recv_timeout(Duration::from_secs(10)).unwrap().id, id);
        assert!(rx1.try_recv().is_err());
        service.shutdown();
    }

    #[test]
    fn test_stop_releases_idle_workers() {
        let service = FitnessService::<BitString>::spawn(Arc::new(OnesFitness), 3);
        assert_eq!(service.worker_count(), 3);
        // joins every worker; hangs if an idle worker ignores the stop flag
        service.shutdown();
    }

    #[test]
    fn test_schedule_after_stop_is_refused() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 1);
        let scheduler = service.scheduler();
        service.stop();
        assert!(scheduler.stop_token().is_cancelled());
        let id = scheduler.create_id();
        let refused = scheduler.schedule(id, BitString::with_ones(1, 4)).unwrap_err();
        assert_eq!(refused, BitString::with_ones(1, 4));
        assert_eq!(scheduler.queued(), 0);
        service.shutdown();
    }

    #[test]
    fn test_owned_task_reaches_only_its_owner() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 2);
        let scheduler = service.scheduler();
        let (owner, rx1) = listen(&scheduler);
        let (_, rx2) = listen(&scheduler);

        let id = scheduler.create_id();
        scheduler
            .schedule_for(owner, id, BitString::with_ones(2, 4))
            .unwrap();

        assert_eq!(rx1.recv_timeout(Duration::from_secs(10)).unwrap().id, id);
        service.shutdown();
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_queued_tasks_come_back_unscored_on_stop() {
        let service = FitnessService::spawn(Arc::new(OnesFitness), 1);
        let scheduler = service.scheduler();
        let (owner, rx) = listen(&scheduler);

        // hold the queue lock so the single worker cannot take the tasks before the stop
        let ids = {
            let mut tasks = lock(&scheduler.shared.tasks);
            let ids = (0..3).map(|_| scheduler.create_id()).collect::<Vec<_>>();
            for (ones, &id) in (0..).zip(&ids) {
                tasks.push_back(Task {
                    id,
                    owner: Some(owner),
                    instance: BitString::with_ones(ones, 4),
                });
            }
            scheduler.stop_token().cancel();
            ids
        };
        service.shutdown();

        let mut returned = rx.try_iter().collect::<Vec<_>>();
        returned.sort_by_key(|event| event.id);
        assert_eq!(returned.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
        assert!(returned.iter().all(|e| e.fitness.is_nan()));
        assert!(returned.iter().all(|e| !e.instance.is_scored()));
    }
}
