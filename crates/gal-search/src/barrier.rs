//! Generation barrier over outstanding fitness computations.
//!
//! [`Scorer`] submits every unscored instance of a batch to the fitness service and
//! records it in a pending-task map keyed by [`TaskId`]. The map doubles as a countdown
//! latch: completion events remove entries, and [`Scorer::score`] returns only once the
//! map is empty. No caller can therefore observe a half-scored population.
//!
//! Each scorer receives only the results of its own tasks, so several engines can share
//! one service. After the service stops, refused and orphaned tasks come back unscored
//! instead of blocking the barrier.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::{
    instance::Instance,
    service::{ComputationEvent, ComputationListener, FitnessScheduler, ListenerId, TaskId},
};

#[derive(Debug)]
struct BarrierState<I> {
    /// Task id to the population slot awaiting the result.
    pending: HashMap<TaskId, usize>,
    completed: Vec<(usize, I)>,
}

/// Countdown of outstanding fitness computations submitted by one engine.
#[derive(Debug)]
pub struct GenerationBarrier<I> {
    state: Mutex<BarrierState<I>>,
    drained: Condvar,
}

impl<I> Default for GenerationBarrier<I> {
    fn default() -> Self {
        Self {
            state: Mutex::new(BarrierState {
                pending: HashMap::new(),
                completed: vec![],
            }),
            drained: Condvar::new(),
        }
    }
}

impl<I> GenerationBarrier<I> {
    fn lock(&self) -> MutexGuard<'_, BarrierState<I>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a submission. Must happen before the task is scheduled.
    fn expect(&self, id: TaskId, slot: usize) {
        self.lock().pending.insert(id, slot);
    }

    /// Withdraws a registration whose task never reached the queue.
    fn forget(&self, id: TaskId) {
        self.lock().pending.remove(&id);
    }

    /// Number of computations still outstanding.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Blocks until every registered computation has completed, then hands back the
    /// scored instances with their slots.
    fn wait(&self) -> Vec<(usize, I)> {
        let mut state = self.lock();
        while !state.pending.is_empty() {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        std::mem::take(&mut state.completed)
    }
}

impl<I> ComputationListener<I> for GenerationBarrier<I>
where
    I: Instance,
{
    fn computation_performed(&self, event: ComputationEvent<I>) {
        let ComputationEvent {
            id,
            fitness,
            mut instance,
        } = event;
        let mut state = self.lock();
        match state.pending.remove(&id) {
            Some(slot) => {
                instance.set_fitness(fitness);
                state.completed.push((slot, instance));
            }
            None => log::warn!("no pending task for completed computation {id}"),
        }
        if state.pending.is_empty() {
            self.drained.notify_all();
        }
    }
}

/// Scores batches of instances through a fitness service.
///
/// Registers its barrier as a listener on construction and unregisters it on drop.
pub struct Scorer<I>
where
    I: Instance,
{
    scheduler: FitnessScheduler<I>,
    barrier: Arc<GenerationBarrier<I>>,
    listener: ListenerId,
}

impl<I> fmt::Debug for Scorer<I>
where
    I: Instance,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scorer")
            .field("scheduler", &self.scheduler)
            .field("pending", &self.barrier.pending())
            .finish_non_exhaustive()
    }
}

impl<I> Scorer<I>
where
    I: Instance,
{
    pub fn new(scheduler: FitnessScheduler<I>) -> Self {
        let barrier = Arc::new(GenerationBarrier::default());
        let listener = scheduler.add_listener(Arc::clone(&barrier) as _);
        Self {
            scheduler,
            barrier,
            listener,
        }
    }

    /// Scores every unscored instance and returns the batch in its original order.
    ///
    /// Already-scored instances are not resubmitted. Blocks until all submitted
    /// computations have completed. Once the service has stopped, instances it refused
    /// or dropped are returned unscored.
    pub fn score(&self, instances: Vec<I>) -> Vec<I> {
        let len = instances.len();
        let mut slots = Vec::with_capacity(len);
        let mut submitted = 0;
        for (slot, instance) in instances.into_iter().enumerate() {
            if instance.is_scored() {
                slots.push(Some(instance));
                continue;
            }
            let id = self.scheduler.create_id();
            self.barrier.expect(id, slot);
            match self.scheduler.schedule_for(self.listener, id, instance) {
                Ok(()) => {
                    slots.push(None);
                    submitted += 1;
                }
                Err(instance) => {
                    self.barrier.forget(id);
                    slots.push(Some(instance));
                }
            }
        }
        if submitted > 0 {
            log::trace!("waiting for {submitted} fitness computations");
        }

        for (slot, instance) in self.barrier.wait() {
            slots[slot] = Some(instance);
        }
        let scored = slots.into_iter().flatten().collect::<Vec<_>>();
        debug_assert_eq!(scored.len(), len);
        scored
    }

    /// Outstanding computations (zero between generations).
    pub fn pending(&self) -> usize {
        self.barrier.pending()
    }
}

impl<I> Drop for Scorer<I>
where
    I: Instance,
{
    fn drop(&mut self) {
        self.scheduler.remove_listener(self.listener);
    }
}
