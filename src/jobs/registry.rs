// src/jobs/registry.rs
//
// Bounded job table. Slots are reclaimed lazily: a registration polls the
// occupants in slot order and overwrites the first one whose processes have
// all exited, inheriting its job id.

use tracing::debug;

use super::{Job, JobId, Process};
use crate::error::ShellError;

pub const DEFAULT_CAPACITY: usize = 32;

/// Where a job landed in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub slot: usize,
    pub job_id: JobId,
}

#[derive(Debug)]
pub struct JobRegistry {
    slots: Vec<Job>,
    capacity: usize,
    /// Children of jobs the table had no room for, reaped on later polls.
    orphans: Vec<Process>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        JobRegistry::with_capacity(DEFAULT_CAPACITY)
    }
}

impl JobRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        JobRegistry { slots: Vec::with_capacity(capacity), capacity, orphans: Vec::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Job> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Job> {
        self.slots.get_mut(slot)
    }

    /// Whether a registration would succeed: a free slot or a finished occupant.
    pub fn has_room(&mut self) -> bool {
        self.reap_orphans();
        self.slots.len() < self.capacity || self.slots.iter_mut().any(Job::all_finished)
    }

    /// Take over the processes of a job that could not be registered so
    /// they are still reaped once they exit.
    pub fn adopt_orphans(&mut self, job: Job) {
        let live = job.into_processes().filter(|process| !process.state().is_finished());
        self.orphans.extend(live);
        debug!(orphans = self.orphans.len(), "adopted unregistered processes");
    }

    /// Processes adopted by [`JobRegistry::adopt_orphans`] that have not exited yet.
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    fn reap_orphans(&mut self) {
        self.orphans.retain_mut(Process::poll);
    }

    /// Slot currently holding the job with this serial.
    pub fn position(&self, serial: u64) -> Option<usize> {
        self.slots.iter().position(|job| job.serial() == serial)
    }

    /// Insert a job that is not yet in the table.
    ///
    /// The first slot whose occupant has finished is reused and the new job
    /// inherits that slot's id; the occupant is dropped. Otherwise the job is
    /// appended with `id = len + 1`.
    pub fn register(&mut self, job: Job) -> Result<Registration, ShellError> {
        self.try_register(job)
            .map_err(|_| ShellError::TableFull { capacity: self.capacity })
    }

    /// Like [`JobRegistry::register`], but hands the job back when the table is full.
    pub fn try_register(&mut self, mut job: Job) -> Result<Registration, Job> {
        self.reap_orphans();
        for (slot, occupant) in self.slots.iter_mut().enumerate() {
            if occupant.all_finished() {
                let job_id = occupant.id().unwrap_or(slot + 1);
                job.set_id(job_id);
                debug!(slot, job_id, "reusing slot");
                *occupant = job;
                return Ok(Registration { slot, job_id });
            }
        }

        if self.slots.len() >= self.capacity {
            return Err(job);
        }
        let slot = self.slots.len();
        let job_id = slot + 1;
        job.set_id(job_id);
        debug!(slot, job_id, "appending job");
        self.slots.push(job);
        Ok(Registration { slot, job_id })
    }

    /// Register the job already sitting in `slot` again.
    ///
    /// A job never moves once it is in the table, so it keeps its slot and id.
    /// When it is marked removable its processes are not polled at all;
    /// otherwise they are polled so finished children are still reaped.
    pub fn reinsert(&mut self, slot: usize) -> Registration {
        let job = &mut self.slots[slot];
        if !job.removable {
            job.any_running();
        }
        let job_id = job.id().unwrap_or(slot + 1);
        debug!(slot, job_id, "re-registered in place");
        Registration { slot, job_id }
    }

    /// Slot of a non-removable job: the highest-numbered one when `want_max`,
    /// otherwise the one whose id is exactly `job_id`.
    pub fn find(&self, job_id: JobId, want_max: bool) -> Option<usize> {
        self.search(job_id, want_max, |job| !job.removable)
    }

    /// Same search, restricted to jobs that were not submitted with `&`.
    pub fn find_foreground(&self, job_id: JobId, want_max: bool) -> Option<usize> {
        self.search(job_id, want_max, |job| !job.background)
    }

    fn search(&self, job_id: JobId, want_max: bool, eligible: impl Fn(&Job) -> bool) -> Option<usize> {
        let mut candidates = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, job)| eligible(*job));
        if want_max {
            candidates
                .max_by_key(|(_, job)| job.id())
                .map(|(slot, _)| slot)
        } else {
            candidates
                .find(|(_, job)| job.id() == Some(job_id))
                .map(|(slot, _)| slot)
        }
    }

    /// Jobs with at least one live process that are not marked removable.
    pub fn list(&mut self) -> impl Iterator<Item = &Job> + '_ {
        self.reap_orphans();
        self.slots
            .iter_mut()
            .filter_map(|job| (job.any_running() && !job.removable).then_some(&*job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(serial: u64, background: bool) -> Job {
        let mut job = Job::new(serial, background);
        job.push_builtin(vec![format!("job{serial}")]);
        job
    }

    #[test]
    fn finished_jobs_are_reclaimed_from_the_first_slot() {
        let mut registry = JobRegistry::default();
        // builtin-only jobs have no live processes, so slot 0 is always free
        assert_eq!(registry.register(job(1, true)).unwrap(), Registration { slot: 0, job_id: 1 });
        assert_eq!(registry.register(job(2, true)).unwrap(), Registration { slot: 0, job_id: 1 });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(0).unwrap().serial(), 2);
    }

    #[test]
    fn reregistering_keeps_slot_and_id() {
        let mut registry = JobRegistry::default();
        registry.register(job(1, false)).unwrap();
        registry.get_mut(0).unwrap().removable = true;
        assert_eq!(registry.reinsert(0), Registration { slot: 0, job_id: 1 });
        assert_eq!(registry.get(0).unwrap().serial(), 1);
    }

    #[test]
    fn find_skips_removable_jobs() {
        let mut registry = JobRegistry::default();
        registry.register(job(1, false)).unwrap();
        assert_eq!(registry.find(1, false), Some(0));
        assert_eq!(registry.find(0, true), Some(0));
        assert_eq!(registry.find(2, false), None);

        registry.get_mut(0).unwrap().removable = true;
        assert_eq!(registry.find(1, false), None);
        assert_eq!(registry.find(0, true), None);
    }

    #[test]
    fn find_foreground_ignores_background_jobs() {
        let mut registry = JobRegistry::default();
        registry.register(job(1, true)).unwrap();
        assert_eq!(registry.find_foreground(1, false), None);
        assert_eq!(registry.find_foreground(0, true), None);
        assert_eq!(registry.find(1, false), Some(0));
    }

    #[test]
    fn list_omits_jobs_without_live_processes() {
        let mut registry = JobRegistry::default();
        registry.register(job(1, true)).unwrap();
        assert_eq!(registry.list().count(), 0);
    }

    #[test]
    fn full_table_hands_the_job_back() {
        let mut registry = JobRegistry::with_capacity(0);
        let rejected = registry.try_register(job(9, true)).unwrap_err();
        assert_eq!(rejected.serial(), 9);
        assert!(matches!(
            registry.register(job(10, true)),
            Err(ShellError::TableFull { capacity: 0 })
        ));
    }

    #[test]
    fn room_comes_from_free_or_finished_slots() {
        let mut registry = JobRegistry::with_capacity(1);
        assert!(registry.has_room());
        registry.register(job(1, true)).unwrap();
        // builtin-only occupant counts as finished
        assert!(registry.has_room());
        assert!(!JobRegistry::with_capacity(0).has_room());
    }

    #[test]
    fn adopting_a_job_without_processes_keeps_nothing() {
        let mut registry = JobRegistry::with_capacity(0);
        registry.adopt_orphans(job(1, true));
        assert_eq!(registry.orphan_count(), 0);
    }

    #[test]
    fn empty_registry_lookups() {
        let registry = JobRegistry::with_capacity(4);
        assert!(registry.is_empty());
        assert_eq!(registry.capacity(), 4);
        assert_eq!(registry.find(0, true), None);
        assert_eq!(registry.find_foreground(1, false), None);
    }
}
