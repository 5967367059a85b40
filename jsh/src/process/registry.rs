//! Index-stable table of every child the shell has forked and not yet reaped.
//!
//! Records live in a slot vector addressed by [`RecordHandle`]. A handle carries
//! the generation of its slot, so a handle kept past a removal resolves to
//! nothing instead of to whichever record reused the slot.

use super::state::ProcessState;
use jsh_types::RegistryError;
use nix::unistd::Pid;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: Pid,
    /// Set once the process has been moved into its job's group.
    pub pgid: Option<Pid>,
    pub state: ProcessState,
    pub command: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    index: usize,
    generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    seq: u64,
    record: Option<ProcessRecord>,
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_pid: HashMap<Pid, usize>,
    // registration order, oldest first
    order: BTreeMap<u64, usize>,
    next_seq: u64,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record in state `Spawned`.
    pub fn register(&mut self, pid: Pid, command: &str) -> Result<RecordHandle, RegistryError> {
        if self.by_pid.contains_key(&pid) {
            return Err(RegistryError::DuplicateProcess(pid));
        }

        let record = ProcessRecord {
            pid,
            pgid: None,
            state: ProcessState::Spawned,
            command: command.to_string(),
        };
        let seq = self.next_seq;
        self.next_seq += 1;

        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.seq = seq;
                slot.record = Some(record);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    seq,
                    record: Some(record),
                });
                self.slots.len() - 1
            }
        };

        self.by_pid.insert(pid, index);
        self.order.insert(seq, index);
        debug!("REGISTRY_REGISTER: pid {} slot {} seq {}", pid, index, seq);
        Ok(RecordHandle {
            index,
            generation: self.slots[index].generation,
        })
    }

    pub fn find(&self, pid: Pid) -> Option<RecordHandle> {
        self.by_pid.get(&pid).map(|&index| RecordHandle {
            index,
            generation: self.slots[index].generation,
        })
    }

    pub fn get(&self, handle: RecordHandle) -> Option<&ProcessRecord> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub fn get_mut(&mut self, handle: RecordHandle) -> Option<&mut ProcessRecord> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    /// Record for `pid`, if registered.
    pub fn record(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.find(pid).and_then(|handle| self.get(handle))
    }

    pub fn set_state(&mut self, pid: Pid, state: ProcessState) -> Result<(), RegistryError> {
        let handle = self.find(pid).ok_or(RegistryError::UnknownProcess(pid))?;
        let record = self
            .get_mut(handle)
            .ok_or(RegistryError::UnknownProcess(pid))?;
        if record.state != state {
            debug!(
                "REGISTRY_STATE: pid {} {} -> {}",
                pid, record.state, state
            );
            record.state = state;
        }
        Ok(())
    }

    pub fn set_pgid(&mut self, pid: Pid, pgid: Pid) -> Result<(), RegistryError> {
        let handle = self.find(pid).ok_or(RegistryError::UnknownProcess(pid))?;
        let record = self
            .get_mut(handle)
            .ok_or(RegistryError::UnknownProcess(pid))?;
        record.pgid = Some(pgid);
        Ok(())
    }

    /// The most recently registered record that has not reached a terminal state.
    pub fn most_recent(&self) -> Option<RecordHandle> {
        self.order.values().rev().find_map(|&index| {
            let slot = &self.slots[index];
            match &slot.record {
                Some(record) if !record.state.is_terminal() => Some(RecordHandle {
                    index,
                    generation: slot.generation,
                }),
                _ => None,
            }
        })
    }

    /// Erases a record. The caller must already have reaped the process.
    pub fn remove(&mut self, pid: Pid) -> Result<ProcessRecord, RegistryError> {
        let index = self
            .by_pid
            .remove(&pid)
            .ok_or(RegistryError::UnknownProcess(pid))?;
        let slot = &mut self.slots[index];
        let record = slot
            .record
            .take()
            .ok_or(RegistryError::UnknownProcess(pid))?;
        self.order.remove(&slot.seq);
        slot.generation += 1;
        self.free.push(index);

        if !record.state.is_terminal() {
            warn!(
                "REGISTRY_REMOVE_LIVE: pid {} removed in state {}",
                pid, record.state
            );
        }
        debug!("REGISTRY_REMOVE: pid {} slot {}", pid, index);
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.by_pid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pid.is_empty()
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> + '_ {
        self.order
            .values()
            .filter_map(|&index| self.slots[index].record.as_ref())
    }
}

/// Logs a registry misuse. Fatal in debug builds.
pub(crate) fn report_misuse(err: RegistryError) {
    error!("REGISTRY_MISUSE: {}", err);
    debug_assert!(false, "registry misuse: {err}");
}
