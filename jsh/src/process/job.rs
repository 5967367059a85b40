use super::state::ProcessState;
use jsh_types::JobSummary;
use nix::unistd::Pid;
use std::fmt;
use tracing::debug;

/// Where a job is in the launch protocol and afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Forked; waiting for every member to stop itself.
    Spawning,
    AllStopped,
    Grouped,
    Foreground,
    Background,
    Stopped,
    Exited(i32),
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Spawning | JobState::AllStopped | JobState::Grouped => f.write_str("starting"),
            JobState::Foreground | JobState::Background => f.write_str("running"),
            JobState::Stopped => f.write_str("stopped"),
            JobState::Exited(_) => f.write_str("done"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub cmd: String,
    /// Leader pid; the group id once grouped.
    pub pgid: Pid,
    /// Members not yet reaped, in stage order.
    pub pids: Vec<Pid>,
    /// Last stage, whose status is the job's status.
    pub last: Pid,
    pub last_state: Option<ProcessState>,
    pub state: JobState,
}

impl Job {
    pub fn set_state(&mut self, state: JobState) {
        if self.state != state {
            debug!(
                "JOB_STATE: [{}] '{}' {:?} -> {:?}",
                self.id, self.cmd, self.state, state
            );
            self.state = state;
        }
    }

    /// Forgets a reaped member, keeping its state if it is the last stage.
    pub fn member_finished(&mut self, pid: Pid, state: ProcessState) {
        self.pids.retain(|&p| p != pid);
        if pid == self.last {
            self.last_state = Some(state);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        self.last_state
            .and_then(|state| state.exit_code())
            .unwrap_or(0)
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            pgid: self.pgid,
            state: self.state.to_string(),
            command: self.cmd.clone(),
        }
    }
}

/// Jobs in launch order plus the messages owed to the user about them.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_job_id: usize,
    /// Printed right after the command that produced them.
    notices: Vec<String>,
    /// Exit reports of background jobs, printed by `wait`, `jobs` or the prompt.
    reports: Vec<String>,
}

impl Default for JobTable {
    fn default() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_job_id: 1,
            notices: Vec::new(),
            reports: Vec::new(),
        }
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job in state `Spawning` and returns its id.
    pub fn insert(&mut self, cmd: &str, pids: Vec<Pid>) -> Option<usize> {
        let (&pgid, &last) = (pids.first()?, pids.last()?);
        let id = self.next_job_id;
        self.next_job_id += 1;
        self.jobs.push(Job {
            id,
            cmd: cmd.to_string(),
            pgid,
            pids,
            last,
            last_state: None,
            state: JobState::Spawning,
        });
        Some(id)
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    /// Job with `pid` among its unreaped members.
    pub fn find_by_member(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.pids.contains(&pid))
    }

    pub fn remove(&mut self, id: usize) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.id == id)?;
        Some(self.jobs.remove(index))
    }

    pub fn ids(&self) -> Vec<usize> {
        self.jobs.iter().map(|job| job.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn summaries(&self) -> Vec<JobSummary> {
        self.jobs.iter().map(Job::summary).collect()
    }

    pub fn notify(&mut self, msg: String) {
        self.notices.push(msg);
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn report(&mut self, msg: String) {
        self.reports.push(msg);
    }

    pub fn take_reports(&mut self) -> Vec<String> {
        std::mem::take(&mut self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pids(list: &[i32]) -> Vec<Pid> {
        list.iter().map(|&p| Pid::from_raw(p)).collect()
    }

    #[test]
    fn ids_increase_from_one() {
        let mut table = JobTable::new();
        assert_eq!(table.insert("a", pids(&[10])), Some(1));
        assert_eq!(table.insert("b", pids(&[20, 21])), Some(2));
        table.remove(1);
        assert_eq!(table.insert("c", pids(&[30])), Some(3));
        assert_eq!(table.insert("empty", vec![]), None);
        assert_eq!(table.ids(), vec![2, 3]);
    }

    #[test]
    fn last_stage_decides_exit_code() {
        let mut table = JobTable::new();
        let id = table.insert("false | true", pids(&[10, 11])).unwrap();
        let job = table.get_mut(id).unwrap();
        assert_eq!(job.pgid, Pid::from_raw(10));

        job.member_finished(Pid::from_raw(10), ProcessState::Exited(1));
        assert!(!job.is_finished());
        job.member_finished(Pid::from_raw(11), ProcessState::Exited(0));
        assert!(job.is_finished());
        assert_eq!(job.exit_code(), 0);
    }

    #[test]
    fn lookup_by_member() {
        let mut table = JobTable::new();
        let id = table.insert("x | y", pids(&[40, 41])).unwrap();
        assert_eq!(table.find_by_member(Pid::from_raw(41)).unwrap().id, id);
        table
            .get_mut(id)
            .unwrap()
            .member_finished(Pid::from_raw(41), ProcessState::Exited(0));
        assert!(table.find_by_member(Pid::from_raw(41)).is_none());
        assert_eq!(table.find_by_member(Pid::from_raw(40)).unwrap().id, id);
    }

    #[test]
    fn summaries_show_state() {
        let mut table = JobTable::new();
        let id = table.insert("sleep 9", pids(&[50])).unwrap();
        table.get_mut(id).unwrap().set_state(JobState::Stopped);
        let summary = &table.summaries()[0];
        assert_eq!(summary.state, "stopped");
        assert_eq!(summary.command, "sleep 9");
    }
}
