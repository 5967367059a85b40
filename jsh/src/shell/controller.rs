//! Drives jobs through launch, grouping, terminal transfer and waiting.
//!
//! Launch order is fixed: every member of a job is observed stopped, then the
//! job is grouped, then the terminal is handed over (foreground only), and
//! only then is `SIGCONT` sent to the group.

use super::terminal::TerminalOwnership;
use crate::environment::Environment;
use crate::process::fork::{ProcessLauncher, rollback};
use crate::process::job::{JobState, JobTable};
use crate::process::pipeline::{PipelineBuilder, Stage};
use crate::process::redirect::Redirect;
use crate::process::registry::{ProcessRegistry, report_misuse};
use crate::process::signal::signal_group;
use crate::process::state::ProcessState;
use crate::process::wait::{WaitMode, wait_process};
use jsh_types::{ExitStatus, JobError, LaunchError, SignalError};
use nix::sys::signal::Signal;
use nix::unistd::{Pid, setpgid};
use tracing::{debug, info, warn};

/// Result of [`JobController::launch_pipeline`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: usize,
    pub pgid: Pid,
    pub status: ExitStatus,
}

pub struct JobController<'a> {
    env: &'a Environment,
    registry: &'a mut ProcessRegistry,
    jobs: &'a mut JobTable,
    terminal: &'a mut TerminalOwnership,
}

impl<'a> JobController<'a> {
    pub fn new(
        env: &'a Environment,
        registry: &'a mut ProcessRegistry,
        jobs: &'a mut JobTable,
        terminal: &'a mut TerminalOwnership,
    ) -> Self {
        JobController {
            env,
            registry,
            jobs,
            terminal,
        }
    }

    /// Starts a pipeline. A foreground job is waited for until it exits or
    /// stops; a background job returns as soon as it is resumed.
    pub fn launch_pipeline(
        &mut self,
        stages: Vec<Stage>,
        redirect: Option<Redirect>,
        background: bool,
    ) -> Result<JobHandle, LaunchError> {
        self.reap_finished();

        let pipeline = PipelineBuilder::new(self.env).build(stages, redirect, background)?;
        let pids = ProcessLauncher::new(self.registry).spawn(&pipeline)?;
        let Some(id) = self.jobs.insert(&pipeline.cmd, pids.clone()) else {
            return Err(LaunchError::InvalidSyntax("empty pipeline".to_string()));
        };
        info!(
            "JOB_LAUNCH: [{}] '{}' pids: {:?} background: {}",
            id, pipeline.cmd, pids, background
        );

        self.await_all_stopped(&pids);
        self.set_job_state(id, JobState::AllStopped);
        let pgid = self.group(id);
        self.set_job_state(id, JobState::Grouped);

        if self.jobs.get(id).is_none_or(|job| job.is_finished()) {
            let code = self.finish_job(id, false);
            return Ok(JobHandle {
                id,
                pgid,
                status: ExitStatus::ExitedWith(code),
            });
        }

        if background {
            if let Err(err) = self.resume(id, JobState::Background) {
                self.abandon(id);
                return Err(err.into());
            }
            self.jobs.notify(format!("[{id}] {pgid}"));
            return Ok(JobHandle {
                id,
                pgid,
                status: ExitStatus::Running(pgid),
            });
        }

        match self.run_in_foreground(id) {
            Ok(status) => Ok(JobHandle { id, pgid, status }),
            Err(err) => {
                self.abandon(id);
                Err(err.into())
            }
        }
    }

    /// Blocks until every pid in `pids` has stopped itself (or died trying).
    ///
    /// No `SIGCONT` may reach a job before this returns for all of its members.
    pub fn await_all_stopped(&mut self, pids: &[Pid]) {
        for &pid in pids {
            loop {
                match wait_process(pid, WaitMode::Blocking) {
                    Some(ProcessState::Stopped) => {
                        self.update_member(pid, ProcessState::Stopped);
                        break;
                    }
                    Some(state) if state.is_terminal() => {
                        warn!("JOB_MEMBER_DIED_BEFORE_STOP: pid {} {}", pid, state);
                        self.finish_member(pid, state);
                        break;
                    }
                    _ => continue,
                }
            }
        }
        debug!("JOB_ALL_STOPPED: {:?}", pids);
    }

    /// Moves every live member into one group led by the first live member.
    fn group(&mut self, id: usize) -> Pid {
        let Some(job) = self.jobs.get_mut(id) else {
            return Pid::from_raw(0);
        };
        if let Some(&leader) = job.pids.first() {
            job.pgid = leader;
        }
        let pgid = job.pgid;
        let members = job.pids.clone();

        for pid in members {
            match setpgid(pid, pgid) {
                Ok(()) => {
                    if let Err(err) = self.registry.set_pgid(pid, pgid) {
                        report_misuse(err);
                    }
                }
                Err(err) => warn!("JOB_SETPGID_FAILED: pid {} pgid {}: {}", pid, pgid, err),
            }
        }
        debug!("JOB_GROUPED: [{}] pgid {}", id, pgid);
        pgid
    }

    /// Sends `SIGCONT` to the job's group and records it as `next`.
    fn resume(&mut self, id: usize, next: JobState) -> Result<(), SignalError> {
        let Some(job) = self.jobs.get_mut(id) else {
            return Ok(());
        };
        signal_group(job.pgid, Signal::SIGCONT)?;
        for &pid in &job.pids {
            if let Err(err) = self.registry.set_state(pid, ProcessState::Running) {
                report_misuse(err);
            }
        }
        job.set_state(next);
        Ok(())
    }

    fn run_in_foreground(&mut self, id: usize) -> Result<ExitStatus, SignalError> {
        let Some(pgid) = self.jobs.get(id).map(|job| job.pgid) else {
            return Ok(ExitStatus::ExitedWith(0));
        };
        if let Err(err) = self.terminal.give_to(pgid) {
            warn!("JOB_TERMINAL_GIVE_FAILED: {}", err);
        }
        if let Err(err) = self.resume(id, JobState::Foreground) {
            self.reclaim_terminal();
            return Err(err);
        }
        let status = self.wait_foreground(id);
        self.reclaim_terminal();
        Ok(status)
    }

    fn reclaim_terminal(&mut self) {
        if let Err(err) = self.terminal.reclaim() {
            warn!("JOB_TERMINAL_RECLAIM_FAILED: {}", err);
        }
    }

    /// Waits member by member; the first stop parks the whole job.
    fn wait_foreground(&mut self, id: usize) -> ExitStatus {
        let members = match self.jobs.get(id) {
            Some(job) => job.pids.clone(),
            None => return ExitStatus::ExitedWith(0),
        };
        for pid in members {
            if self.wait_blocking(pid) == ProcessState::Stopped {
                return self.job_stopped(id);
            }
        }
        ExitStatus::ExitedWith(self.finish_job(id, false))
    }

    /// Blocks until `pid` stops or finishes, recording either.
    fn wait_blocking(&mut self, pid: Pid) -> ProcessState {
        loop {
            match wait_process(pid, WaitMode::Blocking) {
                Some(ProcessState::Stopped) => {
                    self.update_member(pid, ProcessState::Stopped);
                    return ProcessState::Stopped;
                }
                Some(state) if state.is_terminal() => {
                    self.finish_member(pid, state);
                    return state;
                }
                _ => continue,
            }
        }
    }

    fn job_stopped(&mut self, id: usize) -> ExitStatus {
        let Some(job) = self.jobs.get_mut(id) else {
            return ExitStatus::ExitedWith(0);
        };
        job.set_state(JobState::Stopped);
        let (pgid, msg) = (job.pgid, format!("[{}]+ Stopped  {}", job.id, job.cmd));
        info!("JOB_STOPPED: {}", msg);
        self.jobs.notify(msg);
        ExitStatus::Stopped(pgid)
    }

    /// Resumes a stopped or background job in the foreground and waits for it.
    ///
    /// `None` targets the most recently launched live process.
    pub fn bring_to_foreground(&mut self, target: Option<Pid>) -> Result<(), JobError> {
        let id = self.resolve_job(target)?;
        info!("JOB_FOREGROUND: [{}]", id);
        self.run_in_foreground(id)?;
        Ok(())
    }

    /// Resumes a stopped job without giving it the terminal.
    ///
    /// `SIGCONT` is sent even when the table still shows the job running: it
    /// may have stopped since the last reap.
    pub fn send_to_background(&mut self, target: Option<Pid>) -> Result<(), JobError> {
        self.reap_finished();
        let id = self.resolve_job(target)?;
        let Some(job) = self.jobs.get(id) else {
            return Err(JobError::NotFound(id.to_string()));
        };
        let was_background = job.state == JobState::Background;
        let msg = format!("[{}]+ {} &", job.id, job.cmd);
        self.resume(id, JobState::Background)?;
        if was_background {
            debug!("JOB_ALREADY_BACKGROUND: [{}]", id);
            return Ok(());
        }
        info!("JOB_BACKGROUND: {}", msg);
        self.jobs.notify(msg);
        Ok(())
    }

    /// Blocks until every running background job has exited. A job that stops
    /// while waited for is parked as stopped instead.
    pub fn wait_for_background_jobs(&mut self) -> Result<(), JobError> {
        for id in self.jobs.ids() {
            let members = match self.jobs.get(id) {
                Some(job) if job.state == JobState::Background => job.pids.clone(),
                _ => continue,
            };
            debug!("JOB_WAIT: [{}] {:?}", id, members);
            let stopped = members
                .into_iter()
                .any(|pid| self.wait_blocking(pid) == ProcessState::Stopped);
            if stopped {
                self.job_stopped(id);
            } else {
                self.finish_job(id, true);
            }
        }
        Ok(())
    }

    /// Collects every pending state change without blocking and drops jobs
    /// whose members have all been reaped.
    pub fn reap_finished(&mut self) {
        for id in self.jobs.ids() {
            let (members, state) = match self.jobs.get(id) {
                Some(job) if job.state != JobState::Foreground => (job.pids.clone(), job.state),
                _ => continue,
            };

            let mut any_stopped = false;
            let mut any_resumed = false;
            for pid in members {
                let mut last_seen = None;
                while let Some(seen) = wait_process(pid, WaitMode::Poll) {
                    if seen.is_terminal() {
                        self.finish_member(pid, seen);
                        last_seen = None;
                        break;
                    }
                    self.update_member(pid, seen);
                    last_seen = Some(seen);
                }
                match last_seen {
                    Some(ProcessState::Stopped) => any_stopped = true,
                    Some(ProcessState::Running) => any_resumed = true,
                    _ => {}
                }
            }

            let finished = self.jobs.get(id).is_none_or(|job| job.is_finished());
            if finished {
                self.finish_job(id, true);
            } else if any_stopped && state == JobState::Background {
                self.job_stopped(id);
            } else if any_resumed
                && state == JobState::Stopped
                && let Some(job) = self.jobs.get_mut(id)
            {
                job.set_state(JobState::Background);
            }
        }
    }

    /// Sends `SIGHUP` then `SIGCONT` to every remaining job.
    pub fn hangup_all(&mut self) {
        for job in self.jobs.iter() {
            for signal in [Signal::SIGHUP, Signal::SIGCONT] {
                if let Err(err) = signal_group(job.pgid, signal) {
                    debug!("JOB_HANGUP_FAILED: [{}] {}", job.id, err);
                }
            }
        }
    }

    fn resolve_job(&self, target: Option<Pid>) -> Result<usize, JobError> {
        let pid = match target {
            Some(pid) => pid,
            None => self
                .registry
                .most_recent()
                .and_then(|handle| self.registry.get(handle))
                .map(|record| record.pid)
                .ok_or(JobError::NoCurrentJob)?,
        };
        if self.registry.find(pid).is_none() {
            return Err(JobError::NotFound(pid.to_string()));
        }
        self.jobs
            .find_by_member(pid)
            .map(|job| job.id)
            .ok_or_else(|| JobError::NotFound(pid.to_string()))
    }

    fn set_job_state(&mut self, id: usize, state: JobState) {
        if let Some(job) = self.jobs.get_mut(id) {
            job.set_state(state);
        }
    }

    fn update_member(&mut self, pid: Pid, state: ProcessState) {
        if let Err(err) = self.registry.set_state(pid, state) {
            report_misuse(err);
        }
    }

    /// Records a reaped member and drops it from the registry.
    fn finish_member(&mut self, pid: Pid, state: ProcessState) {
        self.update_member(pid, state);
        if let Err(err) = self.registry.remove(pid) {
            report_misuse(err);
        }
        if let Some(id) = self.jobs.find_by_member(pid).map(|job| job.id)
            && let Some(job) = self.jobs.get_mut(id)
        {
            job.member_finished(pid, state);
        }
    }

    /// Removes a finished job and returns its status. With `report`, a
    /// non-zero status is queued for the user.
    fn finish_job(&mut self, id: usize, report: bool) -> i32 {
        let Some(mut job) = self.jobs.remove(id) else {
            return 0;
        };
        let code = job.exit_code();
        job.set_state(JobState::Exited(code));
        info!("JOB_DONE: [{}] '{}' status {}", job.id, job.cmd, code);
        if report && code != 0 {
            self.jobs.report(format!("[{}] Exit {}  {}", job.id, code, job.cmd));
        }
        code
    }

    /// Kills and reaps a job whose launch could not be completed.
    fn abandon(&mut self, id: usize) {
        if let Some(job) = self.jobs.remove(id) {
            warn!("JOB_ABANDONED: [{}] '{}'", job.id, job.cmd);
            rollback(self.registry, &job.pids);
        }
    }
}
