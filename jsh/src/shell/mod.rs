use crate::config::Config;
use crate::environment::Environment;
use crate::errors::display_launch_error;
use crate::process::job::JobTable;
use crate::process::registry::ProcessRegistry;
use anyhow::{Context as _, Result};
use controller::JobController;
use jsh_builtin::ShellProxy;
use jsh_types::{Context, JobError, JobSummary, JobTarget};
use nix::unistd::{Pid, getpid};
use parse::{CommandLine, parse_line};
use terminal::TerminalOwnership;
use tracing::debug;

pub mod controller;
pub mod parse;
pub mod terminal;

/// Top-level shell state. Owns the registry, the job table and the terminal,
/// and lends them to a [`JobController`] per operation.
pub struct Shell {
    pub config: Config,
    pub environment: Environment,
    pub pid: Pid,
    registry: ProcessRegistry,
    jobs: JobTable,
    terminal: TerminalOwnership,
    exited: Option<i32>,
    pub last_status: i32,
}

impl Shell {
    pub fn new(config: Config, terminal: TerminalOwnership) -> Self {
        let environment = match &config.path {
            Some(paths) => Environment::with_paths(paths.clone()),
            None => Environment::new(),
        };
        Shell {
            config,
            environment,
            pid: getpid(),
            registry: ProcessRegistry::new(),
            jobs: JobTable::new(),
            terminal,
            exited: None,
            last_status: 0,
        }
    }

    pub fn controller(&mut self) -> JobController<'_> {
        JobController::new(
            &self.environment,
            &mut self.registry,
            &mut self.jobs,
            &mut self.terminal,
        )
    }

    pub fn context(&self) -> Context {
        Context::new(
            self.pid,
            self.terminal.shell_pgid(),
            self.terminal.is_interactive(),
        )
    }

    pub fn terminal_mut(&mut self) -> &mut TerminalOwnership {
        &mut self.terminal
    }

    pub fn is_interactive(&self) -> bool {
        self.terminal.is_interactive()
    }

    /// Runs one command line and returns its status.
    pub fn eval_str(&mut self, ctx: &Context, line: &str) -> i32 {
        debug!("EVAL: {:?}", line);
        let status = match parse_line(line) {
            Err(err) => display_launch_error(&err),
            Ok(None) => self.last_status,
            Ok(Some(CommandLine::Builtin(builtin, argv))) => builtin.run(ctx, argv, self).code(),
            Ok(Some(CommandLine::Pipeline {
                stages,
                redirect,
                background,
            })) => match self.controller().launch_pipeline(stages, redirect, background) {
                Ok(handle) => handle.status.code(),
                Err(err) => display_launch_error(&err),
            },
        };
        for notice in self.jobs.take_notices() {
            eprintln!("{notice}");
        }
        self.last_status = status;
        status
    }

    /// Set once `exit` has run.
    pub fn exited(&self) -> Option<i32> {
        self.exited
    }

    /// Reaps finished background jobs and returns the reports owed to the user.
    pub fn reap_reports(&mut self) -> Vec<String> {
        self.controller().reap_finished();
        for notice in self.jobs.take_notices() {
            eprintln!("{notice}");
        }
        self.jobs.take_reports()
    }

    pub fn hangup_jobs(&mut self) {
        self.controller().hangup_all();
    }

    fn target_pid(&self, target: Option<JobTarget>) -> Result<Option<Pid>, JobError> {
        match target {
            None => Ok(None),
            Some(JobTarget::Pid(pid)) => Ok(Some(pid)),
            Some(JobTarget::Job(id)) => self
                .jobs
                .get(id)
                .and_then(|job| job.pids.first().copied())
                .map(Some)
                .ok_or_else(|| JobError::NotFound(format!("%{id}"))),
        }
    }
}

impl ShellProxy for Shell {
    fn exit_shell(&mut self, code: i32) {
        debug!("EXIT_SHELL: {}", code);
        self.exited = Some(code);
    }

    fn changepwd(&mut self, path: &str) -> Result<()> {
        std::env::set_current_dir(path).with_context(|| format!("failed to chdir to {path}"))?;
        Ok(())
    }

    fn bring_to_foreground(&mut self, target: Option<JobTarget>) -> Result<(), JobError> {
        let pid = self.target_pid(target)?;
        self.controller().bring_to_foreground(pid)
    }

    fn send_to_background(&mut self, target: Option<JobTarget>) -> Result<(), JobError> {
        let pid = self.target_pid(target)?;
        self.controller().send_to_background(pid)
    }

    fn wait_for_background_jobs(&mut self) -> Result<(), JobError> {
        self.controller().wait_for_background_jobs()
    }

    fn list_jobs(&mut self) -> Vec<JobSummary> {
        self.controller().reap_finished();
        self.jobs.summaries()
    }

    fn take_job_reports(&mut self) -> Vec<String> {
        self.jobs.take_reports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shell() -> Shell {
        let _ = tracing_subscriber::fmt::try_init();
        let config = Config {
            path: Some(vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")]),
            ..Config::default()
        };
        Shell::new(config, TerminalOwnership::disabled())
    }

    #[test]
    fn eval_records_last_status() {
        let mut shell = shell();
        let ctx = shell.context();
        assert_eq!(shell.eval_str(&ctx, "sh -c 'exit 5'"), 5);
        assert_eq!(shell.last_status, 5);
        assert_eq!(shell.eval_str(&ctx, ""), 5);
        assert_eq!(shell.eval_str(&ctx, "no-such-program-jsh"), 127);
        assert_eq!(shell.eval_str(&ctx, "cat |"), 1);
    }

    #[test]
    fn job_numbers_map_to_pids() {
        let mut shell = shell();
        let ctx = shell.context();
        assert_eq!(shell.eval_str(&ctx, "sleep 1 &"), 0);
        let pid = shell.target_pid(Some(JobTarget::Job(1))).unwrap();
        assert!(pid.is_some());
        assert!(matches!(
            shell.target_pid(Some(JobTarget::Job(7))),
            Err(JobError::NotFound(_))
        ));
        assert_eq!(shell.list_jobs().len(), 1);

        assert_eq!(shell.eval_str(&ctx, "wait"), 0);
        assert!(shell.list_jobs().is_empty());
    }

    #[test]
    fn exit_builtin_sets_exit_code() {
        let mut shell = shell();
        let ctx = shell.context();
        shell.eval_str(&ctx, "exit 4");
        assert_eq!(shell.exited(), Some(4));
    }
}
