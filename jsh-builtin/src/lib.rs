use anyhow::Result;
use jsh_types::{Context, ExitStatus, JobError, JobSummary, JobTarget};
use tracing::debug;

// Builtin command modules
mod bg;
pub mod cd;
mod fg;
mod help;
mod jobs;
mod pwd;
mod wait;

/// Trait that provides an interface for builtin commands to interact with the shell
/// This allows builtin commands to perform shell operations without direct coupling
pub trait ShellProxy {
    /// Initiates shell exit process
    fn exit_shell(&mut self, code: i32);

    /// Changes the current working directory and updates shell state
    fn changepwd(&mut self, path: &str) -> Result<()>;

    /// Resumes a job in the foreground and waits for it to exit or stop.
    /// `None` selects the most recently launched live process.
    fn bring_to_foreground(&mut self, target: Option<JobTarget>) -> Result<(), JobError>;

    /// Resumes a job without giving it the terminal.
    fn send_to_background(&mut self, target: Option<JobTarget>) -> Result<(), JobError>;

    /// Blocks until every running background job has exited.
    fn wait_for_background_jobs(&mut self) -> Result<(), JobError>;

    /// Current job table in launch order.
    fn list_jobs(&mut self) -> Vec<JobSummary>;

    /// Takes the exit reports of jobs that finished with a non-zero status.
    fn take_job_reports(&mut self) -> Vec<String>;
}

/// The closed set of commands the shell runs in-process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Exit,
    Pwd,
    Cd,
    Fg,
    Bg,
    Wait,
    Jobs,
}

impl Builtin {
    pub const ALL: [Builtin; 8] = [
        Builtin::Help,
        Builtin::Exit,
        Builtin::Pwd,
        Builtin::Cd,
        Builtin::Fg,
        Builtin::Bg,
        Builtin::Wait,
        Builtin::Jobs,
    ];

    pub fn lookup(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "?" | "help" => Builtin::Help,
            "exit" => Builtin::Exit,
            "pwd" => Builtin::Pwd,
            "cd" => Builtin::Cd,
            "fg" => Builtin::Fg,
            "bg" => Builtin::Bg,
            "wait" => Builtin::Wait,
            "jobs" => Builtin::Jobs,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Help => "help",
            Builtin::Exit => "exit",
            Builtin::Pwd => "pwd",
            Builtin::Cd => "cd",
            Builtin::Fg => "fg",
            Builtin::Bg => "bg",
            Builtin::Wait => "wait",
            Builtin::Jobs => "jobs",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Builtin::Help => "show this help menu",
            Builtin::Exit => "exit the command shell",
            Builtin::Pwd => "print the current working directory path",
            Builtin::Cd => "change the current working directory",
            Builtin::Fg => "move a job to the foreground",
            Builtin::Bg => "resume a stopped job in the background",
            Builtin::Wait => "wait for all background jobs to finish",
            Builtin::Jobs => "list active jobs",
        }
    }

    pub fn run(&self, ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
        debug!("BUILTIN_RUN: {} argv: {:?}", self.name(), argv);
        match self {
            Builtin::Help => help::command(ctx, argv, proxy),
            Builtin::Exit => exit(ctx, argv, proxy),
            Builtin::Pwd => pwd::command(ctx, argv, proxy),
            Builtin::Cd => cd::command(ctx, argv, proxy),
            Builtin::Fg => fg::command(ctx, argv, proxy),
            Builtin::Bg => bg::command(ctx, argv, proxy),
            Builtin::Wait => wait::command(ctx, argv, proxy),
            Builtin::Jobs => jobs::command(ctx, argv, proxy),
        }
    }
}

/// Parses the optional job argument shared by `fg` and `bg`.
pub(crate) fn parse_target(argv: &[String]) -> Result<Option<JobTarget>, JobError> {
    match argv.get(1) {
        Some(arg) => JobTarget::parse(arg).map(Some),
        None => Ok(None),
    }
}

fn exit(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    let code = match argv.get(1).map(|s| s.parse::<i32>()) {
        None => 0,
        Some(Ok(code)) => code,
        Some(Err(_)) => {
            ctx.write_stderr(&format!("exit: {}: numeric argument required", argv[1]))
                .ok();
            2
        }
    };
    proxy.exit_shell(code);
    ExitStatus::ExitedWith(code)
}
