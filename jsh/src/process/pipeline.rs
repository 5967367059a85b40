//! Turns stage descriptors into resolved exec images and a descriptor plan.
//!
//! [`PipelineBuilder::build`] is pure: it validates, resolves executables and
//! computes which pipe end or file every stage gets. The descriptors themselves
//! are only created by [`FdPlan::open`] right before the first fork.

use super::process::ExecImage;
use super::redirect::Redirect;
use crate::environment::Environment;
use jsh_types::LaunchError;
#[cfg(not(target_vendor = "apple"))]
use nix::{fcntl::OFlag, unistd::pipe2};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use tracing::debug;

/// One `|`-separated program invocation; `argv[0]` names the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
}

impl Stage {
    pub fn new<S: Into<String>>(argv: impl IntoIterator<Item = S>) -> Self {
        Stage {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Where a standard stream of a stage comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Inherited from the shell.
    Terminal,
    /// Read end of pipe `n`, which joins stage `n` to stage `n + 1`.
    PipeRead(usize),
    PipeWrite(usize),
    /// The redirection target.
    File,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StageWiring {
    pub stdin: Endpoint,
    pub stdout: Endpoint,
}

/// Stream assignment for `stages` stages joined by `stages - 1` pipes.
pub fn wire(stages: usize, redirect: Option<&Redirect>) -> Vec<StageWiring> {
    (0..stages)
        .map(|i| {
            let stdin = match (i, redirect) {
                (0, Some(Redirect::Input(_))) => Endpoint::File,
                (0, _) => Endpoint::Terminal,
                (i, _) => Endpoint::PipeRead(i - 1),
            };
            let stdout = match redirect {
                _ if i + 1 < stages => Endpoint::PipeWrite(i),
                Some(Redirect::StdoutOutput(_)) => Endpoint::File,
                _ => Endpoint::Terminal,
            };
            StageWiring { stdin, stdout }
        })
        .collect()
}

impl StageWiring {
    /// Ends the parent closes once this stage is forked. The other end of each
    /// pipe stays open until the neighbouring stage is forked.
    pub fn released_after_fork(&self) -> impl Iterator<Item = Endpoint> {
        [self.stdin, self.stdout]
            .into_iter()
            .filter(|end| !matches!(end, Endpoint::Terminal))
    }
}

#[derive(Debug)]
pub struct Pipeline {
    pub(crate) images: Vec<ExecImage>,
    pub(crate) wiring: Vec<StageWiring>,
    pub(crate) redirect: Option<Redirect>,
    pub background: bool,
    /// Display form used in job listings.
    pub cmd: String,
}

impl Pipeline {
    pub(crate) fn len(&self) -> usize {
        self.images.len()
    }
}

pub struct PipelineBuilder<'a> {
    env: &'a Environment,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(env: &'a Environment) -> Self {
        PipelineBuilder { env }
    }

    pub fn build(
        &self,
        stages: Vec<Stage>,
        redirect: Option<Redirect>,
        background: bool,
    ) -> Result<Pipeline, LaunchError> {
        if stages.is_empty() {
            return Err(LaunchError::InvalidSyntax("empty pipeline".to_string()));
        }
        if let Some(target) = &redirect {
            if target.path().is_empty() {
                return Err(LaunchError::InvalidSyntax(
                    "missing redirection target".to_string(),
                ));
            }
            if stages.len() > 1 {
                return Err(LaunchError::InvalidSyntax(
                    "redirection cannot be combined with '|'".to_string(),
                ));
            }
        }

        let mut images = Vec::with_capacity(stages.len());
        for stage in &stages {
            let name = stage
                .program()
                .ok_or_else(|| LaunchError::InvalidSyntax("empty command".to_string()))?;
            let path = self
                .env
                .lookup(name)
                .ok_or_else(|| LaunchError::Resolution(name.to_string()))?;
            images.push(ExecImage::new(&path, &stage.argv)?);
        }

        let mut cmd = stages
            .iter()
            .map(|stage| stage.argv.join(" "))
            .collect::<Vec<_>>()
            .join(" | ");
        if let Some(target) = &redirect {
            cmd = format!("{cmd} {target}");
        }

        let wiring = wire(stages.len(), redirect.as_ref());
        debug!(
            "PIPELINE_BUILT: '{}' stages: {} background: {} wiring: {:?}",
            cmd,
            images.len(),
            background,
            wiring
        );
        Ok(Pipeline {
            images,
            wiring,
            redirect,
            background,
            cmd,
        })
    }
}

/// The descriptors of a [`Pipeline`] opened for launching.
///
/// Every descriptor is close-on-exec and owned, so dropping the plan closes
/// whatever the parent still holds.
#[derive(Debug)]
pub struct FdPlan {
    wiring: Vec<StageWiring>,
    pipes: Vec<(Option<OwnedFd>, Option<OwnedFd>)>,
    file: Option<OwnedFd>,
}

impl FdPlan {
    pub fn open(pipeline: &Pipeline) -> Result<Self, LaunchError> {
        let file = match &pipeline.redirect {
            Some(target) => Some(target.open()?),
            None => None,
        };
        let mut pipes = Vec::with_capacity(pipeline.len().saturating_sub(1));
        for _ in 1..pipeline.len() {
            let (read, write) = cloexec_pipe()?;
            pipes.push((Some(read), Some(write)));
        }
        Ok(FdPlan {
            wiring: pipeline.wiring.clone(),
            pipes,
            file,
        })
    }

    fn raw(&self, end: Endpoint) -> Option<RawFd> {
        let fd = match end {
            Endpoint::Terminal => None,
            Endpoint::PipeRead(n) => self.pipes.get(n).and_then(|p| p.0.as_ref()),
            Endpoint::PipeWrite(n) => self.pipes.get(n).and_then(|p| p.1.as_ref()),
            Endpoint::File => self.file.as_ref(),
        };
        fd.map(AsRawFd::as_raw_fd)
    }

    /// `(stdin, stdout)` for stage `i`; `None` means inherit.
    pub fn stage_fds(&self, i: usize) -> (Option<RawFd>, Option<RawFd>) {
        let wiring = self.wiring[i];
        (self.raw(wiring.stdin), self.raw(wiring.stdout))
    }

    /// Every descriptor the parent still holds.
    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.pipes
            .iter()
            .flat_map(|(read, write)| [read, write])
            .chain(std::iter::once(&self.file))
            .filter_map(|fd| fd.as_ref().map(AsRawFd::as_raw_fd))
            .collect()
    }

    /// Closes the ends handed to stage `i`.
    pub fn release_after_fork(&mut self, i: usize) {
        let wiring = self.wiring[i];
        for end in wiring.released_after_fork() {
            let released = match end {
                Endpoint::PipeRead(n) => self.pipes.get_mut(n).and_then(|p| p.0.take()),
                Endpoint::PipeWrite(n) => self.pipes.get_mut(n).and_then(|p| p.1.take()),
                Endpoint::File => self.file.take(),
                Endpoint::Terminal => None,
            };
            drop(released);
        }
    }
}

/// Both ends are created close-on-exec in one call, so a child forked by
/// another thread meanwhile cannot inherit them.
#[cfg(not(target_vendor = "apple"))]
fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), LaunchError> {
    let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(LaunchError::Pipe)?;
    Ok(unsafe { (OwnedFd::from_raw_fd(read), OwnedFd::from_raw_fd(write)) })
}

// no pipe2 on macOS
#[cfg(target_vendor = "apple")]
fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), LaunchError> {
    let (read, write) = nix::unistd::pipe().map_err(LaunchError::Pipe)?;
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(read), OwnedFd::from_raw_fd(write)) };
    for fd in [&read, &write] {
        nix::fcntl::fcntl(
            fd.as_raw_fd(),
            nix::fcntl::FcntlArg::F_SETFD(nix::fcntl::FdFlag::FD_CLOEXEC),
        )
        .map_err(LaunchError::Pipe)?;
    }
    Ok((read, write))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::{FcntlArg, FdFlag, fcntl};
    use std::path::PathBuf;

    fn env() -> Environment {
        Environment::with_paths(vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")])
    }

    fn fd_is_open(fd: RawFd) -> bool {
        fcntl(fd, FcntlArg::F_GETFD).is_ok()
    }

    #[test]
    fn three_stage_wiring() {
        let wiring = wire(3, None);
        assert_eq!(
            wiring,
            vec![
                StageWiring {
                    stdin: Endpoint::Terminal,
                    stdout: Endpoint::PipeWrite(0)
                },
                StageWiring {
                    stdin: Endpoint::PipeRead(0),
                    stdout: Endpoint::PipeWrite(1)
                },
                StageWiring {
                    stdin: Endpoint::PipeRead(1),
                    stdout: Endpoint::Terminal
                },
            ]
        );
        let released: Vec<_> = wiring[1].released_after_fork().collect();
        assert_eq!(released, vec![Endpoint::PipeRead(0), Endpoint::PipeWrite(1)]);
        assert_eq!(wiring[0].released_after_fork().count(), 1);
    }

    #[test]
    fn redirect_replaces_terminal_end() {
        let input = wire(1, Some(&Redirect::Input("in".into())));
        assert_eq!(input[0].stdin, Endpoint::File);
        assert_eq!(input[0].stdout, Endpoint::Terminal);

        let output = wire(1, Some(&Redirect::StdoutOutput("out".into())));
        assert_eq!(output[0].stdin, Endpoint::Terminal);
        assert_eq!(output[0].stdout, Endpoint::File);
    }

    #[test]
    fn build_resolves_and_describes() {
        let env = env();
        let pipeline = PipelineBuilder::new(&env)
            .build(
                vec![Stage::new(["sh", "-c", "true"]), Stage::new(["cat"])],
                None,
                true,
            )
            .unwrap();
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline.background);
        assert_eq!(pipeline.cmd, "sh -c true | cat");
        assert!(pipeline.images[0].path().ends_with("/sh"));
    }

    #[test]
    fn build_rejects_invalid_requests() {
        let env = env();
        let builder = PipelineBuilder::new(&env);

        assert!(matches!(
            builder.build(vec![], None, false),
            Err(LaunchError::InvalidSyntax(_))
        ));
        assert!(matches!(
            builder.build(vec![Stage::new(Vec::<String>::new())], None, false),
            Err(LaunchError::InvalidSyntax(_))
        ));
        assert!(matches!(
            builder.build(
                vec![Stage::new(["cat"]), Stage::new(["cat"])],
                Some(Redirect::Input("f".into())),
                false
            ),
            Err(LaunchError::InvalidSyntax(_))
        ));
        assert!(matches!(
            builder.build(
                vec![Stage::new(["cat"])],
                Some(Redirect::StdoutOutput(String::new())),
                false
            ),
            Err(LaunchError::InvalidSyntax(_))
        ));
        match builder.build(vec![Stage::new(["no-such-program-jsh"])], None, false) {
            Err(LaunchError::Resolution(name)) => assert_eq!(name, "no-such-program-jsh"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plan_releases_parent_ends() {
        let env = env();
        let pipeline = PipelineBuilder::new(&env)
            .build(
                vec![Stage::new(["cat"]), Stage::new(["cat"]), Stage::new(["cat"])],
                None,
                false,
            )
            .unwrap();
        let mut plan = FdPlan::open(&pipeline).unwrap();
        let all = plan.raw_fds();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|&fd| fd_is_open(fd)));

        let (stdin, stdout) = plan.stage_fds(1);
        assert!(stdin.is_some() && stdout.is_some());

        for i in 0..pipeline.len() {
            plan.release_after_fork(i);
        }
        assert!(plan.raw_fds().is_empty());
    }

    #[test]
    fn plan_fds_are_close_on_exec() {
        let env = env();
        let pipeline = PipelineBuilder::new(&env)
            .build(vec![Stage::new(["cat"]), Stage::new(["cat"])], None, false)
            .unwrap();
        let plan = FdPlan::open(&pipeline).unwrap();
        for fd in plan.raw_fds() {
            let flags = fcntl(fd, FcntlArg::F_GETFD).unwrap();
            assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        }
    }
}
