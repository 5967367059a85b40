use super::ShellProxy;
use jsh_types::{Context, ExitStatus};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct Job {
    job: usize,
    pgid: i32,
    state: String,
    command: String,
}

/// Lists the job table, then any pending exit reports.
pub fn command(ctx: &Context, _argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    let jobs = proxy.list_jobs();
    let res = if jobs.is_empty() {
        ctx.write_stdout("jobs: there are no jobs")
    } else {
        let rows: Vec<Job> = jobs
            .into_iter()
            .map(|job| Job {
                job: job.id,
                pgid: job.pgid.as_raw(),
                state: job.state,
                command: job.command,
            })
            .collect();
        let table = Table::new(rows).to_string();
        ctx.write_stdout(table.as_str())
    };

    for report in proxy.take_job_reports() {
        ctx.write_stdout(&report).ok();
    }

    match res {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(_) => ExitStatus::ExitedWith(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Captured, MockProxy};
    use jsh_types::JobSummary;
    use nix::unistd::Pid;

    #[test]
    fn empty_table() {
        let mut cap = Captured::new();
        let mut proxy = MockProxy::default();
        command(&cap.ctx, vec!["jobs".into()], &mut proxy);
        assert_eq!(cap.stdout(), "jobs: there are no jobs\n");
    }

    #[test]
    fn lists_jobs() {
        let mut cap = Captured::new();
        let mut proxy = MockProxy {
            jobs: vec![
                JobSummary {
                    id: 1,
                    pgid: Pid::from_raw(4100),
                    state: "Stopped".into(),
                    command: "sleep 100".into(),
                },
                JobSummary {
                    id: 2,
                    pgid: Pid::from_raw(4200),
                    state: "Running".into(),
                    command: "yes | head".into(),
                },
            ],
            ..Default::default()
        };
        let status = command(&cap.ctx, vec!["jobs".into()], &mut proxy);
        assert_eq!(status, ExitStatus::ExitedWith(0));
        let out = cap.stdout();
        assert!(out.contains("pgid"));
        assert!(out.contains("4100"));
        assert!(out.contains("sleep 100"));
        assert!(out.contains("yes | head"));
    }
}
