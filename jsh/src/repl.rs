use crate::input::{LineReader, ReadLine};
use crate::shell::Shell;
use anyhow::Result;
use std::io::Write;
use tracing::debug;

pub struct Repl<'a> {
    pub shell: &'a mut Shell,
    reader: LineReader,
}

impl<'a> Repl<'a> {
    pub fn new(shell: &'a mut Shell) -> Self {
        Repl {
            shell,
            reader: LineReader::new(libc::STDIN_FILENO),
        }
    }

    fn print_prompt(&self) -> Result<()> {
        let mut err = std::io::stderr();
        write!(err, "{}", self.shell.config.prompt)?;
        err.flush()?;
        Ok(())
    }

    /// Reads and runs lines until `exit` or end of input; returns the exit code.
    pub fn run_interactive(&mut self) -> Result<i32> {
        let ctx = self.shell.context();
        loop {
            for report in self.shell.reap_reports() {
                ctx.write_stdout(&report)?;
            }
            self.print_prompt()?;

            match self.reader.read_line()? {
                ReadLine::Line(line) => {
                    self.shell.eval_str(&ctx, &line);
                    if let Some(code) = self.shell.exited() {
                        return Ok(code);
                    }
                }
                ReadLine::Interrupted => {
                    debug!("REPL_INTERRUPTED");
                    eprintln!();
                }
                ReadLine::Eof => {
                    eprintln!();
                    return Ok(self.shell.last_status);
                }
            }
        }
    }
}
