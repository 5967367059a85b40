use anyhow::Result;
use nix::errno::Errno;
use nix::unistd::read;
use std::os::unix::io::RawFd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    /// A signal interrupted the read; the partial line is dropped.
    Interrupted,
    Eof,
}

/// Line reader on a raw descriptor, so `EINTR` reaches the caller.
pub struct LineReader {
    fd: RawFd,
    buf: Vec<u8>,
}

impl LineReader {
    pub fn new(fd: RawFd) -> Self {
        LineReader {
            fd,
            buf: Vec::new(),
        }
    }

    pub fn read_line(&mut self) -> Result<ReadLine> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                return Ok(ReadLine::Line(
                    String::from_utf8_lossy(&line[..pos]).into_owned(),
                ));
            }
            match read(self.fd, &mut chunk) {
                Ok(0) if self.buf.is_empty() => return Ok(ReadLine::Eof),
                Ok(0) => {
                    let line = std::mem::take(&mut self.buf);
                    return Ok(ReadLine::Line(String::from_utf8_lossy(&line).into_owned()));
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(Errno::EINTR) => {
                    self.buf.clear();
                    return Ok(ReadLine::Interrupted);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
