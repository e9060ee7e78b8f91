//! Running the listing command and streaming its output line by line

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::process::{Child, ChildStdout, ExitStatus, Stdio};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::helpers::command::CommandBuilder;
use crate::prelude::*;

#[derive(Debug, Error)]
pub enum LineSourceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read the output of {program}: {source}")]
    Read {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Lines printed on stdout by a running command.
///
/// The command's stderr goes to an anonymous temporary file so that it can
/// neither block the command nor be lost. Once stdout is exhausted the child
/// is reaped, and an unsuccessful exit is reported as a last
/// [`LineSourceError::Exit`] item. Dropping the iterator early kills the child.
#[derive(Debug)]
pub struct CommandLines {
    program: String,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Option<File>,
    buffer: Vec<u8>,
}

impl CommandLines {
    pub fn spawn(builder: &CommandBuilder) -> Result<Self, LineSourceError> {
        let program = builder.program().to_string_lossy().into_owned();
        let spawn_error = |source| LineSourceError::Spawn {
            program: program.clone(),
            source,
        };

        debug!("Running {}", builder.as_command_line());

        let stderr = tempfile::tempfile().map_err(spawn_error)?;
        let mut child = builder
            .build()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr.try_clone().map_err(spawn_error)?)
            .spawn()
            .map_err(spawn_error)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stdout is not captured")))?;

        Ok(Self {
            program,
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr: Some(stderr),
            buffer: Vec::with_capacity(256),
        })
    }

    fn read_line(&mut self) -> Option<io::Result<String>> {
        let stdout = self.stdout.as_mut()?;
        self.buffer.clear();

        match stdout.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => Some(Ok(String::from_utf8_lossy(&self.buffer)
                .trim_end_matches(['\n', '\r'])
                .to_string())),
            Err(e) => Some(Err(e)),
        }
    }

    fn wait(&mut self) -> Result<(), LineSourceError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|source| LineSourceError::Read {
            program: self.program.clone(),
            source,
        })?;
        debug!("{} exited with {status}", self.program);

        if status.success() {
            return Ok(());
        }

        Err(LineSourceError::Exit {
            program: self.program.clone(),
            status,
            stderr: self.captured_stderr(),
        })
    }

    fn captured_stderr(&mut self) -> String {
        let Some(mut file) = self.stderr.take() else {
            return String::new();
        };

        let mut content = Vec::new();
        if let Err(e) = file
            .seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut content))
        {
            warn!("Failed to read the stderr of {}: {e}", self.program);
        }

        String::from_utf8_lossy(&content).into_owned()
    }
}

impl Iterator for CommandLines {
    type Item = Result<String, LineSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stdout.as_ref()?;

        match self.read_line() {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(source)) => {
                self.stdout = None;
                Some(Err(LineSourceError::Read {
                    program: self.program.clone(),
                    source,
                }))
            }
            None => {
                self.stdout = None;
                self.wait().err().map(Err)
            }
        }
    }
}

impl Drop for CommandLines {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!("Stopping {} before the end of its output", self.program);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Trims every line and drops the blank ones, errors are passed through
pub fn non_empty_lines<I, E>(lines: I) -> impl Iterator<Item = Result<String, E>>
where
    I: IntoIterator<Item = Result<String, E>>,
{
    lines.into_iter().filter_map(|line| match line {
        Ok(line) => {
            let trimmed = line.trim();
            (!trimmed.is_empty()).then(|| Ok(trimmed.to_string()))
        }
        Err(e) => Some(Err(e)),
    })
}

lazy_static! {
    static ref ERROR_PREFIX: Regex = Regex::new(r"^[[:alpha:]]+:\s+").unwrap();
}

/// Turns a failure of the listing command into a short message: only the
/// first line of its diagnostic is kept (usage text usually follows) and a
/// leading `program: ` prefix is removed.
pub fn map_command_error(err: LineSourceError) -> PsTreeError {
    let message = match &err {
        LineSourceError::Exit { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
        _ => err.to_string(),
    };

    let first_line = message.trim().lines().next().unwrap_or_default().trim();
    let cleaned = match ERROR_PREFIX.find(first_line) {
        Some(prefix) => &first_line[prefix.end()..],
        None => first_line,
    };

    PsTreeError::Execution(cleaned.to_string())
}
