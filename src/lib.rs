//! Process tree of a local or remote Linux host, built from the output of `ps`.
//!
//! ```no_run
//! let ssh = pstree_remote::ssh_command("192.168.0.16", "pi", "", 5);
//! let root = pstree_remote::proc_tree(&ssh, &["%cpu", "%mem", "cmd"])?;
//!
//! root.for_each(|pid, stats| println!("{pid} {}", stats["CMD"]));
//! # Ok::<(), pstree_remote::PsTreeError>(())
//! ```
//!
//! Every tree is rooted at pid 1. Processes that do not descend from it, like
//! kernel threads, are left out of the result on purpose and without error.

mod prelude;

pub mod command;
pub mod error;
pub mod exec;
pub mod helpers;
pub mod parser;
pub mod render;
pub mod tree;

pub use command::{ps_command, ssh_command};
pub use error::{PsTreeError, PsTreeResult};
pub use parser::Record;
pub use tree::{ProcNode, build_proc_tree, get_pid};

use exec::{CommandLines, LineSourceError, map_command_error, non_empty_lines};
use helpers::command::CommandBuilder;
use parser::PsParser;
use prelude::*;

/// Runs `ps` with the given columns and returns the process tree.
///
/// `remote` is a command prefix such as the one built by [`ssh_command`], an
/// empty slice runs `ps` on the local host. Column names are passed to `ps`
/// unchecked, see `ps L` on the target host for the supported ones. An empty
/// column list runs `ps -ewwF`. `PID` and `PPID` are always requested.
pub fn proc_tree<S: AsRef<str>>(remote: &[String], columns: &[S]) -> PsTreeResult<ProcNode> {
    let mut builder = command_builder(ps_command(columns))?;
    if let Some((program, args)) = remote.split_first() {
        builder.wrap(program, args);
    }
    run(&builder)
}

/// Runs an arbitrary command printing a `ps`-like table and returns the
/// process tree built from its output
pub fn pstree(cmd: &[String]) -> PsTreeResult<ProcNode> {
    run(&command_builder(cmd)?)
}

/// Parses a `ps`-like table held in memory
pub fn parse_output(output: &str) -> PsTreeResult<Vec<Record>> {
    parse_lines(
        output
            .lines()
            .map(|line| Ok::<_, LineSourceError>(line.to_string())),
    )
}

/// Parses the lines of a `ps`-like table, after trimming and dropping blank lines.
/// Errors of the line source are reported through [`map_command_error`].
pub fn parse_lines<I>(lines: I) -> PsTreeResult<Vec<Record>>
where
    I: IntoIterator<Item = Result<String, LineSourceError>>,
{
    let mut parser = PsParser::new();
    for line in non_empty_lines(lines) {
        parser.feed(&line.map_err(map_command_error)?)?;
    }

    let records = parser.finish()?;
    debug!("Parsed {} records", records.len());
    Ok(records)
}

fn command_builder<I, S>(argv: I) -> PsTreeResult<CommandBuilder>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    CommandBuilder::from_argv(argv).ok_or_else(|| PsTreeError::Execution("empty command".into()))
}

fn run(builder: &CommandBuilder) -> PsTreeResult<ProcNode> {
    let lines = CommandLines::spawn(builder).map_err(map_command_error)?;
    build_proc_tree(parse_lines(lines)?)
}
