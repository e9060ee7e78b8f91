//! Composition of the remote invocation prefix and of the `ps` command line.
//!
//! Neither function validates its input: invalid hosts or column names are
//! passed through as-is and reported by `ssh` or `ps` when the command runs.

use itertools::Itertools;

/// Columns under which `ps` emits the free-form command line
const COMMAND_COLUMNS: [&str; 3] = ["args", "cmd", "command"];

/// Builds an `ssh` command prefix for running `ps` on `user@host`.
///
/// A non-empty `password` makes the command start with `sshpass -p <password>`.
/// `timeout_seconds` sets `ConnectTimeout`, 0 leaves the ssh default which is
/// often very long, so a few seconds are recommended for hosts on a local network.
pub fn ssh_command(host: &str, user: &str, password: &str, timeout_seconds: u32) -> Vec<String> {
    let mut cmd = Vec::with_capacity(7);

    if !password.is_empty() {
        cmd.extend(["sshpass".to_string(), "-p".to_string(), password.to_string()]);
    }
    cmd.push("ssh".to_string());

    if timeout_seconds > 0 {
        cmd.push("-o".to_string());
        cmd.push(format!("ConnectTimeout={timeout_seconds}"));
    }

    cmd.push(format!("{user}@{host}"));
    cmd
}

/// A requested column split into its parts, as in `comm:20=NAME`
#[derive(Debug, PartialEq, Eq)]
struct ColumnSpec<'a> {
    requested: &'a str,
    name: &'a str,
    alias: Option<&'a str>,
}

impl<'a> ColumnSpec<'a> {
    fn parse(requested: &'a str) -> Self {
        let (spec, alias) = match requested.split_once('=') {
            Some((spec, alias)) => (spec, Some(alias)),
            None => (requested, None),
        };
        let name = spec.split_once(':').map_or(spec, |(name, _width)| name);

        ColumnSpec {
            requested,
            name,
            alias,
        }
    }

    fn is_identifier(&self) -> bool {
        self.name == "pid" || self.name == "ppid"
    }

    fn is_command(&self) -> bool {
        COMMAND_COLUMNS.contains(&self.name)
    }
}

/// Builds the `ps` invocation for the given columns.
///
/// An empty list selects every standard column (`ps -ewwF`). Otherwise `pid`
/// and `ppid` always come first, the other columns follow in request order
/// with duplicates dropped, and the command column, if requested, comes last
/// because it is the only one `ps` does not truncate.
pub fn ps_command<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    if columns.is_empty() {
        return vec!["ps".to_string(), "-ewwF".to_string()];
    }

    let specs: Vec<ColumnSpec> = columns
        .iter()
        .map(|c| ColumnSpec::parse(c.as_ref()))
        .collect();

    let mut list = vec!["pid", "ppid"];
    list.extend(
        specs
            .iter()
            .filter(|spec| !spec.is_identifier() && !spec.is_command())
            .unique_by(|spec| spec.name)
            .map(|spec| spec.requested),
    );

    let mut format = list.join(",");

    if let Some(cmd) = specs.iter().find(|spec| spec.is_command()) {
        match cmd.alias {
            Some(alias) => {
                format.push_str(",cmd=");
                format.push_str(alias);
            }
            None => format.push_str(",cmd"),
        }
    }

    vec!["ps".to_string(), "-ewwo".to_string(), format]
}
