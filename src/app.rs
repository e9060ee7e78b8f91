use std::fmt;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use log::debug;
use pstree_remote::{ProcNode, proc_tree, render, ssh_command};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented tree, one process per line
    Tree,
    /// The tree as a nested JSON document
    Json,
}

#[derive(Parser)]
#[command(name = "pstree", version, about = "Show the process tree of a local or remote host")]
pub struct Cli {
    /// The host to inspect over ssh, the local host when omitted
    #[arg(long, env = "PSTREE_HOST")]
    pub host: Option<String>,

    /// The user to log in as on the remote host
    #[arg(short, long, env = "PSTREE_USER", default_value = "root")]
    pub user: String,

    /// The ssh password, makes the command go through `sshpass`.
    /// Key based authentication is used when omitted
    #[arg(long, env = "PSTREE_SSH_PASSWORD", hide_env_values = true, requires = "host")]
    pub password: Option<String>,

    /// The ssh connection timeout in seconds, 0 for the ssh default
    #[arg(long, env = "PSTREE_SSH_TIMEOUT", default_value_t = 5)]
    pub timeout: u32,

    /// The `ps` columns to show, comma separated (see `ps L`).
    /// Every standard column is shown when omitted
    #[arg(short, long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Only show the subtree rooted at this pid
    #[arg(long)]
    pub pid: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
    pub format: OutputFormat,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("columns", &self.columns)
            .field("pid", &self.pid)
            .field("format", &self.format)
            .finish()
    }
}

impl Cli {
    /// The command prefix running `ps` on the target host, empty for the local host
    fn remote_command(&self) -> Vec<String> {
        match &self.host {
            Some(host) => ssh_command(
                host,
                &self.user,
                self.password.as_deref().unwrap_or_default(),
                self.timeout,
            ),
            None => Vec::new(),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    debug!("{cli:?}");

    let target = cli.host.as_deref().unwrap_or("localhost");
    let root = proc_tree(&cli.remote_command(), &cli.columns)
        .with_context(|| format!("Failed to get the process tree of {target}"))?;

    let node = select(&root, cli.pid)?;
    print!("{}", output(node, cli.format)?);
    Ok(())
}

/// Returns the subtree rooted at `pid`, the whole tree without it
fn select(root: &ProcNode, pid: Option<u32>) -> Result<&ProcNode> {
    match pid {
        Some(pid) => root
            .find(|p, _| p == pid)
            .ok_or_else(|| anyhow!("No process with pid {pid} descends from pid 1")),
        None => Ok(root),
    }
}

fn output(node: &ProcNode, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Tree => Ok(render::render_tree(node, &render::display_columns(node))),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(node)?;
            json.push('\n');
            Ok(json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pstree_remote::{build_proc_tree, parse_output};

    fn tree() -> ProcNode {
        build_proc_tree(
            parse_output("PID PPID CMD\n1 0 /sbin/init\n42 1 /usr/sbin/cron -f\n").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_local_by_default() {
        let cli = Cli::try_parse_from(["pstree", "-c", "%cpu,rss,cmd"]).unwrap();
        assert!(cli.remote_command().is_empty());
        assert_eq!(cli.columns, vec!["%cpu", "rss", "cmd"]);
        assert_eq!(cli.format, OutputFormat::Tree);
    }

    #[test]
    fn test_remote_command() {
        let cli = Cli::try_parse_from([
            "pstree",
            "--host",
            "192.168.0.16",
            "--user",
            "pi",
            "--password",
            "raspberry",
            "--timeout",
            "0",
        ])
        .unwrap();
        assert_eq!(
            cli.remote_command(),
            vec!["sshpass", "-p", "raspberry", "ssh", "pi@192.168.0.16"]
        );
    }

    #[test]
    fn test_user_without_host() {
        let cli = Cli::try_parse_from(["pstree", "--user", "pi"]).unwrap();
        assert!(cli.remote_command().is_empty());
    }

    #[test]
    fn test_password_requires_host() {
        assert!(Cli::try_parse_from(["pstree", "--password", "raspberry"]).is_err());
    }

    #[test]
    fn test_debug_masks_password() {
        let cli =
            Cli::try_parse_from(["pstree", "--host", "h", "--password", "s3cret"]).unwrap();
        let debug = format!("{cli:?}");
        assert!(!debug.contains("s3cret"), "{debug}");
        assert!(debug.contains(r#"password: Some("***")"#), "{debug}");

        let cli = Cli::try_parse_from(["pstree"]).unwrap();
        assert!(format!("{cli:?}").contains("password: None"));
    }

    #[test]
    fn test_select() {
        let root = tree();
        assert_eq!(select(&root, None).unwrap().pid, 1);
        assert_eq!(select(&root, Some(42)).unwrap().pid, 42);
        assert_eq!(
            select(&root, Some(7)).unwrap_err().to_string(),
            "No process with pid 7 descends from pid 1"
        );
    }

    #[test]
    fn test_json_output() {
        let root = tree();
        let json: serde_json::Value =
            serde_json::from_str(&output(&root, OutputFormat::Json).unwrap()).unwrap();
        insta::assert_json_snapshot!(json, @r###"
        {
          "pid": 1,
          "ppid": 0,
          "stats": {
            "CMD": "/sbin/init"
          },
          "children": [
            {
              "pid": 42,
              "ppid": 1,
              "stats": {
                "CMD": "/usr/sbin/cron -f"
              },
              "children": []
            }
          ]
        }
        "###);
    }
}
