use itertools::Itertools;

use crate::tree::ProcNode;

/// Headers under which `ps` prints the command line
const COMMAND_HEADERS: [&str; 3] = ["CMD", "COMMAND", "ARGS"];

/// Stats keys of `root` in display order, the command line last
pub fn display_columns(root: &ProcNode) -> Vec<String> {
    let (commands, others): (Vec<&String>, Vec<&String>) = root
        .stats
        .keys()
        .partition(|key| COMMAND_HEADERS.contains(&key.as_str()));

    others.into_iter().chain(commands).cloned().collect()
}

/// Renders the tree one process per line, children indented under their
/// parent: the pid, then the value of each of `columns` (`-` when missing).
pub fn render_tree<S: AsRef<str>>(root: &ProcNode, columns: &[S]) -> String {
    let mut out = String::new();
    render_line(root, columns, 0, &mut out);

    let mut stack = vec![root.children.iter()];
    while let Some(nodes) = stack.last_mut() {
        match nodes.next() {
            Some(node) => {
                render_line(node, columns, stack.len(), &mut out);
                stack.push(node.children.iter());
            }
            None => {
                stack.pop();
            }
        }
    }

    out
}

fn render_line<S: AsRef<str>>(node: &ProcNode, columns: &[S], depth: usize, out: &mut String) {
    let values = columns
        .iter()
        .map(|c| node.stats.get(c.as_ref()).map_or("-", String::as_str))
        .join(" ");

    out.push_str(&"  ".repeat(depth));
    out.push_str(&node.pid.to_string());
    if !values.is_empty() {
        out.push(' ');
        out.push_str(&values);
    }
    out.push('\n');
}
