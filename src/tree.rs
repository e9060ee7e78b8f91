use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;

use crate::parser::Record;
use crate::prelude::*;

/// Pid of the process every tree is rooted at
pub const ROOT_PID: u32 = 1;

pub const PID_COLUMN: &str = "PID";
pub const PPID_COLUMN: &str = "PPID";

/// A process and the processes it started
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcNode {
    pub pid: u32,
    /// 0 when the process has no parent
    pub ppid: u32,
    /// Every column of the `ps` output except `PID` and `PPID`, as printed
    pub stats: Record,
    pub children: Vec<ProcNode>,
}

impl ProcNode {
    /// Returns the first node, in depth-first pre-order, for which `pred` is true.
    /// Siblings are visited in the order of `children`.
    pub fn find<P>(&self, mut pred: P) -> Option<&ProcNode>
    where
        P: FnMut(u32, &Record) -> bool,
    {
        if pred(self.pid, &self.stats) {
            return Some(self);
        }

        let mut stack = vec![self.children.iter()];
        while let Some(nodes) = stack.last_mut() {
            match nodes.next() {
                Some(node) => {
                    if pred(node.pid, &node.stats) {
                        return Some(node);
                    }
                    stack.push(node.children.iter());
                }
                None => {
                    stack.pop();
                }
            }
        }

        None
    }

    /// Applies `f` to every node of the tree, in the same order as [`ProcNode::find`]
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(u32, &Record),
    {
        self.find(|pid, stats| {
            f(pid, stats);
            false
        });
    }

    /// Same as [`ProcNode::for_each`], with write access to the stats.
    /// The shape of the tree cannot be changed from `f`.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(u32, &mut Record),
    {
        f(self.pid, &mut self.stats);

        let mut stack = vec![self.children.iter_mut()];
        while let Some(nodes) = stack.last_mut() {
            match nodes.next() {
                Some(ProcNode {
                    pid,
                    stats,
                    children,
                    ..
                }) => {
                    f(*pid, stats);
                    stack.push(children.iter_mut());
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    /// Number of processes in the tree, this node included
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.for_each(|_, _| count += 1);
        count
    }
}

/// Reads a pid or a similar non-negative integer from a record
pub fn get_pid(record: &Record, key: &str) -> PsTreeResult<u32> {
    let value = match record.get(key) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(PsTreeError::MissingField(key.to_string())),
    };

    let number_format = |reason: String| PsTreeError::NumberFormat {
        key: key.to_string(),
        value: value.clone(),
        reason,
    };

    let parsed: i64 = value.parse().map_err(|e| number_format(format!("{e}")))?;
    if parsed < 0 {
        return Err(PsTreeError::NegativeValue {
            key: key.to_string(),
            value: value.clone(),
        });
    }

    u32::try_from(parsed).map_err(|e| number_format(format!("{e}")))
}

/// Links the records into a tree rooted at pid 1.
///
/// Records whose chain of parents does not lead to pid 1 (kernel threads
/// descend from pid 2, for instance) are left out of the result without error.
/// When several records share a pid, the last one wins.
pub fn build_proc_tree(records: Vec<Record>) -> PsTreeResult<ProcNode> {
    let total = records.len();
    let mut nodes: HashMap<u32, ProcNode> = HashMap::with_capacity(total);
    let mut order: Vec<u32> = Vec::with_capacity(total);

    for mut stats in records {
        let pid = get_pid(&stats, PID_COLUMN)?;
        stats.remove(PID_COLUMN);

        let node = ProcNode {
            pid,
            ppid: 0,
            stats,
            children: Vec::new(),
        };

        match nodes.entry(pid) {
            Entry::Occupied(mut entry) => {
                warn!("Duplicate pid {pid} in 'ps' output, keeping the last record");
                entry.insert(node);
            }
            Entry::Vacant(entry) => {
                entry.insert(node);
                order.push(pid);
            }
        }
    }

    for pid in &order {
        if let Some(node) = nodes.get_mut(pid) {
            node.ppid = get_pid(&node.stats, PPID_COLUMN)?;
            node.stats.remove(PPID_COLUMN);
        }
    }

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for pid in &order {
        let ppid = nodes[pid].ppid;
        if ppid != *pid && nodes.contains_key(&ppid) {
            children.entry(ppid).or_default().push(*pid);
        }
    }

    let root = attach_children(ROOT_PID, &mut nodes, &children)
        .ok_or(PsTreeError::RootNotFound(ROOT_PID))?;

    debug!(
        "Built a tree of {} processes from {total} records, {} not descending from pid {ROOT_PID}",
        order.len() - nodes.len(),
        nodes.len()
    );

    Ok(root)
}

/// Moves the node `pid` and all of its descendants out of `nodes`.
/// A node already moved is skipped, so a parent cycle cannot repeat itself.
fn attach_children(
    pid: u32,
    nodes: &mut HashMap<u32, ProcNode>,
    children: &HashMap<u32, Vec<u32>>,
) -> Option<ProcNode> {
    let child_pids = |pid: u32| children.get(&pid).map_or(&[][..], Vec::as_slice).iter();

    let root = nodes.remove(&pid)?;
    let mut stack = vec![(root, child_pids(pid))];

    loop {
        let next = stack.last_mut()?.1.next();
        match next {
            Some(child) => {
                if let Some(node) = nodes.remove(child) {
                    stack.push((node, child_pids(*child)));
                }
            }
            None => {
                let (node, _) = stack.pop()?;
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(node),
                    None => return Some(node),
                }
            }
        }
    }
}

impl Drop for ProcNode {
    // Unlinks descendants one at a time, deep chains would overflow the stack otherwise
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}
