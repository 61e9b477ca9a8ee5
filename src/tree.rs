use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::{
    error::LoadError,
    nodes::START,
    parser::{self, LoadedTree},
    version::{DocumentMigrator, VersionMigrator},
    Blackboard, Context, NodeFactory, NodeId, NodeRef, Scheduler, ScriptExecutor, Status,
    TimerId, TreeConfig, TreeDocument,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Paused,
}

type TickObserver = Box<dyn FnMut(Status)>;
type StateObserver = Box<dyn FnMut(ExecutionState)>;

/// Owns a tree and drives it.
///
/// The tree either has a single `root`, or a node list containing `Start`
/// nodes, each of which anchors an independent subtree. Ticks are issued by
/// the host through [`BehaviorTree::tick`], [`BehaviorTree::step`] or, while
/// running, [`BehaviorTree::pump`].
pub struct BehaviorTree {
    root: Option<NodeRef>,
    nodes: Vec<NodeRef>,
    blackboard: Blackboard,
    executor: Box<dyn ScriptExecutor>,
    scheduler: Box<dyn Scheduler>,
    migrator: Box<dyn DocumentMigrator>,
    timer: Option<TimerId>,
    config: TreeConfig,
    state: ExecutionState,
    tick_count: u64,
    created: Option<DateTime<Utc>>,
    tick_observers: Vec<TickObserver>,
    state_observers: Vec<StateObserver>,
}

impl BehaviorTree {
    pub fn new(executor: Box<dyn ScriptExecutor>, scheduler: Box<dyn Scheduler>) -> Self {
        Self::with_config(executor, scheduler, TreeConfig::default())
    }

    pub fn with_config(
        executor: Box<dyn ScriptExecutor>,
        scheduler: Box<dyn Scheduler>,
        config: TreeConfig,
    ) -> Self {
        Self {
            root: None,
            nodes: vec![],
            blackboard: Blackboard::new(),
            executor,
            scheduler,
            migrator: Box::new(VersionMigrator),
            timer: None,
            config: TreeConfig::new(config.tick_rate),
            state: ExecutionState::Idle,
            tick_count: 0,
            created: None,
            tick_observers: vec![],
            state_observers: vec![],
        }
    }

    pub fn set_migrator(&mut self, migrator: Box<dyn DocumentMigrator>) {
        self.migrator = migrator;
    }

    pub fn root(&self) -> Option<&NodeRef> {
        self.root.as_ref()
    }

    pub fn set_root(&mut self, root: Option<NodeRef>) {
        self.root = root;
    }

    /// The full node list, including nodes not connected to `root`.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn set_nodes(&mut self, nodes: Vec<NodeRef>) {
        self.nodes = nodes;
    }

    pub fn find_node(&self, id: &NodeId) -> Option<NodeRef> {
        self.nodes
            .iter()
            .find(|node| node.borrow().id() == id)
            .cloned()
            .or_else(|| {
                let root = self.root.as_ref()?;
                std::iter::once(root.clone())
                    .chain(root.descendants())
                    .find(|node| node.borrow().id() == id)
            })
    }

    /// Start nodes of the node list, left to right. Nodes at the same
    /// horizontal position keep their list order.
    pub fn start_nodes(&self) -> Vec<NodeRef> {
        let mut ret: Vec<NodeRef> = self
            .nodes
            .iter()
            .filter(|node| node.borrow().type_name() == START)
            .cloned()
            .collect();
        ret.sort_by(|a, b| {
            let (a, b) = (a.borrow().meta.position.x, b.borrow().meta.position.x);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });
        ret
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn tick_rate(&self) -> u32 {
        self.config.tick_rate
    }

    pub fn on_tick(&mut self, observer: impl FnMut(Status) + 'static) {
        self.tick_observers.push(Box::new(observer));
    }

    pub fn on_state_change(&mut self, observer: impl FnMut(ExecutionState) + 'static) {
        self.state_observers.push(Box::new(observer));
    }

    /// Runs one evaluation pass.
    ///
    /// Without Start nodes the root is ticked, and restarted once it reaches
    /// a terminal status. With Start nodes every one of them is ticked and
    /// restarted on its own; the result is `Running` if any of them is still
    /// running, otherwise `Failure` if any failed, otherwise `Success`.
    pub fn tick(&mut self) -> Status {
        let starts = self.start_nodes();
        let mut ctx = Context::new(&mut self.blackboard, &mut *self.executor);

        let res = if starts.is_empty() {
            let Some(root) = self.root.clone() else {
                return Status::Idle;
            };
            self.tick_count += 1;
            let res = root.tick(&mut ctx);
            for observer in &mut self.tick_observers {
                observer(res);
            }
            if res.is_terminal() {
                root.reset();
            }
            res
        } else {
            self.tick_count += 1;
            let statuses: Vec<Status> = starts.iter().map(|start| start.tick(&mut ctx)).collect();
            let res = if statuses.contains(&Status::Running) {
                Status::Running
            } else if statuses.contains(&Status::Failure) {
                Status::Failure
            } else {
                Status::Success
            };
            for (start, status) in starts.iter().zip(&statuses) {
                if status.is_terminal() {
                    start.reset();
                }
            }
            for observer in &mut self.tick_observers {
                observer(res);
            }
            res
        };
        tracing::debug!(tick = self.tick_count, status = ?res, "Ticked");
        res
    }

    fn set_state(&mut self, state: ExecutionState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = ?self.state, to = ?state, "Execution state changed");
        self.state = state;
        for observer in &mut self.state_observers {
            observer(state);
        }
    }

    fn arm_timer(&mut self) {
        self.disarm_timer();
        self.timer = Some(self.scheduler.arm(self.config.tick_interval()));
    }

    fn disarm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.scheduler.disarm(timer);
        }
    }

    /// Begins continuous execution at the configured tick rate.
    pub fn start(&mut self) {
        if self.state == ExecutionState::Running {
            return;
        }
        self.arm_timer();
        self.set_state(ExecutionState::Running);
    }

    pub fn pause(&mut self) {
        if self.state != ExecutionState::Running {
            return;
        }
        self.disarm_timer();
        self.set_state(ExecutionState::Paused);
    }

    /// Stops execution, resets every subtree and clears the blackboard.
    pub fn stop(&mut self) {
        self.disarm_timer();
        self.reset_all();
        self.blackboard.clear();
        self.set_state(ExecutionState::Idle);
    }

    /// Ticks exactly once outside of the timer. A running tree is paused
    /// first and stays paused; an idle one goes back to idle.
    pub fn step(&mut self) -> Status {
        let prior = self.state;
        if prior == ExecutionState::Running {
            self.disarm_timer();
        }
        self.state = ExecutionState::Paused;
        let res = self.tick();
        let next = if prior == ExecutionState::Idle {
            ExecutionState::Idle
        } else {
            ExecutionState::Paused
        };
        // Observers only see the net transition
        self.state = prior;
        self.set_state(next);
        res
    }

    /// Changes the tick rate, clamped to 1..=60 ticks per second. A running
    /// timer is restarted at the new rate.
    pub fn set_tick_rate(&mut self, rate: u32) {
        self.config.tick_rate = TreeConfig::clamp_tick_rate(rate);
        if self.state == ExecutionState::Running {
            self.arm_timer();
        }
    }

    /// Ticks once per timer firing that is due. Returns the number of ticks.
    pub fn pump(&mut self) -> u32 {
        let Some(timer) = self.timer.filter(|_| self.state == ExecutionState::Running) else {
            return 0;
        };
        let due = self.scheduler.poll(timer);
        for _ in 0..due {
            self.tick();
        }
        due
    }

    /// Resets the tick counter and the subtree under `root`. Start-anchored
    /// subtrees outside of it are left alone; see [`BehaviorTree::reset_all`].
    pub fn reset(&mut self) {
        self.tick_count = 0;
        if let Some(root) = &self.root {
            root.reset();
        }
    }

    /// Like [`BehaviorTree::reset`], but also resets every Start-anchored
    /// subtree.
    pub fn reset_all(&mut self) {
        self.reset();
        for start in self.start_nodes() {
            start.reset();
        }
    }

    pub fn to_document(&self) -> TreeDocument {
        TreeDocument::capture(self.root.as_ref(), &self.blackboard, self.created)
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        self.to_document().to_json_value()
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        self.to_document().to_json_string()
    }

    /// Replaces the tree with the one in `document`. On error nothing has been
    /// changed.
    pub fn from_json(
        &mut self,
        document: Value,
        factory: &dyn NodeFactory,
    ) -> Result<(), LoadError> {
        let loaded = parser::load(document, factory, &*self.migrator)?;
        self.replace(loaded);
        Ok(())
    }

    pub fn from_json_str(&mut self, json: &str, factory: &dyn NodeFactory) -> Result<(), LoadError> {
        let loaded = parser::load_str(json, factory, &*self.migrator)?;
        self.replace(loaded);
        Ok(())
    }

    pub fn from_yaml(&mut self, yaml: &str, factory: &dyn NodeFactory) -> Result<(), LoadError> {
        let loaded = parser::load_yaml(yaml, factory, &*self.migrator)?;
        self.replace(loaded);
        Ok(())
    }

    fn replace(&mut self, loaded: LoadedTree) {
        self.root = loaded.root;
        self.nodes = loaded.nodes;
        self.blackboard.from_json(&loaded.blackboard);
        self.created = loaded.metadata.created;
        self.tick_count = 0;
        tracing::info!(
            nodes = self.nodes.len(),
            root = ?self.root.as_ref().map(NodeRef::id),
            "Loaded tree"
        );
    }
}

impl Drop for BehaviorTree {
    fn drop(&mut self) {
        self.disarm_timer();
        self.blackboard.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ManualScheduler, Position, Registry, ScriptError, ScriptRequest};

    fn echo(req: ScriptRequest) -> Result<Status, ScriptError> {
        match req.code {
            "success" => Ok(Status::Success),
            "failure" => Ok(Status::Failure),
            "running" => Ok(Status::Running),
            _ => Err(ScriptError::new("unknown command")),
        }
    }

    fn start_at(registry: &Registry, x: f64, code: &str) -> NodeRef {
        let start = registry.build("Start").unwrap();
        start.borrow_mut().meta.position = Position::new(x, 0.);
        let leaf = registry.build("Action").unwrap();
        leaf.borrow_mut().code = Some(code.to_owned());
        start.add_child(&leaf).unwrap();
        start
    }

    #[test]
    fn test_start_node_order() {
        let registry = Registry::default();
        let right = start_at(&registry, 100., "success");
        let left = start_at(&registry, -5., "success");
        let tie = start_at(&registry, 100., "success");
        let other = registry.build("Sequence").unwrap();

        let mut tree = BehaviorTree::new(Box::new(echo), Box::new(ManualScheduler::new()));
        tree.set_nodes(vec![right.clone(), other, left.clone(), tie.clone()]);
        let order: Vec<_> = tree.start_nodes().iter().map(NodeRef::id).collect();
        assert_eq!(order, vec![left.id(), right.id(), tie.id()]);
    }

    #[test]
    fn test_start_node_aggregation() {
        let registry = Registry::default();
        let mut tree = BehaviorTree::new(Box::new(echo), Box::new(ManualScheduler::new()));

        let fail = start_at(&registry, 0., "failure");
        let run = start_at(&registry, 10., "running");
        tree.set_nodes(vec![fail.clone(), run.clone()]);
        assert_eq!(tree.tick(), Status::Running);
        // Terminal Start nodes restart right away, running ones keep going
        assert_eq!(fail.status(), Status::Idle);
        assert_eq!(run.status(), Status::Running);
        assert_eq!(tree.tick_count(), 1);

        tree.set_nodes(vec![fail, start_at(&registry, 5., "success")]);
        assert_eq!(tree.tick(), Status::Failure);
        tree.set_nodes(vec![start_at(&registry, 5., "success")]);
        assert_eq!(tree.tick(), Status::Success);
        assert_eq!(tree.tick_count(), 3);
    }

    #[test]
    fn test_find_node() {
        let registry = Registry::default();
        let mut tree = BehaviorTree::new(Box::new(echo), Box::new(ManualScheduler::new()));
        let root = registry.build("Sequence").unwrap();
        let leaf = registry.build("Action").unwrap();
        root.add_child(&leaf).unwrap();
        tree.set_root(Some(root));
        assert!(tree.find_node(&leaf.id()).unwrap().ptr_eq(&leaf));
        assert!(tree.find_node(&NodeId::from("missing")).is_none());
    }
}
