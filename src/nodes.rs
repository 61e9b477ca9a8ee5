use crate::{BehaviorNode, NodeCategory, NodeContext, Status};

pub(crate) const SEQUENCE: &str = "Sequence";
pub(crate) const SELECTOR: &str = "Selector";
pub(crate) const PARALLEL: &str = "Parallel";
pub(crate) const INVERTER: &str = "Inverter";
pub(crate) const REPEATER: &str = "Repeater";
pub(crate) const UNTIL_SUCCESS: &str = "UntilSuccess";
pub(crate) const UNTIL_FAIL: &str = "UntilFail";
pub(crate) const START: &str = "Start";
pub(crate) const ACTION: &str = "Action";
pub(crate) const WAIT: &str = "Wait";
pub(crate) const GO_TO: &str = "GoTo";
pub(crate) const CUSTOM_ACTION: &str = "CustomAction";

/// Ticks children left to right and fails on the first failure.
#[derive(Default)]
pub struct SequenceNode;

impl BehaviorNode for SequenceNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Composite
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        let from = ctx.current_child_index();
        for i in from..ctx.num_children() {
            match ctx.tick_child(i) {
                Status::Failure => {
                    ctx.set_current_child_index(0);
                    return Status::Failure;
                }
                Status::Running => {
                    ctx.set_current_child_index(i);
                    return Status::Running;
                }
                _ => (),
            }
        }
        ctx.set_current_child_index(0);
        Status::Success
    }
}

/// Ticks children left to right and succeeds on the first success.
#[derive(Default)]
pub struct SelectorNode;

impl BehaviorNode for SelectorNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Composite
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        let from = ctx.current_child_index();
        for i in from..ctx.num_children() {
            match ctx.tick_child(i) {
                Status::Success => {
                    ctx.set_current_child_index(0);
                    return Status::Success;
                }
                Status::Running => {
                    ctx.set_current_child_index(i);
                    return Status::Running;
                }
                _ => (),
            }
        }
        ctx.set_current_child_index(0);
        Status::Failure
    }
}

/// Ticks every child on every tick and decides by counting.
///
/// Config: `minSuccess` (negative means all children, default -1) and
/// `minFailure` (default 1). A `minFailure` of 0 is treated like the default,
/// so documents that stored 0 for "unset" keep working.
#[derive(Default)]
pub struct ParallelNode;

impl BehaviorNode for ParallelNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Composite
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        let len = ctx.num_children();
        if len == 0 {
            return Status::Success;
        }

        let (mut successes, mut failures) = (0, 0);
        for i in 0..len {
            match ctx.tick_child(i) {
                Status::Success => successes += 1,
                Status::Failure => failures += 1,
                _ => (),
            }
        }

        let min_success = match ctx.config_i64("minSuccess") {
            Some(n) if n >= 0 => n as usize,
            _ => len,
        };
        let min_failure = match ctx.config_i64("minFailure") {
            Some(n) if n > 0 => n as usize,
            _ => 1,
        };

        if successes >= min_success {
            Status::Success
        } else if failures >= min_failure {
            Status::Failure
        } else {
            Status::Running
        }
    }
}

#[derive(Default)]
pub struct InverterNode;

impl BehaviorNode for InverterNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Decorator
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        if ctx.num_children() == 0 {
            return Status::Failure;
        }
        match ctx.tick_child(0) {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            res => res,
        }
    }
}

/// Repeats its child `count` times (config, default 3), or forever when
/// `repeatForever` is set.
///
/// A bounded repeater loops within a single tick until the child is running,
/// fails, or has completed `count` times. In forever mode the child is ticked
/// once per tick and the repeater itself never leaves `Running`.
#[derive(Default)]
pub struct RepeaterNode {
    iteration: u64,
}

impl RepeaterNode {
    const DEFAULT_COUNT: i64 = 3;

    pub fn iteration(&self) -> u64 {
        self.iteration
    }
}

impl BehaviorNode for RepeaterNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Decorator
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        if ctx.num_children() == 0 {
            return Status::Success;
        }

        if ctx.config_bool("repeatForever").unwrap_or(false) {
            if ctx.tick_child(0).is_terminal() {
                ctx.reset_child(0);
            }
            return Status::Running;
        }

        let count = ctx
            .config_i64("count")
            .unwrap_or(Self::DEFAULT_COUNT)
            .max(0) as u64;
        while self.iteration < count {
            match ctx.tick_child(0) {
                Status::Running => return Status::Running,
                res => {
                    self.iteration += 1;
                    ctx.reset_child(0);
                    if res == Status::Failure {
                        self.iteration = 0;
                        return Status::Failure;
                    }
                }
            }
        }
        self.iteration = 0;
        Status::Success
    }

    fn reset(&mut self) {
        self.iteration = 0;
    }
}

/// Retries a failing child on every tick until it succeeds.
#[derive(Default)]
pub struct UntilSuccessNode;

impl BehaviorNode for UntilSuccessNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Decorator
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        if ctx.num_children() == 0 {
            return Status::Success;
        }
        match ctx.tick_child(0) {
            Status::Success => Status::Success,
            Status::Failure => {
                ctx.reset_child(0);
                Status::Running
            }
            _ => Status::Running,
        }
    }
}

/// Re-runs a succeeding child on every tick until it fails, then succeeds.
#[derive(Default)]
pub struct UntilFailNode;

impl BehaviorNode for UntilFailNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Decorator
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        if ctx.num_children() == 0 {
            return Status::Success;
        }
        match ctx.tick_child(0) {
            Status::Failure => Status::Success,
            Status::Success => {
                ctx.reset_child(0);
                Status::Running
            }
            _ => Status::Running,
        }
    }
}

/// Entry point marker. Forwards its only child's status.
#[derive(Default)]
pub struct StartNode;

impl BehaviorNode for StartNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Decorator
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        if ctx.num_children() == 0 {
            return Status::Success;
        }
        ctx.tick_child(0)
    }
}

/// Leaf that delegates its code to the [`crate::ScriptExecutor`]. Action,
/// Wait, GoTo and CustomAction all share it and differ only in defaults.
#[derive(Default)]
pub struct ScriptLeafNode {
    ticks_since_start: u32,
}

impl ScriptLeafNode {
    pub fn ticks_since_start(&self) -> u32 {
        self.ticks_since_start
    }
}

impl BehaviorNode for ScriptLeafNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Leaf
    }

    fn tick(&mut self, ctx: &mut NodeContext) -> Status {
        if ctx.code().is_none() {
            self.ticks_since_start = 0;
            return Status::Success;
        }
        let res = ctx.execute(self.ticks_since_start);
        if res == Status::Running {
            self.ticks_since_start += 1;
        } else {
            self.ticks_since_start = 0;
        }
        res
    }

    fn reset(&mut self) {
        self.ticks_since_start = 0;
    }
}
