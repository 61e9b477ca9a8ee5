use behavior_tree_engine::{
    BehaviorTree, CustomNodeDef, IntervalScheduler, ParamKind, Parameter, ParameterSet, Position,
    Registry, ScriptError, ScriptRequest, Status, TreeConfig,
};
use serde_json::Value;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A guard that patrols until it spots an intruder, then chases it down.
fn guard(req: ScriptRequest) -> Result<Status, ScriptError> {
    let bb = req.blackboard;
    match req.code {
        "spot" => {
            let distance = bb.get("intruder").and_then(Value::as_i64);
            Ok(if distance.is_some() {
                Status::Success
            } else {
                Status::Failure
            })
        }
        "chase" => {
            let distance = bb.get_by("intruder", req.node_id).and_then(Value::as_i64);
            match distance {
                Some(d) if d > 0 => {
                    println!("Chasing, {d} steps to go");
                    bb.set_by("intruder", d - 1, req.node_id);
                    Ok(Status::Running)
                }
                Some(_) => {
                    println!("Caught the intruder");
                    bb.delete("intruder");
                    Ok(Status::Success)
                }
                None => Ok(Status::Failure),
            }
        }
        "patrol" => {
            let route = req.params.get("route").and_then(Value::as_str).unwrap_or("?");
            println!("Patrolling {route} (tick {})", req.ticks_since_start);
            if req.ticks_since_start == 2 {
                bb.set("intruder", 3);
            }
            Ok(Status::Running)
        }
        other => Err(ScriptError::new(format!("unknown command {other:?}"))),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut registry = Registry::default();
    let mut params = ParameterSet::new();
    params.define(
        "route",
        Parameter::new(ParamKind::String)
            .with_default("courtyard")
            .with_rule("one_of(courtyard, gate, tower)"),
    );
    registry.register_custom(CustomNodeDef {
        name: "Patrol".to_owned(),
        code: "patrol".to_owned(),
        parameters: params,
        ..CustomNodeDef::default()
    });

    let build = |ty: &str| {
        registry
            .build(ty)
            .ok_or_else(|| anyhow::anyhow!("unknown node type {ty}"))
    };
    let start = build("Start")?;
    start.borrow_mut().meta.position = Position::new(0., 0.);
    let selector = build("Selector")?;
    let engage = build("Sequence")?;
    let spot = build("Action")?;
    spot.borrow_mut().code = Some("spot".to_owned());
    let chase = build("Action")?;
    chase.borrow_mut().code = Some("chase".to_owned());
    let patrol = build("Patrol")?;
    patrol.borrow_mut().parameters.set("route", "gate")?;

    engage.add_child(&spot)?;
    engage.add_child(&chase)?;
    selector.add_child(&engage)?;
    selector.add_child(&patrol)?;
    start.add_child(&selector)?;

    let config = TreeConfig::from_yaml_str("tickRate: 20")?;
    let mut tree = BehaviorTree::with_config(
        Box::new(guard),
        Box::new(IntervalScheduler::new()),
        config,
    );
    tree.set_root(Some(start.clone()));
    tree.set_nodes(vec![start, selector, engage, spot, chase, patrol]);
    tree.on_tick(|status| println!("  -> {status:?}"));

    tree.start();
    while tree.tick_count() < 12 {
        tree.pump();
        std::thread::sleep(Duration::from_millis(10));
    }
    tree.stop();

    let document = tree.to_document();
    println!(
        "Saved {} nodes:\n{}",
        document.metadata.node_count,
        document.to_json_string()?
    );
    Ok(())
}
