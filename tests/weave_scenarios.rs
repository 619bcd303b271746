//! End-to-end weaving scenarios against the player fixture.

use mixweave::api::*;
use mixweave::loader::{LoadError, ModuleLoader};
use mixweave::value::KwArgs;
use mixweave::{Interpreter, Value, WeaveConfig, WeaveError};
use parking_lot::Mutex;
use std::sync::Arc;

const PLAYER: &str = include_str!("fixtures/game/player.py");
const MODULE: &str = "game.player";
const TARGET: &str = "game.player.Player";

fn load(registry: Registry) -> Interpreter {
    try_load(registry).unwrap()
}

fn try_load(mut registry: Registry) -> Result<Interpreter, LoadError> {
    registry.freeze();
    let mut loader = ModuleLoader::new(registry, WeaveConfig::default());
    loader.add_source(MODULE, PLAYER);
    loader.load(MODULE)
}

fn player(interp: &Interpreter, health: i64) -> Value {
    let class = interp.get_global("Player").unwrap();
    interp.call(&class, vec![Value::Int(health)], KwArgs::new()).unwrap()
}

fn call(interp: &Interpreter, receiver: &Value, method: &str, args: Vec<Value>) -> Value {
    interp.call_method(receiver, method, args, KwArgs::new()).unwrap()
}

fn int(value: &Value) -> i64 {
    value.as_int().unwrap()
}

fn single(registry: &mut Registry, injection: Injection) {
    registry.group("test", TARGET).add(injection).register().unwrap();
}

#[test]
fn set_health_clamps_negative_writes() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "set_health",
            at_attribute("self.health").with_location(Location::new().when(Condition::lt("value", 0))),
            Callback::sync(|_, info, _, _| {
                info.cancel(0);
                Ok(())
            }),
        )
        .require(1),
    );
    let interp = load(registry);
    let p = player(&interp, 100);

    assert_eq!(int(&call(&interp, &p, "set_health", vec![Value::Int(5)])), 5);
    assert_eq!(int(&p.get_attr("health").unwrap()), 5);

    assert_eq!(int(&call(&interp, &p, "set_health", vec![Value::Int(-3)])), 0);
    assert_eq!(int(&p.get_attr("health").unwrap()), 0);
}

#[test]
fn parameter_point_rebinds_the_argument() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "set_health",
            at_parameter("value").with_location(Location::new().when(Condition::lt("value", 0))),
            Callback::sync(|_, info, _, _| {
                info.set_parameter(0);
                Ok(())
            }),
        ),
    );
    let interp = load(registry);
    let p = player(&interp, 100);
    assert_eq!(int(&call(&interp, &p, "set_health", vec![Value::Int(-8)])), 0);
    assert_eq!(int(&call(&interp, &p, "set_health", vec![Value::Int(8)])), 8);
}

#[test]
fn second_call_site_only_is_redirected() {
    let first = at_call_site("self.calculate_physics").with_location(Location::new().ordinal(0));
    let second = at_call_site("self.calculate_physics").with_location(Location::new().anchored(first, 0, false));

    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "two_calls",
            second,
            Callback::sync(|owner, info, args, _| {
                let in_space = owner.get_attr("is_in_space").is_some_and(|v| v.truthy());
                if in_space {
                    info.cancel(args[0].as_int().unwrap_or_default() * 100);
                }
                Ok(())
            }),
        )
        .require(1),
    );
    let interp = load(registry);
    let p = player(&interp, 100);

    assert_eq!(int(&call(&interp, &p, "two_calls", vec![Value::Int(3)])), 12);
    p.set_attr("is_in_space", Value::Bool(true));
    assert_eq!(int(&call(&interp, &p, "two_calls", vec![Value::Int(3)])), 6 + 300);
}

#[test]
fn dispatch_order_follows_group_priority_first() {
    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let record = |name: &'static str| {
        let seen = Arc::clone(&seen);
        Callback::sync(move |_, _, _, _| {
            seen.lock().push(name);
            Ok(())
        })
    };

    let mut registry = Registry::new();
    registry
        .group("late", TARGET)
        .priority(10)
        .add(Injection::new("do_nothing", at_entry(), record("late.first")).priority(1))
        .register()
        .unwrap();
    registry
        .group("early", TARGET)
        .priority(1)
        .add(Injection::new("do_nothing", at_entry(), record("early.slow")).priority(50))
        .add(Injection::new("do_nothing", at_entry(), record("early.fast")).priority(5))
        .register()
        .unwrap();

    let interp = load(registry);
    let p = player(&interp, 1);
    call(&interp, &p, "do_nothing", Vec::new());
    assert_eq!(*seen.lock(), vec!["early.fast", "early.slow", "late.first"]);
}

#[test]
fn cancelling_the_second_return_only() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "pick",
            at_pre_return().with_location(Location::new().ordinal(1)),
            Callback::sync(|_, info, _, _| {
                info.cancel(99);
                Ok(())
            }),
        )
        .require(1),
    );
    let interp = load(registry);
    let p = player(&interp, 1);
    assert_eq!(int(&call(&interp, &p, "pick", vec![Value::Bool(true)])), 1);
    assert_eq!(int(&call(&interp, &p, "pick", vec![Value::Bool(false)])), 99);
}

#[test]
fn return_replacement_lets_later_callbacks_run() {
    let mut registry = Registry::new();
    registry
        .group("returns", TARGET)
        .add(
            Injection::new(
                "pick",
                at_pre_return(),
                Callback::sync(|_, info, _, _| {
                    info.set_return_value(10);
                    Ok(())
                }),
            )
            .priority(1),
        )
        .add(
            Injection::new(
                "pick",
                at_pre_return(),
                Callback::sync(|_, info, _, _| {
                    let replaced = info.new_value().as_int().unwrap_or_default();
                    info.set_return_value(replaced + 1);
                    Ok(())
                }),
            )
            .priority(2),
        )
        .register()
        .unwrap();
    let interp = load(registry);
    let p = player(&interp, 1);
    assert_eq!(int(&call(&interp, &p, "pick", vec![Value::Bool(true)])), 11);
    assert_eq!(int(&call(&interp, &p, "pick", vec![Value::Bool(false)])), 11);
}

#[test]
fn value_replacement_does_not_stop_the_chain() {
    let mut registry = Registry::new();
    registry
        .group("speed", TARGET)
        .add(
            Injection::new(
                "calculate_speed",
                at_constant(1.0),
                Callback::sync(|_, info, _, _| {
                    info.set_value(1.5);
                    Ok(())
                }),
            )
            .priority(1),
        )
        .add(
            Injection::new(
                "calculate_speed",
                at_constant(1.0),
                Callback::sync(|_, info, _, _| {
                    let seen = info.new_value().as_float().unwrap_or_default();
                    info.set_value(seen + 1.0);
                    Ok(())
                }),
            )
            .priority(2),
        )
        .register()
        .unwrap();
    let interp = load(registry);
    let p = player(&interp, 1);
    let speed = call(&interp, &p, "calculate_speed", Vec::new());
    assert_eq!(speed.as_float(), Some(5.0));
}

#[test]
fn slice_and_near_pick_constants() {
    let calc = |n: usize| at_call_site("self.calculate_physics").with_location(Location::new().ordinal(n));
    let set = |v: f64| {
        Callback::sync(move |_, info, _, _| {
            info.set_value(v);
            Ok(())
        })
    };

    let mut registry = Registry::new();
    registry
        .group("shape", TARGET)
        .add(
            Injection::new(
                "slice_demo",
                at_constant(1.0).with_location(Location::new().slice(Some(calc(0)), Some(calc(1)), false, false)),
                set(2.0),
            )
            .require(1),
        )
        .add(
            Injection::new(
                "near_demo",
                at_constant(1.0).with_location(
                    Location::new()
                        .near(at_call_site("self.calculate_physics"), 1)
                        .first(),
                ),
                set(5.0),
            )
            .require(1),
        )
        .register()
        .unwrap();
    let interp = load(registry);
    let p = player(&interp, 1);
    assert_eq!(call(&interp, &p, "slice_demo", vec![Value::Int(1)]).as_float(), Some(3.0));
    assert_eq!(call(&interp, &p, "near_demo", vec![Value::Int(1)]).as_float(), Some(7.0));
}

#[test]
fn keyword_selector_sees_static_expansion_only() {
    let selector = CallSelector::callee("self.physics2")
        .with_positional(vec![ArgPattern::Any], PositionalMode::Prefix)
        .with_keywords(KeywordPattern::subset([("scale", ArgPattern::Const(3.into()))]))
        .with_unresolved(UnresolvedPolicy::Fail);
    let redirect = |result: i64| {
        Callback::sync(move |_, info, _, _| {
            info.cancel(result);
            Ok(())
        })
    };

    let mut registry = Registry::new();
    registry
        .group("kw", TARGET)
        .add(
            Injection::new(
                "kw_call_literal",
                at_call_site_matching(selector.clone())
                    .with_location(Location::new().when(Condition::eq("kwargs.scale", 3))),
                redirect(999),
            )
            .require(1),
        )
        .add(Injection::new("kw_call_unknown", at_call_site_matching(selector), redirect(777)).require(0))
        .register()
        .unwrap();
    let interp = load(registry);
    let p = player(&interp, 1);

    assert_eq!(int(&call(&interp, &p, "kw_call_literal", vec![Value::Int(2)])), 999);
    let opts = Value::dict([(Value::str("scale"), Value::Int(3))]);
    assert_eq!(int(&call(&interp, &p, "kw_call_unknown", vec![Value::Int(2), opts])), 6);
}

#[test]
fn call_original_with_new_arguments() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "kw_call_literal",
            at_call_site("self.physics2"),
            Callback::sync(|_, info, args, kwargs| {
                let doubled = args[0].as_int().unwrap_or_default() * 2;
                let result = info.call_original_with(vec![Value::Int(doubled)], kwargs.clone())?;
                info.cancel(result);
                Ok(())
            }),
        ),
    );
    let interp = load(registry);
    let p = player(&interp, 1);
    assert_eq!(int(&call(&interp, &p, "kw_call_literal", vec![Value::Int(2)])), 12);
}

#[test]
fn exception_points_suppress_or_reraise() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "risky",
            at_exception(),
            Callback::sync(|_, info, _, _| {
                let is_zero_division = info
                    .context()
                    .get("exception")
                    .is_some_and(|e| e.type_name() == "ZeroDivisionError");
                if is_zero_division {
                    info.cancel(-1);
                }
                Ok(())
            }),
        ),
    );
    let interp = load(registry);
    let p = player(&interp, 1);
    assert_eq!(int(&call(&interp, &p, "risky", vec![Value::Int(5)])), 2);
    assert_eq!(int(&call(&interp, &p, "risky", vec![Value::Int(0)])), -1);

    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new("risky", at_exception(), Callback::sync(|_, _, _, _| Ok(()))),
    );
    let interp = load(registry);
    let p = player(&interp, 1);
    let err = interp
        .call_method(&p, "risky", vec![Value::Int(0)], KwArgs::new())
        .unwrap_err();
    assert_eq!(err.class_name, "ZeroDivisionError");
}

#[test]
fn exception_callbacks_get_no_positional_arguments() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "risky",
            at_exception(),
            Callback::sync(move |_, info, args, _| {
                recorded.lock().push(args.len());
                info.cancel(7);
                Ok(())
            }),
        ),
    );
    let interp = load(registry);
    let p = player(&interp, 1);
    assert_eq!(int(&call(&interp, &p, "risky", vec![Value::Int(0)])), 7);
    assert_eq!(*seen.lock(), vec![0]);
}

#[test]
fn constant_callbacks_ignore_caller_keywords() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let mut registry = Registry::new();
    registry
        .group("tuning", "tuning")
        .add(Injection::new(
            "factor",
            at_constant(1.5),
            Callback::sync(move |_, info, args, kwargs| {
                recorded.lock().push((args.len(), kwargs.len()));
                info.set_value(2.5);
                Ok(())
            }),
        ))
        .register()
        .unwrap();
    let mut loader = ModuleLoader::new(registry, WeaveConfig::default());
    loader.add_source(
        "tuning",
        "def factor(x, **options):\n    return x * 1.5\n\nresult = factor(2, mode=\"fast\")\n",
    );
    let interp = loader.load("tuning").unwrap();
    assert_eq!(interp.get_global("result").and_then(|v| v.as_float()), Some(5.0));
    assert_eq!(*seen.lock(), vec![(0, 0)]);
}

#[test]
fn unnamed_callbacks_run_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    let mut group = registry.group("ordered", TARGET);
    for index in 0..12usize {
        let order = order.clone();
        group = group.add(Injection::new(
            "do_nothing",
            at_entry(),
            Callback::sync(move |_, _, _, _| {
                order.lock().push(index);
                Ok(())
            }),
        ));
    }
    group.register().unwrap();
    let interp = load(registry);
    let p = player(&interp, 1);
    call(&interp, &p, "do_nothing", Vec::new());
    assert_eq!(*order.lock(), (0..12).collect::<Vec<usize>>());
}

#[test]
fn mixin_members_extend_the_player() {
    let mut registry = Registry::new();
    registry
        .group("mixin", TARGET)
        .member("mixin_tag", ClassMember::Attribute(Literal::Str("mixin".into())))
        .member(
            "mixin_double_health",
            ClassMember::method(|_, args, _| {
                let health = args
                    .first()
                    .and_then(|me| me.get_attr("health"))
                    .and_then(|h| h.as_int())
                    .unwrap_or_default();
                Ok(Value::Int(health * 2))
            }),
        )
        .register()
        .unwrap();
    let interp = load(registry);
    let p = player(&interp, 7);
    assert_eq!(int(&call(&interp, &p, "mixin_double_health", Vec::new())), 14);
    assert_eq!(p.get_attr("mixin_tag").map(|v| v.to_string()).as_deref(), Some("mixin"));
}

#[test]
fn produced_values_pass_through_hooks() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new(
            "drops",
            at_produced_value(),
            Callback::sync(|_, info, _, _| {
                let v = info.value().as_int().unwrap_or_default();
                info.set_value(v + 1);
                Ok(())
            }),
        ),
    );
    let interp = load(registry);
    let p = player(&interp, 1);
    let drops = call(&interp, &p, "drops", vec![Value::Int(3)]);
    let items: Vec<i64> = drops.as_items().unwrap().iter().map(int).collect();
    assert_eq!(items, vec![1, 11, 21]);
}

#[test]
fn module_level_functions_are_their_own_target() {
    let mut registry = Registry::new();
    registry
        .group("spawn", MODULE)
        .add(Injection::new(
            "make_player",
            at_parameter("health"),
            Callback::sync(|_, info, _, _| {
                info.set_parameter(1);
                Ok(())
            }),
        ))
        .register()
        .unwrap();
    let interp = load(registry);
    let make = interp.get_global("make_player").unwrap();
    let p = interp.call(&make, Vec::new(), KwArgs::new()).unwrap();
    assert_eq!(int(&p.get_attr("health").unwrap()), 1);
}

#[test]
fn require_mismatch_aborts_the_module() {
    let mut registry = Registry::new();
    single(
        &mut registry,
        Injection::new("two_calls", at_call_site("self.calculate_physics"), Callback::sync(|_, _, _, _| Ok(())))
            .require(1),
    );
    let Err(LoadError::Weave(WeaveError::MatchCount(mismatch))) = try_load(registry) else {
        panic!("expected a match-count failure");
    };
    assert_eq!((mismatch.matched, mismatch.expected), (2, 1));
}

#[test]
fn weaving_nothing_preserves_behaviour() {
    let battery = |interp: &Interpreter| -> Vec<String> {
        let p = player(interp, 100);
        let opts = Value::dict([(Value::str("scale"), Value::Int(4))]);
        let calls: Vec<(&str, Vec<Value>)> = vec![
            ("set_health", vec![Value::Int(-3)]),
            ("calculate_speed", vec![]),
            ("two_calls", vec![Value::Int(3)]),
            ("slice_demo", vec![Value::Int(1)]),
            ("near_demo", vec![Value::Int(1)]),
            ("pick", vec![Value::Bool(true)]),
            ("pick", vec![Value::Bool(false)]),
            ("drops", vec![Value::Int(3)]),
            ("kw_call_literal", vec![Value::Int(2)]),
            ("kw_call_unknown", vec![Value::Int(2), opts]),
            ("risky", vec![Value::Int(4)]),
            ("do_nothing", vec![]),
        ];
        calls
            .into_iter()
            .map(|(name, args)| call(interp, &p, name, args).repr())
            .collect()
    };

    let plain = battery(&load(Registry::new()));

    let mut elsewhere = Registry::new();
    elsewhere
        .group("other", "game.enemy.Enemy")
        .add(Injection::new("set_health", at_entry(), Callback::sync(|_, info, _, _| {
            info.cancel(0);
            Ok(())
        })))
        .register()
        .unwrap();
    let untouched = battery(&load(elsewhere));

    assert_eq!(plain, untouched);
    assert_eq!(
        plain,
        vec!["-3", "2.0", "12", "2.0", "3.0", "1", "2", "[0, 10, 20]", "6", "8", "2", "None"]
    );
}
