#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::collections::{HashMap, HashSet};

use blockc::dsl::ast::{DataType, Value};
use blockc::dsl::compiler::{BlockGraph, Input};
use blockc::compile_source;

const PROGRAMS: &[&str] = &[
    "var x = 1 + 2",
    "@button \"a\": audio.playBuzzer(440)",
    "var n = 0\n@button \"a\":\n  if n > 1:\n    audio.stop()\n  else:\n    lights.off()\n  drive.stop()",
    "var count = 0\nvar s = \"\"\n@button \"a\":\n  count += 1\n  s += count\n  count *= 2\n  count -= 3",
    "@button \"a\":\n  audio.volume += 5\n  audio.pitch -= 5\n  audio.volume -= sensor.distance\n  display.brightness *= 2\n  drive.speed = 10",
    "var xs = [1, 2]\n@button \"a\":\n  motors.run(\"A\", 50)\n  display.pixel(1, 2, \"red\")\n  list.add(xs, 3)\n  lights.setColor(sensor.color)",
    "func blink(times: number, on: boolean):\n  if on: flow.wait(times)\n@button \"a\": blink(2, true)",
    "event party: audio.stop()\n@button \"a\": party()",
    "var n = 0\n@button \"a\":\n  loop 3: audio.stop()\n  until n > 2: n += 1\n  loop: flow.wait(1)",
    "var s = \"5\"\nvar n = 1\n@button \"a\":\n  display.show(number(s) + n)\n  display.show(string(n))",
];

fn graph(src: &str) -> BlockGraph {
    match compile_source(src) {
        Ok(compilation) => compilation.blocks,
        Err(failure) => panic!("{src:?} failed: {:?}", failure.errors),
    }
}

fn errors(src: &str) -> Vec<String> {
    match compile_source(src) {
        Ok(_) => panic!("{src:?} compiled"),
        Err(failure) => failure.errors.into_iter().map(|e| e.message).collect(),
    }
}

/// Ids reachable from `root` through next and input edges.
fn reachable<'a>(graph: &'a BlockGraph, root: &'a str) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let node = graph.get(id).unwrap_or_else(|| panic!("dangling reference to {id}"));
        stack.extend(node.next.as_deref());
        stack.extend(node.children());
    }
    seen
}

// ── Structure ────────────────────────────────────────────────────

#[test]
fn every_block_hangs_off_exactly_one_script() {
    for src in PROGRAMS {
        let graph = graph(src);
        let mut owners: HashMap<&str, usize> = HashMap::new();
        for (root, _) in graph.top_level() {
            for id in reachable(&graph, root) {
                *owners.entry(id).or_default() += 1;
            }
        }
        for (id, node) in graph.iter() {
            if node.top_level {
                assert!(node.parent.is_none(), "{src:?}: top-level {id} has a parent");
                continue;
            }
            assert_eq!(owners.get(id), Some(&1), "{src:?}: {id} ({}) is not owned once", node.opcode);
        }
    }
}

#[test]
fn parent_links_mirror_next_and_inputs() {
    for src in PROGRAMS {
        let graph = graph(src);
        for (id, node) in graph.iter() {
            for child in node.next.as_deref().into_iter().chain(node.children()) {
                let child = graph.get(child).unwrap();
                assert_eq!(child.parent.as_deref(), Some(id), "{src:?}: child of {id}");
            }
            if node.shadow {
                assert!(node.next.is_none(), "{src:?}: shadow {id} is chained");
            }
        }
    }
}

#[test]
fn ids_never_collide() {
    for src in PROGRAMS {
        let graph = graph(src);
        let ids: HashSet<&str> = graph.iter().map(|(id, _)| id).collect();
        assert_eq!(ids.len(), graph.len());
        let compilation = compile_source(src).unwrap();
        let defs = &compilation.definitions;
        let entity_ids: Vec<&str> = defs
            .variables
            .values()
            .map(|v| v.id.as_str())
            .chain(defs.lists.values().map(|l| l.id.as_str()))
            .chain(defs.events.values().map(|e| e.id.as_str()))
            .chain(defs.functions.values().flat_map(|f| f.params.iter().map(|p| p.argument_id.as_str())))
            .collect();
        let unique: HashSet<&str> = entity_ids.iter().copied().collect();
        assert_eq!(unique.len(), entity_ids.len(), "{src:?}");
    }
}

// ── Scenarios ────────────────────────────────────────────────────

#[test]
fn initializer_is_folded_and_hoisted() {
    let compilation = compile_source("var x = 1 + 2").unwrap();
    assert_eq!(compilation.definitions.variables["x"].data_type, DataType::Number);
    let blocks = &compilation.blocks;
    let (_, hat) = blocks.top_level().next().unwrap();
    assert_eq!(hat.opcode, "event_whenprogramstarts");
    let set = blocks.get(hat.next.as_deref().unwrap()).unwrap();
    assert_eq!(set.opcode, "data_setvariableto");
    assert_eq!(set.inputs["VALUE"], Input::Literal(Value::Number(3.0)));
}

#[test]
fn button_event_chains_one_tone() {
    let graph = graph("@button \"a\": audio.playBuzzer(440)");
    assert_eq!(graph.len(), 2);
    let (hat_id, hat) = graph.top_level().next().unwrap();
    assert_eq!(hat.opcode, "robot_whenbuttonpressed");
    assert_eq!(hat.fields["BUTTON"].value, "a");
    let tone = graph.get(hat.next.as_deref().unwrap()).unwrap();
    assert_eq!(tone.opcode, "robot_playtone");
    assert_eq!(tone.parent.as_deref(), Some(hat_id));
    assert!(tone.next.is_none());
}

#[test]
fn variable_cannot_read_itself() {
    let errors = errors("var x: number = x + 1");
    assert!(errors.iter().any(|e| e.contains("Cannot use variable 'x' in its own initializer")), "{errors:?}");
}

#[test]
fn overload_mismatch_names_every_candidate() {
    let errors = errors("@start:\n  audio.playBuzzer(\"loud\", 1)");
    assert_eq!(errors.len(), 1);
    let message = &errors[0];
    assert!(message.contains("(string, number)"), "{message}");
    assert!(message.contains("audio.playBuzzer(freq: number)"));
    assert!(message.contains("audio.playBuzzer(freq: number, seconds: number)"));
}

#[test]
fn define_is_the_same_as_writing_the_value() {
    let with_macro = compile_source("#define N 5\nvar x = N\n@start: display.show(x)").unwrap();
    let written = compile_source("\nvar x = 5\n@start: display.show(x)").unwrap();
    assert_eq!(with_macro.blocks, written.blocks);
    assert_eq!(
        serde_json::to_value(&with_macro.definitions).unwrap(),
        serde_json::to_value(&written.definitions).unwrap(),
    );
}

// ── Properties ───────────────────────────────────────────────────

#[test]
fn redeclaration_fails_in_either_order() {
    let declarations = [
        "var x = 1",
        "var x = [1]",
        "const x = 1",
        "func x():\n  flow.wait(1)",
        "event x: flow.wait(1)",
    ];
    for first in &declarations {
        for second in &declarations {
            let errors = errors(&format!("{first}\n{second}"));
            assert!(
                errors.iter().any(|e| e.contains("already declared")),
                "{first:?} then {second:?}: {errors:?}"
            );
        }
    }
}

#[test]
fn inclusive_comparisons_match_their_expansion() {
    let prefix = "var a = 0\nvar b = 0\n@button \"a\":\n  if ";
    for (short, long) in [("a <= b", "(a < b) or (a == b)"), ("a >= b", "(a > b) or (a == b)")] {
        let short = graph(&format!("{prefix}{short}: audio.stop()"));
        let long = graph(&format!("{prefix}{long}: audio.stop()"));
        assert_eq!(short, long);
    }
    for (a, b) in [(1, 2), (2, 2), (3, 2)] {
        let short = graph(&format!("@button \"a\":\n  if {a} <= {b}: audio.stop()"));
        let long = graph(&format!("@button \"a\":\n  if ({a} < {b}) or ({a} == {b}): audio.stop()"));
        assert_eq!(short, long, "{a} <= {b}");
    }
}

#[test]
fn division_by_literal_zero_never_compiles() {
    for op in ["/", "%"] {
        for a in ["0", "1", "-7.5"] {
            let errors = errors(&format!("var x = {a} {op} 0"));
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("by zero"), "{}", errors[0]);
        }
    }
    let compilation = compile_source("var x = 7 / 2\nvar y = -7 % 3").unwrap();
    let start = compilation.blocks.top_level().next().unwrap().1;
    let set_x = compilation.blocks.get(start.next.as_deref().unwrap()).unwrap();
    assert_eq!(set_x.inputs["VALUE"], Input::Literal(Value::Number(3.5)));
    let set_y = compilation.blocks.get(set_x.next.as_deref().unwrap()).unwrap();
    assert_eq!(set_y.inputs["VALUE"], Input::Literal(Value::Number(2.0)));
}

#[test]
fn compilation_is_deterministic() {
    for src in PROGRAMS {
        let first = serde_json::to_string(&compile_source(src).unwrap()).unwrap();
        let second = serde_json::to_string(&compile_source(src).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
