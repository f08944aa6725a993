use std::{cell::RefCell, rc::Rc};

use serde_json::json;
use sketchpad_events::{Event, InputValue, Interaction};
use sketchpad_logo::Logo;
use sketchpad_render::{Raster, SurfaceHandle};
use sketchpad_runner::Driver;

fn run(src: &str, timeout: f64, inputs: Vec<InputValue>) -> Vec<Event> {
    Driver::new(Logo::default())
        .run(src, timeout, inputs, None)
        .unwrap()
}

#[test]
fn prompt_and_confirm() {
    let src = "make \"size prompt\nif confirm = 1 [fd :size]\nprint :size";
    let events = run(
        src,
        1.0,
        vec![InputValue::Prompt("25".into()), InputValue::Confirm(false)],
    );
    assert_eq!(events, vec![Event::print("25")]);
}

#[test]
fn clicks_do_not_answer_prompts() {
    let click = Interaction {
        classname: "canvas.mousedown".into(),
        event: json!({ "x": 3, "y": 4 }),
    };
    let inputs = vec![
        InputValue::Interaction(click.clone()),
        InputValue::Prompt("5".into()),
        InputValue::Interaction(click),
        InputValue::Confirm(true),
    ];
    let events = run("print prompt\nprint confirm", 1.0, inputs);
    assert_eq!(events, vec![Event::print("5"), Event::print("1")]);
}

#[test]
fn missing_answer_is_a_runtime_error() {
    let events = run("print prompt", 1.0, vec![]);
    assert_eq!(
        events,
        vec![Event::RuntimeError {
            message: "Line 1: prompt has nothing left to read".into()
        }]
    );
}

#[test]
fn long_loops_time_out() {
    let events = run("print 1\nrepeat 1000000000 [rt 1]\nprint 2", 0.1, vec![]);
    assert_eq!(events, vec![Event::print("1"), Event::Timeout]);
}

#[test]
fn wait_resumes_on_the_next_slice() {
    let events = run("print 1\nwait\nwait\nprint 2", 1.0, vec![]);
    assert_eq!(events, vec![Event::print("1"), Event::print("2")]);
}

#[test]
fn canvas_size() {
    let surface: SurfaceHandle = Rc::new(RefCell::new(Raster::new(300, 200)));
    let events = Driver::new(Logo::default())
        .run(
            "print canvaswidth\nprint canvasheight / 2",
            1.0,
            vec![],
            Some(surface),
        )
        .unwrap();
    assert_eq!(events, vec![Event::print("300"), Event::print("100")]);

    let events = run("print canvaswidth", 1.0, vec![]);
    assert_eq!(
        events,
        vec![Event::RuntimeError {
            message: "Line 1: there is no canvas to measure".into()
        }]
    );
}

#[test]
fn deep_recursion_is_stopped() {
    let logo = Logo { max_depth: 16 };
    let events = Driver::new(logo)
        .run("to f :n\n  f :n + 1\nend\nf 0", 1.0, vec![], None)
        .unwrap();
    assert_eq!(
        events,
        vec![Event::RuntimeError {
            message: "Line 2: too many nested procedure calls (the limit is 16)".into()
        }]
    );
}
