use super::*;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().expect("log").clone()
}

/// A step that records `label` and continues.
fn record(log: &Log, label: &'static str) -> impl FnOnce(NamedChain) + Send + 'static {
    let log = Arc::clone(log);
    move |chain: NamedChain| {
        log.lock().expect("log").push(label);
        chain.run();
    }
}

#[test]
fn runs_steps_in_final_list_order() {
    let log = new_log();
    let mut chain = NamedChain::new();

    chain.append("second", record(&log, "second"));
    let passed = "passed";
    let fourth_log = Arc::clone(&log);
    chain.append("fourth", move |chain: NamedChain| {
        if passed == "passed" {
            fourth_log.lock().expect("log").push("fourth");
            chain.run();
        }
    });
    chain.prepend("first", record(&log, "first"));
    chain.append("sixth", record(&log, "sixth"));

    let third_log = Arc::clone(&log);
    chain.insert_after("second", "third", move |mut chain: NamedChain| {
        third_log.lock().expect("log").push("third");
        chain.remove("third-repeat");
        chain.run();
    });
    // removed by "third" before it can run
    chain.insert_after("third", "third-repeat", record(&log, "third-repeat"));
    chain.insert_before("sixth", "fifth", record(&log, "fifth"));
    chain.append("tenth", record(&log, "tenth"));

    // never continues, so "tenth" is never reached
    let last_log = Arc::clone(&log);
    chain.insert_before("tenth", "last", move |_chain: NamedChain| {
        last_log.lock().expect("log").push("last");
    });

    chain.run();

    assert_eq!(
        entries(&log),
        vec!["first", "second", "third", "fourth", "fifth", "sixth", "last"]
    );
}

#[test]
fn steps_inserted_by_a_running_step_execute_next() {
    let log = new_log();
    let mut chain = NamedChain::new();

    let inner_log = Arc::clone(&log);
    chain.append("a", move |mut chain: NamedChain| {
        inner_log.lock().expect("log").push("a");
        chain.insert_after("a", "injected", record(&inner_log, "injected"));
        chain.prepend("front", record(&inner_log, "front"));
        chain.run();
    });
    chain.append("b", record(&log, "b"));

    chain.run();

    assert_eq!(entries(&log), vec!["a", "front", "injected", "b"]);
}

#[test]
fn missing_anchor_falls_back_to_end_for_after_and_start_for_before() {
    let log = new_log();
    let mut chain = NamedChain::new();
    chain.append("one", record(&log, "one"));
    chain.append("two", record(&log, "two"));

    chain.insert_after("missing", "after-x", record(&log, "after-x"));
    chain.insert_before("missing", "before-x", record(&log, "before-x"));

    assert_eq!(
        chain.names().collect::<Vec<_>>(),
        vec!["before-x", "one", "two", "after-x"]
    );
    chain.run();
    assert_eq!(entries(&log), vec!["before-x", "one", "two", "after-x"]);
}

#[test]
fn insert_at_past_the_end_appends() {
    let log = new_log();
    let mut chain = NamedChain::new();
    chain.append("one", record(&log, "one"));
    chain.insert_at(42, "tail", record(&log, "tail"));
    chain.insert_at(0, "head", record(&log, "head"));
    chain.insert_at(1, "middle", record(&log, "middle"));

    assert_eq!(
        chain.names().collect::<Vec<_>>(),
        vec!["head", "middle", "one", "tail"]
    );
}

#[test]
fn duplicate_names_target_the_first_match() {
    let log = new_log();
    let mut chain = NamedChain::new();
    chain.append("dup", record(&log, "dup-1"));
    chain.append("dup", record(&log, "dup-2"));
    chain.insert_after("dup", "between", record(&log, "between"));

    assert_eq!(
        chain.names().collect::<Vec<_>>(),
        vec!["dup", "between", "dup"]
    );

    chain.remove("dup");
    chain.run();
    assert_eq!(entries(&log), vec!["between", "dup-2"]);
}

#[test]
fn remove_missing_and_clear() {
    let log = new_log();
    let mut chain = NamedChain::new();
    chain.append("one", record(&log, "one"));
    chain.remove("absent");
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.state(), ChainState::Runnable);

    chain.clear();
    assert!(chain.is_empty());
    assert_eq!(chain.state(), ChainState::Idle);
    chain.run();
    assert!(entries(&log).is_empty());
}

#[test]
fn stalled_step_leaves_later_steps_unexecuted() {
    let log = new_log();
    let parked: Arc<Mutex<Option<usize>>> = Arc::new(Mutex::new(None));

    let mut chain = NamedChain::new();
    chain.append("first", record(&log, "first"));
    let stall_parked = Arc::clone(&parked);
    chain.append("stall", move |chain: NamedChain| {
        // observes what is left, then drops the chain without continuing
        *stall_parked.lock().expect("parked") = Some(chain.len());
    });
    chain.append("never", record(&log, "never"));
    chain.append("also-never", record(&log, "also-never"));

    chain.run();

    assert_eq!(entries(&log), vec!["first"]);
    assert_eq!(*parked.lock().expect("parked"), Some(2));

    // A fresh chain is the only thing an outsider can run; the stalled
    // operation stays halted.
    NamedChain::new().run();
    assert_eq!(entries(&log), vec!["first"]);
}

#[test]
fn step_can_resume_from_another_thread() {
    let log = new_log();
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    let mut chain = NamedChain::new();
    chain.append("async", |chain: NamedChain| {
        std::thread::spawn(move || chain.run());
    });
    chain.append("render", record(&log, "render"));
    chain.append("done", move |_chain: NamedChain| {
        let _ = done_tx.send(());
    });

    chain.run();
    done_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("chain resumed");
    assert_eq!(entries(&log), vec!["render"]);
}

#[test]
fn debug_lists_pending_step_names() {
    let mut chain = NamedChain::new();
    chain.append("a", |_| {});
    chain.append("b", |_| {});
    assert_eq!(format!("{chain:?}"), r#"NamedChain { steps: ["a", "b"] }"#);
}
