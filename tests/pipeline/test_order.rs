use serde_json::{json, Map};
use stagechain::core::pipeline::{
    FnStage, PathCondition, Payload, Pipeline, PipelineOptions, ProcessContext, Rule, RuleList,
    Stage, WorkQueue,
};
use stagechain::core::{AppError, ErrorCategory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tag_stage(name: &'static str) -> FnStage {
    FnStage::new(name, move |payload: Payload, _ctx| async move {
        Ok(Payload {
            code: format!("{}-{}", payload.code, name),
            ..payload
        })
    })
}

fn build(rules: Vec<Rule>, stages: Vec<Arc<dyn Stage>>) -> Pipeline {
    Pipeline::with_queue(
        PipelineOptions {
            rules: RuleList::new(rules),
            extensions: vec![".css".to_string()],
            stages,
        },
        Arc::new(WorkQueue::new(3)),
    )
}

fn scenario_pipeline() -> Pipeline {
    let a = tag_stage("A").with_condition(PathCondition::predicate(|path| path.ends_with(".txt")));
    let b = tag_stage("B").always();
    build(
        vec![Rule::new("A"), Rule::new("B")],
        vec![Arc::new(a), Arc::new(b)],
    )
}

#[tokio::test]
async fn last_declared_stage_runs_first() {
    let pipeline = scenario_pipeline();
    let out = pipeline
        .process(&Payload::new("x"), &ProcessContext::new("f.txt"))
        .await
        .expect("process succeeded");
    assert_eq!(out.code, "x-B-A");
}

#[tokio::test]
async fn non_matching_stage_is_skipped() {
    let pipeline = scenario_pipeline();
    let out = pipeline
        .process(&Payload::new("x"), &ProcessContext::new("f.css"))
        .await
        .expect("process succeeded");
    assert_eq!(out.code, "x-B");
}

#[tokio::test]
async fn tags_follow_reversed_rule_order_filtered_by_applicability() {
    let names = ["r0", "r1", "r2", "r3", "r4"];
    let stages: Vec<Arc<dyn Stage>> = names
        .iter()
        .map(|name| {
            let stage = tag_stage(*name);
            // r2 never applies to .scss payloads
            let stage = if *name == "r2" {
                stage.with_condition(PathCondition::predicate(|path| path.ends_with(".less")))
            } else {
                stage.always()
            };
            Arc::new(stage) as Arc<dyn Stage>
        })
        .collect();
    let pipeline = build(names.iter().map(|name| Rule::new(*name)).collect(), stages);

    let out = pipeline
        .process(&Payload::new("src"), &ProcessContext::new("a.scss"))
        .await
        .expect("process succeeded");
    assert_eq!(out.code, "src-r4-r3-r1-r0");
}

#[tokio::test]
async fn nothing_applicable_returns_equal_copy() {
    let never = tag_stage("never")
        .with_condition(PathCondition::regex(r"\.styl$").expect("valid regex"));
    let pipeline = build(vec![Rule::new("never"), Rule::new("unlisted")], vec![Arc::new(never)]);

    let input = Payload {
        code: "body{}".to_string(),
        map: Some("{\"version\":3}".to_string()),
        extracted: Some(json!({"id": "a.css"})),
    };
    let out = pipeline
        .process(&input, &ProcessContext::new("a.css"))
        .await
        .expect("pass-through");
    assert_eq!(out, input);
}

#[tokio::test]
async fn failure_stops_remaining_steps() {
    let later_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later_runs);
    let after = FnStage::new("after", move |payload: Payload, _ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(payload)
        }
    })
    .always();
    let failing = FnStage::new("failing", |_payload: Payload, _ctx| async move {
        Err::<Payload, _>(AppError::new(
            ErrorCategory::StageExecutionError,
            "unexpected token",
        ))
    })
    .always();

    // Reversed order: first, failing, after
    let pipeline = build(
        vec![Rule::new("after"), Rule::new("failing"), Rule::new("first")],
        vec![
            Arc::new(after),
            Arc::new(failing),
            Arc::new(tag_stage("first").always()),
        ],
    );

    let err = pipeline
        .process(&Payload::new("x"), &ProcessContext::new("a.css"))
        .await
        .expect_err("pipeline fails");
    assert_eq!(err.message, "unexpected token");
    assert_eq!(err.context.get("stage"), Some(&"failing".to_string()));
    assert_eq!(later_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn each_rule_passes_its_own_options() {
    let echo = FnStage::new("suffix", |payload: Payload, ctx| async move {
        let suffix = ctx
            .option("suffix")
            .and_then(|value| value.as_str())
            .unwrap_or("none")
            .to_string();
        Ok(Payload::new(format!("{}+{}", payload.code, suffix)))
    })
    .always();

    let mut first = Map::new();
    first.insert("suffix".to_string(), json!("one"));
    let mut second = Map::new();
    second.insert("suffix".to_string(), json!("two"));

    let pipeline = build(
        vec![
            Rule::with_options("suffix", first),
            Rule::with_options("suffix", second),
            Rule::new("suffix"),
        ],
        vec![Arc::new(echo)],
    );

    let out = pipeline
        .process(&Payload::new("x"), &ProcessContext::new("a.css"))
        .await
        .expect("process succeeded");
    assert_eq!(out.code, "x+none+two+one");
}

#[tokio::test]
async fn stage_listed_after_construction_is_used() {
    let mut pipeline = build(vec![Rule::new("late")], Vec::new());
    let ctx = ProcessContext::new("a.css");

    let before = pipeline.process(&Payload::new("x"), &ctx).await.expect("ok");
    assert_eq!(before.code, "x");

    assert!(pipeline.list_stage(Arc::new(tag_stage("late").always())));
    let after = pipeline.process(&Payload::new("x"), &ctx).await.expect("ok");
    assert_eq!(after.code, "x-late");

    assert!(pipeline.unlist_stage("late"));
    let removed = pipeline.process(&Payload::new("x"), &ctx).await.expect("ok");
    assert_eq!(removed.code, "x");
}

#[tokio::test]
async fn stages_report_dependencies_and_warnings() {
    let importer = FnStage::new("importer", |payload: Payload, ctx| async move {
        ctx.add_dependency("partials/_vars.scss");
        ctx.warn("legacy @import syntax");
        Ok(payload)
    })
    .always();
    let pipeline = build(vec![Rule::new("importer")], vec![Arc::new(importer)]);

    let ctx = ProcessContext::new("main.scss").with_source_map(true);
    pipeline
        .process(&Payload::new("@import 'vars';"), &ctx)
        .await
        .expect("process succeeded");
    assert_eq!(
        ctx.dependencies(),
        vec![std::path::PathBuf::from("partials/_vars.scss")]
    );
    assert_eq!(ctx.warnings(), vec!["legacy @import syntax".to_string()]);
}
