use serial_test::serial;
use stagechain::core::config::loader::CONFIG_FILE_NAME;
use stagechain::core::pipeline::queue::{NATIVE_THREAD_POOL_SIZE_ENV, THREAD_POOL_SIZE_ENV};
use stagechain::core::pipeline::{FnStage, Payload, Pipeline, ProcessContext, Stage};
use stagechain::core::{ConfigLoader, ErrorCategory};
use std::env;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const PROJECT_CONFIG: &str = r#"
use = ["sass", ["stylus"], ["postcss", { prefix = "pc" }]]
extensions = [".css", ".sss"]
thread_pool_size = 5

[logging]
default_level = "debug"
"#;

fn clear_env() {
    env::remove_var(THREAD_POOL_SIZE_ENV);
    env::remove_var(NATIVE_THREAD_POOL_SIZE_ENV);
}

fn write_project(contents: &str) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join(CONFIG_FILE_NAME), contents).expect("write config");
    dir
}

#[tokio::test]
#[serial]
async fn pipeline_built_from_project_config_runs_in_reverse() {
    clear_env();
    let dir = write_project(PROJECT_CONFIG);
    let config = ConfigLoader::load_from_workspace(dir.path()).expect("valid config");
    assert_eq!(config.thread_pool_size, Some(5));

    let postcss = FnStage::new("postcss", |payload: Payload, ctx| async move {
        let prefix = ctx
            .option("prefix")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Payload::new(format!("{}|{}", payload.code, prefix)))
    })
    .always();
    let sass = FnStage::new("sass", |payload: Payload, _ctx| async move {
        Ok(Payload::new(format!("{}|sass", payload.code)))
    })
    .always();
    let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(sass), Arc::new(postcss)];

    let queue = Arc::new(config.work_queue());
    assert_eq!(queue.max_concurrent(), 4);
    let pipeline = Pipeline::from_config(&config, stages, queue).expect("pipeline");

    assert!(pipeline.is_supported("a.SSS"));
    assert!(!pipeline.is_supported("a.less"));

    let out = pipeline
        .process(&Payload::new("src"), &ProcessContext::new("a.scss"))
        .await
        .expect("process succeeded");
    assert_eq!(out.code, "src|pc|sass");
}

#[test]
#[serial]
fn invalid_rule_in_file_is_a_configuration_error() {
    clear_env();
    let dir = write_project("use = [\"sass\", { name = \"less\" }]\n");
    let err = ConfigLoader::load_from_workspace(dir.path()).expect_err("invalid rule");
    assert_eq!(err.category, ErrorCategory::ConfigurationError);
    assert_eq!(err.code, "STG-CFG-001");
}

#[test]
#[serial]
fn zero_thread_pool_size_is_rejected() {
    clear_env();
    let dir = write_project("thread_pool_size = 0\n");
    let err = ConfigLoader::load_from_workspace(dir.path()).expect_err("invalid size");
    assert_eq!(err.code, "STG-CFG-004");
}

#[test]
#[serial]
fn unparseable_env_pool_size_is_ignored() {
    clear_env();
    env::set_var(THREAD_POOL_SIZE_ENV, "lots");
    let dir = write_project("thread_pool_size = 3\n");
    let config = ConfigLoader::load_from_workspace(dir.path()).expect("valid config");
    clear_env();
    assert_eq!(config.thread_pool_size, Some(3));
}
