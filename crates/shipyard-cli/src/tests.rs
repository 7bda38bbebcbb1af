use super::*;

use std::cell::RefCell;
use std::net::TcpListener;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use shipyard_config::{Config, Toolchain};
use tempfile::TempDir;

use crate::cli::Cli;

struct StaticConfigLoader {
    config: Config,
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

const ARTIFACT: &str = "out/app.bin";

struct TestWorld {
    source: TempDir,
    config: Config,
    port: u16,
    blocker: Option<TcpListener>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<ExitCode>,
}

impl TestWorld {
    fn new() -> Self {
        let source = TempDir::new().expect("source dir");
        let port = TcpListener::bind(("127.0.0.1", 0))
            .and_then(|listener| listener.local_addr())
            .expect("reserve port")
            .port();
        let config = Config {
            toolchain: Toolchain::Custom,
            source_path: source.path().to_str().expect("utf-8 temp dir").into(),
            artifact_path: Some(ARTIFACT.into()),
            host: String::from("127.0.0.1"),
            port: Some(port),
            ready_timeout_secs: 0,
            build_timeout_secs: 60,
            log_filter: String::from("off"),
            ..Config::default()
        };
        Self {
            source,
            config,
            port,
            blocker: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        }
    }

    fn run(&mut self, args: &[String]) {
        let mut argv = vec![OsString::from("shipyard")];
        argv.extend(args.iter().map(OsString::from));
        let loader = StaticConfigLoader {
            config: self.config.clone(),
        };
        let exit = run_with_loader(argv, &mut self.stdout, &mut self.stderr, &loader);
        self.exit_code = Some(exit);
    }

    fn stdout_text(&self) -> String {
        String::from_utf8(self.stdout.clone()).expect("stdout utf8")
    }

    fn stderr_text(&self) -> String {
        String::from_utf8(self.stderr.clone()).expect("stderr utf8")
    }
}

fn sh(script: &str) -> Vec<String> {
    vec![String::from("sh"), String::from("-c"), script.to_owned()]
}

fn artifact_script(size: u64) -> String {
    format!("mkdir -p out && head -c {size} /dev/zero > {ARTIFACT}")
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("a custom toolchain without a launch command")]
fn given_incomplete_custom(world: &RefCell<TestWorld>) {
    world.borrow_mut().config.build_command = sh("true");
}

#[given("a build that fails unless tests are skipped")]
fn given_skip_sensitive_build(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let script = format!("test \"$0\" = --no-tests && {}", artifact_script(4096));
    world.config.build_command = sh(&script);
    world.config.skip_tests_flag = Some(String::from("--no-tests"));
    world.config.launch_command = sh("exit 0");
}

#[given("a build that writes a {size} byte artifact")]
fn given_artifact_build(world: &RefCell<TestWorld>, size: u64) {
    world.borrow_mut().config.build_command = sh(&artifact_script(size));
}

#[given("a service that exits immediately")]
fn given_exiting_service(world: &RefCell<TestWorld>) {
    world.borrow_mut().config.launch_command = sh("exit 0");
}

#[given("a service that checks it was given the requested port")]
fn given_port_checking_service(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let script = format!("test \"$PORT\" = {} && test -f {{artifact}}", world.port);
    world.config.launch_command = sh(&script);
}

#[given("the requested port is already bound")]
fn given_port_bound(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    let listener = TcpListener::bind(("127.0.0.1", world.port)).expect("bind requested port");
    world.blocker = Some(listener);
}

#[when("shipyard runs with {args}")]
fn when_shipyard_runs(world: &RefCell<TestWorld>, args: String) {
    let tokens: Vec<String> = args
        .trim_matches('"')
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    world.borrow_mut().run(&tokens);
}

#[when("shipyard runs on the requested port")]
fn when_shipyard_runs_on_port(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    world.config.port = None;
    let args = vec![String::from("--port"), world.port.to_string()];
    world.run(&args);
}

#[then("shipyard exits with code {code}")]
fn then_exit_code(world: &RefCell<TestWorld>, code: u8) {
    let world = world.borrow();
    assert_eq!(
        world.exit_code,
        Some(ExitCode::from(code)),
        "stdout: {} stderr: {}",
        world.stdout_text(),
        world.stderr_text()
    );
}

#[then("stderr mentions {text}")]
fn then_stderr_mentions(world: &RefCell<TestWorld>, text: String) {
    let expected = text.trim_matches('"');
    let stderr = world.borrow().stderr_text();
    assert!(stderr.contains(expected), "stderr was: {stderr}");
}

#[then("stdout mentions {text}")]
fn then_stdout_mentions(world: &RefCell<TestWorld>, text: String) {
    let expected = text.trim_matches('"');
    let stdout = world.borrow().stdout_text();
    assert!(stdout.contains(expected), "stdout was: {stdout}");
}

#[scenario(path = "tests/features/shipyard_cli.feature")]
fn shipyard_cli(world: RefCell<TestWorld>) {
    drop(world);
}

#[test]
fn cli_flags_override_configuration() {
    let cli = Cli {
        skip_tests: true,
        port: Some(9100),
        detach: false,
    };
    let mut config = Config::default();

    cli.apply(&mut config);

    assert!(config.skip_tests);
    assert_eq!(config.port(), 9100);
}

#[test]
fn help_is_written_to_stdout() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let loader = StaticConfigLoader {
        config: Config::default(),
    };

    let exit = run_with_loader(
        [OsString::from("shipyard"), OsString::from("--help")],
        &mut stdout,
        &mut stderr,
        &loader,
    );

    assert_eq!(exit, ExitCode::SUCCESS);
    assert!(String::from_utf8_lossy(&stdout).contains("--skip-tests"));
}

#[test]
fn pipeline_errors_keep_their_stage_exit_code() {
    let error = AppError::from(shipyard::PipelineError::PortUnavailable {
        host: String::from("0.0.0.0"),
        port: 8080,
    });
    assert_eq!(error.exit_code(), ExitCode::from(3));
    assert_eq!(
        error.to_string(),
        "launch failed: port 8080 on 0.0.0.0 is already in use"
    );
}
