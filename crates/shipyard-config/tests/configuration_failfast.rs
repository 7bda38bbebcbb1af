use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use shipyard_config::Config;
use tempfile::TempDir;

fn load_with_file(contents: &str) -> Result<Config, String> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("shipyard.toml");
    fs::write(&path, contents).expect("write config");
    let args = vec![
        OsString::from("shipyard"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    Config::load_from_iter(args).map_err(|error| error.to_string())
}

#[test]
fn malformed_port_is_rejected() {
    let error = load_with_file("port = \"eighty\"").expect_err("loading must fail");
    assert!(!error.is_empty(), "expected a descriptive error");
}

#[test]
fn unknown_toolchain_is_rejected() {
    load_with_file("toolchain = \"gradle\"").expect_err("loading must fail");
}

#[test]
fn custom_commands_load_from_file() {
    let config = load_with_file(
        "toolchain = \"custom\"\n\
         build_command = [\"make\", \"dist\"]\n\
         artifact_path = \"out/service.bin\"\n\
         launch_command = [\"{artifact}\", \"--port\", \"{port}\"]\n",
    )
    .expect("config loads");
    assert_eq!(config.build_steps(), vec![vec!["make", "dist"]]);
    assert_eq!(
        config.artifact_path().map(|path| path.to_string()),
        Some(String::from("out/service.bin"))
    );
    assert_eq!(config.launch_command(), vec!["{artifact}", "--port", "{port}"]);
}
