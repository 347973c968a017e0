//! End-to-end resolution tests over the reference matrix fixture.

use toxide_core::{
    check_consistency, CiSchedule, ConfigError, MatrixConfig, Schedule, TEST_ROLE,
};

const FIXTURE: &str = include_str!("fixtures/toxide.toml");

fn fixture_config() -> MatrixConfig {
    MatrixConfig::from_toml_str(FIXTURE).expect("fixture must parse")
}

#[test]
fn test_full_matrix_resolves_in_declaration_order() {
    let schedule = Schedule::build(&fixture_config(), "ubuntu-latest").expect("build failed");
    assert_eq!(
        schedule.env_names(),
        vec![
            "py37",
            "py38",
            "py39",
            "py310",
            "pypy3",
            "docs",
            "flake8",
            "mypy-py37",
            "mypy-py38",
            "mypy-py39",
            "mypy-py310",
            "coverage",
            "xmlschema190",
            "xmlschema1100",
        ]
    );
}

#[test]
fn test_resolution_is_deterministic_and_idempotent() {
    let config = fixture_config();
    let first = Schedule::build(&config, "ubuntu-latest").expect("build failed");
    let second = Schedule::build(&config, "ubuntu-latest").expect("build failed");

    assert_eq!(first, second);
    assert_eq!(
        first.digest().expect("digest"),
        second.digest().expect("digest")
    );

    let first_json = serde_json::to_string(&first).expect("serialize");
    let second_json = serde_json::to_string(&second).expect("serialize");
    assert_eq!(first_json, second_json, "byte-identical resolutions");
}

#[test]
fn test_typecheck_flags_vary_by_interpreter() {
    let schedule = Schedule::build(&fixture_config(), "ubuntu-latest").expect("build failed");

    let command_for = |env: &str| -> Vec<String> {
        schedule
            .cells
            .iter()
            .find(|c| c.env == env)
            .unwrap_or_else(|| panic!("cell {} missing", env))
            .pipeline
            .commands[0]
            .clone()
    };

    let relaxed = [
        "--no-warn-redundant-casts",
        "--no-warn-unused-ignores",
        "--no-warn-return-any",
    ];

    let py37 = command_for("mypy-py37");
    for flag in relaxed {
        assert!(py37.contains(&flag.to_string()), "py37 carries {}", flag);
    }

    for env in ["mypy-py38", "mypy-py39", "mypy-py310"] {
        let command = command_for(env);
        assert!(command.contains(&"--strict".to_string()));
        for flag in relaxed {
            assert!(
                !command.contains(&flag.to_string()),
                "{} must not carry {}",
                env,
                flag
            );
        }
    }
}

#[test]
fn test_pin_environments_union_base_deps() {
    let schedule = Schedule::build(&fixture_config(), "ubuntu-latest").expect("build failed");

    let deps_for = |env: &str| -> Vec<String> {
        schedule
            .cells
            .iter()
            .find(|c| c.env == env)
            .unwrap_or_else(|| panic!("cell {} missing", env))
            .pipeline
            .deps
            .clone()
    };

    let pinned = deps_for("xmlschema1100");
    assert!(pinned.iter().any(|d| d.contains("~=1.10.0")));
    assert!(pinned.contains(&"lxml".to_string()));
    assert!(pinned.contains(&"xmlschema>=1.9.0".to_string()));

    let older = deps_for("xmlschema190");
    assert!(older.iter().any(|d| d.contains("~=1.9.0")));
    assert!(!older.iter().any(|d| d.contains("~=1.10.0")));
}

#[test]
fn test_plain_interpreter_cells_use_test_role() {
    let schedule = Schedule::build(&fixture_config(), "ubuntu-latest").expect("build failed");
    let cell = schedule
        .cells
        .iter()
        .find(|c| c.env == "py310")
        .expect("py310 cell");
    assert_eq!(cell.pipeline.role, TEST_ROLE);
    assert_eq!(cell.pipeline.exe, "python3.10");
    assert_eq!(cell.pipeline.commands, vec![vec!["python3.10", "-m", "unittest"]]);

    let sequence = cell.pipeline.command_sequence();
    assert_eq!(sequence.len(), 2, "install then test");
    assert_eq!(sequence[0][..4], ["python3.10", "-m", "pip", "install"]);
}

#[test]
fn test_ci_matrix_excludes_pairs_and_keeps_the_rest() {
    let ci = CiSchedule::build(&fixture_config()).expect("build failed");

    assert_eq!(ci.cells.len(), 3 * 4 - 2);
    assert!(ci.cells_for("macos-latest", "3.7").is_empty());
    assert!(ci.cells_for("windows-latest", "3.7").is_empty());
    assert_eq!(ci.cells_for("ubuntu-latest", "3.9").len(), 1);
    assert_eq!(ci.cells_for("ubuntu-latest", "3.9")[0].env, "py39");
}

#[test]
fn test_malformed_spec_fails_before_any_pipeline() {
    let mut config = fixture_config();
    config.matrix.envlist.insert(0, "py{37,38".to_string());

    let err = Schedule::build(&config, "ubuntu-latest").expect_err("expected error");
    match err {
        ConfigError::UnbalancedBrace { spec } => assert_eq!(spec, "py{37,38"),
        other => panic!("expected UnbalancedBrace, got {:?}", other),
    }
}

#[test]
fn test_fixture_views_are_consistent() {
    let report = check_consistency(&fixture_config()).expect("check failed");
    assert!(report.consistent(), "findings: {:?}", report.findings);
}

#[test]
fn test_config_loads_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("toxide.toml");
    std::fs::write(&path, FIXTURE).expect("write fixture");

    let config = MatrixConfig::load(&path).expect("load failed");
    assert_eq!(config.matrix.envlist.len(), 7);
    assert!(config.matrix.skip_missing_interpreters);

    let missing = dir.path().join("nope.toml");
    let err = MatrixConfig::load(&missing).expect_err("expected error");
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_platform_filtered_schedule_drops_excluded_interpreter_cells() {
    let schedule = Schedule::build(&fixture_config(), "windows-latest").expect("build failed");
    let names = schedule.env_names();
    assert!(!names.contains(&"py37"));
    assert!(!names.contains(&"mypy-py37"));
    assert!(names.contains(&"py38"));
    assert!(names.contains(&"docs"));
    assert_eq!(names.len(), 12);
}
