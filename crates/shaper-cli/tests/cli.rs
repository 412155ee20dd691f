//! CLI command integration tests.
//! Each test uses a temp directory via SHAPER_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shaper_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("shaper").unwrap();
    cmd.env("SHAPER_DATA_DIR", data_dir.path());
    cmd
}

fn write_input(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Runs `run --save` and returns the saved run id.
fn saved_run(dir: &TempDir, input: &std::path::Path, extra: &[&str]) -> String {
    let output = shaper_cmd(dir)
        .arg("run")
        .arg(input)
        .args(["--save", "--seed", "7"])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("saved run "))
        .expect("run id in output")
        .trim()
        .to_string()
}

#[test]
fn run_aab_with_explicit_sizes() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aab\n");
    shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .args(["--primitives", "a,b", "--sizes", "1,1,1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("steps:      3"))
        .stdout(predicate::str::contains("units:      2"))
        .stdout(predicate::str::contains("1.400000  a"))
        .stdout(predicate::str::contains("1.000000  b"));
}

#[test]
fn run_sizes_from_file() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "a a b");
    let sizes = write_input(&dir, "sizes.txt", "1\n1\n1\n");
    shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .args(["--primitives", "a,b", "--sizes"])
        .arg(&sizes)
        .assert()
        .success()
        .stdout(predicate::str::contains("steps:      3"));
}

#[test]
fn run_exhausted_sizes_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aab");
    shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .args(["--primitives", "a,b", "--sizes", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exhausted"));
}

#[test]
fn run_rejects_bad_alphabet() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "in.txt", "abab");
    shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .args(["--primitives", "ab"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid model configuration"));
}

#[test]
fn run_from_config_file() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "in.txt", "tibudotibudo");
    let config = write_input(
        &dir,
        "model.toml",
        "[model]\nreading_frame = 2\nprimitives = [\"ti\", \"bu\", \"do\"]\nseed = 3\n\n[units]\ntibudo = 2.0\n",
    );
    shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("seed:       3"))
        .stdout(predicate::str::contains("tibudo"));
}

#[test]
fn run_trace_emits_json_lines() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aab");
    let output = shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .args(["--primitives", "a,b", "--sizes", "1,1,1", "--trace"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let traces: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(traces.len(), 3);
    assert_eq!(traces[0]["step"], 1);
    assert_eq!(traces[2]["percept"], "b");
}

#[test]
fn runs_empty_db() {
    let dir = TempDir::new().unwrap();
    shaper_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no runs)"));
}

#[test]
fn save_then_list_and_show() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aabaab");
    let id = saved_run(&dir, &input, &["--primitives", "a,b", "--label", "first"]);

    shaper_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("first"));

    shaper_cmd(&dir)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("label:      first"))
        .stdout(predicate::str::contains("seed:       7"));

    shaper_cmd(&dir)
        .args(["show", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("run:        {id}")));
}

#[test]
fn show_unknown_run_fails() {
    let dir = TempDir::new().unwrap();
    shaper_cmd(&dir)
        .args(["show", "00000000-0000-0000-0000-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run not found"));
    shaper_cmd(&dir)
        .args(["show", "latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no stored runs"));
}

#[test]
fn export_then_import() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aabaabaab");
    let id = saved_run(&dir, &input, &["--primitives", "a,b"]);

    let out = dir.path().join("store.json");
    shaper_cmd(&dir)
        .args(["export", &id])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported"));

    let json = std::fs::read_to_string(&out).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["readingFrame"], 1);

    shaper_cmd(&dir)
        .arg("import")
        .arg(&out)
        .args(["--label", "copy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("imported"));

    shaper_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("copy"));

    // The snapshot carries no seed, so none is reported.
    shaper_cmd(&dir)
        .args(["show", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("label:      copy"))
        .stdout(predicate::str::contains("seed:       -"));
}

#[test]
fn import_malformed_json_fails() {
    let dir = TempDir::new().unwrap();
    let bad = write_input(&dir, "bad.json", "{ not json");
    shaper_cmd(&dir)
        .arg("import")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse store snapshot"));
}

/// The `config:` line of `show` for `id`.
fn stored_config(dir: &TempDir, id: &str) -> serde_json::Value {
    let output = shaper_cmd(dir).args(["show", id]).output().unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find_map(|l| l.strip_prefix("config:"))
        .expect("config line in show output");
    serde_json::from_str(line.trim()).unwrap()
}

#[test]
fn run_continues_from_stored_run() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "in.txt", "tibudogolatutibudogolatu");
    let config = write_input(
        &dir,
        "model.toml",
        "[model]\nreading_frame = 2\nshaping_threshold = 1.5\nforget_weight = -0.2\n\
         primitives = [\"ti\", \"bu\", \"do\", \"go\", \"la\", \"tu\"]\n",
    );
    let first = saved_run(&dir, &input, &["--config", config.to_str().unwrap()]);

    // No --frame or --config: everything comes from the stored run.
    let resumed = saved_run(&dir, &input, &["--from", &first]);

    let original = stored_config(&dir, &first);
    let continued = stored_config(&dir, &resumed);
    assert_eq!(continued, original);
    assert_eq!(continued["reading_frame"], 2);
    assert_eq!(continued["shaping_threshold"], 1.5);
    assert_eq!(continued["primitives"].as_array().unwrap().len(), 6);
}

#[test]
fn run_from_overrides_stored_seed_only() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aabaab");
    let first = saved_run(&dir, &input, &["--primitives", "a,b"]);

    let output = shaper_cmd(&dir)
        .arg("run")
        .arg(&input)
        .args(["--from", &first, "--seed", "11", "--save"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let id = stdout
        .lines()
        .find_map(|l| l.strip_prefix("saved run "))
        .unwrap()
        .trim()
        .to_string();

    let original = stored_config(&dir, &first);
    let continued = stored_config(&dir, &id);
    assert_eq!(continued["seed"], 11);
    assert_eq!(continued["primitives"], original["primitives"]);
}

#[test]
fn compare_against_lexicon() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "aab.txt", "aab");
    let id = saved_run(&dir, &input, &["--primitives", "a,b", "--sizes", "1,1,1"]);

    shaper_cmd(&dir)
        .args(["compare", &id, "a", "ab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("words found: 1/2"))
        .stdout(predicate::str::contains("closest=a"));
}
