use assert_cmd::Command;

#[test]
fn help_lists_session_flags() {
    let output = Command::cargo_bin("reflex")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--warmup", "--user", "--condition", "--notes", "--no-save"] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn warmup_help_describes_default_session() {
    let output = Command::cargo_bin("reflex")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("make warmup the default session for this run"));
}

#[test]
fn version_matches_package() {
    let output = Command::cargo_bin("reflex")
        .unwrap()
        .arg("--version")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn refuses_to_run_without_a_tty() {
    Command::cargo_bin("reflex")
        .unwrap()
        .arg("--no-save")
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn rejects_multi_char_key() {
    Command::cargo_bin("reflex")
        .unwrap()
        .args(["--key", "ab"])
        .assert()
        .failure();
}
