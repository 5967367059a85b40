use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

fn run_jsh(command: &str) -> std::process::Output {
    let config_home = tempfile::tempdir().expect("create config dir");
    Command::new(env!("CARGO_BIN_EXE_jsh"))
        .args(["-c", command])
        .env("XDG_CONFIG_HOME", config_home.path())
        .env("JSH_LOG", "error")
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute jsh")
}

#[test]
fn input_redirect_feeds_command() {
    let mut input = NamedTempFile::new().expect("create temp input");
    writeln!(input, "hello").unwrap();
    writeln!(input, "world").unwrap();

    let cmd = format!("/bin/cat < {}", input.path().display());
    let output = run_jsh(&cmd);

    assert!(output.status.success(), "command failed: {:?}", output);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\nworld\n");
}

#[test]
fn input_redirect_missing_file_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing_path = dir.path().join("jsh_missing_input_test.txt");
    let cmd = format!("cat < {}", missing_path.display());
    let output = run_jsh(&cmd);

    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to open redirect file"),
        "stderr did not report missing file: {stderr}"
    );
}

#[test]
fn output_redirect_truncates_file() {
    let mut output_file = NamedTempFile::new().expect("create temp output");
    write!(output_file, "previous contents that are longer").unwrap();
    let path = output_file.path().to_path_buf();

    let cmd = format!("printf sample > {}", path.display());
    let output = run_jsh(&cmd);
    assert!(output.status.success(), "command failed: {:?}", output);

    let written = fs::read_to_string(&path).expect("read redirected output");
    assert_eq!(written, "sample");
}

#[test]
fn redirect_with_pipe_is_rejected() {
    let output = run_jsh("echo hi | cat > /dev/null");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("syntax error"));
}
