use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn muni() -> Command {
    Command::new(env!("CARGO_BIN_EXE_muni"))
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn compile_and_run_prints_the_answer() {
    let dir = tempdir().unwrap();
    let src = write(dir.path(), "answer.mun", "void main() { write_int(42); }\n");
    let wasm = dir.path().join("answer.wasm");

    let status = muni()
        .args(["compile"])
        .arg(&src)
        .arg(&wasm)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(wasm.exists());

    let output = muni().arg("run").arg(&wasm).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "42\n");
}

#[test]
fn run_prints_strings_through_write_chr() {
    let dir = tempdir().unwrap();
    let src = write(dir.path(), "hi.mun", "void main() { print(\"hi\"); }\n");
    let wasm = dir.path().join("hi.wasm");

    assert!(muni()
        .arg("compile")
        .arg(&src)
        .arg(&wasm)
        .status()
        .unwrap()
        .success());
    let output = muni().arg("run").arg(&wasm).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hi\n");
}

#[test]
fn wat_output_is_text() {
    let dir = tempdir().unwrap();
    let src = write(dir.path(), "t.mun", "void main() { }\n");
    let wat = dir.path().join("t.wat");

    assert!(muni()
        .arg("compile")
        .arg(&src)
        .arg(&wat)
        .status()
        .unwrap()
        .success());
    let text = fs::read_to_string(&wat).unwrap();
    assert!(text.starts_with("(module"));
}

#[test]
fn unknown_output_suffix_fails() {
    let dir = tempdir().unwrap();
    let src = write(dir.path(), "t.mun", "void main() { }\n");
    let out = dir.path().join("t.obj");

    let output = muni().arg("compile").arg(&src).arg(&out).output().unwrap();
    assert!(!output.status.success());
    assert!(!out.exists());
}

#[test]
fn alias_cycle_fails_without_producing_output() {
    let dir = tempdir().unwrap();
    let src = write(
        dir.path(),
        "cycle.mun",
        "alias A = B;\nalias B = A;\nvoid main() { A a = null; }\n",
    );
    let out = dir.path().join("cycle.wasm");

    let output = muni().arg("compile").arg(&src).arg(&out).output().unwrap();
    assert!(!output.status.success());
    assert!(!out.exists(), "no output file on failed compilation");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("AliasCycle"), "stderr: {stderr}");
}

#[test]
fn type_errors_render_with_location() {
    let dir = tempdir().unwrap();
    let src = write(dir.path(), "bad.mun", "void main() { int x = true; }\n");
    let out = dir.path().join("bad.wasm");

    let output = muni().arg("compile").arg(&src).arg(&out).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TypeError"), "stderr: {stderr}");
    assert!(stderr.contains("bad.mun"), "stderr: {stderr}");
}

#[test]
fn missing_input_file_fails_cleanly() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("x.wasm");
    let output = muni()
        .arg("compile")
        .arg(dir.path().join("nope.mun"))
        .arg(&out)
        .output()
        .unwrap();
    assert!(!output.status.success());
}
