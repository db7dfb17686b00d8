use std::io::{Cursor, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::{json, Value};
use tempdir::TempDir;
use tiff::encoder::{colortype, TiffEncoder};

fn write_gray8(path: &Path, width: u32, height: u32, pixels: &[u8]) {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut tiff = TiffEncoder::new(&mut cursor).unwrap();
        tiff.write_image::<colortype::Gray8>(width, height, pixels).unwrap();
    }
    std::fs::write(path, cursor.into_inner()).unwrap();
}

fn run(args: &[&str], stdin: &str) -> Output {
    run_with_env(args, stdin, &[])
}

fn run_with_env(args: &[&str], stdin: &str, env: &[(&str, &str)]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_raster-to-json"))
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // the binary may exit before reading stdin, so a broken pipe is fine here
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());

    child.wait_with_output().unwrap()
}

#[test]
fn dumps_raster_with_extra_metadata() {
    let dir = TempDir::new("raster-to-json-cli").unwrap();
    let path = dir.path().join("small.tif");
    write_gray8(&path, 3, 2, &[1, 2, 3, 4, 5, 255]);

    let out = run(&[path.to_str().unwrap()], r#"{"product": "dbz"}"#);
    assert!(out.status.success());

    let doc: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json!([[1, 4], [2, 5], [3, 255]]), doc["data"]);
    assert_eq!(json!("dbz"), doc["metadata"]["product"]);
    assert_eq!(json!(""), doc["metadata"]["projectionRef"]);
    assert_eq!(json!([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]), doc["metadata"]["affineTransform"]);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Read a JSON object with 1 metadata keys from stdin."));
}

#[test]
fn ignores_second_argument() {
    let dir = TempDir::new("raster-to-json-cli").unwrap();
    let path = dir.path().join("one.tif");
    write_gray8(&path, 1, 1, &[9]);

    let out = run(&[path.to_str().unwrap(), "whatever"], "{}");
    assert!(out.status.success());
}

#[test]
fn fails_without_arguments() {
    let out = run(&[], "{}");
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn fails_with_too_many_arguments() {
    let out = run(&["a.tif", "b", "c"], "{}");
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn fails_on_malformed_metadata() {
    let out = run(&["./missing.tif"], "{\"unterminated\": ");
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("metadata"));
    assert!(!stderr.contains("missing.tif"));
}

#[test]
fn fails_on_missing_raster() {
    let out = run(&["./missing.tif"], "{}");
    assert_eq!(Some(1), out.status.code());
    assert!(out.stdout.is_empty());
}

#[test]
fn raster_errors_show_with_logging_off() {
    let out = run_with_env(&["./missing.tif"], "{}", &[("RUST_LOG", "off")]);
    assert_eq!(Some(1), out.status.code());

    let stderr = String::from_utf8_lossy(&out.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    assert_eq!(2, lines.len());
    assert!(!lines[0].starts_with("# "));
    assert!(lines[1].starts_with("❌ Error: Couldn't open raster ./missing.tif"));
    assert!(lines[1].ends_with(lines[0]));
}
