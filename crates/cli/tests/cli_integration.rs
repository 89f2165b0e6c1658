//! Integration tests for the `pactum` CLI subcommands.

use assert_cmd::Command;
use predicates::prelude::*;

fn pactum() -> Command {
    Command::cargo_bin("pactum").expect("binary built")
}

#[test]
fn amount_formats_mixed_value() {
    pactum()
        .args(["amount", "1234.56"])
        .assert()
        .success()
        .stdout(predicate::str::contains("壹仟贰佰叁拾肆元伍角陆分"));
}

#[test]
fn amount_formats_round_values() {
    for (input, expected) in [
        ("100.00", "壹佰元整"),
        ("10000", "壹万元整"),
        ("100000000", "壹亿元整"),
        ("0", "零元整"),
    ] {
        pactum()
            .args(["amount", input])
            .assert()
            .success()
            .stdout(predicate::str::contains(expected));
    }
}

#[test]
fn amount_rejects_negative_value() {
    pactum()
        .args(["amount", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn amount_rejects_garbage() {
    pactum()
        .args(["amount", "twelve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a decimal amount"));
}

#[test]
fn keygen_writes_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("token.key");

    pactum()
        .args(["keygen", "--output"])
        .arg(&key_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote token signing key"));

    let contents = std::fs::read_to_string(&key_path).unwrap();
    // base64 of a 32-byte seed
    assert_eq!(contents.trim().len(), 44);
}
