use std::io::Write;

use assert_cmd::Command;

fn fixture_csv() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"a,b\n1,x\n2,y\n").unwrap();
    file
}

fn database_url() -> String {
    "https://www.notion.so/ws/Tasks-0123456789abcdef0123456789abcdef?v=1".to_string()
}

#[test]
fn version_is_printed() {
    Command::cargo_bin("notionctl")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn missing_arguments_exit_2() {
    Command::cargo_bin("notionctl")
        .unwrap()
        .assert()
        .failure()
        .code(2);
}

#[test]
fn invalid_token_prefix_exits_2_before_any_request() {
    let file = fixture_csv();
    Command::cargo_bin("notionctl")
        .unwrap()
        .arg(file.path())
        .args(["--token", "bogus-token", "--url", &database_url()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("invalid integration token"));
}

#[test]
fn page_url_is_rejected() {
    let file = fixture_csv();
    Command::cargo_bin("notionctl")
        .unwrap()
        .arg(file.path())
        .args([
            "--token",
            "secret_test",
            // No view marker: a page URL, not a database view.
            "--url",
            "https://www.notion.so/ws/Tasks-0123456789abcdef0123456789abcdef",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("invalid database URL"));
}

#[test]
fn foreign_domain_is_rejected() {
    let file = fixture_csv();
    Command::cargo_bin("notionctl")
        .unwrap()
        .arg(file.path())
        .args([
            "--token",
            "secret_test",
            "--url",
            "https://example.com/0123456789abcdef0123456789abcdef?v=1",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("invalid database URL"));
}

#[test]
fn unknown_column_type_exits_2() {
    let file = fixture_csv();
    Command::cargo_bin("notionctl")
        .unwrap()
        .arg(file.path())
        .args([
            "--token",
            "secret_test",
            "--url",
            &database_url(),
            "--column-types",
            "number,bogus",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("unknown column type"));
}

#[test]
fn unsupported_input_extension_exits_2() {
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.write_all(b"not a spreadsheet").unwrap();

    Command::cargo_bin("notionctl")
        .unwrap()
        .arg(file.path())
        .args(["--token", "secret_test", "--url", &database_url()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("unsupported input file extension"));
}
