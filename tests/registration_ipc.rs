use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendd");
    let mut child = Command::new(exe)
        .env_remove("ATTENDD_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    token: Option<&str>,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params, "token": token });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn student(username: &str, roll_no: &str, email: &str, password: &str) -> serde_json::Value {
    json!({
        "username": username,
        "password": password,
        "passwordConfirm": password,
        "firstName": "Test",
        "lastName": "Student",
        "email": email,
        "rollNo": roll_no,
        "course": "CS",
    })
}

#[test]
fn registration_rejects_duplicates_and_weak_passwords() {
    let workspace = temp_dir("attendd-registration");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        None,
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = request(
        &mut stdin,
        &mut reader,
        "2",
        "accounts.registerStudent",
        None,
        student("alice", "R1", "alice@school.test", "Tr1cky-Walrus"),
    );
    assert_eq!(first["ok"], true, "{}", first);
    assert_eq!(first["result"]["role"], "student");

    let same_name = request(
        &mut stdin,
        &mut reader,
        "3",
        "accounts.registerStudent",
        None,
        student("alice", "R2", "other@school.test", "Tr1cky-Walrus"),
    );
    assert_eq!(same_name["error"]["code"], "duplicate_username");

    let same_roll = request(
        &mut stdin,
        &mut reader,
        "4",
        "accounts.registerStudent",
        None,
        student("bobby", "R1", "bobby@school.test", "Tr1cky-Walrus"),
    );
    assert_eq!(same_roll["error"]["code"], "duplicate_field");

    let weak = request(
        &mut stdin,
        &mut reader,
        "5",
        "accounts.registerStudent",
        None,
        student("carol", "R3", "carol@school.test", "12345678"),
    );
    assert_eq!(weak["error"]["code"], "weak_password");
    let reasons = weak["error"]["details"]["reasons"].as_array().expect("reasons");
    assert!(reasons
        .iter()
        .any(|r| r.as_str() == Some("This password is entirely numeric.")));

    let mut mismatch = student("dave", "R4", "dave@school.test", "Tr1cky-Walrus");
    mismatch["passwordConfirm"] = json!("Tr1cky-Walrus!");
    let mismatch = request(
        &mut stdin,
        &mut reader,
        "6",
        "accounts.registerStudent",
        None,
        mismatch,
    );
    assert_eq!(mismatch["error"]["code"], "password_mismatch");

    // The rejected registration created no identity for bobby.
    let bobby_login = request(
        &mut stdin,
        &mut reader,
        "7",
        "session.login",
        None,
        json!({ "username": "bobby", "password": "Tr1cky-Walrus" }),
    );
    assert_eq!(bobby_login["error"]["code"], "invalid_credentials");

    let wrong_password = request(
        &mut stdin,
        &mut reader,
        "8",
        "session.login",
        None,
        json!({ "username": "alice", "password": "not-it" }),
    );
    assert_eq!(wrong_password["error"]["code"], "invalid_credentials");

    let alice = request(
        &mut stdin,
        &mut reader,
        "9",
        "session.login",
        None,
        json!({ "username": "alice", "password": "Tr1cky-Walrus" }),
    );
    assert_eq!(alice["result"]["dashboard"], "student");
    let token = alice["result"]["token"].as_str().expect("token").to_string();

    let forbidden = request(
        &mut stdin,
        &mut reader,
        "10",
        "students.list",
        Some(&token),
        json!({}),
    );
    assert_eq!(forbidden["error"]["code"], "forbidden");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
