use std::time::Duration;

use httptest::{Expectation, Server, matchers::*, responders::*};
use serde_json::json;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::art::ArtStyle;
use crate::config::{AppConfig, SessionConfig};
use crate::llm::types::Role;
use crate::session::{Session, choose_session_config};

fn app_for(server: &Server) -> AppConfig {
    AppConfig {
        base_url: server.url_str("").trim_end_matches('/').to_string(),
        models: vec!["gemma3:1b".into(), "qwen3:8b".into()],
        ..AppConfig::default()
    }
}

fn session_config(app: &AppConfig, model: &str) -> SessionConfig {
    SessionConfig {
        model: model.into(),
        offline: true,
        art: ArtStyle::Shark,
        base_url: app.base_url.clone(),
    }
}

fn session(server: &Server, model: &str) -> Session {
    let app = app_for(server);
    let cfg = session_config(&app, model);
    Session::with_system_context(app, cfg, "ctx".into()).unwrap()
}

fn reply(text: &str) -> String {
    format!(
        "{}\n{}\n",
        json!({"message": {"role": "assistant", "content": text}, "done": false}),
        json!({"message": {"role": "assistant", "content": ""}, "done": true}),
    )
}

async fn drive(session: &mut Session, input: &str) -> String {
    let (_tx, mut rx) = mpsc::unbounded_channel();
    let mut input = input.as_bytes();
    let mut out = Vec::new();
    session.run(&mut input, &mut out, &mut rx).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn help_and_exit_never_touch_the_backend() {
    let server = Server::run();
    let mut s = session(&server, "gemma3:1b");

    let out = drive(&mut s, "HELP\n\nbye\n").await;

    assert!(out.contains("Available commands"));
    assert!(out.contains("Goodbye"));
    assert!(s.history().is_empty());
}

#[tokio::test]
async fn prompt_streams_reply_after_emoji() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/tags"))
            .respond_with(json_encoded(json!({"models": []}))),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/api/chat"))
            .respond_with(status_code(200).body(reply("Hi there!"))),
    );
    let mut s = session(&server, "gemma3:1b");

    let out = drive(&mut s, "hello\nexit\n").await;

    assert!(out.contains("🦈: Hi there!"));
    assert_eq!(s.history().len(), 1);
    assert_eq!(s.history().messages()[0].role, Role::User);
}

#[tokio::test]
async fn backend_down_prints_one_error_and_keeps_looping() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/tags"))
            .times(2)
            .respond_with(status_code(503)),
    );
    let mut s = session(&server, "gemma3:1b");

    let out = drive(&mut s, "one\ntwo\nquit\n").await;

    assert_eq!(str::matches(&out, "not running").count(), 2);
    assert!(out.contains("Goodbye"));
    assert_eq!(s.history().len(), 2);
}

#[tokio::test]
async fn chmodel_rebinds_and_keeps_history() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/tags"))
            .times(2)
            .respond_with(json_encoded(json!({"models": []}))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/chat"),
            request::body(json_decoded(|v: &serde_json::Value| v["model"] == "gemma3:1b")),
        ])
        .respond_with(status_code(200).body(reply("first"))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/chat"),
            request::body(json_decoded(|v: &serde_json::Value| {
                let msgs = v["messages"].as_array().cloned().unwrap_or_default();
                v["model"] == "qwen3:8b"
                    && msgs.iter().any(|m| m["content"] == "hello")
                    && msgs.first().map(|m| m["content"] == "ctx").unwrap_or(false)
            })),
        ])
        .respond_with(status_code(200).body(reply("second"))),
    );
    let mut s = session(&server, "gemma3:1b");

    let out = drive(&mut s, "hello\nchmodel\nzzz\n2\nagain\nexit\n").await;

    assert!(out.contains("Model not available"));
    assert_eq!(s.dispatcher().model(), "qwen3:8b");
    assert_eq!(s.config().model, "qwen3:8b");
    assert!(s.config().offline);
    let contents: Vec<&str> = s
        .history()
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["hello", "again"]);
}

#[tokio::test]
async fn clear_redraws_banner_and_sysinfo_prints_host_facts() {
    let server = Server::run();
    let mut s = session(&server, "gemma3:1b");

    let out = drive(&mut s, "clear\nsysinfo\nexit\n").await;

    assert_eq!(str::matches(&out, "'help': commands info").count(), 2);
    assert!(out.contains("System information:"));
    assert!(out.contains("cpu_cores:"));
}

#[tokio::test]
async fn end_of_input_says_goodbye() {
    let server = Server::run();
    let mut s = session(&server, "gemma3:1b");

    let out = drive(&mut s, "").await;
    assert!(out.contains("Goodbye"));
}

#[tokio::test]
async fn interrupt_at_prompt_ends_session() {
    let server = Server::run();
    let mut s = session(&server, "gemma3:1b");
    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send(()).unwrap();
    let mut input: &[u8] = b"hello\n";
    let mut out = Vec::new();

    s.run(&mut input, &mut out, &mut rx).await.unwrap();

    assert!(String::from_utf8_lossy(&out).contains("Goodbye"));
    assert!(s.history().is_empty());
}

#[tokio::test]
async fn interrupt_in_model_menu_returns_to_prompt() {
    let server = Server::run();
    let mut s = session(&server, "gemma3:1b");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (mut keys, stdin) = tokio::io::duplex(64);
    let mut input = BufReader::new(stdin);
    let mut out = Vec::new();

    let typing = async move {
        keys.write_all(b"chmodel\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        keys.write_all(b"clear\nexit\n").await.unwrap();
    };
    let (res, ()) = tokio::join!(s.run(&mut input, &mut out, &mut rx), typing);
    res.unwrap();

    let out = String::from_utf8_lossy(&out);
    assert!(!out.contains("Model not available"));
    assert_eq!(str::matches(&out, "'help': commands info").count(), 2);
    assert_eq!(str::matches(&out, "Goodbye").count(), 1);
    assert_eq!(s.config().model, "gemma3:1b");
}

#[tokio::test]
async fn menus_fill_in_what_config_leaves_open() {
    let server = Server::run();
    let app = app_for(&server);
    let mut input: &[u8] = b"2\ncat\nn\n";
    let mut out = Vec::new();

    let cfg = choose_session_config(&app, &mut input, &mut out)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cfg.model, "qwen3:8b");
    assert_eq!(cfg.art, ArtStyle::Cat);
    assert!(!cfg.offline);

    let preset = AppConfig {
        model: Some("mistral:7b".into()),
        offline: Some(true),
        ..app_for(&server)
    };
    let mut input: &[u8] = b"1\n";
    let cfg = choose_session_config(&preset, &mut input, &mut out)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cfg.model, "mistral:7b");
    assert_eq!(cfg.art, ArtStyle::Shark);
    assert!(cfg.offline);

    let mut empty: &[u8] = b"";
    assert!(
        choose_session_config(&app, &mut empty, &mut out)
            .await
            .unwrap()
            .is_none()
    );
}
