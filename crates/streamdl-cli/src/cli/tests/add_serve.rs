//! Tests for the add and serve subcommands.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_serve() {
    match parse(&["streamdl", "serve"]) {
        CliCommand::Serve => {}
        _ => panic!("expected Serve"),
    }
}

#[test]
fn cli_parse_add_minimal() {
    match parse(&["streamdl", "add", "https://cdn.example.com/master.m3u8"]) {
        CliCommand::Add(args) => {
            assert_eq!(args.url, "https://cdn.example.com/master.m3u8");
            assert_eq!(args.priority, 0);
            assert!(args.headers.is_empty());
            assert!(args.title.is_none());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_full() {
    match parse(&[
        "streamdl",
        "add",
        "https://cdn.example.com/master.m3u8",
        "--title",
        "Episode 1",
        "--page-url",
        "https://site.example/watch/1",
        "--user-agent",
        "Mozilla/5.0 (test)",
        "--name",
        "ep1",
        "--header",
        "X-Token: abc",
        "--header",
        "Accept-Language:en",
        "--priority",
        "2",
    ]) {
        CliCommand::Add(args) => {
            assert_eq!(args.priority, 2);
            assert_eq!(
                args.headers,
                vec![
                    ("X-Token".to_string(), "abc".to_string()),
                    ("Accept-Language".to_string(), "en".to_string()),
                ]
            );
            let stream = args.into_stream();
            assert_eq!(stream.title.as_deref(), Some("Episode 1"));
            assert_eq!(stream.page_url.as_deref(), Some("https://site.example/watch/1"));
            assert_eq!(stream.user_agent.as_deref(), Some("Mozilla/5.0 (test)"));
            assert_eq!(stream.display_name(), "ep1");
            assert_eq!(stream.headers.get("X-Token").map(String::as_str), Some("abc"));
            assert!(stream.validate().is_ok());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_rejects_malformed_header() {
    use clap::Parser;
    let res = crate::cli::Cli::try_parse_from([
        "streamdl",
        "add",
        "https://cdn.example.com/master.m3u8",
        "--header",
        "no-colon",
    ]);
    assert!(res.is_err());
}
