//! chat-dispatch CLI: 从命令行推送、群发消息及绑定富菜单
//!
//! Usage:
//!   chat-dispatch-cli push <user|group|room id> <text>...     Push text messages
//!   chat-dispatch-cli multicast <id,id,...> <text>...         Multicast text messages
//!   chat-dispatch-cli link-richmenu <user id> <rich menu id>  Link a rich menu

use chat_dispatch::builder::Segment;
use chat_dispatch::dispatcher::{DispatchConfig, Dispatcher, DispatcherBuilder, SegmentRenderer};
use chat_dispatch::line::{ChatAction, ChatKind, ChatThread, MulticastTarget};
use chat_dispatch::{DispatchResult, Error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "push" => cmd_push(&args[2..]).await,
        "multicast" => cmd_multicast(&args[2..]).await,
        "link-richmenu" => cmd_link_richmenu(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(err) = outcome {
        report(&err);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"chat-dispatch-cli: LINE 消息分发命令行工具

USAGE:
    chat-dispatch-cli <COMMAND> [OPTIONS] [ARGS]

COMMANDS:
    push <id> <text>...                Push text messages to a user, group (C...) or room (R...)
    multicast <id,id,...> <text>...    Send text messages to up to 500 users
    link-richmenu <user> <richmenu>    Link a rich menu to a user
    version                            Show version information
    help                               Show this help message

OPTIONS:
    --config <path>                    Load configuration from a YAML file

ENVIRONMENT:
    LINE_CHANNEL_ID                    Channel id (also selects the keyring entry)
    LINE_CHANNEL_ACCESS_TOKEN          Channel access token
    CHAT_DISPATCH_API_BASE             API base URL (default https://api.line.me)
    CHAT_DISPATCH_MAX_CONNECTIONS      Concurrent calls (default 100)
    RUST_LOG                           Log filter (default info)"#
    );
}

fn cmd_version() {
    println!(
        "chat-dispatch-cli {} (chat-dispatch {})",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_VERSION"),
    );
}

/// Split `--config <path>` out of the positional arguments.
fn parse_args(args: &[String]) -> (Option<String>, Vec<String>) {
    let mut config = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            config = iter.next().cloned();
        } else {
            positional.push(arg.clone());
        }
    }
    (config, positional)
}

fn connect(config_path: Option<&str>) -> chat_dispatch::Result<(Dispatcher<SegmentRenderer>, String)> {
    let config = match config_path {
        Some(path) => DispatchConfig::from_yaml_file(path)?,
        None => DispatchConfig::from_env()?,
    };
    let channel_id = config.channel_id.clone().ok_or_else(|| {
        Error::configuration_with_context(
            "channel id is required",
            chat_dispatch::ErrorContext::new()
                .with_field_path("channel_id")
                .with_details("set LINE_CHANNEL_ID or channel_id in the config file"),
        )
    })?;
    let dispatcher = DispatcherBuilder::new().with_config(config).build(SegmentRenderer)?;
    Ok((dispatcher, channel_id))
}

fn usage_error(message: &str) -> Error {
    Error::configuration_with_context(message, chat_dispatch::ErrorContext::new().with_source("cli"))
}

fn thread_for(channel_id: &str, id: &str) -> ChatThread {
    let kind = match id.chars().next() {
        Some('C') => ChatKind::Group,
        Some('R') => ChatKind::Room,
        _ => ChatKind::User,
    };
    ChatThread::new(channel_id, kind, id)
}

fn text_segments(texts: &[String]) -> Vec<Segment> {
    texts.iter().map(|t| Segment::text("cli", t.as_str())).collect()
}

async fn cmd_push(args: &[String]) -> chat_dispatch::Result<()> {
    let (config, positional) = parse_args(args);
    if positional.len() < 2 {
        return Err(usage_error("usage: push <id> <text>..."));
    }
    let (dispatcher, channel_id) = connect(config.as_deref())?;
    let thread = thread_for(&channel_id, &positional[0]);

    let result = dispatcher
        .render_chat(&thread, text_segments(&positional[1..]), None)
        .await?;
    print_result(result);
    Ok(())
}

async fn cmd_multicast(args: &[String]) -> chat_dispatch::Result<()> {
    let (config, positional) = parse_args(args);
    if positional.len() < 2 {
        return Err(usage_error("usage: multicast <id,id,...> <text>..."));
    }
    let (dispatcher, channel_id) = connect(config.as_deref())?;
    let ids = positional[0].split(',').map(str::trim).filter(|s| !s.is_empty());
    let target = MulticastTarget::new(channel_id, ids);

    let result = dispatcher
        .render_multicast(&target, text_segments(&positional[1..]))
        .await?;
    print_result(result);
    Ok(())
}

async fn cmd_link_richmenu(args: &[String]) -> chat_dispatch::Result<()> {
    let (config, positional) = parse_args(args);
    if positional.len() != 2 {
        return Err(usage_error("usage: link-richmenu <user id> <rich menu id>"));
    }
    let (dispatcher, channel_id) = connect(config.as_deref())?;
    let thread = ChatThread::user(channel_id, positional[0].as_str());
    let segments = vec![Segment::action(
        "cli",
        ChatAction::link_rich_menu(positional[1].as_str()),
    )];

    let result = dispatcher.render_chat(&thread, segments, None).await?;
    print_result(result);
    Ok(())
}

fn print_result(result: Option<DispatchResult>) {
    match result {
        Some(result) => println!("{} call(s) succeeded", result.len()),
        None => println!("Nothing to send"),
    }
}

fn report(err: &Error) {
    eprintln!("Error: {err}");
    for (i, job_err) in err.job_errors().iter().enumerate() {
        eprintln!("  [{i}] {job_err}");
    }
}
