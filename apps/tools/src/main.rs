use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    settings::load_settings, DispatchContext, HttpTransport, Method, ResponseDispatcher,
    ResponseListener, ResponseRequest,
};
use shared::protocol::{Envelope, ResponseItem};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an envelope file and list its items.
    Validate { file: PathBuf },
    /// Dispatch a live response and print every notification.
    Send {
        url: String,
        #[arg(long)]
        post: bool,
        /// Request parameter as key=value; repeatable.
        #[arg(short = 'd', long = "data", value_parser = parse_pair)]
        data: Vec<(String, String)>,
    },
    /// Upload an envelope file to the fixture server under `key`.
    Store {
        #[arg(long)]
        server: String,
        key: String,
        file: PathBuf,
    },
}

struct PrintListener;

impl ResponseListener for PrintListener {
    fn start_processing(&self, _ctx: &DispatchContext<'_>, items: &[ResponseItem]) {
        println!("start_processing items={}", items.len());
    }

    fn process_item(&self, _ctx: &DispatchContext<'_>, item: &ResponseItem) {
        println!("process_item {}", describe(item));
    }

    fn finish_processing(&self, _ctx: &DispatchContext<'_>, items: &[ResponseItem]) {
        println!("finish_processing items={}", items.len());
    }

    fn failure(&self, _ctx: &DispatchContext<'_>) {
        println!("failure");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { file } => {
            let envelope = read_envelope(&file)?;
            for (index, item) in envelope.items().iter().enumerate() {
                println!("{index}: {}", describe(item));
            }
            println!("valid envelope with {} item(s)", envelope.len());
        }
        Command::Send { url, post, data } => {
            let settings = load_settings()?;
            let transport = HttpTransport::from_settings(&settings.transport)?;
            let dispatcher = ResponseDispatcher::headless(Arc::new(transport));
            dispatcher.add_listener(Arc::new(PrintListener));

            let method = if post { Method::Post } else { Method::Get };
            let request = ResponseRequest::get(url)
                .with_method(method)
                .with_data(data);
            let outcome = dispatcher.send(request).await?;
            println!("outcome: {outcome:?}");
        }
        Command::Store { server, key, file } => {
            let envelope = read_envelope(&file)?;
            let url = format!("{}/sessions/{key}", server.trim_end_matches('/'));
            let response = reqwest::Client::new()
                .put(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(envelope.to_json()?)
                .send()
                .await
                .with_context(|| format!("failed to reach {url}"))?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                bail!("server rejected fixture ({status}): {body}");
            }
            println!("stored {} item(s) under '{key}'", envelope.len());
        }
    }

    Ok(())
}

fn read_envelope(file: &Path) -> Result<Envelope> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    Envelope::parse(&raw).with_context(|| format!("invalid envelope in {}", file.display()))
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn describe(item: &ResponseItem) -> String {
    match item {
        ResponseItem::Alert { message } => format!("alert message={message:?}"),
        ResponseItem::Callback { key, parameters } => {
            format!("callback key={key} parameters={}", parameters.len())
        }
        ResponseItem::ElementReplace { element_id, html } => {
            format!("element_replace element_id={element_id} bytes={}", html.len())
        }
        ResponseItem::ElementUpdate { element_id, html } => {
            format!("element_update element_id={element_id} bytes={}", html.len())
        }
        ResponseItem::FunctionCall { function, .. } => format!("function_call fn={function}"),
        ResponseItem::Redirect { url } => format!("redirect url={url}"),
        ResponseItem::Reload => "reload".to_string(),
        ResponseItem::Other { item_type, fields } => {
            let mut names: Vec<_> = fields.keys().map(String::as_str).collect();
            names.sort_unstable();
            format!("{item_type} fields=[{}]", names.join(","))
        }
    }
}
