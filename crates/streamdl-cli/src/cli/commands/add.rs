//! `streamdl add <url>` – queue a captured stream on the running server.

use anyhow::{bail, Result};
use clap::Args;
use streamdl_core::control::{ControlRequest, ControlResponse};
use streamdl_core::job::StreamDescriptor;

use crate::cli::control_socket;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Stream URL (HTTP/HTTPS), e.g. an HLS master playlist.
    pub url: String,

    /// Title of the page the stream was captured from.
    #[arg(long)]
    pub title: Option<String>,

    /// Page URL; sent as Referer and Origin.
    #[arg(long)]
    pub page_url: Option<String>,

    /// User agent of the capturing browser.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// File name to use instead of the title.
    #[arg(long)]
    pub name: Option<String>,

    /// Extra request header, repeatable.
    #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Cookie header value to send with requests.
    #[arg(long)]
    pub cookies: Option<String>,

    /// Values above zero jump ahead of normal jobs.
    #[arg(long, default_value = "0", value_name = "N")]
    pub priority: i32,
}

impl AddArgs {
    pub fn into_stream(self) -> StreamDescriptor {
        let mut stream = StreamDescriptor::new(self.url);
        stream.title = self.title;
        stream.page_url = self.page_url;
        stream.user_agent = self.user_agent;
        stream.custom_name = self.name;
        stream.cookies = self.cookies;
        stream.headers.extend(self.headers);
        stream
    }
}

pub(crate) fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {s:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub async fn run_add(args: AddArgs) -> Result<()> {
    let priority = args.priority;
    let stream = args.into_stream();
    stream.validate()?;
    let url = stream.url.clone();

    match control_socket::request(&ControlRequest::Enqueue { stream, priority }).await? {
        ControlResponse::Enqueued { id, position } => {
            println!("Added job {id} at queue position {position} for URL: {url}");
            Ok(())
        }
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected reply: {other:?}"),
    }
}
