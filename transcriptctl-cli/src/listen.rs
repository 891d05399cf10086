//! `transcriptctl listen`: a line-oriented stand-in for the extension's
//! popup. Control messages arrive on stdin, status updates and results
//! leave on stdout, one JSON object per line.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use transcriptctl_core::{ControlMessage, DiskSaver, ExportConfig, Exporter, Host, SnapshotPage};

use crate::ui::JsonOverlay;

#[derive(Parser, Debug)]
pub struct ListenArgs {
    /// Page snapshot (JSON)
    #[arg(long = "in", value_name = "PATH")]
    input: PathBuf,

    /// Output directory (default: config output_dir or ~/.transcriptctl/exports)
    #[arg(long = "out", value_name = "DIR")]
    output: Option<PathBuf>,
}

/// Replies written to stdout besides status updates.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Reply {
    #[serde(rename_all = "camelCase")]
    ExportResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        download_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    InvalidMessage {
        error: String,
    },
}

pub async fn run_listen(args: ListenArgs, config: ExportConfig) -> Result<()> {
    let output_dir = args.output.unwrap_or_else(|| config.output_dir());
    let page = SnapshotPage::from_path(&args.input)?;
    let exporter = Exporter::new(config)?;
    let saver = DiskSaver::new(output_dir);
    let overlay = JsonOverlay;
    let host = Host {
        page: &page,
        storage: &page,
        clipboard: &page,
        overlay: &overlay,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message: ControlMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "ignoring control message");
                emit(&Reply::InvalidMessage {
                    error: err.to_string(),
                })?;
                continue;
            }
        };

        debug!(?message, "control message");
        let reply = match exporter.handle(host, &saver, message).await {
            Ok(report) => Reply::ExportResult {
                success: true,
                filename: Some(report.filename),
                download_id: report.download_id,
                error: None,
            },
            Err(err) => Reply::ExportResult {
                success: false,
                filename: None,
                download_id: None,
                error: Some(err.to_string()),
            },
        };
        emit(&reply)?;
    }
    Ok(())
}

fn emit(reply: &Reply) -> Result<()> {
    let line = serde_json::to_string(reply)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", line)?;
    out.flush()?;
    Ok(())
}
