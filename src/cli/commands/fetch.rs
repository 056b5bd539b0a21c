//! Fetch command - route one request through the live cache

use super::build_worker;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::network::{Method, Request};
use crate::worker::{FetchDisposition, ResponseSource};
use console::style;
use std::io::Write;
use tokio::fs;

/// Execute the fetch command
///
/// The response body goes to stdout (or `--output`); the disposition is
/// reported on stderr so the body can be piped.
pub async fn execute(args: FetchArgs, config: &Config) -> ShellCacheResult<()> {
    let method: Method = args.method.parse()?;
    let worker = build_worker(config).await?;

    let disposition = worker.fetch(&Request::new(method, &args.url)).await?;
    let (response, source) = match disposition {
        FetchDisposition::Bypass => {
            eprintln!(
                "{} {} {} is not served from the cache",
                style("bypass").yellow().bold(),
                method,
                args.url
            );
            return Ok(());
        }
        FetchDisposition::Respond { response, source } => (response, source),
    };

    let source_label = match source {
        ResponseSource::Cache => style("cache").green().bold(),
        ResponseSource::Network => style("network").cyan().bold(),
    };
    eprintln!(
        "{} {} ({} bytes)",
        source_label,
        response.status,
        response.body.len()
    );

    match args.output {
        Some(path) => fs::write(&path, &response.body)
            .await
            .map_err(|e| ShellCacheError::io(format!("writing {}", path.display()), e)),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|()| stdout.flush())
                .map_err(|e| ShellCacheError::io("writing response body", e))
        }
    }
}
