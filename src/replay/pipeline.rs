// ABOUTME: Producer/consumer replay pipeline: walks a directory for mask-matching files, fans them out to N workers
// ABOUTME: SIGINT cancels production and closes the jobs channel; workers drain whatever is already queued then exit

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;
use walkdir::WalkDir;

use super::player::Replayer;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub mask: String,
    pub workers: usize,
}

/// Runs the replay pipeline to completion (or until SIGINT). The quit
/// channel and `context.Context` pair the original implementation used are
/// replaced here by a single `CancellationToken` shared between the SIGINT
/// listener and the producer.
pub async fn run(config: PipelineConfig, replayer: Arc<Replayer>) {
    let cancel = CancellationToken::new();
    let sigint_cancel = cancel.clone();
    let sigint_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("SIGINT received, stopping replay");
            sigint_cancel.cancel();
        }
    });

    let files = discover_files(&config.root, &config.mask);
    let total = files.len();
    info!(path = %config.root.display(), mask = %config.mask, total, "starting replay");

    let (tx, rx) = mpsc::channel::<PathBuf>(4);
    let rx = Arc::new(Mutex::new(rx));

    let producer_cancel = cancel.clone();
    let producer = tokio::spawn(async move {
        let mut processed = 0usize;
        for file in files {
            tokio::select! {
                res = tx.send(file) => {
                    if res.is_err() {
                        break;
                    }
                    processed += 1;
                }
                _ = producer_cancel.cancelled() => break,
            }
        }
        info!(processed, total, "producer finished");
    });

    let mut workers = Vec::with_capacity(config.workers.max(1));
    for _ in 0..config.workers.max(1) {
        let rx = rx.clone();
        let replayer = replayer.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let job = rx.lock().await.recv().await;
                match job {
                    Some(path) => replayer.play(&path).await,
                    None => break,
                }
            }
        }));
    }

    let _ = producer.await;
    for worker in workers {
        let _ = worker.await;
    }
    sigint_task.abort();
}

fn discover_files(root: &Path, mask: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str().map(|name| glob_match(mask, name)).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect()
}

/// Minimal shell-glob matcher supporting `*` and `?` wildcards, sufficient
/// for the `player.mask` config key (e.g. `*.log`, `trace-???.bin`).
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_from(&pattern, &name)
}

fn match_from(pattern: &[char], name: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => match_from(&pattern[1..], name) || (!name.is_empty() && match_from(pattern, &name[1..])),
        Some('?') => !name.is_empty() && match_from(&pattern[1..], &name[1..]),
        Some(c) => name.first() == Some(c) && match_from(&pattern[1..], &name[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        assert!(glob_match("*.log", "trace.log"));
        assert!(!glob_match("*.log", "trace.bin"));
    }

    #[test]
    fn bare_star_matches_everything() {
        assert!(glob_match("*", "anything"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(glob_match("trace-???.bin", "trace-001.bin"));
        assert!(!glob_match("trace-???.bin", "trace-01.bin"));
    }
}
