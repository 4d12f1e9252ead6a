use std::path::{Path, PathBuf};

use futures::{stream::BoxStream, StreamExt};

use crate::{
    domain::{DownloadJob, LogEntry, PrepareError},
    fetch::{FetchError, Fetcher},
    utils::normalize_drive_url,
};

/// Events emitted by a batch run, in order. The final item is always
/// `Finished`, whether the run completed or aborted at a precondition.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Log(LogEntry),
    Finished,
}

#[derive(Clone)]
pub struct BatchRunner {
    fetcher: Fetcher,
}

impl BatchRunner {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// One full pass over the links file: validate, read, then download each
    /// URL in file order. Per-item failures never stop the loop; only
    /// precondition failures abort, before any download starts.
    pub fn run_stream(
        &self,
        links_path: PathBuf,
        output_dir: PathBuf,
    ) -> BoxStream<'static, RunEvent> {
        futures::stream::unfold(
            RunState::Prepare {
                fetcher: self.fetcher.clone(),
                links_path,
                output_dir,
            },
            |state| async move {
                match state {
                    RunState::Prepare {
                        fetcher,
                        links_path,
                        output_dir,
                    } => match prepare(&links_path, &output_dir).await {
                        Ok(urls) => Some((
                            RunEvent::Log(LogEntry::info("Started downloading process")),
                            RunState::Announce {
                                fetcher,
                                output_dir,
                                urls,
                                next: 0,
                            },
                        )),
                        Err(e) => Some((
                            RunEvent::Log(prepare_failure_entry(&e)),
                            RunState::Closing,
                        )),
                    },
                    RunState::Announce {
                        fetcher,
                        output_dir,
                        urls,
                        next,
                    } => {
                        if next >= urls.len() {
                            return Some((
                                RunEvent::Log(LogEntry::info("Finished downloading process")),
                                RunState::Closing,
                            ));
                        }

                        let raw_url = urls[next].clone();
                        let normalized_url = normalize_drive_url(&raw_url);
                        let job = DownloadJob {
                            index: next + 1,
                            total: urls.len(),
                            raw_url,
                            normalized_url,
                        };
                        if job.raw_url != job.normalized_url {
                            tracing::debug!("rewrote '{}' to '{}'", job.raw_url, job.normalized_url);
                        }
                        let message = format!(
                            "Downloading [{}/{}]: {}",
                            job.index, job.total, job.normalized_url
                        );

                        Some((
                            RunEvent::Log(LogEntry::info(message)),
                            RunState::Download {
                                fetcher,
                                output_dir,
                                urls,
                                job,
                            },
                        ))
                    }
                    RunState::Download {
                        fetcher,
                        output_dir,
                        urls,
                        job,
                    } => {
                        let result = fetcher
                            .download(&job.normalized_url, &output_dir, false, true)
                            .await;
                        let entry = outcome_entry(&job, result);

                        Some((
                            RunEvent::Log(entry),
                            RunState::Announce {
                                fetcher,
                                output_dir,
                                urls,
                                next: job.index,
                            },
                        ))
                    }
                    RunState::Closing => Some((RunEvent::Finished, RunState::Done)),
                    RunState::Done => None,
                }
            },
        )
        .boxed()
    }
}

enum RunState {
    Prepare {
        fetcher: Fetcher,
        links_path: PathBuf,
        output_dir: PathBuf,
    },
    Announce {
        fetcher: Fetcher,
        output_dir: PathBuf,
        urls: Vec<String>,
        next: usize,
    },
    Download {
        fetcher: Fetcher,
        output_dir: PathBuf,
        urls: Vec<String>,
        job: DownloadJob,
    },
    Closing,
    Done,
}

/// Check both paths and read the URL list. Any failure here aborts the run
/// with no partial processing.
async fn prepare(links_path: &Path, output_dir: &Path) -> Result<Vec<String>, PrepareError> {
    let is_file = tokio::fs::metadata(links_path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(PrepareError::MissingLinksFile(links_path.to_path_buf()));
    }

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| PrepareError::CreateOutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let text = tokio::fs::read_to_string(links_path)
        .await
        .map_err(|source| PrepareError::ReadLinksFile {
            path: links_path.to_path_buf(),
            source,
        })?;

    let urls: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(PrepareError::EmptyList);
    }

    Ok(urls)
}

fn prepare_failure_entry(error: &PrepareError) -> LogEntry {
    match error {
        PrepareError::EmptyList => LogEntry::warning(error.to_string()),
        _ => LogEntry::error(error.to_string()),
    }
}

fn outcome_entry(job: &DownloadJob, result: crate::fetch::Result<PathBuf>) -> LogEntry {
    match result {
        Ok(_) => LogEntry::info("Download completed successfully"),
        Err(FetchError::MalformedUrl(_)) => {
            LogEntry::error(format!("Invalid URL format: '{}'", job.normalized_url))
        }
        Err(FetchError::Network(e)) => LogEntry::error(format!(
            "Network error while downloading '{}': {}",
            job.normalized_url, e
        )),
        Err(e) => LogEntry::error(format!(
            "Unexpected error while downloading '{}': {}",
            job.normalized_url, e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogLevel;
    use crate::fetch::FetchConfig;

    fn runner() -> BatchRunner {
        BatchRunner::new(Fetcher::new(FetchConfig::default()))
    }

    async fn collect(runner: &BatchRunner, links: &Path, out: &Path) -> Vec<RunEvent> {
        runner
            .run_stream(links.to_path_buf(), out.to_path_buf())
            .collect()
            .await
    }

    fn log_entries(events: &[RunEvent]) -> Vec<&LogEntry> {
        events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Log(entry) => Some(entry),
                RunEvent::Finished => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_missing_links_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let events = collect(
            &runner(),
            &dir.path().join("absent.txt"),
            &dir.path().join("out"),
        )
        .await;

        let entries = log_entries(&events);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert!(entries[0].message.contains("does not exist"));
        assert!(matches!(events.last(), Some(RunEvent::Finished)));
    }

    #[tokio::test]
    async fn test_blank_links_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        std::fs::write(&links, "\n   \n\t\n").unwrap();

        let events = collect(&runner(), &links, &dir.path().join("out")).await;

        let entries = log_entries(&events);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warning);
        assert!(entries[0].message.contains("No valid URLs"));
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        std::fs::write(&links, "https://example.com/a.bin\n").unwrap();
        // A plain file where a directory is needed makes create_dir_all fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let events = collect(&runner(), &links, &blocker.join("nested")).await;

        let entries = log_entries(&events);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert!(entries[0].message.contains("output directory"));
    }

    #[tokio::test]
    async fn test_attempts_every_line_in_order() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/a.bin")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("first")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/b.bin")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("second")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        std::fs::write(
            &links,
            format!("{0}/a.bin\n\n  {0}/b.bin  \n", server.url()),
        )
        .unwrap();
        let out = dir.path().join("out");

        let events = collect(&runner(), &links, &out).await;
        let entries = log_entries(&events);

        first.assert_async().await;
        second.assert_async().await;
        assert!(out.join("a.bin").is_file());
        assert!(out.join("b.bin").is_file());

        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0], "Started downloading process");
        assert!(messages[1].starts_with("Downloading [1/2]:"));
        assert_eq!(messages[2], "Download completed successfully");
        assert!(messages[3].starts_with("Downloading [2/2]:"));
        assert_eq!(messages[4], "Download completed successfully");
        assert_eq!(messages[5], "Finished downloading process");
    }

    #[tokio::test]
    async fn test_bad_url_does_not_stop_the_batch() {
        let mut server = mockito::Server::new_async().await;
        let good = server
            .mock("GET", "/good.bin")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("ok")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        std::fs::write(&links, format!("not a url\n{}/good.bin\n", server.url())).unwrap();

        let events = collect(&runner(), &links, &dir.path().join("out")).await;
        let entries = log_entries(&events);

        good.assert_async().await;

        let errors: Vec<_> = entries
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Invalid URL format"));

        let finished = entries
            .iter()
            .filter(|e| e.message == "Finished downloading process")
            .count();
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn test_network_error_is_reported_and_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _broken = server
            .mock("GET", "/broken.bin")
            .with_status(500)
            .create_async()
            .await;
        let good = server
            .mock("GET", "/good.bin")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("ok")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let links = dir.path().join("links.txt");
        std::fs::write(
            &links,
            format!("{0}/broken.bin\n{0}/good.bin\n", server.url()),
        )
        .unwrap();

        let events = collect(&runner(), &links, &dir.path().join("out")).await;
        let entries = log_entries(&events);

        good.assert_async().await;

        let errors: Vec<_> = entries
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Network error while downloading"));
        assert_eq!(
            entries
                .iter()
                .filter(|e| e.message == "Download completed successfully")
                .count(),
            1
        );
    }
}
