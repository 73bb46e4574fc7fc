use async_trait::async_trait;
use oxide_music::acquisition::{
    AcquisitionError, AcquisitionPipeline, DownloadError, MediaDownloader, Strategy,
    YtDlpDownloader, DELIVERY_STRATEGIES, PLAYBACK_STRATEGIES,
};
use oxide_music::config::AcquisitionSettings;
use oxide_music::media::Candidate;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

enum Step {
    Found(&'static str),
    Empty,
    Fails(&'static str),
}

struct Call {
    strategy: &'static str,
    credentials: Option<PathBuf>,
    credentials_present: bool,
    at: Instant,
}

/// Downloader that replays a fixed script, one step per attempt
struct ScriptedDownloader {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedDownloader {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn strategies_tried(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .map(|c| c.strategy)
            .collect()
    }
}

#[async_trait]
impl MediaDownloader for ScriptedDownloader {
    async fn search_and_download_best(
        &self,
        _query: &str,
        strategy: &Strategy,
        credentials: Option<PathBuf>,
    ) -> Result<Option<Candidate>, DownloadError> {
        let credentials_present = credentials.as_ref().is_some_and(|p| p.exists());
        self.calls.lock().expect("lock").push(Call {
            strategy: strategy.name,
            credentials,
            credentials_present,
            at: Instant::now(),
        });

        let step = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Step::Empty);
        match step {
            Step::Found(id) => Ok(Some(Candidate {
                id: id.to_string(),
                title: format!("Track {id}"),
                duration_secs: 263,
                webpage_url: format!("https://www.youtube.com/watch?v={id}"),
                thumbnail: None,
                file: PathBuf::from(format!("downloads/{id}-x.m4a")),
            })),
            Step::Empty => Ok(None),
            Step::Fails(message) => Err(DownloadError::Tool(message.to_string())),
        }
    }
}

fn pipeline(downloader: Arc<ScriptedDownloader>, settings: AcquisitionSettings) -> AcquisitionPipeline {
    AcquisitionPipeline::new(downloader, PLAYBACK_STRATEGIES, settings)
}

#[tokio::test(start_paused = true)]
async fn blocked_then_success_waits_exactly_one_backoff() {
    let downloader = ScriptedDownloader::new(vec![
        Step::Fails("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
        Step::Found("xyz"),
    ]);
    let settings = AcquisitionSettings::default();
    let unit = settings.backoff_unit;
    let pipeline = pipeline(downloader.clone(), settings);

    let started = Instant::now();
    let media = pipeline
        .resolve("perfect ed sheeran", "@alice")
        .await
        .expect("resolved");

    assert_eq!(started.elapsed(), unit);
    assert_eq!(media.title(), "Track xyz");
    assert_eq!(media.requested_by(), "@alice");
    assert_eq!(media.source_url(), "https://www.youtube.com/watch?v=xyz");
    assert_eq!(downloader.strategies_tried(), ["android", "ios"]);
}

#[tokio::test(start_paused = true)]
async fn all_strategies_unavailable_yield_one_terminal_failure() {
    let downloader = ScriptedDownloader::new(vec![
        Step::Fails("ERROR: Private video"),
        Step::Fails("ERROR: Video unavailable"),
        Step::Fails("ERROR: This video has been removed by the uploader"),
    ]);
    let pipeline = pipeline(downloader.clone(), AcquisitionSettings::default());

    let result = pipeline.resolve("some private thing", "@bob").await;

    assert_eq!(
        result,
        Err(AcquisitionError::Unknown(
            "ERROR: This video has been removed by the uploader".to_string()
        ))
    );
    assert_eq!(downloader.strategies_tried().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_between_attempts() {
    let downloader = ScriptedDownloader::new(vec![Step::Empty, Step::Empty, Step::Empty]);
    let settings = AcquisitionSettings {
        backoff_unit: Duration::from_millis(100),
        ..AcquisitionSettings::default()
    };
    let pipeline = pipeline(downloader.clone(), settings);

    assert_eq!(
        pipeline.resolve("asdkjhqwe", "@carol").await,
        Err(AcquisitionError::NoResults)
    );

    let calls = downloader.calls.lock().expect("lock");
    let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
    assert_eq!(gaps, [Duration::from_millis(100), Duration::from_millis(200)]);
}

#[tokio::test(start_paused = true)]
async fn empty_last_attempt_reports_no_results() {
    let downloader = ScriptedDownloader::new(vec![
        Step::Fails("HTTP Error 429: Too Many Requests"),
        Step::Fails("Sign in to confirm you're not a bot"),
        Step::Empty,
    ]);
    let pipeline = pipeline(downloader, AcquisitionSettings::default());

    assert_eq!(
        pipeline.resolve("query", "@dave").await,
        Err(AcquisitionError::NoResults)
    );
}

#[tokio::test]
async fn credentials_follow_strategy_flags_and_are_removed() {
    let dir = std::env::temp_dir().join(format!("oxide-music-creds-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.expect("dir");

    let downloader = ScriptedDownloader::new(vec![Step::Empty, Step::Empty, Step::Empty]);
    let settings = AcquisitionSettings {
        backoff_unit: Duration::from_millis(1),
        cookies: Some("# Netscape HTTP Cookie File".to_string()),
        credentials_dir: dir.clone(),
        ..AcquisitionSettings::default()
    };
    let pipeline = pipeline(downloader.clone(), settings);

    let _ = pipeline.resolve("query", "@erin").await;

    let calls = downloader.calls.lock().expect("lock");
    let flags: Vec<(&str, bool)> = calls
        .iter()
        .map(|c| (c.strategy, c.credentials_present))
        .collect();
    assert_eq!(flags, [("android", true), ("ios", false), ("web-m4a", true)]);
    assert!(calls[1].credentials.is_none());

    let used = calls[0].credentials.clone().expect("credentials path");
    assert!(used.starts_with(&dir));
    assert!(!used.exists());

    drop(calls);
    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test(start_paused = true)]
async fn retry_budget_limits_attempts() {
    let downloader = ScriptedDownloader::new(vec![Step::Fails("boom"), Step::Found("late")]);
    let settings = AcquisitionSettings {
        retry_budget: 1,
        ..AcquisitionSettings::default()
    };
    let pipeline = pipeline(downloader.clone(), settings);

    assert_eq!(
        pipeline.resolve("query", "@frank").await,
        Err(AcquisitionError::Unknown("boom".to_string()))
    );
    assert_eq!(downloader.strategies_tried(), ["android"]);
}

#[cfg(unix)]
#[tokio::test]
async fn failed_conversions_leave_download_dir_clean() {
    use std::os::unix::fs::PermissionsExt;

    let root = std::env::temp_dir().join(format!("oxide-music-pipeline-{}", uuid::Uuid::new_v4()));
    let downloads = root.join("downloads");
    tokio::fs::create_dir_all(&downloads).await.expect("dir");

    // Writes the download, then fails the way a missing ffmpeg does
    let binary = root.join("yt-dlp");
    let script = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
file=$(printf '%s' "$out" | sed -e 's/%(id)s/vid123/' -e 's/%(ext)s/webm/')
echo partial > "$file"
echo "ERROR: Postprocessing: ffprobe and ffmpeg not found" >&2
exit 1
"#;
    std::fs::write(&binary, script).expect("script");
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let downloader = Arc::new(YtDlpDownloader::new(
        binary.to_string_lossy(),
        downloads.clone(),
    ));
    let settings = AcquisitionSettings {
        backoff_unit: Duration::from_millis(1),
        ..AcquisitionSettings::default()
    };
    let pipeline = AcquisitionPipeline::new(downloader, DELIVERY_STRATEGIES, settings);

    let result = pipeline.resolve("perfect ed sheeran", "@grace").await;

    assert!(matches!(result, Err(AcquisitionError::Unknown(m)) if m.contains("ffmpeg not found")));
    let leftovers: Vec<_> = std::fs::read_dir(&downloads)
        .expect("read dir")
        .flatten()
        .map(|e| e.file_name())
        .collect();
    assert!(leftovers.is_empty(), "leftover downloads: {leftovers:?}");

    tokio::fs::remove_dir_all(&root).await.ok();
}
