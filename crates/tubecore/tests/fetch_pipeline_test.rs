//! FetchPipeline against shell-script stand-ins for yt-dlp
#![cfg(unix)]

mod common;

use common::{wait_until, TestEnvironment};
use pretty_assertions::assert_eq;
use tubecore::binaries::BinaryKind;
use tubecore::core::{OperationState, ProcessRunner};
use tubecore::download::{CookieStore, DownloadOptions, FetchPipeline, FetchProgress, FetchStatus};
use tubecore::parsing::ytdlp::YtDlpErrorType;
use tubecore::AppError;

/// Prints the output directory taken from `-o <dir>/<template>`
const OUTPUT_DIR: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
dir=$(dirname "$out")
"#;

fn pipeline(env: &TestEnvironment, script: &str) -> FetchPipeline {
    env.install_script(BinaryKind::YtDlp, script);
    FetchPipeline::new(
        env.binary(BinaryKind::YtDlp),
        env.binary(BinaryKind::Ffmpeg),
        ProcessRunner::with_search_dir(env.paths.bin_dir()),
        CookieStore::from_paths(&env.paths),
    )
}

fn options(env: &TestEnvironment) -> DownloadOptions {
    DownloadOptions {
        url: "https://www.youtube.com/watch?v=abc".to_string(),
        output_dir: env.media_dir(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_download_reports_progress_and_final_file() {
    let env = TestEnvironment::new();
    let script = format!(
        r#"{OUTPUT_DIR}
echo "[download] Destination: $dir/clip.f137.mp4"
echo "[download]  10.0% of 5.00MiB at 1.00MiB/s ETA 00:04"
echo "[download] 100.0% of 5.00MiB at 2.00MiB/s ETA 00:00"
echo "[Merger] Merging formats into \"$dir/clip.mp4\""
: > "$dir/clip.mp4"
"#
    );
    let fetch = pipeline(&env, &script);

    let mut events: Vec<FetchProgress> = Vec::new();
    let outcome = fetch.download(&options(&env), |p| events.push(p)).await.unwrap();

    let expected_file = env.media_dir().join("clip.mp4");
    assert_eq!(outcome.filename.as_deref(), Some(expected_file.to_str().unwrap()));
    assert!(!outcome.already_downloaded);

    let statuses: Vec<(f64, FetchStatus)> = events.iter().map(|e| (e.percent, e.status)).collect();
    assert_eq!(
        statuses,
        vec![
            (10.0, FetchStatus::Downloading),
            (100.0, FetchStatus::Downloading),
            (100.0, FetchStatus::Processing),
        ]
    );
    assert_eq!(events[0].speed.as_deref(), Some("1.00MiB/s"));
    assert_eq!(events[0].eta.as_deref(), Some("00:04"));
    assert_eq!(fetch.state(), OperationState::Completed);
}

#[tokio::test]
async fn test_already_downloaded_is_flagged() {
    let env = TestEnvironment::new();
    let script = format!(
        r#"{OUTPUT_DIR}
echo "[download] $dir/clip.mp4 has already been downloaded"
"#
    );
    let fetch = pipeline(&env, &script);

    let outcome = fetch.download(&options(&env), |_| {}).await.unwrap();
    assert!(outcome.already_downloaded);
    assert!(outcome.filename.unwrap().ends_with("clip.mp4"));
}

#[tokio::test]
async fn test_known_failure_is_classified() {
    let env = TestEnvironment::new();
    let fetch = pipeline(
        &env,
        r#"echo "ERROR: [youtube] abc: Sign in to confirm your age" >&2
exit 1"#,
    );

    let err = fetch.download(&options(&env), |_| {}).await.unwrap_err();
    match err {
        AppError::NonZeroExit { kind, code, .. } => {
            assert_eq!(kind, Some(YtDlpErrorType::AgeRestricted));
            assert_eq!(code, Some(1));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
    assert_eq!(fetch.state(), OperationState::Failed);
}

#[tokio::test]
async fn test_unknown_failure_uses_first_stderr_line() {
    let env = TestEnvironment::new();
    let fetch = pipeline(
        &env,
        r#"echo "ERROR: Unsupported URL: https://example.com" >&2
echo "more detail" >&2
exit 1"#,
    );

    let err = fetch.download(&options(&env), |_| {}).await.unwrap_err();
    match err {
        AppError::NonZeroExit { kind, message, .. } => {
            assert_eq!(kind, None);
            assert_eq!(message, "ERROR: Unsupported URL: https://example.com");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_stops_download_and_removes_partials() {
    let env = TestEnvironment::new();
    let script = format!(
        r#"{OUTPUT_DIR}
echo "[download] Destination: $dir/clip.f137.mp4"
: > "$dir/clip.f137.mp4.part"
echo "[download]  10.0% of 5.00MiB at 1.00MiB/s ETA 00:04"
exec sleep 30
"#
    );
    let fetch = pipeline(&env, &script);
    let canceller = fetch.clone();

    let started = std::time::Instant::now();
    let err = fetch
        .download(&options(&env), |p| {
            if p.status == FetchStatus::Downloading {
                canceller.cancel();
            }
        })
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "{err:?}");
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    assert!(!env.media_dir().join("clip.f137.mp4.part").exists());
    assert_eq!(fetch.state(), OperationState::Cancelled);
    assert!(!fetch.cancel());
}

#[tokio::test]
async fn test_second_download_is_rejected_while_running() {
    let env = TestEnvironment::new();
    let fetch = pipeline(&env, "exec sleep 30");

    let running = fetch.clone();
    let opts = options(&env);
    let task = tokio::spawn(async move { running.download(&opts, |_| {}).await });

    wait_until(|| fetch.state() == OperationState::Running).await;
    let err = fetch.download(&options(&env), |_| {}).await.unwrap_err();
    assert!(matches!(err, AppError::Busy));

    // a cancel that lands before the child is attached kills it on attach
    assert!(fetch.cancel());
    let result = tokio::time::timeout(std::time::Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_metadata_parses_json_and_builds_format_ladder() {
    let env = TestEnvironment::new();
    let json = serde_json::json!({
        "id": "abc",
        "title": "Clip",
        "duration": 125.0,
        "uploader": "Someone",
        "formats": [
            { "format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5 },
            { "format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 160.0 },
            { "format_id": "137", "ext": "mp4", "vcodec": "avc1", "acodec": "none", "height": 1080 }
        ]
    });
    let fetch = pipeline(
        &env,
        &format!("echo 'WARNING: something minor' >&2\necho '{}'", json),
    );

    let meta = fetch.get_metadata("https://youtu.be/abc").await.unwrap();
    assert_eq!(meta.id, "abc");
    assert_eq!(meta.title, "Clip");
    assert_eq!(meta.url, "https://youtu.be/abc");
    assert_eq!(meta.formats.video.len(), 7);
    assert_eq!(meta.formats.video[0].format_id, "best");
    let audio_ids: Vec<&str> = meta.formats.audio.iter().map(|f| f.format_id.as_str()).collect();
    assert_eq!(audio_ids, vec!["251", "140"]);

    // metadata does not occupy the download slot
    assert_eq!(fetch.state(), OperationState::Idle);
}

#[tokio::test]
async fn test_metadata_failure_carries_raw_stderr() {
    let env = TestEnvironment::new();
    let fetch = pipeline(&env, "echo 'ERROR: boom' >&2\nexit 1");

    let err = fetch.get_metadata("https://youtu.be/abc").await.unwrap_err();
    match err {
        AppError::NonZeroExit { message, .. } => assert_eq!(message, "ERROR: boom"),
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cookie_file_is_passed_when_present() {
    let env = TestEnvironment::new();
    let args_file = env.tmp.path().join("args.txt");
    let fetch = pipeline(
        &env,
        &format!(r#"printf '%s\n' "$@" > "{}""#, args_file.display()),
    );

    CookieStore::from_paths(&env.paths)
        .import("# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n")
        .await
        .unwrap();
    fetch.download(&options(&env), |_| {}).await.unwrap();

    let args = std::fs::read_to_string(&args_file).unwrap();
    let lines: Vec<&str> = args.lines().collect();
    assert_eq!(lines[0], "--cookies");
    assert_eq!(lines[1], env.paths.cookie_file().to_str().unwrap());
    assert!(lines.contains(&"--newline"));
    assert_eq!(lines.last(), Some(&"https://www.youtube.com/watch?v=abc"));
}
