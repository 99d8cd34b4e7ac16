//! TubeDeck facade wiring

mod common;

use common::TestEnvironment;
use pretty_assertions::assert_eq;
use tubecore::binaries::BinaryKind;
use tubecore::download::CookieRecord;
use tubecore::watcher::StatusChange;
use tubecore::{AppError, TubeDeck};

#[tokio::test]
async fn test_fresh_install_is_not_ready() {
    let env = TestEnvironment::new();
    let deck = TubeDeck::new(env.paths.clone()).unwrap();

    let report = deck.readiness().await;
    assert!(!report.ready);
    assert!(!report.ytdlp.exists);
    assert!(!report.ffmpeg.exists);
}

#[tokio::test]
async fn test_cookie_lifecycle() {
    let env = TestEnvironment::new();
    let deck = TubeDeck::new(env.paths.clone()).unwrap();
    assert!(!deck.cookie_status().await.has_cookies);

    let records = vec![
        CookieRecord {
            domain: "youtube.com".into(),
            path: "/".into(),
            secure: true,
            expiration: 1_900_000_000,
            name: "LOGIN_INFO".into(),
            value: "x".into(),
        },
        CookieRecord {
            domain: ".youtube.com".into(),
            path: "/".into(),
            secure: false,
            expiration: 0,
            name: "PREF".into(),
            value: "f6=40000000".into(),
        },
    ];
    assert_eq!(deck.sync_cookies(&records).await.unwrap(), 2);

    let status = deck.cookie_status().await;
    assert!(status.has_cookies);
    assert!(status.has_login_cookies);
    assert_eq!(status.cookie_count, 2);
    assert!(status.last_modified.is_some());

    let err = deck.import_cookies("just some text").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(deck.delete_cookies().await.unwrap());
    assert!(!deck.delete_cookies().await.unwrap());
    assert!(!deck.cookie_status().await.has_cookies);
}

#[tokio::test]
async fn test_watch_status_starts_with_cookie_status() {
    let env = TestEnvironment::new();
    let deck = TubeDeck::new(env.paths.clone()).unwrap();

    let (handle, mut rx) = deck.watch_status();
    let first = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, StatusChange::Cookies(ref s) if !s.has_cookies));
    handle.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_batch_completion_callback_receives_result() {
    let env = TestEnvironment::new();
    env.install_script(BinaryKind::Ffmpeg, common::FAKE_FFMPEG);
    let deck = TubeDeck::new(env.paths.clone()).unwrap();

    let input = env.media_dir().join("talk.wav");
    std::fs::write(&input, b"pcm").unwrap();

    let mut finished = None;
    let result = deck
        .convert_batch(
            &[input],
            tubecore::conversion::TargetFormat::Ogg,
            tubecore::conversion::Preset::default(),
            |_| {},
            |_| {},
            |batch| finished = Some(batch.clone()),
        )
        .await
        .unwrap();

    assert_eq!(finished, Some(result.clone()));
    assert_eq!(result.successes[0].output, env.media_dir().join("talk_converted.ogg"));
}
