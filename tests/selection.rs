//! 选词与复制手势集成测试

use tokio::task::LocalSet;

use wordmark::engine::{CommandOutcome, EngineCommand, Rejection, SelectionOutcome};
use wordmark::services::{MemoryStore, StoreSnapshot};
use wordmark::EngineConfig;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{advance, persisted_mark, settle, HtmlFixtures, TestEngine};

fn selection_outcome(outcome: CommandOutcome) -> SelectionOutcome {
    match outcome {
        CommandOutcome::Selection(outcome) => outcome,
        other => panic!("不是选择结果: {:?}", other),
    }
}

fn engine_with_apple() -> TestEngine {
    let mut snapshot = StoreSnapshot::default();
    snapshot
        .word_marks
        .insert("saved".into(), persisted_mark("saved", "apple", "苹果", 1));
    TestEngine::with_store(HtmlFixtures::apple_page(), MemoryStore::from_snapshot(snapshot))
}

/// 超过单词数上限的选择会通知用户，不创建标记
#[tokio::test(start_paused = true)]
async fn test_oversized_selection_notifies() {
    LocalSet::new()
        .run_until(async {
            let config = EngineConfig {
                word_count_limit: 50,
                ..EngineConfig::default()
            };
            let html = HtmlFixtures::long_paragraph(60);
            let engine = TestEngine::with_config(&html, config, MemoryStore::new());

            let text = vec!["lorem"; 60].join(" ");
            let outcome = selection_outcome(
                engine
                    .annotator
                    .dispatch(EngineCommand::SelectionEnd(engine.select(&text))),
            );
            assert_eq!(
                outcome,
                SelectionOutcome::Rejected(Rejection::TooManyWords {
                    count: 60,
                    limit: 50
                })
            );

            let notifications = engine.notifier.notifications();
            assert_eq!(notifications.len(), 1);
            assert!(notifications[0].1.contains("50"));

            advance(500).await;
            assert!(engine.marks().is_empty());
            assert!(engine.translator.calls().is_empty());
        })
        .await;
}

/// 网址、整页选择和中文都被静默拒绝
#[tokio::test(start_paused = true)]
async fn test_silent_rejections() {
    LocalSet::new()
        .run_until(async {
            let engine = TestEngine::new(
                "<html><body><p>visit www.rust-lang.org today</p><p>你好 world</p></body></html>",
            );

            let outcome = selection_outcome(
                engine
                    .annotator
                    .dispatch(EngineCommand::SelectionEnd(engine.select("www.rust-lang.org"))),
            );
            assert_eq!(outcome, SelectionOutcome::Rejected(Rejection::UrlLike));

            let outcome = selection_outcome(
                engine
                    .annotator
                    .dispatch(EngineCommand::SelectionEnd(engine.select("你好"))),
            );
            assert_eq!(outcome, SelectionOutcome::Rejected(Rejection::DisallowedScript));

            let mut event = engine.select("today");
            event.whole_document = true;
            let outcome =
                selection_outcome(engine.annotator.dispatch(EngineCommand::SelectionEnd(event)));
            assert_eq!(outcome, SelectionOutcome::Rejected(Rejection::WholeDocument));

            assert!(engine.notifier.is_empty());
            advance(500).await;
            assert!(engine.marks().is_empty());
        })
        .await;
}

/// 选择首尾的空白被去掉后再标记
#[tokio::test(start_paused = true)]
async fn test_selection_whitespace_is_trimmed() {
    LocalSet::new()
        .run_until(async {
            let engine = TestEngine::new(HtmlFixtures::apple_page());
            let mut event = engine.select(" apple ");
            event.text = " apple ".to_string();

            let outcome =
                selection_outcome(engine.annotator.dispatch(EngineCommand::SelectionEnd(event)));
            assert_eq!(outcome, SelectionOutcome::Armed);
            advance(300).await;

            assert_eq!(engine.mark_texts(), vec!["apple"]);
            assert!(engine.html().contains("I like <span"));
            assert!(engine.html().contains("</span> pie."));
        })
        .await;
}

/// 等待期内的取消手势会撤销标记
#[tokio::test(start_paused = true)]
async fn test_cancel_gestures_preempt_pending_selection() {
    LocalSet::new()
        .run_until(async {
            let engine = TestEngine::new(HtmlFixtures::apple_page());
            let gestures = [
                EngineCommand::KeyDown {
                    key: "Escape".into(),
                    ctrl_or_meta: false,
                },
                EngineCommand::KeyDown {
                    key: "a".into(),
                    ctrl_or_meta: true,
                },
                EngineCommand::KeyDown {
                    key: "c".into(),
                    ctrl_or_meta: true,
                },
                EngineCommand::SelectionStart,
            ];

            for gesture in gestures {
                let outcome = engine
                    .annotator
                    .dispatch(EngineCommand::SelectionEnd(engine.select("apple")));
                assert_eq!(outcome, CommandOutcome::Selection(SelectionOutcome::Armed));
                assert!(engine.annotator.selection().has_pending());

                advance(100).await;
                assert_eq!(engine.annotator.dispatch(gesture), CommandOutcome::Handled);
                assert!(!engine.annotator.selection().has_pending());

                advance(400).await;
                assert!(engine.marks().is_empty());
            }

            // 普通按键不取消
            engine
                .annotator
                .dispatch(EngineCommand::SelectionEnd(engine.select("apple")));
            let outcome = engine.annotator.dispatch(EngineCommand::KeyDown {
                key: "v".into(),
                ctrl_or_meta: true,
            });
            assert_eq!(outcome, CommandOutcome::Ignored);
            advance(300).await;
            assert_eq!(engine.mark_texts(), vec!["apple"]);
        })
        .await;
}

/// 新的选择替换等待中的旧选择
#[tokio::test(start_paused = true)]
async fn test_reselect_replaces_pending_selection() {
    LocalSet::new()
        .run_until(async {
            let engine = TestEngine::new(HtmlFixtures::apple_page());
            engine
                .annotator
                .dispatch(EngineCommand::SelectionEnd(engine.select("apple")));
            advance(100).await;
            engine
                .annotator
                .dispatch(EngineCommand::SelectionEnd(engine.select("doctor")));
            advance(300).await;

            assert_eq!(engine.mark_texts(), vec!["doctor"]);
            assert_eq!(engine.translator.pending_words(), vec!["doctor"]);
        })
        .await;
}

/// 已经标记过的术语不会再次标记
#[tokio::test(start_paused = true)]
async fn test_already_marked_term() {
    LocalSet::new()
        .run_until(async {
            let engine = engine_with_apple();
            engine.annotator.start(None).await.unwrap();
            assert_eq!(engine.marks().len(), 2);

            let node = engine.annotator.lifecycle().mark_wrappers()[0].children.borrow()[0].clone();
            let event = wordmark::engine::SelectionEvent {
                node,
                start: 0,
                end: 5,
                text: "APPLE".to_string(),
                whole_document: false,
            };
            let outcome =
                selection_outcome(engine.annotator.dispatch(EngineCommand::SelectionEnd(event)));
            assert_eq!(outcome, SelectionOutcome::AlreadyMarked);
        })
        .await;
}

/// 复制已标记的术语会删除它的全部标记
#[tokio::test(start_paused = true)]
async fn test_copy_removes_marked_term() {
    LocalSet::new()
        .run_until(async {
            let engine = engine_with_apple();
            engine.annotator.start(None).await.unwrap();
            assert_eq!(engine.marks().len(), 2);

            let outcome = engine.annotator.dispatch(EngineCommand::Copy {
                text: "pear".into(),
            });
            assert_eq!(outcome, CommandOutcome::CopyRemoval(false));

            let outcome = engine.annotator.dispatch(EngineCommand::Copy {
                text: " Apple\n".into(),
            });
            assert_eq!(outcome, CommandOutcome::CopyRemoval(true));
            settle().await;

            assert!(engine.marks().is_empty());
            assert!(engine.annotator.records().is_empty());
            assert!(engine.html().contains("<p id=\"first\">I like apple pie.</p>"));
        })
        .await;
}

/// 偏移与上报文字不一致时不创建标记，中文不会借此被标记
#[tokio::test(start_paused = true)]
async fn test_offsets_must_match_reported_text() {
    LocalSet::new()
        .run_until(async {
            let engine = TestEngine::new("<html><body><p>苹果 apple</p></body></html>");
            let mut event = engine.select("苹果 apple");
            event.text = "apple".to_string();

            let outcome =
                selection_outcome(engine.annotator.dispatch(EngineCommand::SelectionEnd(event)));
            assert_eq!(outcome, SelectionOutcome::Stale);
            assert!(!engine.annotator.selection().has_pending());

            advance(500).await;
            assert!(engine.marks().is_empty());
            assert!(engine.translator.calls().is_empty());
        })
        .await;
}
