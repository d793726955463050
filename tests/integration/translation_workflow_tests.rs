/*!
 * Integration tests for the per-file translation loop and batch processing
 */

use std::fs;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

use linewise::errors::{AppError, TranslationError};
use linewise::providers::mock::MockProvider;
use linewise::subtitle_processor::CaptionDocument;
use linewise::translation::{FileState, Orchestrator, RateBudget, RetryPolicy, RunContext};
use crate::common;

const HELLO_WORLD: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n\n";

#[tokio::test]
async fn test_translateFile_withUppercaseProvider_shouldWriteTranslatedDocument() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "sample.srt", HELLO_WORLD)?;
    let mut context = common::test_context(temp_dir.path());

    let orchestrator = Orchestrator::new(Arc::new(MockProvider::uppercase()), common::quiet_options());
    let report = orchestrator.translate_file(&input, &mut context).await?;

    assert_eq!(report.output, temp_dir.path().join("sample.de.de.srt"));
    assert_eq!(report.cues, 2);
    assert_eq!(report.tokens, 30);

    let output = fs::read_to_string(&report.output)?;
    assert_eq!(
        output,
        "1\n00:00:01,000 --> 00:00:02,000\nHELLO\n\n2\n00:00:03,000 --> 00:00:04,000\nWORLD\n\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withHistoryDisabled_shouldSendOnlyPersonaAndCurrentCue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::working();

    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), common::quiet_options());
    orchestrator.translate_file(&input, &mut context).await?;

    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    for (request, expected) in requests.iter().zip([
        "This is a test subtitle.",
        "It contains multiple entries.",
        "For testing purposes.",
    ]) {
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.ends_with("Translate into German (DE)."));
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[1].content, expected);
    }
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withHistoryEnabled_shouldGrowConversation() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::working();

    let mut options = common::quiet_options();
    options.keep_history = true;
    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), options);
    orchestrator.translate_file(&input, &mut context).await?;

    let sizes: Vec<usize> = provider.requests().iter().map(|r| r.messages.len()).collect();
    assert_eq!(sizes, vec![2, 4, 6]);

    let last = &provider.requests()[2];
    assert_eq!(last.messages[2].role, "assistant");
    assert_eq!(last.messages[2].content, "[TRANSLATED] This is a test subtitle.");
    Ok(())
}

#[tokio::test]
async fn test_translateBatch_withFailureOnSecondCue_shouldSkipOutputAndContinue() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let first = common::create_test_subtitle(temp_dir.path(), "a.srt")?;
    let second = common::create_test_subtitle(temp_dir.path(), "b.srt")?;
    let mut context = common::test_context(temp_dir.path());

    let orchestrator = Orchestrator::new(Arc::new(MockProvider::fail_on_call(2)), common::quiet_options());
    let summary = orchestrator.translate_batch(&[first.clone(), second.clone()], &mut context).await;

    assert_eq!(summary.translated, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_tokens, 45);
    assert!(!temp_dir.path().join("a.de.de.srt").exists());
    assert!(temp_dir.path().join("b.de.de.srt").exists());

    assert!(matches!(summary.files[0].1, FileState::Failed(_)));
    assert_eq!(summary.files[1].1, FileState::Saved(temp_dir.path().join("b.de.de.srt")));
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withTransientFailures_shouldRetryAndSucceed() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(
        temp_dir.path(),
        "single.srt",
        "1\n00:00:01,000 --> 00:00:02,000\nHello\n",
    )?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::flaky(2);

    let mut options = common::quiet_options();
    options.retry = RetryPolicy::new(3, Duration::ZERO);
    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), options);
    let report = orchestrator.translate_file(&input, &mut context).await?;

    assert_eq!(provider.call_count(), 3);
    assert_eq!(fs::read_to_string(report.output)?.lines().nth(2), Some("[TRANSLATED] Hello"));

    // Failed attempts leave no dangling user message behind
    assert_eq!(provider.requests()[2].messages.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withDroppedConnection_shouldRetryOnlyThatCue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::drop_on_call(2);

    let mut options = common::quiet_options();
    options.retry = RetryPolicy::new(2, Duration::ZERO);
    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), options);
    let report = orchestrator.translate_file(&input, &mut context).await?;

    assert_eq!(provider.call_count(), 4);
    assert_eq!(report.cues, 3);
    let prompts: Vec<String> = provider.requests().iter()
        .map(|r| r.messages[1].content.clone())
        .collect();
    assert_eq!(prompts[1], prompts[2]);
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withFatalError_shouldNotRetry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::failing();

    let mut options = common::quiet_options();
    options.retry = RetryPolicy::new(5, Duration::ZERO);
    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), options);
    let result = orchestrator.translate_file(&input, &mut context).await;

    assert!(matches!(result, Err(AppError::Translation(TranslationError::Provider(_)))));
    assert_eq!(provider.call_count(), 1);
    assert!(!temp_dir.path().join("episode.de.de.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withPersistentTransientErrors_shouldExhaustRetries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::flaky(10);

    let mut options = common::quiet_options();
    options.retry = RetryPolicy::new(2, Duration::ZERO);
    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), options);
    let result = orchestrator.translate_file(&input, &mut context).await;

    match result {
        Err(AppError::Translation(TranslationError::RetriesExhausted { cue, attempts, .. })) => {
            assert_eq!(cue, 1);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(provider.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withTokenLimit_shouldCoolDownOncePerCrossing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let budget = RateBudget::with_cooldown(20, Duration::ZERO);
    let mut context = RunContext::for_log_dir(temp_dir.path(), budget);

    let orchestrator = Orchestrator::new(Arc::new(MockProvider::working()), common::quiet_options());
    orchestrator.translate_file(&input, &mut context).await?;

    // 15 tokens per cue: the second cue crosses 20 and resets, the third starts a new count
    assert_eq!(context.budget.tokens_in_window(), 15);
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withEmptyDocument_shouldWriteEmptyOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "empty.srt", "")?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::working();

    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), common::quiet_options());
    let report = orchestrator.translate_file(&input, &mut context).await?;

    assert_eq!(provider.call_count(), 0);
    assert_eq!(fs::read_to_string(report.output)?, "");
    Ok(())
}

#[tokio::test]
async fn test_translateFile_shouldDumpOneRecordPerExchange() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "episode.srt")?;
    let mut context = common::test_context(temp_dir.path());

    let orchestrator = Orchestrator::new(Arc::new(MockProvider::working()), common::quiet_options());
    orchestrator.translate_file(&input, &mut context).await?;

    let dumps: Vec<_> = fs::read_dir(context.audit_dir())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(dumps.len(), 3);
    assert!(dumps.iter().all(|name| name.starts_with("response-dump-chatcmpl-mock-")));
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withQuotedReplies_shouldStripQuotes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "sample.srt", HELLO_WORLD)?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::working().with_custom_response(|text| format!("\"{}!\"", text));

    let orchestrator = Orchestrator::new(Arc::new(provider), common::quiet_options());
    let report = orchestrator.translate_file(&input, &mut context).await?;

    let output = fs::read_to_string(report.output)?;
    assert!(output.contains("\nHello!\n"));
    assert!(output.contains("\nWorld!\n"));
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withMultiParagraphReplies_shouldKeepCuesIntact() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "sample.srt", HELLO_WORLD)?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::working().with_custom_response(|text| format!("{}\n\n  Zeile  ", text));

    let orchestrator = Orchestrator::new(Arc::new(provider), common::quiet_options());
    let report = orchestrator.translate_file(&input, &mut context).await?;

    let output = fs::read_to_string(&report.output)?;
    assert_eq!(
        output,
        "1\n00:00:01,000 --> 00:00:02,000\nHello\nZeile\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\nZeile\n\n"
    );

    let reparsed = CaptionDocument::parse_str(&output, report.output.clone())?;
    assert_eq!(reparsed.len(), 2);
    assert_eq!(reparsed.serialize(), output);
    Ok(())
}

#[tokio::test]
async fn test_translateFile_withOutputDir_shouldWriteThere() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "sample.srt", HELLO_WORLD)?;
    let out_dir = temp_dir.path().join("translated");
    let mut context = common::test_context(temp_dir.path());

    let mut options = common::quiet_options();
    options.output_dir = Some(out_dir.clone());
    let orchestrator = Orchestrator::new(Arc::new(MockProvider::working()), options);
    let report = orchestrator.translate_file(&input, &mut context).await?;

    assert_eq!(report.output, out_dir.join("sample.de.de.srt"));
    assert!(report.output.exists());
    Ok(())
}

#[tokio::test]
async fn test_translateBatch_withMissingFile_shouldRecordFormatFailure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let missing = temp_dir.path().join("missing.srt");
    let mut context = common::test_context(temp_dir.path());

    let orchestrator = Orchestrator::new(Arc::new(MockProvider::working()), common::quiet_options());
    let summary = orchestrator.translate_batch(&[missing], &mut context).await;

    assert_eq!(summary.translated, 0);
    assert_eq!(summary.failed, 1);
    match &summary.files[0].1 {
        FileState::Failed(reason) => assert!(reason.contains("not found")),
        other => panic!("unexpected state: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_translateBatch_withTextButNoCues_shouldRecordFormatFailure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let notes = common::create_test_file(temp_dir.path(), "notes.srt", "not a subtitle\nat all\n")?;
    let valid = common::create_test_file(temp_dir.path(), "sample.srt", HELLO_WORLD)?;
    let mut context = common::test_context(temp_dir.path());
    let provider = MockProvider::working();

    let orchestrator = Orchestrator::new(Arc::new(provider.clone()), common::quiet_options());
    let summary = orchestrator.translate_batch(&[notes, valid], &mut context).await;

    assert_eq!(summary.translated, 1);
    assert_eq!(summary.failed, 1);
    match &summary.files[0].1 {
        FileState::Failed(reason) => assert!(reason.contains("No subtitle cues found")),
        other => panic!("unexpected state: {:?}", other),
    }
    assert_eq!(provider.call_count(), 2);
    assert!(!temp_dir.path().join("notes.de.de.srt").exists());
    Ok(())
}
