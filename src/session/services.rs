use tracing::{debug, info, instrument, warn};

use super::machine::{Action, Effect, Submission};
use super::store::SharedScreen;
use crate::analysis::client::AnalyzeError;
use crate::analysis::dto::AnalysisRequest;
use crate::analysis::interpret::{Interpretation, Interpreter};
use crate::error::PipelineError;
use crate::media::model::Acquisition;
use crate::media::transcode;
use crate::media::MediaError;
use crate::state::AppState;

/// Feeds the result of a capture or pick into the screen.
pub async fn record_acquisition(
    screen: &SharedScreen,
    acquired: Result<Acquisition, MediaError>,
) -> Effect {
    let action = match acquired {
        Ok(Acquisition::Selected(media)) => {
            debug!(uri = %media.uri, bytes = ?media.byte_len(), "media acquired");
            Action::MediaAcquired(media)
        }
        Ok(Acquisition::Cancelled) => return Effect::None,
        Err(e) => Action::AcquisitionFailed(e.into()),
    };
    screen.lock().await.apply(action)
}

/// Runs one submission to completion. The screen lock is only held while
/// applying actions, never across the encode or the network call.
///
/// The pipeline runs on its own task, so a caller that goes away (client
/// disconnect) does not strand the screen in `Submitting`.
#[instrument(skip(st, screen, bearer))]
pub async fn submit(st: &AppState, screen: &SharedScreen, bearer: Option<&str>) -> Effect {
    let effect = screen.lock().await.apply(Action::Submit);
    let sub = match effect {
        Effect::Analyze(sub) => sub,
        other => return other,
    };

    let ticket = sub.ticket;
    let task = {
        let st = st.clone();
        let screen = screen.clone();
        let bearer = bearer.map(str::to_string);
        tokio::spawn(async move {
            let outcome = run_pipeline(&st, &sub, bearer.as_deref()).await;
            finish(&screen, ticket, outcome).await;
        })
    };

    if let Err(e) = task.await {
        warn!(ticket, error = %e, "analysis task aborted");
        let outcome = Err(AnalyzeError::Response {
            status: None,
            detail: "analysis task aborted".into(),
        }
        .into());
        finish(screen, ticket, outcome).await;
    }
    Effect::None
}

/// Exactly one completion per ticket, so the busy state always clears.
async fn finish(
    screen: &SharedScreen,
    ticket: u64,
    outcome: Result<Interpretation, PipelineError>,
) {
    match &outcome {
        Ok(_) => info!(ticket, "analysis completed"),
        Err(e) if e.is_cancelled() => info!(ticket, "analysis abandoned"),
        Err(e) => warn!(ticket, error = %e, "analysis failed"),
    }
    screen
        .lock()
        .await
        .apply(Action::Finished { ticket, outcome });
}

async fn run_pipeline(
    st: &AppState,
    sub: &Submission,
    bearer: Option<&str>,
) -> Result<Interpretation, PipelineError> {
    let cfg = &st.config.analysis;

    let encoded = tokio::select! {
        biased;
        _ = sub.cancel.cancelled() => return Err(AnalyzeError::Cancelled.into()),
        encoded = transcode::encode(&sub.media, cfg.jpeg_quality) => encoded?,
    };
    debug!(ticket = sub.ticket, jpeg_bytes = encoded.byte_len, "image encoded");

    let request = AnalysisRequest {
        image_data_base64: encoded.base64,
        text: sub.prompt.clone(),
    };
    let bearer = bearer.filter(|_| cfg.attach_session_token);
    let envelope = st.analyzer.analyze(&request, bearer, &sub.cancel).await?;

    let interpreter = Interpreter {
        fallback_text: cfg.render_fallback_text,
    };
    interpreter.interpret(&envelope).map_err(|e| {
        let err = PipelineError::from(e);
        if err.is_shape_mismatch() {
            let raw = serde_json::to_string(&envelope).unwrap_or_default();
            warn!(%raw, "unrecognized analysis response shape");
        }
        err
    })
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::media::model::CapturedMedia;
    use crate::media::transcode::sample_png;
    use crate::session::machine::Phase;
    use crate::session::dto::ScreenView;
    use crate::presenter::sections::{Section, SectionBody, NOT_AVAILABLE};
    use crate::presenter::Verdict;
    use crate::state::{AppState, FakeReply};
    use bytes::Bytes;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;

    fn png() -> CapturedMedia {
        CapturedMedia::from_upload("capture://meal.png".into(), "image/png", Bytes::from(sample_png()))
    }

    async fn with_media(st: &AppState, media: CapturedMedia) -> SharedScreen {
        let (_, screen) = st.screens.open(Uuid::new_v4());
        record_acquisition(&screen, Ok(Acquisition::Selected(media))).await;
        screen
    }

    #[tokio::test]
    async fn no_media_never_calls_the_service() {
        let (st, fake) = AppState::fake();
        let (_, screen) = st.screens.open(Uuid::new_v4());

        submit(&st, &screen, Some("tok")).await;

        assert_eq!(fake.calls(), 0);
        let s = screen.lock().await;
        assert_eq!(s.state().phase(), Phase::Idle);
        assert_eq!(s.notice().unwrap().message, "Please select an image before sending.");
    }

    #[tokio::test]
    async fn apple_end_to_end() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Envelope(json!({
            "content": {"score": {"total": 72}, "nutrition_info": {"name": "Apple", "calories": 95}}
        })));
        let screen = with_media(&st, png()).await;

        submit(&st, &screen, Some("tok")).await;

        let req = fake.last_request().unwrap();
        assert!(!req.image_data_base64.is_empty());
        assert_eq!(req.text, "");
        assert_eq!(fake.last_bearer().as_deref(), Some("tok"));

        let mut s = screen.lock().await;
        let view = ScreenView::from(&*s);
        assert_eq!(view.phase, Phase::Result);
        assert!(!view.busy);
        let score = view.score.unwrap();
        assert_eq!(score.percent, 72);
        assert_eq!(score.verdict, Verdict::RiskFree);
        assert_eq!(score.name.as_deref(), Some("Apple"));

        s.apply(Action::SelectSection(Section::NutritionInfo));
        let view = ScreenView::from(&*s);
        let SectionBody::Facts { facts } = view.active_section.unwrap().body else {
            panic!("expected facts");
        };
        assert_eq!(facts[0].label, "Calories");
        assert_eq!(facts[0].value, "95");
        assert_eq!(facts[1].label, "Fat");
        assert_eq!(facts[1].value, NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn server_message_end_to_end() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Envelope(json!({"message": "Could not identify food item"})));
        let screen = with_media(&st, png()).await;

        submit(&st, &screen, None).await;

        let s = screen.lock().await;
        assert_eq!(s.state().phase(), Phase::MediaSelected);
        assert_eq!(s.notice().unwrap().message, "Could not identify food item");
    }

    #[tokio::test]
    async fn transport_failure_clears_busy() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Unreachable);
        let screen = with_media(&st, png()).await;

        submit(&st, &screen, None).await;

        let s = screen.lock().await;
        assert!(!s.is_busy());
        assert_eq!(s.state().phase(), Phase::MediaSelected);
        assert_eq!(s.notice().unwrap().message, "Failed to communicate with server.");
    }

    #[tokio::test]
    async fn video_is_rejected_before_any_call() {
        let (st, fake) = AppState::fake();
        let video = CapturedMedia::from_upload(
            "capture://clip.mp4".into(),
            "video/mp4",
            Bytes::from_static(b"....ftyp"),
        );
        let screen = with_media(&st, video).await;

        submit(&st, &screen, None).await;

        assert_eq!(fake.calls(), 0);
        let s = screen.lock().await;
        assert_eq!(s.state().phase(), Phase::Idle);
        assert_eq!(s.notice().unwrap().title, "Unsupported Media");
    }

    #[tokio::test]
    async fn session_token_is_withheld_when_disabled() {
        let (mut st, fake) = AppState::fake();
        let mut cfg = (*st.config).clone();
        cfg.analysis.attach_session_token = false;
        st.config = std::sync::Arc::new(cfg);
        fake.push(FakeReply::Envelope(json!({"content": {"score": {"total": 10}}})));
        let screen = with_media(&st, png()).await;

        submit(&st, &screen, Some("tok")).await;

        assert_eq!(fake.calls(), 1);
        assert_eq!(fake.last_bearer(), None);
        let s = screen.lock().await;
        let view = ScreenView::from(&*s);
        assert_eq!(view.score.unwrap().verdict, Verdict::Harmful);
    }

    #[tokio::test]
    async fn fallback_text_when_enabled() {
        let (mut st, fake) = AppState::fake();
        let mut cfg = (*st.config).clone();
        cfg.analysis.render_fallback_text = true;
        st.config = std::sync::Arc::new(cfg);
        fake.push(FakeReply::Envelope(json!({"content": "Looks like a salad, mostly greens."})));
        let screen = with_media(&st, png()).await;

        submit(&st, &screen, None).await;

        let s = screen.lock().await;
        let view = ScreenView::from(&*s);
        assert_eq!(view.phase, Phase::Fallback);
        assert_eq!(
            view.fallback_text.as_deref(),
            Some("Looks like a salad, mostly greens.")
        );
    }

    #[tokio::test]
    async fn reset_while_pending_discards_late_response() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Delayed(
            Duration::from_secs(30),
            json!({"content": {"score": {"total": 90}}}),
        ));
        let screen = with_media(&st, png()).await;

        let pending = {
            let st = st.clone();
            let screen = screen.clone();
            tokio::spawn(async move { submit(&st, &screen, None).await })
        };

        // wait until the request is in flight
        for _ in 0..200 {
            if fake.calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(screen.lock().await.is_busy());
        screen.lock().await.apply(Action::Reset);

        tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("pipeline should stop once cancelled")
            .unwrap();

        let s = screen.lock().await;
        assert_eq!(s.state().phase(), Phase::Idle);
        assert!(s.notice().is_none());
    }

    #[tokio::test]
    async fn second_submit_is_ignored_while_pending() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Delayed(
            Duration::from_millis(200),
            json!({"content": {"score": {"total": 90}}}),
        ));
        let screen = with_media(&st, png()).await;

        let first = {
            let st = st.clone();
            let screen = screen.clone();
            tokio::spawn(async move { submit(&st, &screen, None).await })
        };
        for _ in 0..200 {
            if fake.calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = submit(&st, &screen, None).await;
        assert!(matches!(second, Effect::Rejected(_)));

        first.await.unwrap();
        assert_eq!(fake.calls(), 1);
        assert_eq!(screen.lock().await.state().phase(), Phase::Result);
    }
    #[tokio::test]
    async fn dropped_caller_still_clears_busy() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Delayed(
            Duration::from_millis(150),
            json!({"content": {"score": {"total": 64}}}),
        ));
        let screen = with_media(&st, png()).await;

        let caller = {
            let st = st.clone();
            let screen = screen.clone();
            tokio::spawn(async move { submit(&st, &screen, None).await })
        };
        for _ in 0..200 {
            if fake.calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // the HTTP handler future goes away when the client disconnects
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        for _ in 0..200 {
            if !screen.lock().await.is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let s = screen.lock().await;
        assert!(!s.is_busy());
        assert_eq!(s.state().phase(), Phase::Result);
    }
    #[tokio::test]
    async fn blank_server_message_reads_as_unexpected() {
        let (st, fake) = AppState::fake();
        fake.push(FakeReply::Envelope(json!({"message": ""})));
        let screen = with_media(&st, png()).await;

        submit(&st, &screen, None).await;

        let s = screen.lock().await;
        assert_eq!(s.state().phase(), Phase::MediaSelected);
        assert_eq!(s.notice().unwrap().message, "Unexpected response from server.");
    }
}
