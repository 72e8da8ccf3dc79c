use std::sync::Mutex;

use agriconnect_api::{
    advisor::{Advisor, AdvisorError, ChatTurn, TokenStream, TurnRole},
    dto::chatbot::RelayFrame,
    services::chat_service::relay_tokens,
};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Replays a fixed script and records the turns it was asked with.
struct ScriptedAdvisor {
    script: Vec<Result<&'static str, &'static str>>,
    seen: Mutex<Vec<ChatTurn>>,
}

impl ScriptedAdvisor {
    fn new(script: Vec<Result<&'static str, &'static str>>) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    async fn complete(&self, _turns: Vec<ChatTurn>) -> Result<String, AdvisorError> {
        Err(AdvisorError::NotConfigured)
    }

    async fn stream(&self, turns: Vec<ChatTurn>) -> Result<TokenStream, AdvisorError> {
        *self.seen.lock().unwrap() = turns;
        let items: Vec<Result<String, AdvisorError>> = self
            .script
            .iter()
            .map(|step| match step {
                Ok(token) => Ok(token.to_string()),
                Err(msg) => Err(AdvisorError::Upstream(msg.to_string())),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

fn turns() -> Vec<ChatTurn> {
    vec![
        ChatTurn::new(TurnRole::System, "prompt"),
        ChatTurn::new(TurnRole::User, "Comment irriguer le maïs ?"),
    ]
}

async fn drain(mut rx: mpsc::Receiver<RelayFrame>) -> Vec<RelayFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

#[tokio::test]
async fn tokens_are_forwarded_in_order_and_accumulated() {
    let advisor = ScriptedAdvisor::new(vec![Ok("Arrosez "), Ok("le "), Ok("matin.")]);
    let (tx, rx) = mpsc::channel(16);

    let reply = relay_tokens(&advisor, turns(), &tx).await;
    drop(tx);

    assert_eq!(reply.as_deref(), Some("Arrosez le matin."));
    let frames = drain(rx).await;
    assert_eq!(
        frames,
        vec![
            RelayFrame::Content { content: "Arrosez ".into() },
            RelayFrame::Content { content: "le ".into() },
            RelayFrame::Content { content: "matin.".into() },
        ]
    );
    assert_eq!(advisor.seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn upstream_failure_ends_with_an_error_frame_and_no_reply() {
    let advisor = ScriptedAdvisor::new(vec![Ok("Arr"), Err("rate limited"), Ok("never")]);
    let (tx, rx) = mpsc::channel(16);

    let reply = relay_tokens(&advisor, turns(), &tx).await;
    drop(tx);

    assert!(reply.is_none());
    let frames = drain(rx).await;
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[1], RelayFrame::Error { error } if error.contains("rate limited")));
}

#[tokio::test]
async fn relay_finishes_after_the_client_goes_away() {
    let advisor = ScriptedAdvisor::new(vec![Ok("Bonne "), Ok("récolte")]);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let reply = relay_tokens(&advisor, turns(), &tx).await;
    assert_eq!(reply.as_deref(), Some("Bonne récolte"));
}

#[tokio::test]
async fn unconfigured_advisor_reports_an_error_frame() {
    let (tx, rx) = mpsc::channel(4);
    let reply = relay_tokens(&agriconnect_api::advisor::DisabledAdvisor, turns(), &tx).await;
    drop(tx);

    assert!(reply.is_none());
    let frames = drain(rx).await;
    assert!(matches!(frames.as_slice(), [RelayFrame::Error { .. }]));
}

#[test]
fn frames_serialize_to_the_event_payloads() {
    let id = Uuid::nil();
    let content = serde_json::to_string(&RelayFrame::Content { content: "ok".into() }).unwrap();
    assert_eq!(content, r#"{"content":"ok"}"#);

    let done = serde_json::to_value(RelayFrame::Done {
        done: true,
        conversation_id: id,
    })
    .unwrap();
    assert_eq!(done["done"], true);
    assert_eq!(done["conversation_id"], id.to_string());

    let error = serde_json::to_string(&RelayFrame::Error { error: "boom".into() }).unwrap();
    assert_eq!(error, r#"{"error":"boom"}"#);
}
