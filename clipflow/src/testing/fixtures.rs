//! Canned provider responses and test configuration.

use super::ScriptedTransport;
use crate::config::{
    ApiKey, ClipflowConfig, Credentials, PollingConfig, QueueEndpointConfig, TextConfig, VideoConfig,
};
use crate::core::VideoIdea;
use crate::providers::HttpReply;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Chat-completions URL used by [`test_config`].
pub const TEXT_URL: &str = "https://text.test/v1/chat/completions";
/// Video submission URL.
pub const VIDEO_SUBMIT_URL: &str = "https://video.test/t2v";
/// Video status template.
pub const VIDEO_STATUS_TEMPLATE: &str = "https://video.test/predictions/{id}/result";
/// Audio submission URL.
pub const AUDIO_SUBMIT_URL: &str = "https://queue.test/audio";
/// Audio status template.
pub const AUDIO_STATUS_TEMPLATE: &str = "https://queue.test/audio/requests/{id}/status";
/// Composition submission URL.
pub const COMPOSE_SUBMIT_URL: &str = "https://queue.test/compose";
/// Composition status template.
pub const COMPOSE_STATUS_TEMPLATE: &str = "https://queue.test/compose/requests/{id}/status";

/// The idea used throughout the tests.
#[must_use]
pub fn idea() -> VideoIdea {
    VideoIdea {
        caption: "Slicing a ruby apple \u{1f34e} #asmr #satisfying".to_string(),
        idea: "Ruby shaped like an apple sliced in half".to_string(),
        environment: "Black marble table, macro close-up, soft rim light".to_string(),
        sound: "Crisp crystalline crunch with a soft ring".to_string(),
        status: "for production".to_string(),
    }
}

/// [`idea`] as the model would answer: a one-element JSON array.
#[must_use]
pub fn idea_json() -> String {
    let idea = idea();
    json!([{
        "Caption": idea.caption,
        "Idea": idea.idea,
        "Environment": idea.environment,
        "Sound": idea.sound,
        "Status": idea.status,
    }])
    .to_string()
}

/// A scripting answer with `count` scenes named "Scene description N".
#[must_use]
pub fn scenes_text(count: usize) -> String {
    let idea = idea();
    let mut text = format!(
        "Idea: \"{}\"\nEnvironment: \"{}\"\nSound: \"{}\"\n\n",
        idea.idea, idea.environment, idea.sound
    );
    for n in 1..=count {
        text.push_str(&format!("Scene {n}: \"Scene description {n}\"\n"));
    }
    text
}

/// A chat-completions envelope around `content`.
#[must_use]
pub fn completion(content: &str) -> HttpReply {
    HttpReply::ok(json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

/// Starts a server on a loopback port that accepts connections and never
/// answers. Returns its base URL; abort the handle to stop it.
pub async fn silent_server() -> std::io::Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    Ok((url, handle))
}

/// Status URL of video task `id`.
#[must_use]
pub fn video_status_url(id: &str) -> String {
    VIDEO_STATUS_TEMPLATE.replace("{id}", id)
}

/// Status URL of audio task `id`.
#[must_use]
pub fn audio_status_url(id: &str) -> String {
    AUDIO_STATUS_TEMPLATE.replace("{id}", id)
}

/// Status URL of composition task `id`.
#[must_use]
pub fn compose_status_url(id: &str) -> String {
    COMPOSE_STATUS_TEMPLATE.replace("{id}", id)
}

/// Scripts a clip that is accepted as `id`, polls once as processing, then
/// completes with `url`.
pub fn script_clip(transport: &ScriptedTransport, id: &str, url: &str) {
    transport.on_post(VIDEO_SUBMIT_URL, HttpReply::ok(json!({"code": 200, "data": {"id": id, "status": "created"}})));
    let status = video_status_url(id);
    transport.on_get(&status, HttpReply::ok(json!({"data": {"id": id, "status": "processing"}})));
    transport.on_get(
        &status,
        HttpReply::ok(json!({"data": {"id": id, "status": "completed", "outputs": [url]}})),
    );
}

/// Scripts a sound accepted as `id` that completes with `url` inline.
pub fn script_audio(transport: &ScriptedTransport, id: &str, url: &str) {
    transport.on_post(AUDIO_SUBMIT_URL, HttpReply::ok(json!({"request_id": id, "status": "IN_QUEUE"})));
    let status = audio_status_url(id);
    transport.on_get(&status, HttpReply::new(400, json!({"detail": "Request is still in progress"})));
    transport.on_get(&status, HttpReply::ok(json!({"status": "COMPLETED", "video": {"url": url}})));
}

/// Scripts a composition accepted as `id` whose result sits behind a
/// follow-up URL.
pub fn script_composition(transport: &ScriptedTransport, id: &str, url: &str) {
    transport.on_post(COMPOSE_SUBMIT_URL, HttpReply::ok(json!({"request_id": id})));
    let result_url = format!("https://queue.test/compose/requests/{id}");
    transport.on_get(&compose_status_url(id), HttpReply::ok(json!({"status": "IN_PROGRESS"})));
    transport.on_get(
        &compose_status_url(id),
        HttpReply::ok(json!({"status": "COMPLETED", "response_url": result_url})),
    );
    transport.on_get(&result_url, HttpReply::ok(json!({"video_url": url})));
}

/// Placeholder keys for every provider.
#[must_use]
pub fn credentials() -> Credentials {
    Credentials {
        openai: ApiKey::new("sk-test"),
        wavespeed: ApiKey::new("ws-test"),
        fal: ApiKey::new("fal-test"),
    }
}

/// Configuration pointing every provider at the URLs above.
#[must_use]
pub fn test_config() -> ClipflowConfig {
    ClipflowConfig {
        text: TextConfig {
            endpoint: TEXT_URL.to_string(),
            ..TextConfig::default()
        },
        video: VideoConfig {
            submit_url: VIDEO_SUBMIT_URL.to_string(),
            status_url_template: VIDEO_STATUS_TEMPLATE.to_string(),
            ..VideoConfig::default()
        },
        audio: QueueEndpointConfig {
            submit_url: AUDIO_SUBMIT_URL.to_string(),
            status_url_template: AUDIO_STATUS_TEMPLATE.to_string(),
        },
        composition: QueueEndpointConfig {
            submit_url: COMPOSE_SUBMIT_URL.to_string(),
            status_url_template: COMPOSE_STATUS_TEMPLATE.to_string(),
        },
        polling: PollingConfig::default(),
        ..ClipflowConfig::default()
    }
}
