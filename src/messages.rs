//! Messages exchanged with display surfaces, shared by every transport.

use crate::config::ConfigFile;
use crate::pomodoro::controller::TimerEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    ResetTimer,
    ToggleTimer,
    SettingsUpdated,
    RequestConfig,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    UpdateTimer(f64),
    EndTimer,
    SetTitle(String),
    Config(ConfigFile),
    Error(String),
}

impl From<&TimerEvent> for Event {
    fn from(event: &TimerEvent) -> Self {
        match event {
            TimerEvent::Progress(progress) => Event::UpdateTimer(*progress),
            TimerEvent::Title(title) => Event::SetTitle(title.clone()),
            TimerEvent::Ended(_) => Event::EndTimer,
        }
    }
}

/// A request plus, for `request-config`, where to send the answer.
#[derive(Debug)]
pub struct Inbound {
    pub request: Request,
    pub reply: Option<oneshot::Sender<ConfigFile>>,
}

impl Inbound {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            reply: None,
        }
    }
}

pub type RequestSender = mpsc::UnboundedSender<Inbound>;
pub type RequestReceiver = mpsc::UnboundedReceiver<Inbound>;
pub type EventSender = broadcast::Sender<Event>;

const EVENT_BUFFER: usize = 64;

pub fn create_request_channel() -> (RequestSender, RequestReceiver) {
    mpsc::unbounded_channel()
}

pub fn create_event_channel() -> EventSender {
    broadcast::channel(EVENT_BUFFER).0
}

/// Forwards controller events to every connected surface.
pub fn broadcast_listener(events: EventSender) -> impl FnMut(&TimerEvent) + Send {
    move |event: &TimerEvent| {
        // No subscribers is fine, nobody is looking.
        let _ = events.send(Event::from(event));
    }
}

/// Sends the request and, for `request-config`, waits for the answer.
pub async fn dispatch(requests: &RequestSender, request: Request) -> Option<Event> {
    if request != Request::RequestConfig {
        let _ = requests.send(Inbound::new(request));
        return None;
    }
    let (reply_tx, reply_rx) = oneshot::channel();
    requests
        .send(Inbound {
            request,
            reply: Some(reply_tx),
        })
        .ok()?;
    reply_rx.await.ok().map(Event::Config)
}
