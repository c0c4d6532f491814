//! The chat widget: message log, open/closed state and the send cycle.
//!
//! Per send the widget moves `Idle → Sending → Idle`; while sending, any
//! further send request is dropped. Completion (success or failure) always
//! returns it to idle.

use futures_channel::oneshot;

use crate::config::{WidgetConfig, WidgetOptions};
use crate::message::{ContextMessage, Message, Role};
use crate::transport::{ChatRequest, ChatTransport, Outbound};
use crate::view::{self, ViewModel, WidgetEvent};

pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again later.";

pub struct ChatWidget {
    config: WidgetConfig,
    transport: Box<dyn ChatTransport>,
    messages: Vec<Message>,
    is_open: bool,
    is_loading: bool,
    draft: String,
    focus_input: bool,
    scroll_to_latest: bool,
    in_flight: Option<oneshot::Receiver<anyhow::Result<String>>>,
}

impl std::fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWidget")
            .field("messages", &self.messages.len())
            .field("is_open", &self.is_open)
            .field("is_loading", &self.is_loading)
            .finish_non_exhaustive()
    }
}

impl ChatWidget {
    /// Builds a widget from host options.
    ///
    /// A missing API key aborts construction: the error is logged and
    /// returned, and no widget exists to be drawn.
    pub fn new(options: WidgetOptions, transport: Box<dyn ChatTransport>) -> anyhow::Result<Self> {
        let config = WidgetConfig::from_options(options).inspect_err(|e| log::error!("{e:#}"))?;
        Ok(Self::with_config(config, transport))
    }

    pub fn with_config(config: WidgetConfig, transport: Box<dyn ChatTransport>) -> Self {
        let greeting = config.initial_message.clone();
        let mut widget = Self {
            config,
            transport,
            messages: Vec::new(),
            is_open: false,
            is_loading: false,
            draft: String::new(),
            focus_input: false,
            scroll_to_latest: false,
            in_flight: None,
        };
        if let Some(text) = greeting {
            widget.add_message(Role::Assistant, text);
        }
        widget
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Flips visibility, or forces it when `force` is given.
    pub fn toggle_widget(&mut self, force: Option<bool>) {
        self.is_open = force.unwrap_or(!self.is_open);
        if self.is_open {
            self.focus_input = true;
        }
    }

    /// Appends to the log and asks the view to scroll to it.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
        self.scroll_to_latest = true;
    }

    /// Sends the current draft, unless it is blank or a reply is pending.
    pub fn send_message(&mut self) {
        let question = self.draft.trim().to_owned();
        if question.is_empty() || self.is_loading {
            return;
        }

        self.draft.clear();
        self.add_message(Role::User, question.clone());
        self.is_loading = true;

        let outbound = Outbound {
            endpoint: self.config.api_endpoint.clone(),
            api_key: self.config.api_key.clone(),
            body: ChatRequest {
                question,
                previous_messages: previous_messages(&self.messages, self.config.history_window),
            },
        };
        log::debug!(
            "sending question with {} prior turns",
            outbound.body.previous_messages.len()
        );

        let (tx, rx) = oneshot::channel();
        self.in_flight = Some(rx);
        self.transport.dispatch(outbound, tx);
    }

    /// Checks the pending request, if any, and completes the turn once the
    /// transport has answered. Called once per frame.
    pub fn poll_reply(&mut self) {
        let Some(rx) = self.in_flight.as_mut() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(None) => return,
            Ok(Some(result)) => result,
            Err(oneshot::Canceled) => Err(anyhow::anyhow!("transport dropped the request")),
        };
        self.in_flight = None;
        self.complete_send(result);
    }

    /// Records the outcome of the in-flight send and returns to idle.
    pub fn complete_send(&mut self, result: anyhow::Result<String>) {
        match result {
            Ok(reply) => self.add_message(Role::Assistant, reply),
            Err(e) => {
                log::error!("Error sending message: {e:#}");
                self.add_message(Role::Assistant, APOLOGY);
            }
        }
        self.is_loading = false;
    }

    pub fn handle(&mut self, event: WidgetEvent) {
        match event {
            WidgetEvent::Toggle(force) => self.toggle_widget(force),
            WidgetEvent::Send => self.send_message(),
        }
    }

    /// Polls the network, draws one frame and applies what the user did.
    pub fn show(&mut self, ctx: &egui::Context) {
        self.poll_reply();

        let model = ViewModel {
            config: &self.config,
            messages: &self.messages,
            is_open: self.is_open,
            is_loading: self.is_loading,
            focus_input: self.focus_input,
            scroll_to_latest: self.scroll_to_latest,
        };
        let events = view::render(ctx, &model, &mut self.draft);

        // one-shot requests are honoured by the frame that saw them
        if self.is_open {
            self.focus_input = false;
            self.scroll_to_latest = false;
        }
        for event in events {
            self.handle(event);
        }
    }
}

/// Prior turns sent alongside a question.
///
/// Takes the last `window` log entries and drops the newest, which is the
/// question itself. The loading indicator is never in the log, so there
/// is nothing transient to filter.
pub fn previous_messages(log: &[Message], window: usize) -> Vec<ContextMessage> {
    let start = log.len().saturating_sub(window);
    let mut context: Vec<ContextMessage> = log[start..].iter().map(ContextMessage::from).collect();
    context.pop();
    context
}

/// Hosts the widget as a full eframe app over a transparent canvas.
pub struct ChatWidgetApp {
    widget: ChatWidget,
}

impl ChatWidgetApp {
    pub fn new(widget: ChatWidget) -> Self {
        Self { widget }
    }
}

impl eframe::App for ChatWidgetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.widget.show(ctx);
        if self.widget.is_loading() {
            ctx.request_repaint();
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }
}
