use crate::error::SnapshotError;
use crate::message::{ClientMessage, ServerMessage};
use crate::surface::Surface;
use crate::tool::{Tool, ToolSettings};
use crate::undo_history::UndoHistory;
use crate::{Point, Snapshot};

/// What the pointer is currently doing. Leaving any active state is a commit.
#[derive(Debug)]
pub enum Interaction {
    Idle,
    Drawing {
        last: Point,
    },
    /// Rectangle/ellipse preview: every move repaints `base` plus the shape.
    Shaping {
        tool: Tool,
        origin: Point,
        base: Snapshot,
    },
}

/// Outcome of an inbound update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RemoteUpdate {
    Applied,
    /// Dropped because a local interaction is in progress; its commit supersedes the update.
    Ignored,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Link {
    Offline,
    /// Waiting for `Init`. `resynced` means offline edits were just pushed and
    /// the relay's copy is older than ours.
    Joining { resynced: bool },
    Online,
}

/// One participant's editing session.
///
/// Local edits are rendered on `surface`, snapshotted when the interaction ends,
/// pushed onto the undo history and returned as the [`ClientMessage`] to send.
/// Operations that return `None` have nothing to send, either because nothing
/// changed or because the participant is offline; offline edits are kept and
/// pushed by [`ParticipantSession::connected`].
pub struct ParticipantSession<S: Surface> {
    surface: S,
    settings: ToolSettings,
    interaction: Interaction,
    history: UndoHistory,
    link: Link,
    unsent: Option<Snapshot>,
}

impl<S: Surface> ParticipantSession<S> {
    pub fn new(surface: S) -> Self {
        Self::with_history(surface, UndoHistory::default())
    }

    pub fn with_history(surface: S, history: UndoHistory) -> Self {
        Self {
            surface,
            settings: ToolSettings::default(),
            interaction: Interaction::Idle,
            history,
            link: Link::Offline,
            unsent: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ToolSettings {
        &mut self.settings
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn is_interacting(&self) -> bool {
        !matches!(self.interaction, Interaction::Idle)
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn is_online(&self) -> bool {
        self.link != Link::Offline
    }

    pub fn pointer_down(&mut self, at: Point) {
        if self.is_interacting() {
            return;
        }
        self.interaction = match self.settings.tool {
            Tool::Freehand | Tool::Eraser => Interaction::Drawing { last: at },
            tool @ Tool::Rectangle | tool @ Tool::Ellipse => match self.capture() {
                Some(base) => Interaction::Shaping {
                    tool,
                    origin: at,
                    base,
                },
                None => Interaction::Idle,
            },
            Tool::Text => Interaction::Idle,
        };
    }

    pub fn pointer_move(&mut self, at: Point) {
        let brush = self.settings.brush();
        match &mut self.interaction {
            Interaction::Idle => {}
            Interaction::Drawing { last } => {
                self.surface.stroke(*last, at, &brush);
                *last = at;
            }
            Interaction::Shaping { tool, origin, base } => {
                if let Err(err) = self.surface.restore(base) {
                    log::warn!("Cannot repaint shape preview: {}", err);
                    return;
                }
                match tool {
                    Tool::Rectangle => self.surface.rectangle(*origin, at, &brush),
                    _ => self.surface.ellipse(*origin, at, &brush),
                }
            }
        }
    }

    pub fn pointer_up(&mut self) -> Option<ClientMessage> {
        if !self.is_interacting() {
            return None;
        }
        self.interaction = Interaction::Idle;
        self.commit()
    }

    /// Stamps the pending text at `at`. Only the text tool with a non-blank buffer reacts.
    ///
    /// The surface as it was before the stamp goes onto the history, so undo removes the text.
    pub fn click(&mut self, at: Point) -> Option<ClientMessage> {
        if self.settings.tool != Tool::Text
            || self.settings.text.trim().is_empty()
            || self.is_interacting()
        {
            return None;
        }
        let before = self.capture()?;
        let brush = self.settings.brush();
        let text = std::mem::take(&mut self.settings.text);
        self.surface.text(at, &text, &brush);
        let after = self.capture()?;
        self.history.push(before);
        self.publish(after)
    }

    /// Clears this participant's own surface and publishes the empty surface as a
    /// regular snapshot. Needs no authority. An unfinished shape preview is dropped
    /// first and never reaches the history.
    pub fn commit_local_clear(&mut self) -> Option<ClientMessage> {
        let interaction = std::mem::replace(&mut self.interaction, Interaction::Idle);
        if let Interaction::Shaping { base, .. } = interaction {
            if let Err(err) = self.surface.restore(&base) {
                log::warn!("Cannot drop shape preview: {}", err);
            }
        }
        if let Some(before) = self.capture() {
            self.history.push(before);
        }
        self.surface.clear();
        let empty = self.capture()?;
        self.publish(empty)
    }

    /// Follows the page size. Content is kept anchored at the top-left corner; nothing is sent.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    /// Restores the newest history entry and republishes it as a regular snapshot.
    pub fn undo(&mut self) -> Option<ClientMessage> {
        let snapshot = self.history.pop()?;
        self.interaction = Interaction::Idle;
        if let Err(err) = self.surface.restore(&snapshot) {
            log::warn!("Cannot restore undo entry: {}", err);
            self.history.push(snapshot);
            return None;
        }
        self.publish(snapshot)
    }

    pub fn apply_remote_snapshot(
        &mut self,
        snapshot: &Snapshot,
    ) -> Result<RemoteUpdate, SnapshotError> {
        if self.is_interacting() {
            log::debug!("Ignoring remote snapshot during local interaction");
            return Ok(RemoteUpdate::Ignored);
        }
        if let Err(err) = self.surface.restore(snapshot) {
            log::warn!("Dropping undecodable snapshot: {}", err);
            return Err(err);
        }
        Ok(RemoteUpdate::Applied)
    }

    /// Empties the surface. The undo history is left alone.
    pub fn apply_remote_clear(&mut self) {
        self.surface.clear();
        if let Interaction::Shaping { .. } = self.interaction {
            if let Some(empty) = self.capture() {
                if let Interaction::Shaping { base, .. } = &mut self.interaction {
                    *base = empty;
                }
            }
        }
    }

    pub fn request_clear_authority(&mut self) -> Option<ClientMessage> {
        self.send_control(ClientMessage::RegisterAuthority)
    }

    pub fn request_global_clear(&mut self) -> Option<ClientMessage> {
        self.send_control(ClientMessage::ClearRequest)
    }

    /// The channel is up. Returns the snapshot to push if edits were made offline.
    pub fn connected(&mut self) -> Option<ClientMessage> {
        let unsent = self.unsent.take();
        self.link = Link::Joining {
            resynced: unsent.is_some(),
        };
        unsent.map(ClientMessage::Snapshot)
    }

    pub fn disconnected(&mut self) {
        self.link = Link::Offline;
    }

    pub fn handle_server_message(
        &mut self,
        message: ServerMessage,
    ) -> Result<RemoteUpdate, SnapshotError> {
        match message {
            ServerMessage::Init(snapshot) => {
                let resynced = self.link == (Link::Joining { resynced: true });
                self.link = Link::Online;
                if resynced {
                    log::info!("Keeping offline edits over the relay's surface");
                    return Ok(RemoteUpdate::Ignored);
                }
                match snapshot {
                    Some(snapshot) => self.apply_remote_snapshot(&snapshot),
                    None if self.is_interacting() => Ok(RemoteUpdate::Ignored),
                    None => {
                        self.surface.clear();
                        Ok(RemoteUpdate::Applied)
                    }
                }
            }
            ServerMessage::Snapshot(snapshot) => self.apply_remote_snapshot(&snapshot),
            ServerMessage::ClearApplied => {
                self.apply_remote_clear();
                Ok(RemoteUpdate::Applied)
            }
        }
    }

    fn commit(&mut self) -> Option<ClientMessage> {
        let snapshot = self.capture()?;
        self.history.push(snapshot.clone());
        self.publish(snapshot)
    }

    fn capture(&self) -> Option<Snapshot> {
        match self.surface.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log::error!("Cannot snapshot surface: {}", err);
                None
            }
        }
    }

    fn publish(&mut self, snapshot: Snapshot) -> Option<ClientMessage> {
        if self.link == Link::Offline {
            self.unsent = Some(snapshot);
            None
        } else {
            Some(ClientMessage::Snapshot(snapshot))
        }
    }

    fn send_control(&self, message: ClientMessage) -> Option<ClientMessage> {
        if self.link == Link::Offline {
            log::debug!("Offline, dropping {:?}", message);
            None
        } else {
            Some(message)
        }
    }
}
