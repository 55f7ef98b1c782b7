mod utils;

use wasm_bindgen::prelude::*;
use whiteboard_system::euclid::default::Point2D;
use whiteboard_system::{
    clamp_stroke_width, ClientMessage, Color, ParticipantSession, Raster, RemoteUpdate,
    ServerMessage, Tool, UndoHistory,
};

/// One participant's drawing surface for the browser.
///
/// The page owns the WebSocket and the `<canvas>`: every method that returns
/// bytes hands back a message for the socket, and `pixels()` is what to paint.
#[wasm_bindgen]
pub struct WhiteboardClient {
    session: ParticipantSession<Raster>,
}

#[wasm_bindgen]
impl WhiteboardClient {
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, undo_limit: usize) -> Self {
        utils::set_panic_hook();

        WhiteboardClient {
            session: ParticipantSession::with_history(
                Raster::new(width, height),
                UndoHistory::new(undo_limit),
            ),
        }
    }

    /// Follows the `<canvas>` size, keeping the drawing and the undo history.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.session.resize(width, height);
    }

    pub fn width(&self) -> u32 {
        self.session.surface().width()
    }

    pub fn height(&self) -> u32 {
        self.session.surface().height()
    }

    /// RGBA bytes for an `ImageData` of `width() x height()`.
    pub fn pixels(&self) -> Vec<u8> {
        self.session.surface().to_rgba_bytes()
    }

    pub fn can_undo(&self) -> bool {
        !self.session.history().is_empty()
    }

    pub fn set_tool(&mut self, name: &str) -> Result<(), JsValue> {
        let tool = name
            .parse::<Tool>()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        self.session.settings_mut().tool = tool;
        Ok(())
    }

    pub fn set_color(&mut self, hex: &str) -> Result<(), JsValue> {
        let color = hex
            .parse::<Color>()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        self.session.settings_mut().color = color;
        Ok(())
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.session.settings_mut().stroke_width = clamp_stroke_width(width);
    }

    pub fn set_text(&mut self, text: String) {
        self.session.settings_mut().text = text;
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.session.pointer_down(Point2D::new(x, y));
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.session.pointer_move(Point2D::new(x, y));
    }

    pub fn pointer_up(&mut self) -> Option<Vec<u8>> {
        outgoing(self.session.pointer_up())
    }

    pub fn click(&mut self, x: f32, y: f32) -> Option<Vec<u8>> {
        outgoing(self.session.click(Point2D::new(x, y)))
    }

    pub fn undo(&mut self) -> Option<Vec<u8>> {
        outgoing(self.session.undo())
    }

    pub fn clear(&mut self) -> Option<Vec<u8>> {
        outgoing(self.session.commit_local_clear())
    }

    pub fn request_clear_authority(&mut self) -> Option<Vec<u8>> {
        outgoing(self.session.request_clear_authority())
    }

    pub fn request_global_clear(&mut self) -> Option<Vec<u8>> {
        outgoing(self.session.request_global_clear())
    }

    /// Call when the socket opens. Returns edits made while offline, if any.
    pub fn connected(&mut self) -> Option<Vec<u8>> {
        outgoing(self.session.connected())
    }

    pub fn disconnected(&mut self) {
        self.session.disconnected();
    }

    /// Applies one binary frame from the relay. Returns whether the surface changed.
    /// Undecodable frames are reported as errors and leave the surface as it was.
    pub fn handle_message(&mut self, bytes: &[u8]) -> Result<bool, JsValue> {
        let message =
            ServerMessage::decode(bytes).map_err(|err| JsValue::from_str(&err.to_string()))?;
        self.session
            .handle_server_message(message)
            .map(|update| update == RemoteUpdate::Applied)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }
}

fn outgoing(message: Option<ClientMessage>) -> Option<Vec<u8>> {
    message.and_then(|message| match message.encode() {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log::error!("Cannot encode {:?}: {}", message, err);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use whiteboard_system::Snapshot;

    #[test]
    fn it_returns_wire_bytes_for_commits() {
        let mut client = WhiteboardClient::new(16, 16, 10);
        assert!(client.connected().is_none());
        client.pointer_down(1.0, 1.0);
        client.pointer_move(12.0, 1.0);

        let bytes = client.pointer_up().expect("");
        assert!(matches!(
            ClientMessage::decode(&bytes).expect(""),
            ClientMessage::Snapshot(_)
        ));
        assert!(client.can_undo());
        assert_eq!(client.pixels().len(), 16 * 16 * 4);
    }

    #[test]
    fn it_paints_relay_snapshots() {
        let mut client = WhiteboardClient::new(2, 1, 10);
        let snapshot = Snapshot::encode(2, 1, &[Color::WHITE, Color::BLACK]).expect("");
        let frame = ServerMessage::Init(Some(snapshot)).encode().expect("");

        assert!(client.handle_message(&frame).expect(""));
        assert_eq!(client.pixels(), vec![255, 255, 255, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn it_keeps_the_drawing_when_resized() {
        let mut client = WhiteboardClient::new(16, 16, 10);
        client.pointer_down(0.0, 2.0);
        client.pointer_move(15.0, 2.0);
        client.pointer_up();

        client.resize(32, 4);
        assert_eq!((client.width(), client.height()), (32, 4));
        assert_eq!(client.pixels().len(), 32 * 4 * 4);
        // pixel (8, 2) is still black
        let at = (2 * 32 + 8) * 4;
        assert_eq!(&client.pixels()[at..at + 4], &[0, 0, 0, 255]);
        assert!(client.can_undo());
    }

    #[test]
    fn it_bounds_line_width() {
        let mut client = WhiteboardClient::new(4, 4, 10);
        client.set_line_width(1.0e5);
        assert_eq!(
            client.session.settings().stroke_width,
            whiteboard_system::MAX_STROKE_WIDTH
        );
        client.set_line_width(0.0);
        assert_eq!(client.session.settings().stroke_width, 1.0);
    }
}
