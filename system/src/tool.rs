use crate::error::InvalidTool;
use crate::surface::Brush;
use crate::Color;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Widest brush a participant can paint with. Text is sized from the width too.
pub const MAX_STROKE_WIDTH: f32 = 200.0;

/// Maps any requested width into `1..=MAX_STROKE_WIDTH`; non-finite input falls back to 1.
pub fn clamp_stroke_width(width: f32) -> f32 {
    if width.is_finite() {
        width.clamp(1.0, MAX_STROKE_WIDTH)
    } else {
        1.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    Freehand,
    Rectangle,
    Ellipse,
    Text,
    Eraser,
}

impl FromStr for Tool {
    type Err = InvalidTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draw" | "freehand" => Ok(Tool::Freehand),
            "rectangle" => Ok(Tool::Rectangle),
            "circle" | "ellipse" => Ok(Tool::Ellipse),
            "text" => Ok(Tool::Text),
            "eraser" => Ok(Tool::Eraser),
            _ => Err(InvalidTool(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    pub tool: Tool,
    pub stroke_width: f32,
    pub color: Color,
    pub text: String,
}

impl ToolSettings {
    /// The eraser paints opaque white regardless of the selected color.
    pub fn brush(&self) -> Brush {
        Brush {
            color: match self.tool {
                Tool::Eraser => Color::WHITE,
                _ => self.color,
            },
            width: clamp_stroke_width(self.stroke_width),
        }
    }
}

impl std::default::Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Freehand,
            stroke_width: 2.0,
            color: Color::BLACK,
            text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_toolbar_names() {
        assert_eq!("draw".parse::<Tool>(), Ok(Tool::Freehand));
        assert_eq!("circle".parse::<Tool>(), Ok(Tool::Ellipse));
        assert_eq!("eraser".parse::<Tool>(), Ok(Tool::Eraser));
        assert!("lasso".parse::<Tool>().is_err());
    }

    #[test]
    fn it_erases_in_white() {
        let mut settings = ToolSettings {
            color: Color::rgb(10, 20, 30),
            ..ToolSettings::default()
        };
        assert_eq!(settings.brush().color, Color::rgb(10, 20, 30));
        settings.tool = Tool::Eraser;
        assert_eq!(settings.brush().color, Color::WHITE);
    }

    #[test]
    fn it_bounds_brush_width() {
        let mut settings = ToolSettings::default();
        settings.stroke_width = 1.0e9;
        assert_eq!(settings.brush().width, MAX_STROKE_WIDTH);
        settings.stroke_width = -3.0;
        assert_eq!(settings.brush().width, 1.0);
        settings.stroke_width = f32::NAN;
        assert_eq!(settings.brush().width, 1.0);
    }
}
