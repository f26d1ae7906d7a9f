//! Hover tooltip as an explicit two-state machine.
//!
//! `Hidden` -> `Visible` on pointer enter, `Visible` -> `Visible` on every move
//! (content is rebuilt from the hovered region each time), `Visible` -> `Hidden`
//! on leave. Regions without statistics never cause a transition.

use crate::types::{Color, JoinedRegion, RegionAttributes, RegionId};
use serde::Serialize;
use std::time::Duration;

/// Tooltip placement relative to the cursor.
pub const CURSOR_OFFSET: (f64, f64) = (15.0, -20.0);
pub const VISIBLE_OPACITY: f64 = 0.95;
pub const FADE_DURATION: Duration = Duration::from_millis(150);
/// Stroke of the hovered region.
pub const HIGHLIGHT_STROKE: Color = Color::rgb(0xca, 0xa7, 0x91);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn offset_from_cursor(cursor: Position) -> Self {
        Self::new(cursor.x + CURSOR_OFFSET.0, cursor.y + CURSOR_OFFSET.1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TooltipState {
    Hidden,
    Visible { region: RegionId, position: Position },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipContent {
    pub lines: [String; 2],
    pub value: f64,
    pub border_color: Color,
}

impl TooltipContent {
    fn from_attributes(attributes: &RegionAttributes) -> Self {
        Self {
            lines: [
                format!("{} — {}", attributes.label, attributes.group_label),
                format!("{}%", attributes.value),
            ],
            value: attributes.value,
            border_color: attributes.color,
        }
    }
}

/// A timed opacity transition. Started and forgotten; never awaited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub target_opacity: f64,
    pub duration: Duration,
}

impl Fade {
    const IN: Fade = Fade {
        target_opacity: VISIBLE_OPACITY,
        duration: FADE_DURATION,
    };
    const OUT: Fade = Fade {
        target_opacity: 0.0,
        duration: FADE_DURATION,
    };
}

/// What the page needs to draw the tooltip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipView {
    pub visible: bool,
    pub opacity: f64,
    pub fade_ms: u64,
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub content: Option<TooltipContent>,
    pub highlight: Option<RegionId>,
    pub highlight_stroke: Color,
}

#[derive(Debug, Clone)]
pub struct TooltipController {
    state: TooltipState,
    // kept after leave; stale until the next enter
    content: Option<TooltipContent>,
    fade: Fade,
}

impl Default for TooltipController {
    fn default() -> Self {
        Self::new()
    }
}

impl TooltipController {
    pub fn new() -> Self {
        Self {
            state: TooltipState::Hidden,
            content: None,
            fade: Fade {
                target_opacity: 0.0,
                duration: Duration::ZERO,
            },
        }
    }

    pub fn state(&self) -> &TooltipState {
        &self.state
    }

    pub fn content(&self) -> Option<&TooltipContent> {
        self.content.as_ref()
    }

    pub fn fade(&self) -> Fade {
        self.fade
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, TooltipState::Visible { .. })
    }

    /// Returns whether a transition happened.
    pub fn pointer_enter(&mut self, region: &JoinedRegion, cursor: Position) -> bool {
        let (Some(id), Some(attributes)) = (&region.id, &region.attributes) else {
            return false;
        };
        if !self.is_visible() {
            self.fade = Fade::IN;
        }
        self.show(id, attributes, cursor)
    }

    pub fn pointer_move(&mut self, region: &JoinedRegion, cursor: Position) -> bool {
        if !self.is_visible() {
            return false;
        }
        let (Some(id), Some(attributes)) = (&region.id, &region.attributes) else {
            return false;
        };
        self.show(id, attributes, cursor)
    }

    pub fn pointer_leave(&mut self) -> bool {
        if !self.is_visible() {
            return false;
        }
        self.state = TooltipState::Hidden;
        self.fade = Fade::OUT;
        true
    }

    fn show(&mut self, id: &RegionId, attributes: &RegionAttributes, cursor: Position) -> bool {
        self.content = Some(TooltipContent::from_attributes(attributes));
        self.state = TooltipState::Visible {
            region: id.clone(),
            position: Position::offset_from_cursor(cursor),
        };
        true
    }

    pub fn view(&self) -> TooltipView {
        let (position, highlight) = match &self.state {
            TooltipState::Visible { region, position } => (Some(*position), Some(region.clone())),
            TooltipState::Hidden => (None, None),
        };
        TooltipView {
            visible: self.is_visible(),
            opacity: self.fade.target_opacity,
            fade_ms: self.fade.duration.as_millis() as u64,
            left: position.map(|p| p.x),
            top: position.map(|p| p.y),
            content: self.content.clone(),
            highlight,
            highlight_stroke: HIGHLIGHT_STROKE,
        }
    }
}
