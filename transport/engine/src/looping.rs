/*!
    Loop range handling.
*/

use transport_types::VideoPosition;

/**
    Loop controller state.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    /// No loop in effect.
    #[default]
    Idle,
    /// Loop set and seek issued, waiting for the first position update.
    Armed,
    /// Positions are checked against the loop-out point.
    Active,
}

/**
    Playback range in timeline frames.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRange {
    pub start: VideoPosition,
    pub end: VideoPosition,
    /// Wrap back to `start` forever instead of stopping at `end`.
    pub infinite: bool,
}

/**
    Transport command the engine should issue on behalf of the loop.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopAction {
    Seek(VideoPosition),
    Stop,
}

#[derive(Debug, Default)]
pub struct LoopController {
    state: LoopState,
    range: Option<LoopRange>,
    /// A wrap was issued and positions are still at or past the end.
    wrapping: bool,
}

impl LoopController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn range(&self) -> Option<LoopRange> {
        self.range
    }

    /// Install a range. The caller has already started playback and sought to `start`.
    pub fn arm(&mut self, range: LoopRange) {
        self.range = Some(range);
        self.state = LoopState::Armed;
        self.wrapping = false;
    }

    pub fn reset(&mut self) {
        self.range = None;
        self.state = LoopState::Idle;
        self.wrapping = false;
    }

    /**
        Feed a position-changed event. Returns the command to issue, if any.

        An infinite loop wraps once per pass: after a seek, positions at or
        past the end are ignored until one below the end is reported.
    */
    pub fn on_position(&mut self, position: VideoPosition) -> Option<LoopAction> {
        match (self.state, self.range) {
            (LoopState::Armed, Some(_)) => {
                self.state = LoopState::Active;
                None
            }
            (LoopState::Active, Some(range)) if position >= range.end => {
                if !range.infinite {
                    self.reset();
                    Some(LoopAction::Stop)
                } else if self.wrapping {
                    None
                } else {
                    self.wrapping = true;
                    Some(LoopAction::Seek(range.start))
                }
            }
            (LoopState::Active, Some(_)) => {
                self.wrapping = false;
                None
            }
            _ => {
                self.reset();
                None
            }
        }
    }
}
