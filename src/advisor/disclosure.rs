//! Progressive disclosure for zone cards
//!
//! A card animates between collapsed and expanded. The "Click to expand" hint
//! disappears on every toggle and only returns once the collapse animation
//! window has passed; that delay is modelled as a cancelable timer effect so
//! the machine stays deterministic without a rendering layer.

use std::time::Duration;

use serde::Serialize;

/// Length of the collapse animation; the hint returns after it
pub const HINT_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CardPhase {
    #[default]
    Collapsed,
    Expanding,
    Expanded,
    Collapsing,
}

impl CardPhase {
    /// Whether the card is open or opening
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, CardPhase::Expanding | CardPhase::Expanded)
    }
}

/// Identifier of a scheduled hint timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimerId(pub u64);

/// Source of timer ids, shared by every card of a view so an id is never
/// reused after the cards are rebuilt
#[derive(Debug, Clone, Default)]
pub struct TimerSequence {
    next: u64,
}

impl TimerSequence {
    pub fn next_id(&mut self) -> TimerId {
        let id = TimerId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEvent {
    /// User tapped the card header
    Toggle,
    /// The expand/collapse animation completed
    AnimationFinished,
    /// User tapped "more"/"less" on the description
    ToggleDescription,
    /// A previously scheduled hint timer elapsed
    HintTimerFired(TimerId),
}

/// Side effects the host must carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEffect {
    ScheduleHint { timer: TimerId, delay: Duration },
    CancelTimer(TimerId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneCard {
    phase: CardPhase,
    description_expanded: bool,
    hint_visible: bool,
    /// Bumped whenever the hint is re-shown so it animates in again
    hint_key: u64,
    pending_timer: Option<TimerId>,
}

impl Default for ZoneCard {
    fn default() -> Self {
        Self {
            phase: CardPhase::Collapsed,
            description_expanded: false,
            hint_visible: true,
            hint_key: 0,
            pending_timer: None,
        }
    }
}

impl ZoneCard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> CardPhase {
        self.phase
    }

    #[must_use]
    pub fn description_expanded(&self) -> bool {
        self.description_expanded
    }

    #[must_use]
    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }

    #[must_use]
    pub fn hint_key(&self) -> u64 {
        self.hint_key
    }

    #[must_use]
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    /// Apply `event`, returning the timer effects to run. New hint timers take
    /// their ids from `timers`.
    pub fn update(&mut self, event: CardEvent, timers: &mut TimerSequence) -> Vec<CardEffect> {
        match event {
            CardEvent::Toggle => self.toggle(timers),
            CardEvent::AnimationFinished => {
                self.phase = match self.phase {
                    CardPhase::Expanding => CardPhase::Expanded,
                    CardPhase::Collapsing => CardPhase::Collapsed,
                    settled => settled,
                };
                Vec::new()
            }
            CardEvent::ToggleDescription => {
                if self.phase.is_open() {
                    self.description_expanded = !self.description_expanded;
                }
                Vec::new()
            }
            CardEvent::HintTimerFired(timer) => {
                if self.pending_timer == Some(timer) && !self.phase.is_open() {
                    self.pending_timer = None;
                    self.hint_visible = true;
                    self.hint_key += 1;
                }
                Vec::new()
            }
        }
    }

    fn toggle(&mut self, timers: &mut TimerSequence) -> Vec<CardEffect> {
        let mut effects = Vec::new();
        if let Some(timer) = self.pending_timer.take() {
            effects.push(CardEffect::CancelTimer(timer));
        }

        self.hint_visible = false;
        self.description_expanded = false;

        if self.phase.is_open() {
            self.phase = CardPhase::Collapsing;
            let timer = timers.next_id();
            self.pending_timer = Some(timer);
            effects.push(CardEffect::ScheduleHint {
                timer,
                delay: HINT_DELAY,
            });
        } else {
            self.phase = CardPhase::Expanding;
        }

        effects
    }
}
