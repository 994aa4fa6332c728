//! Cell visuals and the deferred-completion animation contract.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use hexink_core::{CellId, GridPosition, LayerKind, WorldPoint};

use crate::behavior::CellBehavior;

/// Durations of the four transitions a cell visual can play.
///
/// A zero duration means the transition applies instantly and its completion
/// is delivered synchronously at the call site instead of through the
/// scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationProfile {
    show: Duration,
    hide: Duration,
    restore: Duration,
    sample: Duration,
}

impl AnimationProfile {
    /// Creates a profile with explicit per-transition durations.
    #[must_use]
    pub const fn new(show: Duration, hide: Duration, restore: Duration, sample: Duration) -> Self {
        Self {
            show,
            hide,
            restore,
            sample,
        }
    }

    /// Creates a profile that plays every transition for the same duration.
    #[must_use]
    pub const fn uniform(duration: Duration) -> Self {
        Self::new(duration, duration, duration, duration)
    }

    /// Creates a profile where every transition completes instantly.
    #[must_use]
    pub const fn instant() -> Self {
        Self::uniform(Duration::ZERO)
    }

    /// Duration of the show transition.
    #[must_use]
    pub const fn show(&self) -> Duration {
        self.show
    }

    /// Duration of the hide transition.
    #[must_use]
    pub const fn hide(&self) -> Duration {
        self.hide
    }

    /// Duration of the restore transition.
    #[must_use]
    pub const fn restore(&self) -> Duration {
        self.restore
    }

    /// Duration of the sample transition.
    #[must_use]
    pub const fn sample(&self) -> Duration {
        self.sample
    }
}

/// Presentation state a visual is resting in between transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualState {
    /// Not presented; parked in the pool or mid-teardown.
    Hidden,
    /// Presented on the stage.
    Shown,
}

/// A single animated actor occupying one grid position within one layer.
///
/// The visual does not run its own clock. Each transition reports the delay
/// after which its completion fires, and the stage's scheduler delivers that
/// completion; `None` means no animation applies and the operation is already
/// complete. An inactive visual never animates, so operations on it complete
/// immediately rather than stalling a wave latch forever.
#[derive(Clone, Debug)]
pub struct CellVisual {
    id: CellId,
    behavior: CellBehavior,
    animation: AnimationProfile,
    active: bool,
    state: VisualState,
    layer: Option<LayerKind>,
    position: GridPosition,
    world: WorldPoint,
}

impl CellVisual {
    /// Creates a hidden, active visual that is not yet bound to a layer.
    #[must_use]
    pub fn new(id: CellId, behavior: CellBehavior, animation: AnimationProfile) -> Self {
        Self {
            id,
            behavior,
            animation,
            active: true,
            state: VisualState::Hidden,
            layer: None,
            position: GridPosition::default(),
            world: WorldPoint::default(),
        }
    }

    /// Identity shared with the prototype this visual was instantiated from.
    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// Behavior evaluated when the visual is sampled.
    #[must_use]
    pub const fn behavior(&self) -> &CellBehavior {
        &self.behavior
    }

    /// Animation timing applied to this visual's transitions.
    #[must_use]
    pub const fn animation(&self) -> AnimationProfile {
        self.animation
    }

    /// Current presentation state.
    #[must_use]
    pub const fn state(&self) -> VisualState {
        self.state
    }

    /// Reports whether the visual participates in animations.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Enables or disables animation participation.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Layer the visual is currently bound to, if any.
    #[must_use]
    pub const fn layer(&self) -> Option<LayerKind> {
        self.layer
    }

    /// Grid position the visual is bound to.
    #[must_use]
    pub const fn position(&self) -> GridPosition {
        self.position
    }

    /// World-space location the visual was placed at.
    #[must_use]
    pub const fn world_position(&self) -> WorldPoint {
        self.world
    }

    /// Binds the visual to a layer, grid position, and world location.
    pub fn setup(&mut self, layer: LayerKind, position: GridPosition, world: WorldPoint) {
        self.layer = Some(layer);
        self.position = position;
        self.world = world;
    }

    fn delay(&self, duration: Duration) -> Option<Duration> {
        if self.active && !duration.is_zero() {
            Some(duration)
        } else {
            None
        }
    }

    /// Presents the visual. Returns the delay after which the show animation
    /// completes, or `None` when it completes immediately.
    pub fn show(&mut self) -> Option<Duration> {
        self.state = VisualState::Shown;
        self.delay(self.animation.show())
    }

    /// Conceals the visual. Returns the delay after which the hide animation
    /// completes, or `None` when it completes immediately.
    pub fn hide(&mut self) -> Option<Duration> {
        self.state = VisualState::Hidden;
        self.delay(self.animation.hide())
    }

    /// Resets the visual to its shown baseline, re-arming its animation
    /// triggers. Returns the completion delay, or `None` when immediate.
    pub fn restore(&mut self) -> Option<Duration> {
        self.state = VisualState::Shown;
        self.delay(self.animation.restore())
    }

    /// Delay after which a sample animation would complete, or `None` when
    /// sampling this visual completes immediately.
    #[must_use]
    pub fn sample_delay(&self) -> Option<Duration> {
        self.delay(self.animation.sample())
    }
}

/// Value handle pairing a cell identity with its live visual.
///
/// Equality and hashing consider only the identity, so handles compare the
/// way prototypes do regardless of which pooled instance currently backs
/// them.
#[derive(Clone, Debug)]
pub struct CellHandle {
    id: CellId,
    visual: CellVisual,
}

impl CellHandle {
    /// Wraps a visual in a handle carrying its identity.
    #[must_use]
    pub fn new(visual: CellVisual) -> Self {
        Self {
            id: visual.id(),
            visual,
        }
    }

    /// Identity of the wrapped visual.
    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// Read access to the wrapped visual.
    #[must_use]
    pub const fn visual(&self) -> &CellVisual {
        &self.visual
    }

    /// Mutable access to the wrapped visual.
    pub fn visual_mut(&mut self) -> &mut CellVisual {
        &mut self.visual
    }

    /// Consumes the handle, yielding the wrapped visual.
    #[must_use]
    pub(crate) fn into_visual(self) -> CellVisual {
        self.visual
    }
}

impl PartialEq for CellHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CellHandle {}

impl Hash for CellHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
