//! Viewport-gated image loading.
//!
//! An image starts without an active source. Once the viewport observer
//! reports it intersecting, the deferred source is assigned and observation
//! stops for good. The UI owns the element and the observer; both are reached
//! through the traits below.

/// Pre-trigger margin around the viewport, in pixels
pub const ROOT_MARGIN_PX: u32 = 200;
/// Fraction of the element that must be visible
pub const VISIBILITY_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
  pub root_margin_px: u32,
  pub threshold: f64,
}

impl Default for ObserverOptions {
  fn default() -> Self {
    Self { root_margin_px: ROOT_MARGIN_PX, threshold: VISIBILITY_THRESHOLD }
  }
}

pub trait ImageElement {
  /// Value of the deferred-source attribute
  fn deferred_source(&self) -> Option<String>;
  fn set_source(&mut self, source: &str);
  fn clear_source(&mut self);
}

pub trait ViewportObserver {
  fn observe(&mut self, options: &ObserverOptions);
  fn disconnect(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
  Idle,
  Observing,
  Triggered,
  Disposed,
}

impl LazyState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, LazyState::Triggered | LazyState::Disposed)
  }
}

pub struct LazyImage<E: ImageElement, O: ViewportObserver> {
  element: E,
  observer: O,
  source: Option<String>,
  state: LazyState,
}

impl<E: ImageElement, O: ViewportObserver> LazyImage<E, O> {
  pub fn new(element: E, observer: O) -> Self {
    Self { element, observer, source: None, state: LazyState::Idle }
  }

  /// Create and immediately start observing
  pub fn activate(element: E, observer: O) -> Self {
    let mut lazy = Self::new(element, observer);
    lazy.start();
    lazy
  }

  /// Idle → Observing: capture the deferred source, unset the active one
  pub fn start(&mut self) {
    if self.state != LazyState::Idle {
      return;
    }
    self.source = self.element.deferred_source();
    self.element.clear_source();
    self.observer.observe(&ObserverOptions::default());
    self.state = LazyState::Observing;
  }

  /// Feed one observer callback. Returns true when this event triggered the load.
  pub fn on_intersection(&mut self, is_intersecting: bool) -> bool {
    if self.state != LazyState::Observing || !is_intersecting {
      return false;
    }
    if let Some(source) = &self.source {
      self.element.set_source(source);
    }
    self.observer.disconnect();
    self.state = LazyState::Triggered;
    true
  }

  /// Tear down before the element ever became visible
  pub fn deactivate(&mut self) {
    match self.state {
      LazyState::Observing => {
        self.observer.disconnect();
        self.state = LazyState::Disposed;
      }
      LazyState::Idle => self.state = LazyState::Disposed,
      LazyState::Triggered | LazyState::Disposed => {}
    }
  }

  pub fn state(&self) -> LazyState {
    self.state
  }

  pub fn element(&self) -> &E {
    &self.element
  }

  pub fn observer(&self) -> &O {
    &self.observer
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Default)]
  struct FakeImage {
    data_src: Option<String>,
    src: Option<String>,
    assignments: usize,
  }

  impl ImageElement for FakeImage {
    fn deferred_source(&self) -> Option<String> {
      self.data_src.clone()
    }
    fn set_source(&mut self, source: &str) {
      self.src = Some(source.to_string());
      self.assignments += 1;
    }
    fn clear_source(&mut self) {
      self.src = None;
    }
  }

  #[derive(Debug, Default)]
  struct FakeObserver {
    options: Option<ObserverOptions>,
    disconnects: usize,
  }

  impl ViewportObserver for FakeObserver {
    fn observe(&mut self, options: &ObserverOptions) {
      self.options = Some(*options);
    }
    fn disconnect(&mut self) {
      self.disconnects += 1;
    }
  }

  fn image(src: Option<&str>) -> FakeImage {
    FakeImage {
      data_src: Some("https://images.weserv.nl/?url=a.jpg".to_string()),
      src: src.map(str::to_string),
      assignments: 0,
    }
  }

  #[test]
  fn test_activation_clears_source_and_observes() {
    let lazy = LazyImage::activate(image(Some("placeholder.png")), FakeObserver::default());

    assert_eq!(lazy.state(), LazyState::Observing);
    assert_eq!(lazy.element().src, None);
    assert_eq!(lazy.observer().options, Some(ObserverOptions { root_margin_px: 200, threshold: 0.01 }));
  }

  #[test]
  fn test_source_assigned_only_on_intersection() {
    let mut lazy = LazyImage::activate(image(None), FakeObserver::default());

    assert!(!lazy.on_intersection(false));
    assert_eq!(lazy.element().src, None);

    assert!(lazy.on_intersection(true));
    assert_eq!(lazy.element().src.as_deref(), Some("https://images.weserv.nl/?url=a.jpg"));
    assert_eq!(lazy.state(), LazyState::Triggered);
    assert_eq!(lazy.observer().disconnects, 1);
  }

  #[test]
  fn test_second_intersection_is_ignored() {
    let mut lazy = LazyImage::activate(image(None), FakeObserver::default());
    lazy.on_intersection(true);

    assert!(!lazy.on_intersection(true));
    assert_eq!(lazy.element().assignments, 1);
    assert_eq!(lazy.observer().disconnects, 1);
  }

  #[test]
  fn test_deactivate_before_trigger() {
    let mut lazy = LazyImage::activate(image(None), FakeObserver::default());
    lazy.deactivate();

    assert_eq!(lazy.state(), LazyState::Disposed);
    assert_eq!(lazy.observer().disconnects, 1);
    assert!(!lazy.on_intersection(true));
    assert_eq!(lazy.element().src, None);
  }

  #[test]
  fn test_deactivate_after_trigger_is_noop() {
    let mut lazy = LazyImage::activate(image(None), FakeObserver::default());
    lazy.on_intersection(true);
    lazy.deactivate();

    assert_eq!(lazy.state(), LazyState::Triggered);
    assert_eq!(lazy.observer().disconnects, 1);
  }

  #[test]
  fn test_idle_ignores_events_until_started() {
    let mut lazy = LazyImage::new(image(Some("placeholder.png")), FakeObserver::default());
    assert!(!lazy.on_intersection(true));
    assert_eq!(lazy.element().src.as_deref(), Some("placeholder.png"));

    lazy.start();
    lazy.start();
    assert_eq!(lazy.state(), LazyState::Observing);
    assert!(lazy.on_intersection(true));
  }

  #[test]
  fn test_missing_deferred_source_assigns_nothing() {
    let element = FakeImage { data_src: None, src: Some("old.png".to_string()), assignments: 0 };
    let mut lazy = LazyImage::activate(element, FakeObserver::default());

    assert!(lazy.on_intersection(true));
    assert_eq!(lazy.element().src, None);
    assert_eq!(lazy.element().assignments, 0);
    assert!(lazy.state().is_terminal());
  }
}
