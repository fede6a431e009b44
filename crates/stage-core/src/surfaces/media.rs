use super::broadcast::{Broadcast, Subscription};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    /// The host refused to start playback (autoplay policy and the like).
    Blocked,
}

impl PlaybackStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "loading" => Some(Self::Loading),
            "playing" => Some(Self::Playing),
            "paused" => Some(Self::Paused),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    Time(f64),
    Status(PlaybackStatus),
    Track(Option<String>),
}

/// Playback telemetry: position in ms, status and active track id.
pub struct MediaSurface {
    time: Broadcast<f64>,
    status: Broadcast<PlaybackStatus>,
    track: Broadcast<Option<String>>,
}

impl Default for MediaSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSurface {
    pub fn new() -> Self {
        Self {
            time: Broadcast::new(0.0),
            status: Broadcast::new(PlaybackStatus::Idle),
            track: Broadcast::new(None),
        }
    }

    /// Position updates always notify; non-finite values are dropped.
    pub fn set_time(&self, ms: f64) {
        if ms.is_finite() {
            self.time.set(ms);
        }
    }

    pub fn set_status(&self, status: PlaybackStatus) {
        self.status.update(|s| replace_if_changed(s, status));
    }

    pub fn set_track(&self, id: Option<String>) {
        self.track.update(|t| replace_if_changed(t, id));
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.get()
    }

    pub fn track(&self) -> Option<String> {
        self.track.get()
    }

    pub fn subscribe_time(&self, f: impl Fn(f64) + 'static) -> Subscription {
        self.time.subscribe(move |v| f(*v))
    }

    pub fn subscribe_status(&self, f: impl Fn(PlaybackStatus) + 'static) -> Subscription {
        self.status.subscribe(move |v| f(*v))
    }

    pub fn subscribe_track(&self, f: impl Fn(Option<&str>) + 'static) -> Subscription {
        self.track.subscribe(move |v| f(v.as_deref()))
    }

    /// Receives all three event kinds. Replays time, status and track, in that
    /// order, before returning.
    pub fn subscribe(&self, f: impl Fn(&MediaEvent) + 'static) -> Subscription {
        let f = std::rc::Rc::new(f);
        let (a, b, c) = (f.clone(), f.clone(), f);
        Subscription::all(vec![
            self.time.subscribe(move |v| a(&MediaEvent::Time(*v))),
            self.status.subscribe(move |v| b(&MediaEvent::Status(*v))),
            self.track.subscribe(move |v| c(&MediaEvent::Track(v.clone()))),
        ])
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
