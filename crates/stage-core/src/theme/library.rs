use fnv::FnvHashMap;

use super::{builtin, Theme};
use crate::gpu::Gpu;

/// Produces a fresh, uninitialised theme instance.
pub type ThemeFactory<G> = fn() -> Box<dyn Theme<G>>;

/// Built-in theme families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThemeKind {
    /// Slow ambient field, the default idle theme.
    Nebula,
    /// Bass-driven radial rings.
    Pulse,
    /// Feedback trails.
    Echo,
}

const ALIASES: &[(&str, ThemeKind)] = &[
    ("nebula", ThemeKind::Nebula),
    ("ambient", ThemeKind::Nebula),
    ("idle", ThemeKind::Nebula),
    ("default-idle", ThemeKind::Nebula),
    ("pulse", ThemeKind::Pulse),
    ("rings", ThemeKind::Pulse),
    ("bass", ThemeKind::Pulse),
    ("echo", ThemeKind::Echo),
    ("trails", ThemeKind::Echo),
    ("feedback", ThemeKind::Echo),
];

impl ThemeKind {
    pub const ALL: [ThemeKind; 3] = [ThemeKind::Nebula, ThemeKind::Pulse, ThemeKind::Echo];
    pub const DEFAULT: ThemeKind = ThemeKind::Pulse;

    /// Case-insensitive lookup with aliases; unknown names fall back to
    /// [`ThemeKind::DEFAULT`].
    pub fn resolve(name: &str) -> ThemeKind {
        Self::lookup(name).unwrap_or_else(|| {
            log::warn!("[theme] unknown theme `{name}`, using `{}`", Self::DEFAULT.name());
            Self::DEFAULT
        })
    }

    pub fn lookup(name: &str) -> Option<ThemeKind> {
        let key = name.trim().to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            ThemeKind::Nebula => "nebula",
            ThemeKind::Pulse => "pulse",
            ThemeKind::Echo => "echo",
        }
    }

    fn builtin<G: Gpu + 'static>(self) -> ThemeFactory<G> {
        match self {
            ThemeKind::Nebula => builtin::nebula::<G>,
            ThemeKind::Pulse => builtin::pulse::<G>,
            ThemeKind::Echo => builtin::echo::<G>,
        }
    }
}

/// Caches theme factories by kind.
///
/// Factories are resolved on first use and cached; instances are never
/// cached, so every `create` yields an independent theme with its own GPU
/// state.
pub struct ThemeLibrary<G: Gpu> {
    factories: FnvHashMap<ThemeKind, ThemeFactory<G>>,
}

impl<G: Gpu + 'static> Default for ThemeLibrary<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Gpu + 'static> ThemeLibrary<G> {
    pub fn new() -> Self {
        Self {
            factories: FnvHashMap::default(),
        }
    }

    /// Replaces the factory for `kind`.
    pub fn register(&mut self, kind: ThemeKind, factory: ThemeFactory<G>) {
        self.factories.insert(kind, factory);
    }

    pub fn factory(&mut self, kind: ThemeKind) -> ThemeFactory<G> {
        *self.factories.entry(kind).or_insert_with(|| {
            log::debug!("[theme] loading `{}`", kind.name());
            kind.builtin::<G>()
        })
    }

    pub fn is_loaded(&self, kind: ThemeKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn create(&mut self, kind: ThemeKind) -> Box<dyn Theme<G>> {
        (self.factory(kind))()
    }

    pub fn create_named(&mut self, name: &str) -> Box<dyn Theme<G>> {
        self.create(ThemeKind::resolve(name))
    }
}
