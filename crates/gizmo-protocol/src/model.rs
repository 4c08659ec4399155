//! Document model edited by remote controllers.
//!
//! A [`Document`] is an ordered list of [`Page`]s. Each page is a sparse,
//! ordered sequence of executor slots where `None` marks a hole. Executors
//! bind an [`ActionContext`] that selects an [`Action`] either globally or per
//! foreground application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
const DEFAULT_BACKGROUND_OPACITY: f64 = 1.0;

fn default_background_color() -> String {
    String::from(DEFAULT_BACKGROUND_COLOR)
}

const fn default_background_opacity() -> f64 {
    DEFAULT_BACKGROUND_OPACITY
}

/// Modifier keys held while a key combination is pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    /// Command key.
    pub command: bool,
    /// Shift key.
    pub shift: bool,
    /// Control key.
    pub control: bool,
    /// Option (alt) key.
    pub option: bool,
}

/// A unit of effect performed on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    /// Press a key with optional modifiers.
    KeyCombo {
        /// Key to press, for example `"a"` or `"space"`.
        key_string: String,
        /// Modifiers held during the press.
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Run a named user shortcut.
    RunShortcut {
        /// Shortcut name as listed by the shortcut catalogue.
        shortcut_name: String,
    },
    /// Raise the output volume by one step.
    VolumeUp,
    /// Lower the output volume by one step.
    VolumeDown,
    /// Set the output volume to an absolute level.
    SetVolume {
        /// Target level.
        numeric_value: f64,
    },
    /// Click the primary mouse button.
    LeftClick,
    /// Click the secondary mouse button.
    RightClick,
}

impl Action {
    /// Wire tag for this action kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeyCombo { .. } => "keyCombo",
            Self::RunShortcut { .. } => "runShortcut",
            Self::VolumeUp => "volumeUp",
            Self::VolumeDown => "volumeDown",
            Self::SetVolume { .. } => "setVolume",
            Self::LeftClick => "leftClick",
            Self::RightClick => "rightClick",
        }
    }
}

/// Selects which binding of an [`ActionContext`] applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionContextOption {
    /// The executor's global binding.
    #[default]
    Global,
    /// The binding for a specific application, falling back to the global one.
    App {
        /// Bundle identifier of the application.
        #[serde(rename = "bundleID")]
        bundle_id: String,
    },
}

/// Actions an executor performs, keyed by context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionContext {
    /// Action used when no application override applies.
    pub global: Option<Action>,
    /// Per-application overrides keyed by bundle identifier.
    pub apps: BTreeMap<String, Action>,
}

impl ActionContext {
    /// Context that performs `action` everywhere.
    #[must_use]
    pub fn global(action: Action) -> Self {
        Self {
            global: Some(action),
            apps: BTreeMap::new(),
        }
    }

    /// Resolves the action selected by `option`.
    ///
    /// An application option prefers that application's override and falls
    /// back to the global action.
    #[must_use]
    pub fn resolve(&self, option: &ActionContextOption) -> Option<&Action> {
        match option {
            ActionContextOption::Global => self.global.as_ref(),
            ActionContextOption::App { bundle_id } => {
                self.apps.get(bundle_id).or(self.global.as_ref())
            }
        }
    }
}

/// A control bound to an action context and rendered in a page slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Executor {
    /// Identifier, unique across the document.
    #[serde(default)]
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Whether the label is hidden when rendered.
    #[serde(default)]
    pub label_hidden: bool,
    /// Icon reference understood by the renderer.
    #[serde(default)]
    pub icon: String,
    /// Background colour as a hex string.
    #[serde(default = "default_background_color")]
    pub background_color: String,
    /// Background opacity in the closed range `0.0..=1.0`.
    #[serde(default = "default_background_opacity")]
    pub background_opacity: f64,
    /// Actions performed when the executor is triggered.
    #[serde(default)]
    pub action_context: ActionContext,
}

impl Executor {
    /// Creates an executor with default styling and no actions.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            label_hidden: false,
            icon: String::new(),
            background_color: default_background_color(),
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            action_context: ActionContext::default(),
        }
    }

    /// Replaces the action context.
    #[must_use]
    pub fn with_actions(mut self, action_context: ActionContext) -> Self {
        self.action_context = action_context;
        self
    }

    /// Whether the background opacity lies in `0.0..=1.0`.
    #[must_use]
    pub fn has_valid_opacity(&self) -> bool {
        (0.0..=1.0).contains(&self.background_opacity)
    }
}

/// Position of a slot inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotLocation {
    /// Index of the page in [`Document::pages`].
    pub page: usize,
    /// Index of the slot in [`Page::executors`].
    pub slot: usize,
}

/// An ordered, sparse grid of executor slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Identifier, unique across the document.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Slots in display order; `None` is a hole.
    #[serde(default)]
    pub executors: Vec<Option<Executor>>,
}

impl Page {
    /// Creates an empty page.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            executors: Vec::new(),
        }
    }

    /// Occupant of the slot at `index`, if any.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Executor> {
        self.executors.get(index).and_then(Option::as_ref)
    }

    /// Index of the first slot holding `executor_id`.
    #[must_use]
    pub fn position_of(&self, executor_id: &str) -> Option<usize> {
        self.executors.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|executor| executor.id == executor_id)
        })
    }

    /// Appends holes until the page has at least `len` slots.
    pub fn grow_to(&mut self, len: usize) {
        if self.executors.len() < len {
            self.executors.resize(len, None);
        }
    }

    /// Identifiers of every occupied slot in order.
    pub fn executor_ids(&self) -> impl Iterator<Item = &str> {
        self.executors
            .iter()
            .flatten()
            .map(|executor| executor.id.as_str())
    }
}

/// A remembered or installed application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Bundle identifier, the application's unique key.
    #[serde(rename = "bundleID")]
    pub bundle_id: String,
    /// Rasterised icon bytes. Kept in memory only.
    #[serde(skip)]
    pub icon: Option<Vec<u8>>,
}

impl AppInfo {
    /// Creates an application record without an icon.
    pub fn new(name: impl Into<String>, bundle_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bundle_id: bundle_id.into(),
            icon: None,
        }
    }
}

/// The complete persisted state edited by controllers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Pages in display order.
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Applications seen in the foreground, unique by bundle identifier.
    #[serde(default)]
    pub remembered_apps: Vec<AppInfo>,
}

impl Document {
    /// Page with the given identifier.
    #[must_use]
    pub fn page(&self, page_id: &str) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == page_id)
    }

    /// Mutable page with the given identifier.
    pub fn page_mut(&mut self, page_id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|page| page.id == page_id)
    }

    /// Location of the first slot holding `executor_id`, scanning pages in
    /// order and slots in order.
    #[must_use]
    pub fn locate(&self, executor_id: &str) -> Option<SlotLocation> {
        self.pages
            .iter()
            .enumerate()
            .find_map(|(page, candidate)| {
                candidate
                    .position_of(executor_id)
                    .map(|slot| SlotLocation { page, slot })
            })
    }

    /// Executor with the given identifier.
    #[must_use]
    pub fn executor(&self, executor_id: &str) -> Option<&Executor> {
        let location = self.locate(executor_id)?;
        self.pages
            .get(location.page)
            .and_then(|page| page.slot(location.slot))
    }

    /// Mutable slot at `location`.
    pub fn slot_mut(&mut self, location: SlotLocation) -> Option<&mut Option<Executor>> {
        self.pages
            .get_mut(location.page)
            .and_then(|page| page.executors.get_mut(location.slot))
    }

    /// Whether any page other than `except_page` holds `executor_id`.
    #[must_use]
    pub fn executor_id_in_use(&self, executor_id: &str, except_page: Option<&str>) -> bool {
        self.pages
            .iter()
            .filter(|page| Some(page.id.as_str()) != except_page)
            .any(|page| page.position_of(executor_id).is_some())
    }

    /// Remembered application with the given bundle identifier.
    #[must_use]
    pub fn remembered_app(&self, bundle_id: &str) -> Option<&AppInfo> {
        self.remembered_apps
            .iter()
            .find(|app| app.bundle_id == bundle_id)
    }
}
