//! Simulated three-view application.
//!
//! [`SimulatedApp`] is an in-process [`Driver`] reproducing the todo page
//! closely enough to run every layer without a browser: the three views
//! render from one model but each can lag behind it by a number of lookups,
//! Main's delete button only shows on row hover, Main's inline editor opens
//! on double-click, and the undo/redo history is linear with truncation.
//!
//! Like a mock driver it keeps a call history for assertions.

use crate::driver::{
    Action, Driver, DriverError, DriverResult, ElementHandle, ElementState, ReadKind,
};
use crate::model::{normalize_label, FilterState, TodoItem, ViewKind, MAX_LABEL_CHARS};
use crate::query::{Query, Role};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const WAIT_STEP: Duration = Duration::from_millis(10);

/// Behaviour switches for the simulated page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOptions {
    /// Hovering a Main row reveals its delete button
    pub hover_reveals_controls: bool,
    /// Counter renders its number inside a `<strong>`
    pub counter_emphasis: bool,
    /// Lookups a view needs before it shows a model change
    pub render_lag: BTreeMap<ViewKind, usize>,
    /// Step2 lists the oldest item first
    pub step2_oldest_first: bool,
    /// Double-clicking a Main label opens its inline editor
    pub inline_editor_opens: bool,
    /// The counter's `<strong>` shows a word instead of the number
    pub counter_emphasis_spelled: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            hover_reveals_controls: true,
            counter_emphasis: true,
            render_lag: BTreeMap::new(),
            step2_oldest_first: false,
            inline_editor_opens: true,
            counter_emphasis_spelled: false,
        }
    }
}

impl SimOptions {
    /// Delay a view's rendering by `lookups` locate calls
    #[must_use]
    pub fn with_render_lag(mut self, view: ViewKind, lookups: usize) -> Self {
        self.render_lag.insert(view, lookups);
        self
    }

    /// Same lag on every view
    #[must_use]
    pub fn with_uniform_lag(mut self, lookups: usize) -> Self {
        for view in ViewKind::ALL {
            self.render_lag.insert(view, lookups);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ElementKey {
    view: ViewKind,
    role: Role,
    uid: Option<u64>,
}

impl ElementKey {
    const fn page(view: ViewKind, role: Role) -> Self {
        Self {
            view,
            role,
            uid: None,
        }
    }
}

#[derive(Debug, Default)]
struct Rendering {
    items: Vec<TodoItem>,
    pending: usize,
}

#[derive(Serialize)]
struct DumpOut<'a> {
    items: &'a [TodoItem],
}

#[derive(Debug)]
struct Page {
    options: SimOptions,
    items: Vec<TodoItem>,
    next_uid: u64,
    snapshots: Vec<Vec<TodoItem>>,
    position: usize,
    filter: FilterState,
    hovered: Option<u64>,
    editing: Option<u64>,
    drafts: HashMap<ElementKey, String>,
    rendered: BTreeMap<ViewKind, Rendering>,
    dump_override: Option<String>,
    elements: Vec<ElementKey>,
    ids: HashMap<ElementKey, usize>,
    calls: Vec<String>,
}

impl Page {
    fn new(options: SimOptions) -> Self {
        Self {
            options,
            items: Vec::new(),
            next_uid: 1,
            snapshots: vec![Vec::new()],
            position: 0,
            filter: FilterState::All,
            hovered: None,
            editing: None,
            drafts: HashMap::new(),
            rendered: ViewKind::ALL
                .into_iter()
                .map(|v| (v, Rendering::default()))
                .collect(),
            dump_override: None,
            elements: Vec::new(),
            ids: HashMap::new(),
            calls: Vec::new(),
        }
    }

    fn rendered_items(&self, view: ViewKind) -> &[TodoItem] {
        self.rendered
            .get(&view)
            .map_or(&[][..], |r| r.items.as_slice())
    }

    fn view_items(&self, view: ViewKind) -> Vec<&TodoItem> {
        let rendered = self.rendered_items(view);
        match view {
            ViewKind::Main => rendered
                .iter()
                .filter(|item| self.filter.accepts(item.done))
                .collect(),
            ViewKind::Step2 if self.options.step2_oldest_first => rendered.iter().rev().collect(),
            _ => rendered.iter().collect(),
        }
    }

    fn rendered_item(&self, key: &ElementKey) -> Option<&TodoItem> {
        let uid = key.uid?;
        self.rendered_items(key.view).iter().find(|i| i.uid == uid)
    }

    fn tick(&mut self, view: ViewKind) {
        let items = &self.items;
        if let Some(r) = self.rendered.get_mut(&view) {
            if r.pending > 0 {
                r.pending -= 1;
                if r.pending == 0 {
                    r.items = items.clone();
                }
            }
        }
    }

    fn schedule_render(&mut self) {
        for view in ViewKind::ALL {
            let lag = self.options.render_lag.get(&view).copied().unwrap_or(0);
            let items = &self.items;
            let r = self.rendered.entry(view).or_default();
            if lag == 0 {
                r.items = items.clone();
                r.pending = 0;
            } else {
                r.pending = lag;
            }
        }
    }

    fn commit(&mut self, items: Vec<TodoItem>) {
        if items == self.items {
            return;
        }
        self.items = items;
        self.snapshots.truncate(self.position + 1);
        self.snapshots.push(self.items.clone());
        self.position += 1;
        self.schedule_render();
    }

    fn restore(&mut self, position: usize) {
        if let Some(items) = self.snapshots.get(position) {
            self.items = items.clone();
            self.position = position;
            self.editing = None;
            self.schedule_render();
        }
    }

    fn can_undo(&self) -> bool {
        self.position > 0
    }

    fn can_redo(&self) -> bool {
        self.position + 1 < self.snapshots.len()
    }

    fn main_has_items(&self) -> bool {
        !self.rendered_items(ViewKind::Main).is_empty()
    }

    fn remaining(&self) -> usize {
        self.rendered_items(ViewKind::Main)
            .iter()
            .filter(|i| !i.done)
            .count()
    }

    fn matches(&self, view: ViewKind, role: Role) -> Vec<ElementKey> {
        let per_item = |role: Role| {
            self.view_items(view)
                .into_iter()
                .map(|item| ElementKey {
                    view,
                    role,
                    uid: Some(item.uid),
                })
                .collect::<Vec<_>>()
        };
        match (view, role) {
            (_, Role::UndoControl | Role::RedoControl) => {
                vec![ElementKey::page(ViewKind::Main, role)]
            }
            (ViewKind::Main | ViewKind::Step2, Role::NewItemInput)
            | (ViewKind::JsonDebug, Role::DumpDocument) => vec![ElementKey::page(view, role)],
            (
                ViewKind::Main,
                Role::ItemRow
                | Role::ItemLabel
                | Role::ItemCheckbox
                | Role::ItemDeleteControl
                | Role::ItemEditInput,
            )
            | (
                ViewKind::Step2,
                Role::ItemRow | Role::ItemLabel | Role::ItemCheckbox | Role::ItemDeleteControl,
            ) => per_item(role),
            // Step2 edits happen in the label input itself
            (ViewKind::Step2, Role::ItemEditInput) => per_item(Role::ItemLabel),
            (
                ViewKind::Main,
                Role::Counter
                | Role::ClearCompletedControl
                | Role::FilterControl(_)
                | Role::ToggleAllControl,
            ) if self.main_has_items() => vec![ElementKey::page(view, role)],
            (ViewKind::Main, Role::CounterValue)
                if self.main_has_items() && self.options.counter_emphasis =>
            {
                vec![ElementKey::page(view, role)]
            }
            _ => Vec::new(),
        }
    }

    fn handle_for(&mut self, key: ElementKey) -> ElementHandle {
        let next = self.elements.len();
        let n = *self.ids.entry(key).or_insert(next);
        if n == next {
            self.elements.push(key);
        }
        ElementHandle::new(format!("sim-{n}"), tag_for(key.role))
    }

    fn require(&self, handle: &ElementHandle) -> DriverResult<ElementKey> {
        let detached = || DriverError::Detached {
            handle: handle.id.clone(),
        };
        let key = handle
            .id
            .strip_prefix("sim-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| self.elements.get(n).copied())
            .ok_or_else(detached)?;
        if self.matches(key.view, key.role).contains(&key) {
            Ok(key)
        } else {
            Err(detached())
        }
    }

    fn visible(&self, key: &ElementKey) -> bool {
        match (key.view, key.role) {
            (ViewKind::Main, Role::ItemDeleteControl) => {
                self.options.hover_reveals_controls && self.hovered == key.uid
            }
            (ViewKind::Main, Role::ItemEditInput) => key.uid.is_some() && self.editing == key.uid,
            (ViewKind::Main, Role::ClearCompletedControl) => {
                self.rendered_items(ViewKind::Main).iter().any(|i| i.done)
            }
            _ => true,
        }
    }

    fn enabled(&self, key: &ElementKey) -> bool {
        match key.role {
            Role::UndoControl => self.can_undo(),
            Role::RedoControl => self.can_redo(),
            _ => true,
        }
    }

    fn require_actionable(&self, key: &ElementKey, handle: &ElementHandle) -> DriverResult<()> {
        let reason = if !self.visible(key) {
            "hidden"
        } else if !self.enabled(key) {
            "disabled"
        } else {
            return Ok(());
        };
        Err(DriverError::NotActionable {
            handle: handle.id.clone(),
            reason: reason.to_string(),
        })
    }

    fn dump_text(&self) -> DriverResult<String> {
        if let Some(text) = &self.dump_override {
            return Ok(text.clone());
        }
        serde_json::to_string_pretty(&DumpOut {
            items: self.rendered_items(ViewKind::JsonDebug),
        })
        .map_err(|e| DriverError::Backend {
            message: e.to_string(),
        })
    }

    fn read(&self, key: &ElementKey, kind: &ReadKind) -> DriverResult<Option<String>> {
        let label = || self.rendered_item(key).map(|i| i.label.clone());
        Ok(match kind {
            ReadKind::Text => match (key.view, key.role) {
                (_, Role::ItemLabel | Role::ItemRow) if key.view != ViewKind::Step2 => label(),
                (ViewKind::Step2, Role::ItemRow) => label(),
                (ViewKind::Main, Role::Counter) => {
                    let n = self.remaining();
                    let plural = if n > 1 { "s" } else { "" };
                    Some(format!("{n} tâche{plural} restante{plural}"))
                }
                (ViewKind::Main, Role::CounterValue) if self.options.counter_emphasis_spelled => {
                    Some("quelques".to_string())
                }
                (ViewKind::Main, Role::CounterValue) => Some(self.remaining().to_string()),
                (ViewKind::JsonDebug, Role::DumpDocument) => Some(self.dump_text()?),
                (_, Role::UndoControl) => Some("Annuler".to_string()),
                (_, Role::RedoControl) => Some("Refaire".to_string()),
                (_, Role::ClearCompletedControl) => Some("Supprimer cochées".to_string()),
                (_, Role::FilterControl(kind)) => Some(filter_text(kind).to_string()),
                _ => None,
            },
            ReadKind::Value => match (key.view, key.role) {
                (_, Role::NewItemInput) => {
                    Some(self.drafts.get(key).cloned().unwrap_or_default())
                }
                (ViewKind::Main, Role::ItemEditInput) | (ViewKind::Step2, Role::ItemLabel) => self
                    .drafts
                    .get(key)
                    .cloned()
                    .or_else(label),
                _ => None,
            },
            ReadKind::Attribute(name) if name == "class" => match (key.view, key.role) {
                (ViewKind::Main, Role::ItemRow) => {
                    let mut classes = Vec::new();
                    if self.rendered_item(key).is_some_and(|i| i.done) {
                        classes.push("completed");
                    }
                    if key.uid.is_some() && self.editing == key.uid {
                        classes.push("editing");
                    }
                    Some(classes.join(" "))
                }
                (ViewKind::Main, Role::FilterControl(kind)) => {
                    let selected = if self.filter == kind { " selected" } else { "" };
                    Some(format!("{}{selected}", kind.css_class()))
                }
                (ViewKind::Main, Role::ItemLabel) => Some("texte".to_string()),
                (ViewKind::Main, Role::ItemEditInput) => Some("edit".to_string()),
                (ViewKind::Main, Role::NewItemInput) => Some("new-todo".to_string()),
                _ => None,
            },
            ReadKind::Attribute(name) if name == "maxlength" => {
                is_fillable(key).then(|| MAX_LABEL_CHARS.to_string())
            }
            ReadKind::Attribute(_) => None,
        })
    }

    fn add(&mut self, label: String) {
        let uid = self.next_uid;
        self.next_uid += 1;
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(TodoItem::new(label, false, uid));
        items.extend(self.items.iter().cloned());
        self.commit(items);
    }

    fn update(&mut self, uid: u64, f: impl FnOnce(&mut TodoItem)) {
        let mut items = self.items.clone();
        if let Some(item) = items.iter_mut().find(|i| i.uid == uid) {
            f(item);
            self.commit(items);
        }
    }

    fn remove(&mut self, keep: impl Fn(&TodoItem) -> bool) {
        let items = self.items.iter().filter(|&i| keep(i)).cloned().collect();
        self.commit(items);
    }

    fn click(&mut self, key: ElementKey) {
        match (key.role, key.uid) {
            (Role::ItemCheckbox, Some(uid)) => self.update(uid, |i| i.done = !i.done),
            (Role::ItemDeleteControl, Some(uid)) => self.remove(|i| i.uid != uid),
            (Role::ClearCompletedControl, _) => self.remove(|i| !i.done),
            (Role::FilterControl(kind), _) => self.filter = kind,
            (Role::ToggleAllControl, _) => {
                let all_done = self.items.iter().all(|i| i.done);
                let items = self
                    .items
                    .iter()
                    .cloned()
                    .map(|mut i| {
                        i.done = !all_done;
                        i
                    })
                    .collect();
                self.commit(items);
            }
            (Role::UndoControl, _) => self.undo(),
            (Role::RedoControl, _) => self.redo(),
            _ => {}
        }
    }

    fn undo(&mut self) {
        if self.can_undo() {
            self.restore(self.position - 1);
        }
    }

    fn redo(&mut self) {
        if self.can_redo() {
            self.restore(self.position + 1);
        }
    }

    fn submit(&mut self, key: ElementKey) {
        let draft = self.drafts.remove(&key).unwrap_or_default();
        match (key.role, key.uid) {
            (Role::NewItemInput, _) => {
                if let Some(label) = normalize_label(&draft) {
                    self.add(label);
                }
            }
            (Role::ItemEditInput | Role::ItemLabel, Some(uid)) => {
                if key.role == Role::ItemEditInput {
                    self.editing = None;
                }
                if let Some(label) = normalize_label(&draft) {
                    self.update(uid, |i| i.label = label);
                }
            }
            _ => {}
        }
    }
}

fn is_fillable(key: &ElementKey) -> bool {
    matches!(
        (key.view, key.role),
        (_, Role::NewItemInput)
            | (ViewKind::Main, Role::ItemEditInput)
            | (ViewKind::Step2, Role::ItemLabel)
    )
}

const fn tag_for(role: Role) -> &'static str {
    match role {
        Role::ItemRow => "li",
        Role::ItemLabel => "label",
        Role::NewItemInput | Role::ItemCheckbox | Role::ItemEditInput => "input",
        Role::ItemDeleteControl
        | Role::ClearCompletedControl
        | Role::UndoControl
        | Role::RedoControl => "button",
        Role::Counter => "span",
        Role::CounterValue => "strong",
        Role::FilterControl(_) => "a",
        Role::ToggleAllControl => "label",
        Role::DumpDocument => "pre",
    }
}

const fn filter_text(kind: FilterState) -> &'static str {
    match kind {
        FilterState::All => "Tous",
        FilterState::Active => "Actifs",
        FilterState::Completed => "Complétés",
    }
}

/// In-process todo page implementing [`Driver`]
#[derive(Debug)]
pub struct SimulatedApp {
    page: Mutex<Page>,
}

impl Default for SimulatedApp {
    fn default() -> Self {
        Self::new(SimOptions::default())
    }
}

impl SimulatedApp {
    /// Fresh page with no items and empty history
    #[must_use]
    pub fn new(options: SimOptions) -> Self {
        Self {
            page: Mutex::new(Page::new(options)),
        }
    }

    fn page(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load items as the page's initial state, adding them in order.
    ///
    /// Seeded items are not undoable and render immediately.
    pub fn seed(&self, labels: &[&str]) {
        let mut page = self.page();
        for label in labels {
            let uid = page.next_uid;
            page.next_uid += 1;
            page.items.insert(0, TodoItem::new(*label, false, uid));
        }
        page.snapshots = vec![page.items.clone()];
        page.position = 0;
        let items = page.items.clone();
        for r in page.rendered.values_mut() {
            r.items = items.clone();
            r.pending = 0;
        }
    }

    /// Labels of the application model, most recent first
    #[must_use]
    pub fn model_labels(&self) -> Vec<String> {
        self.page().items.iter().map(|i| i.label.clone()).collect()
    }

    /// Application model
    #[must_use]
    pub fn model_items(&self) -> Vec<TodoItem> {
        self.page().items.clone()
    }

    /// Current filter
    #[must_use]
    pub fn filter(&self) -> FilterState {
        self.page().filter
    }

    /// `(position, depth)` of the application's history
    #[must_use]
    pub fn history_position(&self) -> (usize, usize) {
        let page = self.page();
        (page.position, page.snapshots.len() - 1)
    }

    /// Replace the debug dump with arbitrary text
    pub fn corrupt_dump(&self, text: &str) {
        self.page().dump_override = Some(text.to_string());
    }

    /// Render the debug dump from the model again
    pub fn restore_dump(&self) {
        self.page().dump_override = None;
    }

    /// Recorded driver calls, `action:view/role`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.page().calls.clone()
    }

    /// Check if an action was performed
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.page()
            .calls
            .iter()
            .any(|c| c.split(':').next() == Some(method))
    }

    /// Number of recorded calls of one kind
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.page()
            .calls
            .iter()
            .filter(|c| c.split(':').next() == Some(method))
            .count()
    }

    /// Forget recorded calls
    pub fn clear_history(&self) {
        self.page().calls.clear();
    }
}

#[async_trait]
impl Driver for SimulatedApp {
    async fn locate(&self, query: &Query) -> DriverResult<Vec<ElementHandle>> {
        let mut page = self.page();
        page.tick(query.view());
        if query.is_void() {
            return Ok(Vec::new());
        }
        let keys = page.matches(query.view(), query.role());
        let keys: Vec<ElementKey> = match query.index() {
            Some(n) => n
                .checked_sub(1)
                .and_then(|i| keys.get(i).copied())
                .into_iter()
                .collect(),
            None => keys,
        };
        Ok(keys.into_iter().map(|k| page.handle_for(k)).collect())
    }

    async fn read(&self, handle: &ElementHandle, kind: ReadKind) -> DriverResult<Option<String>> {
        let page = self.page();
        let key = page.require(handle)?;
        page.read(&key, &kind)
    }

    async fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let page = self.page();
        let key = page.require(handle)?;
        Ok(page.visible(&key))
    }

    async fn is_checked(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let page = self.page();
        let key = page.require(handle)?;
        Ok(key.role == Role::ItemCheckbox && page.rendered_item(&key).is_some_and(|i| i.done))
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let page = self.page();
        let key = page.require(handle)?;
        Ok(page.enabled(&key))
    }

    async fn act(&self, handle: &ElementHandle, action: Action) -> DriverResult<()> {
        let mut page = self.page();
        let key = page.require(handle)?;
        page.calls
            .push(format!("{}:{}/{}", action.name(), key.view, key.role));
        match action {
            Action::Hover => {
                page.hovered = match (key.view, key.role) {
                    (
                        ViewKind::Main,
                        Role::ItemRow | Role::ItemLabel | Role::ItemCheckbox | Role::ItemDeleteControl,
                    ) => key.uid,
                    _ => None,
                };
            }
            Action::Click => {
                page.require_actionable(&key, handle)?;
                page.click(key);
            }
            Action::ForceClick => page.click(key),
            Action::DoubleClick => {
                page.require_actionable(&key, handle)?;
                if (key.view, key.role) == (ViewKind::Main, Role::ItemLabel)
                    && page.options.inline_editor_opens
                {
                    page.editing = key.uid;
                    page.drafts
                        .remove(&ElementKey { role: Role::ItemEditInput, ..key });
                }
            }
            Action::Fill(text) => {
                page.require_actionable(&key, handle)?;
                if !is_fillable(&key) {
                    return Err(DriverError::NotActionable {
                        handle: handle.id.clone(),
                        reason: "not an editable input".to_string(),
                    });
                }
                let text: String = text.chars().take(MAX_LABEL_CHARS).collect();
                page.drafts.insert(key, text);
            }
            Action::Press(k) => match k.as_str() {
                "Enter" => page.submit(key),
                "Escape" if key.role == Role::ItemEditInput => {
                    page.editing = None;
                    page.drafts.remove(&key);
                }
                _ => {}
            },
        }
        Ok(())
    }

    async fn wait_for(
        &self,
        handle: &ElementHandle,
        state: ElementState,
        timeout: Duration,
    ) -> DriverResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let reached = {
                let page = self.page();
                let key = page.require(handle)?;
                match state {
                    ElementState::Visible => page.visible(&key),
                    ElementState::Enabled | ElementState::Actionable => {
                        page.visible(&key) && page.enabled(&key)
                    }
                }
            };
            if reached {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
    }

    async fn press_keys(&self, chord: &str) -> DriverResult<()> {
        let mut page = self.page();
        page.calls.push(format!("press_keys:{chord}"));
        match chord {
            "Control+z" => page.undo(),
            "Control+y" => page.redo(),
            _ => {}
        }
        Ok(())
    }
}
