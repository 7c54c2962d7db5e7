//! The orchestrator: maintains coherence between runtime window state and
//! the desktop model.
//!
//! All model mutation happens on one logical queue. Runtime events, client
//! requests, and configuration changes are funneled into [`Event`] and
//! processed serially by [`LayoutEngine::handle_event`]; every handler is a
//! synchronous critical section, so no foreign await ever interleaves with
//! a half-applied mutation.

use std::rc::Rc;
use std::thread;

use serde_json::json;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tracing::{Span, debug, instrument, trace, warn};

use crate::common::config::Settings;
use crate::config::{ConfigError, ConfigObject, ConfigStore, Rule, Scope};
use crate::layout_engine::drag::DragManager;
use crate::layout_engine::preview::{PreviewHandler, PreviewPool};
use crate::layout_engine::snap_resolver::{SnapTarget, resolve_snap};
use crate::layout_engine::tab_resolver::{ZOrder, resolve_tab};
use crate::model::save_restore::{TabGroupBlob, save_model};
use crate::model::{
    DesktopModel, Entity, ModelEvent, SnapGroupId, TabGroupId, TabstripLayout, TransformType,
};
use crate::server::{ClientEvent, ClientSender, EngineError, Request, Response};
use crate::sys::geometry::{Point, Rect};
use crate::sys::runtime::{
    MouseState, RuntimeEvent, TxStore, WindowHandle, WindowId, WindowMode, WindowRuntime,
    WindowState,
};

/// Edge tolerance when deciding whether two snapped windows still touch.
const ADJACENCY_EPSILON: f64 = 1.0;

#[derive(Debug)]
pub enum Event {
    Runtime(RuntimeEvent),
    Request {
        request: Request,
        reply: Option<oneshot::Sender<Response>>,
    },
    ConfigAdd {
        source: Scope,
        config: ConfigObject,
        rules: Vec<Rule>,
    },
    ConfigRemove {
        source: Scope,
    },
}

pub struct Sender(UnboundedSender<(Span, Event)>);
pub type Receiver = UnboundedReceiver<(Span, Event)>;

pub fn channel() -> (Sender, Receiver) {
    let (tx, rx) = unbounded_channel();
    (Sender(tx), rx)
}

impl Sender {
    pub fn send(&self, event: Event) {
        // Send errors only mean the engine is shutting down.
        _ = self.try_send(event);
    }

    pub fn try_send(&self, event: Event) -> Result<(), SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }
}

impl Clone for Sender {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

pub struct LayoutEngine {
    settings: Settings,
    model: DesktopModel,
    config: ConfigStore,
    runtime: Rc<dyn WindowRuntime>,
    drag: DragManager,
    zorder: ZOrder,
    previews: PreviewPool,
    tx_store: TxStore,
    client_tx: Option<ClientSender>,
}

impl LayoutEngine {
    pub fn new(
        settings: Settings,
        runtime: Rc<dyn WindowRuntime>,
        preview: Box<dyn PreviewHandler>,
        client_tx: Option<ClientSender>,
    ) -> Self {
        let mut config = ConfigStore::new();
        config
            .add(Scope::Service, settings.service_config(), vec![])
            .expect("service layer carries no rules");
        let previews = PreviewPool::new(preview, settings.preview_pool_size);
        Self {
            settings,
            model: DesktopModel::new(),
            config,
            runtime,
            drag: DragManager::new(),
            zorder: ZOrder::new(),
            previews,
            tx_store: TxStore::new(),
            client_tx,
        }
    }

    /// Run the engine on its own thread. The runtime and preview handler
    /// are constructed inside the thread since neither needs to be `Send`.
    pub fn spawn(
        settings: Settings,
        make_runtime: impl FnOnce() -> Rc<dyn WindowRuntime> + Send + 'static,
        make_preview: impl FnOnce() -> Box<dyn PreviewHandler> + Send + 'static,
        client_tx: Option<ClientSender>,
    ) -> Sender {
        let (events_tx, events_rx) = channel();
        thread::Builder::new()
            .name("layout-engine".to_string())
            .spawn(move || {
                let engine =
                    LayoutEngine::new(settings, make_runtime(), make_preview(), client_tx);
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("tokio runtime");
                rt.block_on(engine.run(events_rx));
            })
            .unwrap();
        events_tx
    }

    pub fn model(&self) -> &DesktopModel { &self.model }

    pub async fn run(mut self, mut events: Receiver) {
        while let Some(first) = events.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = events.try_recv() {
                batch.push(next);
            }
            self.handle_batch(batch);
        }
    }

    /// Process a burst of queued events. A newer transform for a window
    /// supersedes an older unresolved one: the stale event still refreshes
    /// caches, but resolver work runs only for the newest.
    fn handle_batch(&mut self, batch: Vec<(Span, Event)>) {
        let mut superseded = vec![false; batch.len()];
        for (i, (_, event)) in batch.iter().enumerate() {
            let Event::Runtime(RuntimeEvent::BoundsChanged { id, .. }) = event else { continue };
            for (_, later) in batch.iter().skip(i + 1) {
                if let Event::Runtime(RuntimeEvent::BoundsChanged { id: later_id, .. }) = later {
                    if later_id == id {
                        superseded[i] = true;
                        break;
                    }
                }
            }
        }
        for (i, (span, event)) in batch.into_iter().enumerate() {
            let _guard = span.enter();
            match event {
                Event::Runtime(RuntimeEvent::BoundsChanged { id, rect, mouse })
                    if superseded[i] =>
                {
                    self.on_bounds_changed(id, rect, mouse, false);
                }
                other => self.handle_event(other),
            }
        }
    }

    #[instrument(name = "engine::handle_event", skip(self, event))]
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Runtime(runtime_event) => self.handle_runtime_event(runtime_event),
            Event::Request { request, reply } => {
                let response = self.handle_request(request);
                if let Some(reply) = reply {
                    _ = reply.send(response);
                }
            }
            Event::ConfigAdd { source, config, rules } => {
                if let Err(e) = self.add_config(source, config, rules) {
                    warn!(error = %e, "configuration entry rejected");
                }
            }
            Event::ConfigRemove { source } => self.remove_config_source(&source),
        }
    }

    fn handle_runtime_event(&mut self, event: RuntimeEvent) {
        match &event {
            RuntimeEvent::BoundsChanged { .. } | RuntimeEvent::MouseUp => {
                trace!(?event, "runtime event")
            }
            _ => debug!(?event, "runtime event"),
        }
        match event {
            RuntimeEvent::WindowCreated { id, state } => self.on_window_created(id, state),
            RuntimeEvent::WindowClosed(id) => self.teardown_window(id),
            RuntimeEvent::WindowFocused(id) => self.zorder.touch(&id),
            RuntimeEvent::BoundsChanged { id, rect, mouse } => {
                self.on_bounds_changed(id, rect, mouse, true)
            }
            RuntimeEvent::StateChanged { id, mode } => self.on_mode_changed(id, mode),
            RuntimeEvent::FrameChanged { id, frame } => self.on_frame_changed(id, frame),
            RuntimeEvent::HiddenChanged { id, hidden } => self.on_hidden_changed(id, hidden),
            RuntimeEvent::MouseUp => self.on_mouse_up(),
        }
    }

    // Window lifecycle

    fn on_window_created(&mut self, id: WindowId, state: WindowState) {
        let handle = WindowHandle::new(id.clone(), Rc::clone(&self.runtime));
        match self.model.create_window(id.clone(), state, handle) {
            Ok(_) => {
                let enabled = self.config.effective(&Scope::window(&id)).is_enabled();
                if let Some(window) = self.model.window_mut(&id) {
                    window.set_enabled(enabled);
                }
                self.zorder.touch(&id);
            }
            Err(e) => warn!(error = %e, "window registration refused"),
        }
    }

    fn teardown_window(&mut self, id: WindowId) {
        if self.drag.window() == Some(&id) {
            self.previews.hide_all();
            self.drag.reset();
        }
        self.zorder.remove(&id);
        self.tx_store.forget(&id);
        match self.model.remove_window(&id) {
            Ok(events) => self.fanout(events),
            Err(e) => trace!(error = %e, "teardown of unknown window ignored"),
        }
    }

    // Transforms

    fn on_bounds_changed(&mut self, id: WindowId, rect: Rect, mouse: MouseState, resolve: bool) {
        let Some(window) = self.model.window(&id) else { return };
        let group = window.snap_group();
        let old = window.rect();
        let engine_originated = self.tx_store.consume(&id, &rect);
        let transform =
            self.model.window_mut(&id).expect("window checked above").set_rect(rect);
        self.model.mark_group_stale(group);
        if engine_originated || transform.is_empty() {
            return;
        }

        let pure_move =
            transform.contains(TransformType::MOVE) && !transform.contains(TransformType::RESIZE);
        if mouse == MouseState::Down && pure_move {
            self.translate_siblings(&id, group, rect.center - old.center);
            if resolve {
                self.on_user_drag(id, group);
            }
        } else {
            // Strip geometry is authoritative for its tab bodies.
            if let Some(tab_group) = self.model.tab_group_with_strip(&id) {
                if let Err(e) = self.realign_tab_group(tab_group) {
                    warn!(error = %e, "tab realign failed");
                }
            }
            if mouse == MouseState::Up {
                // A programmatic move or resize can pull a window away from
                // the windows it was snapped to.
                match self.model.split_disconnected(group, ADJACENCY_EPSILON) {
                    Ok(events) => self.fanout(events),
                    Err(e) => warn!(error = %e, "split check failed"),
                }
            }
        }
    }

    /// Reposition every tab body to the region directly under the strip,
    /// spanning its width.
    fn realign_tab_group(&mut self, group: TabGroupId) -> Result<(), EngineError> {
        let (tabs, body) = {
            let tab_group = self
                .model
                .tab_group(group)
                .ok_or_else(|| EngineError::InvalidState("tab group vanished".into()))?;
            let strip = self
                .model
                .window(tab_group.tab_strip())
                .ok_or_else(|| EngineError::NotFound(tab_group.tab_strip().clone()))?
                .rect();
            let height = tab_group
                .active_tab()
                .and_then(|active| self.model.window(active))
                .map(|window| window.rect().height())
                .unwrap_or(strip.height());
            let body = Rect::from_origin_size(
                Point::new(strip.min().x, strip.max().y),
                Point::new(strip.width(), height),
            );
            (tab_group.tabs().to_vec(), body)
        };
        for tab in &tabs {
            self.write_bounds(tab, body)?;
        }
        Ok(())
    }

    /// Group cohesion: the whole snap group follows the dragged window.
    /// Followers move via engine-stamped writes so their echoes never read
    /// as user transforms.
    fn translate_siblings(&mut self, id: &WindowId, group: SnapGroupId, delta: Point) {
        if delta == Point::zero() {
            return;
        }
        let members: Vec<WindowId> = match self.model.snap_group(group) {
            Some(snap_group) if snap_group.is_grouped() => snap_group.windows().to_vec(),
            _ => return,
        };
        for member in members {
            if member == *id {
                continue;
            }
            let Some(window) = self.model.window(&member) else { continue };
            let target = window.rect().translate(delta);
            if self.write_bounds(&member, target).is_err() {
                self.teardown_window(member);
            }
        }
    }

    fn on_user_drag(&mut self, id: WindowId, group: SnapGroupId) {
        let Some(window) = self.model.window(&id) else { return };
        if !window.enabled() || !window.is_ready() {
            return;
        }
        let is_tabbed = window.tab_group().is_some();
        let effective = self.config.effective(&Scope::window(&id));
        if !effective.snap_enabled() && !effective.tab_enabled() {
            return;
        }

        self.drag.begin(id.clone(), group);
        self.drag.update_group(group);
        let cursor = self.runtime.mouse_position();

        let tab = if effective.tab_enabled() && !is_tabbed {
            resolve_tab(&self.model, &self.zorder, &id, cursor)
        } else {
            None
        };
        let snap = if tab.is_none() && effective.snap_enabled() {
            resolve_snap(&mut self.model, &self.config, &self.settings, group, cursor)
        } else {
            None
        };

        if let Some(tid) = tab {
            if let Some(rect) = self.model.entity_rect(&Entity::TabGroup(tid)) {
                self.previews.show(&[rect], true);
            }
        } else if let Some(ref target) = snap {
            let rects = self.preview_rects(group, target);
            self.previews.show(&rects, target.valid);
        } else {
            self.previews.hide_all();
        }
        self.drag.set_targets(snap, tab);
    }

    fn preview_rects(&self, group: SnapGroupId, target: &SnapTarget) -> Vec<Rect> {
        let Some(snap_group) = self.model.snap_group(group) else { return Vec::new() };
        snap_group
            .windows()
            .iter()
            .filter_map(|id| self.model.window(id))
            .filter(|w| w.visible_normal())
            .map(|w| w.rect().translate(target.offset))
            .collect()
    }

    // Commit

    fn on_mouse_up(&mut self) {
        if !self.drag.is_active() {
            return;
        }
        let group = self.drag.group();
        let (window, snap, tab) = self.drag.take();
        self.previews.hide_all();
        let Some(window) = window else { return };
        // The window may have been disabled or torn down mid-drag.
        if !self.model.window(&window).map_or(false, |w| w.enabled() && w.is_ready()) {
            return;
        }

        // A valid tab target takes priority over a snap target.
        if let Some(tid) = tab {
            if let Err(e) = self.commit_tab(&window, tid) {
                warn!(error = %e, "tab commit failed");
            }
            return;
        }
        let Some(target) = snap else { return };
        if !target.valid {
            debug!("drop on invalid target ignored");
            return;
        }
        if let Some(group) = group {
            self.commit_snap(group, &window, &target);
        }
    }

    fn commit_tab(&mut self, window: &WindowId, group: TabGroupId) -> Result<(), EngineError> {
        // The dropped window lands right after the current active tab, and
        // activation does not change.
        let index = {
            let tab_group = self
                .model
                .tab_group(group)
                .ok_or_else(|| EngineError::InvalidState("tab group vanished".into()))?;
            tab_group
                .active_tab()
                .and_then(|active| tab_group.tabs().iter().position(|t| t == active))
                .map(|i| i + 1)
        };
        self.add_tab_internal(group, window, index)
    }

    fn commit_snap(&mut self, group: SnapGroupId, window: &WindowId, target: &SnapTarget) {
        if let Some(half_size) = target.half_size {
            let resized = self
                .model
                .window(window)
                .map(|w| Rect::new(w.rect().center, half_size));
            if let Some(rect) = resized {
                if self.write_bounds(window, rect).is_err() {
                    warn!(window = %window, "snap aborted: resize failed");
                    self.teardown_window(window.clone());
                    return;
                }
            }
        }

        let members: Vec<WindowId> =
            self.model.snap_group(group).map(|g| g.windows().to_vec()).unwrap_or_default();
        for member in &members {
            let Some(w) = self.model.window(member) else { continue };
            let rect = w.rect().translate(target.offset);
            if self.write_bounds(member, rect).is_err() {
                warn!(window = %member, "snap aborted: translation failed");
                self.teardown_window(member.clone());
                return;
            }
        }

        match self.model.merge_groups(group, target.group) {
            Ok(events) => self.fanout(events),
            Err(e) => {
                // Partial merges roll back through the previous-group
                // pointers each window carries.
                warn!(error = %e, "snap merge failed; restoring previous groups");
                for member in &members {
                    let prev = self.model.window(member).and_then(|w| w.prev_snap_group());
                    if let Some(prev) = prev.filter(|p| self.model.snap_group(*p).is_some()) {
                        if let Ok(events) = self.model.attach_window(member, prev) {
                            self.fanout(events);
                        }
                    }
                }
            }
        }
    }

    /// Issue a frame write for a window and keep the cache coherent. The
    /// echoed bounds event is consumed through the transaction store.
    fn write_bounds(&mut self, id: &WindowId, rect: Rect) -> Result<(), EngineError> {
        let Some(window) = self.model.window(id) else {
            return Err(EngineError::NotFound(id.clone()));
        };
        if !window.is_ready() {
            return Ok(());
        }
        let handle = window.handle().clone();
        handle.set_bounds(rect)?;
        self.tx_store.record(id, rect);
        let group = {
            let window = self.model.window_mut(id).expect("window checked above");
            window.set_rect(rect);
            window.snap_group()
        };
        self.model.mark_group_stale(group);
        Ok(())
    }

    // Membership re-validation

    fn on_mode_changed(&mut self, id: WindowId, mode: WindowMode) {
        let Some(window) = self.model.window_mut(&id) else { return };
        if !window.set_mode(mode) {
            return;
        }
        let group = window.snap_group();
        self.model.mark_group_stale(group);
        if mode != WindowMode::Normal {
            if self.model.tab_group_of(&id).is_some() {
                if let Err(e) = self.remove_tab_internal(&id) {
                    warn!(error = %e, "tab removal on state change failed");
                }
            }
            self.revalidate_membership(&id);
        }
        // Restoring to normal does not re-snap; that takes a user drag.
    }

    fn on_frame_changed(&mut self, id: WindowId, frame: bool) {
        let Some(window) = self.model.window_mut(&id) else { return };
        if window.set_frame(frame) {
            self.revalidate_membership(&id);
        }
    }

    fn on_hidden_changed(&mut self, id: WindowId, hidden: bool) {
        let Some(window) = self.model.window_mut(&id) else { return };
        if !window.set_hidden(hidden) {
            return;
        }
        let group = window.snap_group();
        self.model.mark_group_stale(group);
        // Tab bodies are hidden and shown by the tab machinery itself;
        // only a free window's visibility affects its membership.
        if self.model.tab_group_of(&id).is_none() {
            self.revalidate_membership(&id);
        }
    }

    /// A window whose eligibility changed leaves its multi-window group.
    fn revalidate_membership(&mut self, id: &WindowId) {
        let Some(group) = self.model.snap_group_of(id) else { return };
        if self.model.snap_group(group).map_or(false, |g| g.is_grouped()) {
            if self.drag.window() == Some(id) {
                self.previews.hide_all();
                self.drag.reset();
            }
            match self.model.detach_to_singleton(id) {
                Ok((_, events)) => self.fanout(events),
                Err(e) => warn!(error = %e, "membership re-validation failed"),
            }
        }
    }

    // Configuration

    pub fn add_config(
        &mut self,
        source: Scope,
        config: ConfigObject,
        rules: Vec<Rule>,
    ) -> Result<(), ConfigError> {
        self.config.add(source, config, rules)?;
        self.apply_config_effects();
        Ok(())
    }

    pub fn remove_config_source(&mut self, source: &Scope) {
        self.config.remove_from_source(source);
        self.apply_config_effects();
    }

    pub fn config(&self) -> &ConfigStore { &self.config }

    /// Re-evaluate `enabled` for every window after a store mutation.
    /// Disabling evicts the window from its tab and snap groups; enabling
    /// only re-admits it, re-grouping takes a user drag.
    fn apply_config_effects(&mut self) {
        for id in self.model.window_ids() {
            let enabled = self.config.effective(&Scope::window(&id)).is_enabled();
            let current = self.model.window(&id).map_or(true, |w| w.enabled());
            if current == enabled {
                continue;
            }
            if enabled {
                debug!(window = %id, "window re-enabled by configuration");
                if let Some(window) = self.model.window_mut(&id) {
                    window.set_enabled(true);
                }
            } else {
                debug!(window = %id, "window disabled by configuration");
                if self.model.tab_group_of(&id).is_some() {
                    if let Err(e) = self.remove_tab_internal(&id) {
                        warn!(error = %e, "tab eviction failed");
                    }
                }
                match self.model.detach_to_singleton(&id) {
                    Ok((_, events)) => self.fanout(events),
                    Err(e) => warn!(error = %e, "snap eviction failed"),
                }
                if let Some(window) = self.model.window_mut(&id) {
                    window.set_enabled(false);
                }
            }
        }
    }

    // Client requests

    pub fn handle_request(&mut self, request: Request) -> Response {
        debug!(?request, "client request");
        let result = match request {
            Request::Undock { id } => self.undock(&id),
            Request::ExplodeGroup { id } => self.explode_group(&id),
            Request::GetTabs { id } => self.get_tabs(&id),
            Request::CreateTabGroup { ids } => self.create_tab_group(&ids),
            Request::AddTab { group_id, id } => self.client_add_tab(group_id, &id),
            Request::RemoveTab { id } => self.remove_tab_internal(&id).map(|()| None),
            Request::SwitchTab { group_id, id } => self.client_switch_tab(group_id, &id),
            Request::SetActiveTab { id } => self.set_active_tab(&id),
            Request::GetSaveInfo => {
                Ok(Some(serde_json::to_value(save_model(&self.model)).unwrap_or_default()))
            }
            Request::Restore { blob } => self.restore(blob),
        };
        Response::from(result)
    }

    fn undock(&mut self, id: &WindowId) -> Result<Option<serde_json::Value>, EngineError> {
        if !self.model.contains_window(id) {
            return Err(EngineError::NotFound(id.clone()));
        }
        if self.model.tab_group_of(id).is_some() {
            self.remove_tab_internal(id)?;
        }
        let (_, events) = self.model.detach_to_singleton(id)?;
        self.fanout(events);
        Ok(None)
    }

    fn explode_group(&mut self, id: &WindowId) -> Result<Option<serde_json::Value>, EngineError> {
        let group =
            self.model.snap_group_of(id).ok_or_else(|| EngineError::NotFound(id.clone()))?;
        let members: Vec<WindowId> =
            self.model.snap_group(group).map(|g| g.windows().to_vec()).unwrap_or_default();
        for member in members {
            let (_, events) = self.model.detach_to_singleton(&member)?;
            self.fanout(events);
        }
        Ok(None)
    }

    fn get_tabs(&mut self, id: &WindowId) -> Result<Option<serde_json::Value>, EngineError> {
        if !self.model.contains_window(id) {
            return Err(EngineError::NotFound(id.clone()));
        }
        let Some(tid) = self.model.tab_group_of(id) else {
            return Ok(Some(serde_json::Value::Null));
        };
        let group = self.model.tab_group(tid).expect("membership pointer is live");
        Ok(Some(json!({
            "group_id": group.seq(),
            "tabs": group.tabs(),
            "active": group.active_tab(),
        })))
    }

    fn create_tab_group(
        &mut self,
        ids: &[WindowId],
    ) -> Result<Option<serde_json::Value>, EngineError> {
        if ids.len() < 2 {
            return Err(EngineError::InvalidState("a tab group needs at least two windows".into()));
        }
        for id in ids {
            let window =
                self.model.window(id).ok_or_else(|| EngineError::NotFound(id.clone()))?;
            if window.tab_group().is_some() {
                return Err(EngineError::InvalidState(format!("{id} is already tabbed")));
            }
            let effective = self.config.effective(&Scope::window(id));
            if !window.enabled() || !effective.tab_enabled() {
                return Err(EngineError::Disabled(id.clone()));
            }
        }

        let first = &ids[0];
        let effective = self.config.effective(&Scope::window(first));
        let tabstrip = effective.tabstrip.unwrap_or_default();
        let url = tabstrip.url.unwrap_or_else(|| self.settings.tabstrip.url.clone());
        let height = tabstrip.height.unwrap_or(self.settings.tabstrip.height);

        let anchor = self.model.window(first).expect("validated above").rect();
        let strip_rect = Rect::from_origin_size(
            Point::new(anchor.min().x, anchor.min().y - height),
            Point::new(anchor.width(), height),
        );
        let group = self.spawn_tab_group(&url, height, strip_rect)?;
        for id in ids {
            self.add_tab_internal(group, id, None)?;
        }
        let seq = self.model.tab_group(group).map(|g| g.seq()).unwrap_or_default();
        Ok(Some(json!({ "group_id": seq })))
    }

    /// Create the strip window and register the group around it. The group
    /// only comes into existence once the strip's initial state is known,
    /// so there is never a half-initialized strip in the model.
    fn spawn_tab_group(
        &mut self,
        url: &str,
        height: f64,
        strip_rect: Rect,
    ) -> Result<TabGroupId, EngineError> {
        let (strip_id, strip_state) = self.runtime.create_tab_strip(url, strip_rect)?;
        let handle = WindowHandle::new(strip_id.clone(), Rc::clone(&self.runtime));
        self.model.create_window(strip_id.clone(), strip_state, handle)?;
        let layout = TabstripLayout { url: url.to_string(), height };
        Ok(self.model.create_tab_group(&strip_id, layout)?)
    }

    fn client_add_tab(
        &mut self,
        group_seq: u64,
        id: &WindowId,
    ) -> Result<Option<serde_json::Value>, EngineError> {
        let group = self
            .model
            .tab_group_by_seq(group_seq)
            .ok_or(EngineError::GroupNotFound(group_seq))?;
        let window = self.model.window(id).ok_or_else(|| EngineError::NotFound(id.clone()))?;
        if !window.enabled() || !self.config.effective(&Scope::window(id)).tab_enabled() {
            return Err(EngineError::Disabled(id.clone()));
        }
        self.add_tab_internal(group, id, None)?;
        Ok(None)
    }

    fn add_tab_internal(
        &mut self,
        group: TabGroupId,
        id: &WindowId,
        index: Option<usize>,
    ) -> Result<(), EngineError> {
        let body = {
            let tab_group = self
                .model
                .tab_group(group)
                .ok_or_else(|| EngineError::InvalidState("tab group vanished".into()))?;
            tab_group
                .active_tab()
                .and_then(|active| self.model.window(active))
                .map(|window| window.rect())
        };
        let current =
            self.model.window(id).ok_or_else(|| EngineError::NotFound(id.clone()))?.rect();

        let events = self.model.add_tab(group, id, index)?;
        if events.is_empty() {
            return Ok(());
        }
        if let Some(window) = self.model.window_mut(id) {
            window.set_saved_bounds(Some(current));
        }
        // The new tab adopts the shared body region; only the active tab
        // stays visible.
        if let Some(body) = body {
            self.write_bounds(id, body)?;
        }
        let is_active =
            self.model.tab_group(group).and_then(|g| g.active_tab()) == Some(id);
        if !is_active {
            if let Some(window) = self.model.window(id) {
                _ = window.handle().hide();
            }
            if let Some(window) = self.model.window_mut(id) {
                window.set_hidden(true);
            }
        }
        self.fanout(events);
        Ok(())
    }

    fn remove_tab_internal(&mut self, id: &WindowId) -> Result<(), EngineError> {
        let removal = self.model.remove_tab(id)?;
        self.fanout(removal.events);

        // On collapse the strip goes away first: a lone surviving tab must
        // not observe itself leaving a group that only held the strip.
        let survivor = if let Some((strip, survivor)) = removal.collapsed {
            if let Some(window) = self.model.window(&strip) {
                _ = window.handle().close(true);
            }
            if self.model.contains_window(&strip) {
                match self.model.remove_window(&strip) {
                    Ok(events) => self.fanout(events),
                    Err(e) => warn!(error = %e, "strip teardown failed"),
                }
            }
            self.zorder.remove(&strip);
            self.tx_store.forget(&strip);
            survivor
        } else {
            None
        };

        // The removed tab becomes a standalone window at its pre-tab
        // bounds.
        self.restore_standalone(id)?;
        let (_, events) = self.model.detach_to_singleton(id)?;
        self.fanout(events);

        if let Some(survivor) = survivor {
            self.restore_standalone(&survivor)?;
            let (_, events) = self.model.detach_to_singleton(&survivor)?;
            self.fanout(events);
        }
        if let Some(next) = removal.new_active {
            self.set_tab_visibility(&next, true);
        }
        Ok(())
    }

    /// Dissolve a tab group outright. With `close_apps` the tab windows are
    /// closed along with the strip; otherwise they are restored to their
    /// pre-tab bounds as standalone windows.
    pub fn close_tab_group(
        &mut self,
        group: TabGroupId,
        close_apps: bool,
    ) -> Result<(), EngineError> {
        let (strip, tabs) = {
            let tab_group = self
                .model
                .tab_group(group)
                .ok_or_else(|| EngineError::InvalidState("tab group vanished".into()))?;
            (tab_group.tab_strip().clone(), tab_group.tabs().to_vec())
        };
        let events = self.model.destroy_tab_group(group)?;
        self.fanout(events);

        if let Some(window) = self.model.window(&strip) {
            _ = window.handle().close(true);
        }
        if self.model.contains_window(&strip) {
            match self.model.remove_window(&strip) {
                Ok(events) => self.fanout(events),
                Err(e) => warn!(error = %e, "strip teardown failed"),
            }
        }
        self.zorder.remove(&strip);
        self.tx_store.forget(&strip);

        for tab in &tabs {
            if close_apps {
                if let Some(window) = self.model.window(tab) {
                    _ = window.handle().close(false);
                }
                self.teardown_window(tab.clone());
            } else {
                self.restore_standalone(tab)?;
                let (_, events) = self.model.detach_to_singleton(tab)?;
                self.fanout(events);
            }
        }
        Ok(())
    }

    fn restore_standalone(&mut self, id: &WindowId) -> Result<(), EngineError> {
        let saved = self.model.window(id).and_then(|w| w.saved_bounds());
        if let Some(bounds) = saved {
            self.write_bounds(id, bounds)?;
        }
        if let Some(window) = self.model.window_mut(id) {
            window.set_saved_bounds(None);
        }
        self.set_tab_visibility(id, true);
        Ok(())
    }

    fn set_tab_visibility(&mut self, id: &WindowId, visible: bool) {
        if let Some(window) = self.model.window(id) {
            _ = if visible { window.handle().show() } else { window.handle().hide() };
        }
        if let Some(window) = self.model.window_mut(id) {
            window.set_hidden(!visible);
        }
    }

    fn client_switch_tab(
        &mut self,
        group_seq: u64,
        id: &WindowId,
    ) -> Result<Option<serde_json::Value>, EngineError> {
        let group = self
            .model
            .tab_group_by_seq(group_seq)
            .ok_or(EngineError::GroupNotFound(group_seq))?;
        self.switch_tab_internal(group, id)?;
        Ok(None)
    }

    fn set_active_tab(&mut self, id: &WindowId) -> Result<Option<serde_json::Value>, EngineError> {
        let group = self
            .model
            .tab_group_of(id)
            .ok_or_else(|| EngineError::InvalidState(format!("{id} is not a tab")))?;
        self.switch_tab_internal(group, id)?;
        Ok(None)
    }

    fn switch_tab_internal(
        &mut self,
        group: TabGroupId,
        id: &WindowId,
    ) -> Result<(), EngineError> {
        let previous = self.model.tab_group(group).and_then(|g| g.active_tab()).cloned();
        let events = self.model.set_active_tab(group, id)?;
        if events.is_empty() {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.set_tab_visibility(&previous, false);
        }
        self.set_tab_visibility(id, true);
        self.zorder.touch(id);
        self.fanout(events);
        Ok(())
    }

    // Save / restore

    fn restore(
        &mut self,
        blobs: Vec<TabGroupBlob>,
    ) -> Result<Option<serde_json::Value>, EngineError> {
        let mut restored = 0usize;
        for blob in blobs {
            let surviving: Vec<WindowId> = blob
                .tabs
                .iter()
                .filter(|id| self.model.contains_window(id))
                .cloned()
                .collect();
            if surviving.len() < 2 {
                debug!(
                    missing = blob.tabs.len() - surviving.len(),
                    "skipping tab group with too few surviving tabs"
                );
                continue;
            }
            let dimensions = blob.group_info.dimensions;
            let body = dimensions.body_rect();
            let group = match self.spawn_tab_group(
                &blob.group_info.url,
                dimensions.tab_group_height as f64,
                dimensions.strip_rect(),
            ) {
                Ok(group) => group,
                Err(e) => {
                    warn!(error = %e, "could not recreate tab strip; skipping group");
                    continue;
                }
            };
            for tab in &surviving {
                self.write_bounds(tab, body)?;
                self.add_tab_internal(group, tab, None)?;
            }
            let active = if surviving.contains(&blob.group_info.active) {
                blob.group_info.active.clone()
            } else {
                surviving[0].clone()
            };
            self.switch_tab_internal(group, &active)?;
            // Make visibility explicit for every restored tab.
            for tab in &surviving {
                self.set_tab_visibility(tab, *tab == active);
            }
            restored += 1;
        }
        Ok(Some(json!({ "restored": restored })))
    }

    // Fan-out

    fn fanout(&mut self, events: Vec<ModelEvent>) {
        for event in events {
            trace!(?event, "model event");
            let client_event = match event {
                ModelEvent::JoinedSnapGroup { window, .. } => {
                    Some(ClientEvent::JoinSnapGroup(window))
                }
                ModelEvent::LeftSnapGroup { window, .. } => {
                    Some(ClientEvent::LeaveSnapGroup(window))
                }
                ModelEvent::JoinedTabGroup { window, .. } => {
                    Some(ClientEvent::JoinTabGroup(window))
                }
                ModelEvent::LeftTabGroup { window, .. } => {
                    Some(ClientEvent::LeaveTabGroup(window))
                }
                ModelEvent::TabActivated { window, .. } => {
                    Some(ClientEvent::TabActivated(window))
                }
                ModelEvent::SnapGroupRemoved(_) | ModelEvent::TabGroupRemoved { .. } => None,
            };
            if let (Some(event), Some(tx)) = (client_event, self.client_tx.as_ref()) {
                // Strip windows are service UI; clients never hear about
                // them.
                if !self.model.is_tab_strip(event.window()) {
                    _ = tx.send(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::Span;

    use super::*;
    use crate::config::{RegexPattern, ScopeLevel, ScopePattern, StringMatch};
    use crate::layout_engine::preview::NoopPreview;
    use crate::layout_engine::testing::{Command, FakeRuntime};
    use crate::server::{ClientReceiver, ErrorKind, client_channel};

    fn wid(name: &str) -> WindowId { WindowId::new("app", name) }

    struct Harness {
        engine: LayoutEngine,
        runtime: Rc<FakeRuntime>,
        client_rx: ClientReceiver,
    }

    impl Harness {
        fn new() -> Self {
            let runtime = Rc::new(FakeRuntime::new());
            let (client_tx, client_rx) = client_channel();
            let engine = LayoutEngine::new(
                Settings::default(),
                runtime.clone(),
                Box::new(NoopPreview),
                Some(client_tx),
            );
            Self { engine, runtime, client_rx }
        }

        fn create_window(&mut self, name: &str, cx: f64, cy: f64, hx: f64, hy: f64) {
            let state = WindowState {
                rect: Rect::new(Point::new(cx, cy), Point::new(hx, hy)),
                ..Default::default()
            };
            self.engine.handle_event(Event::Runtime(RuntimeEvent::WindowCreated {
                id: wid(name),
                state,
            }));
        }

        fn rect_of(&self, name: &str) -> Rect {
            self.engine.model().window(&wid(name)).expect("window exists").rect()
        }

        fn group_of(&self, name: &str) -> SnapGroupId {
            self.engine.model().snap_group_of(&wid(name)).expect("window exists")
        }

        fn group_len(&self, name: &str) -> usize {
            self.engine.model().snap_group(self.group_of(name)).unwrap().len()
        }

        /// One drag frame: the user moves `name` by `(dx, dy)` with the
        /// button held; the cursor follows the window center.
        fn drag_by(&mut self, name: &str, dx: f64, dy: f64) {
            let rect = self.rect_of(name).translate(Point::new(dx, dy));
            self.runtime.set_mouse(rect.center);
            self.engine.handle_event(Event::Runtime(RuntimeEvent::BoundsChanged {
                id: wid(name),
                rect,
                mouse: MouseState::Down,
            }));
        }

        fn release(&mut self) {
            self.engine.handle_event(Event::Runtime(RuntimeEvent::MouseUp));
        }

        fn client_events(&mut self) -> Vec<ClientEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.client_rx.try_recv() {
                events.push(event);
            }
            events
        }

        fn request(&mut self, request: Request) -> Response {
            self.engine.handle_request(request)
        }

        fn tab_group_seq(&self, name: &str) -> u64 {
            let tid = self.engine.model().tab_group_of(&wid(name)).expect("window is tabbed");
            self.engine.model().tab_group(tid).unwrap().seq()
        }

        fn make_tab_group(&mut self, names: &[&str]) -> u64 {
            let ids: Vec<WindowId> = names.iter().map(|n| wid(n)).collect();
            let response = self.request(Request::CreateTabGroup { ids });
            assert!(response.is_ok(), "create_tab_group failed: {response:?}");
            response.data().unwrap()["group_id"].as_u64().unwrap()
        }
    }

    #[test]
    fn test_snap_on_release() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 220.0, 100.0, 50.0, 50.0);
        harness.client_events();

        harness.drag_by("b", -18.0, 0.0);
        assert_eq!(harness.rect_of("b").center, Point::new(202.0, 100.0));
        assert_eq!(harness.engine.drag.phase(), crate::layout_engine::DragPhase::PreviewValid);

        harness.release();
        assert_eq!(harness.rect_of("b").center, Point::new(200.0, 100.0));
        assert_eq!(harness.runtime.bounds_of(&wid("b")).unwrap().center, Point::new(200.0, 100.0));
        assert_eq!(harness.group_of("a"), harness.group_of("b"));
        assert_eq!(harness.group_len("a"), 2);

        let events = harness.client_events();
        assert!(events.contains(&ClientEvent::JoinSnapGroup(wid("a"))));
        assert!(events.contains(&ClientEvent::JoinSnapGroup(wid("b"))));
    }

    #[test]
    fn test_no_snap_beyond_radius() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 260.0, 100.0, 50.0, 50.0);

        harness.drag_by("b", -18.0, 0.0);
        harness.release();

        assert_eq!(harness.rect_of("b").center, Point::new(242.0, 100.0));
        assert_ne!(harness.group_of("a"), harness.group_of("b"));
        assert_eq!(harness.group_len("a"), 1);
        assert_eq!(harness.group_len("b"), 1);
    }

    #[test]
    fn test_snap_commit_is_pure_translation() {
        let mut harness = Harness::new();
        harness.create_window("target", 500.0, 100.0, 50.0, 50.0);
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 200.0, 100.0, 50.0, 50.0);

        // Snap a and b together first.
        harness.drag_by("b", -0.5, 0.0);
        harness.release();
        assert_eq!(harness.group_of("a"), harness.group_of("b"));

        // Drag the pair toward the target; b's right edge ends 10px short.
        harness.drag_by("b", 190.0, 0.0);
        let a_before = harness.rect_of("a");
        let b_before = harness.rect_of("b");
        harness.release();

        let offset = Point::new(10.0, 0.0);
        assert_eq!(harness.rect_of("a").center, a_before.center + offset);
        assert_eq!(harness.rect_of("b").center, b_before.center + offset);
        assert_eq!(harness.group_len("target"), 3);
    }

    #[test]
    fn test_group_moves_as_a_unit() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 202.0, 100.0, 50.0, 50.0);
        harness.drag_by("b", -1.0, 0.0);
        harness.release();
        assert_eq!(harness.group_of("a"), harness.group_of("b"));

        let a_before = harness.rect_of("a");
        harness.drag_by("b", 40.0, 25.0);
        assert_eq!(harness.rect_of("a").center, a_before.center + Point::new(40.0, 25.0));
        harness.release();
    }

    #[test]
    fn test_follower_echo_is_not_a_user_transform() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 202.0, 100.0, 50.0, 50.0);
        harness.drag_by("b", -1.0, 0.0);
        harness.release();

        harness.drag_by("b", 40.0, 0.0);
        // The runtime echoes the follower's engine-requested move.
        let a_rect = harness.rect_of("a");
        harness.engine.handle_event(Event::Runtime(RuntimeEvent::BoundsChanged {
            id: wid("a"),
            rect: a_rect,
            mouse: MouseState::Down,
        }));
        // No cohesion cascade: b did not move again.
        assert_eq!(harness.rect_of("b").center, Point::new(240.0, 100.0));
        harness.release();
    }

    #[test]
    fn test_disable_rule_evicts_and_blocks() {
        let mut harness = Harness::new();
        harness.create_window("w1", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("w2", 202.0, 100.0, 50.0, 50.0);
        harness.drag_by("w1", 1.0, 0.0);
        harness.release();
        assert_eq!(harness.group_of("w1"), harness.group_of("w2"));
        harness.client_events();

        harness.engine.handle_event(Event::ConfigAdd {
            source: Scope::Service,
            config: ConfigObject::default(),
            rules: vec![Rule {
                scope: ScopePattern {
                    level: ScopeLevel::Window,
                    uuid: Some(StringMatch::Literal("app".into())),
                    name: Some(StringMatch::Literal("w1".into())),
                },
                config: ConfigObject { enabled: Some(false), ..Default::default() },
            }],
        });

        assert_ne!(harness.group_of("w1"), harness.group_of("w2"));
        assert!(!harness.engine.model().window(&wid("w1")).unwrap().enabled());
        let events = harness.client_events();
        assert!(events.contains(&ClientEvent::LeaveSnapGroup(wid("w1"))));

        // Subsequent drags near w2 resolve nothing.
        harness.drag_by("w1", 1.0, 0.0);
        assert_eq!(harness.engine.drag.phase(), crate::layout_engine::DragPhase::Idle);
        harness.release();
        assert_eq!(harness.group_len("w1"), 1);
    }

    #[test]
    fn test_regex_rule_disables_matching_windows() {
        let mut harness = Harness::new();
        harness.create_window("tool-1", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("main", 300.0, 100.0, 50.0, 50.0);

        harness.engine.handle_event(Event::ConfigAdd {
            source: Scope::Service,
            config: ConfigObject::default(),
            rules: vec![Rule {
                scope: ScopePattern {
                    level: ScopeLevel::Window,
                    uuid: None,
                    name: Some(StringMatch::Pattern(RegexPattern {
                        expression: "^tool-".into(),
                        flags: None,
                        invert: false,
                    })),
                },
                config: ConfigObject { enabled: Some(false), ..Default::default() },
            }],
        });

        assert!(!harness.engine.model().window(&wid("tool-1")).unwrap().enabled());
        assert!(harness.engine.model().window(&wid("main")).unwrap().enabled());
    }

    #[test]
    fn test_tab_on_drop_inserts_after_active() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.create_window("z", 1000.0, 300.0, 80.0, 80.0);
        let seq = harness.make_tab_group(&["x", "y"]);
        harness.client_events();

        // Drag z so the cursor lands inside x's body.
        harness.drag_by("z", -800.0, 0.0);
        harness.release();

        let tid = harness.engine.model().tab_group_of(&wid("z")).expect("z joined the group");
        let group = harness.engine.model().tab_group(tid).unwrap();
        assert_eq!(group.seq(), seq);
        assert_eq!(group.tabs(), &[wid("x"), wid("z"), wid("y")]);
        assert_eq!(group.active_tab(), Some(&wid("x")));
        // z shares the body region and is hidden behind the active tab.
        assert_eq!(harness.rect_of("z"), harness.rect_of("x"));
        assert!(harness.engine.model().window(&wid("z")).unwrap().state().hidden);

        let events = harness.client_events();
        assert!(events.contains(&ClientEvent::JoinTabGroup(wid("z"))));
    }

    #[test]
    fn test_drag_inside_own_tab_group_is_not_a_target() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.make_tab_group(&["x", "y"]);

        harness.runtime.set_mouse(Point::new(200.0, 300.0));
        harness.drag_by("x", 2.0, 0.0);
        assert_eq!(harness.engine.drag.tab_target(), None);
        harness.release();
    }

    #[test]
    fn test_tab_group_collapse_restores_survivor() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        let y_before = harness.rect_of("y");
        harness.make_tab_group(&["x", "y"]);
        assert_eq!(harness.rect_of("y"), harness.rect_of("x"));
        harness.client_events();

        let response = harness.request(Request::RemoveTab { id: wid("x") });
        assert!(response.is_ok());

        assert_eq!(harness.engine.model().tab_group_ids().len(), 0);
        assert_eq!(harness.rect_of("y"), y_before);
        assert_eq!(harness.group_len("y"), 1);
        assert!(!harness.engine.model().window(&wid("y")).unwrap().state().hidden);
        // The strip window is gone from the model.
        assert_eq!(harness.engine.model().window_count(), 2);

        let events = harness.client_events();
        assert!(events.contains(&ClientEvent::LeaveTabGroup(wid("x"))));
        assert!(events.contains(&ClientEvent::LeaveTabGroup(wid("y"))));
        // The lone survivor never hears it left a snap group.
        assert!(!events.contains(&ClientEvent::LeaveSnapGroup(wid("y"))));
    }

    #[test]
    fn test_switch_tab_is_idempotent() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        let seq = harness.make_tab_group(&["x", "y"]);
        harness.client_events();

        let response = harness.request(Request::SwitchTab { group_id: seq, id: wid("y") });
        assert!(response.is_ok());
        assert!(harness.engine.model().window(&wid("x")).unwrap().state().hidden);
        assert!(!harness.engine.model().window(&wid("y")).unwrap().state().hidden);
        let first = harness.client_events();
        assert!(first.contains(&ClientEvent::TabActivated(wid("y"))));

        let response = harness.request(Request::SwitchTab { group_id: seq, id: wid("y") });
        assert!(response.is_ok());
        assert!(harness.client_events().is_empty());
    }

    #[test]
    fn test_double_add_tab_is_noop() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.create_window("z", 1000.0, 300.0, 80.0, 80.0);
        let seq = harness.make_tab_group(&["x", "y"]);

        assert!(harness.request(Request::AddTab { group_id: seq, id: wid("z") }).is_ok());
        let tabs_before: Vec<WindowId> = {
            let tid = harness.engine.model().tab_group_of(&wid("z")).unwrap();
            harness.engine.model().tab_group(tid).unwrap().tabs().to_vec()
        };
        assert!(harness.request(Request::AddTab { group_id: seq, id: wid("z") }).is_ok());
        let tid = harness.engine.model().tab_group_of(&wid("z")).unwrap();
        assert_eq!(harness.engine.model().tab_group(tid).unwrap().tabs(), &tabs_before[..]);
    }

    #[test]
    fn test_minimize_evicts_from_group() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 202.0, 100.0, 50.0, 50.0);
        harness.drag_by("b", -1.0, 0.0);
        harness.release();
        assert_eq!(harness.group_len("a"), 2);

        harness.engine.handle_event(Event::Runtime(RuntimeEvent::StateChanged {
            id: wid("b"),
            mode: WindowMode::Minimized,
        }));
        assert_eq!(harness.group_len("a"), 1);
        assert_eq!(harness.group_len("b"), 1);

        // Restoring does not re-snap.
        harness.engine.handle_event(Event::Runtime(RuntimeEvent::StateChanged {
            id: wid("b"),
            mode: WindowMode::Normal,
        }));
        assert_eq!(harness.group_len("b"), 1);
    }

    #[test]
    fn test_programmatic_move_splits_disconnected_group() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 202.0, 100.0, 50.0, 50.0);
        harness.drag_by("b", -2.0, 0.0);
        harness.release();
        assert_eq!(harness.group_len("a"), 2);

        // The application teleports b away with no mouse involved.
        harness.engine.handle_event(Event::Runtime(RuntimeEvent::BoundsChanged {
            id: wid("b"),
            rect: Rect::new(Point::new(900.0, 600.0), Point::new(50.0, 50.0)),
            mouse: MouseState::Up,
        }));
        assert_ne!(harness.group_of("a"), harness.group_of("b"));
    }

    #[test]
    fn test_runtime_failure_aborts_commit() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 220.0, 100.0, 50.0, 50.0);

        harness.drag_by("b", -18.0, 0.0);
        harness.runtime.fail_window(wid("b"));
        harness.release();

        // The vanished window is torn down and no merge happened.
        assert!(harness.engine.model().window(&wid("b")).is_none());
        assert_eq!(harness.group_len("a"), 1);
    }

    #[test]
    fn test_undock_and_explode() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 202.0, 100.0, 50.0, 50.0);
        harness.create_window("c", 100.0, 202.0, 50.0, 50.0);
        harness.drag_by("b", -1.0, 0.0);
        harness.release();
        harness.drag_by("c", 0.0, -1.0);
        harness.release();
        assert_eq!(harness.group_len("a"), 3);

        assert!(harness.request(Request::Undock { id: wid("b") }).is_ok());
        assert_eq!(harness.group_len("b"), 1);
        assert_eq!(harness.group_len("a"), 2);

        assert!(harness.request(Request::ExplodeGroup { id: wid("a") }).is_ok());
        assert_eq!(harness.group_len("a"), 1);
        assert_eq!(harness.group_len("c"), 1);

        let response = harness.request(Request::Undock { id: wid("ghost") });
        assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut harness = Harness::new();
        for (name, cx) in [("a", 200.0), ("b", 600.0), ("c", 1000.0), ("d", 1400.0), ("e", 1800.0)]
        {
            harness.create_window(name, cx, 400.0, 100.0, 150.0);
        }
        let t1 = harness.make_tab_group(&["a", "b"]);
        let t2 = harness.make_tab_group(&["c", "d", "e"]);
        let _ = t1;
        assert!(harness.request(Request::SwitchTab { group_id: t2, id: wid("d") }).is_ok());

        let saved = harness.request(Request::GetSaveInfo);
        let blobs: Vec<TabGroupBlob> =
            serde_json::from_value(saved.data().unwrap().clone()).unwrap();
        assert_eq!(blobs.len(), 2);

        // Fresh engine, same windows, scattered positions.
        let mut restored = Harness::new();
        for (name, cx) in [("a", 50.0), ("b", 300.0), ("c", 550.0), ("d", 800.0), ("e", 1050.0)] {
            restored.create_window(name, cx, 900.0, 80.0, 80.0);
        }
        let response = restored.request(Request::Restore { blob: blobs.clone() });
        assert!(response.is_ok());
        assert_eq!(response.data().unwrap()["restored"], 2);

        let saved_again = restored.request(Request::GetSaveInfo);
        let blobs_again: Vec<TabGroupBlob> =
            serde_json::from_value(saved_again.data().unwrap().clone()).unwrap();
        let key = |blob: &TabGroupBlob| blob.tabs.first().cloned();
        let mut sorted = blobs.clone();
        let mut sorted_again = blobs_again;
        sorted.sort_by_key(key);
        sorted_again.sort_by_key(key);
        for (before, after) in sorted.iter().zip(&sorted_again) {
            assert_eq!(before.tabs, after.tabs);
            assert_eq!(before.group_info.active, after.group_info.active);
            assert_eq!(before.group_info.dimensions, after.group_info.dimensions);
        }
    }

    #[test]
    fn test_restore_skips_groups_with_missing_windows() {
        let mut harness = Harness::new();
        harness.create_window("a", 200.0, 400.0, 100.0, 150.0);
        harness.create_window("b", 600.0, 400.0, 100.0, 150.0);
        harness.make_tab_group(&["a", "b"]);
        let saved = harness.request(Request::GetSaveInfo);
        let blobs: Vec<TabGroupBlob> =
            serde_json::from_value(saved.data().unwrap().clone()).unwrap();

        let mut restored = Harness::new();
        restored.create_window("a", 200.0, 400.0, 100.0, 150.0);
        // b never shows up.
        let response = restored.request(Request::Restore { blob: blobs });
        assert!(response.is_ok());
        assert_eq!(response.data().unwrap()["restored"], 0);
        assert!(restored.engine.model().tab_group_ids().is_empty());
    }

    #[test]
    fn test_superseded_transform_skips_resolution() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 400.0, 100.0, 50.0, 50.0);

        // Two queued frames for b: only the newest runs the resolver, but
        // the stale one still lands in the cache on the way through.
        let mid = Rect::new(Point::new(300.0, 100.0), Point::new(50.0, 50.0));
        let last = Rect::new(Point::new(202.0, 100.0), Point::new(50.0, 50.0));
        harness.runtime.set_mouse(last.center);
        harness.engine.handle_batch(vec![
            (
                Span::current(),
                Event::Runtime(RuntimeEvent::BoundsChanged {
                    id: wid("b"),
                    rect: mid,
                    mouse: MouseState::Down,
                }),
            ),
            (
                Span::current(),
                Event::Runtime(RuntimeEvent::BoundsChanged {
                    id: wid("b"),
                    rect: last,
                    mouse: MouseState::Down,
                }),
            ),
        ]);
        assert_eq!(harness.rect_of("b"), last);
        harness.release();
        assert_eq!(harness.group_of("a"), harness.group_of("b"));
        assert_eq!(harness.rect_of("b").center, Point::new(200.0, 100.0));
    }

    #[test]
    fn test_unready_window_motion_still_tracked() {
        let mut harness = Harness::new();
        harness.create_window("a", 100.0, 100.0, 50.0, 50.0);
        harness.create_window("b", 220.0, 100.0, 50.0, 50.0);
        // Kill b's handle up front: its own motion is still observed, but
        // it cannot participate in a commit.
        harness.runtime.fail_window(wid("b"));
        harness
            .engine
            .model()
            .window(&wid("b"))
            .unwrap()
            .handle()
            .set_bounds(Rect::default())
            .unwrap_err();

        harness.drag_by("b", -18.0, 0.0);
        assert_eq!(harness.rect_of("b").center, Point::new(202.0, 100.0));
        harness.release();
        assert_eq!(harness.group_len("b"), 1);
    }

    #[test]
    fn test_tab_strip_emits_no_client_events() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.make_tab_group(&["x", "y"]);
        harness.request(Request::RemoveTab { id: wid("x") });

        for event in harness.client_events() {
            assert_eq!(event.window().uuid, "app", "client saw strip event: {event:?}");
        }
    }

    #[test]
    fn test_strip_move_realigns_tab_bodies() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.make_tab_group(&["x", "y"]);

        // The embedder relocates and widens the strip directly.
        let strip = WindowId::new("sash-tabstrip", "strip-0");
        let moved = Rect::from_origin_size(Point::new(300.0, 100.0), Point::new(300.0, 60.0));
        harness.engine.handle_event(Event::Runtime(RuntimeEvent::BoundsChanged {
            id: strip,
            rect: moved,
            mouse: MouseState::Up,
        }));

        let body = Rect::from_origin_size(Point::new(300.0, 160.0), Point::new(300.0, 200.0));
        assert_eq!(harness.rect_of("x"), body);
        assert_eq!(harness.rect_of("y"), body);
        // Realigned bodies stay connected to the strip: one snap group.
        assert_eq!(harness.group_len("x"), 3);
    }

    #[test]
    fn test_close_tab_group_restores_apps() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        let y_before = harness.rect_of("y");
        harness.make_tab_group(&["x", "y"]);

        let tid = harness.engine.model().tab_group_of(&wid("x")).unwrap();
        harness.engine.close_tab_group(tid, false).unwrap();

        assert!(harness.engine.model().tab_group_ids().is_empty());
        assert_eq!(harness.engine.model().window_count(), 2);
        assert_eq!(harness.rect_of("y"), y_before);
        assert_eq!(harness.group_len("x"), 1);
        assert_eq!(harness.group_len("y"), 1);
    }

    #[test]
    fn test_close_tab_group_closes_apps() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.make_tab_group(&["x", "y"]);

        let tid = harness.engine.model().tab_group_of(&wid("x")).unwrap();
        harness.engine.close_tab_group(tid, true).unwrap();

        assert_eq!(harness.engine.model().window_count(), 0);
        let closes = harness
            .runtime
            .commands()
            .iter()
            .filter(|command| matches!(command, Command::Close(..)))
            .count();
        // The strip plus both tab windows.
        assert_eq!(closes, 3);
    }

    #[test]
    fn test_strip_window_is_created_above_first_tab() {
        let mut harness = Harness::new();
        harness.create_window("x", 200.0, 300.0, 100.0, 100.0);
        harness.create_window("y", 600.0, 300.0, 100.0, 100.0);
        harness.make_tab_group(&["x", "y"]);

        let strip_rect = harness
            .runtime
            .commands()
            .iter()
            .find_map(|command| match command {
                Command::CreateTabStrip(_, rect) => Some(*rect),
                _ => None,
            })
            .expect("strip was created");
        // Default strip height is 60, sitting directly above x's body.
        assert_eq!(strip_rect.min(), Point::new(100.0, 140.0));
        assert_eq!(strip_rect.height(), 60.0);
        assert_eq!(strip_rect.width(), 200.0);

        // Tabs and strip share one snap group.
        assert_eq!(harness.group_len("x"), 3);
    }
}
