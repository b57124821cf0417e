use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use arboard::Clipboard;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{CompassConfig, CompassError, Message, Role};
use crate::entities::{Entity, collection_name};
use crate::export::{columns_of, export_csv};
use crate::gate::{GateState, Gated, RedirectMap, RoleGate, Session};
use crate::inputter::{Inputter, PromptEvent};
use crate::row::Row;
use crate::source::LoadEvent;
use crate::table::{TableOrchestrator, TableState};
use crate::viewport::SizingParams;

pub const LOGIN_ROUTE: &str = "/login";

// Bound on redirect chains caused by a misconfigured landing map.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, PartialEq)]
pub enum Status {
    Loading,
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Record,
    Help,
}

/// Selected row and open popup of the mounted page. Navigation resets it.
#[derive(Debug, Default)]
struct Selection {
    row: usize,
    overlay: Option<Overlay>,
}

struct PageEntry {
    route: &'static str,
    entity: Entity,
    collection: &'static str,
    columns: Vec<String>,
    gate: RoleGate<TableOrchestrator<Row>>,
}

pub struct TableScreen {
    pub title: String,
    pub columns: Vec<String>,
    pub state: TableState<Row>,
    pub selected_row: usize,
    pub record: Option<Row>,
}

pub enum Screen {
    Loading,
    SignedOut,
    Table(TableScreen),
}

pub struct UIData {
    pub screen: Screen,
    pub location: String,
    pub role: Option<Role>,
    pub tabs: Vec<(String, bool)>,
    pub prompt: Option<(String, usize)>,
    pub show_help: bool,
    pub status_message: String,
}

impl UIData {
    fn empty() -> Self {
        UIData {
            screen: Screen::Loading,
            location: String::new(),
            role: None,
            tabs: Vec::new(),
            prompt: None,
            show_help: false,
            status_message: String::new(),
        }
    }
}

/// Route, entity key and the roles allowed to open it.
fn routes() -> Vec<(&'static str, &'static str, Vec<Role>)> {
    vec![
        ("/admin/hospitals", "hospitals", vec![Role::Admin]),
        ("/admin/patients", "patients", vec![Role::Admin]),
        ("/admin/doctors", "doctors", vec![Role::Admin]),
        ("/admin/nurses", "nurses", vec![Role::Admin]),
        ("/admin/ashas", "ashas", vec![Role::Admin]),
        ("/doctor/patients", "patients", vec![Role::Doctor]),
        ("/nurse/patients", "patients", vec![Role::Nurse]),
        ("/asha/patients", "patients", vec![Role::Asha]),
    ]
}

pub fn default_redirects() -> RedirectMap {
    RedirectMap::new(LOGIN_ROUTE)
        .with(Role::Admin, "/admin/hospitals")
        .with(Role::Doctor, "/doctor/patients")
        .with(Role::Nurse, "/nurse/patients")
        .with(Role::Asha, "/asha/patients")
}

pub struct Model {
    config: CompassConfig,
    pub status: Status,
    session: Session,
    redirects: RedirectMap,
    pages: Vec<PageEntry>,
    location: String,
    mounted: Option<usize>,
    selection: Selection,
    input: Inputter,
    prompting: bool,
    loader: Option<Receiver<LoadEvent>>,
    collections: HashMap<&'static str, Arc<Vec<Row>>>,
    viewport: (u16, u16),
    clipboard: Option<Clipboard>,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &CompassConfig, ui_width: u16, ui_height: u16) -> Result<Self, CompassError> {
        let sizing = SizingParams {
            reserved_height: config.reserved_height,
            row_height: config.row_height,
            min_rows: config.min_rows,
        };
        let mut pages = Vec::new();
        for (route, key, allowed) in routes() {
            let entity: Entity = key.parse()?;
            let fields = entity.search_fields().iter().map(|f| f.to_string()).collect();
            let table = TableOrchestrator::new(fields, sizing, config.resize_debounce);
            pages.push(PageEntry {
                route,
                entity,
                collection: collection_name(key)?,
                columns: Vec::new(),
                gate: RoleGate::new(table, allowed),
            });
        }

        let mut model = Model {
            config: config.clone(),
            status: Status::Loading,
            session: Session::loading(),
            redirects: default_redirects(),
            pages,
            location: String::from("/"),
            mounted: None,
            selection: Selection::default(),
            input: Inputter::default(),
            prompting: false,
            loader: None,
            collections: HashMap::new(),
            viewport: (ui_width, ui_height),
            clipboard: None,
            status_message: String::from("Loading ..."),
            uidata: UIData::empty(),
        };
        if let Some(route) = config.start_route.clone() {
            model.navigate(&route);
        }
        model.refresh_uidata();
        Ok(model)
    }

    pub fn start_loading(&mut self, loader: Receiver<LoadEvent>) {
        self.status = Status::Loading;
        self.loader = Some(loader);
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// While the search prompt is open every key goes to it.
    pub fn raw_keyevents(&self) -> bool {
        self.prompting
    }

    /// How long the event loop may block before a pending recompute is due.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.mounted
            .and_then(|idx| self.pages[idx].gate.page().time_until_resize(now))
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), CompassError> {
        self.update_at(message, Instant::now())
    }

    pub fn update_at(&mut self, message: Option<Message>, now: Instant) -> Result<(), CompassError> {
        self.poll_loader()?;
        if let Some(idx) = self.mounted
            && self.pages[idx].gate.page_mut().poll_resize(now)
        {
            self.selection.row = 0;
        }

        if let Some(msg) = message {
            trace!("Update: {:?}", msg);
            match msg {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height, now),
                Message::RawKey(key) if self.prompting => self.prompt_input(key),
                Message::Help => self.toggle_overlay(Overlay::Help),
                Message::Exit => self.exit(),
                Message::SignOut => self.sign_out(),
                Message::NextTab => self.switch_tab(1),
                Message::PrevTab => self.switch_tab(-1),
                Message::Search => self.open_prompt(),
                Message::MoveUp => self.move_selection(-1),
                Message::MoveDown => self.move_selection(1),
                Message::NextPage => self.with_table(|t| t.next_page()),
                Message::PrevPage => self.with_table(|t| t.prev_page()),
                Message::FirstPage => self.with_table(|t| t.first_page()),
                Message::LastPage => self.with_table(|t| t.last_page()),
                Message::Enter => self.toggle_overlay(Overlay::Record),
                Message::CopyRow => self.copy_selected_row(),
                Message::Export => self.export_filtered(),
                Message::RawKey(_) => {}
            }
        }

        self.refresh_uidata();
        Ok(())
    }

    // -------------------- Loading and session ---------------------- //

    fn poll_loader(&mut self) -> Result<(), CompassError> {
        loop {
            let Some(rx) = &self.loader else {
                return Ok(());
            };
            match rx.try_recv() {
                Ok(event) => self.handle_load_event(event)?,
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    debug!("Loader channel closed");
                    self.loader = None;
                    return Ok(());
                }
            }
        }
    }

    pub fn handle_load_event(&mut self, event: LoadEvent) -> Result<(), CompassError> {
        match event {
            LoadEvent::Collection { name, rows } => self.set_collection(name, rows),
            LoadEvent::Session(session) => self.session_changed(session),
            LoadEvent::Done => {
                self.status = Status::Ready;
                self.loader = None;
                let total: usize = self.collections.values().map(|c| c.len()).sum();
                self.set_status_message(format!("Loaded {total} records"));
            }
            LoadEvent::Failed(e) => {
                self.loader = None;
                return Err(e);
            }
        }
        Ok(())
    }

    fn set_collection(&mut self, name: &'static str, rows: Vec<Row>) {
        let rows = Arc::new(rows);
        for page in self.pages.iter_mut().filter(|p| p.collection == name) {
            let entity = page.entity;
            let view: Arc<Vec<Row>> =
                Arc::new(rows.iter().filter(|r| entity.accepts(r)).cloned().collect());
            page.columns = columns_of(&view);
            debug!("{} gets {} of {} {} rows", page.route, view.len(), rows.len(), name);
            page.gate.page_mut().set_rows(view);
        }
        self.collections.insert(name, rows);
    }

    fn session_changed(&mut self, session: Session) {
        info!("Session changed: {:?}", session);
        self.session = session;
        match self.evaluate_mounted() {
            Some(target) => self.navigate(&target),
            None if self.mounted.is_none() && !session.is_loading_auth => {
                let target = self.redirects.landing(session.role).to_string();
                self.navigate(&target);
            }
            None => {}
        }
    }

    fn sign_out(&mut self) {
        self.set_status_message("Signed out");
        self.session_changed(Session::resolved(None));
    }

    // -------------------- Routing ---------------------- //

    pub fn navigate(&mut self, route: &str) {
        let mut target = route.to_string();
        for _ in 0..MAX_REDIRECTS {
            self.unmount();
            let Some(idx) = self.pages.iter().position(|p| p.route == target) else {
                if target != LOGIN_ROUTE {
                    warn!("Unknown route {}, showing {}", target, LOGIN_ROUTE);
                }
                self.location = LOGIN_ROUTE.to_string();
                return;
            };
            self.location = target.clone();
            self.mount(idx);
            match self.evaluate_mounted() {
                Some(next) => target = next,
                None => return,
            }
        }
        error!("Too many redirects, stopped at {}", self.location);
    }

    fn mount(&mut self, idx: usize) {
        let height = self.viewport.1 as usize;
        let page = &mut self.pages[idx];
        page.gate.mount();
        let table = page.gate.page_mut();
        table.reset();
        table.attach(height);
        self.mounted = Some(idx);
        trace!("Mounted {}", page.route);
    }

    fn unmount(&mut self) {
        if let Some(idx) = self.mounted.take() {
            let page = &mut self.pages[idx];
            page.gate.page_mut().detach();
            trace!("Unmounted {}", page.route);
        }
        self.selection = Selection::default();
        self.prompting = false;
        self.input.clear();
    }

    /// Redirect target if the mounted page turns the session away.
    fn evaluate_mounted(&mut self) -> Option<String> {
        let idx = self.mounted?;
        match self.pages[idx].gate.evaluate(&self.session, &self.redirects) {
            Gated::Redirect(target) => Some(target),
            Gated::Loading | Gated::Page(_) => None,
        }
    }

    fn tab_routes(&self) -> Vec<&'static str> {
        self.pages
            .iter()
            .filter(|p| p.gate.allows(self.session.role))
            .map(|p| p.route)
            .collect()
    }

    fn switch_tab(&mut self, step: isize) {
        let tabs = self.tab_routes();
        if tabs.is_empty() {
            return;
        }
        let current = tabs.iter().position(|r| *r == self.location).unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(tabs.len() as isize) as usize;
        self.navigate(tabs[next]);
    }

    // -------------------- Table handling ---------------------- //

    fn table(&mut self) -> Option<(&mut TableOrchestrator<Row>, Entity)> {
        let idx = self.mounted?;
        let page = &mut self.pages[idx];
        if page.gate.state() != GateState::Authorized {
            return None;
        }
        let entity = page.entity;
        Some((page.gate.page_mut(), entity))
    }

    fn with_table(&mut self, f: impl FnOnce(&mut TableOrchestrator<Row>)) {
        if let Some((table, _)) = self.table() {
            f(table);
            self.selection.row = 0;
        }
    }

    fn move_selection(&mut self, step: isize) {
        let row = self.selection.row;
        let Some((table, _)) = self.table() else {
            return;
        };
        let len = table.state().paginated_rows.len();
        self.selection.row = row
            .saturating_add_signed(step)
            .min(len.saturating_sub(1));
    }

    fn selected_row(&mut self) -> Option<Row> {
        let row = self.selection.row;
        let (table, _) = self.table()?;
        table.state().paginated_rows.get(row).cloned()
    }

    fn ui_resize(&mut self, width: u16, height: u16, now: Instant) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.viewport.0, width, self.viewport.1, height
        );
        self.viewport = (width, height);
        if let Some(idx) = self.mounted {
            self.pages[idx].gate.page_mut().on_resize(height as usize, now);
        }
    }

    fn toggle_overlay(&mut self, overlay: Overlay) {
        if self.selection.overlay == Some(overlay) {
            self.selection.overlay = None;
        } else if overlay == Overlay::Help || self.selected_row().is_some() {
            self.selection.overlay = Some(overlay);
        }
    }

    fn exit(&mut self) {
        if self.selection.overlay.take().is_some() {
            return;
        }
        if let Some((table, _)) = self.table()
            && !table.search_term().is_empty()
        {
            table.set_search_term("");
            self.selection.row = 0;
        }
    }

    fn open_prompt(&mut self) {
        let Some((table, _)) = self.table() else {
            return;
        };
        let term = table.search_term().to_string();
        self.input.set(&term);
        self.prompting = true;
        self.selection.overlay = None;
    }

    fn prompt_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        let event = self.input.read(key);
        let term = match &event {
            PromptEvent::Edited(text) => Some(text.clone()),
            PromptEvent::Cancelled => Some(String::new()),
            PromptEvent::Submitted(_) | PromptEvent::Moved => None,
        };
        if matches!(event, PromptEvent::Submitted(_) | PromptEvent::Cancelled) {
            self.prompting = false;
        }
        if let Some(term) = term
            && let Some((table, _)) = self.table()
        {
            table.set_search_term(term);
            self.selection.row = 0;
        }
    }

    fn copy_selected_row(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let line = std::iter::once(row.id().to_string())
            .chain(row.fields().iter().map(|(_, v)| v.to_string()))
            .map(|c| Model::wrap_cell_content(&c))
            .collect::<Vec<String>>()
            .join(",");

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {:?}", e);
                    self.set_status_message(CompassError::from(e).to_string());
                    return;
                }
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };
        match clipboard.set_text(line).map_err(CompassError::from) {
            Ok(_) => self.set_status_message(format!("Copied {}", row.id())),
            Err(e) => {
                warn!("Error copying to clipboard: {}", e);
                self.set_status_message(e.to_string());
            }
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn export_filtered(&mut self) {
        let dir = self.config.export_dir.clone();
        let Some((table, entity)) = self.table() else {
            return;
        };
        let rows = table.filtered();
        match export_csv(&rows, &dir, entity.name()) {
            Ok(path) => {
                self.set_status_message(format!("Exported {} rows to {}", rows.len(), path.display()))
            }
            Err(e) => {
                error!("Export failed: {}", e);
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // -------------------- UI data ---------------------- //

    fn refresh_uidata(&mut self) {
        let tabs = self
            .tab_routes()
            .into_iter()
            .filter_map(|route| self.pages.iter().find(|p| p.route == route))
            .map(|p| (p.entity.title().to_string(), p.route == self.location))
            .collect();

        let screen = match self.mounted {
            Some(idx) => {
                let page = &mut self.pages[idx];
                match page.gate.state() {
                    GateState::Authorized => {
                        let state = page.gate.page_mut().state();
                        let len = state.paginated_rows.len();
                        self.selection.row = self.selection.row.min(len.saturating_sub(1));
                        let record = match self.selection.overlay {
                            Some(Overlay::Record) => {
                                state.paginated_rows.get(self.selection.row).cloned()
                            }
                            _ => None,
                        };
                        Screen::Table(TableScreen {
                            title: page.entity.title().to_string(),
                            columns: page.columns.clone(),
                            selected_row: self.selection.row,
                            record,
                            state,
                        })
                    }
                    GateState::Loading | GateState::Unauthorized => Screen::Loading,
                }
            }
            None if self.session.is_loading_auth => Screen::Loading,
            None => Screen::SignedOut,
        };

        self.uidata = UIData {
            screen,
            location: self.location.clone(),
            role: self.session.role,
            tabs,
            prompt: self
                .prompting
                .then(|| (self.input.text().to_string(), self.input.cursor())),
            show_help: self.selection.overlay == Some(Overlay::Help),
            status_message: self.status_message.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::load_collection;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::path::{Path, PathBuf};

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    fn feed_collections(model: &mut Model) {
        for name in crate::source::COLLECTIONS {
            let rows = load_collection(&fixtures().join(format!("{name}.csv")), name).unwrap();
            model
                .handle_load_event(LoadEvent::Collection { name, rows })
                .unwrap();
        }
    }

    // Height 16 leaves 10 table rows with the default reserved height of 6.
    fn signed_in(config: CompassConfig, role: Option<Role>) -> Model {
        let mut model = Model::init(&config, 120, 16).unwrap();
        feed_collections(&mut model);
        model
            .handle_load_event(LoadEvent::Session(Session::resolved(role)))
            .unwrap();
        model.handle_load_event(LoadEvent::Done).unwrap();
        model.update(None).unwrap();
        model
    }

    fn table_screen(model: &Model) -> &TableScreen {
        match &model.get_uidata().screen {
            Screen::Table(screen) => screen,
            _ => panic!("expected a table on {}", model.location()),
        }
    }

    fn type_search(model: &mut Model, text: &str) {
        model.update(Some(Message::Search)).unwrap();
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
    }

    #[test]
    fn shows_loading_until_session_resolves() {
        let config = CompassConfig::default().with_start_route(Some("/nurse/patients".into()));
        let mut model = Model::init(&config, 120, 16).unwrap();
        feed_collections(&mut model);
        model.update(None).unwrap();
        assert!(matches!(model.get_uidata().screen, Screen::Loading));
        assert_eq!(model.location(), "/nurse/patients");

        model
            .handle_load_event(LoadEvent::Session(Session::resolved(Some(Role::Nurse))))
            .unwrap();
        model.update(None).unwrap();
        assert_eq!(model.location(), "/nurse/patients");
        assert_eq!(table_screen(&model).state.matching_rows, 23);
    }

    #[test]
    fn unauthorized_route_redirects_to_role_landing() {
        let config = CompassConfig::default().with_start_route(Some("/nurse/patients".into()));
        let mut model = Model::init(&config, 120, 16).unwrap();
        feed_collections(&mut model);
        model
            .handle_load_event(LoadEvent::Session(Session::resolved(Some(Role::Doctor))))
            .unwrap();
        model.update(None).unwrap();
        assert_eq!(model.location(), "/doctor/patients");
        assert_eq!(table_screen(&model).title, "Patients");
    }

    #[test]
    fn admin_lands_on_hospitals_and_switches_tabs() {
        let mut model = signed_in(CompassConfig::default(), Some(Role::Admin));
        assert_eq!(model.location(), "/admin/hospitals");
        assert_eq!(table_screen(&model).state.matching_rows, 4);
        assert_eq!(model.get_uidata().tabs.len(), 5);

        model.update(Some(Message::NextTab)).unwrap();
        assert_eq!(model.location(), "/admin/patients");
        model.update(Some(Message::NextTab)).unwrap();
        assert_eq!(model.location(), "/admin/doctors");
        assert_eq!(table_screen(&model).state.matching_rows, 2);
        model.update(Some(Message::PrevTab)).unwrap();
        model.update(Some(Message::PrevTab)).unwrap();
        model.update(Some(Message::PrevTab)).unwrap();
        assert_eq!(model.location(), "/admin/ashas");
        assert_eq!(table_screen(&model).state.matching_rows, 2);
    }

    #[test]
    fn search_and_clear_on_patient_table() {
        let mut model = signed_in(CompassConfig::default(), Some(Role::Doctor));
        let screen = table_screen(&model);
        assert_eq!(screen.state.rows_per_page, 10);
        assert_eq!(screen.state.total_pages, 3);

        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(table_screen(&model).state.current_page, 2);

        type_search(&mut model, "cancer");
        let screen = table_screen(&model);
        assert_eq!(screen.state.total_pages, 1);
        assert_eq!(screen.state.current_page, 1);
        assert_eq!(screen.state.paginated_rows.len(), 5);
        assert_eq!(model.get_uidata().prompt, Some(("cancer".to_string(), 6)));

        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(esc))).unwrap();
        let screen = table_screen(&model);
        assert_eq!(screen.state.total_pages, 3);
        assert_eq!(screen.state.current_page, 1);
        assert!(model.get_uidata().prompt.is_none());
    }

    #[test]
    fn record_overlay_follows_selection() {
        let mut model = signed_in(CompassConfig::default(), Some(Role::Asha));
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveUp)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        let record = table_screen(&model).record.clone().unwrap();
        assert_eq!(record.id(), "P002");

        model.update(Some(Message::Exit)).unwrap();
        assert!(table_screen(&model).record.is_none());

        model.update(Some(Message::Help)).unwrap();
        assert!(model.get_uidata().show_help);
    }

    #[test]
    fn resize_is_debounced_and_resets_page() {
        let mut model = signed_in(CompassConfig::default(), Some(Role::Nurse));
        model.update(Some(Message::LastPage)).unwrap();
        assert_eq!(table_screen(&model).state.current_page, 3);

        let t0 = Instant::now();
        model.update_at(Some(Message::Resize(120, 46)), t0).unwrap();
        assert_eq!(table_screen(&model).state.rows_per_page, 10);
        assert!(model.next_deadline(t0).is_some());

        model
            .update_at(None, t0 + Duration::from_millis(200))
            .unwrap();
        let screen = table_screen(&model);
        assert_eq!(screen.state.rows_per_page, 40);
        assert_eq!(screen.state.total_pages, 1);
        assert_eq!(screen.state.current_page, 1);
        assert!(model.next_deadline(t0).is_none());
    }

    #[test]
    fn leaving_a_page_drops_its_search() {
        let mut model = signed_in(CompassConfig::default(), Some(Role::Admin));
        model.update(Some(Message::NextTab)).unwrap();
        assert_eq!(model.location(), "/admin/patients");

        type_search(&mut model, "cancer");
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(enter))).unwrap();
        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(table_screen(&model).state.matching_rows, 5);

        model.update(Some(Message::NextTab)).unwrap();
        model.update(Some(Message::PrevTab)).unwrap();
        assert_eq!(model.location(), "/admin/patients");
        let screen = table_screen(&model);
        assert_eq!(screen.state.search_term, "");
        assert_eq!(screen.state.matching_rows, 23);
        assert_eq!(screen.state.current_page, 1);
    }

    #[test]
    fn sign_out_leaves_for_login() {
        let mut model = signed_in(CompassConfig::default(), Some(Role::Nurse));
        model.update(Some(Message::SignOut)).unwrap();
        assert_eq!(model.location(), LOGIN_ROUTE);
        assert!(matches!(model.get_uidata().screen, Screen::SignedOut));
        assert!(model.get_uidata().tabs.is_empty());
    }

    #[test]
    fn missing_role_lands_on_login() {
        let model = signed_in(CompassConfig::default(), None);
        assert_eq!(model.location(), LOGIN_ROUTE);
        assert!(matches!(model.get_uidata().screen, Screen::SignedOut));
    }

    #[test]
    fn export_writes_filtered_rows() {
        let dir = std::env::temp_dir().join(format!("compass-model-export-{}", std::process::id()));
        let config = CompassConfig::default().with_export_dir(dir.clone());
        let mut model = signed_in(config, Some(Role::Doctor));
        type_search(&mut model, "tuberculosis");
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(enter))).unwrap();
        model.update(Some(Message::Export)).unwrap();

        let written = std::fs::read_to_string(dir.join("patients.csv")).unwrap();
        assert_eq!(written.lines().count(), 1 + 4);
        assert!(model.get_uidata().status_message.starts_with("Exported 4 rows"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn loader_failure_propagates() {
        let mut model = Model::init(&CompassConfig::default(), 120, 16).unwrap();
        let err = model.handle_load_event(LoadEvent::Failed(CompassError::UnknownEntity(
            "wards".into(),
        )));
        assert!(matches!(err, Err(CompassError::UnknownEntity(_))));
    }

    #[test]
    fn wraps_csv_cells() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a, b"), "\"a, b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
