use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::domain::{Company, DirConfig, DirError, FilterField, HELP_TEXT, Message, QueryState};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{DataSource, LoadOutcome, LoadTask, spawn_load};
use crate::query::{View, clamp_page, compute_view, distinct_industries, distinct_locations};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    LOADING,
    READY,
    FAILED,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

/// Everything the UI needs for one frame.
#[derive(Clone)]
pub struct UIData {
    pub name: String,
    pub status: Status,
    pub rows: Vec<Company>,
    pub selected_row: usize,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub total_records: usize,
    pub query: QueryState,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub error_message: Option<String>,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            status: Status::LOADING,
            rows: Vec::new(),
            selected_row: 0,
            page: 1,
            total_pages: 1,
            total_matches: 0,
            total_records: 0,
            query: QueryState::default(),
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            error_message: None,
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: DirConfig,
    source: DataSource,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    dataset: Arc<[Company]>,
    locations: Vec<String>,
    industries: Vec<String>,
    query: QueryState,
    view: View,
    curser_row: usize,
    loader: Option<LoadTask>,
    input: Inputter,
    last_input: InputResult,
    filter_before_input: String,
    active_cmdinput: bool,
    clipboard: Option<Clipboard>,
    status_message: String,
    error_message: Option<String>,
    popup_title: String,
    popup_message: String,
    uidata: UIData,
}

impl Model {
    /// A model without data. Call [`Model::start_loading`] or feed it a
    /// [`LoadOutcome`] to get something on screen.
    pub fn new(config: &DirConfig, source: DataSource) -> Result<Self, DirError> {
        config.validate()?;
        let mut model = Self {
            config: config.clone(),
            source,
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            dataset: Arc::from(Vec::new()),
            locations: Vec::new(),
            industries: Vec::new(),
            query: QueryState::default(),
            view: View::default(),
            curser_row: 0,
            loader: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            filter_before_input: String::new(),
            active_cmdinput: false,
            clipboard: None,
            status_message: "Started cdir!".to_string(),
            error_message: None,
            popup_title: String::new(),
            popup_message: String::new(),
            uidata: UIData::empty(),
        };
        model.update_uidata();
        Ok(model)
    }

    /// Create the model and kick off the background load.
    pub fn init(config: &DirConfig, source: DataSource) -> Result<Self, DirError> {
        let mut model = Model::new(config, source)?;
        model.start_loading()?;
        Ok(model)
    }

    pub fn start_loading(&mut self) -> Result<(), DirError> {
        info!("Loading {} ...", self.source.describe());
        self.status = Status::LOADING;
        self.error_message = None;
        self.loader = Some(spawn_load(self.source.clone(), self.config.load_delay)?);
        self.set_status_message("Loading ...");
        self.update_uidata();
        Ok(())
    }

    pub fn apply_load_outcome(&mut self, outcome: LoadOutcome) {
        self.loader = None;
        match outcome {
            LoadOutcome::Loaded { companies, elapsed } => {
                let count = companies.len();
                self.dataset = Arc::from(companies);
                self.locations = distinct_locations(&self.dataset);
                self.industries = distinct_industries(&self.dataset);
                debug!(
                    "Facets: {} locations, {} industries",
                    self.locations.len(),
                    self.industries.len()
                );
                self.status = Status::READY;
                self.error_message = None;
                self.set_status_message(format!(
                    "Loaded {count} companies in {}ms ...",
                    elapsed.as_millis()
                ));
            }
            LoadOutcome::Failed(reason) => {
                warn!("Load failed: {reason}");
                self.dataset = Arc::from(Vec::new());
                self.locations.clear();
                self.industries.clear();
                self.status = Status::FAILED;
                self.error_message = Some(format!("Failed to load data: {reason}"));
                self.set_status_message("Failed to load data");
            }
        }
        self.refine_query(QueryState::default());
    }

    fn poll_loader(&mut self) {
        if let Some(outcome) = self.loader.as_mut().and_then(LoadTask::poll) {
            self.apply_load_outcome(outcome);
        }
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn industries(&self) -> &[String] {
        &self.industries
    }

    pub fn selected(&self) -> Option<&Company> {
        self.view.page_records.get(self.curser_row)
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    // Replace the query and derive a fresh view from it.
    fn set_query(&mut self, query: QueryState) {
        let start_time = Instant::now();
        self.query = query;
        self.view = compute_view(&self.dataset, &self.query, self.config.page_size);
        self.curser_row = self
            .curser_row
            .min(self.view.page_records.len().saturating_sub(1));
        trace!(
            "View for {:?}: {} matches, {} pages in {}us",
            self.query,
            self.view.total_matches,
            self.view.total_pages,
            start_time.elapsed().as_micros()
        );
        self.update_uidata();
    }

    // Filter and sort changes start over at the top of page 1.
    fn refine_query(&mut self, query: QueryState) {
        self.curser_row = 0;
        self.set_query(query);
    }

    fn update_uidata(&mut self) {
        self.uidata = UIData {
            name: self.source.describe(),
            status: self.status,
            rows: self.view.page_records.clone(),
            selected_row: self.curser_row,
            page: self.query.page,
            total_pages: self.view.total_pages,
            total_matches: self.view.total_matches,
            total_records: self.dataset.len(),
            query: self.query.clone(),
            show_popup: matches!(self.modus, Modus::POPUP | Modus::RECORD),
            popup_title: self.popup_title.clone(),
            popup_message: self.popup_message.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            error_message: self.error_message.clone(),
            last_update: Instant::now(),
        };
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DirError> {
        self.poll_loader();

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Reload if self.status != Status::LOADING => self.start_loading()?,
                    // Controls stay disabled until data arrived
                    _ if self.status != Status::READY => {
                        trace!("Ignoring {msg:?} while {:?}", self.status)
                    }
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::NextPage => self.goto_page(self.query.page + 1),
                    Message::PrevPage => self.goto_page(self.query.page.saturating_sub(1)),
                    Message::FirstPage => self.goto_page(1),
                    Message::LastPage => self.goto_page(self.view.total_pages),
                    Message::EditNameFilter => self.enter_cmd_mode(),
                    Message::NextLocation => self.cycle_filter(FilterField::Location, true),
                    Message::PrevLocation => self.cycle_filter(FilterField::Location, false),
                    Message::NextIndustry => self.cycle_filter(FilterField::Industry, true),
                    Message::PrevIndustry => self.cycle_filter(FilterField::Industry, false),
                    Message::CycleSort => self.cycle_sort(),
                    Message::ClearFilters => self.clear_filters(),
                    Message::Enter => self.show_record(),
                    Message::CopyRecord => self.copy_record(),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::CopyRecord => self.copy_record(),
                    Message::MoveDown => {
                        self.move_selection_down();
                        self.show_record();
                    }
                    Message::MoveUp => {
                        self.move_selection_up();
                        self.show_record();
                    }
                    Message::Enter | Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Enter | Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized! w:{width}, h:{height}");
        self.uidata.last_update = Instant::now();
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::RECORD | Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.update_uidata();
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_title = "Help".to_string();
        self.popup_message = HELP_TEXT.to_string();
        self.update_uidata();
    }

    fn show_record(&mut self) {
        let Some(company) = self.selected() else {
            return;
        };
        let message = format!(
            "Id:        {}\nName:      {}\nLocation:  {}\nIndustry:  {}",
            company.id,
            company.name,
            company.location.as_deref().unwrap_or("-"),
            company.industry.as_deref().unwrap_or("-"),
        );
        if self.modus != Modus::RECORD {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::RECORD;
        self.popup_title = "Company".to_string();
        self.popup_message = message;
        self.update_uidata();
    }

    fn enter_cmd_mode(&mut self) {
        trace!("Entering command mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.active_cmdinput = true;
        self.filter_before_input = self.query.name_filter.clone();

        self.input.clear();
        self.input.set(&self.filter_before_input);
        self.last_input = self.input.get();
        self.update_uidata();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.canceled {
            let previous = std::mem::take(&mut self.filter_before_input);
            self.apply_name_filter(previous);
        } else {
            // Filter while typing
            self.apply_name_filter(self.last_input.input.clone());
        }
        if self.last_input.finished {
            self.leave_cmd_mode();
        }
        self.update_uidata();
    }

    fn leave_cmd_mode(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.last_input = InputResult::default();
        self.set_status_message(format!("{} matches", self.view.total_matches));
    }

    fn apply_name_filter(&mut self, filter: String) {
        if filter != self.query.name_filter {
            self.refine_query(self.query.with_filter(FilterField::Name, filter));
        }
    }

    fn cycle_filter(&mut self, field: FilterField, forward: bool) {
        let options = match field {
            FilterField::Location => &self.locations,
            FilterField::Industry => &self.industries,
            FilterField::Name => return,
        };
        let next = cycle_value(options, self.query.filter(field), forward);
        let label = if next.is_empty() { "all" } else { next.as_str() };
        let message = format!("{field:?}: {label}");
        self.refine_query(self.query.with_filter(field, next));
        self.set_status_message(message);
    }

    fn cycle_sort(&mut self) {
        let key = self.query.sort_key.next();
        self.refine_query(self.query.with_sort_key(key));
        self.set_status_message(format!("Sort by {key}"));
    }

    fn clear_filters(&mut self) {
        self.refine_query(self.query.cleared());
        self.set_status_message("Filters cleared");
    }

    fn goto_page(&mut self, page: usize) {
        let page = clamp_page(page, self.view.total_pages);
        if page != self.query.page {
            self.curser_row = 0;
            self.set_query(self.query.with_page(page));
        }
    }

    fn move_selection_down(&mut self) {
        if self.curser_row + 1 < self.view.page_records.len() {
            self.curser_row += 1;
            self.update_uidata();
        } else if self.query.page < self.view.total_pages {
            // Continue on the next page
            self.goto_page(self.query.page + 1);
        }
    }

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
            self.update_uidata();
        } else if self.query.page > 1 {
            self.goto_page(self.query.page - 1);
            self.curser_row = self.view.page_records.len().saturating_sub(1);
            self.update_uidata();
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    /// The selected company as one CSV line.
    pub fn record_as_csv(company: &Company) -> String {
        [
            company.id.as_str(),
            company.name.as_str(),
            company.location.as_deref().unwrap_or(""),
            company.industry.as_deref().unwrap_or(""),
        ]
        .iter()
        .map(|c| Model::wrap_cell_content(c))
        .collect::<Vec<String>>()
        .join(",")
    }

    fn copy_record(&mut self) {
        let Some(line) = self.selected().map(Model::record_as_csv) else {
            return;
        };
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => warn!("Clipboard not available: {e:?}"),
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard not available");
            return;
        };
        match clipboard.set_text(line) {
            Ok(_) => {
                trace!("Copied record to clipboard.");
                self.set_status_message("Copied company to clipboard");
            }
            Err(e) => {
                trace!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Copy failed");
            }
        }
    }
}

/// Next choice for a facet filter. The empty string means "all" and sits
/// before the first and after the last option.
pub fn cycle_value(options: &[String], current: &str, forward: bool) -> String {
    if options.is_empty() {
        return String::new();
    }
    let position = options.iter().position(|o| o == current);
    let next = match (position, current.is_empty(), forward) {
        (Some(idx), _, true) => options.get(idx + 1),
        (Some(0), _, false) => None,
        (Some(idx), _, false) => options.get(idx - 1),
        (None, true, true) => options.first(),
        (None, true, false) => options.last(),
        // A value that is not an option anymore
        (None, false, _) => None,
    };
    next.cloned().unwrap_or_default()
}
