use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::{Company, DirConfig};
use crate::model::{Status, UIData};

pub const CMDLINE_HEIGH: u16 = 1;
pub const FILTERBAR_HEIGHT: u16 = 1;
pub const PAGINATION_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const ACCENT_COLOR: Color = Color::Blue;
const SUBTITLE_COLOR: Color = Color::Magenta;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &DirConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame) {
        let [main_area, cmdline_area] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        let title = Line::from(" Companies Directory ".bold().fg(ACCENT_COLOR));
        let subtitle = Line::from(Span::from(format!(" {} ", uidata.name)).fg(SUBTITLE_COLOR));
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(subtitle.centered())
            .border_set(border::THICK);
        let inner = block.inner(main_area);
        frame.render_widget(block, main_area);

        let [filter_area, table_area, pagination_area] = Layout::vertical([
            Constraint::Length(FILTERBAR_HEIGHT),
            Constraint::Min(TABLE_HEADER_HEIGHT + 1),
            Constraint::Length(PAGINATION_HEIGHT),
        ])
        .areas(inner);

        frame.render_widget(Paragraph::new(Self::filter_line(uidata)), filter_area);

        match uidata.status {
            Status::LOADING => Self::draw_message(frame, table_area, "Loading ...".italic()),
            Status::FAILED => {
                let error = uidata
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Failed to load data".to_string());
                Self::draw_message(frame, table_area, Span::from(error).red())
            }
            Status::READY | Status::QUITTING => {
                if uidata.rows.is_empty() {
                    Self::draw_message(frame, table_area, "No companies found.".red());
                } else {
                    self.draw_table(frame, table_area, uidata);
                }
            }
        }

        // Only worth showing when there is more than one page
        if uidata.total_pages > 1 {
            let pagination = Line::from(format!(
                "Page {}/{} ({} companies)",
                uidata.page, uidata.total_pages, uidata.total_matches
            ))
            .centered();
            frame.render_widget(Paragraph::new(pagination), pagination_area);
        }

        frame.render_widget(Paragraph::new(Self::cmd_line(uidata)), cmdline_area);

        if uidata.active_cmdinput {
            let prefix = "Search name: ".len() as u16;
            let x = cmdline_area.x + prefix + uidata.cmdinput.cursor_pos as u16;
            frame.set_cursor_position((x.min(cmdline_area.right().saturating_sub(1)), cmdline_area.y));
        }

        if uidata.show_popup {
            Self::draw_popup(frame, &uidata.popup_title, &uidata.popup_message);
        }
    }

    fn filter_line(uidata: &UIData) -> Line<'static> {
        let query = &uidata.query;
        let or_all = |value: &str, all: &str| {
            let shown = if value.is_empty() { all } else { value };
            Span::from(shown.to_string())
        };
        let mut spans = vec![
            " Name: ".into(),
            or_all(&query.name_filter, "*").yellow(),
            "  Location: ".into(),
            or_all(&query.location_filter, "All Locations").yellow(),
            "  Industry: ".into(),
            or_all(&query.industry_filter, "All Industries").yellow(),
            "  Sort: ".into(),
            Span::from(query.sort_key.to_string()).yellow(),
        ];
        if query.has_filters() {
            spans.push("  (c clears filters)".dark_gray());
        }
        Line::from(spans)
    }

    fn cmd_line(uidata: &UIData) -> Line<'static> {
        if uidata.active_cmdinput {
            Line::from(vec![
                "Search name: ".bold(),
                Span::from(uidata.cmdinput.input.clone()),
            ])
        } else {
            Line::from(vec![
                Span::from(uidata.status_message.clone()),
                "  (? for help)".dark_gray(),
            ])
        }
    }

    fn draw_message(frame: &mut Frame, area: Rect, message: Span<'static>) {
        let paragraph = Paragraph::new(Line::from(message).centered());
        let [centered] = Layout::vertical([Constraint::Length(1)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(paragraph, centered);
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        let header = Row::new(["Name", "Location", "Industry"])
            .style(Style::new().bold().fg(ACCENT_COLOR))
            .height(TABLE_HEADER_HEIGHT);

        let rows = uidata
            .rows
            .iter()
            .map(|company| Row::new(self.cells(company)));

        let widths = [Constraint::Fill(2), Constraint::Fill(1), Constraint::Fill(1)];
        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_WIDTH_MARGIN as u16)
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED));

        let mut state = TableState::default().with_selected(Some(uidata.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn cells(&self, company: &Company) -> [Cell<'static>; 3] {
        let width = self.max_column_width;
        [
            Cell::from(truncate_cell(&company.name, width)),
            Cell::from(truncate_cell(company.location.as_deref().unwrap_or("∅"), width)),
            Cell::from(truncate_cell(company.industry.as_deref().unwrap_or("∅"), width)),
        ]
    }

    fn draw_popup(frame: &mut Frame, title: &str, message: &str) {
        let area = popup_area(frame.area(), 60, 70);
        let block = Block::bordered()
            .title(Line::from(Span::from(format!(" {title} ")).bold()).centered())
            .title_bottom(Line::from(" <Esc> close ".dark_gray()).centered())
            .border_set(border::ROUNDED);
        let paragraph = Paragraph::new(Text::from(message.to_string()))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

/// Shorten `value` to at most `width` chars, marking the cut with "...".
pub fn truncate_cell(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width < 3 {
        return value.chars().take(width).collect();
    }
    let mut reduced: String = value.chars().take(width - 3).collect();
    reduced.push_str("...");
    reduced
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilterField, QueryState};
    use ratatui::{Terminal, backend::TestBackend};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(uidata: &UIData) -> String {
        let ui = TableUI::new(&DirConfig::default());
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| ui.draw(uidata, f)).unwrap();
        buffer_text(&terminal)
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_cell("Acme", 10), "Acme");
        assert_eq!(truncate_cell("Zürich Versicherung", 9), "Zürich...");
        assert_eq!(truncate_cell("abcdef", 2), "ab");
    }

    #[test]
    fn renders_loading_state() {
        let text = render(&UIData::empty());
        assert!(text.contains("Companies Directory"));
        assert!(text.contains("Loading ..."));
    }

    #[test]
    fn renders_rows_and_pagination() {
        let mut uidata = UIData::empty();
        uidata.status = Status::READY;
        uidata.rows = vec![
            Company::new("1", "Acme", "NY", "Tech"),
            Company::new("2", "Bolt", "SF", "Tech"),
        ];
        uidata.total_pages = 2;
        uidata.total_matches = 12;
        uidata.query = QueryState::default();
        let text = render(&uidata);
        assert!(text.contains("Acme"));
        assert!(text.contains("Bolt"));
        assert!(text.contains("Page 1/2 (12 companies)"));
        assert!(text.contains("All Locations"));
    }

    #[test]
    fn clear_hint_only_with_active_filters() {
        let mut uidata = UIData::empty();
        uidata.status = Status::READY;
        assert!(!render(&uidata).contains("c clears filters"));

        uidata.query = QueryState::default().with_filter(FilterField::Location, "NY");
        let text = render(&uidata);
        assert!(text.contains("Location: NY"));
        assert!(text.contains("c clears filters"));
    }

    #[test]
    fn renders_empty_result() {
        let mut uidata = UIData::empty();
        uidata.status = Status::READY;
        let text = render(&uidata);
        assert!(text.contains("No companies found."));
        assert!(!text.contains("Page 1/"));
    }

    #[test]
    fn renders_load_error() {
        let mut uidata = UIData::empty();
        uidata.status = Status::FAILED;
        uidata.error_message = Some("Failed to load data: file not found".into());
        assert!(render(&uidata).contains("Failed to load data: file not found"));
    }
}
