use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row as TableRow, Table, TableState, Wrap},
};

use crate::domain::{CompassConfig, HELP_TEXT};
use crate::model::{Model, Screen, TableScreen, UIData};
use crate::row::{Row, RowKind};

pub const COLUMN_WIDTH_MARGIN: usize = 1;
const MIN_COLUMN_WIDTH: usize = 3;

#[derive(Debug)]
pub struct CompassUI {
    max_column_width: usize,
    table_state: TableState,
}

impl CompassUI {
    pub fn new(config: &CompassConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
            table_state: TableState::default(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, search_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(title_line(uidata), title_area);
        frame.render_widget(search_line(uidata), search_area);

        match &uidata.screen {
            Screen::Loading => {
                let msg = Paragraph::new("Loading ...".yellow()).centered();
                frame.render_widget(msg, centered(body_area, 100, 1));
            }
            Screen::SignedOut => {
                let text = Text::from(vec![
                    Line::from("No active session".bold()),
                    Line::from("Start compass with --role or --user to sign in."),
                ]);
                let msg = Paragraph::new(text).centered();
                frame.render_widget(msg, centered(body_area, 100, 2));
            }
            Screen::Table(screen) => {
                self.draw_table(screen, frame, body_area);
                if let Some(record) = &screen.record {
                    draw_record(record, frame, body_area);
                }
            }
        }

        frame.render_widget(footer_line(uidata), footer_area);

        if uidata.show_help {
            let area = centered(body_area, 60, HELP_TEXT.lines().count() as u16 + 2);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(HELP_TEXT).block(Block::bordered().title(" Help ".bold())),
                area,
            );
        }
    }

    fn draw_table(&mut self, screen: &TableScreen, frame: &mut Frame, area: Rect) {
        let rows = &screen.state.paginated_rows;
        let widths: Vec<Constraint> = screen
            .columns
            .iter()
            .map(|name| {
                let widest = rows
                    .iter()
                    .map(|r| cell_text(r, name).chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(name.chars().count())
                    + COLUMN_WIDTH_MARGIN;
                Constraint::Length(widest.clamp(MIN_COLUMN_WIDTH, self.max_column_width) as u16)
            })
            .collect();

        let header = TableRow::new(screen.columns.iter().map(|c| Cell::from(c.as_str())))
            .style(Style::new().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        let body = rows.iter().map(|r| {
            TableRow::new(
                screen
                    .columns
                    .iter()
                    .map(|name| Cell::from(cell_text(r, name))),
            )
        });

        let title = Line::from(format!(" {} ", screen.title));
        let table = Table::new(body, widths)
            .header(header)
            .block(Block::bordered().title(title.bold()).border_set(border::PLAIN))
            .row_highlight_style(Style::new().bg(Color::Blue).fg(Color::White));

        self.table_state.select((!rows.is_empty()).then_some(screen.selected_row));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }
}

fn cell_text(row: &Row, column: &str) -> String {
    if column == "id" {
        row.id().to_string()
    } else {
        row.cell(column)
    }
}

fn title_line(uidata: &UIData) -> Line<'_> {
    let mut spans = vec![" Compass ".bold().reversed(), " ".into()];
    for (title, active) in &uidata.tabs {
        let span = if *active {
            Span::from(format!(" {title} ")).bold().underlined()
        } else {
            Span::from(format!(" {title} ")).dim()
        };
        spans.push(span);
    }
    let role = uidata.role.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
    spans.push(format!("  {} as {}", uidata.location, role).dark_gray());
    Line::from(spans)
}

fn search_line(uidata: &UIData) -> Line<'_> {
    match (&uidata.prompt, &uidata.screen) {
        (Some((text, cursor)), _) => {
            let (before, after): (String, String) = {
                let split = text.char_indices().nth(*cursor).map(|(i, _)| i).unwrap_or(text.len());
                (text[..split].to_string(), text[split..].to_string())
            };
            Line::from(vec![
                " / ".bold().yellow(),
                before.into(),
                "▏".yellow(),
                after.into(),
            ])
        }
        (None, Screen::Table(screen)) if !screen.state.search_term.is_empty() => Line::from(vec![
            " search: ".dark_gray(),
            screen.state.search_term.clone().yellow(),
            "  <Esc> clears".dark_gray(),
        ]),
        _ => Line::from(" <?> help  </> search  <q> quit".dark_gray()),
    }
}

fn footer_line(uidata: &UIData) -> Line<'_> {
    let mut spans = Vec::new();
    if let Screen::Table(screen) = &uidata.screen {
        spans.push(
            format!(
                " Page {}/{} ",
                screen.state.current_page,
                screen.state.total_pages.max(1)
            )
            .bold(),
        );
        spans.push(format!("· {} matches ", screen.state.matching_rows).into());
        spans.push(format!("· {} rows/page ", screen.state.rows_per_page).dark_gray());
    }
    spans.push(format!(" {}", uidata.status_message).italic());
    Line::from(spans)
}

/// One line describing the record, depending on what kind of record it is.
fn record_summary(row: &Row) -> String {
    match row.kind() {
        RowKind::Patient => format!(
            "{} ({}), {} · ASHA {}",
            row.cell("name"),
            row.cell("age"),
            row.cell("village"),
            row.cell("assigned_asha")
        ),
        RowKind::Hospital => format!(
            "{}, {} · {} beds",
            row.cell("city"),
            row.cell("district"),
            row.cell("beds")
        ),
        RowKind::User(_) => format!("{} · {}", row.cell("email"), row.cell("phone")),
    }
}

fn draw_record(record: &Row, frame: &mut Frame, area: Rect) {
    let label_width = record
        .fields()
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0);
    let mut lines = vec![
        Line::from(record_summary(record).italic()),
        Line::from(""),
        Line::from(vec![
            format!("{:>label_width$}  ", "id").bold(),
            record.id().to_string().into(),
        ]),
    ];
    for (name, value) in record.fields() {
        lines.push(Line::from(vec![
            format!("{name:>label_width$}  ").bold(),
            value.to_string().into(),
        ]));
    }

    let height = (lines.len() as u16 + 2).min(area.height);
    let popup = centered(area, 70, height);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(format!(" {} {} ", record.kind().label(), record.id()).bold())
                    .title_bottom(Line::from(" <Esc> close ").centered())
                    .border_set(border::THICK),
            ),
        popup,
    );
}

fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
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
    use crate::domain::Role;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn summary_branches_on_kind() {
        let patient = Row::new("P1", RowKind::Patient)
            .with("name", "Ravi")
            .with("age", 54.0)
            .with("village", "Loni")
            .with("assigned_asha", "Asha Devi");
        assert_eq!(record_summary(&patient), "Ravi (54), Loni · ASHA Asha Devi");

        let nurse = Row::new("U3", RowKind::User(Some(Role::Nurse)))
            .with("email", "n@compass.test")
            .with("phone", "123");
        assert_eq!(record_summary(&nurse), "n@compass.test · 123");
    }

    #[test]
    fn renders_loading_screen() {
        let config = CompassConfig::default();
        let model = Model::init(&config, 60, 12).unwrap();
        assert!(matches!(model.get_uidata().screen, Screen::Loading));

        let mut ui = CompassUI::new(&config);
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|f| ui.draw(&model, f)).unwrap();
        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("Loading ..."));
        assert!(content.contains("Compass"));
    }
}
