use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use menucache_core::utils::{format_price, truncate_string};

use crate::app::{App, AppState, OrderField};

use super::styles;
use super::tabs::menu::{self, category_label};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Categories
            Constraint::Length(2), // Specials
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_categories(frame, app, chunks[1]);
    render_specials(frame, app, chunks[2]);
    menu::render(frame, app, chunks[3]);
    render_status_bar(frame, app, chunks[4]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::Ordering => render_order_overlay(frame, app),
        AppState::OrderSent => render_order_sent_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("  {}", app.config.restaurant_name);
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.chars().count() + help_hint.len() + 4),
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_categories(frame: &mut Frame, app: &App, area: Rect) {
    let active = app.category_index();
    let searching = app.is_searching();

    let mut spans = vec![Span::raw(" ")];
    for (i, category) in app.categories().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = if i < 9 {
            format!("[{}] {}", i + 1, category_label(category))
        } else {
            category_label(category)
        };
        let selected = i == active && !searching;
        if selected {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    // Search box on the right
    if searching || matches!(app.state, AppState::Searching) {
        let cursor = if matches!(app.state, AppState::Searching) { "▌" } else { "" };
        let search = format!("Search: {}{}", app.store.search_query(), cursor);
        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let padding = (area.width as usize).saturating_sub(used + search.chars().count() + 2);
        spans.push(Span::raw(" ".repeat(padding)));
        spans.push(Span::styled(search, styles::search_style()));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_specials(frame: &mut Frame, app: &App, area: Rect) {
    let specials = app.specials();

    let mut spans = vec![Span::styled(" ★ Today's Specials: ", styles::highlight_style())];
    if specials.is_empty() {
        spans.push(Span::styled("none today", styles::muted_style()));
    }
    for (i, item) in specials.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ·  ", styles::muted_style()));
        }
        spans.push(Span::raw(truncate_string(&item.name, 20)));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format_price(item.price), styles::price_style()));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if let Some(ref age) = app.cache_age {
        format!(" Menu cached {} ", age)
    } else {
        " Menu not cached ".to_string()
    };

    let mode = if app.offline_mode { "OFFLINE " } else { "" };
    let cache_text = format!("{} ({}) ", app.generation(), app.phase);
    let shortcuts = "| [r]eload | [q]uit ";

    let width = area.width as usize;
    let used = left_text.chars().count() + mode.len() + cache_text.chars().count() + shortcuts.len();
    let padding_len = width.saturating_sub(used);

    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(mode, styles::offline_style()),
        Span::styled(cache_text, styles::muted_style()),
        Span::styled(shortcuts, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 24, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(
            format!("  menucache version {}", version),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Menu", styles::highlight_style())),
        help_line("1-9", "Select category"),
        help_line("←/→", "Previous/next category"),
        help_line("↑/↓ j/k", "Navigate items"),
        help_line("/", "Search by name"),
        help_line("Esc", "Clear search"),
        Line::from(""),
        Line::from(Span::styled(" Ordering", styles::highlight_style())),
        help_line("o Enter", "Order selected item"),
        help_line("+/-", "Change quantity"),
        help_line("Tab", "Next field"),
        Line::from(""),
        Line::from(Span::styled(" Cache", styles::highlight_style())),
        help_line("r", "Reload menu"),
        help_line("O", "Toggle offline mode"),
        help_line("A", "Activate waiting cache"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(help_text).block(block);

    frame.render_widget(paragraph, area);
}

/// One labelled form field, highlighted when focused
fn field_line(label: &'static str, value: String, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::styled(format!("  {:<14}[", label), styles::muted_style()),
        Span::styled(format!("{}{}", value, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_order_overlay(frame: &mut Frame, app: &App) {
    let Some(ref draft) = app.order else {
        return;
    };

    let height = if app.order_notice.is_some() { 16 } else { 14 };
    let area = centered_rect_fixed(56, height, frame.area());

    frame.render_widget(Clear, area);

    let focus = app.order_focus;
    let mut lines = vec![
        Line::from(vec![
            Span::styled("  Price:        ", styles::muted_style()),
            Span::styled(format_price(draft.unit_price), styles::price_style()),
        ]),
        Line::from(""),
        field_line(
            "Quantity:",
            format!("- {} +", draft.quantity()),
            focus == OrderField::Quantity,
        ),
        field_line(
            "Table No.:",
            format!("{:<6}", draft.table_number),
            focus == OrderField::TableNumber,
        ),
        field_line(
            "Instructions:",
            truncate_string(&draft.instructions, 30),
            focus == OrderField::Instructions,
        ),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Total:        ", styles::muted_style()),
            Span::styled(format_price(draft.total()), styles::price_style()),
        ]),
        Line::from(""),
    ];

    let submit_style = if focus == OrderField::Submit {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let submit_label = if focus == OrderField::Submit {
        " ▶ Order on WhatsApp ◀ "
    } else {
        "   Order on WhatsApp   "
    };
    lines.push(Line::from(vec![
        Span::raw("              ["),
        Span::styled(submit_label, submit_style),
        Span::raw("]"),
    ]));

    if let Some(ref notice) = app.order_notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", notice),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(format!(" Order: {} ", truncate_string(&draft.item_name, 40)))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn render_order_sent_overlay(frame: &mut Frame, app: &App) {
    let Some(ref submission) = app.submission else {
        return;
    };

    let area = centered_rect_fixed(70, 20, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "  Your order is ready to send on WhatsApp",
            styles::success_style(),
        )),
        Line::from(""),
    ];
    for line in submission.message.lines() {
        lines.push(Line::from(format!("  {}", line)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        submission.deep_link.to_string(),
        styles::highlight_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  The link is printed again when you quit. Press Enter to close.",
        styles::muted_style(),
    )));

    let block = Block::default()
        .title(" Order Confirmation ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block);

    frame.render_widget(paragraph, area);
}
