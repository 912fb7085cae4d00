use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use menucache_core::models::MenuItem;
use menucache_core::utils::{format_price, format_rating, truncate_string};

use crate::app::App;
use crate::ui::styles;

/// Width of the name column in the menu list
const NAME_WIDTH: usize = 26;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    render_menu_list(frame, app, chunks[0]);
    render_item_detail(frame, app, chunks[1]);
}

fn list_title(app: &App, count: usize) -> String {
    if app.is_searching() {
        format!(" Results for \"{}\" ({}) ", app.store.search_query(), count)
    } else {
        format!(" {} ({}) ", category_label(app.store.active_category()), count)
    }
}

/// Display label for a category key
pub fn category_label(category: &str) -> String {
    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_menu_list(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title_style(styles::title_style());

    if !app.store.is_loaded() {
        let lines = if app.loading {
            vec![Line::from(Span::styled("  Loading menu...", styles::muted_style()))]
        } else {
            let message = app
                .load_error
                .clone()
                .unwrap_or_else(|| "Menu not loaded".to_string());
            vec![
                Line::from(Span::styled(
                    "  Failed to load menu. Please try again later.",
                    styles::error_style(),
                )),
                Line::from(Span::styled(format!("  {}", message), styles::muted_style())),
                Line::from(""),
                Line::from(vec![
                    Span::styled("  Press ", styles::muted_style()),
                    Span::styled("r", styles::help_key_style()),
                    Span::styled(" to retry", styles::muted_style()),
                ]),
            ]
        };
        let paragraph = Paragraph::new(lines).block(block.title(" Menu "));
        frame.render_widget(paragraph, area);
        return;
    }

    let visible = app.visible_items();
    let block = block.title(list_title(app, visible.len()));

    if visible.is_empty() {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "  No items found",
            styles::muted_style(),
        )))
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let style = if i == app.selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(menu_line(item)).style(style)
        })
        .collect();

    let list = List::new(items).block(block);

    let mut state = ListState::default();
    state.select(Some(app.selection));

    frame.render_stateful_widget(list, area, &mut state);
}

fn menu_line(item: &MenuItem) -> Line<'static> {
    let marker = if item.special { "★ " } else { "  " };
    let mut spans = vec![
        Span::styled(marker, styles::highlight_style()),
        Span::raw(format!(
            "{:<width$}",
            truncate_string(&item.name, NAME_WIDTH),
            width = NAME_WIDTH
        )),
        Span::styled(format!("{:>8}", format_price(item.price)), styles::price_style()),
    ];

    for tag in item.parsed_tags() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(tag.label().to_string(), styles::tag_style(&tag)));
    }

    Line::from(spans)
}

fn render_item_detail(frame: &mut Frame, app: &App, area: Rect) {
    let (title, lines) = match app.selected_item() {
        Some(item) => (format!(" {} ", item.name), detail_lines(item)),
        None => (
            " No Item Selected ".to_string(),
            vec![Line::from(Span::styled(
                "Select an item from the menu",
                styles::muted_style(),
            ))],
        ),
    };

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn detail_lines(item: &MenuItem) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Price:    ", styles::highlight_style()),
            Span::styled(format_price(item.price), styles::price_style()),
        ]),
        Line::from(vec![
            Span::styled("Category: ", styles::highlight_style()),
            Span::raw(category_label(&item.category_key())),
        ]),
    ];

    let rating = format_rating(&item.rating);
    if !rating.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Rating:   ", styles::highlight_style()),
            Span::raw(rating),
        ]));
    }

    let tags = item.parsed_tags();
    if !tags.is_empty() {
        let mut spans = vec![Span::styled("Tags:     ", styles::highlight_style())];
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            spans.push(Span::styled(tag.label().to_string(), styles::tag_style(tag)));
        }
        lines.push(Line::from(spans));
    }

    if item.special {
        lines.push(Line::from(Span::styled(
            "Today's special",
            styles::highlight_style(),
        )));
    }

    lines.push(Line::from(""));
    if item.desc.trim().is_empty() {
        lines.push(Line::from(Span::styled("No description", styles::muted_style())));
    } else {
        lines.push(Line::from(item.desc.clone()));
    }

    if let Some(image) = item.image_url() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Image: {}", image),
            styles::muted_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("[o]", styles::help_key_style()),
        Span::styled(" Order this item", styles::muted_style()),
    ]));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_label() {
        assert_eq!(category_label("snacks"), "Snacks");
        assert_eq!(category_label("all"), "All");
        assert_eq!(category_label(""), "");
    }

    #[test]
    fn test_menu_line_shows_badges_and_price() {
        let item = MenuItem {
            name: "Paneer Tikka".to_string(),
            price: 180.0,
            tags: vec!["bestseller".to_string(), "spicy".to_string()],
            special: true,
            ..Default::default()
        };
        let text: String = menu_line(&item)
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(text.starts_with("★ Paneer Tikka"));
        assert!(text.contains("₹180"));
        assert!(text.contains("🔥 Bestseller"));
        assert!(text.ends_with("spicy"));
    }
}
