//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Searching => return handle_search_input(app, key),
        AppState::Ordering => return handle_order_input(app, key),
        AppState::OrderSent => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char('/') => {
            app.state = AppState::Searching;
        }
        KeyCode::Esc => {
            if app.is_searching() {
                app.search("");
            }
        }
        KeyCode::Char('r') => app.reload(),
        KeyCode::Char('O') => app.toggle_offline(),
        KeyCode::Char('A') => app.activate_waiting(),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            app.select_category(index);
        }
        KeyCode::Left | KeyCode::Char('h') => app.prev_category(),
        KeyCode::Right | KeyCode::Char('l') => app.next_category(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(1),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(1),
        KeyCode::PageDown => app.select_next(PAGE_SCROLL_SIZE),
        KeyCode::PageUp => app.select_prev(PAGE_SCROLL_SIZE),
        KeyCode::Home | KeyCode::Char('g') => app.selection = 0,
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        KeyCode::Enter | KeyCode::Char('o') => app.open_order(),
        _ => {}
    }

    Ok(false)
}

fn handle_search_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.search("");
        }
        KeyCode::Enter => {
            app.state = AppState::Normal;
            // Keep search query active
        }
        KeyCode::Backspace => app.pop_search_char(),
        KeyCode::Down => app.select_next(1),
        KeyCode::Up => app.select_prev(1),
        KeyCode::Char(c) => app.push_search_char(c),
        _ => {}
    }
    Ok(false)
}

fn handle_order_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => app.close_order(),
        KeyCode::Enter => app.submit_order(),
        KeyCode::Tab | KeyCode::Down => app.order_focus = app.order_focus.next(),
        KeyCode::BackTab | KeyCode::Up => app.order_focus = app.order_focus.prev(),
        KeyCode::Backspace => app.order_backspace(),
        KeyCode::Char(c) => app.order_type_char(c),
        _ => {}
    }
    Ok(false)
}
