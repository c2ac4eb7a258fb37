use crate::book::Book;
use crate::theme::Base16Palette;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

/// Selectable list of the books in the library
#[derive(Default)]
pub struct LibraryList {
    pub selected: usize,
    pub list_state: ListState,
}

impl LibraryList {
    pub fn new(book_count: usize) -> Self {
        let mut list_state = ListState::default();
        if book_count > 0 {
            list_state.select(Some(0));
        }
        Self {
            selected: 0,
            list_state,
        }
    }

    pub fn move_selection_down(&mut self, book_count: usize) {
        if self.selected < book_count.saturating_sub(1) {
            self.selected += 1;
            self.list_state.select(Some(self.selected));
        }
    }

    pub fn move_selection_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.list_state.select(Some(self.selected));
        }
    }

    pub fn set_selection_to_index(&mut self, index: usize) {
        self.selected = index;
        self.list_state.select(Some(index));
    }

    /// Keep the selection valid after the list changed size
    pub fn clamp(&mut self, book_count: usize) {
        if book_count == 0 {
            self.selected = 0;
            self.list_state.select(None);
        } else {
            self.set_selection_to_index(self.selected.min(book_count - 1));
        }
    }

    pub fn selected_book<'a>(&self, books: &'a [Book]) -> Option<&'a Book> {
        books.get(self.selected)
    }

    /// Handle mouse click at the given row; returns true if a book was hit
    pub fn handle_mouse_click(&mut self, y: u16, area: Rect, book_count: usize) -> bool {
        // Items start below the top border
        if y > area.y && y < area.y + area.height.saturating_sub(1) {
            let index = self.list_state.offset() + (y - area.y - 1) as usize;
            if index < book_count {
                self.set_selection_to_index(index);
                return true;
            }
        }
        false
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, books: &[Book], palette: &Base16Palette) {
        let (text_color, border_color, bg_color) = palette.get_panel_colors(true);
        let (selection_bg, selection_fg) = palette.get_selection_colors(true);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Library ({}) ", books.len()))
            .border_style(Style::default().fg(border_color))
            .style(Style::default().bg(bg_color));

        if books.is_empty() {
            let hint = Paragraph::new(vec![
                Line::from("Your library is empty."),
                Line::from(""),
                Line::from("Add a book with: readsphere add <FILE|URL> --title <TITLE>"),
            ])
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(palette.base_04));
            f.render_widget(hint, area);
            return;
        }

        let items: Vec<ListItem> = books
            .iter()
            .map(|book| {
                let mut spans = vec![Span::styled(
                    book.title.clone(),
                    Style::default()
                        .fg(text_color)
                        .add_modifier(Modifier::BOLD),
                )];
                if !book.author.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", book.author),
                        Style::default().fg(palette.base_04),
                    ));
                }
                if book.is_external && book.pdf_url.is_none() {
                    spans.push(Span::styled("  external", Style::default().fg(palette.base_0e)));
                }
                spans.push(Span::styled(
                    format!("  {}", book.progress_label()),
                    Style::default().fg(palette.base_0b),
                ));
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(selection_bg).fg(selection_fg))
            .highlight_symbol("» ");

        f.render_stateful_widget(list, area, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{capture_terminal_state, create_test_terminal};
    use crate::theme::palette;

    fn books() -> Vec<Book> {
        vec![
            Book::new("1", "Dune")
                .with_author("Frank Herbert")
                .with_last_read_page(12),
            Book::new("2", "Hyperion").external(),
        ]
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut list = LibraryList::new(2);
        list.move_selection_up();
        assert_eq!(list.selected, 0);
        list.move_selection_down(2);
        list.move_selection_down(2);
        assert_eq!(list.selected, 1);
        list.clamp(1);
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn click_selects_row() {
        let mut list = LibraryList::new(2);
        let area = Rect::new(0, 0, 40, 10);
        assert!(list.handle_mouse_click(2, area, 2));
        assert_eq!(list.selected, 1);
        assert!(!list.handle_mouse_click(5, area, 2));
    }

    #[test]
    fn renders_titles_and_progress() {
        let mut terminal = create_test_terminal(60, 6);
        let mut list = LibraryList::new(2);
        let books = books();
        terminal
            .draw(|f| list.render(f, f.area(), &books, palette(false)))
            .unwrap();

        let screen = capture_terminal_state(&terminal);
        assert!(screen.contains("Library (2)"));
        assert!(screen.contains("Dune  Frank Herbert  p. 12"));
        assert!(screen.contains("Hyperion  external  new"));
    }
}
