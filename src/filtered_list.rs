//! Ordered list with a text filter and a single selection cursor.
//!
//! The selection always indexes the *filtered* view: `Some(i)` with
//! `i < len()`, or `None` exactly when the view is empty.

/// Receives the item and the already lower-cased filter text.
pub type Matcher<T> = fn(&T, &str) -> bool;

/// Case-insensitive substring test. `needle` must already be lower-case.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(needle)
}

pub struct FilteredList<T> {
    items: Vec<T>,
    filter: String,
    /// Indices into `items`, in original order.
    visible: Vec<usize>,
    selected: Option<usize>,
    matcher: Matcher<T>,
}

impl<T> FilteredList<T> {
    pub fn new(matcher: Matcher<T>) -> Self {
        Self {
            items: Vec::new(),
            filter: String::new(),
            visible: Vec::new(),
            selected: None,
            matcher,
        }
    }

    /// Replaces the backing items wholesale and clears the filter.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.filter.clear();
        self.rebuild();
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_lowercase();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let matcher = self.matcher;
        let filter = self.filter.as_str();
        self.visible = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| filter.is_empty() || matcher(item, filter))
            .map(|(i, _)| i)
            .collect();
        self.selected = if self.visible.is_empty() { None } else { Some(0) };
    }

    /// Returns `true` if the selection moved.
    pub fn select_next(&mut self) -> bool {
        match self.selected {
            Some(i) if i + 1 < self.visible.len() => {
                self.selected = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if the selection moved.
    pub fn select_prev(&mut self) -> bool {
        match self.selected {
            Some(i) if i > 0 => {
                self.selected = Some(i - 1);
                true
            }
            _ => false,
        }
    }

    /// Absolute selection within the filtered view. Out-of-range indices are
    /// ignored; returns `true` if the selection moved.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.visible.len() || self.selected == Some(index) {
            return false;
        }
        self.selected = Some(index);
        true
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected
            .and_then(|i| self.visible.get(i))
            .and_then(|&idx| self.items.get(idx))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Number of items in the filtered view.
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// The filtered view, in original order.
    pub fn items(&self) -> impl Iterator<Item = &T> + '_ {
        self.visible.iter().filter_map(|&idx| self.items.get(idx))
    }

    pub fn all_items(&self) -> &[T] {
        &self.items
    }

    /// The active filter, lower-cased.
    pub fn filter(&self) -> &str {
        &self.filter
    }
}
