use log::debug;
use shared::{NewsId, NewsItem};

/// News detail modal. Opening and closing are independent of the mode.
pub struct NewsModal {
    items: Vec<NewsItem>,
    open: Option<NewsId>,
}

impl NewsModal {
    pub fn new(items: Vec<NewsItem>) -> Self {
        Self { items, open: None }
    }

    pub fn open(&mut self, id: NewsId) -> bool {
        if !self.items.iter().any(|item| item.id == id) {
            debug!("Unknown news item {}", id);
            return false;
        }
        self.open = Some(id);
        true
    }

    pub fn close(&mut self) -> bool {
        self.open.take().is_some()
    }

    pub fn open_item(&self) -> Option<NewsId> {
        self.open
    }
}
