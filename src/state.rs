use crate::fetch::Fetcher;
use crate::pages::Page;
use crate::view::PageController;
use std::{collections::HashMap, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
    views: Arc<HashMap<Page, PageController>>,
}

impl AppState {
    pub fn new(fetcher: Fetcher) -> Self {
        let views = Page::ALL
            .into_iter()
            .map(|page| (page, PageController::new(page, fetcher.clone())))
            .collect();

        Self {
            fetcher,
            views: Arc::new(views),
        }
    }

    pub fn view(&self, page: Page) -> Option<&PageController> {
        self.views.get(&page)
    }
}
