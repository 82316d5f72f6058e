use concord_core::{HasId, Id};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;

use crate::dispatcher::HttpDispatcher;
use crate::error::Result;
use crate::route::{Request, Route};

/// Which way the cursor walks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Newest first, starting below the cursor (or at the newest item)
    Before(Option<Id>),
    /// Oldest first, starting above the cursor
    After(Id),
}

/// Walks a `before`/`after` cursor through a list endpoint.
///
/// Items are yielded one at a time; a page is fetched when the buffer runs
/// dry. Iteration ends at the limit or at the first short page.
pub struct Paginator<T> {
    dispatcher: HttpDispatcher,
    route: Route,
    direction: Direction,
    limit: Option<usize>,
    page_size: usize,
    yielded: usize,
    buffer: VecDeque<T>,
    exhausted: bool,
}

impl<T: DeserializeOwned + HasId> Paginator<T> {
    pub fn new(dispatcher: HttpDispatcher, route: Route, direction: Direction) -> Self {
        Self {
            dispatcher,
            route,
            direction,
            limit: None,
            page_size: 100,
            yielded: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Items requested per page (the API caps this at 100)
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, 100);
        self
    }

    fn wanted(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.yielded + self.buffer.len()).min(self.page_size),
            None => self.page_size,
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let wanted = self.wanted();
        if wanted == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let mut request = Request::new(self.route.clone()).query("limit", wanted);
        request = match self.direction {
            Direction::Before(Some(cursor)) => request.query("before", cursor),
            Direction::Before(None) => request,
            Direction::After(cursor) => request.query("after", cursor),
        };
        let mut page: Vec<T> = self.dispatcher.request(request).await?;
        if page.len() < wanted {
            self.exhausted = true;
        }

        match self.direction {
            Direction::Before(_) => {
                page.sort_by_key(|item| std::cmp::Reverse(item.id()));
                if let Some(last) = page.last() {
                    self.direction = Direction::Before(Some(last.id()));
                }
            }
            Direction::After(_) => {
                page.sort_by_key(|item| item.id());
                if let Some(last) = page.last() {
                    self.direction = Direction::After(last.id());
                }
            }
        }
        if page.is_empty() {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }

    pub async fn next(&mut self) -> Result<Option<T>> {
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            return Ok(None);
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        let item = self.buffer.pop_front();
        if item.is_some() {
            self.yielded += 1;
        }
        Ok(item)
    }

    /// Drain every remaining item
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}
