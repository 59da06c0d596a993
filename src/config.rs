//! Open-time configuration for a [`Database`](crate::Database).

/// How pages are brought into memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageLoading {
    /// Read and decode a page the first time it is requested, then keep it
    /// for the lifetime of the handle.
    #[default]
    Lazy,
    /// Read the whole file at open time and decode every page up front.
    Eager,
}

#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    pub page_loading: PageLoading,
}

impl ReaderConfig {
    pub fn eager() -> Self {
        Self {
            page_loading: PageLoading::Eager,
        }
    }

    pub fn with_page_loading(mut self, page_loading: PageLoading) -> Self {
        self.page_loading = page_loading;
        self
    }
}
