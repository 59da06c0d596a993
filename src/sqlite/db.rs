use super::data_containers::headers::{DB_HEADER_SIZE, DatabaseHeader, DbTextEncoding};
use super::data_containers::page::Page;
use super::data_containers::schema::{SCHEMA_ROOT_PAGE, SqliteSchema};
use super::query_engine;
use crate::config::{PageLoading, ReaderConfig};
use crate::error::{Result, SqliteError};
use crate::parser::Query;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Page fetch capability the b-tree walkers run against.
pub trait PageReader {
    /// Decoded b-tree page `page_number` (1-based).
    fn page(&self, page_number: u32) -> Result<Rc<Page>>;

    /// Undecoded page bytes, used for overflow pages.
    fn raw_page(&self, page_number: u32) -> Result<Vec<u8>>;

    fn usable_size(&self) -> usize;

    fn text_encoding(&self) -> DbTextEncoding;
}

/// A read-only handle on one database file.
///
/// The header and schema are read at open time. Decoded pages are cached for
/// the lifetime of the handle, there is no eviction.
#[derive(Debug)]
pub struct Database {
    file: RefCell<File>,
    // whole file, only kept when pages are loaded eagerly
    image: Option<Vec<u8>>,
    pages: RefCell<HashMap<u32, Rc<Page>>>,
    header: DatabaseHeader,
    page_count: u32,
    schema: SqliteSchema,
    config: ReaderConfig,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Database> {
        Database::open_with(path, ReaderConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Database> {
        let mut file = File::open(path.as_ref())?;

        let mut header_buffer: Vec<u8> = Vec::with_capacity(DB_HEADER_SIZE);
        file.by_ref()
            .take(DB_HEADER_SIZE as u64)
            .read_to_end(&mut header_buffer)?;
        let header = DatabaseHeader::new(&header_buffer)?;

        let page_size = header.page_size as u64;
        let file_len = file.metadata()?.len();
        let page_count = if header.page_count_is_valid() {
            header.size_of_file
        } else {
            debug!(
                size_of_file = header.size_of_file,
                file_len, "header page count is stale, using file length"
            );
            (file_len / page_size) as u32
        };

        let image = match config.page_loading {
            PageLoading::Eager => {
                let mut image: Vec<u8> = Vec::with_capacity(file_len as usize);
                file.seek(SeekFrom::Start(0))?;
                file.read_to_end(&mut image)?;
                Some(image)
            }
            PageLoading::Lazy => None,
        };

        let mut db = Database {
            file: RefCell::new(file),
            image,
            pages: RefCell::new(HashMap::new()),
            header,
            page_count,
            schema: SqliteSchema::default(),
            config,
        };
        if db.config.page_loading == PageLoading::Eager {
            db.decode_all_pages();
        }
        db.schema = SqliteSchema::load(&db)?;
        debug!(
            path = %path.as_ref().display(),
            page_size,
            page_count,
            loading = ?db.config.page_loading,
            "opened database"
        );
        Ok(db)
    }

    // Overflow and freelist pages are not b-tree pages; they are left out of
    // the cache here and only decoded if something asks for them as b-tree pages.
    fn decode_all_pages(&self) {
        let usable_size = self.usable_size();
        let mut pages = self.pages.borrow_mut();
        for page_number in 1..=self.page_count {
            let Ok(data) = self.read_page_bytes(page_number) else {
                break;
            };
            if let Ok(page) = Page::try_decode(&data, page_number, usable_size) {
                pages.insert(page_number, Rc::new(page));
            }
        }
        debug!(decoded = pages.len(), "decoded pages up front");
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    pub fn schema(&self) -> &SqliteSchema {
        &self.schema
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Bytes of page 1 in use below the cell content area, excluding the
    /// database header.
    pub fn schema_size(&self) -> Result<usize> {
        let page = self.page(SCHEMA_ROOT_PAGE)?;
        let content_start = page.page_header.cell_content_start as usize;
        Ok((self.header.page_size as usize)
            .saturating_sub(content_start)
            .saturating_sub(DB_HEADER_SIZE))
    }

    pub fn execute(&self, query: &Query) -> Result<Vec<Vec<String>>> {
        query_engine::execute(self, &self.schema, query)
    }

    fn read_page_bytes(&self, page_number: u32) -> Result<Vec<u8>> {
        if page_number == 0 || page_number > self.page_count {
            return Err(SqliteError::NotFound {
                kind: "page",
                name: page_number.to_string(),
            });
        }
        let page_size = self.header.page_size as usize;
        let start = (page_number as usize - 1) * page_size;
        let truncated = || {
            SqliteError::format(
                format!("page {page_number}"),
                format!("file ends before byte {}", start + page_size),
            )
        };

        if let Some(image) = &self.image {
            return image
                .get(start..start + page_size)
                .map(<[u8]>::to_vec)
                .ok_or_else(truncated);
        }

        let mut data = vec![0_u8; page_size];
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(start as u64))?;
        file.read_exact(&mut data).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => truncated(),
            _ => SqliteError::Io(e),
        })?;
        Ok(data)
    }
}

impl PageReader for Database {
    fn page(&self, page_number: u32) -> Result<Rc<Page>> {
        if let Some(page) = self.pages.borrow().get(&page_number) {
            return Ok(Rc::clone(page));
        }
        let data = self.read_page_bytes(page_number)?;
        let page = Rc::new(Page::decode(&data, page_number, self.usable_size()));
        self.pages
            .borrow_mut()
            .insert(page_number, Rc::clone(&page));
        Ok(page)
    }

    fn raw_page(&self, page_number: u32) -> Result<Vec<u8>> {
        self.read_page_bytes(page_number)
    }

    fn usable_size(&self) -> usize {
        self.header.usable_size()
    }

    fn text_encoding(&self) -> DbTextEncoding {
        self.header.text_encoding
    }
}
