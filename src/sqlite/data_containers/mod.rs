pub mod headers;
pub mod page;
pub mod record;
pub mod schema;
pub mod serial_types;
