pub mod data_containers;
pub mod db;
pub mod query_engine;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

/* Read-only access to sqlite database files
* 1. utilities for reading sqlite varints, which differ slightly from protobuf style
*    varints, and a bounds checked cursor over page bytes
* 2. types for the on disk structures
*       - database header, the first 100 bytes of page 1
*       - b-tree pages and their cells
*       - records, serial types and values
*       - the schema table
* 3. a small query engine
*       - full scans of table and index b-trees
*       - row id lookups and index key lookups
*       - a planner choosing between the two
* */
