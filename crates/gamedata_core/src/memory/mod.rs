//! # Memory Management
//!
//! Row arenas and the row copy capability used by the allocators.
//!
//! ## Design Philosophy
//!
//! - Rows are addressed by generational handles, never by pointers
//! - Released slots are reused lowest index first
//! - Pages never move once allocated

mod row_type;
mod slot_table;

pub use row_type::RowType;
pub use slot_table::{RowHandle, SlotTable};
