//! Object-relational mapping between typed objects and stored rows.

mod labels;
mod mapper;
mod row;

pub use labels::{new_labels, replace_labels, to_label_map, LabelChange};
pub use mapper::{flatten, from_row, merge_into_row, to_row};
pub use row::{EntityRow, LabelRow};
