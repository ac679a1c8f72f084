// Table reconstruction: body detection, header role inference, column
// banding, and row normalization.

pub mod bands;
pub mod body;
pub mod header;
pub mod rows;

pub use bands::ColumnBands;
pub use body::{filter_body, find_body_start, DroppedLine};
pub use header::{HeaderRoles, Role, RoleInfo, RoleSource};
pub use rows::Row;
