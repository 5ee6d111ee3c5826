pub mod charset;
pub mod key;
pub mod range;
pub mod row;
pub mod value;

pub use key::MigrationKey;
pub use range::PkRange;
pub use row::{ColumnMeta, FieldValue, RowData};
pub use value::{DataType, Value};
