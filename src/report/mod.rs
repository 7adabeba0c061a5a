//! Result aggregation and tabular output.

mod locale;
mod table;

pub use locale::{Labels, Locale};
pub use table::{aggregate, received, ReceivedRow, Table, TableRow, TableView};
