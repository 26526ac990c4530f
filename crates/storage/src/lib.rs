pub mod sheet;

pub use sheet::{
    list_spreadsheets, read_sheet, ExportError, ExportSummary, SheetExporter, COLUMN_WIDTH,
};
