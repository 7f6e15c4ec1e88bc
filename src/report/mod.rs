mod formatter;

pub use formatter::{PlainTextFormatter, ReportFormatter, NO_POINTS_LINE, POINTS_HEADER};
